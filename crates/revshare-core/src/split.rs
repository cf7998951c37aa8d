//! # Distribution Calculator
//!
//! Splits a gross-profit amount across tiers according to a rule's
//! shares, with an exact-sum reconciliation invariant.
//!
//! ## The Reconciliation Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  Why the Residual Assignment?                       │
//! │                                                                     │
//! │  gross = 100.00, three tiers at 33.33% each:                        │
//! │    33.33 + 33.33 + 33.33 = 99.99  → 1 cent vanished!                │
//! │                                                                     │
//! │  OUR RULE: after rounding each tier, the residual                   │
//! │  (gross − Σ tier amounts) goes ENTIRELY to the tier with the        │
//! │  largest share (tie-break: alphabetically first tier name).         │
//! │                                                                     │
//! │  Result: Σ tier amounts == gross. ALWAYS. This is what financial    │
//! │  reconciliation downstream depends on.                              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A rule whose shares do not sum to 100% is NOT an error: the split is
//! still computed (and still sums exactly to gross), but the result
//! carries an out-of-balance flag for downstream human review.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::tier::{Tier, TierAmounts, TierShares};

// =============================================================================
// Split Result
// =============================================================================

/// The computed per-tier split for one gross-profit amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    /// Amount per tier; sums exactly to the input gross profit.
    pub amounts: TierAmounts,
    /// The tier that absorbed the rounding residual.
    pub residual_tier: Tier,
    /// The residual itself (zero when the rounded shares already summed
    /// to gross). Kept for audit visibility.
    pub residual: Money,
    /// True when the shares deviate from exactly 100%.
    ///
    /// Non-fatal: the transaction is still recorded; the flag is
    /// surfaced on the response and the persisted row.
    pub out_of_balance: bool,
}

// =============================================================================
// Calculator
// =============================================================================

/// Computes the per-tier split of `gross_profit`.
///
/// Each tier amount is `gross_profit × share`, rounded half away from
/// zero at cent precision; the rounding residual is then assigned to
/// [`TierShares::residual_tier`] so the amounts sum exactly to
/// `gross_profit` - including for zero and negative gross profit.
///
/// ## Example
/// ```rust
/// use revshare_core::money::Money;
/// use revshare_core::split::compute_split;
/// use revshare_core::tier::{Share, Tier, TierShares};
///
/// let shares = TierShares {
///     factory: Share::from_bps(3333),
///     hq: Share::from_bps(3333),
///     regional: Share::from_bps(3334),
///     ..TierShares::default()
/// };
///
/// let split = compute_split(&shares, Money::from_cents(10_000));
/// assert_eq!(split.amounts.total(), Money::from_cents(10_000));
/// ```
pub fn compute_split(shares: &TierShares, gross_profit: Money) -> Split {
    let mut amounts = TierAmounts::default();

    for (tier, share) in shares.iter() {
        amounts.set(tier, gross_profit.apply_share(share));
    }

    let residual_tier = shares.residual_tier();
    let residual = gross_profit - amounts.total();
    if !residual.is_zero() {
        amounts.set(residual_tier, amounts.get(residual_tier) + residual);
    }

    Split {
        amounts,
        residual_tier,
        residual,
        out_of_balance: !shares.is_balanced(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::Share;

    /// The source system's default rule: sums to 102%.
    fn source_default_shares() -> TierShares {
        TierShares {
            factory: Share::from_bps(3200),
            hq: Share::from_bps(300),
            regional: Share::from_bps(2500),
            branch: Share::from_bps(200),
            nationwide: Share::from_bps(200),
            local: Share::from_bps(300),
            area: Share::from_bps(500),
            hospital: Share::from_bps(3000),
        }
    }

    #[test]
    fn test_split_sums_exactly_to_gross() {
        let shares = source_default_shares();
        for cents in [1_000_000, 999_999, 1, 7, 123_456_789, 33] {
            let gross = Money::from_cents(cents);
            let split = compute_split(&shares, gross);
            assert_eq!(split.amounts.total(), gross, "gross = {cents}");
        }
    }

    #[test]
    fn test_split_zero_gross() {
        let split = compute_split(&source_default_shares(), Money::zero());
        assert_eq!(split.amounts.total(), Money::zero());
        for (_, amount) in split.amounts.iter() {
            assert_eq!(amount, Money::zero());
        }
    }

    #[test]
    fn test_split_negative_gross() {
        // Loss-making transactions split symmetrically
        let gross = Money::from_cents(-123_457);
        let split = compute_split(&source_default_shares(), gross);
        assert_eq!(split.amounts.total(), gross);
        assert!(split.amounts.factory.is_negative());
    }

    #[test]
    fn test_out_of_balance_flag_for_102_percent_rule() {
        // The end-to-end scenario: 102% rule, gross profit 10,000.00
        let gross = Money::from_cents(1_000_000);
        let split = compute_split(&source_default_shares(), gross);

        assert!(split.out_of_balance);

        // Every tier is round(gross × fraction)...
        assert_eq!(split.amounts.hq.cents(), 30_000);
        assert_eq!(split.amounts.regional.cents(), 250_000);
        assert_eq!(split.amounts.branch.cents(), 20_000);
        assert_eq!(split.amounts.nationwide.cents(), 20_000);
        assert_eq!(split.amounts.local.cents(), 30_000);
        assert_eq!(split.amounts.area.cents(), 50_000);
        assert_eq!(split.amounts.hospital.cents(), 300_000);

        // ...except the residual tier, adjusted so the total is exact.
        // Raw sum would be 1,020,000; the -20,000 residual lands on the
        // largest share. Factory (32%) outranks hospital (30%) here.
        assert_eq!(split.residual_tier, Tier::Factory);
        assert_eq!(split.residual.cents(), -20_000);
        assert_eq!(split.amounts.factory.cents(), 320_000 - 20_000);
        assert_eq!(split.amounts.total(), gross);
    }

    #[test]
    fn test_residual_goes_to_hospital_when_it_has_largest_share() {
        // Same 102% rule but with factory and hospital swapped, so
        // hospital (32%) is the largest share
        let mut shares = source_default_shares();
        shares.factory = Share::from_bps(3000);
        shares.hospital = Share::from_bps(3200);

        let gross = Money::from_cents(1_000_000);
        let split = compute_split(&shares, gross);

        assert_eq!(split.residual_tier, Tier::Hospital);
        assert_eq!(split.amounts.hospital.cents(), 320_000 - 20_000);
        assert_eq!(split.amounts.total(), gross);
    }

    #[test]
    fn test_balanced_rule_not_flagged() {
        let mut shares = source_default_shares();
        shares.factory = Share::from_bps(3000); // brings total to 10,000 bps

        let split = compute_split(&shares, Money::from_cents(1_000_000));
        assert!(!split.out_of_balance);
        assert_eq!(split.residual, Money::zero());
    }

    #[test]
    fn test_rounding_residual_with_awkward_fractions() {
        // 100.00 split three ways at 33.33/33.33/33.34
        let shares = TierShares {
            factory: Share::from_bps(3333),
            hq: Share::from_bps(3333),
            regional: Share::from_bps(3334),
            ..TierShares::default()
        };

        let gross = Money::from_cents(10_000);
        let split = compute_split(&shares, gross);

        assert!(!split.out_of_balance);
        assert_eq!(split.amounts.total(), gross);
        // regional holds the largest share and absorbs any residual
        assert_eq!(split.residual_tier, Tier::Regional);
    }

    #[test]
    fn test_gross_smaller_than_tier_count() {
        // 3 cents across 8 tiers: most round to zero, the residual
        // keeps the books balanced
        let gross = Money::from_cents(3);
        let split = compute_split(&source_default_shares(), gross);
        assert_eq!(split.amounts.total(), gross);
    }
}
