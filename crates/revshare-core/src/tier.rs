//! # Tier Module
//!
//! The closed set of organizational tiers that receive a share of gross
//! profit, plus the fixed-key structures that carry per-tier fractions
//! and per-tier amounts.
//!
//! ## Why a Closed Enumeration?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  THE LOOSE-MAP PROBLEM                                              │
//! │                                                                     │
//! │  With an open string-keyed map:                                     │
//! │    {"factory": 0.32, "hospitla": 0.30}   ← typo silently drops 30%! │
//! │                                                                     │
//! │  OUR SOLUTION: fixed-key records                                    │
//! │    TierShares { factory, hq, regional, branch,                      │
//! │                 nationwide, local, area, hospital }                 │
//! │    An unknown tier name fails at deserialization time,              │
//! │    never as a silent no-op.                                         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why Basis Points?
//! Tier fractions are stored as basis points (1 bp = 0.01%, 3200 = 32%).
//! Integer shares keep split arithmetic exact and serialization
//! round-trips identical, which the audit trail depends on.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::money::Money;
use crate::FULL_SHARE_BPS;

// =============================================================================
// Share
// =============================================================================

/// A tier's fraction of gross profit, in basis points.
///
/// 3200 bps = 32.00%. Valid shares are in `[0, 10_000]`; the upper bound
/// is enforced by [`TierShares::validate`], not by construction, so that
/// malformed input surfaces as a `ValidationError` rather than a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Share(u32);

impl Share {
    /// Creates a share from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Share(bps)
    }

    /// Creates a share from a fraction in `[0, 1]` (for convenience).
    ///
    /// ## Example
    /// ```rust
    /// use revshare_core::tier::Share;
    ///
    /// assert_eq!(Share::from_fraction(0.32).bps(), 3200);
    /// ```
    pub fn from_fraction(fraction: f64) -> Self {
        Share((fraction * FULL_SHARE_BPS as f64).round() as u32)
    }

    /// Returns the share in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the share as a fraction (for display only).
    #[inline]
    pub fn fraction(&self) -> f64 {
        self.0 as f64 / FULL_SHARE_BPS as f64
    }

    /// Zero share.
    #[inline]
    pub const fn zero() -> Self {
        Share(0)
    }

    /// Checks if the share is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Share {
    fn default() -> Self {
        Share::zero()
    }
}

impl fmt::Display for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Tier
// =============================================================================

/// An organizational tier receiving a share of gross profit.
///
/// This set is CLOSED: adding a tier means adding a variant here, to the
/// share/amount records below, and to the schema - a deliberate compile-time
/// ripple so no consumer can silently ignore a new tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Factory,
    Hq,
    Regional,
    Branch,
    Nationwide,
    Local,
    Area,
    Hospital,
}

impl Tier {
    /// All tiers, in declaration order.
    pub const ALL: [Tier; 8] = [
        Tier::Factory,
        Tier::Hq,
        Tier::Regional,
        Tier::Branch,
        Tier::Nationwide,
        Tier::Local,
        Tier::Area,
        Tier::Hospital,
    ];

    /// All tiers sorted by name; used for the deterministic residual
    /// tie-break (alphabetically first wins a share tie).
    pub const ALPHABETICAL: [Tier; 8] = [
        Tier::Area,
        Tier::Branch,
        Tier::Factory,
        Tier::Hospital,
        Tier::Hq,
        Tier::Local,
        Tier::Nationwide,
        Tier::Regional,
    ];

    /// Stable lowercase name, matching serialization and storage.
    pub const fn name(&self) -> &'static str {
        match self {
            Tier::Factory => "factory",
            Tier::Hq => "hq",
            Tier::Regional => "regional",
            Tier::Branch => "branch",
            Tier::Nationwide => "nationwide",
            Tier::Local => "local",
            Tier::Area => "area",
            Tier::Hospital => "hospital",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Tier Shares
// =============================================================================

/// A distribution rule's fraction per tier.
///
/// ## Invariants
/// - Each share is in `[0, 10_000]` bps (checked by [`validate`](Self::validate))
/// - The TOTAL is NOT required to equal 100%: shares may represent cuts of
///   gross profit rather than of revenue. Consumers detect deviation via
///   [`is_balanced`](Self::is_balanced) and surface a warning instead of
///   failing the transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierShares {
    pub factory: Share,
    pub hq: Share,
    pub regional: Share,
    pub branch: Share,
    pub nationwide: Share,
    pub local: Share,
    pub area: Share,
    pub hospital: Share,
}

impl TierShares {
    /// Returns the share for a tier.
    pub const fn get(&self, tier: Tier) -> Share {
        match tier {
            Tier::Factory => self.factory,
            Tier::Hq => self.hq,
            Tier::Regional => self.regional,
            Tier::Branch => self.branch,
            Tier::Nationwide => self.nationwide,
            Tier::Local => self.local,
            Tier::Area => self.area,
            Tier::Hospital => self.hospital,
        }
    }

    /// Iterates (tier, share) pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Tier, Share)> + '_ {
        Tier::ALL.iter().map(move |&tier| (tier, self.get(tier)))
    }

    /// Sum of all shares in basis points.
    pub fn total_bps(&self) -> u32 {
        self.iter().map(|(_, share)| share.bps()).sum()
    }

    /// Whether the shares sum to exactly 100%.
    ///
    /// A rule whose shares deviate from 100% is still usable - the split
    /// is computed and the transaction recorded - but carries an
    /// out-of-balance warning for downstream human review.
    pub fn is_balanced(&self) -> bool {
        self.total_bps() == FULL_SHARE_BPS
    }

    /// Validates that every share is within `[0, 10_000]` bps.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (tier, share) in self.iter() {
            if share.bps() > FULL_SHARE_BPS {
                return Err(ValidationError::OutOfRange {
                    field: format!("share.{}", tier),
                    min: 0,
                    max: FULL_SHARE_BPS as i64,
                });
            }
        }
        Ok(())
    }

    /// The tier that absorbs any rounding residual: the one with the
    /// largest share, ties broken by alphabetically first tier name.
    pub fn residual_tier(&self) -> Tier {
        let mut best = Tier::ALPHABETICAL[0];
        let mut best_bps = self.get(best).bps();

        for &tier in &Tier::ALPHABETICAL[1..] {
            let bps = self.get(tier).bps();
            // Strictly greater: on a tie the earlier (alphabetical) tier wins
            if bps > best_bps {
                best = tier;
                best_bps = bps;
            }
        }

        best
    }
}

// =============================================================================
// Tier Amounts
// =============================================================================

/// A computed amount per tier, in cents.
///
/// Produced by the distribution calculator; the amounts always sum exactly
/// to the gross profit they were computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierAmounts {
    pub factory: Money,
    pub hq: Money,
    pub regional: Money,
    pub branch: Money,
    pub nationwide: Money,
    pub local: Money,
    pub area: Money,
    pub hospital: Money,
}

impl TierAmounts {
    /// Returns the amount for a tier.
    pub const fn get(&self, tier: Tier) -> Money {
        match tier {
            Tier::Factory => self.factory,
            Tier::Hq => self.hq,
            Tier::Regional => self.regional,
            Tier::Branch => self.branch,
            Tier::Nationwide => self.nationwide,
            Tier::Local => self.local,
            Tier::Area => self.area,
            Tier::Hospital => self.hospital,
        }
    }

    /// Sets the amount for a tier.
    pub fn set(&mut self, tier: Tier, amount: Money) {
        match tier {
            Tier::Factory => self.factory = amount,
            Tier::Hq => self.hq = amount,
            Tier::Regional => self.regional = amount,
            Tier::Branch => self.branch = amount,
            Tier::Nationwide => self.nationwide = amount,
            Tier::Local => self.local = amount,
            Tier::Area => self.area = amount,
            Tier::Hospital => self.hospital = amount,
        }
    }

    /// Iterates (tier, amount) pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Tier, Money)> + '_ {
        Tier::ALL.iter().map(move |&tier| (tier, self.get(tier)))
    }

    /// Sum of all tier amounts.
    pub fn total(&self) -> Money {
        self.iter()
            .fold(Money::zero(), |acc, (_, amount)| acc + amount)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
