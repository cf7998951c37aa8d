//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                         │
//! │                                                                     │
//! │  In floating point:                                                 │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                       │
//! │                                                                     │
//! │  In a profit-split engine:                                          │
//! │    10,000.00 × 0.03 × 8 tiers → drift that never reconciles         │
//! │                                                                     │
//! │  OUR SOLUTION: Integer Cents                                        │
//! │    1_000_000 cents × 300 bps = exact integer math,                  │
//! │    and the one place rounding happens is explicit and deterministic │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding Policy
//! Share application rounds HALF AWAY FROM ZERO at cent precision
//! (2.5 → 3, -2.5 → -3). This is the deterministic currency rounding the
//! distribution calculator's reconciliation invariant is built on; any
//! residual is then assigned explicitly, never lost.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use crate::tier::Share;
use crate::FULL_SHARE_BPS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: gross profit can be negative (loss-making sales,
///   adjustments) and the split must handle it symmetrically
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Derives**: full serde support for audit snapshots and breakdowns
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use revshare_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit is negative:
    /// `from_major_minor(-5, 50)` is -5.50, not -4.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use revshare_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(4_500);
    /// assert_eq!(unit_price.multiply_quantity(12).cents(), 54_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Applies a tier share, rounding half away from zero at cent
    /// precision.
    ///
    /// ## Rounding Explained
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────┐
    /// │  ROUND HALF AWAY FROM ZERO                                      │
    /// │                                                                 │
    /// │    1250 cents × 300 bps = 37.5 cents → 38                       │
    /// │   -1250 cents × 300 bps = -37.5 cents → -38                     │
    /// │                                                                 │
    /// │  Symmetric around zero, so a split of a negative gross profit   │
    /// │  mirrors the positive case exactly. The calculator assigns the  │
    /// │  leftover residual explicitly afterwards.                       │
    /// └─────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// ## Implementation
    /// Integer math in i128 to prevent overflow on large amounts:
    /// `(cents * bps ± 5000) / 10000` with the sign of the numerator.
    ///
    /// ## Example
    /// ```rust
    /// use revshare_core::money::Money;
    /// use revshare_core::tier::Share;
    ///
    /// let gross = Money::from_cents(1_000_000); // 10,000.00
    /// let cut = gross.apply_share(Share::from_bps(3200)); // 32%
    /// assert_eq!(cut.cents(), 320_000);
    /// ```
    pub fn apply_share(&self, share: Share) -> Money {
        let numerator = self.0 as i128 * share.bps() as i128;
        let denominator = FULL_SHARE_BPS as i128;

        let rounded = if numerator >= 0 {
            (numerator + denominator / 2) / denominator
        } else {
            -((-numerator + denominator / 2) / denominator)
        };

        Money(rounded as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// For debugging and logs; user-facing formatting and localization
/// belong to the application layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!((-a).cents(), -1000);
    }

    #[test]
    fn test_apply_share_exact() {
        // 10,000.00 × 32% = 3,200.00 exactly
        let gross = Money::from_cents(1_000_000);
        assert_eq!(gross.apply_share(Share::from_bps(3200)).cents(), 320_000);
    }

    #[test]
    fn test_apply_share_rounds_half_away_from_zero() {
        // 12.50 × 3% = 0.375 → 0.38 (half rounds up, away from zero)
        let amount = Money::from_cents(1250);
        assert_eq!(amount.apply_share(Share::from_bps(300)).cents(), 38);

        // -12.50 × 3% = -0.375 → -0.38 (away from zero, symmetric)
        let negative = Money::from_cents(-1250);
        assert_eq!(negative.apply_share(Share::from_bps(300)).cents(), -38);
    }

    #[test]
    fn test_apply_share_not_bankers_rounding() {
        // Bankers rounding would send 0.25 → 0.2 (to even);
        // half away from zero sends 2.5 cents → 3 cents.
        let amount = Money::from_cents(50);
        assert_eq!(amount.apply_share(Share::from_bps(500)).cents(), 3);
    }

    #[test]
    fn test_apply_share_zero_cases() {
        assert_eq!(Money::zero().apply_share(Share::from_bps(3200)), Money::zero());
        assert_eq!(
            Money::from_cents(1_000_000).apply_share(Share::zero()),
            Money::zero()
        );
    }

    #[test]
    fn test_apply_share_large_amount_no_overflow() {
        // i64::MAX-scale cents × 10_000 bps would overflow i64; i128 keeps it safe
        let huge = Money::from_cents(i64::MAX / 2);
        let result = huge.apply_share(Share::from_bps(FULL_SHARE_BPS));
        assert_eq!(result.cents(), i64::MAX / 2);
    }

    #[test]
    fn test_zero_and_sign_checks() {
        assert!(Money::zero().is_zero());
        assert!(Money::from_cents(100).is_positive());
        assert!(Money::from_cents(-100).is_negative());
        assert_eq!(Money::from_cents(-550).abs().cents(), 550);
    }
}
