//! Integer money type.
//!
//! All monetary values are stored in the smallest currency unit as an `i64`.
//! Arithmetic happens on integers only; percentages are expressed in basis
//! points (1 bps = 0.01%, so 10000 bps = 100%) and intermediate products are
//! widened to `i128` so large amounts cannot overflow.

use core::fmt;
use core::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Number of basis points in 100%.
pub const BPS_SCALE: i64 = 10_000;

/// A monetary amount in the smallest currency unit.
///
/// Signed so refunds and corrections can be represented. The currency itself
/// is implicit (single-currency deployment); only the amount is tracked.
///
/// ```
/// use green_grocer_core::Money;
///
/// let price = Money::from_minor(90_000);
/// let line_total = price * 10;
/// assert_eq!(line_total.minor(), 900_000);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
#[cfg_attr(feature = "sqlite", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlite", sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Create a monetary amount from minor units.
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// The zero amount.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// The amount in minor units.
    #[must_use]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Whether the amount is greater than zero.
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Whether the amount is less than zero.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// The discount amount for a percentage given in basis points,
    /// rounded half-up.
    ///
    /// ```
    /// use green_grocer_core::Money;
    ///
    /// let subtotal = Money::from_minor(250_000);
    /// assert_eq!(subtotal.discount_amount(1_000).minor(), 25_000); // 10%
    /// ```
    #[must_use]
    pub fn discount_amount(&self, bps: i64) -> Self {
        #[allow(clippy::cast_possible_truncation)] // bps <= 10000 keeps the quotient in i64 range
        let amount = ((i128::from(self.0) * i128::from(bps) + 5_000) / 10_000) as i64;
        Self(amount)
    }

    /// The amount after applying a percentage discount given in basis points.
    #[must_use]
    pub fn apply_discount_bps(&self, bps: i64) -> Self {
        *self - self.discount_amount(bps)
    }

    /// Scale the amount by a basis-point factor, truncating toward zero.
    ///
    /// Used for point accrual, where `10000` bps is a 1x multiplier and
    /// fractional points are always dropped.
    #[must_use]
    pub fn scale_bps_floor(&self, bps: i64) -> i64 {
        #[allow(clippy::cast_possible_truncation)] // multiplier caps keep the quotient in i64 range
        let scaled = (i128::from(self.0) * i128::from(bps) / 10_000) as i64;
        scaled
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self {
        Self(self.0 * rhs)
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor_roundtrip() {
        let m = Money::from_minor(1_099);
        assert_eq!(m.minor(), 1_099);
    }

    #[test]
    fn test_zero_predicates() {
        assert!(Money::zero().is_zero());
        assert!(Money::from_minor(1).is_positive());
        assert!(Money::from_minor(-1).is_negative());
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(100);
        let b = Money::from_minor(250);
        assert_eq!((a + b).minor(), 350);
        assert_eq!((b - a).minor(), 150);
        assert_eq!((a * 3).minor(), 300);
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 200, 300].map(Money::from_minor).into_iter().sum();
        assert_eq!(total.minor(), 600);
    }

    #[test]
    fn test_discount_amount_rounds_half_up() {
        // 333 * 10% = 33.3 -> 33
        assert_eq!(Money::from_minor(333).discount_amount(1_000).minor(), 33);
        // 335 * 10% = 33.5 -> 34
        assert_eq!(Money::from_minor(335).discount_amount(1_000).minor(), 34);
    }

    #[test]
    fn test_apply_discount_bps() {
        let price = Money::from_minor(100_000);
        assert_eq!(price.apply_discount_bps(1_000).minor(), 90_000);
        assert_eq!(price.apply_discount_bps(0).minor(), 100_000);
        assert_eq!(price.apply_discount_bps(10_000).minor(), 0);
    }

    #[test]
    fn test_scale_bps_floor_truncates() {
        // 1.5x multiplier on 333 = 499.5 -> 499
        assert_eq!(Money::from_minor(333).scale_bps_floor(15_000), 499);
        // 1x multiplier is the identity
        assert_eq!(Money::from_minor(333).scale_bps_floor(10_000), 333);
    }

    #[test]
    fn test_large_amounts_do_not_overflow() {
        let big = Money::from_minor(i64::MAX / 2);
        let discounted = big.apply_discount_bps(2_500);
        assert!(discounted.is_positive());
        assert!(discounted < big);
    }

    #[test]
    fn test_serde_transparent() {
        let m = Money::from_minor(90_000);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "90000");

        let parsed: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, m);
    }
}
