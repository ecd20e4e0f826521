//! Lossless money type backed by rust_decimal.
//!
//! Parses from strings or JSON numbers, serializes as a string so amounts
//! never pass through a float on the wire.

use rust_decimal::{Decimal as RustDecimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

/// Number of decimal places money amounts are kept at (kobo / cents).
pub const MONEY_DP: u32 = 2;

/// Lossless decimal numeric type for financial calculations.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Decimal(RustDecimal);

impl Decimal {
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s.trim()).map(Decimal)
    }

    /// Format without exponent notation or trailing zeros.
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    pub fn hundred() -> Self {
        Decimal(RustDecimal::ONE_HUNDRED)
    }

    pub fn from_i64(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn max(self, other: Decimal) -> Decimal {
        if self >= other {
            self
        } else {
            other
        }
    }

    pub fn min(self, other: Decimal) -> Decimal {
        if self <= other {
            self
        } else {
            other
        }
    }

    /// `max(self, 0)`.
    pub fn floor_zero(self) -> Decimal {
        self.max(Decimal::zero())
    }

    pub fn clamp(self, lo: Decimal, hi: Decimal) -> Decimal {
        self.max(lo).min(hi)
    }

    /// Round half away from zero to `dp` places.
    pub fn round_dp(self, dp: u32) -> Decimal {
        Decimal(self.0.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Truncate toward zero to `dp` places.
    pub fn trunc_dp(self, dp: u32) -> Decimal {
        Decimal(self.0.round_dp_with_strategy(dp, RoundingStrategy::ToZero))
    }

    /// Checked division; `None` when `rhs` is zero.
    pub fn checked_div(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_div(rhs.0).map(Decimal)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal::from_i64(value)
    }
}

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::SubAssign for Decimal {
    fn sub_assign(&mut self, rhs: Decimal) {
        self.0 -= rhs.0;
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::ops::Div for Decimal {
    type Output = Decimal;

    fn div(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 / rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

impl Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, d| acc + d)
    }
}

impl<'a> Sum<&'a Decimal> for Decimal {
    fn sum<I: Iterator<Item = &'a Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, d| acc + *d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_canonical_string_drops_trailing_zeros() {
        assert_eq!(d("920000.00").to_canonical_string(), "920000");
        assert_eq!(d("11111.10").to_canonical_string(), "11111.1");
        assert!(!d("123").to_canonical_string().contains('e'));
    }

    #[test]
    fn test_trunc_and_round() {
        let third = d("1000000") / d("90");
        assert_eq!(third.trunc_dp(MONEY_DP), d("11111.11"));
        assert_eq!(d("2.345").round_dp(2), d("2.35"));
        assert_eq!(d("-2.345").round_dp(2), d("-2.35"));
        assert_eq!(d("2.349").trunc_dp(2), d("2.34"));
    }

    #[test]
    fn test_floor_zero_and_clamp() {
        assert_eq!(d("-5").floor_zero(), Decimal::zero());
        assert_eq!(d("5").floor_zero(), d("5"));
        assert_eq!(d("120").clamp(Decimal::zero(), Decimal::hundred()), d("100"));
        assert_eq!(d("-1").clamp(Decimal::zero(), Decimal::hundred()), d("0"));
    }

    #[test]
    fn test_checked_div_by_zero() {
        assert!(d("1").checked_div(Decimal::zero()).is_none());
        assert_eq!(d("1").checked_div(d("4")), Some(d("0.25")));
    }

    #[test]
    fn test_sum_iterator() {
        let total: Decimal = vec![d("1.5"), d("2.5"), d("3")].into_iter().sum();
        assert_eq!(total, d("7"));
    }

    #[test]
    fn test_json_serializes_as_string_and_parses_numbers() {
        let json = serde_json::to_value(d("123.45")).unwrap();
        assert!(json.is_string());

        let from_number: Decimal = serde_json::from_str("80000").unwrap();
        assert_eq!(from_number, d("80000"));
        let from_string: Decimal = serde_json::from_str("\"15000.50\"").unwrap();
        assert_eq!(from_string, d("15000.5"));
    }
}
