//! Monetary amounts and discount percentages.
//!
//! All arithmetic happens on integer minor units (paise, cents). Conversion to
//! and from decimal major units only happens at the serialization boundary,
//! where amounts travel as decimal strings such as `"19.99"`.

use core::fmt;
use core::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of decimal places between major and minor units.
pub const MINOR_UNIT_SCALE: u32 = 2;

const MINOR_PER_MAJOR: i64 = 100;

/// Errors produced when constructing or combining monetary values.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount cannot be negative")]
    Negative,
    #[error("amount has more than {MINOR_UNIT_SCALE} decimal places")]
    TooPrecise,
    #[error("amount is out of range")]
    Overflow,
    #[error("percentage must be between 0 and 100, got {0}")]
    InvalidPercentage(i64),
}

/// A non-negative amount of money in minor currency units.
///
/// ## Examples
///
/// ```
/// use mercato_core::{Money, Percentage};
///
/// let subtotal = Money::from_minor(10_000).unwrap();
/// let discount = subtotal.percent(Percentage::new(10).unwrap());
/// assert_eq!(discount.as_minor(), 1_000);
/// assert_eq!(subtotal.to_string(), "100.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Self = Self(0);

    /// Build an amount from minor units.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] for negative input.
    pub const fn from_minor(minor: i64) -> Result<Self, MoneyError> {
        if minor < 0 {
            return Err(MoneyError::Negative);
        }
        Ok(Self(minor))
    }

    /// Build an amount from a decimal in major units.
    ///
    /// # Errors
    ///
    /// Fails when the value is negative, has sub-minor precision, or does not
    /// fit in an `i64` of minor units.
    pub fn from_major(major: Decimal) -> Result<Self, MoneyError> {
        if major.is_sign_negative() && !major.is_zero() {
            return Err(MoneyError::Negative);
        }
        let normalized = major.normalize();
        if normalized.scale() > MINOR_UNIT_SCALE {
            return Err(MoneyError::TooPrecise);
        }
        let minor = normalized
            .checked_mul(Decimal::from(MINOR_PER_MAJOR))
            .ok_or(MoneyError::Overflow)?;
        i64::try_from(minor).map_or(Err(MoneyError::Overflow), Self::from_minor)
    }

    #[must_use]
    pub const fn as_minor(self) -> i64 {
        self.0
    }

    /// The amount as a decimal in major units, with exactly two places.
    #[must_use]
    pub fn to_major(self) -> Decimal {
        Decimal::new(self.0, MINOR_UNIT_SCALE)
    }

    /// Multiply a unit price by a quantity.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the product does not fit.
    pub fn times(self, quantity: u32) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Add two amounts.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the sum does not fit.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Subtract, clamping at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        let diff = self.0 - other.0;
        if diff < 0 { Self(0) } else { Self(diff) }
    }

    /// `pct` percent of this amount, rounded half-up to the nearest minor unit.
    #[must_use]
    pub fn percent(self, pct: Percentage) -> Self {
        let scaled = i128::from(self.0) * i128::from(pct.0) + 50;
        // pct <= 100, so the quotient never exceeds self.0
        Self(i64::try_from(scaled / 100).unwrap_or(self.0))
    }
}

impl Add for Money {
    type Output = Self;

    /// Panics on overflow in debug builds; use [`Money::checked_add`] for
    /// untrusted input.
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_major())
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Serialize::serialize(&self.to_major(), serializer)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let major = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::from_major(major).map_err(serde::de::Error::custom)
    }
}

/// A whole-number percentage between 0 and 100 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Percentage(u8);

impl Percentage {
    /// # Errors
    ///
    /// Returns [`MoneyError::InvalidPercentage`] when `value` is above 100.
    pub fn new(value: u8) -> Result<Self, MoneyError> {
        if value > 100 {
            return Err(MoneyError::InvalidPercentage(i64::from(value)));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Percentage {
    type Error = MoneyError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| MoneyError::InvalidPercentage(value))
            .and_then(Self::new)
    }
}

impl TryFrom<i16> for Percentage {
    type Error = MoneyError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

impl From<Percentage> for u8 {
    fn from(pct: Percentage) -> Self {
        pct.0
    }
}

impl From<Percentage> for i16 {
    fn from(pct: Percentage) -> Self {
        Self::from(pct.0)
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn pct(value: u8) -> Percentage {
        Percentage::new(value).unwrap()
    }

    #[test]
    fn test_ten_percent_of_ten_thousand() {
        let subtotal = Money::from_minor(10_000).unwrap();
        let discount = subtotal.percent(pct(10));
        assert_eq!(discount.as_minor(), 1_000);
        assert_eq!(subtotal.saturating_sub(discount).as_minor(), 9_000);
    }

    #[test]
    fn test_percent_rounds_half_up() {
        // 15% of 1.01 = 0.1515 -> 0.15
        assert_eq!(Money::from_minor(101).unwrap().percent(pct(15)).as_minor(), 15);
        // 50% of 0.05 = 0.025 -> 0.03
        assert_eq!(Money::from_minor(5).unwrap().percent(pct(50)).as_minor(), 3);
        assert_eq!(Money::from_minor(999).unwrap().percent(pct(100)).as_minor(), 999);
        assert_eq!(Money::from_minor(999).unwrap().percent(pct(0)), Money::ZERO);
    }

    #[test]
    fn test_from_major() {
        let amount = Money::from_major(Decimal::from_str("19.99").unwrap()).unwrap();
        assert_eq!(amount.as_minor(), 1_999);

        let whole = Money::from_major(Decimal::from_str("20.500").unwrap()).unwrap();
        assert_eq!(whole.as_minor(), 2_050);

        assert_eq!(
            Money::from_major(Decimal::from_str("1.005").unwrap()),
            Err(MoneyError::TooPrecise)
        );
        assert_eq!(
            Money::from_major(Decimal::from_str("-1").unwrap()),
            Err(MoneyError::Negative)
        );
    }

    #[test]
    fn test_times_and_overflow() {
        let unit = Money::from_minor(250).unwrap();
        assert_eq!(unit.times(4).unwrap().as_minor(), 1_000);
        assert_eq!(
            Money::from_minor(i64::MAX).unwrap().times(2),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn test_serializes_as_major_string() {
        let amount = Money::from_minor(1_999).unwrap();
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"19.99\"");

        let parsed: Money = serde_json::from_str("\"5.5\"").unwrap();
        assert_eq!(parsed.as_minor(), 550);
    }

    #[test]
    fn test_deserialize_rejects_invalid_amounts() {
        #[derive(Deserialize)]
        struct Priced {
            price: Money,
        }

        let priced: Priced = serde_json::from_str(r#"{"price":"1299.50"}"#).unwrap();
        assert_eq!(priced.price.as_minor(), 129_950);

        assert!(serde_json::from_str::<Money>("\"0.001\"").is_err());
        assert!(serde_json::from_str::<Money>("\"-2.00\"").is_err());
        assert!(serde_json::from_str::<Money>("\"twelve\"").is_err());
    }

    #[test]
    fn test_percentage_bounds() {
        assert!(Percentage::new(100).is_ok());
        assert_eq!(
            Percentage::new(101),
            Err(MoneyError::InvalidPercentage(101))
        );
        assert!(serde_json::from_str::<Percentage>("-5").is_err());
        assert_eq!(serde_json::from_str::<Percentage>("25").unwrap().get(), 25);
    }
}
