use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Sub};

/// A monetary amount, fixed at two decimal places.
///
/// Storage keeps amounts as integer cents; this type is the domain-side view.
/// On the wire it serializes as a plain JSON number (`1500.75`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::from(cents) / Decimal::from(100))
    }

    pub fn to_cents(self) -> i64 {
        (self.0 * Decimal::from(100)).round().to_i64().unwrap_or(0)
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal.round_dp(2))
    }

    pub fn to_decimal(self) -> Decimal {
        self.0
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0.to_f64().unwrap_or(0.0))
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Decimal::from_f64(value)
            .map(|d| Money(d.round_dp(2)))
            .ok_or_else(|| D::Error::custom(format!("invalid monetary amount: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_round_trip() {
        assert_eq!(Money::from_cents(150075).to_cents(), 150075);
        assert_eq!(Money::from_cents(-32000).to_cents(), -32000);
        assert_eq!(Money::from_cents(1).to_cents(), 1);
    }

    #[test]
    fn display_two_places() {
        assert_eq!(Money::from_cents(150075).to_string(), "1500.75");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
    }

    #[test]
    fn abs_strips_sign() {
        assert_eq!(Money::from_cents(-32000).abs(), Money::from_cents(32000));
        assert!(!Money::from_cents(-32000).abs().is_negative());
    }

    #[test]
    fn serializes_as_number() {
        let json = serde_json::to_string(&Money::from_cents(150075)).unwrap();
        assert_eq!(json, "1500.75");
    }

    #[test]
    fn deserializes_from_number() {
        let m: Money = serde_json::from_str("320.0").unwrap();
        assert_eq!(m, Money::from_cents(32000));
    }

    #[test]
    fn arithmetic() {
        let sum = Money::from_cents(100) + Money::from_cents(250);
        assert_eq!(sum, Money::from_cents(350));
        let diff = Money::from_cents(100) - Money::from_cents(250);
        assert!(diff.is_negative());
    }
}
