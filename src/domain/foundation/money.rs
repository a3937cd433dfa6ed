//! Monetary value objects.
//!
//! Amounts are held as integer minor units (cents). Every supported currency
//! is assumed to have two minor digits; conversion between currencies is
//! not performed anywhere in the ledger.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// Number of minor units per major unit.
const MINOR_UNITS_PER_MAJOR: i64 = 100;

/// A non-negative amount of money in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Money(i64);

impl Money {
    /// Zero amount.
    pub const ZERO: Money = Money(0);

    /// Creates an amount from minor units, rejecting negatives.
    pub fn from_minor(minor: i64) -> Result<Self, ValidationError> {
        if minor < 0 {
            return Err(ValidationError::out_of_range("amount", 0, i64::MAX, minor));
        }
        Ok(Self(minor))
    }

    /// Converts a decimal major-unit amount (e.g. `12.50`).
    ///
    /// Rejects negative amounts and more than two fractional digits.
    pub fn from_decimal(amount: Decimal) -> Result<Self, ValidationError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(ValidationError::invalid_format(
                "amount",
                "amount cannot be negative",
            ));
        }
        let minor = amount
            .checked_mul(Decimal::from(MINOR_UNITS_PER_MAJOR))
            .ok_or_else(|| ValidationError::invalid_format("amount", "amount is too large"))?;
        if !minor.fract().is_zero() {
            return Err(ValidationError::invalid_format(
                "amount",
                "at most two decimal places are allowed",
            ));
        }
        let minor = minor.to_i64().ok_or_else(|| {
            ValidationError::invalid_format("amount", "amount is too large")
        })?;
        Ok(Self(minor))
    }

    /// Returns the amount in minor units.
    pub fn as_minor(&self) -> i64 {
        self.0
    }

    /// Returns the amount in major units.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Subtracts, returning `None` if the result would be negative.
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        match self.0.checked_sub(other.0) {
            Some(v) if v >= 0 => Some(Money(v)),
            _ => None,
        }
    }
}

impl TryFrom<i64> for Money {
    type Error = ValidationError;

    fn try_from(minor: i64) -> Result<Self, Self::Error> {
        Money::from_minor(minor)
    }
}

impl From<Money> for i64 {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

/// ISO-4217 currency code, normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Parses a three-letter currency code.
    pub fn new(code: impl AsRef<str>) -> Result<Self, ValidationError> {
        let code = code.as_ref().trim();
        if code.is_empty() {
            return Err(ValidationError::empty_field("currency"));
        }
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::invalid_format(
                "currency",
                format!("'{}' is not a three-letter ISO code", code),
            ));
        }
        Ok(Self(code.to_ascii_lowercase()))
    }

    /// US dollars.
    pub fn usd() -> Self {
        Self("usd".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
