//! Input rules applied before a donation reaches the gateway.

use rust_decimal::Decimal;

use crate::domain::foundation::{Currency, Money};

use super::DonationError;

/// Donation acceptance rules, built from configuration.
#[derive(Debug, Clone)]
pub struct DonationPolicy {
    pub minimum_amount: Money,
    pub default_currency: Currency,
    pub max_message_length: usize,
    /// How many times the pending row insert is attempted after the gateway succeeded.
    pub persist_attempts: u32,
}

impl Default for DonationPolicy {
    fn default() -> Self {
        Self {
            minimum_amount: Money::from_minor(100).unwrap_or(Money::ZERO),
            default_currency: Currency::usd(),
            max_message_length: 1000,
            persist_attempts: 3,
        }
    }
}

impl DonationPolicy {
    /// Converts and checks the requested amount.
    pub fn validate_amount(&self, amount: Decimal) -> Result<Money, DonationError> {
        let money = Money::from_decimal(amount)?;
        if money < self.minimum_amount {
            return Err(DonationError::validation(
                "amount",
                format!("minimum donation is {}", self.minimum_amount),
            ));
        }
        Ok(money)
    }

    /// Resolves the currency, falling back to the configured default.
    pub fn resolve_currency(&self, currency: Option<&str>) -> Result<Currency, DonationError> {
        match currency {
            Some(code) if !code.trim().is_empty() => Ok(Currency::new(code)?),
            _ => Ok(self.default_currency.clone()),
        }
    }

    /// Trims the message; blank messages become `None`.
    pub fn normalize_message(&self, message: Option<String>) -> Result<Option<String>, DonationError> {
        let Some(message) = message else {
            return Ok(None);
        };
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if trimmed.chars().count() > self.max_message_length {
            return Err(DonationError::validation(
                "message",
                format!("must be at most {} characters", self.max_message_length),
            ));
        }
        Ok(Some(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn below_minimum_is_rejected() {
        let policy = DonationPolicy::default();
        let err = policy.validate_amount(Decimal::from_str("0.99").unwrap()).unwrap_err();
        assert!(matches!(err, DonationError::ValidationFailed { ref field, .. } if field == "amount"));
    }

    #[test]
    fn exactly_minimum_is_accepted() {
        let policy = DonationPolicy::default();
        let money = policy.validate_amount(Decimal::from_str("1.00").unwrap()).unwrap();
        assert_eq!(money.as_minor(), 100);
    }

    #[test]
    fn sub_cent_amount_is_rejected() {
        let policy = DonationPolicy::default();
        assert!(policy.validate_amount(Decimal::from_str("10.001").unwrap()).is_err());
    }

    #[test]
    fn missing_currency_uses_default() {
        let policy = DonationPolicy::default();
        assert_eq!(policy.resolve_currency(None).unwrap(), Currency::usd());
        assert_eq!(policy.resolve_currency(Some("  ")).unwrap(), Currency::usd());
        assert_eq!(policy.resolve_currency(Some("EUR")).unwrap().as_str(), "eur");
    }

    #[test]
    fn malformed_currency_is_rejected() {
        let policy = DonationPolicy::default();
        assert!(policy.resolve_currency(Some("dollars")).is_err());
    }

    #[test]
    fn long_message_is_rejected() {
        let policy = DonationPolicy {
            max_message_length: 5,
            ..DonationPolicy::default()
        };
        assert!(policy.normalize_message(Some("too long".to_string())).is_err());
        assert_eq!(
            policy.normalize_message(Some(" hi ".to_string())).unwrap(),
            Some("hi".to_string())
        );
        assert_eq!(policy.normalize_message(Some("   ".to_string())).unwrap(), None);
    }
}
