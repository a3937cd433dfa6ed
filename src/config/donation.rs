//! Donation acceptance settings

use serde::Deserialize;

use crate::domain::donation::DonationPolicy;
use crate::domain::foundation::{Currency, Money};

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct DonationConfig {
    /// Smallest accepted donation, in minor units
    #[serde(default = "default_minimum_amount")]
    pub minimum_amount_minor: i64,

    /// ISO 4217 code used when a request names none
    #[serde(default = "default_currency")]
    pub default_currency: String,

    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// Attempts at recording a pending donation after the gateway accepted it
    #[serde(default = "default_persist_attempts")]
    pub persist_attempts: u32,
}

impl DonationConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.policy().map(|_| ())
    }

    /// Converts the settings into the domain policy.
    pub fn policy(&self) -> Result<DonationPolicy, ValidationError> {
        if self.minimum_amount_minor <= 0 {
            return Err(ValidationError::InvalidMinimumAmount);
        }
        if !(1..=10).contains(&self.persist_attempts) {
            return Err(ValidationError::InvalidPersistAttempts);
        }
        let minimum_amount = Money::from_minor(self.minimum_amount_minor)
            .map_err(|_| ValidationError::InvalidMinimumAmount)?;
        let default_currency = Currency::new(&self.default_currency)
            .map_err(|_| ValidationError::InvalidCurrency(self.default_currency.clone()))?;

        Ok(DonationPolicy {
            minimum_amount,
            default_currency,
            max_message_length: self.max_message_length,
            persist_attempts: self.persist_attempts,
        })
    }
}

impl Default for DonationConfig {
    fn default() -> Self {
        Self {
            minimum_amount_minor: default_minimum_amount(),
            default_currency: default_currency(),
            max_message_length: default_max_message_length(),
            persist_attempts: default_persist_attempts(),
        }
    }
}

fn default_minimum_amount() -> i64 {
    100
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_max_message_length() -> usize {
    1000
}

fn default_persist_attempts() -> u32 {
    3
}
