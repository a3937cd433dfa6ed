//! Payment gateway configuration

use serde::Deserialize;
use std::time::Duration;

use crate::adapters::stripe::StripeConfig;

use super::error::ValidationError;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key
    pub stripe_api_key: String,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,

    /// Override for the Stripe API root, e.g. a local stripe-mock
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Reject events that Stripe marks as test mode
    #[serde(default)]
    pub require_livemode: bool,

    /// Upper bound on a single gateway call, in seconds
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_secs: u64,
}

impl PaymentConfig {
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    /// Builds the adapter configuration. Secrets move into `SecretString` here.
    pub fn stripe_config(&self) -> StripeConfig {
        let config = StripeConfig::new(&self.stripe_api_key, &self.stripe_webhook_secret)
            .with_require_livemode(self.require_livemode);
        match &self.api_base_url {
            Some(url) => config.with_base_url(url),
            None => config,
        }
    }

    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_WEBHOOK_SECRET"));
        }
        if !self.stripe_api_key.starts_with("sk_") && !self.stripe_api_key.starts_with("rk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if production && !self.is_live_mode() {
            return Err(ValidationError::LiveKeyRequired);
        }
        if self.gateway_timeout_secs == 0 || self.gateway_timeout_secs > 120 {
            return Err(ValidationError::InvalidGatewayTimeout);
        }
        Ok(())
    }
}

fn default_gateway_timeout() -> u64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: &str, secret: &str) -> PaymentConfig {
        PaymentConfig {
            stripe_api_key: key.to_string(),
            stripe_webhook_secret: secret.to_string(),
            api_base_url: None,
            require_livemode: false,
            gateway_timeout_secs: default_gateway_timeout(),
        }
    }

    #[test]
    fn key_prefix_selects_mode() {
        assert!(config("sk_test_xxx", "whsec_xxx").is_test_mode());
        assert!(config("sk_live_xxx", "whsec_xxx").is_live_mode());
    }

    #[test]
    fn missing_secrets_are_reported() {
        assert_eq!(
            config("", "whsec_xxx").validate(false),
            Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"))
        );
        assert_eq!(
            config("sk_test_xxx", "").validate(false),
            Err(ValidationError::MissingRequired("PAYMENT__STRIPE_WEBHOOK_SECRET"))
        );
    }

    #[test]
    fn prefixes_are_checked() {
        assert_eq!(
            config("pk_test_xxx", "whsec_xxx").validate(false),
            Err(ValidationError::InvalidStripeKey)
        );
        assert_eq!(
            config("sk_test_xxx", "secret").validate(false),
            Err(ValidationError::InvalidStripeWebhookSecret)
        );
    }

    #[test]
    fn production_needs_live_key() {
        assert_eq!(
            config("sk_test_xxx", "whsec_xxx").validate(true),
            Err(ValidationError::LiveKeyRequired)
        );
        assert!(config("sk_live_xxx", "whsec_xxx").validate(true).is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut cfg = config("sk_test_xxx", "whsec_xxx");
        cfg.gateway_timeout_secs = 0;
        assert_eq!(cfg.validate(false), Err(ValidationError::InvalidGatewayTimeout));
    }

    #[test]
    fn debug_output_of_adapter_config_hides_secrets() {
        let rendered = format!("{:?}", config("sk_test_abc", "whsec_def").stripe_config());
        assert!(!rendered.contains("sk_test_abc"));
        assert!(!rendered.contains("whsec_def"));
    }
}
