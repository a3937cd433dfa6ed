//! Webhook error types.
//!
//! Status codes drive the gateway's redelivery: 2xx acknowledges, 4xx is
//! final, 5xx is retried.

use http::StatusCode;
use thiserror::Error;

/// Errors that occur while verifying or applying a gateway webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature did not match the shared secret.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signature timestamp is older than the replay window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signature timestamp is in the future beyond the allowed skew.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Signature header or JSON payload could not be parsed.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required field missing from the event payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// No donation matches the payment reference. The local write may not have committed yet.
    #[error("Donation not found for payment {0}")]
    DonationNotFound(String),

    /// No subscription matches the gateway subscription reference.
    #[error("Subscription not found for {0}")]
    SubscriptionNotFound(String),

    /// Storage failed while applying the event.
    #[error("Database error: {0}")]
    Database(String),
}

impl WebhookError {
    /// Returns true if the gateway should redeliver this event.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::DonationNotFound(_)
                | WebhookError::SubscriptionNotFound(_)
                | WebhookError::Database(_)
        )
    }

    /// Returns true if the failure is about authenticity rather than content.
    pub fn is_signature_failure(&self) -> bool {
        matches!(
            self,
            WebhookError::InvalidSignature
                | WebhookError::TimestampOutOfRange
                | WebhookError::InvalidTimestamp
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature | WebhookError::TimestampOutOfRange => {
                StatusCode::UNAUTHORIZED
            }

            WebhookError::InvalidTimestamp
            | WebhookError::ParseError(_)
            | WebhookError::MissingField(_) => StatusCode::BAD_REQUEST,

            WebhookError::DonationNotFound(_)
            | WebhookError::SubscriptionNotFound(_)
            | WebhookError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_failures_are_unauthorized_and_final() {
        for err in [WebhookError::InvalidSignature, WebhookError::TimestampOutOfRange] {
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
            assert!(!err.is_retryable());
            assert!(err.is_signature_failure());
        }
    }

    #[test]
    fn missing_donation_is_retried() {
        let err = WebhookError::DonationNotFound("pi_123".to_string());
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Donation not found for payment pi_123");
    }

    #[test]
    fn malformed_payload_is_bad_request() {
        let err = WebhookError::ParseError("expected value".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_retryable());
        assert!(!err.is_signature_failure());
    }

    #[test]
    fn database_errors_are_retried() {
        let err = WebhookError::Database("connection refused".to_string());
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
