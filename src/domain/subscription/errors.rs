//! Subscription-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | ValidationFailed | 400 |
//! | PaymentDeclined | 402 |
//! | SubscriptionNotFound / PlanNotFound | 404 |
//! | InvalidState / Consistency | 409 |
//! | GatewayUnavailable | 502 |
//! | Infrastructure | 500 |

use crate::domain::donation::GENERIC_PAYMENT_FAILURE;
use crate::domain::foundation::{DomainError, ErrorCode, PlanId, UserId, ValidationError};

/// Errors surfaced by subscription operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    ValidationFailed { field: String, message: String },

    /// The user has no current subscription.
    SubscriptionNotFound(UserId),

    /// The plan does not exist or is no longer offered.
    PlanNotFound(PlanId),

    PaymentDeclined { message: String },

    GatewayUnavailable {
        code: String,
        detail: String,
        retryable: bool,
    },

    Consistency(String),

    InvalidState { current: String, attempted: String },

    Infrastructure(String),
}

impl SubscriptionError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SubscriptionError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(user_id: UserId) -> Self {
        SubscriptionError::SubscriptionNotFound(user_id)
    }

    pub fn plan_not_found(plan_id: PlanId) -> Self {
        SubscriptionError::PlanNotFound(plan_id)
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        SubscriptionError::Consistency(message.into())
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        SubscriptionError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        SubscriptionError::Infrastructure(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SubscriptionError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            SubscriptionError::SubscriptionNotFound(_) => ErrorCode::SubscriptionNotFound,
            SubscriptionError::PlanNotFound(_) => ErrorCode::PlanNotFound,
            SubscriptionError::PaymentDeclined { .. } => ErrorCode::PaymentRequired,
            SubscriptionError::GatewayUnavailable { .. } => ErrorCode::ExternalServiceError,
            SubscriptionError::Consistency(_) => ErrorCode::ConsistencyViolation,
            SubscriptionError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            SubscriptionError::Infrastructure(_) => ErrorCode::InternalError,
        }
    }

    pub fn message(&self) -> String {
        match self {
            SubscriptionError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            SubscriptionError::SubscriptionNotFound(user_id) => {
                format!("No subscription found for user: {}", user_id)
            }
            SubscriptionError::PlanNotFound(id) => format!("Plan not found: {}", id),
            SubscriptionError::PaymentDeclined { message } => message.clone(),
            SubscriptionError::GatewayUnavailable { .. } => GENERIC_PAYMENT_FAILURE.to_string(),
            SubscriptionError::Consistency(msg) => {
                format!("Subscription consistency check failed: {}", msg)
            }
            SubscriptionError::InvalidState { current, attempted } => {
                format!("Cannot {} a subscription in {} state", attempted, current)
            }
            SubscriptionError::Infrastructure(_) => "Internal error".to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SubscriptionError::GatewayUnavailable { retryable, .. } => *retryable,
            SubscriptionError::Infrastructure(_) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionError::GatewayUnavailable { code, detail, .. } => {
                write!(f, "Gateway failure ({}): {}", code, detail)
            }
            SubscriptionError::Infrastructure(msg) => write!(f, "Infrastructure error: {}", msg),
            other => write!(f, "{}", other.message()),
        }
    }
}

impl std::error::Error for SubscriptionError {}

impl From<ValidationError> for SubscriptionError {
    fn from(err: ValidationError) -> Self {
        SubscriptionError::ValidationFailed {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for SubscriptionError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => SubscriptionError::ValidationFailed {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::ConsistencyViolation | ErrorCode::DuplicateSubscription => {
                SubscriptionError::Consistency(err.message)
            }
            ErrorCode::InvalidStateTransition => SubscriptionError::InvalidState {
                current: "unknown".to_string(),
                attempted: err.message,
            },
            _ => SubscriptionError::Infrastructure(err.to_string()),
        }
    }
}

impl From<SubscriptionError> for DomainError {
    fn from(err: SubscriptionError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_variants() {
        assert_eq!(
            SubscriptionError::plan_not_found(PlanId::new(3).unwrap()).code(),
            ErrorCode::PlanNotFound
        );
        assert_eq!(
            SubscriptionError::not_found(UserId::new("u").unwrap()).code(),
            ErrorCode::SubscriptionNotFound
        );
        assert_eq!(
            SubscriptionError::validation("plan_id", "x").code(),
            ErrorCode::ValidationFailed
        );
    }

    #[test]
    fn gateway_failure_message_is_generic() {
        let err = SubscriptionError::GatewayUnavailable {
            code: "api_error".to_string(),
            detail: "upstream 500".to_string(),
            retryable: true,
        };
        assert_eq!(err.message(), GENERIC_PAYMENT_FAILURE);
        assert!(err.is_retryable());
    }

    #[test]
    fn duplicate_subscription_maps_to_consistency() {
        let err: SubscriptionError =
            DomainError::new(ErrorCode::DuplicateSubscription, "already subscribed").into();
        assert!(matches!(err, SubscriptionError::Consistency(_)));
    }

    #[test]
    fn converts_to_domain_error() {
        let domain: DomainError = SubscriptionError::invalid_state("cancelled", "renew").into();
        assert_eq!(domain.code, ErrorCode::InvalidStateTransition);
        assert!(domain.message.contains("cancelled"));
    }
}
