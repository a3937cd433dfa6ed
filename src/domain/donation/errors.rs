//! Donation-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | ValidationFailed | 400 |
//! | PaymentDeclined | 402 |
//! | Forbidden | 403 |
//! | ProjectNotFound / DonationNotFound | 404 |
//! | InvalidState / Consistency | 409 |
//! | GatewayUnavailable | 502 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{
    DomainError, DonationId, ErrorCode, ProjectId, ValidationError,
};

/// Message shown to donors for any gateway failure that is not a card decline.
pub const GENERIC_PAYMENT_FAILURE: &str = "payment processing failed";

/// Errors surfaced by donation operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DonationError {
    /// Caller input was rejected.
    ValidationFailed { field: String, message: String },

    /// The target project does not exist (or was deleted).
    ProjectNotFound(ProjectId),

    /// No donation with this id.
    DonationNotFound(DonationId),

    /// The gateway declined the card; the message is safe to show.
    PaymentDeclined { message: String },

    /// The gateway failed for an internal reason (auth, network, rate limit).
    GatewayUnavailable {
        code: String,
        detail: String,
        retryable: bool,
    },

    /// A ledger invariant would have been violated.
    Consistency(String),

    /// The donation is not in a state that allows the operation.
    InvalidState { current: String, attempted: String },

    /// The caller may not perform this operation.
    Forbidden(String),

    /// Storage or other infrastructure failure.
    Infrastructure(String),
}

impl DonationError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DonationError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn project_not_found(id: ProjectId) -> Self {
        DonationError::ProjectNotFound(id)
    }

    pub fn donation_not_found(id: DonationId) -> Self {
        DonationError::DonationNotFound(id)
    }

    pub fn declined(message: impl Into<String>) -> Self {
        DonationError::PaymentDeclined {
            message: message.into(),
        }
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        DonationError::Consistency(message.into())
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        DonationError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        DonationError::Forbidden(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        DonationError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DonationError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            DonationError::ProjectNotFound(_) => ErrorCode::ProjectNotFound,
            DonationError::DonationNotFound(_) => ErrorCode::DonationNotFound,
            DonationError::PaymentDeclined { .. } => ErrorCode::PaymentRequired,
            DonationError::GatewayUnavailable { .. } => ErrorCode::ExternalServiceError,
            DonationError::Consistency(_) => ErrorCode::ConsistencyViolation,
            DonationError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            DonationError::Forbidden(_) => ErrorCode::Forbidden,
            DonationError::Infrastructure(_) => ErrorCode::InternalError,
        }
    }

    /// Returns a caller-safe error message.
    ///
    /// Internal gateway and storage details are never included.
    pub fn message(&self) -> String {
        match self {
            DonationError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            DonationError::ProjectNotFound(id) => format!("Project not found: {}", id),
            DonationError::DonationNotFound(id) => format!("Donation not found: {}", id),
            DonationError::PaymentDeclined { message } => message.clone(),
            DonationError::GatewayUnavailable { .. } => GENERIC_PAYMENT_FAILURE.to_string(),
            DonationError::Consistency(msg) => format!("Ledger consistency check failed: {}", msg),
            DonationError::InvalidState { current, attempted } => {
                format!("Cannot {} a donation in {} state", attempted, current)
            }
            DonationError::Forbidden(msg) => msg.clone(),
            DonationError::Infrastructure(_) => "Internal error".to_string(),
        }
    }

    /// Returns true if the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            DonationError::GatewayUnavailable { retryable, .. } => *retryable,
            DonationError::Infrastructure(_) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DonationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DonationError::GatewayUnavailable { code, detail, .. } => {
                write!(f, "Gateway failure ({}): {}", code, detail)
            }
            DonationError::Infrastructure(msg) => write!(f, "Infrastructure error: {}", msg),
            other => write!(f, "{}", other.message()),
        }
    }
}

impl std::error::Error for DonationError {}

impl From<ValidationError> for DonationError {
    fn from(err: ValidationError) -> Self {
        DonationError::ValidationFailed {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for DonationError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => DonationError::ValidationFailed {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::InvalidStateTransition => DonationError::InvalidState {
                current: "unknown".to_string(),
                attempted: err.message,
            },
            ErrorCode::ConsistencyViolation => DonationError::Consistency(err.message),
            ErrorCode::Forbidden | ErrorCode::Unauthorized => DonationError::Forbidden(err.message),
            _ => DonationError::Infrastructure(err.to_string()),
        }
    }
}

impl From<DonationError> for DomainError {
    fn from(err: DonationError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
