//! HTTP error rendering shared by the donation and subscription routers.
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | ValidationFailed | 400 |
//! | PaymentDeclined | 402 |
//! | Forbidden | 403 |
//! | *NotFound | 404 |
//! | InvalidState / Consistency | 409 |
//! | GatewayUnavailable | 502 |
//! | Infrastructure | 500 |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::donation::DonationError;
use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};
use crate::domain::subscription::SubscriptionError;

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable code, e.g. `VALIDATION_FAILED`.
    pub code: String,
    /// Caller-safe description.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// API error type that converts operation errors to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    Donation(DonationError),
    Subscription(SubscriptionError),
}

impl ApiError {
    fn code(&self) -> ErrorCode {
        match self {
            ApiError::Donation(e) => e.code(),
            ApiError::Subscription(e) => e.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Donation(e) => e.message(),
            ApiError::Subscription(e) => e.message(),
        }
    }

    pub fn status(&self) -> StatusCode {
        status_for(self.code())
    }
}

/// Maps an error code to the status the API reports for it.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::ValidationFailed
        | ErrorCode::EmptyField
        | ErrorCode::OutOfRange
        | ErrorCode::InvalidFormat => StatusCode::BAD_REQUEST,

        ErrorCode::PaymentRequired | ErrorCode::PaymentFailed => StatusCode::PAYMENT_REQUIRED,

        ErrorCode::Unauthorized | ErrorCode::InvalidWebhookSignature => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,

        ErrorCode::NotFound
        | ErrorCode::ProjectNotFound
        | ErrorCode::DonationNotFound
        | ErrorCode::SubscriptionNotFound
        | ErrorCode::PlanNotFound => StatusCode::NOT_FOUND,

        ErrorCode::InvalidStateTransition
        | ErrorCode::ConsistencyViolation
        | ErrorCode::DuplicateSubscription => StatusCode::CONFLICT,

        ErrorCode::ExternalServiceError => StatusCode::BAD_GATEWAY,
        ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,

        ErrorCode::DatabaseError | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DonationError> for ApiError {
    fn from(err: DonationError) -> Self {
        ApiError::Donation(err)
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        ApiError::Subscription(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Donation(DonationError::from(err))
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Donation(DonationError::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            // Internal detail goes to the log, never to the caller.
            match &self {
                ApiError::Donation(e) => tracing::error!(error = %e, "Request failed"),
                ApiError::Subscription(e) => tracing::error!(error = %e, "Request failed"),
            }
        }

        let body = ErrorResponse::new(self.code().to_string(), self.message());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{DonationId, PlanId, ProjectId, UserId};

    fn status(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn validation_maps_to_400() {
        assert_eq!(
            status(DonationError::validation("amount", "too small")),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn decline_maps_to_402() {
        assert_eq!(
            status(DonationError::declined("Your card was declined.")),
            StatusCode::PAYMENT_REQUIRED
        );
    }

    #[test]
    fn forbidden_maps_to_403() {
        assert_eq!(status(DonationError::forbidden("admins only")), StatusCode::FORBIDDEN);
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(
            status(DonationError::project_not_found(ProjectId::new(9).unwrap())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(DonationError::donation_not_found(DonationId::new())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(SubscriptionError::plan_not_found(PlanId::new(3).unwrap())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(SubscriptionError::not_found(UserId::new("u").unwrap())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn state_conflicts_map_to_409() {
        assert_eq!(
            status(DonationError::invalid_state("failed", "refund")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(SubscriptionError::consistency("row moved")),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn gateway_outage_maps_to_502() {
        let err = DonationError::GatewayUnavailable {
            code: "network".to_string(),
            detail: "connection reset".to_string(),
            retryable: true,
        };
        assert_eq!(status(err), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn infrastructure_maps_to_500() {
        assert_eq!(
            status(SubscriptionError::infrastructure("pool timed out")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn body_hides_internal_detail() {
        let response = ApiError::from(DonationError::infrastructure("password=hunter2")).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert_eq!(body["message"], "Internal error");
    }
}
