//! HTTP handlers for donation endpoints.
//!
//! These handlers connect Axum routes to the donation command handlers.

use axum::body::Bytes;
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::{CreateDonationCommand, HandlePaymentWebhookCommand, ProcessRefundCommand};
use crate::domain::donation::DonationError;
use crate::domain::foundation::{DonationId, ProjectId};
use crate::domain::webhook::WebhookError;

use super::dto::{
    CreateDonationRequest, CreateDonationResponse, RefundDonationRequest, RefundDonationResponse,
    WebhookAck,
};
use crate::adapters::http::error::{ApiError, ErrorResponse};
use crate::adapters::http::middleware::RequireAuth;
use crate::adapters::http::state::AppState;

/// Header carrying the gateway's webhook signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/donations - Start a donation and return the payment client secret
pub async fn create_donation(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<CreateDonationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = CreateDonationCommand {
        donor: user,
        project_id: ProjectId::new(request.project_id)?,
        amount: request.amount,
        currency: request.currency,
        message: request.message,
        anonymous: request.anonymous,
    };

    let result = state.create_donation_handler().handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(CreateDonationResponse::from(result))))
}

/// POST /api/donations/:id/refund - Refund a completed donation (admin only)
///
/// The admin role is read from the session layer's headers; see
/// [`strip_untrusted_identity`](crate::adapters::http::middleware::strip_untrusted_identity).
pub async fn refund_donation(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(donation_id): Path<String>,
    request: Option<Json<RefundDonationRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let donation_id: DonationId = donation_id
        .parse()
        .map_err(|_| DonationError::validation("donation_id", "must be a UUID"))?;
    let request = request.map(|Json(r)| r).unwrap_or_default();

    let cmd = ProcessRefundCommand {
        actor: user,
        donation_id,
        amount: request.amount,
        reason: request.reason,
    };

    let result = state.refund_handler().handle(cmd).await?;

    Ok(Json(RefundDonationResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Handler
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/payments - Handle payment gateway webhook events
///
/// 2xx acknowledges the event, 4xx drops it, 5xx asks the gateway to redeliver.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return webhook_error(WebhookError::MissingField("Stripe-Signature"));
    };

    let cmd = HandlePaymentWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };

    match state.webhook_handler().handle(cmd).await {
        Ok(_) => (StatusCode::OK, Json(WebhookAck { received: true })).into_response(),
        Err(e) => webhook_error(e),
    }
}

fn webhook_error(err: WebhookError) -> Response {
    let code = if err.is_signature_failure() {
        "INVALID_WEBHOOK_SIGNATURE"
    } else if err.is_retryable() {
        "WEBHOOK_RETRY"
    } else {
        "WEBHOOK_REJECTED"
    };
    let message = match &err {
        WebhookError::Database(_) => "Temporary failure".to_string(),
        other => other.to_string(),
    };
    (err.status_code(), Json(ErrorResponse::new(code, message))).into_response()
}
