//! Axum router configuration for donation endpoints.

use axum::{routing::post, Router};

use super::handlers::{create_donation, handle_payment_webhook, refund_donation};
use crate::adapters::http::state::AppState;

/// Donation routes, mounted at `/api/donations`.
///
/// - `POST /` - Start a donation
/// - `POST /:id/refund` - Refund a donation (admin only)
pub fn donation_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_donation))
        .route("/:id/refund", post(refund_donation))
}

/// Webhook routes, mounted at `/api/webhooks`.
///
/// Separate from the donation routes because webhooks carry no user
/// identity; they are verified via signature.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/payments", post(handle_payment_webhook))
}
