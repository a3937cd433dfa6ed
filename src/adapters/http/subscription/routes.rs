//! Axum router configuration for subscription endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    cancel, downgrade, get_commission_rate, get_project_quota, list_plans, reactivate, upgrade,
};
use crate::adapters::http::state::AppState;

/// Subscription routes, mounted at `/api/subscription`.
///
/// ## Queries
/// - `GET /project-quota` - Whether another project may be created
/// - `GET /commission-rate` - Commission for the caller's plan
/// - `GET /plans` - Offered plans
///
/// ## Commands
/// - `POST /upgrade` - Subscribe or switch plan immediately
/// - `POST /downgrade` - Switch plan at the next renewal
/// - `POST /cancel` - Cancel the subscription
/// - `POST /reactivate` - Undo a scheduled cancellation
pub fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/project-quota", get(get_project_quota))
        .route("/commission-rate", get(get_commission_rate))
        .route("/plans", get(list_plans))
        .route("/upgrade", post(upgrade))
        .route("/downgrade", post(downgrade))
        .route("/cancel", post(cancel))
        .route("/reactivate", post(reactivate))
}
