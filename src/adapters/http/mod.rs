//! HTTP adapters - REST API over the donation and subscription handlers.
//!
//! The routers are a thin surface: identity comes from headers set by the
//! session layer, bodies map onto commands, and errors render as
//! `{code, message}`.

pub mod donation;
pub mod error;
pub mod middleware;
pub mod state;
pub mod subscription;

use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ErrorResponse};
pub use state::AppState;

use donation::{donation_routes, webhook_routes};
use subscription::subscription_routes;

/// Cross-cutting HTTP settings.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub cors_origins: Vec<String>,
    pub request_timeout: Duration,
    /// When set, identity headers are only honoured alongside this secret.
    pub trusted_proxy_secret: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            request_timeout: Duration::from_secs(30),
            trusted_proxy_secret: None,
        }
    }
}

/// Routes without middleware, for mounting under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/donations", donation_routes())
        .nest("/webhooks", webhook_routes())
        .nest("/subscription", subscription_routes())
}

/// Complete application router with tracing, CORS, request timeout and,
/// when configured, the trusted proxy gate.
pub fn app_router(state: AppState, settings: &HttpSettings) -> Router {
    let router = Router::new().nest("/api", api_routes()).with_state(state);
    let router = match settings.trusted_proxy_secret.as_deref() {
        Some(secret) => router.layer(axum::middleware::from_fn_with_state(
            middleware::TrustedProxy::new(secret),
            middleware::strip_untrusted_identity,
        )),
        None => router,
    };

    router
        .layer(TimeoutLayer::new(settings.request_timeout))
        .layer(cors_layer(&settings.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-user-role"),
        ])
}
