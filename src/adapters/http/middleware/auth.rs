//! Caller identity extractors for axum.
//!
//! Session handling happens in front of this service. The session layer
//! forwards the signed-in user as two headers:
//!
//! - `X-User-Id` - the user identifier (required)
//! - `X-User-Role` - `member` or `admin` (optional, defaults to `member`)
//!
//! These headers are only trustworthy when they come from that layer. With a
//! trusted proxy secret configured, [`strip_untrusted_identity`] drops both
//! headers from any request that does not carry the secret in
//! `X-Proxy-Secret`, so a client talking to the service directly cannot claim
//! to be an admin. Production refuses to start without the secret.
//!
//! # Example
//!
//! ```ignore
//! async fn my_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
//!     format!("Hello, {}!", user.id)
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::domain::foundation::{AuthenticatedUser, UserId, UserRole};

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Header carrying the caller's role.
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Header carrying the secret shared with the session layer.
pub const PROXY_SECRET_HEADER: &str = "X-Proxy-Secret";

/// Secret the session layer attaches to every request it forwards.
#[derive(Clone)]
pub struct TrustedProxy {
    secret: Arc<str>,
}

impl TrustedProxy {
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn vouches_for(&self, parts: &Parts) -> bool {
        parts
            .headers
            .get(PROXY_SECRET_HEADER)
            .map(|value| bool::from(value.as_bytes().ct_eq(self.secret.as_bytes())))
            .unwrap_or(false)
    }
}

impl fmt::Debug for TrustedProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustedProxy")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Middleware removing caller identity that did not come through the session layer.
///
/// The proxy secret header itself is always removed before the request
/// reaches a handler.
pub async fn strip_untrusted_identity(
    State(proxy): State<TrustedProxy>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    if !proxy.vouches_for(&parts) {
        if parts.headers.contains_key(USER_ID_HEADER) || parts.headers.contains_key(USER_ROLE_HEADER) {
            tracing::warn!(
                uri = %parts.uri,
                "Dropping caller identity from request without proxy secret"
            );
        }
        parts.headers.remove(USER_ID_HEADER);
        parts.headers.remove(USER_ROLE_HEADER);
    }
    parts.headers.remove(PROXY_SECRET_HEADER);
    next.run(Request::from_parts(parts, body)).await
}

/// Extractor that requires an identified caller.
///
/// Returns 401 Unauthorized if the user id header is missing or blank, or
/// if the role header carries an unknown role.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthenticatedUser);

impl<S> axum::extract::FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move { caller_from_parts(parts).map(RequireAuth) })
    }
}

fn caller_from_parts(parts: &Parts) -> Result<AuthenticatedUser, AuthRejection> {
    let id = parts
        .headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| UserId::new(s.trim()).ok())
        .ok_or(AuthRejection::Unauthenticated)?;

    let role = match parts.headers.get(USER_ROLE_HEADER) {
        None => UserRole::Member,
        Some(value) => match value.to_str().map(|s| s.trim().to_ascii_lowercase()) {
            Ok(role) if role == "member" => UserRole::Member,
            Ok(role) if role == "admin" => UserRole::Admin,
            _ => return Err(AuthRejection::InvalidRole),
        },
    };

    Ok(AuthenticatedUser { id, role })
}

/// Rejection type for identity failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRejection {
    /// No user id was forwarded.
    Unauthenticated,

    /// The role header carried something other than `member` or `admin`.
    InvalidRole,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let message = match self {
            AuthRejection::Unauthenticated => "Authentication required",
            AuthRejection::InvalidRole => "Unrecognised user role",
        };

        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "code": "UNAUTHORIZED",
                "message": message
            })),
        )
            .into_response()
    }
}
