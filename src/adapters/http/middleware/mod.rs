//! HTTP middleware for axum.
//!
//! - `auth` - caller identity extractors and the trusted proxy gate

pub mod auth;

pub use auth::{
    strip_untrusted_identity, AuthRejection, RequireAuth, TrustedProxy, PROXY_SECRET_HEADER,
    USER_ID_HEADER, USER_ROLE_HEADER,
};
