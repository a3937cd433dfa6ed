//! Webhook domain - authenticity checks and failure semantics for gateway callbacks.

mod errors;
mod verifier;

pub use errors::WebhookError;
pub use verifier::{
    SignatureHeader, WebhookSignatureVerifier, MAX_CLOCK_SKEW_SECS, MAX_EVENT_AGE_SECS,
};
