//! Donation HTTP module - donation start, refunds and the gateway webhook.

pub mod dto;
mod handlers;
mod routes;

pub use handlers::SIGNATURE_HEADER;
pub use routes::{donation_routes, webhook_routes};
