//! Subscription HTTP module - plan gating queries and plan changes.

pub mod dto;
mod handlers;
mod routes;

pub use routes::subscription_routes;
