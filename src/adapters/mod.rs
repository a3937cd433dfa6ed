//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the core to external systems:
//! - `stripe` - Stripe payment gateway and its test double
//! - `gateway` - decorators for any `PaymentGateway`
//! - `postgres` - PostgreSQL ledger and webhook log
//! - `memory` - in-memory ledger and webhook log for tests and local runs
//! - `notification` - notification sinks
//! - `http` - axum routers

pub mod gateway;
pub mod http;
pub mod memory;
pub mod notification;
pub mod postgres;
pub mod stripe;

pub use gateway::TimeoutPaymentGateway;
pub use memory::{InMemoryLedger, InMemoryWebhookEventRepository};
pub use notification::{LoggingNotificationSink, RecordingNotificationSink};
pub use postgres::{PostgresLedgerStore, PostgresWebhookEventRepository};
pub use stripe::{MockPaymentGateway, StripeConfig, StripePaymentGateway};
