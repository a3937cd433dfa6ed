//! PostgreSQL adapters - Database implementations for the ledger ports.
//!
//! - `PostgresLedgerStore` - donations, project totals, plans and subscriptions
//! - `PostgresWebhookEventRepository` - processed-webhook log
//!
//! The schema lives in `migrations/`.

mod ledger_store;
mod webhook_event_repository;

pub use ledger_store::PostgresLedgerStore;
pub use webhook_event_repository::PostgresWebhookEventRepository;
