//! In-memory adapters for tests and local development.

mod ledger_store;
mod webhook_event_repository;

pub use ledger_store::InMemoryLedger;
pub use webhook_event_repository::InMemoryWebhookEventRepository;
