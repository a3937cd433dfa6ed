//! Ports - Interfaces for external collaborators.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the core and the outside world. Adapters implement these ports.
//!
//! - `LedgerStore` / `LedgerTransaction` - donations, project totals, subscriptions
//! - `ProjectDirectory` - project lookup owned by the external CRUD
//! - `PaymentGateway` - payment intents, refunds, webhooks, subscriptions
//! - `NotificationSink` - fire-and-forget user notices
//! - `WebhookEventRepository` - log of gateway events already handled

mod ledger_store;
mod notification_sink;
mod payment_gateway;
mod project_directory;
mod webhook_event_repository;

pub use ledger_store::{LedgerStore, LedgerTransaction};
pub use notification_sink::{NotificationSink, SubscriptionNotice};
pub use payment_gateway::{
    CreateSubscriptionRequest, GatewayError, GatewayErrorCode, GatewaySubscription,
    GatewaySubscriptionStatus, PaymentGateway, PaymentIntent, PaymentIntentRequest, Proration,
    Refund, RefundRequest, UpdateSubscriptionRequest, WebhookEvent, WebhookEventData,
    WebhookEventType,
};
pub use project_directory::ProjectDirectory;
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome,
};
