//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Each handler owns its ledger transaction: gateway first, ledger second,
//! notifications last.

pub mod handlers;

pub use handlers::donation::{
    CreateDonationCommand, CreateDonationHandler, CreateDonationResult,
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
    ProcessRefundCommand, ProcessRefundHandler, ProcessRefundResult,
};
pub use handlers::subscription::{
    CanCreateProjectHandler, CanCreateProjectQuery, CanCreateProjectResult,
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
    DowngradeSubscriptionCommand, DowngradeSubscriptionHandler, DowngradeSubscriptionResult,
    EndSubscriptionCommand, EndSubscriptionHandler, EndSubscriptionResult,
    GetCommissionRateHandler, GetCommissionRateQuery, GetCommissionRateResult,
    HandleFailedPaymentCommand, HandleFailedPaymentHandler, HandleFailedPaymentResult,
    ListPlansHandler, ProcessRenewalCommand, ProcessRenewalHandler, ProcessRenewalResult,
    ReactivateSubscriptionCommand, ReactivateSubscriptionHandler, ReactivateSubscriptionResult,
    UpgradeSubscriptionCommand, UpgradeSubscriptionHandler, UpgradeSubscriptionResult,
};
