//! Subscription handlers - plan gating, plan changes and billing events.

mod can_create_project;
mod cancel_subscription;
mod downgrade_subscription;
mod end_subscription;
mod get_commission_rate;
mod handle_failed_payment;
mod list_plans;
mod process_renewal;
mod reactivate_subscription;
mod shared;
mod upgrade_subscription;

#[cfg(test)]
mod fixtures;

pub use can_create_project::{CanCreateProjectHandler, CanCreateProjectQuery, CanCreateProjectResult};
pub use cancel_subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
};
pub use downgrade_subscription::{
    DowngradeSubscriptionCommand, DowngradeSubscriptionHandler, DowngradeSubscriptionResult,
};
pub use end_subscription::{EndSubscriptionCommand, EndSubscriptionHandler, EndSubscriptionResult};
pub use get_commission_rate::{
    GetCommissionRateHandler, GetCommissionRateQuery, GetCommissionRateResult,
};
pub use handle_failed_payment::{
    HandleFailedPaymentCommand, HandleFailedPaymentHandler, HandleFailedPaymentResult,
};
pub use list_plans::ListPlansHandler;
pub use process_renewal::{ProcessRenewalCommand, ProcessRenewalHandler, ProcessRenewalResult};
pub use reactivate_subscription::{
    ReactivateSubscriptionCommand, ReactivateSubscriptionHandler, ReactivateSubscriptionResult,
};
pub use upgrade_subscription::{
    UpgradeSubscriptionCommand, UpgradeSubscriptionHandler, UpgradeSubscriptionResult,
};
