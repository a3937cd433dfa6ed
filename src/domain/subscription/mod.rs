//! Subscription domain - paid plans, entitlements and the billing lifecycle.

mod aggregate;
mod entitlements;
mod errors;
mod plan;
mod status;

pub use aggregate::{NewSubscription, RenewalOutcome, Subscription};
pub use entitlements::Entitlements;
pub use errors::SubscriptionError;
pub use plan::{BillingInterval, CommissionRate, Plan, ProjectLimit, UNLIMITED_PROJECTS};
pub use status::SubscriptionStatus;
