//! Donation handlers - payment intent creation, webhook confirmation and refunds.

mod create_donation;
mod handle_payment_webhook;
mod process_refund;

pub use create_donation::{CreateDonationCommand, CreateDonationHandler, CreateDonationResult};
pub use handle_payment_webhook::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
};
pub use process_refund::{ProcessRefundCommand, ProcessRefundHandler, ProcessRefundResult};
