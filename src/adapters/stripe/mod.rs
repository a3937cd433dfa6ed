//! Stripe payment gateway adapter.
//!
//! Implements the `PaymentGateway` port for Stripe:
//! - Payment intents and refunds for donations
//! - Subscription create, update, cancel and resume
//! - Webhook signature verification and event parsing
//!
//! `MockPaymentGateway` parses the same wire format for tests.

mod mock_payment_gateway;
mod stripe_gateway;
mod webhook_types;

pub use mock_payment_gateway::{MethodCall, MockPaymentGateway};
pub use stripe_gateway::{StripeConfig, StripePaymentGateway};
pub use webhook_types::{map_api_error, parse_event, StripeInvoice, StripeSubscription, StripeWebhookEvent};
