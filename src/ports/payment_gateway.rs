//! Payment gateway port.
//!
//! Every provider-specific call (payment intents, refunds, webhook
//! verification, subscription management) goes through this trait so the
//! core can run against a mock and the provider can be swapped.
//!
//! # Design
//!
//! - **Gateway first**: callers only touch the ledger after the gateway confirmed
//! - **Idempotent**: every mutating request carries an idempotency key
//! - **Caller-safe errors**: `GatewayError::user_message` never leaks internal detail

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::donation::{DonationError, GENERIC_PAYMENT_FAILURE};
use crate::domain::foundation::{Currency, DomainError, ErrorCode, Money, UserId};
use crate::domain::subscription::SubscriptionError;
use crate::domain::webhook::WebhookError;

/// Port for payment gateway integrations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent the donor completes on the client side.
    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Refunds part or all of a confirmed payment.
    async fn refund(&self, request: RefundRequest) -> Result<Refund, GatewayError>;

    /// Verifies a webhook signature and parses the event.
    ///
    /// The shared secret is part of the gateway's configuration.
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, WebhookError>;

    /// Creates a subscription for a user who has none.
    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<GatewaySubscription, GatewayError>;

    /// Swaps the plan of an existing subscription.
    async fn update_subscription(
        &self,
        request: UpdateSubscriptionRequest,
    ) -> Result<GatewaySubscription, GatewayError>;

    /// Cancels a subscription now, or at the end of the current period.
    async fn cancel_subscription(
        &self,
        subscription_ref: &str,
        at_period_end: bool,
    ) -> Result<GatewaySubscription, GatewayError>;

    /// Clears a scheduled cancellation.
    async fn resume_subscription(
        &self,
        subscription_ref: &str,
    ) -> Result<GatewaySubscription, GatewayError>;
}

/// Request to create a payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentRequest {
    pub amount: Money,
    pub currency: Currency,
    pub description: String,
    /// Echoed back on every webhook for this payment.
    pub metadata: BTreeMap<String, String>,
    pub idempotency_key: String,
}

/// A payment intent issued by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Gateway payment reference.
    pub id: String,
    /// Secret the client uses to confirm the payment.
    pub client_secret: String,
}

/// Request to refund a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub payment_ref: String,
    pub amount: Money,
    pub reason: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub idempotency_key: String,
}

/// A refund accepted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub amount: Money,
    pub status: String,
}

/// Request to start a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub user_id: UserId,
    /// Gateway price identifier of the plan.
    pub price_ref: String,
    /// Payment method collected by the client.
    pub payment_method_ref: String,
    pub idempotency_key: String,
}

/// How the gateway bills a mid-cycle plan change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Proration {
    /// Charge or credit the difference right away.
    Immediate,
    /// No adjustment; the new price applies from the next cycle.
    None,
}

impl Proration {
    pub fn as_provider_str(&self) -> &'static str {
        match self {
            Proration::Immediate => "always_invoice",
            Proration::None => "none",
        }
    }
}

/// Request to change the plan of a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSubscriptionRequest {
    pub subscription_ref: String,
    pub price_ref: String,
    pub proration: Proration,
    /// Also clear cancel-at-period-end.
    pub resume: bool,
    pub idempotency_key: String,
}

/// Subscription status as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewaySubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Incomplete,
    Unknown,
}

impl GatewaySubscriptionStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => GatewaySubscriptionStatus::Active,
            "trialing" => GatewaySubscriptionStatus::Trialing,
            "past_due" | "unpaid" => GatewaySubscriptionStatus::PastDue,
            "canceled" | "incomplete_expired" => GatewaySubscriptionStatus::Canceled,
            "incomplete" => GatewaySubscriptionStatus::Incomplete,
            _ => GatewaySubscriptionStatus::Unknown,
        }
    }
}

/// Subscription object returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySubscription {
    pub id: String,
    pub status: GatewaySubscriptionStatus,
    /// Unix seconds.
    pub current_period_start: i64,
    /// Unix seconds.
    pub current_period_end: i64,
    pub cancel_at_period_end: bool,
}

/// Verified webhook event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from the gateway.
    pub id: String,
    pub event_type: WebhookEventType,
    pub data: WebhookEventData,
    /// Unix seconds.
    pub created_at: i64,
    pub livemode: bool,
}

/// Webhook event types the ledger reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    PaymentIntentSucceeded,
    PaymentIntentFailed,
    InvoicePaid,
    InvoicePaymentFailed,
    SubscriptionDeleted,
    Unknown(String),
}

impl WebhookEventType {
    /// Maps the gateway's dotted event name.
    pub fn from_provider(name: &str) -> Self {
        match name {
            "payment_intent.succeeded" => WebhookEventType::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => WebhookEventType::PaymentIntentFailed,
            "invoice.paid" | "invoice.payment_succeeded" => WebhookEventType::InvoicePaid,
            "invoice.payment_failed" => WebhookEventType::InvoicePaymentFailed,
            "customer.subscription.deleted" => WebhookEventType::SubscriptionDeleted,
            other => WebhookEventType::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WebhookEventType::PaymentIntentSucceeded => "payment_intent.succeeded",
            WebhookEventType::PaymentIntentFailed => "payment_intent.payment_failed",
            WebhookEventType::InvoicePaid => "invoice.paid",
            WebhookEventType::InvoicePaymentFailed => "invoice.payment_failed",
            WebhookEventType::SubscriptionDeleted => "customer.subscription.deleted",
            WebhookEventType::Unknown(name) => name,
        }
    }
}

/// Webhook event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WebhookEventData {
    #[serde(rename = "payment_intent")]
    PaymentIntent {
        payment_ref: String,
        amount: i64,
        currency: String,
        failure_message: Option<String>,
        metadata: BTreeMap<String, String>,
    },

    #[serde(rename = "invoice")]
    Invoice {
        invoice_id: String,
        subscription_ref: Option<String>,
        amount_paid: i64,
        currency: String,
        /// End of the paid period (Unix seconds), when the gateway reports it.
        period_end: Option<i64>,
    },

    #[serde(rename = "subscription")]
    Subscription {
        subscription_ref: String,
        status: GatewaySubscriptionStatus,
        current_period_end: Option<i64>,
    },

    #[serde(rename = "raw")]
    Raw { json: String },
}

/// Errors from gateway operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayError {
    pub code: GatewayErrorCode,
    /// Provider message. Only shown to users for card-level declines.
    pub message: String,
    pub provider_code: Option<String>,
    pub retryable: bool,
}

impl GatewayError {
    pub fn new(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::NetworkError, message)
    }

    pub fn timeout(after_secs: u64) -> Self {
        Self::new(
            GatewayErrorCode::Timeout,
            format!("gateway did not respond within {}s", after_secs),
        )
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::AuthenticationError, message)
    }

    pub fn card_declined(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::CardDeclined, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(GatewayErrorCode::NotFound, format!("{} not found", resource))
    }

    /// Returns true for declines the donor can act on.
    pub fn is_card_error(&self) -> bool {
        self.code.is_card_error()
    }

    /// Message safe to show the end user.
    pub fn user_message(&self) -> String {
        if self.is_card_error() {
            self.message.clone()
        } else {
            GENERIC_PAYMENT_FAILURE.to_string()
        }
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl From<GatewayError> for DomainError {
    fn from(err: GatewayError) -> Self {
        let code = if err.is_card_error() {
            ErrorCode::PaymentRequired
        } else if err.code == GatewayErrorCode::RateLimitExceeded {
            ErrorCode::RateLimited
        } else {
            ErrorCode::ExternalServiceError
        };
        DomainError::new(code, err.user_message()).with_detail("gateway_code", err.code.to_string())
    }
}

impl From<GatewayError> for DonationError {
    fn from(err: GatewayError) -> Self {
        if err.is_card_error() {
            DonationError::PaymentDeclined {
                message: err.message,
            }
        } else {
            DonationError::GatewayUnavailable {
                code: err.code.to_string(),
                detail: err.message,
                retryable: err.retryable,
            }
        }
    }
}

impl From<GatewayError> for SubscriptionError {
    fn from(err: GatewayError) -> Self {
        if err.is_card_error() {
            SubscriptionError::PaymentDeclined {
                message: err.message,
            }
        } else {
            SubscriptionError::GatewayUnavailable {
                code: err.code.to_string(),
                detail: err.message,
                retryable: err.retryable,
            }
        }
    }
}

/// Gateway error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorCode {
    NetworkError,
    Timeout,
    AuthenticationError,
    CardDeclined,
    InsufficientFunds,
    CardExpired,
    InvalidCard,
    InvalidRequest,
    NotFound,
    RateLimitExceeded,
    ProviderError,
    Unknown,
}

impl GatewayErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayErrorCode::NetworkError
                | GatewayErrorCode::Timeout
                | GatewayErrorCode::RateLimitExceeded
        )
    }

    pub fn is_card_error(&self) -> bool {
        matches!(
            self,
            GatewayErrorCode::CardDeclined
                | GatewayErrorCode::InsufficientFunds
                | GatewayErrorCode::CardExpired
                | GatewayErrorCode::InvalidCard
        )
    }
}

impl std::fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GatewayErrorCode::NetworkError => "network_error",
            GatewayErrorCode::Timeout => "timeout",
            GatewayErrorCode::AuthenticationError => "authentication_error",
            GatewayErrorCode::CardDeclined => "card_declined",
            GatewayErrorCode::InsufficientFunds => "insufficient_funds",
            GatewayErrorCode::CardExpired => "card_expired",
            GatewayErrorCode::InvalidCard => "invalid_card",
            GatewayErrorCode::InvalidRequest => "invalid_request",
            GatewayErrorCode::NotFound => "not_found",
            GatewayErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            GatewayErrorCode::ProviderError => "provider_error",
            GatewayErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}
