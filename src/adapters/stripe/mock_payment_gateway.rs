//! Mock payment gateway for testing.
//!
//! Provides a configurable implementation of `PaymentGateway` for unit and
//! integration tests. Supports:
//! - Idempotent payment intents and refunds keyed by idempotency key
//! - Error injection
//! - Call tracking
//! - Webhook parsing with optional signature checks

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::webhook::{WebhookError, WebhookSignatureVerifier};
use crate::ports::{
    CreateSubscriptionRequest, GatewayError, GatewaySubscription, GatewaySubscriptionStatus,
    PaymentGateway, PaymentIntent, PaymentIntentRequest, Refund, RefundRequest,
    UpdateSubscriptionRequest, WebhookEvent,
};

use super::webhook_types::parse_event;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Mock payment gateway for testing.
///
/// # Example
///
/// ```ignore
/// let gateway = MockPaymentGateway::new();
/// gateway.set_method_error("create_payment_intent", GatewayError::network("down"));
///
/// let result = gateway.create_payment_intent(request).await;
/// assert!(result.is_err());
/// assert_eq!(gateway.call_count("create_payment_intent"), 1);
/// ```
#[derive(Default, Clone)]
pub struct MockPaymentGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Intents by idempotency key.
    intents: HashMap<String, PaymentIntent>,

    /// Refunds by idempotency key.
    refunds: HashMap<String, Refund>,

    subscriptions: HashMap<String, GatewaySubscription>,

    /// Length of subscription periods handed out. Defaults to 30 days.
    period_days: Option<i64>,

    sequence: u64,

    /// Error to return on next call.
    next_error: Option<GatewayError>,

    /// Errors by method name, returned until cleared.
    method_errors: HashMap<String, GatewayError>,

    call_log: Vec<MethodCall>,

    webhook_verify_mode: WebhookVerifyMode,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

#[derive(Default)]
enum WebhookVerifyMode {
    /// Parse the payload without checking the signature.
    #[default]
    AcceptAll,

    /// Check the signature against a real verifier first.
    RequireValidSignature(WebhookSignatureVerifier),

    AlwaysFail,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that fails all webhook verifications.
    pub fn rejecting_webhooks() -> Self {
        let mock = Self::new();
        mock.state().webhook_verify_mode = WebhookVerifyMode::AlwaysFail;
        mock
    }

    /// Create a mock that verifies webhook signatures with `secret`.
    pub fn requiring_signature(secret: impl Into<String>) -> Self {
        let mock = Self::new();
        mock.state().webhook_verify_mode =
            WebhookVerifyMode::RequireValidSignature(WebhookSignatureVerifier::new(secret));
        mock
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    pub fn set_period_days(&self, days: i64) {
        self.state().period_days = Some(days);
    }

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: GatewayError) {
        self.state().next_error = Some(error);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: GatewayError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.next_error = None;
        state.method_errors.clear();
    }

    /// Current gateway-side view of a subscription.
    pub fn subscription(&self, subscription_ref: &str) -> Option<GatewaySubscription> {
        self.state().subscriptions.get(subscription_ref).cloned()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().call_log.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.state().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), GatewayError> {
        let mut state = self.state();

        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        Ok(())
    }

    fn next_ref(state: &mut MockState, prefix: &str) -> String {
        state.sequence += 1;
        format!("{}_mock_{}", prefix, state.sequence)
    }

    fn fresh_period(state: &MockState) -> (i64, i64) {
        let now = chrono::Utc::now().timestamp();
        let days = state.period_days.unwrap_or(30);
        (now, now + days * SECONDS_PER_DAY)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        self.record_call(
            "create_payment_intent",
            vec![
                request.amount.as_minor().to_string(),
                request.currency.to_string(),
                request.idempotency_key.clone(),
            ],
        );
        self.check_error("create_payment_intent")?;

        let mut state = self.state();
        if let Some(existing) = state.intents.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }

        let id = Self::next_ref(&mut state, "pi");
        let intent = PaymentIntent {
            client_secret: format!("{}_secret", id),
            id,
        };
        state
            .intents
            .insert(request.idempotency_key, intent.clone());
        Ok(intent)
    }

    async fn refund(&self, request: RefundRequest) -> Result<Refund, GatewayError> {
        self.record_call(
            "refund",
            vec![
                request.payment_ref.clone(),
                request.amount.as_minor().to_string(),
                request.idempotency_key.clone(),
            ],
        );
        self.check_error("refund")?;

        let mut state = self.state();
        if let Some(existing) = state.refunds.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }

        let refund = Refund {
            id: Self::next_ref(&mut state, "re"),
            amount: request.amount,
            status: "succeeded".to_string(),
        };
        state
            .refunds
            .insert(request.idempotency_key, refund.clone());
        Ok(refund)
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, WebhookError> {
        self.record_call("verify_webhook", vec![signature.to_string()]);

        {
            let state = self.state();
            match &state.webhook_verify_mode {
                WebhookVerifyMode::AcceptAll => {}
                WebhookVerifyMode::RequireValidSignature(verifier) => {
                    verifier.verify(payload, signature)?;
                }
                WebhookVerifyMode::AlwaysFail => return Err(WebhookError::InvalidSignature),
            }
        }

        parse_event(payload)
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<GatewaySubscription, GatewayError> {
        self.record_call(
            "create_subscription",
            vec![
                request.user_id.to_string(),
                request.price_ref.clone(),
                request.payment_method_ref.clone(),
            ],
        );
        self.check_error("create_subscription")?;

        let mut state = self.state();
        let (start, end) = Self::fresh_period(&state);
        let subscription = GatewaySubscription {
            id: Self::next_ref(&mut state, "sub"),
            status: GatewaySubscriptionStatus::Active,
            current_period_start: start,
            current_period_end: end,
            cancel_at_period_end: false,
        };
        state
            .subscriptions
            .insert(subscription.id.clone(), subscription.clone());
        Ok(subscription)
    }

    async fn update_subscription(
        &self,
        request: UpdateSubscriptionRequest,
    ) -> Result<GatewaySubscription, GatewayError> {
        self.record_call(
            "update_subscription",
            vec![
                request.subscription_ref.clone(),
                request.price_ref.clone(),
                request.proration.as_provider_str().to_string(),
            ],
        );
        self.check_error("update_subscription")?;

        let mut state = self.state();
        let (start, end) = Self::fresh_period(&state);
        let subscription = state
            .subscriptions
            .get_mut(&request.subscription_ref)
            .ok_or_else(|| GatewayError::not_found("Subscription"))?;

        subscription.status = GatewaySubscriptionStatus::Active;
        subscription.current_period_start = start;
        subscription.current_period_end = end;
        if request.resume {
            subscription.cancel_at_period_end = false;
        }
        Ok(subscription.clone())
    }

    async fn cancel_subscription(
        &self,
        subscription_ref: &str,
        at_period_end: bool,
    ) -> Result<GatewaySubscription, GatewayError> {
        self.record_call(
            "cancel_subscription",
            vec![subscription_ref.to_string(), at_period_end.to_string()],
        );
        self.check_error("cancel_subscription")?;

        let mut state = self.state();
        let subscription = state
            .subscriptions
            .get_mut(subscription_ref)
            .ok_or_else(|| GatewayError::not_found("Subscription"))?;

        subscription.cancel_at_period_end = at_period_end;
        if !at_period_end {
            subscription.status = GatewaySubscriptionStatus::Canceled;
        }
        Ok(subscription.clone())
    }

    async fn resume_subscription(
        &self,
        subscription_ref: &str,
    ) -> Result<GatewaySubscription, GatewayError> {
        self.record_call("resume_subscription", vec![subscription_ref.to_string()]);
        self.check_error("resume_subscription")?;

        let mut state = self.state();
        let subscription = state
            .subscriptions
            .get_mut(subscription_ref)
            .ok_or_else(|| GatewayError::not_found("Subscription"))?;

        subscription.cancel_at_period_end = false;
        Ok(subscription.clone())
    }
}
