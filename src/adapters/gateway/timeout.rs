//! Timeout decorator for payment gateways.
//!
//! Wraps any `PaymentGateway` and bounds each network call. A call that does
//! not finish in time fails with `GatewayErrorCode::Timeout`.
//!
//! # Example
//!
//! ```ignore
//! let stripe = StripePaymentGateway::new(config);
//! let gateway = TimeoutPaymentGateway::new(stripe, Duration::from_secs(10));
//! ```

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::webhook::WebhookError;
use crate::ports::{
    CreateSubscriptionRequest, GatewayError, GatewaySubscription, PaymentGateway, PaymentIntent,
    PaymentIntentRequest, Refund, RefundRequest, UpdateSubscriptionRequest, WebhookEvent,
};

/// Payment gateway wrapper that applies a per-call deadline.
pub struct TimeoutPaymentGateway<G: PaymentGateway> {
    inner: G,
    timeout: Duration,
}

impl<G: PaymentGateway> TimeoutPaymentGateway<G> {
    pub fn new(inner: G, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, GatewayError>> + Send,
    ) -> Result<T, GatewayError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_secs = self.timeout.as_secs(),
                    "Payment gateway call timed out"
                );
                Err(GatewayError::timeout(self.timeout.as_secs()))
            }
        }
    }
}

#[async_trait]
impl<G: PaymentGateway + 'static> PaymentGateway for TimeoutPaymentGateway<G> {
    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        self.bounded("create_payment_intent", self.inner.create_payment_intent(request))
            .await
    }

    async fn refund(&self, request: RefundRequest) -> Result<Refund, GatewayError> {
        // The refund may already be accepted upstream; retrying blindly is unsafe.
        self.bounded("refund", self.inner.refund(request))
            .await
            .map_err(|mut err| {
                err.retryable = false;
                err
            })
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, WebhookError> {
        self.inner.verify_webhook(payload, signature)
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<GatewaySubscription, GatewayError> {
        self.bounded("create_subscription", self.inner.create_subscription(request))
            .await
    }

    async fn update_subscription(
        &self,
        request: UpdateSubscriptionRequest,
    ) -> Result<GatewaySubscription, GatewayError> {
        self.bounded("update_subscription", self.inner.update_subscription(request))
            .await
    }

    async fn cancel_subscription(
        &self,
        subscription_ref: &str,
        at_period_end: bool,
    ) -> Result<GatewaySubscription, GatewayError> {
        self.bounded(
            "cancel_subscription",
            self.inner.cancel_subscription(subscription_ref, at_period_end),
        )
        .await
    }

    async fn resume_subscription(
        &self,
        subscription_ref: &str,
    ) -> Result<GatewaySubscription, GatewayError> {
        self.bounded("resume_subscription", self.inner.resume_subscription(subscription_ref))
            .await
    }
}
