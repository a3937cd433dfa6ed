//! Stripe payment gateway adapter.
//!
//! Implements `PaymentGateway` against the Stripe REST API using
//! form-encoded requests and basic auth.
//!
//! # Security
//!
//! - Webhook signatures use HMAC-SHA256 with constant-time comparison
//! - Signatures older than 5 minutes are rejected
//! - Secrets are held as `secrecy::SecretString`
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key, webhook_secret);
//! let gateway = StripePaymentGateway::new(config);
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::domain::foundation::Money;
use crate::domain::webhook::{WebhookError, WebhookSignatureVerifier};
use crate::ports::{
    CreateSubscriptionRequest, GatewayError, GatewayErrorCode, GatewaySubscription, PaymentGateway, PaymentIntent,
    PaymentIntentRequest, Refund, RefundRequest, UpdateSubscriptionRequest, WebhookEvent,
};

use super::webhook_types::{
    map_api_error, parse_event, StripeCustomer, StripePaymentIntent, StripeRefund,
    StripeSubscription,
};

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Refund reasons Stripe accepts in the `reason` field.
const STRIPE_REFUND_REASONS: [&str; 3] = ["duplicate", "fraudulent", "requested_by_customer"];

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_live_...` or `sk_test_...`).
    api_key: SecretString,

    /// Webhook signing secret (`whsec_...`).
    webhook_secret: SecretString,

    api_base_url: String,

    /// Reject test-mode events.
    require_livemode: bool,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("require_livemode", &self.require_livemode)
            .finish()
    }
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            require_livemode: false,
        }
    }

    /// Set a custom API base URL (for testing against a stub server).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }
}

/// Stripe implementation of `PaymentGateway`.
pub struct StripePaymentGateway {
    config: StripeConfig,
    verifier: WebhookSignatureVerifier,
    http_client: reqwest::Client,
}

impl StripePaymentGateway {
    pub fn new(config: StripeConfig) -> Self {
        let verifier = WebhookSignatureVerifier::new(config.webhook_secret.expose_secret().clone());
        Self {
            config,
            verifier,
            http_client: reqwest::Client::new(),
        }
    }

    /// Uses a preconfigured client (shared connection pool, custom timeouts).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = client;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
        idempotency_key: Option<&str>,
    ) -> Result<T, GatewayError> {
        let mut request = request.basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await.map_err(|e| {
            let err = if e.is_timeout() {
                GatewayError::new(GatewayErrorCode::Timeout, e.to_string())
            } else {
                GatewayError::network(e.to_string())
            };
            tracing::warn!(operation, gateway_code = %err.code, error = %e, "Stripe request failed");
            err
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = map_api_error(status.as_u16(), &body);
            tracing::warn!(
                operation,
                http_status = status.as_u16(),
                gateway_code = %err.code,
                provider_code = err.provider_code.as_deref().unwrap_or(""),
                "Stripe API returned an error"
            );
            return Err(err);
        }

        response.json::<T>().await.map_err(|e| {
            tracing::error!(operation, error = %e, "Failed to parse Stripe response");
            GatewayError::new(
                GatewayErrorCode::ProviderError,
                format!("failed to parse Stripe response: {}", e),
            )
        })
    }

    async fn fetch_subscription(&self, subscription_ref: &str) -> Result<StripeSubscription, GatewayError> {
        let request = self
            .http_client
            .get(self.url(&format!("/v1/subscriptions/{}", subscription_ref)));
        self.send("get_subscription", request, None).await
    }
}

/// Form fields for a payment intent.
pub(crate) fn payment_intent_params(request: &PaymentIntentRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("amount".to_string(), request.amount.as_minor().to_string()),
        ("currency".to_string(), request.currency.as_str().to_string()),
        ("description".to_string(), request.description.clone()),
        ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
    ];
    params.extend(metadata_params(&request.metadata));
    params
}

/// Form fields for a refund. Free-text reasons go into metadata.
pub(crate) fn refund_params(request: &RefundRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("payment_intent".to_string(), request.payment_ref.clone()),
        ("amount".to_string(), request.amount.as_minor().to_string()),
    ];
    if let Some(reason) = &request.reason {
        if STRIPE_REFUND_REASONS.contains(&reason.as_str()) {
            params.push(("reason".to_string(), reason.clone()));
        } else {
            params.push(("metadata[reason]".to_string(), reason.clone()));
        }
    }
    params.extend(metadata_params(&request.metadata));
    params
}

fn metadata_params(
    metadata: &std::collections::BTreeMap<String, String>,
) -> impl Iterator<Item = (String, String)> + '_ {
    metadata
        .iter()
        .map(|(k, v)| (format!("metadata[{}]", k), v.clone()))
}

#[async_trait]
impl PaymentGateway for StripePaymentGateway {
    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        let http = self
            .http_client
            .post(self.url("/v1/payment_intents"))
            .form(&payment_intent_params(&request));

        let intent: StripePaymentIntent = self
            .send("create_payment_intent", http, Some(&request.idempotency_key))
            .await?;

        let client_secret = intent.client_secret.ok_or_else(|| {
            GatewayError::new(
                GatewayErrorCode::ProviderError,
                "payment intent has no client secret",
            )
        })?;

        Ok(PaymentIntent {
            id: intent.id,
            client_secret,
        })
    }

    async fn refund(&self, request: RefundRequest) -> Result<Refund, GatewayError> {
        let http = self
            .http_client
            .post(self.url("/v1/refunds"))
            .form(&refund_params(&request));

        let refund: StripeRefund = self.send("refund", http, Some(&request.idempotency_key)).await?;

        Ok(Refund {
            id: refund.id,
            amount: Money::from_minor(refund.amount).map_err(|e| {
                GatewayError::new(GatewayErrorCode::ProviderError, e.to_string())
            })?,
            status: refund.status,
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, WebhookError> {
        self.verifier.verify(payload, signature).map_err(|e| {
            tracing::warn!(error = %e, "Webhook signature rejected");
            e
        })?;

        let event = parse_event(payload)?;

        if self.config.require_livemode && !event.livemode {
            tracing::warn!(event_id = %event.id, "Rejected test mode event");
            return Err(WebhookError::ParseError(
                "test mode events are not accepted".to_string(),
            ));
        }

        Ok(event)
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<GatewaySubscription, GatewayError> {
        let customer_params = vec![
            ("metadata[user_id]".to_string(), request.user_id.to_string()),
            ("payment_method".to_string(), request.payment_method_ref.clone()),
            (
                "invoice_settings[default_payment_method]".to_string(),
                request.payment_method_ref.clone(),
            ),
        ];
        let customer_key = format!("{}-customer", request.idempotency_key);
        let customer: StripeCustomer = self
            .send(
                "create_customer",
                self.http_client
                    .post(self.url("/v1/customers"))
                    .form(&customer_params),
                Some(&customer_key),
            )
            .await?;

        let params = vec![
            ("customer".to_string(), customer.id),
            ("items[0][price]".to_string(), request.price_ref.clone()),
            ("metadata[user_id]".to_string(), request.user_id.to_string()),
        ];
        let sub: StripeSubscription = self
            .send(
                "create_subscription",
                self.http_client
                    .post(self.url("/v1/subscriptions"))
                    .form(&params),
                Some(&request.idempotency_key),
            )
            .await?;

        Ok(sub.into_gateway())
    }

    async fn update_subscription(
        &self,
        request: UpdateSubscriptionRequest,
    ) -> Result<GatewaySubscription, GatewayError> {
        let current = self.fetch_subscription(&request.subscription_ref).await?;
        let item_id = current
            .primary_item_id()
            .ok_or_else(|| GatewayError::not_found("Subscription item"))?
            .to_string();

        let mut params = vec![
            ("items[0][id]".to_string(), item_id),
            ("items[0][price]".to_string(), request.price_ref.clone()),
            (
                "proration_behavior".to_string(),
                request.proration.as_provider_str().to_string(),
            ),
        ];
        if request.resume {
            params.push(("cancel_at_period_end".to_string(), "false".to_string()));
        }

        let sub: StripeSubscription = self
            .send(
                "update_subscription",
                self.http_client
                    .post(self.url(&format!("/v1/subscriptions/{}", request.subscription_ref)))
                    .form(&params),
                Some(&request.idempotency_key),
            )
            .await?;

        Ok(sub.into_gateway())
    }

    async fn cancel_subscription(
        &self,
        subscription_ref: &str,
        at_period_end: bool,
    ) -> Result<GatewaySubscription, GatewayError> {
        let url = self.url(&format!("/v1/subscriptions/{}", subscription_ref));
        let request = if at_period_end {
            self.http_client
                .post(&url)
                .form(&[("cancel_at_period_end", "true")])
        } else {
            self.http_client.delete(&url)
        };

        let sub: StripeSubscription = self.send("cancel_subscription", request, None).await?;
        Ok(sub.into_gateway())
    }

    async fn resume_subscription(
        &self,
        subscription_ref: &str,
    ) -> Result<GatewaySubscription, GatewayError> {
        let request = self
            .http_client
            .post(self.url(&format!("/v1/subscriptions/{}", subscription_ref)))
            .form(&[("cancel_at_period_end", "false")]);

        let sub: StripeSubscription = self.send("resume_subscription", request, None).await?;
        Ok(sub.into_gateway())
    }
}
