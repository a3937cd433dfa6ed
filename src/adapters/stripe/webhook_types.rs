//! Stripe wire types and their mapping onto port types.
//!
//! These structs mirror the JSON Stripe sends, both in webhook envelopes and
//! in API responses. Only the fields the ledger reads are declared; serde
//! skips the rest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::webhook::WebhookError;
use crate::ports::{
    GatewayError, GatewayErrorCode, GatewaySubscription, GatewaySubscriptionStatus, WebhookEvent,
    WebhookEventData, WebhookEventType,
};

// ════════════════════════════════════════════════════════════════════════════════
// Event envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Webhook event envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    /// Event id (`evt_...`).
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix seconds.
    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ════════════════════════════════════════════════════════════════════════════════
// Objects
// ════════════════════════════════════════════════════════════════════════════════

/// PaymentIntent object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub status: String,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub last_payment_error: Option<StripeLastPaymentError>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeLastPaymentError {
    pub code: Option<String>,
    pub decline_code: Option<String>,
    pub message: Option<String>,
}

/// Refund object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeRefund {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub status: String,
}

/// Customer object (only the id is needed).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCustomer {
    pub id: String,
}

/// Subscription object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    pub id: String,
    pub status: String,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub items: StripeList<StripeSubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscriptionItem {
    pub id: String,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
}

impl StripeSubscription {
    /// Id of the single price item the ledger manages.
    pub fn primary_item_id(&self) -> Option<&str> {
        self.items.data.first().map(|item| item.id.as_str())
    }

    /// Newer API versions report periods on the item instead of the subscription.
    fn period(&self) -> (i64, i64) {
        let item = self.items.data.first();
        let start = self
            .current_period_start
            .or_else(|| item.and_then(|i| i.current_period_start))
            .unwrap_or_default();
        let end = self
            .current_period_end
            .or_else(|| item.and_then(|i| i.current_period_end))
            .unwrap_or(start);
        (start, end)
    }

    pub fn into_gateway(self) -> GatewaySubscription {
        let (current_period_start, current_period_end) = self.period();
        GatewaySubscription {
            status: GatewaySubscriptionStatus::parse(&self.status),
            id: self.id,
            current_period_start,
            current_period_end,
            cancel_at_period_end: self.cancel_at_period_end,
        }
    }
}

/// Invoice object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoice {
    pub id: String,
    pub subscription: Option<String>,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub lines: StripeList<StripeInvoiceLine>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoiceLine {
    pub period: Option<StripePeriod>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePeriod {
    pub start: i64,
    pub end: i64,
}

impl StripeInvoice {
    /// End of the latest period this invoice pays for.
    pub fn period_end(&self) -> Option<i64> {
        self.lines
            .data
            .iter()
            .filter_map(|line| line.period.as_ref().map(|p| p.end))
            .max()
    }
}

/// Paginated list wrapper.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
}

impl<T> Default for StripeList<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════════════════

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeErrorEnvelope {
    pub error: StripeApiError,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeApiError {
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub code: Option<String>,
    pub decline_code: Option<String>,
    pub message: Option<String>,
}

/// Maps an API error response onto a gateway error.
pub fn map_api_error(status: u16, body: &str) -> GatewayError {
    let parsed = serde_json::from_str::<StripeErrorEnvelope>(body).ok().map(|e| e.error);
    let message = parsed
        .as_ref()
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| format!("Stripe API error (HTTP {})", status));
    let error_type = parsed.as_ref().and_then(|e| e.error_type.clone()).unwrap_or_default();
    let code = parsed.as_ref().and_then(|e| e.code.clone());
    let decline_code = parsed.as_ref().and_then(|e| e.decline_code.clone());

    let gateway_code = match (error_type.as_str(), status) {
        ("card_error", _) => card_error_code(code.as_deref(), decline_code.as_deref()),
        ("authentication_error", _) | (_, 401) => GatewayErrorCode::AuthenticationError,
        ("rate_limit_error", _) | (_, 429) => GatewayErrorCode::RateLimitExceeded,
        (_, 404) => GatewayErrorCode::NotFound,
        ("invalid_request_error", _) | (_, 400) => GatewayErrorCode::InvalidRequest,
        _ => GatewayErrorCode::ProviderError,
    };

    let mut error = GatewayError::new(gateway_code, message);
    if let Some(provider_code) = decline_code.or(code) {
        error = error.with_provider_code(provider_code);
    }
    if status >= 500 {
        // Stripe asks clients to retry server errors with the same idempotency key.
        error.retryable = true;
    }
    error
}

fn card_error_code(code: Option<&str>, decline_code: Option<&str>) -> GatewayErrorCode {
    match (code, decline_code) {
        (_, Some("insufficient_funds")) => GatewayErrorCode::InsufficientFunds,
        (Some("expired_card"), _) | (_, Some("expired_card")) => GatewayErrorCode::CardExpired,
        (Some("incorrect_number" | "invalid_number" | "invalid_cvc" | "incorrect_cvc"
            | "invalid_expiry_month" | "invalid_expiry_year"), _) => GatewayErrorCode::InvalidCard,
        _ => GatewayErrorCode::CardDeclined,
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Event parsing
// ════════════════════════════════════════════════════════════════════════════════

/// Parses a verified webhook payload into a port event.
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let envelope: StripeWebhookEvent =
        serde_json::from_slice(payload).map_err(|e| WebhookError::ParseError(e.to_string()))?;

    let event_type = WebhookEventType::from_provider(&envelope.event_type);
    let data = extract_event_data(&event_type, &envelope.data.object)?;

    Ok(WebhookEvent {
        id: envelope.id,
        event_type,
        data,
        created_at: envelope.created,
        livemode: envelope.livemode,
    })
}

fn extract_event_data(
    event_type: &WebhookEventType,
    object: &serde_json::Value,
) -> Result<WebhookEventData, WebhookError> {
    match event_type {
        WebhookEventType::PaymentIntentSucceeded | WebhookEventType::PaymentIntentFailed => {
            let intent: StripePaymentIntent = serde_json::from_value(object.clone())
                .map_err(|e| WebhookError::ParseError(format!("invalid payment intent: {}", e)))?;
            let failure_message = intent.last_payment_error.and_then(|err| {
                err.message.or(err.decline_code).or(err.code)
            });
            Ok(WebhookEventData::PaymentIntent {
                payment_ref: intent.id,
                amount: intent.amount,
                currency: intent.currency,
                failure_message,
                metadata: intent.metadata,
            })
        }

        WebhookEventType::InvoicePaid | WebhookEventType::InvoicePaymentFailed => {
            let invoice: StripeInvoice = serde_json::from_value(object.clone())
                .map_err(|e| WebhookError::ParseError(format!("invalid invoice: {}", e)))?;
            let period_end = invoice.period_end();
            Ok(WebhookEventData::Invoice {
                invoice_id: invoice.id,
                subscription_ref: invoice.subscription,
                amount_paid: invoice.amount_paid,
                currency: invoice.currency,
                period_end,
            })
        }

        WebhookEventType::SubscriptionDeleted => {
            let sub: StripeSubscription = serde_json::from_value(object.clone())
                .map_err(|e| WebhookError::ParseError(format!("invalid subscription: {}", e)))?;
            let current_period_end = sub.period().1;
            Ok(WebhookEventData::Subscription {
                status: GatewaySubscriptionStatus::parse(&sub.status),
                subscription_ref: sub.id,
                current_period_end: (current_period_end > 0).then_some(current_period_end),
            })
        }

        WebhookEventType::Unknown(_) => Ok(WebhookEventData::Raw {
            json: object.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(event_type: &str, object: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_123",
            "type": event_type,
            "created": 1_704_067_200,
            "livemode": false,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn parses_payment_intent_succeeded() {
        let payload = envelope(
            "payment_intent.succeeded",
            json!({
                "id": "pi_1",
                "object": "payment_intent",
                "amount": 5000,
                "currency": "usd",
                "status": "succeeded",
                "metadata": { "donation_id": "d-1", "project_id": "7" }
            }),
        );

        let event = parse_event(&payload).unwrap();

        assert_eq!(event.id, "evt_123");
        assert_eq!(event.event_type, WebhookEventType::PaymentIntentSucceeded);
        match event.data {
            WebhookEventData::PaymentIntent { payment_ref, amount, metadata, .. } => {
                assert_eq!(payment_ref, "pi_1");
                assert_eq!(amount, 5000);
                assert_eq!(metadata.get("project_id").map(String::as_str), Some("7"));
            }
            other => panic!("unexpected data: {:?}", other),
        }
    }

    #[test]
    fn payment_failure_carries_gateway_message() {
        let payload = envelope(
            "payment_intent.payment_failed",
            json!({
                "id": "pi_2",
                "amount": 1000,
                "currency": "usd",
                "last_payment_error": { "code": "card_declined", "message": "Your card was declined." }
            }),
        );

        let event = parse_event(&payload).unwrap();

        match event.data {
            WebhookEventData::PaymentIntent { failure_message, .. } => {
                assert_eq!(failure_message.as_deref(), Some("Your card was declined."));
            }
            other => panic!("unexpected data: {:?}", other),
        }
    }

    #[test]
    fn invoice_period_end_comes_from_lines() {
        let payload = envelope(
            "invoice.paid",
            json!({
                "id": "in_1",
                "subscription": "sub_1",
                "amount_paid": 1900,
                "currency": "usd",
                "lines": { "data": [ { "period": { "start": 100, "end": 200 } } ] }
            }),
        );

        let event = parse_event(&payload).unwrap();

        assert_eq!(event.event_type, WebhookEventType::InvoicePaid);
        assert_eq!(
            event.data,
            WebhookEventData::Invoice {
                invoice_id: "in_1".to_string(),
                subscription_ref: Some("sub_1".to_string()),
                amount_paid: 1900,
                currency: "usd".to_string(),
                period_end: Some(200),
            }
        );
    }

    #[test]
    fn unknown_event_keeps_raw_object() {
        let payload = envelope("charge.dispute.created", json!({ "id": "dp_1" }));
        let event = parse_event(&payload).unwrap();
        assert!(matches!(event.event_type, WebhookEventType::Unknown(_)));
        assert!(matches!(event.data, WebhookEventData::Raw { .. }));
    }

    #[test]
    fn malformed_payload_is_parse_error() {
        assert!(matches!(parse_event(b"not json"), Err(WebhookError::ParseError(_))));
    }

    #[test]
    fn subscription_period_falls_back_to_item() {
        let sub: StripeSubscription = serde_json::from_value(json!({
            "id": "sub_1",
            "status": "active",
            "items": { "data": [ { "id": "si_1", "current_period_start": 10, "current_period_end": 20 } ] }
        }))
        .unwrap();

        assert_eq!(sub.primary_item_id(), Some("si_1"));
        let gateway = sub.into_gateway();
        assert_eq!(gateway.current_period_start, 10);
        assert_eq!(gateway.current_period_end, 20);
        assert_eq!(gateway.status, GatewaySubscriptionStatus::Active);
    }

    #[test]
    fn card_errors_keep_decline_detail() {
        let body = r#"{"error":{"type":"card_error","code":"card_declined","decline_code":"insufficient_funds","message":"Your card has insufficient funds."}}"#;
        let err = map_api_error(402, body);
        assert_eq!(err.code, GatewayErrorCode::InsufficientFunds);
        assert_eq!(err.user_message(), "Your card has insufficient funds.");
        assert_eq!(err.provider_code.as_deref(), Some("insufficient_funds"));
    }

    #[test]
    fn auth_errors_are_not_shown_to_users() {
        let body = r#"{"error":{"type":"invalid_request_error","message":"Invalid API Key provided"}}"#;
        let err = map_api_error(401, body);
        assert_eq!(err.code, GatewayErrorCode::AuthenticationError);
        assert!(!err.user_message().contains("API Key"));
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = map_api_error(503, "upstream unavailable");
        assert_eq!(err.code, GatewayErrorCode::ProviderError);
        assert!(err.retryable);
    }

    #[test]
    fn rate_limits_are_retryable() {
        let err = map_api_error(429, r#"{"error":{"type":"rate_limit_error","message":"Too many requests"}}"#);
        assert_eq!(err.code, GatewayErrorCode::RateLimitExceeded);
        assert!(err.retryable);
    }
}
