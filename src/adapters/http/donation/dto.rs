//! HTTP DTOs for donation endpoints.
//!
//! JSON uses camelCase field names to match the web client.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::{CreateDonationResult, ProcessRefundResult};
use crate::domain::donation::DonationStatus;
use crate::domain::foundation::{DonationId, ProjectId};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a donation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDonationRequest {
    pub project_id: i64,
    /// Amount in major units, e.g. `25.00`.
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
}

/// Request to refund a completed donation. Omitting `amount` refunds it in full.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundDonationRequest {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub reason: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Response for a started donation. The client confirms the payment with `client_secret`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDonationResponse {
    pub donation_id: DonationId,
    pub client_secret: String,
    pub payment_intent_id: String,
}

impl From<CreateDonationResult> for CreateDonationResponse {
    fn from(result: CreateDonationResult) -> Self {
        Self {
            donation_id: result.donation_id,
            client_secret: result.client_secret,
            payment_intent_id: result.external_payment_ref,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundDonationResponse {
    pub donation_id: DonationId,
    pub project_id: ProjectId,
    pub status: DonationStatus,
    pub refund_amount: Option<Decimal>,
    pub refund_id: String,
    /// True when this request found the refund already recorded.
    pub already_refunded: bool,
}

impl From<ProcessRefundResult> for RefundDonationResponse {
    fn from(result: ProcessRefundResult) -> Self {
        Self {
            donation_id: result.donation.id,
            project_id: result.donation.project_id,
            status: result.donation.status,
            refund_amount: result.donation.refund_amount.map(|m| m.to_decimal()),
            refund_id: result.refund_ref,
            already_refunded: result.already_refunded,
        }
    }
}

/// Acknowledgement returned to the payment gateway.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}
