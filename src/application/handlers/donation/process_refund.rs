//! ProcessRefundHandler - Command handler for refunding a completed donation.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domain::donation::{Donation, DonationError, DonationStatus};
use crate::domain::foundation::{AuthenticatedUser, DonationId, Money, Timestamp};
use crate::ports::{LedgerStore, PaymentGateway, Refund, RefundRequest};

/// Command to refund a donation, fully or in part.
#[derive(Debug, Clone)]
pub struct ProcessRefundCommand {
    pub actor: AuthenticatedUser,
    pub donation_id: DonationId,
    /// Amount in major units. Defaults to the full donation.
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

/// Result of a refund.
#[derive(Debug, Clone)]
pub struct ProcessRefundResult {
    pub donation: Donation,
    pub refund_ref: String,
    /// True when the same refund had already been recorded.
    pub already_refunded: bool,
}

/// Handler for refunds.
///
/// The gateway refund happens first; the donation and project total are
/// only changed once the gateway accepted it. A donation is refunded at
/// most once.
pub struct ProcessRefundHandler {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl ProcessRefundHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { ledger, gateway }
    }

    pub async fn handle(
        &self,
        cmd: ProcessRefundCommand,
    ) -> Result<ProcessRefundResult, DonationError> {
        if !cmd.actor.is_admin() {
            return Err(DonationError::forbidden("only administrators can issue refunds"));
        }

        // 1. Load and validate
        let donation = self
            .ledger
            .find_donation(cmd.donation_id)
            .await?
            .ok_or(DonationError::donation_not_found(cmd.donation_id))?;

        let amount = match cmd.amount {
            Some(requested) => Money::from_decimal(requested)?,
            None => donation.amount,
        };
        donation.validate_refund(amount)?;

        // 2. Refund at the gateway
        let mut metadata = BTreeMap::new();
        metadata.insert("donation_id".to_string(), donation.id.to_string());
        metadata.insert("project_id".to_string(), donation.project_id.to_string());

        let refund = self
            .gateway
            .refund(RefundRequest {
                payment_ref: donation.external_payment_ref.clone(),
                amount,
                reason: cmd.reason.clone(),
                metadata,
                idempotency_key: format!("refund-{}", donation.id),
            })
            .await
            .map_err(|e| {
                tracing::warn!(
                    donation_id = %donation.id,
                    payment_ref = %donation.external_payment_ref,
                    gateway_code = %e.code,
                    "Gateway refund failed"
                );
                DonationError::from(e)
            })?;

        // 3. Record it. Retrying reuses the gateway refund through the idempotency key.
        self.record(donation.id, amount, &refund, cmd.reason)
            .await
            .map_err(|e| {
                tracing::error!(
                    donation_id = %donation.id,
                    payment_ref = %donation.external_payment_ref,
                    refund_ref = %refund.id,
                    error = %e,
                    "Gateway refund succeeded but not recorded in ledger"
                );
                e
            })
    }

    async fn record(
        &self,
        donation_id: DonationId,
        amount: Money,
        refund: &Refund,
        reason: Option<String>,
    ) -> Result<ProcessRefundResult, DonationError> {
        let mut tx = self.ledger.begin().await?;
        let mut donation = tx
            .lock_donation(donation_id)
            .await?
            .ok_or(DonationError::donation_not_found(donation_id))?;

        match donation.status {
            DonationStatus::Completed => {}
            DonationStatus::Refunded if donation.refund_ref.as_deref() == Some(refund.id.as_str()) => {
                return Ok(ProcessRefundResult {
                    donation,
                    refund_ref: refund.id.clone(),
                    already_refunded: true,
                });
            }
            status => {
                tracing::error!(
                    donation_id = %donation.id,
                    project_id = %donation.project_id,
                    payment_ref = %donation.external_payment_ref,
                    refund_ref = %refund.id,
                    status = %status,
                    "Gateway refund succeeded but donation changed concurrently"
                );
                return Err(DonationError::consistency(format!(
                    "donation is {} after gateway refund {}",
                    status, refund.id
                )));
            }
        }

        donation.refund(amount, refund.id.clone(), reason, Timestamp::now())?;

        if !tx.update_donation(&donation, DonationStatus::Completed).await? {
            return Err(DonationError::consistency(format!(
                "donation {} changed while recording refund {}",
                donation.id, refund.id
            )));
        }

        let project_total = tx
            .adjust_project_amount(donation.project_id, -amount.as_minor())
            .await
            .map_err(|e| {
                tracing::error!(
                    donation_id = %donation.id,
                    project_id = %donation.project_id,
                    refund_ref = %refund.id,
                    error = %e,
                    "Refund would corrupt project total"
                );
                DonationError::from(e)
            })?;
        tx.commit().await?;

        tracing::info!(
            donation_id = %donation.id,
            project_id = %donation.project_id,
            user_id = %donation.donor_id,
            payment_ref = %donation.external_payment_ref,
            refund_ref = %refund.id,
            refund_minor = amount.as_minor(),
            project_total_minor = project_total.as_minor(),
            "Donation refunded"
        );

        Ok(ProcessRefundResult {
            donation,
            refund_ref: refund.id.clone(),
            already_refunded: false,
        })
    }
}
