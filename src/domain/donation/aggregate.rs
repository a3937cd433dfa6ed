//! Donation aggregate.
//!
//! A donation is created `pending` once the gateway has issued a payment
//! intent, and is afterwards moved only by webhook confirmation or by a
//! refund. Rows are never deleted; the timestamps form the audit trail.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    Currency, DonationId, Money, ProjectId, StateMachine, Timestamp, UserId,
};

use super::{DonationError, DonationStatus};

/// A single donation towards a project.
///
/// # Invariants
///
/// - `amount > 0`
/// - `refund_amount` is set iff `status == Refunded`, and `0 < refund_amount <= amount`
/// - `completed_at` is set iff the donation ever reached `Completed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub id: DonationId,
    pub project_id: ProjectId,
    pub donor_id: UserId,
    pub amount: Money,
    pub currency: Currency,
    pub status: DonationStatus,

    /// Payment intent reference issued by the gateway.
    pub external_payment_ref: String,

    pub message: Option<String>,
    pub anonymous: bool,

    pub refund_amount: Option<Money>,
    pub refund_ref: Option<String>,
    pub refund_reason: Option<String>,
    pub failure_reason: Option<String>,

    pub created_at: Timestamp,
    /// When the gateway confirmed the charge.
    pub completed_at: Option<Timestamp>,
    pub failed_at: Option<Timestamp>,
    pub refunded_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

/// Fields needed to record a new pending donation.
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub id: DonationId,
    pub project_id: ProjectId,
    pub donor_id: UserId,
    pub amount: Money,
    pub currency: Currency,
    pub external_payment_ref: String,
    pub message: Option<String>,
    pub anonymous: bool,
}

impl Donation {
    /// Creates a pending donation.
    pub fn pending(new: NewDonation, now: Timestamp) -> Result<Self, DonationError> {
        if new.amount.is_zero() {
            return Err(DonationError::validation("amount", "must be greater than zero"));
        }
        if new.external_payment_ref.trim().is_empty() {
            return Err(DonationError::validation(
                "external_payment_ref",
                "payment reference is required",
            ));
        }

        Ok(Self {
            id: new.id,
            project_id: new.project_id,
            donor_id: new.donor_id,
            amount: new.amount,
            currency: new.currency,
            status: DonationStatus::Pending,
            external_payment_ref: new.external_payment_ref,
            message: new.message,
            anonymous: new.anonymous,
            refund_amount: None,
            refund_ref: None,
            refund_reason: None,
            failure_reason: None,
            created_at: now,
            completed_at: None,
            failed_at: None,
            refunded_at: None,
            updated_at: now,
        })
    }

    /// Marks the charge as confirmed by the gateway.
    pub fn complete(&mut self, now: Timestamp) -> Result<(), DonationError> {
        self.transition_to(DonationStatus::Completed, "complete")?;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Marks the charge as failed.
    pub fn fail(&mut self, reason: impl Into<String>, now: Timestamp) -> Result<(), DonationError> {
        self.transition_to(DonationStatus::Failed, "fail")?;
        self.failure_reason = Some(reason.into());
        self.failed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Checks that `amount` may be refunded from this donation.
    pub fn validate_refund(&self, amount: Money) -> Result<(), DonationError> {
        if self.status != DonationStatus::Completed {
            return Err(DonationError::validation(
                "donation",
                format!("only completed donations can be refunded (status is {})", self.status),
            ));
        }
        if amount.is_zero() {
            return Err(DonationError::validation("amount", "refund amount must be greater than zero"));
        }
        if amount > self.amount {
            return Err(DonationError::validation(
                "amount",
                format!(
                    "refund amount {} exceeds donation amount {}",
                    amount, self.amount
                ),
            ));
        }
        Ok(())
    }

    /// Records a gateway-confirmed refund.
    pub fn refund(
        &mut self,
        amount: Money,
        refund_ref: impl Into<String>,
        reason: Option<String>,
        now: Timestamp,
    ) -> Result<(), DonationError> {
        self.validate_refund(amount)?;
        self.transition_to(DonationStatus::Refunded, "refund")?;
        self.refund_amount = Some(amount);
        self.refund_ref = Some(refund_ref.into());
        self.refund_reason = reason;
        self.refunded_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// What this donation currently contributes to its project's total.
    pub fn net_contribution(&self) -> Money {
        match self.status {
            DonationStatus::Completed => self.amount,
            DonationStatus::Refunded => {
                let refunded = self.refund_amount.unwrap_or(Money::ZERO);
                self.amount.checked_sub(refunded).unwrap_or(Money::ZERO)
            }
            DonationStatus::Pending | DonationStatus::Failed => Money::ZERO,
        }
    }

    fn transition_to(&mut self, target: DonationStatus, action: &str) -> Result<(), DonationError> {
        if !self.status.can_transition_to(&target) {
            return Err(DonationError::invalid_state(self.status.as_str(), action));
        }
        self.status = target;
        Ok(())
    }
}
