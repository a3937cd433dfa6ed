//! Subscription aggregate.
//!
//! # Design Decisions
//!
//! - **One per user**: at most one non-cancelled subscription per user, enforced by the store
//! - **Free tier is implicit**: no row means one project and the default commission
//! - **Downgrades are deferred**: the plan swap happens at the next renewal, not when requested

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PlanId, StateMachine, SubscriptionId, Timestamp, UserId};

use super::{BillingInterval, SubscriptionError, SubscriptionStatus};

/// A user's paid subscription.
///
/// # Invariants
///
/// - `current_period_start <= current_period_end`
/// - `scheduled_plan_id` is only set after a downgrade was scheduled; a scheduled
///   cancellation or a failed invoice keeps it, renewal or an upgrade clears it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,

    /// Subscription identifier at the payment gateway.
    pub external_subscription_ref: String,

    pub current_period_start: Timestamp,
    pub current_period_end: Timestamp,

    /// Plan taking over at the next renewal.
    pub scheduled_plan_id: Option<PlanId>,

    pub cancelled_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Data returned by the gateway when a subscription is created.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,
    pub external_subscription_ref: String,
    pub current_period_start: Timestamp,
    pub current_period_end: Timestamp,
}

/// Result of applying a paid invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// The period was extended. Carries the plan that took effect if a downgrade was applied.
    Renewed { swapped_to: Option<PlanId> },

    /// The invoice period was already covered.
    AlreadyApplied,
}

impl Subscription {
    /// Records a subscription the gateway just created.
    pub fn start(new: NewSubscription, now: Timestamp) -> Result<Self, SubscriptionError> {
        if !matches!(
            new.status,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing
        ) {
            return Err(SubscriptionError::validation(
                "status",
                format!("a new subscription cannot start as {}", new.status),
            ));
        }
        if new.current_period_end.is_before(&new.current_period_start) {
            return Err(SubscriptionError::validation(
                "current_period_end",
                "period end is before period start",
            ));
        }

        Ok(Self {
            id: new.id,
            user_id: new.user_id,
            plan_id: new.plan_id,
            status: new.status,
            external_subscription_ref: new.external_subscription_ref,
            current_period_start: new.current_period_start,
            current_period_end: new.current_period_end,
            scheduled_plan_id: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Swaps the plan immediately (upgrade with proration).
    ///
    /// Clears any scheduled downgrade or cancellation. Choosing the current plan
    /// is only accepted while a downgrade is pending, and withdraws it.
    pub fn change_plan(
        &mut self,
        plan_id: PlanId,
        period_start: Timestamp,
        period_end: Timestamp,
        now: Timestamp,
    ) -> Result<(), SubscriptionError> {
        if plan_id == self.plan_id && self.scheduled_plan_id.is_none() {
            return Err(SubscriptionError::validation(
                "plan_id",
                "already subscribed to this plan",
            ));
        }
        self.transition_to(SubscriptionStatus::Active, "upgrade")?;
        self.plan_id = plan_id;
        self.scheduled_plan_id = None;
        if !period_end.is_before(&period_start) {
            self.current_period_start = period_start;
            self.current_period_end = period_end;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Schedules a switch to `plan_id` at the end of the current period.
    pub fn schedule_downgrade(&mut self, plan_id: PlanId, now: Timestamp) -> Result<(), SubscriptionError> {
        if plan_id == self.plan_id {
            return Err(SubscriptionError::validation(
                "plan_id",
                "already subscribed to this plan",
            ));
        }
        self.transition_to(SubscriptionStatus::DowngradeScheduled, "downgrade")?;
        self.scheduled_plan_id = Some(plan_id);
        self.updated_at = now;
        Ok(())
    }

    /// Cancels at period end. Entitlements continue until then.
    pub fn schedule_cancellation(&mut self, now: Timestamp) -> Result<(), SubscriptionError> {
        self.transition_to(SubscriptionStatus::CancelScheduled, "cancel")?;
        self.updated_at = now;
        Ok(())
    }

    /// Cancels right away.
    pub fn cancel_now(&mut self, now: Timestamp) -> Result<(), SubscriptionError> {
        self.transition_to(SubscriptionStatus::Cancelled, "cancel")?;
        self.scheduled_plan_id = None;
        self.cancelled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Undoes a scheduled cancellation. A downgrade scheduled before the
    /// cancellation is still pending afterwards.
    pub fn reactivate(&mut self, now: Timestamp) -> Result<(), SubscriptionError> {
        if self.status != SubscriptionStatus::CancelScheduled {
            return Err(SubscriptionError::validation(
                "subscription",
                "no cancelled subscription found",
            ));
        }
        let target = if self.scheduled_plan_id.is_some() {
            SubscriptionStatus::DowngradeScheduled
        } else {
            SubscriptionStatus::Active
        };
        self.transition_to(target, "reactivate")?;
        self.updated_at = now;
        Ok(())
    }

    /// Applies a paid invoice.
    ///
    /// `period_end` is the end of the paid period as reported by the gateway.
    /// Without it the period is extended by one billing cycle.
    pub fn renew(
        &mut self,
        period_end: Option<Timestamp>,
        interval: BillingInterval,
        now: Timestamp,
    ) -> Result<RenewalOutcome, SubscriptionError> {
        if self.status == SubscriptionStatus::Cancelled {
            return Err(SubscriptionError::invalid_state(self.status.as_str(), "renew"));
        }
        if let Some(end) = period_end {
            if !end.is_after(&self.current_period_end) {
                return Ok(RenewalOutcome::AlreadyApplied);
            }
        }

        let new_start = self.current_period_end;
        let new_end = period_end.unwrap_or_else(|| new_start.add_days(interval.days()));

        // Cancellation takes effect when the gateway deletes the subscription.
        if self.status != SubscriptionStatus::CancelScheduled {
            self.transition_to(SubscriptionStatus::Active, "renew")?;
        }

        // The gateway bills the scheduled price from this invoice on.
        let swapped_to = self.scheduled_plan_id.take();
        if let Some(next) = swapped_to {
            self.plan_id = next;
        }

        self.current_period_start = new_start;
        self.current_period_end = new_end;
        self.updated_at = now;
        Ok(RenewalOutcome::Renewed { swapped_to })
    }

    /// Marks the latest invoice as failed. Returns false if already past due.
    pub fn mark_past_due(&mut self, now: Timestamp) -> Result<bool, SubscriptionError> {
        if self.status == SubscriptionStatus::PastDue {
            return Ok(false);
        }
        self.transition_to(SubscriptionStatus::PastDue, "mark past due")?;
        self.updated_at = now;
        Ok(true)
    }

    /// Ends the subscription after the gateway deleted it. Returns false if already ended.
    pub fn end(&mut self, now: Timestamp) -> Result<bool, SubscriptionError> {
        if self.status == SubscriptionStatus::Cancelled {
            return Ok(false);
        }
        self.cancel_now(now)?;
        Ok(true)
    }

    /// Plan whose entitlements currently apply.
    pub fn effective_plan_id(&self) -> Option<PlanId> {
        self.status.is_entitled().then_some(self.plan_id)
    }

    fn transition_to(&mut self, target: SubscriptionStatus, action: &str) -> Result<(), SubscriptionError> {
        if !self.status.can_transition_to(&target) {
            return Err(SubscriptionError::invalid_state(self.status.as_str(), action));
        }
        self.status = target;
        Ok(())
    }
}
