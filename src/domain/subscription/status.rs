//! Subscription status state machine.
//!
//! Statuses are driven by explicit user actions (upgrade, downgrade, cancel,
//! reactivate) and by billing webhooks (renewal, failed payment, deletion).

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a paid subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Trial period granted by the gateway.
    Trialing,

    /// Paid and in good standing.
    Active,

    /// Latest invoice failed. Entitlements are kept while the gateway retries.
    PastDue,

    /// User asked to cancel; entitled until the period ends.
    CancelScheduled,

    /// A cheaper plan takes over at the next renewal.
    DowngradeScheduled,

    /// Ended. The user falls back to the free tier.
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::CancelScheduled => "cancel_scheduled",
            SubscriptionStatus::DowngradeScheduled => "downgrade_scheduled",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "trialing" => Some(SubscriptionStatus::Trialing),
            "active" => Some(SubscriptionStatus::Active),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "cancel_scheduled" => Some(SubscriptionStatus::CancelScheduled),
            "downgrade_scheduled" => Some(SubscriptionStatus::DowngradeScheduled),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            _ => None,
        }
    }

    /// Returns true if the plan's entitlements apply.
    ///
    /// Past-due subscriptions stay entitled; the grace period is implicit.
    pub fn is_entitled(&self) -> bool {
        !matches!(self, SubscriptionStatus::Cancelled)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From TRIALING
            (Trialing, Active)
                | (Trialing, PastDue)
                | (Trialing, CancelScheduled)
                | (Trialing, DowngradeScheduled)
                | (Trialing, Cancelled)
            // From ACTIVE
                | (Active, Active) // Renewal or in-place upgrade
                | (Active, PastDue)
                | (Active, CancelScheduled)
                | (Active, DowngradeScheduled)
                | (Active, Cancelled)
            // From PAST_DUE
                | (PastDue, Active)
                | (PastDue, CancelScheduled)
                | (PastDue, Cancelled)
            // From DOWNGRADE_SCHEDULED
                | (DowngradeScheduled, Active)
                | (DowngradeScheduled, DowngradeScheduled) // Reschedule to another plan
                | (DowngradeScheduled, PastDue)
                | (DowngradeScheduled, CancelScheduled)
                | (DowngradeScheduled, Cancelled)
            // From CANCEL_SCHEDULED
                | (CancelScheduled, Active)
                | (CancelScheduled, DowngradeScheduled)
                | (CancelScheduled, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Trialing => vec![Active, PastDue, CancelScheduled, DowngradeScheduled, Cancelled],
            Active => vec![Active, PastDue, CancelScheduled, DowngradeScheduled, Cancelled],
            PastDue => vec![Active, CancelScheduled, Cancelled],
            DowngradeScheduled => vec![
                Active,
                DowngradeScheduled,
                PastDue,
                CancelScheduled,
                Cancelled,
            ],
            CancelScheduled => vec![Active, DowngradeScheduled, Cancelled],
            Cancelled => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SubscriptionStatus; 6] = [
        SubscriptionStatus::Trialing,
        SubscriptionStatus::Active,
        SubscriptionStatus::PastDue,
        SubscriptionStatus::CancelScheduled,
        SubscriptionStatus::DowngradeScheduled,
        SubscriptionStatus::Cancelled,
    ];

    #[test]
    fn valid_transitions_agree_with_can_transition_to() {
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(&to),
                    from.valid_transitions().contains(&to),
                    "{:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn cancelled_is_terminal() {
        assert!(SubscriptionStatus::Cancelled.is_terminal());
        assert!(!SubscriptionStatus::CancelScheduled.is_terminal());
    }

    #[test]
    fn cancel_scheduled_can_only_resume_or_end() {
        let s = SubscriptionStatus::CancelScheduled;
        assert!(s.can_transition_to(&SubscriptionStatus::Active));
        assert!(s.can_transition_to(&SubscriptionStatus::Cancelled));
        // Resuming with a downgrade still pending.
        assert!(s.can_transition_to(&SubscriptionStatus::DowngradeScheduled));
        assert!(!s.can_transition_to(&SubscriptionStatus::PastDue));
        assert!(!s.can_transition_to(&SubscriptionStatus::Trialing));
    }

    #[test]
    fn past_due_cannot_schedule_downgrade() {
        assert!(!SubscriptionStatus::PastDue.can_transition_to(&SubscriptionStatus::DowngradeScheduled));
    }

    #[test]
    fn only_cancelled_loses_entitlements() {
        for status in ALL {
            assert_eq!(status.is_entitled(), status != SubscriptionStatus::Cancelled);
        }
    }

    #[test]
    fn storage_representation_round_trips() {
        for status in ALL {
            assert_eq!(SubscriptionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SubscriptionStatus::parse("expired"), None);
    }

    #[test]
    fn serde_matches_storage_representation() {
        for status in ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }
}
