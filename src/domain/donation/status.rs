//! Donation status state machine.
//!
//! `pending → completed → refunded` and `pending → failed`. Nothing else.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    /// Payment intent created, waiting for the gateway to confirm.
    Pending,

    /// Gateway confirmed the charge; counted in the project total.
    Completed,

    /// Gateway reported the charge as failed. Terminal.
    Failed,

    /// Completed donation that was (fully or partially) refunded. Terminal.
    Refunded,
}

impl DonationStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Completed => "completed",
            DonationStatus::Failed => "failed",
            DonationStatus::Refunded => "refunded",
        }
    }

    /// Parses the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DonationStatus::Pending),
            "completed" => Some(DonationStatus::Completed),
            "failed" => Some(DonationStatus::Failed),
            "refunded" => Some(DonationStatus::Refunded),
            _ => None,
        }
    }

    /// Whether this donation's money has ever reached the project total.
    pub fn has_settled(&self) -> bool {
        matches!(self, DonationStatus::Completed | DonationStatus::Refunded)
    }
}

impl std::fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StateMachine for DonationStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use DonationStatus::*;
        matches!(
            (self, target),
            (Pending, Completed) | (Pending, Failed) | (Completed, Refunded)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use DonationStatus::*;
        match self {
            Pending => vec![Completed, Failed],
            Completed => vec![Refunded],
            Failed | Refunded => vec![],
        }
    }
}
