//! WebhookEventRepository port - log of gateway events already handled.
//!
//! The gateway delivers at least once. Status-gated transitions already make
//! redelivery harmless; this log lets the dispatcher skip a known event id
//! without touching the ledger at all.
//!
//! Only terminal outcomes are recorded. An event that failed with a
//! retryable error must stay unrecorded so the redelivery is processed.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};

/// How a recorded event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event changed (or confirmed) ledger state.
    Processed,
    /// The event was acknowledged without any change.
    Ignored,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Processed => "processed",
            WebhookOutcome::Ignored => "ignored",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processed" => Some(WebhookOutcome::Processed),
            "ignored" => Some(WebhookOutcome::Ignored),
            _ => None,
        }
    }
}

/// Record of a handled webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEventRecord {
    /// Gateway event id (`evt_...`).
    pub event_id: String,
    pub event_type: String,
    pub outcome: WebhookOutcome,
    /// Short description of what happened, e.g. the donation id or the ignore reason.
    pub detail: Option<String>,
    pub processed_at: Timestamp,
}

impl WebhookEventRecord {
    pub fn processed(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            outcome: WebhookOutcome::Processed,
            detail: Some(detail.into()),
            processed_at: Timestamp::now(),
        }
    }

    pub fn ignored(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            outcome: WebhookOutcome::Ignored,
            detail: Some(reason.into()),
            processed_at: Timestamp::now(),
        }
    }
}

/// Result of attempting to save a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    Inserted,
    /// Another worker recorded this event id first.
    AlreadyExists,
}

/// Port for the processed-webhook log.
///
/// Implementations key records by event id and must treat a duplicate
/// insert as `AlreadyExists`, not as an error.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;

    /// Deletes records processed before `cutoff`. Returns the number removed.
    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError>;
}
