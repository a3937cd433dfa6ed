//! HandlePaymentWebhookHandler - Command handler for payment gateway webhooks.
//!
//! Donation events are applied here; subscription invoice and lifecycle
//! events are delegated to the subscription handlers.
//!
//! Every path is safe under redelivery and concurrent delivery: the event id
//! log short-circuits known events, and every state change is gated on the
//! donation or subscription status read under lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::application::handlers::notify::log_delivery;
use crate::application::handlers::subscription::{
    EndSubscriptionCommand, EndSubscriptionHandler, EndSubscriptionResult,
    HandleFailedPaymentCommand, HandleFailedPaymentHandler, HandleFailedPaymentResult,
    ProcessRenewalCommand, ProcessRenewalHandler, ProcessRenewalResult,
};
use crate::domain::donation::{Donation, DonationStatus};
use crate::domain::foundation::{DomainError, DonationId, Money, SubscriptionId, Timestamp};
use crate::domain::subscription::SubscriptionError;
use crate::domain::webhook::WebhookError;
use crate::ports::{
    LedgerStore, NotificationSink, PaymentGateway, WebhookEvent, WebhookEventData,
    WebhookEventRecord, WebhookEventRepository, WebhookEventType,
};

const DEFAULT_FAILURE_REASON: &str = "payment failed";

/// Command to handle a raw webhook delivery.
#[derive(Debug, Clone)]
pub struct HandlePaymentWebhookCommand {
    /// Raw request body, exactly as received.
    pub payload: Vec<u8>,
    /// Signature header value.
    pub signature: String,
}

/// Result of webhook processing. Every variant is acknowledged to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlePaymentWebhookResult {
    DonationCompleted {
        donation_id: DonationId,
        project_total: Money,
    },
    DonationFailed {
        donation_id: DonationId,
    },
    SubscriptionRenewed {
        subscription_id: SubscriptionId,
    },
    SubscriptionPastDue {
        subscription_id: SubscriptionId,
    },
    SubscriptionEnded {
        subscription_id: SubscriptionId,
    },
    /// The event, or its effect, was already applied.
    AlreadyProcessed,
    /// Event acknowledged without any change.
    Ignored { reason: String },
    /// Event contradicts the ledger; acknowledged and logged for follow-up.
    Rejected { reason: String },
}

impl HandlePaymentWebhookResult {
    fn ignored(reason: impl Into<String>) -> Self {
        Self::Ignored {
            reason: reason.into(),
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Record for the processed-event log, if this result is recorded at all.
    fn to_record(&self, event: &WebhookEvent) -> Option<WebhookEventRecord> {
        let event_type = event.event_type.as_str();
        let processed = |detail: String| {
            Some(WebhookEventRecord::processed(&event.id, event_type, detail))
        };
        match self {
            Self::DonationCompleted { donation_id, .. } => {
                processed(format!("donation {} completed", donation_id))
            }
            Self::DonationFailed { donation_id } => {
                processed(format!("donation {} failed", donation_id))
            }
            Self::SubscriptionRenewed { subscription_id } => {
                processed(format!("subscription {} renewed", subscription_id))
            }
            Self::SubscriptionPastDue { subscription_id } => {
                processed(format!("subscription {} past due", subscription_id))
            }
            Self::SubscriptionEnded { subscription_id } => {
                processed(format!("subscription {} ended", subscription_id))
            }
            Self::Ignored { reason } => {
                Some(WebhookEventRecord::ignored(&event.id, event_type, reason))
            }
            Self::AlreadyProcessed | Self::Rejected { .. } => None,
        }
    }
}

/// Handler for payment gateway webhooks.
pub struct HandlePaymentWebhookHandler {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationSink>,
    processed_events: Arc<dyn WebhookEventRepository>,
    renewal: Arc<ProcessRenewalHandler>,
    failed_payment: Arc<HandleFailedPaymentHandler>,
    end_subscription: Arc<EndSubscriptionHandler>,
}

impl HandlePaymentWebhookHandler {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationSink>,
        processed_events: Arc<dyn WebhookEventRepository>,
        renewal: Arc<ProcessRenewalHandler>,
        failed_payment: Arc<HandleFailedPaymentHandler>,
        end_subscription: Arc<EndSubscriptionHandler>,
    ) -> Self {
        Self {
            ledger,
            gateway,
            notifier,
            processed_events,
            renewal,
            failed_payment,
            end_subscription,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandlePaymentWebhookCommand,
    ) -> Result<HandlePaymentWebhookResult, WebhookError> {
        // 1. Verify signature and parse
        let event = self.gateway.verify_webhook(&cmd.payload, &cmd.signature)?;

        // 2. Skip events already handled
        if self
            .processed_events
            .find_by_event_id(&event.id)
            .await
            .map_err(database)?
            .is_some()
        {
            tracing::debug!(event_id = %event.id, "Webhook event already processed");
            return Ok(HandlePaymentWebhookResult::AlreadyProcessed);
        }

        // 3. Dispatch
        let result = match &event.event_type {
            WebhookEventType::PaymentIntentSucceeded => self.handle_payment_succeeded(&event).await?,
            WebhookEventType::PaymentIntentFailed => self.handle_payment_failed(&event).await?,
            WebhookEventType::InvoicePaid => self.handle_invoice_paid(&event).await?,
            WebhookEventType::InvoicePaymentFailed => self.handle_invoice_failed(&event).await?,
            WebhookEventType::SubscriptionDeleted => self.handle_subscription_deleted(&event).await?,
            WebhookEventType::Unknown(name) => {
                HandlePaymentWebhookResult::ignored(format!("unhandled event type {}", name))
            }
        };

        // 4. Remember the outcome
        if let Some(record) = result.to_record(&event) {
            if let Err(e) = self.processed_events.save(record).await {
                tracing::warn!(event_id = %event.id, error = %e, "Failed to record webhook event");
            }
        }

        Ok(result)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Donations
    // ════════════════════════════════════════════════════════════════════════════

    async fn handle_payment_succeeded(
        &self,
        event: &WebhookEvent,
    ) -> Result<HandlePaymentWebhookResult, WebhookError> {
        let Some(payment) = DonationPayment::from_event(event)? else {
            return Ok(HandlePaymentWebhookResult::ignored(
                "payment was not created for a donation",
            ));
        };

        let mut tx = self.ledger.begin().await.map_err(database)?;
        let mut donation = tx
            .lock_donation_by_payment_ref(&payment.payment_ref)
            .await
            .map_err(database)?
            .ok_or_else(|| WebhookError::DonationNotFound(payment.payment_ref.clone()))?;

        match donation.status {
            DonationStatus::Completed | DonationStatus::Refunded => {
                tracing::debug!(
                    donation_id = %donation.id,
                    payment_ref = %payment.payment_ref,
                    "Payment success already applied"
                );
                return Ok(HandlePaymentWebhookResult::AlreadyProcessed);
            }
            DonationStatus::Failed => {
                tracing::error!(
                    donation_id = %donation.id,
                    project_id = %donation.project_id,
                    payment_ref = %payment.payment_ref,
                    event_id = %event.id,
                    "Payment success received for a failed donation"
                );
                return Ok(HandlePaymentWebhookResult::rejected(
                    "success event for a failed donation",
                ));
            }
            DonationStatus::Pending => {}
        }

        if let Some(reason) = payment.mismatch(&donation) {
            tracing::error!(
                donation_id = %donation.id,
                project_id = %donation.project_id,
                payment_ref = %payment.payment_ref,
                event_id = %event.id,
                expected_minor = donation.amount.as_minor(),
                received_minor = payment.amount_minor,
                "Payment does not match donation"
            );
            return Ok(HandlePaymentWebhookResult::rejected(reason));
        }

        let now = Timestamp::now();
        donation
            .complete(now)
            .map_err(|e| WebhookError::Database(e.to_string()))?;

        if !tx
            .update_donation(&donation, DonationStatus::Pending)
            .await
            .map_err(database)?
        {
            return Ok(HandlePaymentWebhookResult::AlreadyProcessed);
        }

        let project_total = tx
            .adjust_project_amount(donation.project_id, donation.amount.as_minor())
            .await
            .map_err(database)?;
        tx.commit().await.map_err(database)?;

        tracing::info!(
            donation_id = %donation.id,
            project_id = %donation.project_id,
            user_id = %donation.donor_id,
            payment_ref = %donation.external_payment_ref,
            amount_minor = donation.amount.as_minor(),
            project_total_minor = project_total.as_minor(),
            "Donation completed"
        );

        log_delivery(
            "donation_confirmation",
            self.notifier.send_donation_confirmation(&donation).await,
        );

        Ok(HandlePaymentWebhookResult::DonationCompleted {
            donation_id: donation.id,
            project_total,
        })
    }

    async fn handle_payment_failed(
        &self,
        event: &WebhookEvent,
    ) -> Result<HandlePaymentWebhookResult, WebhookError> {
        let Some(payment) = DonationPayment::from_event(event)? else {
            return Ok(HandlePaymentWebhookResult::ignored(
                "payment was not created for a donation",
            ));
        };

        let mut tx = self.ledger.begin().await.map_err(database)?;
        let mut donation = tx
            .lock_donation_by_payment_ref(&payment.payment_ref)
            .await
            .map_err(database)?
            .ok_or_else(|| WebhookError::DonationNotFound(payment.payment_ref.clone()))?;

        match donation.status {
            DonationStatus::Failed => return Ok(HandlePaymentWebhookResult::AlreadyProcessed),
            DonationStatus::Completed | DonationStatus::Refunded => {
                tracing::warn!(
                    donation_id = %donation.id,
                    payment_ref = %payment.payment_ref,
                    status = %donation.status,
                    "Payment failure received after completion"
                );
                return Ok(HandlePaymentWebhookResult::ignored(
                    "payment failure after completion",
                ));
            }
            DonationStatus::Pending => {}
        }

        let reason = payment
            .failure_message
            .clone()
            .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string());
        donation
            .fail(reason, Timestamp::now())
            .map_err(|e| WebhookError::Database(e.to_string()))?;

        if !tx
            .update_donation(&donation, DonationStatus::Pending)
            .await
            .map_err(database)?
        {
            return Ok(HandlePaymentWebhookResult::AlreadyProcessed);
        }
        tx.commit().await.map_err(database)?;

        tracing::info!(
            donation_id = %donation.id,
            project_id = %donation.project_id,
            user_id = %donation.donor_id,
            payment_ref = %donation.external_payment_ref,
            failure_reason = donation.failure_reason.as_deref().unwrap_or(""),
            "Donation failed"
        );

        Ok(HandlePaymentWebhookResult::DonationFailed {
            donation_id: donation.id,
        })
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Subscriptions
    // ════════════════════════════════════════════════════════════════════════════

    async fn handle_invoice_paid(
        &self,
        event: &WebhookEvent,
    ) -> Result<HandlePaymentWebhookResult, WebhookError> {
        let WebhookEventData::Invoice {
            subscription_ref,
            period_end,
            ..
        } = &event.data
        else {
            return Err(WebhookError::ParseError("invoice.paid without invoice data".into()));
        };
        let Some(subscription_ref) = subscription_ref.clone() else {
            return Ok(HandlePaymentWebhookResult::ignored("invoice has no subscription"));
        };

        let outcome = self
            .renewal
            .handle(ProcessRenewalCommand {
                period_end: period_end.and_then(Timestamp::from_unix_secs),
                subscription_ref: subscription_ref.clone(),
            })
            .await;

        match outcome {
            Ok(ProcessRenewalResult::Renewed { subscription, .. }) => {
                Ok(HandlePaymentWebhookResult::SubscriptionRenewed {
                    subscription_id: subscription.id,
                })
            }
            Ok(ProcessRenewalResult::AlreadyApplied { .. }) => {
                Ok(HandlePaymentWebhookResult::AlreadyProcessed)
            }
            Ok(ProcessRenewalResult::UnknownSubscription) => {
                Err(WebhookError::SubscriptionNotFound(subscription_ref))
            }
            Err(e) => subscription_failure(event, &subscription_ref, e),
        }
    }

    async fn handle_invoice_failed(
        &self,
        event: &WebhookEvent,
    ) -> Result<HandlePaymentWebhookResult, WebhookError> {
        let WebhookEventData::Invoice {
            subscription_ref, ..
        } = &event.data
        else {
            return Err(WebhookError::ParseError(
                "invoice.payment_failed without invoice data".into(),
            ));
        };
        let Some(subscription_ref) = subscription_ref.clone() else {
            return Ok(HandlePaymentWebhookResult::ignored("invoice has no subscription"));
        };

        let outcome = self
            .failed_payment
            .handle(HandleFailedPaymentCommand {
                subscription_ref: subscription_ref.clone(),
            })
            .await;

        match outcome {
            Ok(HandleFailedPaymentResult::MarkedPastDue { subscription }) => {
                Ok(HandlePaymentWebhookResult::SubscriptionPastDue {
                    subscription_id: subscription.id,
                })
            }
            Ok(HandleFailedPaymentResult::AlreadyPastDue { subscription_id }) => {
                Ok(HandlePaymentWebhookResult::SubscriptionPastDue { subscription_id })
            }
            Ok(HandleFailedPaymentResult::Skipped { reason, .. }) => {
                Ok(HandlePaymentWebhookResult::ignored(reason))
            }
            Ok(HandleFailedPaymentResult::UnknownSubscription) => {
                Err(WebhookError::SubscriptionNotFound(subscription_ref))
            }
            Err(e) => subscription_failure(event, &subscription_ref, e),
        }
    }

    async fn handle_subscription_deleted(
        &self,
        event: &WebhookEvent,
    ) -> Result<HandlePaymentWebhookResult, WebhookError> {
        let WebhookEventData::Subscription {
            subscription_ref, ..
        } = &event.data
        else {
            return Err(WebhookError::ParseError(
                "customer.subscription.deleted without subscription data".into(),
            ));
        };

        let outcome = self
            .end_subscription
            .handle(EndSubscriptionCommand {
                subscription_ref: subscription_ref.clone(),
            })
            .await;

        match outcome {
            Ok(EndSubscriptionResult::Ended { subscription }) => {
                Ok(HandlePaymentWebhookResult::SubscriptionEnded {
                    subscription_id: subscription.id,
                })
            }
            Ok(EndSubscriptionResult::AlreadyEnded { .. }) => {
                Ok(HandlePaymentWebhookResult::AlreadyProcessed)
            }
            Ok(EndSubscriptionResult::UnknownSubscription) => Ok(
                HandlePaymentWebhookResult::ignored("subscription is not tracked by the ledger"),
            ),
            Err(e) => subscription_failure(event, subscription_ref, e),
        }
    }
}

/// Payment event fields for a donation created by this ledger.
struct DonationPayment {
    payment_ref: String,
    amount_minor: i64,
    currency: String,
    failure_message: Option<String>,
    donation_id: String,
}

impl DonationPayment {
    /// Returns `None` for payments without donation metadata.
    fn from_event(event: &WebhookEvent) -> Result<Option<Self>, WebhookError> {
        let WebhookEventData::PaymentIntent {
            payment_ref,
            amount,
            currency,
            failure_message,
            metadata,
        } = &event.data
        else {
            return Err(WebhookError::ParseError(format!(
                "{} without payment intent data",
                event.event_type.as_str()
            )));
        };

        Ok(donation_metadata(metadata).map(|donation_id| DonationPayment {
            payment_ref: payment_ref.clone(),
            amount_minor: *amount,
            currency: currency.to_lowercase(),
            failure_message: failure_message.clone(),
            donation_id,
        }))
    }

    /// Describes how the payment contradicts the stored donation, if it does.
    fn mismatch(&self, donation: &Donation) -> Option<String> {
        if self.donation_id != donation.id.to_string() {
            return Some(format!(
                "payment metadata names donation {}, ledger has {}",
                self.donation_id, donation.id
            ));
        }
        if self.amount_minor != donation.amount.as_minor() {
            return Some(format!(
                "payment amount {} does not match donation amount {}",
                self.amount_minor,
                donation.amount.as_minor()
            ));
        }
        if self.currency != donation.currency.as_str() {
            return Some(format!(
                "payment currency {} does not match donation currency {}",
                self.currency, donation.currency
            ));
        }
        None
    }
}

fn donation_metadata(metadata: &BTreeMap<String, String>) -> Option<String> {
    metadata.get("project_id")?;
    metadata.get("donation_id").cloned()
}

fn database(e: DomainError) -> WebhookError {
    WebhookError::Database(e.to_string())
}

/// Storage failures are retried by the gateway; anything else is acknowledged.
fn subscription_failure(
    event: &WebhookEvent,
    subscription_ref: &str,
    err: SubscriptionError,
) -> Result<HandlePaymentWebhookResult, WebhookError> {
    if let SubscriptionError::Infrastructure(message) = err {
        return Err(WebhookError::Database(message));
    }
    tracing::error!(
        event_id = %event.id,
        subscription_ref,
        error = %err,
        "Subscription webhook rejected"
    );
    Ok(HandlePaymentWebhookResult::rejected(err.message()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryLedger, InMemoryWebhookEventRepository};
    use crate::adapters::notification::{NotificationKind, RecordingNotificationSink};
    use crate::adapters::stripe::MockPaymentGateway;
    use crate::domain::donation::{NewDonation, Project};
    use crate::domain::foundation::{Currency, ProjectId, UserId};
    use serde_json::json;

    // ════════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        ledger: InMemoryLedger,
        notifier: Arc<RecordingNotificationSink>,
        events: Arc<InMemoryWebhookEventRepository>,
        handler: HandlePaymentWebhookHandler,
    }

    fn project_id() -> ProjectId {
        ProjectId::new(9).unwrap()
    }

    fn fixture() -> Fixture {
        let ledger = InMemoryLedger::new();
        ledger.add_project(Project {
            id: project_id(),
            owner_id: UserId::new("owner").unwrap(),
            goal_amount: Money::from_minor(100_000).unwrap(),
            current_amount: Money::ZERO,
        });
        let notifier = Arc::new(RecordingNotificationSink::new());
        let events = Arc::new(InMemoryWebhookEventRepository::new());
        let store: Arc<dyn LedgerStore> = Arc::new(ledger.clone());
        let sink: Arc<dyn NotificationSink> = notifier.clone();
        let gateway: Arc<dyn PaymentGateway> = Arc::new(MockPaymentGateway::new());

        let handler = HandlePaymentWebhookHandler::new(
            store.clone(),
            gateway,
            sink.clone(),
            events.clone(),
            Arc::new(ProcessRenewalHandler::new(store.clone(), sink.clone())),
            Arc::new(HandleFailedPaymentHandler::new(store.clone(), sink.clone())),
            Arc::new(EndSubscriptionHandler::new(store, sink)),
        );

        Fixture {
            ledger,
            notifier,
            events,
            handler,
        }
    }

    async fn seed_pending(ledger: &InMemoryLedger, payment_ref: &str, amount: i64) -> Donation {
        let donation = Donation::pending(
            NewDonation {
                id: DonationId::new(),
                project_id: project_id(),
                donor_id: UserId::new("donor").unwrap(),
                amount: Money::from_minor(amount).unwrap(),
                currency: Currency::usd(),
                external_payment_ref: payment_ref.to_string(),
                message: None,
                anonymous: false,
            },
            Timestamp::now(),
        )
        .unwrap();
        let mut tx = ledger.begin().await.unwrap();
        tx.insert_donation(&donation).await.unwrap();
        tx.commit().await.unwrap();
        donation
    }

    fn payment_event(
        event_id: &str,
        event_type: &str,
        donation: &Donation,
        amount: i64,
    ) -> HandlePaymentWebhookCommand {
        let payload = json!({
            "id": event_id,
            "type": event_type,
            "created": 1_704_067_200,
            "livemode": false,
            "data": { "object": {
                "id": donation.external_payment_ref,
                "amount": amount,
                "currency": "usd",
                "status": "succeeded",
                "metadata": {
                    "donation_id": donation.id.to_string(),
                    "project_id": donation.project_id.to_string(),
                },
                "last_payment_error": { "message": "Your card was declined." }
            }}
        });
        HandlePaymentWebhookCommand {
            payload: serde_json::to_vec(&payload).unwrap(),
            signature: "t=0,v1=00".to_string(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Completion
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn success_completes_donation_and_credits_project() {
        let f = fixture();
        let donation = seed_pending(&f.ledger, "pi_1", 5000).await;

        let result = f
            .handler
            .handle(payment_event("evt_1", "payment_intent.succeeded", &donation, 5000))
            .await
            .unwrap();

        assert_eq!(
            result,
            HandlePaymentWebhookResult::DonationCompleted {
                donation_id: donation.id,
                project_total: Money::from_minor(5000).unwrap(),
            }
        );
        assert_eq!(f.notifier.count(NotificationKind::DonationConfirmation), 1);
        assert_eq!(f.events.len(), 1);
    }

    #[tokio::test]
    async fn redelivered_success_does_not_double_count() {
        let f = fixture();
        let donation = seed_pending(&f.ledger, "pi_1", 5000).await;

        f.handler
            .handle(payment_event("evt_1", "payment_intent.succeeded", &donation, 5000))
            .await
            .unwrap();
        let same_id = f
            .handler
            .handle(payment_event("evt_1", "payment_intent.succeeded", &donation, 5000))
            .await
            .unwrap();
        let new_id = f
            .handler
            .handle(payment_event("evt_2", "payment_intent.succeeded", &donation, 5000))
            .await
            .unwrap();

        assert_eq!(same_id, HandlePaymentWebhookResult::AlreadyProcessed);
        assert_eq!(new_id, HandlePaymentWebhookResult::AlreadyProcessed);
        assert_eq!(f.ledger.project_amount(project_id()).unwrap().as_minor(), 5000);
    }

    #[tokio::test]
    async fn amount_mismatch_is_rejected_without_mutation() {
        let f = fixture();
        let donation = seed_pending(&f.ledger, "pi_1", 5000).await;

        let result = f
            .handler
            .handle(payment_event("evt_1", "payment_intent.succeeded", &donation, 4000))
            .await
            .unwrap();

        assert!(matches!(result, HandlePaymentWebhookResult::Rejected { .. }));
        let stored = f.ledger.find_donation(donation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DonationStatus::Pending);
        assert_eq!(f.ledger.project_amount(project_id()), Some(Money::ZERO));
    }

    #[tokio::test]
    async fn unknown_donation_is_retryable() {
        let f = fixture();
        let ghost = Donation::pending(
            NewDonation {
                id: DonationId::new(),
                project_id: project_id(),
                donor_id: UserId::new("donor").unwrap(),
                amount: Money::from_minor(5000).unwrap(),
                currency: Currency::usd(),
                external_payment_ref: "pi_ghost".to_string(),
                message: None,
                anonymous: false,
            },
            Timestamp::now(),
        )
        .unwrap();

        let err = f
            .handler
            .handle(payment_event("evt_1", "payment_intent.succeeded", &ghost, 5000))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::DonationNotFound(_)));
        assert!(err.is_retryable());
        assert!(f.events.is_empty());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failure
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn failure_marks_donation_failed() {
        let f = fixture();
        let donation = seed_pending(&f.ledger, "pi_1", 5000).await;

        let result = f
            .handler
            .handle(payment_event("evt_1", "payment_intent.payment_failed", &donation, 5000))
            .await
            .unwrap();

        assert_eq!(
            result,
            HandlePaymentWebhookResult::DonationFailed {
                donation_id: donation.id
            }
        );
        let stored = f.ledger.find_donation(donation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DonationStatus::Failed);
        assert_eq!(stored.failure_reason.as_deref(), Some("Your card was declined."));
    }

    #[tokio::test]
    async fn failure_after_completion_does_not_regress() {
        let f = fixture();
        let donation = seed_pending(&f.ledger, "pi_1", 5000).await;
        f.handler
            .handle(payment_event("evt_1", "payment_intent.succeeded", &donation, 5000))
            .await
            .unwrap();

        let result = f
            .handler
            .handle(payment_event("evt_2", "payment_intent.payment_failed", &donation, 5000))
            .await
            .unwrap();

        assert!(matches!(result, HandlePaymentWebhookResult::Ignored { .. }));
        let stored = f.ledger.find_donation(donation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DonationStatus::Completed);
    }

    #[tokio::test]
    async fn success_after_failure_is_rejected() {
        let f = fixture();
        let donation = seed_pending(&f.ledger, "pi_1", 5000).await;
        f.handler
            .handle(payment_event("evt_1", "payment_intent.payment_failed", &donation, 5000))
            .await
            .unwrap();

        let result = f
            .handler
            .handle(payment_event("evt_2", "payment_intent.succeeded", &donation, 5000))
            .await
            .unwrap();

        assert!(matches!(result, HandlePaymentWebhookResult::Rejected { .. }));
        assert_eq!(f.ledger.project_amount(project_id()), Some(Money::ZERO));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Routing
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn payment_without_donation_metadata_is_ignored() {
        let f = fixture();
        let payload = json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "created": 1_704_067_200,
            "livemode": false,
            "data": { "object": { "id": "pi_x", "amount": 900, "currency": "usd", "metadata": {} } }
        });

        let result = f
            .handler
            .handle(HandlePaymentWebhookCommand {
                payload: serde_json::to_vec(&payload).unwrap(),
                signature: String::new(),
            })
            .await
            .unwrap();

        assert!(matches!(result, HandlePaymentWebhookResult::Ignored { .. }));
    }

    #[tokio::test]
    async fn unknown_event_type_is_ignored_and_recorded() {
        let f = fixture();
        let payload = json!({
            "id": "evt_9",
            "type": "customer.created",
            "created": 1_704_067_200,
            "livemode": false,
            "data": { "object": { "id": "cus_1" } }
        });

        let result = f
            .handler
            .handle(HandlePaymentWebhookCommand {
                payload: serde_json::to_vec(&payload).unwrap(),
                signature: String::new(),
            })
            .await
            .unwrap();

        assert!(matches!(result, HandlePaymentWebhookResult::Ignored { .. }));
        assert!(f.events.find_by_event_id("evt_9").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected_before_any_lookup() {
        let ledger = InMemoryLedger::new();
        let store: Arc<dyn LedgerStore> = Arc::new(ledger.clone());
        let sink: Arc<dyn NotificationSink> = Arc::new(RecordingNotificationSink::new());
        let events = Arc::new(InMemoryWebhookEventRepository::new());
        let handler = HandlePaymentWebhookHandler::new(
            store.clone(),
            Arc::new(MockPaymentGateway::rejecting_webhooks()),
            sink.clone(),
            events.clone(),
            Arc::new(ProcessRenewalHandler::new(store.clone(), sink.clone())),
            Arc::new(HandleFailedPaymentHandler::new(store.clone(), sink.clone())),
            Arc::new(EndSubscriptionHandler::new(store, sink)),
        );

        let err = handler
            .handle(HandlePaymentWebhookCommand {
                payload: b"{}".to_vec(),
                signature: "t=1,v1=00".to_string(),
            })
            .await
            .unwrap_err();

        assert!(err.is_signature_failure());
        assert!(events.is_empty());
    }
}
