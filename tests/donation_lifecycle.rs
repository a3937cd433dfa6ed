//! Integration tests for the donation lifecycle.
//!
//! Drives the create, webhook and refund handlers together against the
//! in-memory ledger and the mock gateway, checking the project total after
//! every step.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;

use crowdfund_ledger::adapters::notification::NotificationKind;
use crowdfund_ledger::adapters::{
    InMemoryLedger, InMemoryWebhookEventRepository, MockPaymentGateway,
    RecordingNotificationSink,
};
use crowdfund_ledger::application::{
    CreateDonationCommand, CreateDonationHandler, CreateDonationResult, EndSubscriptionHandler,
    HandleFailedPaymentHandler, HandlePaymentWebhookCommand, HandlePaymentWebhookHandler,
    HandlePaymentWebhookResult, ProcessRefundCommand, ProcessRefundHandler, ProcessRenewalHandler,
};
use crowdfund_ledger::domain::donation::{Donation, DonationPolicy, DonationStatus, Project};
use crowdfund_ledger::domain::foundation::{
    AuthenticatedUser, ErrorCode, Money, ProjectId, UserId,
};
use crowdfund_ledger::ports::{LedgerStore, NotificationSink, PaymentGateway, ProjectDirectory};

// =============================================================================
// Test platform
// =============================================================================

struct Platform {
    ledger: InMemoryLedger,
    gateway: MockPaymentGateway,
    notifier: Arc<RecordingNotificationSink>,
    create: CreateDonationHandler,
    webhook: Arc<HandlePaymentWebhookHandler>,
    refund: ProcessRefundHandler,
}

const PROJECT: i64 = 7;

fn project_id() -> ProjectId {
    ProjectId::new(PROJECT).unwrap()
}

fn platform() -> Platform {
    let ledger = InMemoryLedger::new();
    ledger.add_project(Project {
        id: project_id(),
        owner_id: UserId::new("creator").unwrap(),
        goal_amount: Money::from_minor(500_000).unwrap(),
        current_amount: Money::ZERO,
    });

    let gateway = MockPaymentGateway::new();
    let notifier = Arc::new(RecordingNotificationSink::new());

    let store: Arc<dyn LedgerStore> = Arc::new(ledger.clone());
    let projects: Arc<dyn ProjectDirectory> = Arc::new(ledger.clone());
    let payments: Arc<dyn PaymentGateway> = Arc::new(gateway.clone());
    let sink: Arc<dyn NotificationSink> = notifier.clone();

    let webhook = HandlePaymentWebhookHandler::new(
        store.clone(),
        payments.clone(),
        sink.clone(),
        Arc::new(InMemoryWebhookEventRepository::new()),
        Arc::new(ProcessRenewalHandler::new(store.clone(), sink.clone())),
        Arc::new(HandleFailedPaymentHandler::new(store.clone(), sink.clone())),
        Arc::new(EndSubscriptionHandler::new(store.clone(), sink)),
    );

    Platform {
        create: CreateDonationHandler::new(
            store.clone(),
            projects,
            payments.clone(),
            DonationPolicy::default(),
        ),
        webhook: Arc::new(webhook),
        refund: ProcessRefundHandler::new(store, payments),
        ledger,
        gateway,
        notifier,
    }
}

impl Platform {
    async fn donate(&self, donor: &str, cents: i64) -> CreateDonationResult {
        self.create
            .handle(CreateDonationCommand {
                donor: AuthenticatedUser::member(UserId::new(donor).unwrap()),
                project_id: project_id(),
                amount: Decimal::new(cents, 2),
                currency: None,
                message: Some("Good luck!".to_string()),
                anonymous: false,
            })
            .await
            .unwrap()
    }

    async fn deliver(
        &self,
        event_id: &str,
        event_type: &str,
        donation: &CreateDonationResult,
        cents: i64,
    ) -> HandlePaymentWebhookResult {
        self.webhook
            .handle(payment_event(event_id, event_type, donation, cents))
            .await
            .unwrap()
    }

    async fn refund(&self, donation: &CreateDonationResult, cents: Option<i64>) -> Donation {
        self.refund
            .handle(ProcessRefundCommand {
                actor: admin(),
                donation_id: donation.donation_id,
                amount: cents.map(|c| Decimal::new(c, 2)),
                reason: Some("requested_by_customer".to_string()),
            })
            .await
            .unwrap()
            .donation
    }

    fn total(&self) -> i64 {
        self.ledger.project_amount(project_id()).unwrap().as_minor()
    }

    fn donation(&self, created: &CreateDonationResult) -> Donation {
        self.ledger
            .donations()
            .into_iter()
            .find(|d| d.id == created.donation_id)
            .unwrap()
    }

    /// Sum of net contributions over every stored donation.
    fn net_sum(&self) -> i64 {
        self.ledger
            .donations()
            .iter()
            .map(|d| d.net_contribution().as_minor())
            .sum()
    }
}

fn admin() -> AuthenticatedUser {
    AuthenticatedUser::admin(UserId::new("ops").unwrap())
}

fn payment_event(
    event_id: &str,
    event_type: &str,
    donation: &CreateDonationResult,
    cents: i64,
) -> HandlePaymentWebhookCommand {
    let payload = json!({
        "id": event_id,
        "type": event_type,
        "created": 1_704_067_200,
        "livemode": false,
        "data": { "object": {
            "id": donation.external_payment_ref,
            "amount": cents,
            "currency": "usd",
            "status": "succeeded",
            "metadata": {
                "donation_id": donation.donation_id.to_string(),
                "project_id": PROJECT.to_string(),
            },
            "last_payment_error": { "message": "Your card was declined." }
        }}
    });
    HandlePaymentWebhookCommand {
        payload: serde_json::to_vec(&payload).unwrap(),
        signature: "t=0,v1=00".to_string(),
    }
}

const SUCCEEDED: &str = "payment_intent.succeeded";
const FAILED: &str = "payment_intent.payment_failed";

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn donation_confirmation_and_partial_refund_keep_total_consistent() {
    let p = platform();

    let created = p.donate("donor-1", 5000).await;
    assert_eq!(p.total(), 0, "pending donations do not count");
    assert_eq!(p.donation(&created).status, DonationStatus::Pending);

    let result = p.deliver("evt_ok", SUCCEEDED, &created, 5000).await;
    assert!(matches!(
        result,
        HandlePaymentWebhookResult::DonationCompleted { project_total, .. }
            if project_total.as_minor() == 5000
    ));
    assert_eq!(p.total(), 5000);
    assert_eq!(p.donation(&created).status, DonationStatus::Completed);
    assert_eq!(p.notifier.count(NotificationKind::DonationConfirmation), 1);

    let refunded = p.refund(&created, Some(2000)).await;
    assert_eq!(refunded.status, DonationStatus::Refunded);
    assert_eq!(refunded.refund_amount.map(|m| m.as_minor()), Some(2000));
    assert_eq!(p.total(), 3000);
    assert_eq!(p.total(), p.net_sum());
}

#[tokio::test]
async fn full_refund_defaults_to_donation_amount() {
    let p = platform();
    let created = p.donate("donor-1", 1500).await;
    p.deliver("evt_ok", SUCCEEDED, &created, 1500).await;

    let refunded = p.refund(&created, None).await;

    assert_eq!(refunded.refund_amount.map(|m| m.as_minor()), Some(1500));
    assert_eq!(p.total(), 0);
    assert!(p.gateway.was_called("refund"));
}

#[tokio::test]
async fn failed_payment_never_touches_total() {
    let p = platform();
    let created = p.donate("donor-1", 2500).await;

    let result = p.deliver("evt_fail", FAILED, &created, 2500).await;

    assert_eq!(
        result,
        HandlePaymentWebhookResult::DonationFailed {
            donation_id: created.donation_id
        }
    );
    let stored = p.donation(&created);
    assert_eq!(stored.status, DonationStatus::Failed);
    assert_eq!(stored.failure_reason.as_deref(), Some("Your card was declined."));
    assert_eq!(p.total(), 0);
}

// =============================================================================
// Redelivery and ordering
// =============================================================================

#[tokio::test]
async fn same_event_delivered_twice_counts_once() {
    let p = platform();
    let created = p.donate("donor-1", 5000).await;

    p.deliver("evt_1", SUCCEEDED, &created, 5000).await;
    let second = p.deliver("evt_1", SUCCEEDED, &created, 5000).await;

    assert_eq!(second, HandlePaymentWebhookResult::AlreadyProcessed);
    assert_eq!(p.total(), 5000);
}

#[tokio::test]
async fn distinct_events_for_same_payment_count_once() {
    let p = platform();
    let created = p.donate("donor-1", 5000).await;

    p.deliver("evt_1", SUCCEEDED, &created, 5000).await;
    let retry = p.deliver("evt_2", SUCCEEDED, &created, 5000).await;

    assert_eq!(retry, HandlePaymentWebhookResult::AlreadyProcessed);
    assert_eq!(p.total(), 5000);
    assert_eq!(p.notifier.count(NotificationKind::DonationConfirmation), 1);
}

#[tokio::test]
async fn failure_after_success_does_not_regress() {
    let p = platform();
    let created = p.donate("donor-1", 5000).await;
    p.deliver("evt_ok", SUCCEEDED, &created, 5000).await;

    let late = p.deliver("evt_late_fail", FAILED, &created, 5000).await;

    assert!(matches!(late, HandlePaymentWebhookResult::Ignored { .. }));
    assert_eq!(p.donation(&created).status, DonationStatus::Completed);
    assert_eq!(p.total(), 5000);
}

#[tokio::test]
async fn success_after_refund_is_not_recounted() {
    let p = platform();
    let created = p.donate("donor-1", 5000).await;
    p.deliver("evt_ok", SUCCEEDED, &created, 5000).await;
    p.refund(&created, None).await;

    let replay = p.deliver("evt_replay", SUCCEEDED, &created, 5000).await;

    assert_eq!(replay, HandlePaymentWebhookResult::AlreadyProcessed);
    assert_eq!(p.total(), 0);
}

#[tokio::test]
async fn amount_mismatch_is_rejected_without_effect() {
    let p = platform();
    let created = p.donate("donor-1", 5000).await;

    let result = p.deliver("evt_bad", SUCCEEDED, &created, 4999).await;

    assert!(matches!(result, HandlePaymentWebhookResult::Rejected { .. }));
    assert_eq!(p.donation(&created).status, DonationStatus::Pending);
    assert_eq!(p.total(), 0);
}

#[tokio::test]
async fn concurrent_deliveries_of_one_payment_credit_once() {
    let p = platform();
    let created = p.donate("donor-1", 5000).await;

    let deliveries = (0..8).map(|i| {
        let webhook = p.webhook.clone();
        let cmd = payment_event(&format!("evt_{}", i), SUCCEEDED, &created, 5000);
        async move { webhook.handle(cmd).await }
    });
    let results = futures::future::join_all(deliveries).await;

    let completed = results
        .iter()
        .filter(|r| matches!(r, Ok(HandlePaymentWebhookResult::DonationCompleted { .. })))
        .count();
    assert_eq!(completed, 1);
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(p.total(), 5000);
}

#[tokio::test]
async fn concurrent_donations_to_one_project_all_count() {
    let p = platform();
    let mut created = Vec::new();
    for i in 0..5 {
        created.push(p.donate(&format!("donor-{}", i), 1000 + i * 100).await);
    }

    let deliveries = created.iter().enumerate().map(|(i, c)| {
        let webhook = p.webhook.clone();
        let cmd = payment_event(&format!("evt_{}", i), SUCCEEDED, c, 1000 + i as i64 * 100);
        async move { webhook.handle(cmd).await }
    });
    futures::future::join_all(deliveries).await;

    assert_eq!(p.total(), 1000 + 1100 + 1200 + 1300 + 1400);
    assert_eq!(p.total(), p.net_sum());
}

// =============================================================================
// Refund rules
// =============================================================================

#[tokio::test]
async fn refund_above_donation_amount_is_rejected() {
    let p = platform();
    let created = p.donate("donor-1", 5000).await;
    p.deliver("evt_ok", SUCCEEDED, &created, 5000).await;

    let err = p
        .refund
        .handle(ProcessRefundCommand {
            actor: admin(),
            donation_id: created.donation_id,
            amount: Some(Decimal::new(5001, 2)),
            reason: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::ValidationFailed);
    assert!(!p.gateway.was_called("refund"));
    assert_eq!(p.total(), 5000);
}

#[tokio::test]
async fn pending_donation_cannot_be_refunded() {
    let p = platform();
    let created = p.donate("donor-1", 5000).await;

    let err = p
        .refund
        .handle(ProcessRefundCommand {
            actor: admin(),
            donation_id: created.donation_id,
            amount: None,
            reason: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::ValidationFailed);
    assert!(!p.gateway.was_called("refund"));
    assert_eq!(p.total(), 0);
}

#[tokio::test]
async fn member_cannot_refund() {
    let p = platform();
    let created = p.donate("donor-1", 5000).await;
    p.deliver("evt_ok", SUCCEEDED, &created, 5000).await;

    let err = p
        .refund
        .handle(ProcessRefundCommand {
            actor: AuthenticatedUser::member(UserId::new("donor-1").unwrap()),
            donation_id: created.donation_id,
            amount: None,
            reason: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::Forbidden);
    assert_eq!(p.total(), 5000);
}

#[tokio::test]
async fn second_refund_does_not_reduce_total_again() {
    let p = platform();
    let created = p.donate("donor-1", 5000).await;
    p.deliver("evt_ok", SUCCEEDED, &created, 5000).await;
    p.refund(&created, Some(2000)).await;

    let err = p
        .refund
        .handle(ProcessRefundCommand {
            actor: admin(),
            donation_id: created.donation_id,
            amount: Some(Decimal::new(1000, 2)),
            reason: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::ValidationFailed);
    assert_eq!(p.gateway.call_count("refund"), 1);
    assert_eq!(p.total(), 3000);
    assert_eq!(p.total(), p.net_sum());
}
