//! Shared test fixtures for the subscription handlers.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::adapters::memory::InMemoryLedger;
use crate::adapters::notification::RecordingNotificationSink;
use crate::adapters::stripe::MockPaymentGateway;
use crate::domain::donation::Project;
use crate::domain::foundation::{Currency, Money, PlanId, ProjectId, SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{
    BillingInterval, CommissionRate, NewSubscription, Plan, ProjectLimit, Subscription,
    SubscriptionStatus,
};
use crate::ports::{LedgerStore, NotificationSink, PaymentGateway};

use super::{UpgradeSubscriptionCommand, UpgradeSubscriptionHandler};

pub const BASIC: i64 = 1;
pub const STARTER: i64 = 2;
pub const PRO: i64 = 3;
pub const RETIRED: i64 = 4;

pub struct World {
    pub ledger: InMemoryLedger,
    pub gateway: MockPaymentGateway,
    pub notifier: Arc<RecordingNotificationSink>,
    pub store: Arc<dyn LedgerStore>,
    pub payments: Arc<dyn PaymentGateway>,
    pub sink: Arc<dyn NotificationSink>,
}

impl World {
    pub fn add_project(&self, owner: &UserId, id: i64) -> ProjectId {
        let id = ProjectId::new(id).unwrap();
        self.ledger.add_project(Project {
            id,
            owner_id: owner.clone(),
            goal_amount: Money::from_minor(100_000).unwrap(),
            current_amount: Money::ZERO,
        });
        id
    }

    /// Stores a subscription the mock gateway does not know about.
    pub fn seed(&self, user: &UserId, plan: i64, status: SubscriptionStatus) -> Subscription {
        let now = Timestamp::now();
        let mut subscription = Subscription::start(
            NewSubscription {
                id: SubscriptionId::new(),
                user_id: user.clone(),
                plan_id: plan_id(plan),
                status: SubscriptionStatus::Active,
                external_subscription_ref: format!("sub_seed_{}", user),
                current_period_start: now,
                current_period_end: now.add_days(30),
            },
            now,
        )
        .unwrap();
        subscription.status = status;
        self.ledger.seed_subscription(subscription.clone());
        subscription
    }

    /// Subscribes through the gateway, as a user upgrading from the free tier.
    pub async fn subscribe(&self, user: &UserId, plan: i64) -> Subscription {
        UpgradeSubscriptionHandler::new(self.store.clone(), self.payments.clone(), self.sink.clone())
            .handle(UpgradeSubscriptionCommand {
                user_id: user.clone(),
                plan_id: plan_id(plan),
                payment_method_ref: Some("pm_card_visa".to_string()),
            })
            .await
            .unwrap()
            .subscription
    }

    pub async fn current(&self, user: &UserId) -> Option<Subscription> {
        self.store.find_current_subscription(user).await.unwrap()
    }
}

pub fn world() -> World {
    let ledger = InMemoryLedger::new();
    ledger.add_plan(plan(BASIC, "Basic", 400, ProjectLimit::Limited(2), Decimal::new(45, 3), true));
    ledger.add_plan(plan(STARTER, "Starter", 900, ProjectLimit::Limited(5), Decimal::new(4, 2), true));
    ledger.add_plan(plan(PRO, "Pro", 2900, ProjectLimit::Unlimited, Decimal::new(3, 2), true));
    ledger.add_plan(plan(RETIRED, "Legacy", 100, ProjectLimit::Limited(3), Decimal::new(5, 2), false));

    let gateway = MockPaymentGateway::new();
    let notifier = Arc::new(RecordingNotificationSink::new());
    World {
        store: Arc::new(ledger.clone()),
        payments: Arc::new(gateway.clone()),
        sink: notifier.clone(),
        ledger,
        gateway,
        notifier,
    }
}

pub fn plan_id(id: i64) -> PlanId {
    PlanId::new(id).unwrap()
}

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn plan(
    id: i64,
    name: &str,
    price_minor: i64,
    limit: ProjectLimit,
    rate: Decimal,
    is_active: bool,
) -> Plan {
    Plan {
        id: plan_id(id),
        name: name.to_string(),
        price: Money::from_minor(price_minor).unwrap(),
        currency: Currency::usd(),
        billing_interval: BillingInterval::Monthly,
        project_limit: limit,
        commission_rate: CommissionRate::new(rate).unwrap(),
        external_price_ref: format!("price_{}", name.to_lowercase()),
        is_active,
    }
}
