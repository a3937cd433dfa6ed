//! Shared state for the HTTP routers.

use std::sync::Arc;

use crate::application::{
    CanCreateProjectHandler, CancelSubscriptionHandler, CreateDonationHandler,
    DowngradeSubscriptionHandler, EndSubscriptionHandler, GetCommissionRateHandler,
    HandleFailedPaymentHandler, HandlePaymentWebhookHandler, ListPlansHandler,
    ProcessRefundHandler, ProcessRenewalHandler, ReactivateSubscriptionHandler,
    UpgradeSubscriptionHandler,
};
use crate::domain::donation::DonationPolicy;
use crate::ports::{
    LedgerStore, NotificationSink, PaymentGateway, ProjectDirectory, WebhookEventRepository,
};

/// Shared application state containing all dependencies.
///
/// Cloned for each request; every dependency is Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerStore>,
    pub projects: Arc<dyn ProjectDirectory>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn NotificationSink>,
    pub webhook_events: Arc<dyn WebhookEventRepository>,
    pub policy: DonationPolicy,
}

impl AppState {
    // Create handlers on demand from the shared state.

    pub fn create_donation_handler(&self) -> CreateDonationHandler {
        CreateDonationHandler::new(
            self.ledger.clone(),
            self.projects.clone(),
            self.gateway.clone(),
            self.policy.clone(),
        )
    }

    pub fn refund_handler(&self) -> ProcessRefundHandler {
        ProcessRefundHandler::new(self.ledger.clone(), self.gateway.clone())
    }

    pub fn webhook_handler(&self) -> HandlePaymentWebhookHandler {
        HandlePaymentWebhookHandler::new(
            self.ledger.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
            self.webhook_events.clone(),
            Arc::new(ProcessRenewalHandler::new(
                self.ledger.clone(),
                self.notifier.clone(),
            )),
            Arc::new(HandleFailedPaymentHandler::new(
                self.ledger.clone(),
                self.notifier.clone(),
            )),
            Arc::new(EndSubscriptionHandler::new(
                self.ledger.clone(),
                self.notifier.clone(),
            )),
        )
    }

    pub fn can_create_project_handler(&self) -> CanCreateProjectHandler {
        CanCreateProjectHandler::new(self.ledger.clone(), self.projects.clone())
    }

    pub fn commission_rate_handler(&self) -> GetCommissionRateHandler {
        GetCommissionRateHandler::new(self.ledger.clone())
    }

    pub fn list_plans_handler(&self) -> ListPlansHandler {
        ListPlansHandler::new(self.ledger.clone())
    }

    pub fn upgrade_handler(&self) -> UpgradeSubscriptionHandler {
        UpgradeSubscriptionHandler::new(
            self.ledger.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
        )
    }

    pub fn downgrade_handler(&self) -> DowngradeSubscriptionHandler {
        DowngradeSubscriptionHandler::new(
            self.ledger.clone(),
            self.projects.clone(),
            self.gateway.clone(),
        )
    }

    pub fn cancel_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(
            self.ledger.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
        )
    }

    pub fn reactivate_handler(&self) -> ReactivateSubscriptionHandler {
        ReactivateSubscriptionHandler::new(
            self.ledger.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
        )
    }
}
