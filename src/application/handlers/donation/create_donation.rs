//! CreateDonationHandler - Command handler for starting a donation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::domain::donation::{Donation, DonationError, DonationPolicy, NewDonation};
use crate::domain::foundation::{AuthenticatedUser, DonationId, ProjectId, Timestamp};
use crate::ports::{LedgerStore, PaymentGateway, PaymentIntentRequest, ProjectDirectory};

const DEFAULT_PERSIST_BACKOFF: Duration = Duration::from_millis(50);

/// Command to start a donation towards a project.
#[derive(Debug, Clone)]
pub struct CreateDonationCommand {
    pub donor: AuthenticatedUser,
    pub project_id: ProjectId,
    /// Amount in major units, e.g. `25.00`.
    pub amount: Decimal,
    pub currency: Option<String>,
    pub message: Option<String>,
    pub anonymous: bool,
}

/// Result of a started donation.
///
/// The client confirms the payment with `client_secret`; the donation stays
/// `pending` until the gateway reports the outcome.
#[derive(Debug, Clone)]
pub struct CreateDonationResult {
    pub donation_id: DonationId,
    pub client_secret: String,
    pub external_payment_ref: String,
}

/// Handler for starting donations.
///
/// Creates the payment intent first, then records the pending donation.
/// Nothing touches the project total until the gateway confirms the charge.
pub struct CreateDonationHandler {
    ledger: Arc<dyn LedgerStore>,
    projects: Arc<dyn ProjectDirectory>,
    gateway: Arc<dyn PaymentGateway>,
    policy: DonationPolicy,
    persist_backoff: Duration,
}

impl CreateDonationHandler {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        projects: Arc<dyn ProjectDirectory>,
        gateway: Arc<dyn PaymentGateway>,
        policy: DonationPolicy,
    ) -> Self {
        Self {
            ledger,
            projects,
            gateway,
            policy,
            persist_backoff: DEFAULT_PERSIST_BACKOFF,
        }
    }

    /// Base delay between persist attempts; attempt `n` waits `n * backoff`.
    pub fn with_persist_backoff(mut self, backoff: Duration) -> Self {
        self.persist_backoff = backoff;
        self
    }

    pub async fn handle(
        &self,
        cmd: CreateDonationCommand,
    ) -> Result<CreateDonationResult, DonationError> {
        // 1. Validate input
        let amount = self.policy.validate_amount(cmd.amount)?;
        let currency = self.policy.resolve_currency(cmd.currency.as_deref())?;
        let message = self.policy.normalize_message(cmd.message)?;

        // 2. Project must exist and not be deleted
        let project = self
            .projects
            .find_project(cmd.project_id)
            .await?
            .ok_or(DonationError::project_not_found(cmd.project_id))?;

        // 3. Create the payment intent
        let donation_id = DonationId::new();
        let mut metadata = BTreeMap::new();
        metadata.insert("donation_id".to_string(), donation_id.to_string());
        metadata.insert("project_id".to_string(), project.id.to_string());
        metadata.insert("user_id".to_string(), cmd.donor.id.to_string());

        let intent = self
            .gateway
            .create_payment_intent(PaymentIntentRequest {
                amount,
                currency: currency.clone(),
                description: format!("Donation to project {}", project.id),
                metadata,
                idempotency_key: format!("donation-{}", donation_id),
            })
            .await
            .map_err(|e| {
                tracing::warn!(
                    donation_id = %donation_id,
                    project_id = %project.id,
                    user_id = %cmd.donor.id,
                    gateway_code = %e.code,
                    "Payment intent creation failed"
                );
                DonationError::from(e)
            })?;

        // 4. Record the pending donation
        let donation = Donation::pending(
            NewDonation {
                id: donation_id,
                project_id: project.id,
                donor_id: cmd.donor.id.clone(),
                amount,
                currency,
                external_payment_ref: intent.id.clone(),
                message,
                anonymous: cmd.anonymous,
            },
            Timestamp::now(),
        )?;

        let stored = self.persist_with_retry(&donation).await?;

        tracing::info!(
            donation_id = %stored.id,
            project_id = %stored.project_id,
            user_id = %stored.donor_id,
            payment_ref = %stored.external_payment_ref,
            amount_minor = stored.amount.as_minor(),
            "Donation created"
        );

        Ok(CreateDonationResult {
            donation_id: stored.id,
            client_secret: intent.client_secret,
            external_payment_ref: stored.external_payment_ref,
        })
    }

    async fn persist_with_retry(&self, donation: &Donation) -> Result<Donation, DonationError> {
        let attempts = self.policy.persist_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.persist(donation).await {
                Ok(stored) => return Ok(stored),
                Err(e) => {
                    tracing::warn!(
                        donation_id = %donation.id,
                        payment_ref = %donation.external_payment_ref,
                        attempt,
                        error = %e,
                        "Failed to persist donation"
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.persist_backoff * attempt).await;
                    }
                }
            }
        }

        // The payment intent exists at the gateway but nothing references it.
        tracing::error!(
            donation_id = %donation.id,
            project_id = %donation.project_id,
            user_id = %donation.donor_id,
            payment_ref = %donation.external_payment_ref,
            "Orphaned payment intent: donation could not be recorded"
        );

        Err(DonationError::infrastructure(format!(
            "failed to record donation: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn persist(&self, donation: &Donation) -> Result<Donation, DonationError> {
        let mut tx = self.ledger.begin().await?;
        let stored = tx.insert_donation(donation).await?;
        tx.commit().await?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryLedger;
    use crate::adapters::stripe::MockPaymentGateway;
    use crate::domain::donation::{DonationStatus, Project};
    use crate::domain::foundation::{ErrorCode, Money, UserId};
    use crate::ports::GatewayError;
    use std::str::FromStr;

    // ════════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════════

    fn project_id() -> ProjectId {
        ProjectId::new(42).unwrap()
    }

    fn setup() -> (InMemoryLedger, MockPaymentGateway, CreateDonationHandler) {
        let ledger = InMemoryLedger::new();
        ledger.add_project(Project {
            id: project_id(),
            owner_id: UserId::new("owner").unwrap(),
            goal_amount: Money::from_minor(1_000_000).unwrap(),
            current_amount: Money::ZERO,
        });
        let gateway = MockPaymentGateway::new();
        let handler = CreateDonationHandler::new(
            Arc::new(ledger.clone()),
            Arc::new(ledger.clone()),
            Arc::new(gateway.clone()),
            DonationPolicy::default(),
        )
        .with_persist_backoff(Duration::from_millis(1));
        (ledger, gateway, handler)
    }

    fn command(amount: &str) -> CreateDonationCommand {
        CreateDonationCommand {
            donor: AuthenticatedUser::member(UserId::new("donor-1").unwrap()),
            project_id: project_id(),
            amount: Decimal::from_str(amount).unwrap(),
            currency: None,
            message: Some("  Keep going!  ".to_string()),
            anonymous: false,
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Success
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn creates_pending_donation_without_touching_total() {
        let (ledger, gateway, handler) = setup();

        let result = handler.handle(command("50.00")).await.unwrap();

        let donation = ledger.find_donation(result.donation_id).await.unwrap().unwrap();
        assert_eq!(donation.status, DonationStatus::Pending);
        assert_eq!(donation.amount.as_minor(), 5000);
        assert_eq!(donation.external_payment_ref, result.external_payment_ref);
        assert_eq!(donation.message.as_deref(), Some("Keep going!"));
        assert_eq!(ledger.project_amount(project_id()), Some(Money::ZERO));
        assert!(!result.client_secret.is_empty());

        let call = &gateway.calls()[0];
        assert_eq!(call.args[2], format!("donation-{}", result.donation_id));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Validation
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn rejects_amount_below_minimum_before_gateway_call() {
        let (_, gateway, handler) = setup();

        let err = handler.handle(command("0.50")).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::ValidationFailed);
        assert!(!gateway.was_called("create_payment_intent"));
    }

    #[tokio::test]
    async fn rejects_deleted_project() {
        let (ledger, gateway, handler) = setup();
        ledger.delete_project(project_id());

        let err = handler.handle(command("10.00")).await.unwrap_err();

        assert!(matches!(err, DonationError::ProjectNotFound(_)));
        assert!(!gateway.was_called("create_payment_intent"));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failures
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn card_decline_is_shown_and_nothing_is_stored() {
        let (ledger, gateway, handler) = setup();
        gateway.set_error(GatewayError::card_declined("Your card was declined."));

        let err = handler.handle(command("10.00")).await.unwrap_err();

        assert_eq!(err.message(), "Your card was declined.");
        assert!(ledger.donations().is_empty());
    }

    #[tokio::test]
    async fn gateway_outage_hides_detail() {
        let (_, gateway, handler) = setup();
        gateway.set_error(GatewayError::authentication("Invalid API key sk_test_123"));

        let err = handler.handle(command("10.00")).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::ExternalServiceError);
        assert_eq!(err.message(), "payment processing failed");
    }

    #[tokio::test]
    async fn transient_persist_failure_is_retried() {
        let (ledger, _, handler) = setup();
        ledger.fail_next_commits(2);

        let result = handler.handle(command("10.00")).await.unwrap();

        assert!(ledger.find_donation(result.donation_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn persistent_persist_failure_reports_infrastructure_error() {
        let (ledger, _, handler) = setup();
        ledger.fail_next_commits(3);

        let err = handler.handle(command("10.00")).await.unwrap_err();

        assert!(matches!(err, DonationError::Infrastructure(_)));
        assert!(ledger.donations().is_empty());
    }
}
