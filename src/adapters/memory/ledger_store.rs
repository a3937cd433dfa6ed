//! In-memory ledger for tests and local runs.
//!
//! Committed state lives behind a short-lived `std::sync::Mutex`. Transactions
//! are serialized by a `tokio::sync::Mutex` gate held for their whole
//! lifetime, which gives the same isolation as row locks on a single-node
//! database. Writes are staged on the transaction and applied on commit;
//! dropping a transaction discards them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use crate::domain::donation::{Donation, DonationStatus, Project};
use crate::domain::foundation::{
    DomainError, DonationId, ErrorCode, Money, PlanId, ProjectId, SubscriptionId, UserId,
};
use crate::domain::subscription::{Plan, Subscription, SubscriptionStatus};
use crate::ports::{LedgerStore, LedgerTransaction, ProjectDirectory};

#[derive(Debug, Clone)]
struct ProjectRow {
    project: Project,
    deleted: bool,
}

#[derive(Default)]
struct LedgerState {
    projects: HashMap<ProjectId, ProjectRow>,
    donations: HashMap<DonationId, Donation>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    plans: HashMap<PlanId, Plan>,
    /// Number of upcoming commits to fail with a database error.
    failing_commits: u32,
}

impl LedgerState {
    fn donation_by_ref(&self, payment_ref: &str) -> Option<&Donation> {
        self.donations
            .values()
            .find(|d| d.external_payment_ref == payment_ref)
    }
}

/// In-memory `LedgerStore` and `ProjectDirectory`.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    tx_gate: Arc<tokio::sync::Mutex<()>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        lock(&self.state)
    }

    // === Test Helpers ===

    /// Registers a project as the external CRUD would.
    pub fn add_project(&self, project: Project) {
        self.state().projects.insert(
            project.id,
            ProjectRow {
                project,
                deleted: false,
            },
        );
    }

    /// Soft-deletes a project.
    pub fn delete_project(&self, id: ProjectId) {
        if let Some(row) = self.state().projects.get_mut(&id) {
            row.deleted = true;
        }
    }

    pub fn add_plan(&self, plan: Plan) {
        self.state().plans.insert(plan.id, plan);
    }

    /// Stores a subscription directly, bypassing the uniqueness check.
    pub fn seed_subscription(&self, subscription: Subscription) {
        self.state()
            .subscriptions
            .insert(subscription.id, subscription);
    }

    /// Committed accumulator of a project, deleted or not.
    pub fn project_amount(&self, id: ProjectId) -> Option<Money> {
        self.state()
            .projects
            .get(&id)
            .map(|row| row.project.current_amount)
    }

    pub fn donations(&self) -> Vec<Donation> {
        let mut donations: Vec<Donation> = self.state().donations.values().cloned().collect();
        donations.sort_by_key(|d| d.created_at);
        donations
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.state().subscriptions.values().cloned().collect()
    }

    /// Makes the next `count` commits fail with a database error.
    pub fn fail_next_commits(&self, count: u32) {
        self.state().failing_commits = count;
    }
}

fn lock(state: &Mutex<LedgerState>) -> MutexGuard<'_, LedgerState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn current_subscription<'a>(
    candidates: impl Iterator<Item = &'a Subscription>,
    user_id: &UserId,
) -> Option<Subscription> {
    candidates
        .filter(|s| &s.user_id == user_id && s.status != SubscriptionStatus::Cancelled)
        .max_by_key(|s| s.created_at)
        .cloned()
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, DomainError> {
        let gate = Arc::clone(&self.tx_gate).lock_owned().await;
        Ok(Box::new(InMemoryTransaction {
            state: Arc::clone(&self.state),
            _gate: gate,
            donations: HashMap::new(),
            project_amounts: HashMap::new(),
            subscriptions: HashMap::new(),
        }))
    }

    async fn find_donation(&self, id: DonationId) -> Result<Option<Donation>, DomainError> {
        Ok(self.state().donations.get(&id).cloned())
    }

    async fn find_donation_by_payment_ref(
        &self,
        payment_ref: &str,
    ) -> Result<Option<Donation>, DomainError> {
        Ok(self.state().donation_by_ref(payment_ref).cloned())
    }

    async fn list_project_donations(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<Donation>, DomainError> {
        let mut donations: Vec<Donation> = self
            .state()
            .donations
            .values()
            .filter(|d| d.project_id == project_id)
            .cloned()
            .collect();
        donations.sort_by_key(|d| d.created_at);
        Ok(donations)
    }

    async fn find_current_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(current_subscription(
            self.state().subscriptions.values(),
            user_id,
        ))
    }

    async fn find_plan(&self, id: PlanId) -> Result<Option<Plan>, DomainError> {
        Ok(self.state().plans.get(&id).cloned())
    }

    async fn list_active_plans(&self) -> Result<Vec<Plan>, DomainError> {
        let mut plans: Vec<Plan> = self
            .state()
            .plans
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        plans.sort_by_key(|p| (p.price, p.id));
        Ok(plans)
    }
}

#[async_trait]
impl ProjectDirectory for InMemoryLedger {
    async fn find_project(&self, id: ProjectId) -> Result<Option<Project>, DomainError> {
        Ok(self
            .state()
            .projects
            .get(&id)
            .filter(|row| !row.deleted)
            .map(|row| row.project.clone()))
    }

    async fn count_active_projects(&self, owner: &UserId) -> Result<u64, DomainError> {
        Ok(self
            .state()
            .projects
            .values()
            .filter(|row| !row.deleted && &row.project.owner_id == owner)
            .count() as u64)
    }
}

/// Staged unit of work. Holds the transaction gate until dropped.
struct InMemoryTransaction {
    state: Arc<Mutex<LedgerState>>,
    _gate: OwnedMutexGuard<()>,
    donations: HashMap<DonationId, Donation>,
    project_amounts: HashMap<ProjectId, Money>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
}

impl InMemoryTransaction {
    fn donation(&self, id: DonationId) -> Option<Donation> {
        self.donations
            .get(&id)
            .cloned()
            .or_else(|| lock(&self.state).donations.get(&id).cloned())
    }

    fn donation_by_ref(&self, payment_ref: &str) -> Option<Donation> {
        self.donations
            .values()
            .find(|d| d.external_payment_ref == payment_ref)
            .cloned()
            .or_else(|| lock(&self.state).donation_by_ref(payment_ref).cloned())
    }

    /// Committed subscriptions overlaid with staged ones.
    fn visible_subscriptions(&self) -> Vec<Subscription> {
        let state = lock(&self.state);
        let mut merged: HashMap<SubscriptionId, Subscription> = state.subscriptions.clone();
        drop(state);
        for (id, sub) in &self.subscriptions {
            merged.insert(*id, sub.clone());
        }
        merged.into_values().collect()
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn lock_donation(&mut self, id: DonationId) -> Result<Option<Donation>, DomainError> {
        Ok(self.donation(id))
    }

    async fn lock_donation_by_payment_ref(
        &mut self,
        payment_ref: &str,
    ) -> Result<Option<Donation>, DomainError> {
        Ok(self.donation_by_ref(payment_ref))
    }

    async fn insert_donation(&mut self, donation: &Donation) -> Result<Donation, DomainError> {
        if let Some(existing) = self.donation_by_ref(&donation.external_payment_ref) {
            return Ok(existing);
        }
        if self.donation(donation.id).is_some() {
            return Err(DomainError::new(
                ErrorCode::ConsistencyViolation,
                format!("donation {} already exists", donation.id),
            ));
        }
        self.donations.insert(donation.id, donation.clone());
        Ok(donation.clone())
    }

    async fn update_donation(
        &mut self,
        donation: &Donation,
        expected: DonationStatus,
    ) -> Result<bool, DomainError> {
        match self.donation(donation.id) {
            Some(current) if current.status == expected => {
                self.donations.insert(donation.id, donation.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn adjust_project_amount(
        &mut self,
        project_id: ProjectId,
        delta_minor: i64,
    ) -> Result<Money, DomainError> {
        let current = match self.project_amounts.get(&project_id) {
            Some(amount) => *amount,
            None => lock(&self.state)
                .projects
                .get(&project_id)
                .map(|row| row.project.current_amount)
                .ok_or_else(|| {
                    DomainError::new(
                        ErrorCode::ProjectNotFound,
                        format!("project {} not found", project_id),
                    )
                })?,
        };

        let updated = current
            .as_minor()
            .checked_add(delta_minor)
            .filter(|total| *total >= 0)
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::ConsistencyViolation,
                    format!("project {} total would become negative", project_id),
                )
            })?;

        let updated = Money::from_minor(updated)?;
        self.project_amounts.insert(project_id, updated);
        Ok(updated)
    }

    async fn lock_current_subscription(
        &mut self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(current_subscription(
            self.visible_subscriptions().iter(),
            user_id,
        ))
    }

    async fn lock_subscription_by_ref(
        &mut self,
        external_ref: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .visible_subscriptions()
            .into_iter()
            .filter(|s| s.external_subscription_ref == external_ref)
            .max_by_key(|s| s.created_at))
    }

    async fn upsert_subscription(&mut self, subscription: &Subscription) -> Result<(), DomainError> {
        if subscription.status != SubscriptionStatus::Cancelled {
            let conflict = self.visible_subscriptions().into_iter().any(|s| {
                s.user_id == subscription.user_id
                    && s.id != subscription.id
                    && s.status != SubscriptionStatus::Cancelled
            });
            if conflict {
                return Err(DomainError::new(
                    ErrorCode::DuplicateSubscription,
                    format!("user {} already has a subscription", subscription.user_id),
                ));
            }
        }
        self.subscriptions
            .insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let this = *self;
        let mut state = lock(&this.state);

        if state.failing_commits > 0 {
            state.failing_commits -= 1;
            return Err(DomainError::database("simulated commit failure"));
        }

        for (id, amount) in this.project_amounts {
            if let Some(row) = state.projects.get_mut(&id) {
                row.project.current_amount = amount;
            }
        }
        state.donations.extend(this.donations);
        state.subscriptions.extend(this.subscriptions);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        Ok(())
    }
}
