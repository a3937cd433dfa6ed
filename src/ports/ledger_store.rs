//! LedgerStore port - persistence for donations, project totals and subscriptions.
//!
//! Reads outside a transaction see committed state only. Every mutation goes
//! through a `LedgerTransaction` that the calling handler owns: it locks the
//! rows it will change, applies compare-and-swap updates, and commits or rolls
//! back as one unit. Dropping a transaction without committing rolls it back.

use async_trait::async_trait;

use crate::domain::donation::{Donation, DonationStatus};
use crate::domain::foundation::{DomainError, DonationId, Money, PlanId, ProjectId, UserId};
use crate::domain::subscription::{Plan, Subscription};

/// Port for ledger persistence.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Opens a transaction.
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, DomainError>;

    async fn find_donation(&self, id: DonationId) -> Result<Option<Donation>, DomainError>;

    async fn find_donation_by_payment_ref(
        &self,
        payment_ref: &str,
    ) -> Result<Option<Donation>, DomainError>;

    /// All donations towards a project, oldest first.
    async fn list_project_donations(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<Donation>, DomainError>;

    /// The user's current (non-cancelled) subscription.
    async fn find_current_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError>;

    async fn find_plan(&self, id: PlanId) -> Result<Option<Plan>, DomainError>;

    /// Plans currently offered, cheapest first.
    async fn list_active_plans(&self) -> Result<Vec<Plan>, DomainError>;
}

/// A unit of work against the ledger.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Reads a donation and holds it until commit or rollback.
    async fn lock_donation(&mut self, id: DonationId) -> Result<Option<Donation>, DomainError>;

    async fn lock_donation_by_payment_ref(
        &mut self,
        payment_ref: &str,
    ) -> Result<Option<Donation>, DomainError>;

    /// Inserts a pending donation.
    ///
    /// Idempotent on `external_payment_ref`: if a row with the same reference
    /// exists, it is returned unchanged.
    async fn insert_donation(&mut self, donation: &Donation) -> Result<Donation, DomainError>;

    /// Writes `donation` if the stored status is still `expected`.
    ///
    /// Returns `false` without writing when another worker changed it first.
    async fn update_donation(
        &mut self,
        donation: &Donation,
        expected: DonationStatus,
    ) -> Result<bool, DomainError>;

    /// Atomically adds `delta_minor` (may be negative) to the project's total.
    ///
    /// Returns the new total. Fails with `ProjectNotFound` for an unknown
    /// project and `ConsistencyViolation` if the total would become negative.
    async fn adjust_project_amount(
        &mut self,
        project_id: ProjectId,
        delta_minor: i64,
    ) -> Result<Money, DomainError>;

    /// Reads the user's current subscription and holds it.
    async fn lock_current_subscription(
        &mut self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError>;

    async fn lock_subscription_by_ref(
        &mut self,
        external_ref: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Inserts or replaces a subscription (keyed by id).
    ///
    /// Fails with `DuplicateSubscription` if the user already has another
    /// non-cancelled subscription.
    async fn upsert_subscription(&mut self, subscription: &Subscription) -> Result<(), DomainError>;

    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn LedgerStore) {}
    }

    #[test]
    fn ledger_transaction_is_object_safe() {
        fn _accepts_dyn(_tx: Box<dyn LedgerTransaction>) {}
    }
}
