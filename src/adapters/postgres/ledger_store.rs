//! PostgreSQL implementation of LedgerStore and ProjectDirectory.
//!
//! Transactions use `SELECT ... FOR UPDATE` on the rows they will change,
//! status-guarded `UPDATE`s for compare-and-swap, and an in-place
//! `current_amount + delta` for project accumulators.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::donation::{Donation, DonationStatus, Project};
use crate::domain::foundation::{
    Currency, DomainError, DonationId, ErrorCode, Money, PlanId, ProjectId, SubscriptionId,
    Timestamp, UserId,
};
use crate::domain::subscription::{
    BillingInterval, CommissionRate, Plan, ProjectLimit, Subscription, SubscriptionStatus,
};
use crate::ports::{LedgerStore, LedgerTransaction, ProjectDirectory};

const DONATION_COLUMNS: &str = "id, project_id, donor_id, amount, currency, status, \
    external_payment_ref, message, anonymous, refund_amount, refund_ref, refund_reason, \
    failure_reason, created_at, completed_at, failed_at, refunded_at, updated_at";

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_id, status, external_subscription_ref, \
    current_period_start, current_period_end, scheduled_plan_id, cancelled_at, created_at, updated_at";

const PLAN_COLUMNS: &str = "id, name, price, currency, billing_interval, project_limit, \
    commission_rate, external_price_ref, is_active";

const ONE_LIVE_SUBSCRIPTION_INDEX: &str = "user_subscriptions_one_live_idx";

/// PostgreSQL implementation of the ledger ports.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Invalid {}: {}", what, detail))
}

fn ts(dt: DateTime<Utc>) -> Timestamp {
    Timestamp::from_datetime(dt)
}

// ════════════════════════════════════════════════════════════════════════════════
// Row types
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct DonationRow {
    id: Uuid,
    project_id: i64,
    donor_id: String,
    amount: i64,
    currency: String,
    status: String,
    external_payment_ref: String,
    message: Option<String>,
    anonymous: bool,
    refund_amount: Option<i64>,
    refund_ref: Option<String>,
    refund_reason: Option<String>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DonationRow> for Donation {
    type Error = DomainError;

    fn try_from(row: DonationRow) -> Result<Self, Self::Error> {
        Ok(Donation {
            id: DonationId::from_uuid(row.id),
            project_id: ProjectId::new(row.project_id).map_err(|e| corrupt("project_id", e))?,
            donor_id: UserId::new(row.donor_id).map_err(|e| corrupt("donor_id", e))?,
            amount: Money::from_minor(row.amount).map_err(|e| corrupt("amount", e))?,
            currency: Currency::new(&row.currency).map_err(|e| corrupt("currency", e))?,
            status: DonationStatus::parse(&row.status)
                .ok_or_else(|| corrupt("donation status", &row.status))?,
            external_payment_ref: row.external_payment_ref,
            message: row.message,
            anonymous: row.anonymous,
            refund_amount: row
                .refund_amount
                .map(Money::from_minor)
                .transpose()
                .map_err(|e| corrupt("refund_amount", e))?,
            refund_ref: row.refund_ref,
            refund_reason: row.refund_reason,
            failure_reason: row.failure_reason,
            created_at: ts(row.created_at),
            completed_at: row.completed_at.map(ts),
            failed_at: row.failed_at.map(ts),
            refunded_at: row.refunded_at.map(ts),
            updated_at: ts(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: String,
    plan_id: i64,
    status: String,
    external_subscription_ref: String,
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
    scheduled_plan_id: Option<i64>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            user_id: UserId::new(row.user_id).map_err(|e| corrupt("user_id", e))?,
            plan_id: PlanId::new(row.plan_id).map_err(|e| corrupt("plan_id", e))?,
            status: SubscriptionStatus::parse(&row.status)
                .ok_or_else(|| corrupt("subscription status", &row.status))?,
            external_subscription_ref: row.external_subscription_ref,
            current_period_start: ts(row.current_period_start),
            current_period_end: ts(row.current_period_end),
            scheduled_plan_id: row
                .scheduled_plan_id
                .map(PlanId::new)
                .transpose()
                .map_err(|e| corrupt("scheduled_plan_id", e))?,
            cancelled_at: row.cancelled_at.map(ts),
            created_at: ts(row.created_at),
            updated_at: ts(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: i64,
    name: String,
    price: i64,
    currency: String,
    billing_interval: String,
    project_limit: i32,
    commission_rate: Decimal,
    external_price_ref: String,
    is_active: bool,
}

impl TryFrom<PlanRow> for Plan {
    type Error = DomainError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        Ok(Plan {
            id: PlanId::new(row.id).map_err(|e| corrupt("plan id", e))?,
            name: row.name,
            price: Money::from_minor(row.price).map_err(|e| corrupt("price", e))?,
            currency: Currency::new(&row.currency).map_err(|e| corrupt("currency", e))?,
            billing_interval: BillingInterval::parse(&row.billing_interval)
                .ok_or_else(|| corrupt("billing interval", &row.billing_interval))?,
            project_limit: ProjectLimit::from_raw(row.project_limit)
                .map_err(|e| corrupt("project_limit", e))?,
            commission_rate: CommissionRate::new(row.commission_rate)
                .map_err(|e| corrupt("commission_rate", e))?,
            external_price_ref: row.external_price_ref,
            is_active: row.is_active,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProjectRow {
    id: i64,
    owner_id: String,
    goal_amount: i64,
    current_amount: i64,
}

impl TryFrom<ProjectRow> for Project {
    type Error = DomainError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Project {
            id: ProjectId::new(row.id).map_err(|e| corrupt("project id", e))?,
            owner_id: UserId::new(row.owner_id).map_err(|e| corrupt("owner_id", e))?,
            goal_amount: Money::from_minor(row.goal_amount).map_err(|e| corrupt("goal_amount", e))?,
            current_amount: Money::from_minor(row.current_amount)
                .map_err(|e| corrupt("current_amount", e))?,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Store
// ════════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, DomainError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;
        Ok(Box::new(PostgresLedgerTransaction { tx }))
    }

    async fn find_donation(&self, id: DonationId) -> Result<Option<Donation>, DomainError> {
        let row: Option<DonationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM donations WHERE id = $1",
            DONATION_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find donation", e))?;

        row.map(Donation::try_from).transpose()
    }

    async fn find_donation_by_payment_ref(
        &self,
        payment_ref: &str,
    ) -> Result<Option<Donation>, DomainError> {
        let row: Option<DonationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM donations WHERE external_payment_ref = $1",
            DONATION_COLUMNS
        ))
        .bind(payment_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find donation", e))?;

        row.map(Donation::try_from).transpose()
    }

    async fn list_project_donations(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<Donation>, DomainError> {
        let rows: Vec<DonationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM donations WHERE project_id = $1 ORDER BY created_at ASC",
            DONATION_COLUMNS
        ))
        .bind(project_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list donations", e))?;

        rows.into_iter().map(Donation::try_from).collect()
    }

    async fn find_current_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM user_subscriptions \
             WHERE user_id = $1 AND status <> 'cancelled' \
             ORDER BY created_at DESC LIMIT 1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_plan(&self, id: PlanId) -> Result<Option<Plan>, DomainError> {
        let row: Option<PlanRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscription_plans WHERE id = $1",
            PLAN_COLUMNS
        ))
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find plan", e))?;

        row.map(Plan::try_from).transpose()
    }

    async fn list_active_plans(&self) -> Result<Vec<Plan>, DomainError> {
        let rows: Vec<PlanRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscription_plans WHERE is_active ORDER BY price ASC, id ASC",
            PLAN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list plans", e))?;

        rows.into_iter().map(Plan::try_from).collect()
    }
}

#[async_trait]
impl ProjectDirectory for PostgresLedgerStore {
    async fn find_project(&self, id: ProjectId) -> Result<Option<Project>, DomainError> {
        let row: Option<ProjectRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, goal_amount, current_amount
            FROM projects
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find project", e))?;

        row.map(Project::try_from).transpose()
    }

    async fn count_active_projects(&self, owner: &UserId) -> Result<u64, DomainError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM projects WHERE owner_id = $1 AND deleted_at IS NULL",
        )
        .bind(owner.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count projects", e))?;

        Ok(count.max(0) as u64)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Transaction
// ════════════════════════════════════════════════════════════════════════════════

struct PostgresLedgerTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PostgresLedgerTransaction {
    async fn lock_donation(&mut self, id: DonationId) -> Result<Option<Donation>, DomainError> {
        let row: Option<DonationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM donations WHERE id = $1 FOR UPDATE",
            DONATION_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to lock donation", e))?;

        row.map(Donation::try_from).transpose()
    }

    async fn lock_donation_by_payment_ref(
        &mut self,
        payment_ref: &str,
    ) -> Result<Option<Donation>, DomainError> {
        let row: Option<DonationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM donations WHERE external_payment_ref = $1 FOR UPDATE",
            DONATION_COLUMNS
        ))
        .bind(payment_ref)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to lock donation", e))?;

        row.map(Donation::try_from).transpose()
    }

    async fn insert_donation(&mut self, donation: &Donation) -> Result<Donation, DomainError> {
        let inserted: Option<DonationRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO donations (
                id, project_id, donor_id, amount, currency, status, external_payment_ref,
                message, anonymous, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (external_payment_ref) DO NOTHING
            RETURNING {}
            "#,
            DONATION_COLUMNS
        ))
        .bind(donation.id.as_uuid())
        .bind(donation.project_id.value())
        .bind(donation.donor_id.as_str())
        .bind(donation.amount.as_minor())
        .bind(donation.currency.as_str())
        .bind(donation.status.as_str())
        .bind(&donation.external_payment_ref)
        .bind(&donation.message)
        .bind(donation.anonymous)
        .bind(donation.created_at.as_datetime())
        .bind(donation.updated_at.as_datetime())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to insert donation", e))?;

        match inserted {
            Some(row) => Donation::try_from(row),
            None => self
                .lock_donation_by_payment_ref(&donation.external_payment_ref)
                .await?
                .ok_or_else(|| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        "Donation insert conflicted but no row was found",
                    )
                }),
        }
    }

    async fn update_donation(
        &mut self,
        donation: &Donation,
        expected: DonationStatus,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE donations SET
                status = $2,
                refund_amount = $3,
                refund_ref = $4,
                refund_reason = $5,
                failure_reason = $6,
                completed_at = $7,
                failed_at = $8,
                refunded_at = $9,
                updated_at = $10
            WHERE id = $1 AND status = $11
            "#,
        )
        .bind(donation.id.as_uuid())
        .bind(donation.status.as_str())
        .bind(donation.refund_amount.map(|m| m.as_minor()))
        .bind(&donation.refund_ref)
        .bind(&donation.refund_reason)
        .bind(&donation.failure_reason)
        .bind(donation.completed_at.map(|t| *t.as_datetime()))
        .bind(donation.failed_at.map(|t| *t.as_datetime()))
        .bind(donation.refunded_at.map(|t| *t.as_datetime()))
        .bind(donation.updated_at.as_datetime())
        .bind(expected.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to update donation", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn adjust_project_amount(
        &mut self,
        project_id: ProjectId,
        delta_minor: i64,
    ) -> Result<Money, DomainError> {
        // Guarding in the WHERE clause keeps the transaction usable when the
        // adjustment is refused.
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE projects
            SET current_amount = current_amount + $2
            WHERE id = $1 AND current_amount + $2 >= 0
            RETURNING current_amount
            "#,
        )
        .bind(project_id.value())
        .bind(delta_minor)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to adjust project amount", e))?;

        if let Some(total) = updated {
            return Money::from_minor(total).map_err(|e| corrupt("current_amount", e));
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM projects WHERE id = $1)")
            .bind(project_id.value())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to check project", e))?;

        if exists {
            Err(DomainError::new(
                ErrorCode::ConsistencyViolation,
                format!("project {} total would become negative", project_id),
            ))
        } else {
            Err(DomainError::new(
                ErrorCode::ProjectNotFound,
                format!("project {} not found", project_id),
            ))
        }
    }

    async fn lock_current_subscription(
        &mut self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM user_subscriptions \
             WHERE user_id = $1 AND status <> 'cancelled' \
             ORDER BY created_at DESC LIMIT 1 FOR UPDATE",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to lock subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn lock_subscription_by_ref(
        &mut self,
        external_ref: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM user_subscriptions \
             WHERE external_subscription_ref = $1 \
             ORDER BY created_at DESC LIMIT 1 FOR UPDATE",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(external_ref)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to lock subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn upsert_subscription(&mut self, subscription: &Subscription) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO user_subscriptions (
                id, user_id, plan_id, status, external_subscription_ref,
                current_period_start, current_period_end, scheduled_plan_id,
                cancelled_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                plan_id = EXCLUDED.plan_id,
                status = EXCLUDED.status,
                external_subscription_ref = EXCLUDED.external_subscription_ref,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                scheduled_plan_id = EXCLUDED.scheduled_plan_id,
                cancelled_at = EXCLUDED.cancelled_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.user_id.as_str())
        .bind(subscription.plan_id.value())
        .bind(subscription.status.as_str())
        .bind(&subscription.external_subscription_ref)
        .bind(subscription.current_period_start.as_datetime())
        .bind(subscription.current_period_end.as_datetime())
        .bind(subscription.scheduled_plan_id.map(|p| p.value()))
        .bind(subscription.cancelled_at.map(|t| *t.as_datetime()))
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some(ONE_LIVE_SUBSCRIPTION_INDEX) {
                    return DomainError::new(
                        ErrorCode::DuplicateSubscription,
                        "User already has a subscription",
                    );
                }
            }
            db_error("Failed to save subscription", e)
        })?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| db_error("Failed to roll back transaction", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn donation_row(status: &str) -> DonationRow {
        let now = Utc::now();
        DonationRow {
            id: Uuid::new_v4(),
            project_id: 7,
            donor_id: "donor-1".to_string(),
            amount: 5000,
            currency: "usd".to_string(),
            status: status.to_string(),
            external_payment_ref: "pi_1".to_string(),
            message: Some("Good luck".to_string()),
            anonymous: false,
            refund_amount: None,
            refund_ref: None,
            refund_reason: None,
            failure_reason: None,
            created_at: now,
            completed_at: None,
            failed_at: None,
            refunded_at: None,
            updated_at: now,
        }
    }

    #[test]
    fn donation_row_maps_to_aggregate() {
        let donation = Donation::try_from(donation_row("pending")).unwrap();
        assert_eq!(donation.status, DonationStatus::Pending);
        assert_eq!(donation.amount.as_minor(), 5000);
        assert_eq!(donation.project_id.value(), 7);
    }

    #[test]
    fn unknown_donation_status_is_a_database_error() {
        let err = Donation::try_from(donation_row("settled")).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn plan_row_decodes_unlimited_limit() {
        let plan = Plan::try_from(PlanRow {
            id: 3,
            name: "Studio".to_string(),
            price: 4900,
            currency: "usd".to_string(),
            billing_interval: "yearly".to_string(),
            project_limit: -1,
            commission_rate: Decimal::from_str("0.02").unwrap(),
            external_price_ref: "price_studio".to_string(),
            is_active: true,
        })
        .unwrap();

        assert_eq!(plan.project_limit, ProjectLimit::Unlimited);
        assert_eq!(plan.billing_interval, BillingInterval::Yearly);
    }

    #[test]
    fn plan_row_rejects_out_of_range_rate() {
        let err = Plan::try_from(PlanRow {
            id: 3,
            name: "Broken".to_string(),
            price: 100,
            currency: "usd".to_string(),
            billing_interval: "monthly".to_string(),
            project_limit: 1,
            commission_rate: Decimal::from_str("1.5").unwrap(),
            external_price_ref: "price_x".to_string(),
            is_active: true,
        })
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
