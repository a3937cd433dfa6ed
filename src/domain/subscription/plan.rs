//! Subscription plans - immutable reference data.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Currency, Money, PlanId, ValidationError};

/// Raw storage value meaning "no project limit".
pub const UNLIMITED_PROJECTS: i32 = -1;

/// How many projects a plan allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ProjectLimit {
    Limited(u32),
    Unlimited,
}

impl ProjectLimit {
    /// Decodes the storage convention where `-1` means unlimited.
    pub fn from_raw(raw: i32) -> Result<Self, ValidationError> {
        match raw {
            UNLIMITED_PROJECTS => Ok(ProjectLimit::Unlimited),
            n if n >= 0 => Ok(ProjectLimit::Limited(n as u32)),
            n => Err(ValidationError::out_of_range(
                "project_limit",
                i64::from(UNLIMITED_PROJECTS),
                i64::from(i32::MAX),
                i64::from(n),
            )),
        }
    }

    pub fn to_raw(&self) -> i32 {
        match self {
            ProjectLimit::Limited(n) => i32::try_from(*n).unwrap_or(i32::MAX),
            ProjectLimit::Unlimited => UNLIMITED_PROJECTS,
        }
    }

    /// Returns true if `count` projects fit within the limit.
    pub fn allows(&self, count: u64) -> bool {
        match self {
            ProjectLimit::Limited(n) => count <= u64::from(*n),
            ProjectLimit::Unlimited => true,
        }
    }

    /// Returns true if one more project may be created on top of `count`.
    pub fn allows_another(&self, count: u64) -> bool {
        match self {
            ProjectLimit::Limited(n) => count < u64::from(*n),
            ProjectLimit::Unlimited => true,
        }
    }
}

impl std::fmt::Display for ProjectLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectLimit::Limited(n) => write!(f, "{}", n),
            ProjectLimit::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// Platform commission as a fraction of a completed donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct CommissionRate(Decimal);

impl CommissionRate {
    /// Rate charged to users without a paid plan (5%).
    pub fn free_tier() -> Self {
        Self(Decimal::new(5, 2))
    }

    pub fn new(rate: Decimal) -> Result<Self, ValidationError> {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(ValidationError::invalid_format(
                "commission_rate",
                format!("{} is outside [0, 1]", rate),
            ));
        }
        Ok(Self(rate))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for CommissionRate {
    type Error = ValidationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        CommissionRate::new(value)
    }
}

impl From<CommissionRate> for Decimal {
    fn from(rate: CommissionRate) -> Self {
        rate.0
    }
}

/// Billing cycle of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    #[default]
    Monthly,
    Yearly,
}

impl BillingInterval {
    /// Length of one cycle in days.
    pub fn days(&self) -> i64 {
        match self {
            BillingInterval::Monthly => 30,
            BillingInterval::Yearly => 365,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Monthly => "monthly",
            BillingInterval::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "monthly" | "month" => Some(BillingInterval::Monthly),
            "yearly" | "year" => Some(BillingInterval::Yearly),
            _ => None,
        }
    }
}

/// A purchasable subscription plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub price: Money,
    pub currency: Currency,
    pub billing_interval: BillingInterval,
    pub project_limit: ProjectLimit,
    pub commission_rate: CommissionRate,
    /// Price identifier at the payment gateway.
    pub external_price_ref: String,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn minus_one_means_unlimited() {
        assert_eq!(ProjectLimit::from_raw(-1).unwrap(), ProjectLimit::Unlimited);
        assert_eq!(ProjectLimit::from_raw(5).unwrap(), ProjectLimit::Limited(5));
        assert!(ProjectLimit::from_raw(-2).is_err());
        assert_eq!(ProjectLimit::Unlimited.to_raw(), -1);
    }

    #[test]
    fn limited_allows_up_to_limit() {
        let limit = ProjectLimit::Limited(2);
        assert!(limit.allows(2));
        assert!(!limit.allows(3));
        assert!(limit.allows_another(1));
        assert!(!limit.allows_another(2));
    }

    #[test]
    fn unlimited_allows_anything() {
        assert!(ProjectLimit::Unlimited.allows(u64::MAX));
        assert!(ProjectLimit::Unlimited.allows_another(10_000));
    }

    #[test]
    fn commission_rate_bounds() {
        assert!(CommissionRate::new(Decimal::from_str("0.03").unwrap()).is_ok());
        assert!(CommissionRate::new(Decimal::from_str("1.01").unwrap()).is_err());
        assert!(CommissionRate::new(Decimal::from_str("-0.01").unwrap()).is_err());
        assert_eq!(
            CommissionRate::free_tier().as_decimal(),
            Decimal::from_str("0.05").unwrap()
        );
    }

    #[test]
    fn billing_interval_lengths() {
        assert_eq!(BillingInterval::Monthly.days(), 30);
        assert_eq!(BillingInterval::Yearly.days(), 365);
        assert_eq!(BillingInterval::parse("year"), Some(BillingInterval::Yearly));
    }
}
