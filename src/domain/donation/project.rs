//! The slice of a project the ledger cares about.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Money, ProjectId, UserId};

/// Partial view of a fundraising project.
///
/// `current_amount` is owned by the ledger; every other field belongs to the
/// external project CRUD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub owner_id: UserId,
    pub goal_amount: Money,
    pub current_amount: Money,
}

impl Project {
    /// Whether the accumulated total has reached the goal.
    pub fn is_funded(&self) -> bool {
        !self.goal_amount.is_zero() && self.current_amount >= self.goal_amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funded_once_goal_is_reached() {
        let mut project = Project {
            id: ProjectId::new(1).unwrap(),
            owner_id: UserId::new("owner").unwrap(),
            goal_amount: Money::from_minor(10_000).unwrap(),
            current_amount: Money::from_minor(5_000).unwrap(),
        };
        assert!(!project.is_funded());
        project.current_amount = Money::from_minor(10_000).unwrap();
        assert!(project.is_funded());
    }
}
