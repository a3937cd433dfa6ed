//! Authenticated caller context.
//!
//! The session layer that establishes identity lives outside this crate. It
//! hands every core operation an explicit `AuthenticatedUser` instead of the
//! operation reading identity from ambient state.

use serde::{Deserialize, Serialize};

use super::UserId;

/// Role granted by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Member,
    Admin,
}

/// The caller on whose behalf a command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Identifier of the signed-in user.
    pub id: UserId,

    /// Role assigned by the session layer.
    pub role: UserRole,
}

impl AuthenticatedUser {
    /// Creates a regular member.
    pub fn member(id: UserId) -> Self {
        Self {
            id,
            role: UserRole::Member,
        }
    }

    /// Creates an administrator.
    pub fn admin(id: UserId) -> Self {
        Self {
            id,
            role: UserRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_is_not_admin() {
        let user = AuthenticatedUser::member(UserId::new("u-1").unwrap());
        assert!(!user.is_admin());
        assert_eq!(user.role, UserRole::Member);
    }

    #[test]
    fn admin_is_admin() {
        let user = AuthenticatedUser::admin(UserId::new("root").unwrap());
        assert!(user.is_admin());
    }

    #[test]
    fn role_deserializes_from_snake_case() {
        let role: UserRole = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, UserRole::Admin);
    }
}
