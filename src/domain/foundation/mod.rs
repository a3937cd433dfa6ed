//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, the state machine trait and error
//! types that form the vocabulary of the ledger.

mod auth;
mod errors;
mod ids;
mod money;
mod state_machine;
mod timestamp;

pub use auth::{AuthenticatedUser, UserRole};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{DonationId, PlanId, ProjectId, SubscriptionId, UserId};
pub use money::{Currency, Money};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
