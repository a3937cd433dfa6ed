//! Domain layer containing business rules and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors, state machine)
//! - `donation` - Donation lifecycle, project accumulator view and acceptance policy
//! - `subscription` - Plans, entitlements and the subscription lifecycle
//! - `webhook` - Gateway callback authenticity and failure semantics

pub mod donation;
pub mod foundation;
pub mod subscription;
pub mod webhook;
