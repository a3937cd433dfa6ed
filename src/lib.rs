//! Crowdfund Ledger - donation and subscription core for a crowdfunding platform
//!
//! Tracks donations from payment intent to confirmation and refund, keeps
//! each project's raised total equal to the sum of its net contributions,
//! and gates project creation and commission rates on the owner's
//! subscription plan.
//!
//! # Layers
//!
//! - `domain` - aggregates, value objects and invariants
//! - `ports` - traits for the ledger, payment gateway and notifications
//! - `application` - one handler per operation
//! - `adapters` - Stripe, PostgreSQL, in-memory and axum implementations
//! - `config` - environment-driven settings

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
