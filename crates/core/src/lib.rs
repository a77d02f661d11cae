//! `mealwallet-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, aggregate/entity traits and the ledger error taxonomy.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot};
pub use entity::Entity;
pub use error::{LedgerError, LedgerResult};
pub use id::{AccountId, MealPlanId};
