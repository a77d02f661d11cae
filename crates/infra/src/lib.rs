//! Infrastructure layer: the per-account ledger engine, persistence adapters and
//! configuration.

pub mod config;
pub mod engine;
pub mod store;

mod integration_tests;

pub use config::LedgerConfig;
pub use engine::{EngineError, LedgerEngine, SharedMeals};
pub use store::{InMemorySnapshotStore, JsonFileStore, SnapshotStore, StoreError};
