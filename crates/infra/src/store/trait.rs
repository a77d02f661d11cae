use std::sync::Arc;

use thiserror::Error;

use mealwallet_core::AccountId;
use mealwallet_ledger::LedgerSnapshot;

/// Persistence operation error.
///
/// These are **infrastructure errors** (IO, encoding, locking) as opposed to
/// ledger rejections, which never reach the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage i/o failed: {0}")]
    Io(String),

    #[error("snapshot (de)serialization failed: {0}")]
    Serialization(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Persistence boundary of the ledger engine.
///
/// The engine calls `load` once when it opens an account and `on_changed` after
/// every successful mutation, before returning to its caller. Implementations
/// decide where the snapshot lives; they must store it whole, so a crash loses at
/// most the latest mutation and never leaves half of one behind.
pub trait SnapshotStore: Send + Sync {
    /// Load the last stored snapshot, or `None` for an account never saved.
    fn load(&self, account_id: AccountId) -> Result<Option<LedgerSnapshot>, StoreError>;

    /// Record the full post-mutation state.
    fn on_changed(&self, account_id: AccountId, snapshot: &LedgerSnapshot)
    -> Result<(), StoreError>;
}

impl<S> SnapshotStore for Arc<S>
where
    S: SnapshotStore + ?Sized,
{
    fn load(&self, account_id: AccountId) -> Result<Option<LedgerSnapshot>, StoreError> {
        (**self).load(account_id)
    }

    fn on_changed(
        &self,
        account_id: AccountId,
        snapshot: &LedgerSnapshot,
    ) -> Result<(), StoreError> {
        (**self).on_changed(account_id, snapshot)
    }
}
