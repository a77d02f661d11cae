use std::collections::HashMap;
use std::sync::RwLock;

use mealwallet_core::AccountId;
use mealwallet_ledger::LedgerSnapshot;

use super::r#trait::{SnapshotStore, StoreError};

/// In-memory snapshot store.
///
/// Intended for tests/dev. Keeps the latest snapshot per account and counts saves.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<AccountId, LedgerSnapshot>>,
    saves: RwLock<u64>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account, as if it had been saved earlier.
    pub fn insert(&self, account_id: AccountId, snapshot: LedgerSnapshot) -> Result<(), StoreError> {
        let mut snapshots = self.snapshots.write().map_err(|_| StoreError::Poisoned)?;
        snapshots.insert(account_id, snapshot);
        Ok(())
    }

    /// Latest stored snapshot for `account_id`.
    pub fn get(&self, account_id: AccountId) -> Option<LedgerSnapshot> {
        self.snapshots
            .read()
            .ok()
            .and_then(|snapshots| snapshots.get(&account_id).cloned())
    }

    /// Number of `on_changed` notifications received.
    pub fn save_count(&self) -> u64 {
        self.saves.read().map(|n| *n).unwrap_or(0)
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self, account_id: AccountId) -> Result<Option<LedgerSnapshot>, StoreError> {
        let snapshots = self.snapshots.read().map_err(|_| StoreError::Poisoned)?;
        Ok(snapshots.get(&account_id).cloned())
    }

    fn on_changed(
        &self,
        account_id: AccountId,
        snapshot: &LedgerSnapshot,
    ) -> Result<(), StoreError> {
        let mut snapshots = self.snapshots.write().map_err(|_| StoreError::Poisoned)?;
        snapshots.insert(account_id, snapshot.clone());

        let mut saves = self.saves.write().map_err(|_| StoreError::Poisoned)?;
        *saves += 1;
        Ok(())
    }
}
