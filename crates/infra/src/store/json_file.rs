//! File-backed snapshot store: one JSON document per account.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;

use mealwallet_core::AccountId;
use mealwallet_ledger::LedgerSnapshot;

use super::r#trait::{SnapshotStore, StoreError};

/// Stores each account as `<data_dir>/<account_id>.json`.
///
/// The document has the same shape the presentation layer keeps in browser
/// storage (`wallets`, `mealPlans`). Writes go to a sibling temp file that is
/// then renamed over the document, so readers only ever see a whole snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn document_path(&self, account_id: AccountId) -> PathBuf {
        self.data_dir.join(format!("{account_id}.json"))
    }

    fn read_document(&self, path: &Path) -> anyhow::Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn write_document(&self, path: &Path, body: &str) -> anyhow::Result<()> {
        fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("failed to create data directory {}", self.data_dir.display())
        })?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("failed to move {} into place", tmp.display()))?;
        Ok(())
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self, account_id: AccountId) -> Result<Option<LedgerSnapshot>, StoreError> {
        let path = self.document_path(account_id);
        let Some(raw) = self
            .read_document(&path)
            .map_err(|e| StoreError::Io(format!("{e:#}")))?
        else {
            tracing::debug!(account = %account_id, path = %path.display(), "no stored ledger");
            return Ok(None);
        };

        let snapshot = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))?;
        Ok(Some(snapshot))
    }

    fn on_changed(
        &self,
        account_id: AccountId,
        snapshot: &LedgerSnapshot,
    ) -> Result<(), StoreError> {
        let path = self.document_path(account_id);
        let body = serde_json::to_string_pretty(snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.write_document(&path, &body)
            .map_err(|e| StoreError::Io(format!("{e:#}")))?;

        tracing::debug!(
            account = %account_id,
            path = %path.display(),
            version = snapshot.version,
            "ledger snapshot written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mealwallet_ledger::Wallets;

    fn temp_store() -> JsonFileStore {
        let dir = std::env::temp_dir().join(format!("mealwallet-store-{}", uuid::Uuid::now_v7()));
        JsonFileStore::new(dir)
    }

    #[test]
    fn missing_document_loads_as_none() {
        let store = temp_store();
        assert!(store.load(AccountId::new()).unwrap().is_none());
    }

    #[test]
    fn saved_snapshot_loads_back() {
        let store = temp_store();
        let account_id = AccountId::new();
        let snapshot = LedgerSnapshot {
            wallets: Wallets::new(3000, 2000).unwrap(),
            plans: Vec::new(),
            version: 4,
        };

        store.on_changed(account_id, &snapshot).unwrap();
        assert_eq!(store.load(account_id).unwrap(), Some(snapshot));
        assert!(!store.document_path(account_id).with_extension("json.tmp").exists());

        let _ = fs::remove_dir_all(store.data_dir());
    }

    #[test]
    fn document_uses_browser_storage_keys() {
        let store = temp_store();
        let account_id = AccountId::new();
        store.on_changed(account_id, &LedgerSnapshot::default()).unwrap();

        let raw = fs::read_to_string(store.document_path(account_id)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["wallets"], serde_json::json!({ "meal": 0, "flexie": 0 }));
        assert_eq!(json["mealPlans"], serde_json::json!([]));

        let _ = fs::remove_dir_all(store.data_dir());
    }

    #[test]
    fn garbage_document_is_a_serialization_error() {
        let store = temp_store();
        let account_id = AccountId::new();
        fs::create_dir_all(store.data_dir()).unwrap();
        fs::write(store.document_path(account_id), "{ not json").unwrap();

        assert!(matches!(
            store.load(account_id),
            Err(StoreError::Serialization(_))
        ));

        let _ = fs::remove_dir_all(store.data_dir());
    }
}
