//! Configuration loading and representation.

use std::path::PathBuf;

use mealwallet_observability::LogFormat;

use crate::store::JsonFileStore;

pub const DATA_DIR_VAR: &str = "MEALWALLET_DATA_DIR";
pub const LOG_FORMAT_VAR: &str = "MEALWALLET_LOG_FORMAT";

const DEFAULT_DATA_DIR: &str = "./data";

/// Runtime configuration of a ledger host process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Directory holding one JSON ledger document per account.
    pub data_dir: PathBuf,
    pub log_format: LogFormat,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            log_format: LogFormat::Json,
        }
    }
}

impl LedgerConfig {
    /// Read configuration from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let data_dir = lookup(DATA_DIR_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                tracing::warn!(
                    "{DATA_DIR_VAR} not set; using {}",
                    defaults.data_dir.display()
                );
                defaults.data_dir.clone()
            });

        let log_format = match lookup(LOG_FORMAT_VAR) {
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                tracing::warn!("{LOG_FORMAT_VAR}: {err}; using {:?}", defaults.log_format);
                defaults.log_format
            }),
            None => defaults.log_format,
        };

        Self {
            data_dir,
            log_format,
        }
    }

    /// Install tracing with the configured output format.
    pub fn init_observability(&self) {
        mealwallet_observability::init_with(self.log_format);
    }

    /// File store rooted at `data_dir`.
    pub fn json_store(&self) -> JsonFileStore {
        JsonFileStore::new(self.data_dir.clone())
    }
}
