use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use mealwallet_core::MealPlanId;

use crate::plan::MealPlan;
use crate::wallet::Wallets;

/// Full ledger state of one account, as handed to the persistence boundary.
///
/// Field names follow the documents the presentation layer keeps in browser
/// storage (`wallets`, `mealPlans`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub wallets: Wallets,
    #[serde(rename = "mealPlans")]
    pub plans: Vec<MealPlan>,
    /// Aggregate version at the time of the snapshot. Absent in older documents.
    #[serde(default)]
    pub version: u64,
}

/// A persisted snapshot that violates ledger invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("negative wallet balance (meal {meal}, flexie {flexie})")]
    NegativeBalance { meal: i64, flexie: i64 },

    #[error("duplicate meal plan id {0}")]
    DuplicatePlan(MealPlanId),

    #[error("invalid meal plan: {0}")]
    InvalidPlan(String),
}

impl LedgerSnapshot {
    /// Check every invariant the engine relies on.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if !self.wallets.is_valid() {
            return Err(SnapshotError::NegativeBalance {
                meal: self.wallets.meal(),
                flexie: self.wallets.flexie(),
            });
        }

        let mut seen = HashSet::with_capacity(self.plans.len());
        for plan in &self.plans {
            if !seen.insert(plan.id_typed()) {
                return Err(SnapshotError::DuplicatePlan(plan.id_typed()));
            }
            plan.check_invariants().map_err(SnapshotError::InvalidPlan)?;
        }
        Ok(())
    }
}
