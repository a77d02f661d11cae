//! Per-account ledger engine (single writer).
//!
//! The engine owns one account's [`Account`] aggregate and is the only thing that
//! mutates it. Every operation runs the same pipeline under one mutex:
//!
//! ```text
//! operation
//!   ↓
//! 1. Build the command from the live account (ids minted, clock read once)
//!   ↓
//! 2. Decide + apply on a working copy of the account (pure; rejection stops here)
//!   ↓
//! 3. Hand the copy's snapshot to the store (`on_changed`)
//!   ↓
//! 4. Commit the copy as the live state
//!   ↓
//! 5. Publish the events on the bus (best-effort)
//! ```
//!
//! A rejection in step 1 or 2, or a store failure in step 3, leaves the live
//! state untouched, so callers see every operation as all-or-nothing. Events are
//! published before the lock is released, so subscribers receive envelopes in
//! sequence-number order.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use thiserror::Error;

use mealwallet_core::{AccountId, AggregateRoot, LedgerError, LedgerResult, MealPlanId};
use mealwallet_events::{EventBus, EventEnvelope, Subscription, execute};
use mealwallet_ledger::{
    Account, AccountCommand, AccountEvent, Exchange, LedgerSnapshot, MealPlan, PlanType,
    PurchasePlan, RestaurantId, ShareMeals, SnapshotError, TopUp, UseMeal, WalletKind, Wallets,
};

use crate::store::{SnapshotStore, StoreError};

/// Failure of an engine operation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The ledger rejected the operation (bad input, insufficient funds/capacity).
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The store could not record the new state; nothing was committed.
    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),

    /// The stored state for this account breaks ledger invariants.
    #[error("stored ledger for account {account_id} is invalid: {source}")]
    CorruptSnapshot {
        account_id: AccountId,
        #[source]
        source: SnapshotError,
    },
}

impl EngineError {
    /// The ledger rejection behind this error, if that is what it is.
    pub fn ledger(&self) -> Option<&LedgerError> {
        match self {
            EngineError::Ledger(err) => Some(err),
            _ => None,
        }
    }
}

/// Receipt of a successful `share_meals`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedMeals {
    /// Indices consumed by this call, ascending.
    pub meal_indices: Vec<u32>,
    /// The plan after the share.
    pub plan: MealPlan,
}

/// Single-writer ledger for one account.
///
/// Construct one per account and inject it where it is needed; there is no
/// process-wide instance. `S` receives snapshots, `B` receives committed events.
#[derive(Debug)]
pub struct LedgerEngine<S, B> {
    account_id: AccountId,
    state: Mutex<Account>,
    store: S,
    bus: B,
}

impl<S, B> LedgerEngine<S, B>
where
    S: SnapshotStore,
    B: EventBus<EventEnvelope<AccountEvent>>,
{
    /// Open `account_id`, loading its state from `store` (empty if never saved).
    pub fn open(account_id: AccountId, store: S, bus: B) -> Result<Self, EngineError> {
        let account = match store.load(account_id)? {
            Some(snapshot) => Account::restore(account_id, snapshot)
                .map_err(|source| EngineError::CorruptSnapshot { account_id, source })?,
            None => Account::empty(account_id),
        };

        tracing::info!(
            account = %account_id,
            version = account.version(),
            plans = account.plans().len(),
            "ledger opened"
        );

        Ok(Self {
            account_id,
            state: Mutex::new(account),
            store,
            bus,
        })
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Credit the meal wallet. Returns the new meal balance.
    pub fn top_up(&self, amount: i64) -> Result<i64, EngineError> {
        let command = |_: &Account| -> LedgerResult<AccountCommand> {
            Ok(AccountCommand::TopUp(TopUp {
                amount,
                occurred_at: Utc::now(),
            }))
        };
        self.dispatch(command, |account, _| account.wallets().meal())
    }

    /// Move `amount` from `from` to the other wallet. Returns both balances.
    pub fn exchange(&self, from: WalletKind, amount: i64) -> Result<Wallets, EngineError> {
        let command = |_: &Account| -> LedgerResult<AccountCommand> {
            Ok(AccountCommand::Exchange(Exchange {
                from,
                amount,
                occurred_at: Utc::now(),
            }))
        };
        self.dispatch(command, |account, _| account.wallets())
    }

    /// Buy `quantity` independent plans. Returns the plans just created.
    ///
    /// Affordability is checked before any plan id is minted, so an oversized
    /// quantity fails in constant time.
    pub fn purchase_plan(
        &self,
        restaurant_id: RestaurantId,
        restaurant_name: impl Into<String>,
        plan_type: PlanType,
        unit_price: i64,
        quantity: u32,
    ) -> Result<Vec<MealPlan>, EngineError> {
        let restaurant_name = restaurant_name.into();
        let command = move |account: &Account| -> LedgerResult<AccountCommand> {
            account.check_purchase(unit_price, quantity)?;
            Ok(AccountCommand::PurchasePlan(PurchasePlan {
                restaurant_id,
                restaurant_name,
                plan_type,
                unit_price,
                plan_ids: (0..quantity).map(|_| MealPlanId::new()).collect(),
                occurred_at: Utc::now(),
            }))
        };
        self.dispatch(command, |_, events| {
            events
                .iter()
                .filter_map(|event| match event {
                    AccountEvent::PlansPurchased(e) => Some(e.plans.clone()),
                    _ => None,
                })
                .flatten()
                .collect()
        })
    }

    /// Consume meal `meal_index` of `plan_id`. Returns the updated plan.
    pub fn use_meal(&self, plan_id: MealPlanId, meal_index: u32) -> Result<MealPlan, EngineError> {
        let command = |_: &Account| -> LedgerResult<AccountCommand> {
            Ok(AccountCommand::UseMeal(UseMeal {
                plan_id,
                meal_index,
                occurred_at: Utc::now(),
            }))
        };
        self.dispatch(command, |account, _| committed_plan(account, plan_id))?
    }

    /// Give away `meal_count` meals of `plan_id`, lowest unused indices first.
    pub fn share_meals(
        &self,
        plan_id: MealPlanId,
        meal_count: u32,
        recipient: impl Into<String>,
    ) -> Result<SharedMeals, EngineError> {
        let recipient = recipient.into();
        let command = move |_: &Account| -> LedgerResult<AccountCommand> {
            Ok(AccountCommand::ShareMeals(ShareMeals {
                plan_id,
                meal_count,
                recipient,
                occurred_at: Utc::now(),
            }))
        };
        self.dispatch(command, |account, events| {
            let meal_indices = events
                .iter()
                .filter_map(|event| match event {
                    AccountEvent::MealsShared(e) => Some(e.meal_indices.clone()),
                    _ => None,
                })
                .flatten()
                .collect();
            Ok(SharedMeals {
                meal_indices,
                plan: committed_plan(account, plan_id)?,
            })
        })?
    }

    pub fn wallets(&self) -> Wallets {
        self.lock().wallets()
    }

    pub fn plans(&self) -> Vec<MealPlan> {
        self.lock().plans().to_vec()
    }

    pub fn plan(&self, plan_id: MealPlanId) -> Option<MealPlan> {
        self.lock().plan(plan_id).cloned()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.lock().snapshot()
    }

    /// Listen for committed events of this account.
    pub fn subscribe(&self) -> Subscription<EventEnvelope<AccountEvent>> {
        self.bus.subscribe()
    }

    fn dispatch<T>(
        &self,
        command: impl FnOnce(&Account) -> LedgerResult<AccountCommand>,
        outcome: impl FnOnce(&Account, &[AccountEvent]) -> T,
    ) -> Result<T, EngineError> {
        let mut live = self.lock();

        // 1) Build, then decide + apply on a working copy
        let mut working = live.clone();
        let decided = command(&*live).and_then(|command| execute(&mut working, &command));
        let events = decided.map_err(|err| {
            tracing::debug!(
                account = %self.account_id,
                code = err.code(),
                error = %err,
                "ledger operation rejected"
            );
            err
        })?;
        if events.is_empty() {
            return Ok(outcome(&*live, &events));
        }

        // 2) Persist before anything becomes visible
        let snapshot = working.snapshot();
        if let Err(err) = self.store.on_changed(self.account_id, &snapshot) {
            tracing::error!(account = %self.account_id, error = %err, "ledger snapshot not stored");
            return Err(err.into());
        }

        // 3) Commit
        let base_version = live.version();
        *live = working;
        let result = outcome(&*live, &events);

        // 4) Publish (after commit, before unlocking)
        for (offset, event) in events.into_iter().enumerate() {
            let sequence = base_version + offset as u64 + 1;
            let event_type = mealwallet_events::Event::event_type(&event);
            tracing::info!(
                account = %self.account_id,
                event = event_type,
                sequence,
                "ledger mutation committed"
            );
            let envelope = EventEnvelope::wrap(self.account_id, sequence, event);
            if let Err(err) = self.bus.publish(envelope) {
                tracing::warn!(
                    account = %self.account_id,
                    event = event_type,
                    error = ?err,
                    "ledger event not published"
                );
            }
        }
        drop(live);

        Ok(result)
    }

    fn lock(&self) -> MutexGuard<'_, Account> {
        // The live account is only ever replaced wholesale, so a guard recovered from
        // a poisoned lock still holds a consistent account.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn committed_plan(account: &Account, plan_id: MealPlanId) -> Result<MealPlan, EngineError> {
    account
        .plan(plan_id)
        .cloned()
        .ok_or(EngineError::Ledger(LedgerError::PlanNotFound { plan_id }))
}
