//! Integration tests for the engine pipeline.
//!
//! Tests: operation → Account → SnapshotStore → EventBus
//!
//! Verifies:
//! - every committed mutation reaches the store before the call returns
//! - rejected operations and store failures leave state and store untouched
//! - committed events are published in order with per-account sequence numbers
//! - an engine reopened over the same store sees the same ledger

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use mealwallet_core::{AccountId, LedgerError, MealPlanId};
    use mealwallet_events::{EventBus, EventEnvelope, InMemoryEventBus};
    use mealwallet_ledger::{
        AccountEvent, LedgerSnapshot, MealPlan, PlanStatus, PlanType, RestaurantId, WalletKind,
        Wallets,
    };

    use crate::engine::{EngineError, LedgerEngine};
    use crate::store::{InMemorySnapshotStore, JsonFileStore, SnapshotStore, StoreError};

    type Bus = Arc<InMemoryEventBus<EventEnvelope<AccountEvent>>>;
    type Engine = LedgerEngine<Arc<InMemorySnapshotStore>, Bus>;

    fn setup() -> (Engine, Arc<InMemorySnapshotStore>, Bus) {
        let store = Arc::new(InMemorySnapshotStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let engine = LedgerEngine::open(AccountId::new(), store.clone(), bus.clone()).unwrap();
        (engine, store, bus)
    }

    fn buy_month(engine: &Engine, quantity: u32) -> Vec<MealPlan> {
        engine
            .purchase_plan(
                RestaurantId::from(1),
                "Campus Bites",
                PlanType::Month,
                30_000,
                quantity,
            )
            .unwrap()
    }

    /// Store that fails every write while `failing` is set.
    #[derive(Debug, Default)]
    struct FlakyStore {
        inner: InMemorySnapshotStore,
        failing: AtomicBool,
    }

    impl SnapshotStore for FlakyStore {
        fn load(&self, account_id: AccountId) -> Result<Option<LedgerSnapshot>, StoreError> {
            self.inner.load(account_id)
        }

        fn on_changed(
            &self,
            account_id: AccountId,
            snapshot: &LedgerSnapshot,
        ) -> Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Io("disk full".to_string()));
            }
            self.inner.on_changed(account_id, snapshot)
        }
    }

    #[test]
    fn fresh_account_starts_empty() {
        let (engine, store, _) = setup();
        assert_eq!(engine.wallets(), Wallets::default());
        assert!(engine.plans().is_empty());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn top_up_then_exchange_is_persisted() {
        let (engine, store, _) = setup();

        assert_eq!(engine.top_up(5000).unwrap(), 5000);
        let wallets = engine.exchange(WalletKind::Meal, 2000).unwrap();
        assert_eq!(wallets, Wallets::new(3000, 2000).unwrap());

        let stored = store.get(engine.account_id()).unwrap();
        assert_eq!(stored.wallets, wallets);
        assert_eq!(stored.version, 2);
        assert_eq!(store.save_count(), 2);
    }

    #[test]
    fn purchase_returns_new_plans_and_deducts() {
        let (engine, store, _) = setup();
        engine.top_up(50_000).unwrap();

        let plans = buy_month(&engine, 1);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].total_meals(), 30);
        assert_eq!(plans[0].price(), 30_000);
        assert_eq!(plans[0].status(), PlanStatus::Active);
        assert_eq!(engine.wallets().meal(), 20_000);
        assert_eq!(store.get(engine.account_id()).unwrap().plans, plans);
    }

    #[test]
    fn rejected_purchase_touches_nothing() {
        let (engine, store, bus) = setup();
        engine.top_up(1000).unwrap();
        let sub = bus.subscribe();
        let saves = store.save_count();

        let err = engine
            .purchase_plan(RestaurantId::from(1), "Campus Bites", PlanType::Month, 30_000, 1)
            .unwrap_err();

        assert_eq!(
            err.ledger(),
            Some(&LedgerError::InsufficientBalance {
                available: 1000,
                required: 30_000
            })
        );
        assert_eq!(engine.wallets().meal(), 1000);
        assert!(engine.plans().is_empty());
        assert_eq!(store.save_count(), saves);
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn use_and_share_meals_through_engine() {
        let (engine, _, _) = setup();
        engine.top_up(30_000).unwrap();
        let plan_id = buy_month(&engine, 1)[0].id_typed();

        for index in 0..3 {
            engine.use_meal(plan_id, index).unwrap();
        }
        let shared = engine.share_meals(plan_id, 2, "S123").unwrap();

        assert_eq!(shared.meal_indices, vec![3, 4]);
        let used: Vec<u32> = shared.plan.used_meals().iter().copied().collect();
        assert_eq!(used, vec![0, 1, 2, 3, 4]);
        assert_eq!(engine.plan(plan_id), Some(shared.plan));

        let err = engine.use_meal(plan_id, 4).unwrap_err();
        assert_eq!(err.ledger(), Some(&LedgerError::MealAlreadyUsed { index: 4 }));
    }

    #[test]
    fn unknown_plan_is_reported() {
        let (engine, _, _) = setup();
        let missing = MealPlanId::new();
        let err = engine.share_meals(missing, 1, "X").unwrap_err();
        assert_eq!(err.ledger(), Some(&LedgerError::PlanNotFound { plan_id: missing }));
        assert_eq!(err.ledger().map(LedgerError::code), Some("plan_not_found"));
    }

    #[test]
    fn committed_events_are_published_in_order() {
        let (engine, _, bus) = setup();
        let sub = bus.subscribe();

        engine.top_up(60_000).unwrap();
        let plan_id = buy_month(&engine, 2)[0].id_typed();
        engine.use_meal(plan_id, 0).unwrap();
        engine.share_meals(plan_id, 1, "S9").unwrap();

        let received = sub.drain();
        let types: Vec<&str> = received.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            types,
            vec![
                "ledger.wallet.topped_up",
                "ledger.plan.purchased",
                "ledger.plan.meal_used",
                "ledger.plan.meals_shared",
            ]
        );
        let sequence: Vec<u64> = received.iter().map(|e| e.sequence_number()).collect();
        assert_eq!(sequence, vec![1, 2, 3, 4]);
        assert!(received.iter().all(|e| e.account_id() == engine.account_id()));

        match received[3].payload() {
            AccountEvent::MealsShared(e) => {
                assert_eq!(e.recipient, "S9");
                assert_eq!(e.meal_indices, vec![1]);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn store_failure_leaves_live_state_unchanged() {
        let store = Arc::new(FlakyStore::default());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let engine = LedgerEngine::open(AccountId::new(), store.clone(), bus.clone()).unwrap();
        engine.top_up(5000).unwrap();
        let sub = bus.subscribe();

        store.failing.store(true, Ordering::SeqCst);
        let err = engine.exchange(WalletKind::Meal, 2000).unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::Io(_))));
        assert_eq!(engine.wallets(), Wallets::new(5000, 0).unwrap());
        assert!(sub.drain().is_empty());

        store.failing.store(false, Ordering::SeqCst);
        engine.exchange(WalletKind::Meal, 2000).unwrap();
        assert_eq!(engine.wallets(), Wallets::new(3000, 2000).unwrap());
        assert_eq!(sub.drain().len(), 1);
    }

    #[test]
    fn reopening_over_same_store_restores_ledger() {
        let (engine, store, bus) = setup();
        engine.top_up(30_000).unwrap();
        let plan_id = buy_month(&engine, 1)[0].id_typed();
        engine.use_meal(plan_id, 5).unwrap();
        let account_id = engine.account_id();
        let before = engine.snapshot();
        drop(engine);

        let reopened = LedgerEngine::open(account_id, store, bus.clone()).unwrap();
        assert_eq!(reopened.snapshot(), before);

        // Sequence numbers continue from the stored version.
        let sub = bus.subscribe();
        reopened.use_meal(plan_id, 6).unwrap();
        assert_eq!(sub.drain()[0].sequence_number(), before.version + 1);
    }

    #[test]
    fn corrupt_stored_ledger_is_refused() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let account_id = AccountId::new();
        let corrupt: LedgerSnapshot = serde_json::from_value(serde_json::json!({
            "wallets": { "meal": -1, "flexie": 0 },
            "mealPlans": []
        }))
        .unwrap();
        store.insert(account_id, corrupt).unwrap();

        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let err = LedgerEngine::open(account_id, store, bus).unwrap_err();
        assert!(matches!(err, EngineError::CorruptSnapshot { .. }));
    }

    #[test]
    fn json_file_store_survives_restart() {
        let dir = std::env::temp_dir().join(format!("mealwallet-engine-{}", uuid::Uuid::now_v7()));
        let account_id = AccountId::new();
        let bus: Bus = Arc::new(InMemoryEventBus::new());

        {
            let engine = LedgerEngine::open(account_id, JsonFileStore::new(&dir), bus.clone()).unwrap();
            engine.top_up(20_000).unwrap();
            engine
                .purchase_plan(RestaurantId::from("7"), "Inzora", PlanType::HalfMonth, 15_000, 1)
                .unwrap();
            engine.exchange(WalletKind::Meal, 5_000).unwrap();
        }

        let engine = LedgerEngine::open(account_id, JsonFileStore::new(&dir), bus).unwrap();
        assert_eq!(engine.wallets(), Wallets::new(0, 5_000).unwrap());
        let plans = engine.plans();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].total_meals(), 15);
        assert_eq!(plans[0].restaurant_name(), "Inzora");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn concurrent_exchanges_never_overdraw() {
        let (engine, _, _) = setup();
        engine.top_up(1000).unwrap();
        let engine = Arc::new(engine);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|_| engine.exchange(WalletKind::Meal, 10).is_ok())
                        .count()
                })
            })
            .collect();
        let succeeded: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(succeeded, 100);
        assert_eq!(engine.wallets(), Wallets::new(0, 1000).unwrap());
    }

    #[test]
    fn oversized_purchase_fails_fast_without_minting_plans() {
        let (engine, store, bus) = setup();
        engine.top_up(1000).unwrap();
        let sub = bus.subscribe();
        let saves = store.save_count();

        let started = std::time::Instant::now();
        let err = engine
            .purchase_plan(
                RestaurantId::from(1),
                "Campus Bites",
                PlanType::Month,
                30_000,
                u32::MAX,
            )
            .unwrap_err();

        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert_eq!(
            err.ledger(),
            Some(&LedgerError::InsufficientBalance {
                available: 1000,
                required: 30_000 * i64::from(u32::MAX),
            })
        );
        assert_eq!(engine.wallets().meal(), 1000);
        assert!(engine.plans().is_empty());
        assert_eq!(store.save_count(), saves);
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn concurrent_writers_deliver_envelopes_in_sequence_order() {
        let (engine, _, bus) = setup();
        let sub = bus.subscribe();
        let engine = Arc::new(engine);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        engine.top_up(10).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let sequence: Vec<u64> = sub.drain().iter().map(|e| e.sequence_number()).collect();
        assert_eq!(sequence, (1..=200).collect::<Vec<u64>>());
        assert_eq!(engine.wallets().meal(), 2000);
    }

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn commit_log_carries_each_event_sequence() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let (engine, _, _) = setup();
            engine.top_up(60_000).unwrap();
            buy_month(&engine, 2);
            engine.exchange(WalletKind::Meal, 100).unwrap();
        });

        let raw = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let committed: Vec<(String, u64)> = raw
            .lines()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
            .filter(|entry| entry["fields"]["message"] == "ledger mutation committed")
            .map(|entry| {
                (
                    entry["fields"]["event"].as_str().unwrap().to_string(),
                    entry["fields"]["sequence"].as_u64().unwrap(),
                )
            })
            .collect();

        assert_eq!(
            committed,
            vec![
                ("ledger.wallet.topped_up".to_string(), 1),
                ("ledger.plan.purchased".to_string(), 2),
                ("ledger.wallet.funds_exchanged".to_string(), 3),
            ]
        );
    }
}
