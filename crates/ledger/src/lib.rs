//! Meal-plan and wallet ledger (event-sourced).
//!
//! Pure domain logic only: no IO, no clock, no persistence concerns. The
//! [`Account`] aggregate decides events from commands and applies them; the
//! infra crate wraps it in a single-writer engine.

pub mod account;
pub mod plan;
pub mod snapshot;
pub mod wallet;

pub use account::{
    Account, AccountCommand, AccountEvent, Exchange, FundsExchanged, MealUsed, MealsShared,
    PlansPurchased, PurchasePlan, ShareMeals, TopUp, UseMeal, WalletToppedUp,
};
pub use plan::{MealPlan, PlanStatus, PlanType, RestaurantId};
pub use snapshot::{LedgerSnapshot, SnapshotError};
pub use wallet::{WalletKind, Wallets};
