use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mealwallet_core::{
    AccountId, Aggregate, AggregateRoot, Entity, LedgerError, LedgerResult, MealPlanId,
};
use mealwallet_events::Event;

use crate::plan::{MealPlan, PlanType, RestaurantId};
use crate::snapshot::{LedgerSnapshot, SnapshotError};
use crate::wallet::{WalletKind, Wallets};

/// Aggregate root: one student account's wallets and meal plans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    id: AccountId,
    wallets: Wallets,
    /// Purchase order. Plans are never removed.
    plans: Vec<MealPlan>,
    version: u64,
}

impl Account {
    /// A brand-new account: empty wallets, no plans.
    pub fn empty(id: AccountId) -> Self {
        Self {
            id,
            wallets: Wallets::default(),
            plans: Vec::new(),
            version: 0,
        }
    }

    /// Rebuild an account from persisted state, refusing snapshots that break invariants.
    pub fn restore(id: AccountId, snapshot: LedgerSnapshot) -> Result<Self, SnapshotError> {
        snapshot.validate()?;
        Ok(Self {
            id,
            wallets: snapshot.wallets,
            plans: snapshot.plans,
            version: snapshot.version,
        })
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            wallets: self.wallets,
            plans: self.plans.clone(),
            version: self.version,
        }
    }

    pub fn id_typed(&self) -> AccountId {
        self.id
    }

    pub fn wallets(&self) -> Wallets {
        self.wallets
    }

    pub fn plans(&self) -> &[MealPlan] {
        &self.plans
    }

    pub fn plan(&self, plan_id: MealPlanId) -> Option<&MealPlan> {
        self.plans.iter().find(|p| *p.id() == plan_id)
    }

    /// Plans from one restaurant that still have meals left.
    pub fn active_plans_for<'a>(
        &'a self,
        restaurant_id: &'a RestaurantId,
    ) -> impl Iterator<Item = &'a MealPlan> + 'a {
        self.plans
            .iter()
            .filter(move |p| p.restaurant_id() == restaurant_id && !p.is_depleted())
    }

    /// Check that `quantity` plans at `unit_price` can be bought now. Returns the total.
    ///
    /// Runs in constant time, so callers can reject a purchase before minting
    /// one id per unit.
    pub fn check_purchase(&self, unit_price: i64, quantity: u32) -> LedgerResult<i64> {
        if quantity == 0 {
            return Err(LedgerError::InvalidQuantity { quantity });
        }
        if unit_price < 0 {
            return Err(LedgerError::InvalidAmount { amount: unit_price });
        }

        // A total no i64 can hold is a total no wallet can cover.
        let total_price = unit_price.checked_mul(i64::from(quantity)).ok_or(
            LedgerError::InsufficientBalance {
                available: self.wallets.meal(),
                required: i64::MAX,
            },
        )?;
        self.wallets.debited(WalletKind::Meal, total_price)?;
        Ok(total_price)
    }

    fn plan_or_err(&self, plan_id: MealPlanId) -> LedgerResult<&MealPlan> {
        self.plan(plan_id)
            .ok_or(LedgerError::PlanNotFound { plan_id })
    }

    fn plan_mut(&mut self, plan_id: MealPlanId) -> Option<&mut MealPlan> {
        self.plans.iter_mut().find(|p| *p.id() == plan_id)
    }
}

impl AggregateRoot for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: TopUp. Credits the meal wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUp {
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Exchange. Moves `amount` from `from` to the other wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub from: WalletKind,
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PurchasePlan.
///
/// One plan is created per entry in `plan_ids`, so the quantity is
/// `plan_ids.len()`. Ids are minted by the caller to keep `handle` pure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasePlan {
    pub restaurant_id: RestaurantId,
    pub restaurant_name: String,
    pub plan_type: PlanType,
    pub unit_price: i64,
    pub plan_ids: Vec<MealPlanId>,
    pub occurred_at: DateTime<Utc>,
}

impl PurchasePlan {
    pub fn quantity(&self) -> u32 {
        u32::try_from(self.plan_ids.len()).unwrap_or(u32::MAX)
    }
}

/// Command: UseMeal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseMeal {
    pub plan_id: MealPlanId,
    pub meal_index: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ShareMeals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareMeals {
    pub plan_id: MealPlanId,
    pub meal_count: u32,
    /// Opaque recipient reference (student id, phone number). Never credited.
    pub recipient: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountCommand {
    TopUp(TopUp),
    Exchange(Exchange),
    PurchasePlan(PurchasePlan),
    UseMeal(UseMeal),
    ShareMeals(ShareMeals),
}

/// Event: WalletToppedUp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletToppedUp {
    pub account_id: AccountId,
    pub wallet: WalletKind,
    pub amount: i64,
    /// Balance of `wallet` after the top-up.
    pub balance: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FundsExchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsExchanged {
    pub account_id: AccountId,
    pub from: WalletKind,
    pub to: WalletKind,
    pub amount: i64,
    /// Both balances after the exchange.
    pub wallets: Wallets,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PlansPurchased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlansPurchased {
    pub account_id: AccountId,
    pub plans: Vec<MealPlan>,
    pub total_price: i64,
    /// Meal wallet balance after the deduction.
    pub meal_balance: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MealUsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealUsed {
    pub account_id: AccountId,
    pub plan_id: MealPlanId,
    pub meal_index: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MealsShared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealsShared {
    pub account_id: AccountId,
    pub plan_id: MealPlanId,
    pub recipient: String,
    /// Indices consumed by this share, ascending.
    pub meal_indices: Vec<u32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountEvent {
    WalletToppedUp(WalletToppedUp),
    FundsExchanged(FundsExchanged),
    PlansPurchased(PlansPurchased),
    MealUsed(MealUsed),
    MealsShared(MealsShared),
}

impl Event for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::WalletToppedUp(_) => "ledger.wallet.topped_up",
            AccountEvent::FundsExchanged(_) => "ledger.wallet.funds_exchanged",
            AccountEvent::PlansPurchased(_) => "ledger.plan.purchased",
            AccountEvent::MealUsed(_) => "ledger.plan.meal_used",
            AccountEvent::MealsShared(_) => "ledger.plan.meals_shared",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AccountEvent::WalletToppedUp(e) => e.occurred_at,
            AccountEvent::FundsExchanged(e) => e.occurred_at,
            AccountEvent::PlansPurchased(e) => e.occurred_at,
            AccountEvent::MealUsed(e) => e.occurred_at,
            AccountEvent::MealsShared(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Account {
    type Command = AccountCommand;
    type Event = AccountEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AccountEvent::WalletToppedUp(e) => {
                // Events carry resulting balances, so replay never redoes arithmetic.
                self.wallets = self.wallets.with_balance(e.wallet, e.balance);
            }
            AccountEvent::FundsExchanged(e) => {
                self.wallets = e.wallets;
            }
            AccountEvent::PlansPurchased(e) => {
                self.wallets = self.wallets.with_balance(WalletKind::Meal, e.meal_balance);
                self.plans.extend(e.plans.iter().cloned());
            }
            AccountEvent::MealUsed(e) => {
                if let Some(plan) = self.plan_mut(e.plan_id) {
                    plan.mark_used(&[e.meal_index]);
                }
            }
            AccountEvent::MealsShared(e) => {
                if let Some(plan) = self.plan_mut(e.plan_id) {
                    plan.mark_used(&e.meal_indices);
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AccountCommand::TopUp(cmd) => self.handle_top_up(cmd),
            AccountCommand::Exchange(cmd) => self.handle_exchange(cmd),
            AccountCommand::PurchasePlan(cmd) => self.handle_purchase(cmd),
            AccountCommand::UseMeal(cmd) => self.handle_use_meal(cmd),
            AccountCommand::ShareMeals(cmd) => self.handle_share(cmd),
        }
    }
}

impl Account {
    fn handle_top_up(&self, cmd: &TopUp) -> LedgerResult<Vec<AccountEvent>> {
        let next = self.wallets.credited(WalletKind::Meal, cmd.amount)?;

        Ok(vec![AccountEvent::WalletToppedUp(WalletToppedUp {
            account_id: self.id,
            wallet: WalletKind::Meal,
            amount: cmd.amount,
            balance: next.meal(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_exchange(&self, cmd: &Exchange) -> LedgerResult<Vec<AccountEvent>> {
        let next = self.wallets.exchanged(cmd.from, cmd.amount)?;

        Ok(vec![AccountEvent::FundsExchanged(FundsExchanged {
            account_id: self.id,
            from: cmd.from,
            to: cmd.from.counterpart(),
            amount: cmd.amount,
            wallets: next,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_purchase(&self, cmd: &PurchasePlan) -> LedgerResult<Vec<AccountEvent>> {
        let total_price = self.check_purchase(cmd.unit_price, cmd.quantity())?;
        let next = self.wallets.debited(WalletKind::Meal, total_price)?;

        let plans = cmd
            .plan_ids
            .iter()
            .map(|&plan_id| {
                MealPlan::new(
                    plan_id,
                    cmd.restaurant_id.clone(),
                    cmd.restaurant_name.clone(),
                    cmd.plan_type.clone(),
                    cmd.unit_price,
                    cmd.occurred_at,
                )
            })
            .collect();

        Ok(vec![AccountEvent::PlansPurchased(PlansPurchased {
            account_id: self.id,
            plans,
            total_price,
            meal_balance: next.meal(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_use_meal(&self, cmd: &UseMeal) -> LedgerResult<Vec<AccountEvent>> {
        let plan = self.plan_or_err(cmd.plan_id)?;
        plan.check_usable(cmd.meal_index)?;

        Ok(vec![AccountEvent::MealUsed(MealUsed {
            account_id: self.id,
            plan_id: cmd.plan_id,
            meal_index: cmd.meal_index,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_share(&self, cmd: &ShareMeals) -> LedgerResult<Vec<AccountEvent>> {
        let plan = self.plan_or_err(cmd.plan_id)?;
        if cmd.meal_count == 0 {
            return Err(LedgerError::InvalidQuantity {
                quantity: cmd.meal_count,
            });
        }
        let meal_indices = plan.lowest_unused(cmd.meal_count)?;

        Ok(vec![AccountEvent::MealsShared(MealsShared {
            account_id: self.id,
            plan_id: cmd.plan_id,
            recipient: cmd.recipient.clone(),
            meal_indices,
            occurred_at: cmd.occurred_at,
        })])
    }
}
