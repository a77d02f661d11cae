use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use mealwallet_core::{Entity, LedgerError, LedgerResult, MealPlanId};

/// Seller identity. Opaque to the ledger beyond equality and display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestaurantId(String);

impl RestaurantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RestaurantId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RestaurantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<u64> for RestaurantId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Plan label chosen at purchase. Determines meal count and validity window.
///
/// Serialized as the plain label ("Month", "Half-month", or whatever unknown
/// label the caller supplied, kept verbatim).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlanType {
    Month,
    HalfMonth,
    Other(String),
}

impl PlanType {
    pub const MONTH_MEALS: u32 = 30;
    pub const HALF_MONTH_MEALS: u32 = 15;

    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "month" => PlanType::Month,
            "half-month" | "half month" => PlanType::HalfMonth,
            _ => PlanType::Other(label.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            PlanType::Month => "Month",
            PlanType::HalfMonth => "Half-month",
            PlanType::Other(label) => label,
        }
    }

    /// Meals granted per plan. Unknown labels get a full month's worth.
    pub fn total_meals(&self) -> u32 {
        match self {
            PlanType::HalfMonth => Self::HALF_MONTH_MEALS,
            PlanType::Month | PlanType::Other(_) => Self::MONTH_MEALS,
        }
    }

    /// Validity window from purchase. Only `Month` gets 30 days.
    pub fn validity(&self) -> Duration {
        match self {
            PlanType::Month => Duration::days(30),
            PlanType::HalfMonth | PlanType::Other(_) => Duration::days(15),
        }
    }
}

impl From<String> for PlanType {
    fn from(value: String) -> Self {
        PlanType::parse(&value)
    }
}

impl From<PlanType> for String {
    fn from(value: PlanType) -> Self {
        value.label().to_string()
    }
}

impl core::fmt::Display for PlanType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Plan lifecycle as seen by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// At least one meal left.
    Active,
    /// Every meal consumed. Terminal.
    Depleted,
    /// Past its expiry date with meals left. Reported only; never enforced.
    Expired,
}

/// One purchased plan: a fixed number of individually consumable meals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlan {
    id: MealPlanId,
    restaurant_id: RestaurantId,
    restaurant_name: String,
    plan_type: PlanType,
    total_meals: u32,
    used_meals: BTreeSet<u32>,
    purchase_date: DateTime<Utc>,
    expiry_date: DateTime<Utc>,
    price: i64,
}

impl MealPlan {
    /// A fresh, unused plan purchased at `purchased_at`.
    pub fn new(
        id: MealPlanId,
        restaurant_id: RestaurantId,
        restaurant_name: impl Into<String>,
        plan_type: PlanType,
        price: i64,
        purchased_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            restaurant_id,
            restaurant_name: restaurant_name.into(),
            total_meals: plan_type.total_meals(),
            expiry_date: purchased_at + plan_type.validity(),
            plan_type,
            used_meals: BTreeSet::new(),
            purchase_date: purchased_at,
            price,
        }
    }

    pub fn id_typed(&self) -> MealPlanId {
        self.id
    }

    pub fn restaurant_id(&self) -> &RestaurantId {
        &self.restaurant_id
    }

    pub fn restaurant_name(&self) -> &str {
        &self.restaurant_name
    }

    pub fn plan_type(&self) -> &PlanType {
        &self.plan_type
    }

    pub fn total_meals(&self) -> u32 {
        self.total_meals
    }

    /// Consumed indices, ascending.
    pub fn used_meals(&self) -> &BTreeSet<u32> {
        &self.used_meals
    }

    pub fn purchase_date(&self) -> DateTime<Utc> {
        self.purchase_date
    }

    pub fn expiry_date(&self) -> DateTime<Utc> {
        self.expiry_date
    }

    pub fn price(&self) -> i64 {
        self.price
    }

    pub fn used_count(&self) -> u32 {
        // used_meals is bounded by total_meals, which is a u32.
        self.used_meals.len() as u32
    }

    pub fn remaining_meals(&self) -> u32 {
        self.total_meals.saturating_sub(self.used_count())
    }

    pub fn is_used(&self, index: u32) -> bool {
        self.used_meals.contains(&index)
    }

    pub fn is_depleted(&self) -> bool {
        self.remaining_meals() == 0
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry_date
    }

    /// Capacity-only status (`Active` or `Depleted`).
    pub fn status(&self) -> PlanStatus {
        if self.is_depleted() {
            PlanStatus::Depleted
        } else {
            PlanStatus::Active
        }
    }

    /// Status including expiry. Depletion wins over expiry.
    pub fn status_at(&self, now: DateTime<Utc>) -> PlanStatus {
        match self.status() {
            PlanStatus::Active if self.is_expired_at(now) => PlanStatus::Expired,
            status => status,
        }
    }

    /// Unused indices in ascending order.
    pub fn unused_indices(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.total_meals).filter(move |i| !self.used_meals.contains(i))
    }

    pub fn next_unused(&self) -> Option<u32> {
        self.unused_indices().next()
    }

    /// Check that `index` can be consumed right now.
    pub fn check_usable(&self, index: u32) -> LedgerResult<()> {
        if index >= self.total_meals {
            return Err(LedgerError::MealIndexOutOfRange {
                index,
                total: self.total_meals,
            });
        }
        if self.is_used(index) {
            return Err(LedgerError::MealAlreadyUsed { index });
        }
        Ok(())
    }

    /// The `count` lowest unused indices, scanning upward from 0.
    ///
    /// Fails without side effects when fewer than `count` remain.
    pub fn lowest_unused(&self, count: u32) -> LedgerResult<Vec<u32>> {
        let remaining = self.remaining_meals();
        if remaining < count {
            return Err(LedgerError::InsufficientMealsRemaining {
                requested: count,
                remaining,
            });
        }
        Ok(self.unused_indices().take(count as usize).collect())
    }

    pub(crate) fn mark_used(&mut self, indices: &[u32]) {
        for &index in indices {
            if index < self.total_meals {
                self.used_meals.insert(index);
            }
        }
    }

    /// Structural invariants, checked when restoring persisted state.
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        if self.total_meals == 0 {
            return Err(format!("plan {} has no meals", self.id));
        }
        if let Some(&max) = self.used_meals.last() {
            if max >= self.total_meals {
                return Err(format!(
                    "plan {} marks meal {max} used but holds only {}",
                    self.id, self.total_meals
                ));
            }
        }
        if self.price < 0 {
            return Err(format!("plan {} has negative price {}", self.id, self.price));
        }
        Ok(())
    }
}

impl Entity for MealPlan {
    type Id = MealPlanId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
