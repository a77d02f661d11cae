//! Ledger error model.

use thiserror::Error;

use crate::id::MealPlanId;

/// Result type used across the ledger domain.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Rejection of a ledger operation.
///
/// Every variant is an expected outcome of bad input or insufficient funds/capacity.
/// None of them is fatal, and a rejected operation never changes state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A money amount was zero, negative, or would overflow a balance.
    #[error("invalid amount: {amount}")]
    InvalidAmount { amount: i64 },

    /// The source wallet cannot cover the requested debit.
    #[error("insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: i64, required: i64 },

    /// A quantity or meal count was below one.
    #[error("invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: u32 },

    /// No plan with this id is held by the account.
    #[error("meal plan not found: {plan_id}")]
    PlanNotFound { plan_id: MealPlanId },

    /// The meal index lies outside `[0, total)`.
    #[error("meal index {index} out of range (plan has {total} meals)")]
    MealIndexOutOfRange { index: u32, total: u32 },

    /// The meal index was consumed earlier.
    #[error("meal {index} already used")]
    MealAlreadyUsed { index: u32 },

    /// The plan has fewer unused meals than requested.
    #[error("insufficient meals remaining: requested {requested}, remaining {remaining}")]
    InsufficientMealsRemaining { requested: u32, remaining: u32 },
}

impl LedgerError {
    /// Stable machine-readable code, for mapping to user-facing messages.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount { .. } => "invalid_amount",
            LedgerError::InsufficientBalance { .. } => "insufficient_balance",
            LedgerError::InvalidQuantity { .. } => "invalid_quantity",
            LedgerError::PlanNotFound { .. } => "plan_not_found",
            LedgerError::MealIndexOutOfRange { .. } => "meal_index_out_of_range",
            LedgerError::MealAlreadyUsed { .. } => "meal_already_used",
            LedgerError::InsufficientMealsRemaining { .. } => "insufficient_meals_remaining",
        }
    }
}
