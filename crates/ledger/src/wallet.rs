use core::str::FromStr;

use serde::{Deserialize, Serialize};

use mealwallet_core::{LedgerError, LedgerResult};

/// One of the two balances an account holds.
///
/// The set is closed: exchanges name the source wallet and always credit the
/// other one, so a same-wallet exchange cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    /// Funds plan purchases; the deposit target of every top-up.
    Meal,
    /// Secondary balance, reachable only via exchange.
    Flexie,
}

impl WalletKind {
    /// The other wallet.
    pub fn counterpart(self) -> Self {
        match self {
            WalletKind::Meal => WalletKind::Flexie,
            WalletKind::Flexie => WalletKind::Meal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WalletKind::Meal => "meal",
            WalletKind::Flexie => "flexie",
        }
    }
}

impl core::fmt::Display for WalletKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "meal" => Ok(WalletKind::Meal),
            "flexie" => Ok(WalletKind::Flexie),
            other => Err(format!("unknown wallet '{other}' (expected meal or flexie)")),
        }
    }
}

/// The wallet set of one account, in minor currency units (RWF).
///
/// Both balances are non-negative. The checked operations below return the
/// would-be wallet set without touching `self`, which is what the aggregate's
/// pure `handle` needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Wallets {
    meal: i64,
    flexie: i64,
}

impl Wallets {
    /// Build a wallet set, rejecting negative balances.
    pub fn new(meal: i64, flexie: i64) -> LedgerResult<Self> {
        for amount in [meal, flexie] {
            if amount < 0 {
                return Err(LedgerError::InvalidAmount { amount });
            }
        }
        Ok(Self { meal, flexie })
    }

    pub fn meal(&self) -> i64 {
        self.meal
    }

    pub fn flexie(&self) -> i64 {
        self.flexie
    }

    pub fn balance(&self, kind: WalletKind) -> i64 {
        match kind {
            WalletKind::Meal => self.meal,
            WalletKind::Flexie => self.flexie,
        }
    }

    /// Sum of both balances.
    pub fn total(&self) -> i64 {
        self.meal.saturating_add(self.flexie)
    }

    pub fn is_valid(&self) -> bool {
        self.meal >= 0 && self.flexie >= 0
    }

    /// `self` with `amount` added to `kind`.
    pub fn credited(&self, kind: WalletKind, amount: i64) -> LedgerResult<Self> {
        ensure_positive(amount)?;
        let next = self
            .balance(kind)
            .checked_add(amount)
            .ok_or(LedgerError::InvalidAmount { amount })?;
        Ok(self.with_balance(kind, next))
    }

    /// `self` with `amount` taken from `kind`.
    pub fn debited(&self, kind: WalletKind, amount: i64) -> LedgerResult<Self> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        let available = self.balance(kind);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                available,
                required: amount,
            });
        }
        Ok(self.with_balance(kind, available - amount))
    }

    /// `self` with `amount` moved from `from` to its counterpart.
    pub fn exchanged(&self, from: WalletKind, amount: i64) -> LedgerResult<Self> {
        ensure_positive(amount)?;
        self.debited(from, amount)?
            .credited(from.counterpart(), amount)
    }

    pub(crate) fn with_balance(&self, kind: WalletKind, value: i64) -> Self {
        let mut next = *self;
        match kind {
            WalletKind::Meal => next.meal = value,
            WalletKind::Flexie => next.flexie = value,
        }
        next
    }
}

fn ensure_positive(amount: i64) -> LedgerResult<()> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount { amount });
    }
    Ok(())
}
