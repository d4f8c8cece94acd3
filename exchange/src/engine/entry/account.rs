//! Account Types
//!
//! An account holds a spendable USD balance (already net of open buy orders)
//! and one asset holding per symbol it has ever touched. Every mutation is
//! checked before it is applied, so a failed call leaves the account untouched.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::Symbol;
use crate::error::{ExchangeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-symbol balance. `locked_amount` is reserved for open sell orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetHolding {
    pub free_amount: Decimal,
    pub locked_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub usd_balance: Decimal,
    pub holdings: BTreeMap<Symbol, AssetHolding>,
}

impl Account {
    pub fn new(id: AccountId, usd_balance: Decimal) -> Self {
        Self {
            id,
            usd_balance,
            holdings: BTreeMap::new(),
        }
    }

    pub fn holding(&self, symbol: Symbol) -> Option<&AssetHolding> {
        self.holdings.get(&symbol)
    }

    /// Take `amount` out of the spendable balance
    pub fn debit_usd(&mut self, amount: Decimal) -> Result<()> {
        if self.usd_balance < amount {
            return Err(ExchangeError::InsufficientFunds {
                required: amount,
                available: self.usd_balance,
            });
        }
        self.usd_balance -= amount;
        Ok(())
    }

    /// Apply a signed cash movement. Driving the balance below zero is an
    /// invariant violation, not a business failure.
    pub fn adjust_usd(&mut self, delta: Decimal) -> Result<()> {
        let next = self.usd_balance + delta;
        if next < Decimal::ZERO {
            return Err(ExchangeError::invariant(format!(
                "account {} balance {} cannot absorb {}",
                self.id, self.usd_balance, delta
            )));
        }
        self.usd_balance = next;
        Ok(())
    }

    /// free -> locked
    pub fn lock_asset(&mut self, symbol: Symbol, amount: Decimal) -> Result<()> {
        let holding = self
            .holdings
            .get_mut(&symbol)
            .ok_or(ExchangeError::AssetNotFound { symbol })?;
        if holding.free_amount < amount {
            return Err(ExchangeError::InsufficientAsset {
                symbol,
                required: amount,
                available: holding.free_amount,
            });
        }
        holding.free_amount -= amount;
        holding.locked_amount += amount;
        Ok(())
    }

    /// locked -> free
    pub fn unlock_asset(&mut self, symbol: Symbol, amount: Decimal) -> Result<()> {
        let holding = self.locked_holding(symbol, amount)?;
        holding.locked_amount -= amount;
        holding.free_amount += amount;
        Ok(())
    }

    /// Drop `amount` from the locked side; the asset has left the account.
    pub fn release_locked_asset(&mut self, symbol: Symbol, amount: Decimal) -> Result<()> {
        let holding = self.locked_holding(symbol, amount)?;
        holding.locked_amount -= amount;
        Ok(())
    }

    /// Creates the holding on first use
    pub fn credit_asset(&mut self, symbol: Symbol, amount: Decimal) {
        self.holdings.entry(symbol).or_default().free_amount += amount;
    }

    fn locked_holding(&mut self, symbol: Symbol, amount: Decimal) -> Result<&mut AssetHolding> {
        match self.holdings.get_mut(&symbol) {
            Some(holding) if holding.locked_amount >= amount => Ok(holding),
            Some(holding) => Err(ExchangeError::LockedAmountInvariantViolation {
                symbol,
                locked: holding.locked_amount,
                requested: amount,
            }),
            None => Err(ExchangeError::LockedAmountInvariantViolation {
                symbol,
                locked: Decimal::ZERO,
                requested: amount,
            }),
        }
    }
}
