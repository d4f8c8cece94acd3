//! Ledger Operations
//!
//! Cash and asset movements on account rows. Every operation runs inside the
//! caller's unit of work and locks the account row it touches; nothing is
//! visible to other units of work until the caller commits.

use rust_decimal::Decimal;

use super::UnitOfWork;
use crate::engine::entry::{AccountId, Symbol};
use crate::error::{ExchangeError, Result};

pub struct Ledger;

impl Ledger {
    /// Reserve the worst-case cost of a buy order: `order_value * (1 + rate)`.
    /// Returns the amount taken from the spendable balance.
    pub fn lock_for_buy(
        uow: &mut UnitOfWork<'_>,
        account_id: AccountId,
        order_value: Decimal,
        commission_rate: Decimal,
    ) -> Result<Decimal> {
        let required = order_value
            .checked_mul(Decimal::ONE + commission_rate)
            .ok_or_else(|| {
                ExchangeError::validation(format!("order value {} is too large", order_value))
            })?;
        uow.lock_account(account_id)?.debit_usd(required)?;
        log::debug!("account {} locked {} USD", account_id, required);
        Ok(required)
    }

    pub fn lock_for_sell(
        uow: &mut UnitOfWork<'_>,
        account_id: AccountId,
        symbol: Symbol,
        amount: Decimal,
    ) -> Result<()> {
        uow.lock_account(account_id)?.lock_asset(symbol, amount)?;
        log::debug!("account {} locked {} {}", account_id, amount, symbol);
        Ok(())
    }

    /// Exact inverse of [`Ledger::lock_for_buy`] for the same price, amount and rate
    pub fn unlock_buy(
        uow: &mut UnitOfWork<'_>,
        account_id: AccountId,
        price: Decimal,
        amount: Decimal,
        commission_rate: Decimal,
    ) -> Result<()> {
        let reserved = price
            .checked_mul(amount)
            .and_then(|value| value.checked_mul(Decimal::ONE + commission_rate))
            .ok_or_else(|| {
                ExchangeError::invariant(format!("reserved amount of {} x {} overflows", price, amount))
            })?;
        uow.lock_account(account_id)?.adjust_usd(reserved)?;
        log::debug!("account {} unlocked {} USD", account_id, reserved);
        Ok(())
    }

    pub fn unlock_sell(
        uow: &mut UnitOfWork<'_>,
        account_id: AccountId,
        symbol: Symbol,
        amount: Decimal,
    ) -> Result<()> {
        uow.lock_account(account_id)?.unlock_asset(symbol, amount)?;
        log::debug!("account {} unlocked {} {}", account_id, amount, symbol);
        Ok(())
    }

    /// The sold amount leaves the seller's locked side for good
    pub fn release_sell_on_fill(
        uow: &mut UnitOfWork<'_>,
        account_id: AccountId,
        symbol: Symbol,
        amount: Decimal,
    ) -> Result<()> {
        uow.lock_account(account_id)?
            .release_locked_asset(symbol, amount)
    }

    pub fn credit_buyer_asset(
        uow: &mut UnitOfWork<'_>,
        account_id: AccountId,
        symbol: Symbol,
        amount: Decimal,
    ) -> Result<()> {
        if amount < Decimal::ZERO {
            return Err(ExchangeError::invariant(format!(
                "negative asset credit {} {}",
                amount, symbol
            )));
        }
        uow.lock_account(account_id)?.credit_asset(symbol, amount);
        Ok(())
    }

    pub fn credit_seller_cash(
        uow: &mut UnitOfWork<'_>,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<()> {
        if amount < Decimal::ZERO {
            return Err(ExchangeError::invariant(format!(
                "negative cash credit {}",
                amount
            )));
        }
        uow.lock_account(account_id)?.adjust_usd(amount)
    }

    /// Positive delta refunds, negative delta charges extra
    pub fn adjust_buyer_cash(
        uow: &mut UnitOfWork<'_>,
        account_id: AccountId,
        delta: Decimal,
    ) -> Result<()> {
        uow.lock_account(account_id)?.adjust_usd(delta)
    }
}
