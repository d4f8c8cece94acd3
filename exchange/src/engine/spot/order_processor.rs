//! Order Processing Module
//!
//! Validates requests from adapters and runs placement, cancellation and the
//! account operations, each in its own unit of work.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

use crate::engine::data::{Ledger, NewOrder, OrderStore, Store};
use crate::engine::entry::{Account, AccountId, Order, OrderId, OrderSide, Symbol, SymbolInfo, Trade};
use crate::error::{ExchangeError, Result};

/// Integer digits allowed in a price or an amount
pub const MAX_INTEGER_DIGITS: u32 = 16;

/// Placement request as an adapter hands it over, symbol and side unparsed
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    pub account_id: AccountId,
    pub symbol: String,
    pub side: String,
    pub price: Decimal,
    pub amount: Decimal,
}

pub struct OrderProcessor {
    store: Arc<Store>,
    /// Frozen onto every order at placement
    commission_rate: Decimal,
    max_decimal_places: u32,
}

impl OrderProcessor {
    pub fn new(store: Arc<Store>, commission_rate: Decimal, max_decimal_places: u32) -> Self {
        Self {
            store,
            commission_rate,
            max_decimal_places,
        }
    }

    pub fn commission_rate(&self) -> Decimal {
        self.commission_rate
    }

    /// Rejects bad input before any lock is taken
    pub fn validate(&self, request: &PlaceOrder) -> Result<NewOrder> {
        let symbol = request.symbol.parse::<Symbol>()?;
        let side = request.side.parse::<OrderSide>()?;
        self.check_quantity("price", request.price)?;
        self.check_quantity("amount", request.amount)?;
        let value = order_value(request.price, request.amount)?;
        if value.checked_mul(Decimal::ONE + self.commission_rate).is_none() {
            return Err(ExchangeError::validation(format!(
                "order value {} is too large",
                value
            )));
        }
        Ok(NewOrder {
            account_id: request.account_id,
            symbol,
            side,
            price: request.price,
            amount: request.amount,
            commission_rate: self.commission_rate,
        })
    }

    fn check_quantity(&self, field: &str, value: Decimal) -> Result<()> {
        if value <= Decimal::ZERO {
            return Err(ExchangeError::validation(format!(
                "{} must be positive, got {}",
                field, value
            )));
        }
        if value >= Decimal::from(10u64.pow(MAX_INTEGER_DIGITS)) {
            return Err(ExchangeError::validation(format!(
                "{} {} has more than {} integer digits",
                field, value, MAX_INTEGER_DIGITS
            )));
        }
        if value.normalize().scale() > self.max_decimal_places {
            return Err(ExchangeError::validation(format!(
                "{} {} has more than {} decimal places",
                field, value, self.max_decimal_places
            )));
        }
        Ok(())
    }

    /// Locks funds or assets and creates the open order in one unit of work.
    /// Matching is the caller's business once this returns.
    pub fn place_order(&self, request: &PlaceOrder) -> Result<Order> {
        let new = self.validate(request)?;
        let mut uow = self.store.begin();
        match new.side {
            OrderSide::Buy => {
                Ledger::lock_for_buy(
                    &mut uow,
                    new.account_id,
                    order_value(new.price, new.amount)?,
                    new.commission_rate,
                )?;
            }
            OrderSide::Sell => {
                Ledger::lock_for_sell(&mut uow, new.account_id, new.symbol, new.amount)?;
            }
        }
        let order = OrderStore::create_open_order(&mut uow, &new);
        uow.commit();
        log::info!(
            "order {} placed: account={} {} {} {} @ {}",
            order.id,
            order.account_id,
            order.side,
            order.amount,
            order.symbol,
            order.price
        );
        Ok(order)
    }

    pub fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        let mut uow = self.store.begin();
        let order = OrderStore::cancel(&mut uow, order_id)?;
        uow.commit();
        log::info!("order {} cancelled", order_id);
        Ok(order)
    }

    /// Book view for `caller`: everyone else's open orders, newest first. An
    /// unknown symbol filter matches nothing.
    pub fn list_open_orders(&self, caller: AccountId, symbol: Option<&str>) -> Vec<Order> {
        let symbol = match symbol.map(str::parse::<Symbol>) {
            None => None,
            Some(Ok(symbol)) => Some(symbol),
            Some(Err(_)) => return Vec::new(),
        };
        OrderStore::list_open_excluding_account(&self.store, caller, symbol)
    }

    pub fn list_my_orders(&self, account_id: AccountId) -> Vec<Order> {
        OrderStore::list_by_account(&self.store, account_id)
    }

    pub fn list_symbols(&self) -> Vec<SymbolInfo> {
        Symbol::ALL.iter().map(Symbol::info).collect()
    }

    pub fn open_account(&self, usd_balance: Decimal) -> Result<AccountId> {
        if usd_balance < Decimal::ZERO {
            return Err(ExchangeError::validation(format!(
                "opening balance must not be negative, got {}",
                usd_balance
            )));
        }
        let account_id = self.store.open_account(usd_balance);
        log::info!("account {} opened with {} USD", account_id, usd_balance);
        Ok(account_id)
    }

    /// Adds free units of `symbol`, e.g. from an external deposit
    pub fn deposit_asset(&self, account_id: AccountId, symbol: &str, amount: Decimal) -> Result<Account> {
        let symbol = symbol.parse::<Symbol>()?;
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::validation(format!(
                "deposit must be positive, got {}",
                amount
            )));
        }
        let mut uow = self.store.begin();
        Ledger::credit_buyer_asset(&mut uow, account_id, symbol, amount)?;
        uow.commit();
        self.account(account_id)
    }

    pub fn account(&self, account_id: AccountId) -> Result<Account> {
        self.store
            .account(account_id)
            .ok_or(ExchangeError::AccountNotFound(account_id))
    }

    pub fn trades(&self) -> Vec<Trade> {
        self.store.trades()
    }
}

fn order_value(price: Decimal, amount: Decimal) -> Result<Decimal> {
    price.checked_mul(amount).ok_or_else(|| {
        ExchangeError::validation(format!("order value of {} x {} is too large", amount, price))
    })
}
