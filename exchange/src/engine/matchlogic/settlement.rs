//! Settlement
//!
//! Applies the economic effects of one full match inside the matcher's unit
//! of work. Either every effect commits with the trade record or none does.

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::engine::data::{Ledger, UnitOfWork};
use crate::engine::entry::{Order, OrderId, OrderSide, OrderStatus, Trade};
use crate::engine::event::{Notifier, TradeExecuted};
use crate::error::{ExchangeError, Result};

/// Cash flows of a match between an open buy and an open sell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeEconomics {
    /// The seller's ask
    pub trade_price: Decimal,
    pub trade_value: Decimal,
    /// Charged to the buyer only
    pub commission: Decimal,
    pub buyer_pays: Decimal,
    /// What placement reserved from the buyer
    pub buyer_locked: Decimal,
    pub buyer_refund: Decimal,
}

impl TradeEconomics {
    /// Uses the commission rate frozen on the buy order for both the reserved
    /// amount and the charge, so the refund cannot go negative unless the
    /// pair does not actually cross.
    pub fn compute(buy: &Order, sell: &Order) -> Result<Self> {
        if buy.side != OrderSide::Buy || sell.side != OrderSide::Sell {
            return Err(ExchangeError::invariant(format!(
                "settlement needs a buy and a sell, got {} {} and {} {}",
                buy.side, buy.id, sell.side, sell.id
            )));
        }
        if buy.symbol != sell.symbol || buy.amount != sell.amount || sell.price > buy.price {
            return Err(ExchangeError::invariant(format!(
                "orders {} and {} do not fully match",
                buy.id, sell.id
            )));
        }

        let trade_price = sell.price;
        let overflow = || {
            ExchangeError::invariant(format!(
                "trade economics of orders {} and {} overflow",
                buy.id, sell.id
            ))
        };
        let trade_value = trade_price.checked_mul(buy.amount).ok_or_else(overflow)?;
        let commission = trade_value
            .checked_mul(buy.commission_rate)
            .ok_or_else(overflow)?;
        let buyer_pays = trade_value.checked_add(commission).ok_or_else(overflow)?;
        let buyer_locked = buy.reserved_usd().ok_or_else(overflow)?;
        let buyer_refund = buyer_locked - buyer_pays;
        if buyer_refund < Decimal::ZERO {
            return Err(ExchangeError::invariant(format!(
                "negative refund {} for buy order {}",
                buyer_refund, buy.id
            )));
        }

        Ok(Self {
            trade_price,
            trade_value,
            commission,
            buyer_pays,
            buyer_locked,
            buyer_refund,
        })
    }
}

/// Result of a settlement that has been staged but not yet committed
#[derive(Debug, Clone)]
pub struct Settled {
    pub trade: Trade,
    pub economics: TradeEconomics,
    pub event: TradeExecuted,
}

pub struct Settlement {
    notifier: Arc<dyn Notifier>,
}

impl Settlement {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Stage the settlement of two locked, open orders. The caller commits.
    pub fn settle(&self, uow: &mut UnitOfWork<'_>, buy_id: OrderId, sell_id: OrderId) -> Result<Settled> {
        let buy = uow.order(buy_id)?.clone();
        let sell = uow.order(sell_id)?.clone();
        if !buy.is_open() || !sell.is_open() {
            return Err(ExchangeError::invariant(format!(
                "settling non-open orders {} ({}) and {} ({})",
                buy.id, buy.status, sell.id, sell.status
            )));
        }
        let economics = TradeEconomics::compute(&buy, &sell)?;
        let symbol = buy.symbol;
        let amount = buy.amount;

        uow.lock_account(buy.account_id)?;
        uow.lock_account(sell.account_id)?;

        Ledger::credit_buyer_asset(uow, buy.account_id, symbol, amount)?;
        Ledger::credit_seller_cash(uow, sell.account_id, economics.trade_value)?;
        Ledger::adjust_buyer_cash(uow, buy.account_id, economics.buyer_refund)?;
        Ledger::release_sell_on_fill(uow, sell.account_id, symbol, amount)?;
        uow.set_order_status(buy.id, OrderStatus::Filled)?;
        uow.set_order_status(sell.id, OrderStatus::Filled)?;

        let trade = Trade::new(
            buy.id,
            sell.id,
            symbol,
            economics.trade_price,
            amount,
            economics.commission,
        );
        uow.insert_trade(trade.clone());

        let event = TradeExecuted {
            buy_order: uow.order(buy.id)?.clone(),
            sell_order: uow.order(sell.id)?.clone(),
            symbol,
            amount,
            price: economics.trade_price,
            trade_value: economics.trade_value,
            commission: economics.commission,
            timestamp: trade.created_at,
        };

        Ok(Settled {
            trade,
            economics,
            event,
        })
    }

    /// Deliver the event once the settlement has committed
    pub fn publish(&self, event: &TradeExecuted) {
        for account_id in event.recipients() {
            self.notifier.notify(account_id, event);
        }
    }
}
