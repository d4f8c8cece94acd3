//! Order Store operations: creation, cancellation, counter-order selection and
//! the read-only listings.

use rust_decimal::Decimal;
use std::cmp::Reverse;

use super::{Ledger, Store, UnitOfWork};
use crate::engine::entry::{AccountId, Order, OrderId, OrderSide, OrderStatus, Symbol};
use crate::error::{ExchangeError, Result};

/// Validated placement request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub price: Decimal,
    pub amount: Decimal,
    pub commission_rate: Decimal,
}

pub struct OrderStore;

impl OrderStore {
    /// Stage a new open order. The caller has already locked the funds or
    /// assets in the same unit of work.
    pub fn create_open_order(uow: &mut UnitOfWork<'_>, new: &NewOrder) -> Order {
        uow.insert_order(|id| {
            Order::new(
                id,
                new.account_id,
                new.symbol,
                new.side,
                new.price,
                new.amount,
                new.commission_rate,
            )
        })
        .clone()
    }

    /// Cancel an open order and give back what it reserved. The order row
    /// stays locked until the caller commits, so a concurrent match cannot
    /// settle it halfway through.
    pub fn cancel(uow: &mut UnitOfWork<'_>, order_id: OrderId) -> Result<Order> {
        let order = uow.lock_order(order_id)?.clone();
        if !order.is_open() {
            return Err(ExchangeError::InvalidState {
                order_id,
                status: order.status,
            });
        }

        match order.side {
            OrderSide::Buy => Ledger::unlock_buy(
                uow,
                order.account_id,
                order.price,
                order.amount,
                order.commission_rate,
            )?,
            OrderSide::Sell => {
                Ledger::unlock_sell(uow, order.account_id, order.symbol, order.amount)?
            }
        }
        uow.set_order_status(order_id, OrderStatus::Cancelled)?;
        uow.order(order_id).cloned()
    }

    /// Oldest committed open order that fully fills `target`
    pub fn find_open_counter_order(store: &Store, target: &Order) -> Option<Order> {
        store.with_book(|book| {
            book.values()
                .filter(|candidate| candidate.id != target.id && target.can_fill_against(candidate))
                .min_by_key(|candidate| candidate.age_key())
                .cloned()
        })
    }

    /// Open orders of everyone but `account_id`, newest first
    pub fn list_open_excluding_account(
        store: &Store,
        account_id: AccountId,
        symbol: Option<Symbol>,
    ) -> Vec<Order> {
        let mut orders: Vec<Order> = store
            .open_orders()
            .into_iter()
            .filter(|order| order.account_id != account_id)
            .filter(|order| symbol.map_or(true, |symbol| order.symbol == symbol))
            .collect();
        orders.sort_by_key(|order| Reverse(order.age_key()));
        orders
    }

    /// All orders of `account_id` in any status, newest first
    pub fn list_by_account(store: &Store, account_id: AccountId) -> Vec<Order> {
        let mut orders: Vec<Order> = store
            .orders()
            .into_iter()
            .filter(|order| order.account_id == account_id)
            .collect();
        orders.sort_by_key(|order| Reverse(order.age_key()));
        orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn place(store: &Store, account_id: AccountId, side: OrderSide, price: Decimal, amount: Decimal) -> Order {
        let new = NewOrder {
            account_id,
            symbol: Symbol::BTC,
            side,
            price,
            amount,
            commission_rate: dec!(0.015),
        };
        let mut uow = store.begin();
        match side {
            OrderSide::Buy => {
                Ledger::lock_for_buy(&mut uow, account_id, price * amount, new.commission_rate)
                    .unwrap();
            }
            OrderSide::Sell => {
                Ledger::lock_for_sell(&mut uow, account_id, Symbol::BTC, amount).unwrap();
            }
        }
        let order = OrderStore::create_open_order(&mut uow, &new);
        uow.commit();
        order
    }

    fn seller(store: &Store) -> AccountId {
        let account_id = store.open_account(dec!(0));
        let mut uow = store.begin();
        Ledger::credit_buyer_asset(&mut uow, account_id, Symbol::BTC, dec!(10)).unwrap();
        uow.commit();
        account_id
    }

    #[test]
    fn test_cancel_sell_restores_holding() {
        let store = Store::new();
        let account_id = seller(&store);
        let order = place(&store, account_id, OrderSide::Sell, dec!(49000), dec!(0.5));
        let holding = store.account(account_id).unwrap().holdings[&Symbol::BTC].clone();
        assert_eq!(holding.locked_amount, dec!(0.5));

        let mut uow = store.begin();
        let cancelled = OrderStore::cancel(&mut uow, order.id).unwrap();
        uow.commit();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let holding = store.account(account_id).unwrap().holdings[&Symbol::BTC].clone();
        assert_eq!(holding.free_amount, dec!(10));
        assert_eq!(holding.locked_amount, dec!(0));

        let mut uow = store.begin();
        assert_eq!(
            OrderStore::cancel(&mut uow, order.id).unwrap_err(),
            ExchangeError::InvalidState {
                order_id: order.id,
                status: OrderStatus::Cancelled
            }
        );
    }

    #[test]
    fn test_cancel_missing_order() {
        let store = Store::new();
        let mut uow = store.begin();
        assert_eq!(
            OrderStore::cancel(&mut uow, OrderId(99)).unwrap_err(),
            ExchangeError::NotFound(OrderId(99))
        );
    }

    #[test]
    fn test_counter_order_is_oldest_qualifying() {
        let store = Store::new();
        let sell_account = seller(&store);
        let buy_account = store.open_account(dec!(1000000));

        let too_expensive = place(&store, sell_account, OrderSide::Sell, dec!(101), dec!(1));
        let oldest = place(&store, sell_account, OrderSide::Sell, dec!(100), dec!(1));
        let cheaper_but_newer = place(&store, sell_account, OrderSide::Sell, dec!(90), dec!(1));
        let wrong_amount = place(&store, sell_account, OrderSide::Sell, dec!(80), dec!(2));
        let buy = place(&store, buy_account, OrderSide::Buy, dec!(100), dec!(1));

        let found = OrderStore::find_open_counter_order(&store, &buy).unwrap();
        assert_eq!(found.id, oldest.id);
        assert_ne!(found.id, too_expensive.id);
        assert_ne!(found.id, cheaper_but_newer.id);
        assert_ne!(found.id, wrong_amount.id);

        let found = OrderStore::find_open_counter_order(&store, &oldest).unwrap();
        assert_eq!(found.id, buy.id);
    }

    #[test]
    fn test_listings() {
        let store = Store::new();
        let sell_account = seller(&store);
        let buy_account = store.open_account(dec!(1000));

        let first = place(&store, sell_account, OrderSide::Sell, dec!(10), dec!(1));
        let second = place(&store, sell_account, OrderSide::Sell, dec!(11), dec!(1));
        let own = place(&store, buy_account, OrderSide::Buy, dec!(5), dec!(1));

        let mut uow = store.begin();
        OrderStore::cancel(&mut uow, first.id).unwrap();
        uow.commit();

        let open = OrderStore::list_open_excluding_account(&store, buy_account, None);
        assert_eq!(open.iter().map(|o| o.id).collect::<Vec<_>>(), vec![second.id]);
        assert!(OrderStore::list_open_excluding_account(&store, buy_account, Some(Symbol::ETH)).is_empty());

        let mine = OrderStore::list_by_account(&store, sell_account);
        assert_eq!(mine.iter().map(|o| o.id).collect::<Vec<_>>(), vec![second.id, first.id]);
        assert_eq!(mine[1].status, OrderStatus::Cancelled);

        let mine = OrderStore::list_by_account(&store, buy_account);
        assert_eq!(mine.iter().map(|o| o.id).collect::<Vec<_>>(), vec![own.id]);
    }
}
