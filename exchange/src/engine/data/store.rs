//! Row Store and Units of Work
//!
//! Accounts and orders live in individually locked rows. A [`UnitOfWork`] is
//! the transaction scope: it holds the row locks it acquired until it ends,
//! works on staged copies of those rows, and only writes them back on
//! [`UnitOfWork::commit`]. Dropping a unit of work without committing is a
//! full rollback.
//!
//! Lock hierarchy, outermost first:
//! 1. order rows, ascending id
//! 2. account rows, ascending id
//! 3. the table maps (book, rows, trades), never held while waiting on a row

use parking_lot::{ArcMutexGuard, Mutex, RawMutex, RwLock};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::engine::entry::{Account, AccountId, Order, OrderId, OrderStatus, Trade};
use crate::error::{ExchangeError, Result};

type Row<T> = Arc<Mutex<T>>;

struct Locked<T> {
    row: Row<T>,
    guard: ArcMutexGuard<RawMutex, T>,
    staged: T,
}

impl<T: Clone + PartialEq> Locked<T> {
    fn acquire(row: Row<T>) -> Self {
        let guard = row.lock_arc();
        let staged = (*guard).clone();
        Self { row, guard, staged }
    }

    fn is_dirty(&self) -> bool {
        self.staged != *self.guard
    }

    fn write_back(&mut self) {
        *self.guard = self.staged.clone();
    }
}

/// Lock `row` under `key`, keeping `held` in ascending key order. Rows already
/// held with a greater key are released first and re-acquired afterwards,
/// which refreshes their staged copies. That is only allowed while none of
/// them carries a staged write.
fn acquire_ordered<K, T>(held: &mut BTreeMap<K, Locked<T>>, key: K, row: Row<T>) -> Result<()>
where
    K: Ord + Copy + Display,
    T: Clone + PartialEq,
{
    let later: Vec<K> = held.range(key..).map(|(k, _)| *k).collect();
    if let Some(dirty) = later
        .iter()
        .find(|k| held.get(*k).map_or(false, Locked::is_dirty))
    {
        return Err(ExchangeError::invariant(format!(
            "row {} must be locked before modified row {}",
            key, dirty
        )));
    }

    let released: Vec<(K, Row<T>)> = later
        .into_iter()
        .filter_map(|k| held.remove(&k).map(|locked| (k, locked.row)))
        .collect();
    held.insert(key, Locked::acquire(row));
    for (k, row) in released {
        held.insert(k, Locked::acquire(row));
    }
    Ok(())
}

#[derive(Default)]
pub struct Store {
    accounts: RwLock<HashMap<AccountId, Row<Account>>>,
    orders: RwLock<BTreeMap<OrderId, Row<Order>>>,
    /// Committed open orders
    book: RwLock<BTreeMap<OrderId, Order>>,
    trades: RwLock<Vec<Trade>>,
    last_order_id: AtomicU64,
    last_account_id: AtomicU64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> UnitOfWork<'_> {
        UnitOfWork {
            store: self,
            orders: BTreeMap::new(),
            accounts: BTreeMap::new(),
            created: Vec::new(),
            trades: Vec::new(),
        }
    }

    pub fn open_account(&self, usd_balance: Decimal) -> AccountId {
        let id = AccountId(self.last_account_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.accounts
            .write()
            .insert(id, Arc::new(Mutex::new(Account::new(id, usd_balance))));
        id
    }

    pub fn account(&self, id: AccountId) -> Option<Account> {
        self.account_row(id).map(|row| row.lock().clone())
    }

    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.order_row(id).map(|row| row.lock().clone())
    }

    /// Every order, read row by row. Not a consistent snapshot.
    pub fn orders(&self) -> Vec<Order> {
        let rows: Vec<Row<Order>> = self.orders.read().values().cloned().collect();
        rows.iter().map(|row| row.lock().clone()).collect()
    }

    /// Committed open orders
    pub fn open_orders(&self) -> Vec<Order> {
        self.book.read().values().cloned().collect()
    }

    pub(crate) fn with_book<R>(&self, f: impl FnOnce(&BTreeMap<OrderId, Order>) -> R) -> R {
        f(&self.book.read())
    }

    pub fn trades(&self) -> Vec<Trade> {
        self.trades.read().clone()
    }

    fn account_row(&self, id: AccountId) -> Option<Row<Account>> {
        self.accounts.read().get(&id).cloned()
    }

    fn order_row(&self, id: OrderId) -> Option<Row<Order>> {
        self.orders.read().get(&id).cloned()
    }

    fn allocate_order_id(&self) -> OrderId {
        OrderId(self.last_order_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Transaction scope over the [`Store`]
pub struct UnitOfWork<'s> {
    store: &'s Store,
    orders: BTreeMap<OrderId, Locked<Order>>,
    accounts: BTreeMap<AccountId, Locked<Account>>,
    created: Vec<Order>,
    trades: Vec<Trade>,
}

impl<'s> UnitOfWork<'s> {
    /// Lock an existing order row for the rest of the unit of work. Order rows
    /// must all be locked before any account row.
    pub fn lock_order(&mut self, id: OrderId) -> Result<&Order> {
        if !self.orders.contains_key(&id) {
            if let Some(account_id) = self.accounts.keys().next() {
                return Err(ExchangeError::invariant(format!(
                    "order {} requested while account {} is locked",
                    id, account_id
                )));
            }
            let row = self.store.order_row(id).ok_or(ExchangeError::NotFound(id))?;
            acquire_ordered(&mut self.orders, id, row)?;
        }
        self.order(id)
    }

    /// Staged view of a locked order
    pub fn order(&self, id: OrderId) -> Result<&Order> {
        self.orders
            .get(&id)
            .map(|locked| &locked.staged)
            .ok_or_else(|| ExchangeError::invariant(format!("order {} is not locked", id)))
    }

    /// The only mutation an existing order accepts
    pub fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()> {
        let locked = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| ExchangeError::invariant(format!("order {} is not locked", id)))?;
        locked.staged.status = status;
        Ok(())
    }

    /// Lock an account row. When a unit of work needs several accounts, lock
    /// all of them before mutating any.
    pub fn lock_account(&mut self, id: AccountId) -> Result<&mut Account> {
        if !self.accounts.contains_key(&id) {
            let row = self
                .store
                .account_row(id)
                .ok_or(ExchangeError::AccountNotFound(id))?;
            acquire_ordered(&mut self.accounts, id, row)?;
        }
        self.accounts
            .get_mut(&id)
            .map(|locked| &mut locked.staged)
            .ok_or(ExchangeError::AccountNotFound(id))
    }

    /// Stage a new order. It becomes visible to other units of work, and to
    /// the matcher, only once this one commits.
    pub fn insert_order(&mut self, build: impl FnOnce(OrderId) -> Order) -> &Order {
        let order = build(self.store.allocate_order_id());
        self.created.push(order);
        &self.created[self.created.len() - 1]
    }

    pub fn insert_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    /// Write every staged row back, then release all locks together
    pub fn commit(self) {
        let UnitOfWork {
            store,
            mut orders,
            mut accounts,
            created,
            trades,
        } = self;

        {
            let mut book = store.book.write();
            for (id, locked) in orders.iter_mut() {
                if !locked.staged.is_open() {
                    book.remove(id);
                }
                locked.write_back();
            }
            let mut rows = store.orders.write();
            for order in created {
                book.insert(order.id, order.clone());
                rows.insert(order.id, Arc::new(Mutex::new(order)));
            }
        }
        for locked in accounts.values_mut() {
            locked.write_back();
        }
        store.trades.write().extend(trades);

        drop(orders);
        drop(accounts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::entry::{OrderSide, Symbol};
    use rust_decimal_macros::dec;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn buy(account_id: AccountId) -> impl FnOnce(OrderId) -> Order {
        move |id| {
            Order::new(
                id,
                account_id,
                Symbol::BTC,
                OrderSide::Buy,
                dec!(100),
                dec!(1),
                dec!(0.015),
            )
        }
    }

    #[test]
    fn test_commit_publishes_rows() {
        let store = Store::new();
        let account_id = store.open_account(dec!(500));

        let mut uow = store.begin();
        uow.lock_account(account_id).unwrap().debit_usd(dec!(101.5)).unwrap();
        let id = uow.insert_order(buy(account_id)).id;
        assert!(store.order(id).is_none());
        assert!(store.open_orders().is_empty());
        uow.commit();

        assert_eq!(store.account(account_id).unwrap().usd_balance, dec!(398.5));
        assert_eq!(store.order(id).unwrap().status, OrderStatus::Open);
        assert_eq!(store.open_orders().len(), 1);
    }

    #[test]
    fn test_drop_rolls_back() {
        let store = Store::new();
        let account_id = store.open_account(dec!(500));

        {
            let mut uow = store.begin();
            uow.lock_account(account_id).unwrap().debit_usd(dec!(200)).unwrap();
            uow.insert_order(buy(account_id));
        }

        assert_eq!(store.account(account_id).unwrap().usd_balance, dec!(500));
        assert!(store.orders().is_empty());
    }

    #[test]
    fn test_terminal_status_leaves_book() {
        let store = Store::new();
        let account_id = store.open_account(dec!(500));
        let mut uow = store.begin();
        let id = uow.insert_order(buy(account_id)).id;
        uow.commit();

        let mut uow = store.begin();
        uow.lock_order(id).unwrap();
        uow.set_order_status(id, OrderStatus::Cancelled).unwrap();
        uow.commit();

        assert!(store.open_orders().is_empty());
        assert_eq!(store.order(id).unwrap().status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_missing_rows() {
        let store = Store::new();
        let mut uow = store.begin();
        assert_eq!(
            uow.lock_order(OrderId(42)).unwrap_err(),
            ExchangeError::NotFound(OrderId(42))
        );
        assert_eq!(
            uow.lock_account(AccountId(42)).unwrap_err(),
            ExchangeError::AccountNotFound(AccountId(42))
        );
    }

    #[test]
    fn test_order_lock_after_account_lock_is_rejected() {
        let store = Store::new();
        let account_id = store.open_account(dec!(500));
        let mut uow = store.begin();
        let id = uow.insert_order(buy(account_id)).id;
        uow.commit();

        let mut uow = store.begin();
        uow.lock_account(account_id).unwrap();
        assert!(uow.lock_order(id).unwrap_err().is_fatal());
    }

    #[test]
    fn test_lower_row_after_write_is_rejected() {
        let store = Store::new();
        let first = store.open_account(dec!(10));
        let second = store.open_account(dec!(10));

        let mut uow = store.begin();
        uow.lock_account(second).unwrap().adjust_usd(dec!(1)).unwrap();
        assert!(uow.lock_account(first).unwrap_err().is_fatal());
    }

    #[test]
    fn test_reacquire_refreshes_staged_copy() {
        let store = Store::new();
        let first = store.open_account(dec!(10));
        let second = store.open_account(dec!(10));

        let mut uow = store.begin();
        uow.lock_account(second).unwrap();
        uow.lock_account(first).unwrap();
        assert_eq!(uow.lock_account(second).unwrap().usd_balance, dec!(10));
        assert_eq!(uow.accounts.keys().copied().collect::<Vec<_>>(), vec![first, second]);
    }

    #[test]
    fn test_row_lock_blocks_until_commit() {
        let store = Arc::new(Store::new());
        let account_id = store.open_account(dec!(100));

        let mut uow = store.begin();
        uow.lock_account(account_id).unwrap().debit_usd(dec!(40)).unwrap();

        let (tx, rx) = mpsc::channel();
        let reader = {
            let store = store.clone();
            thread::spawn(move || {
                let mut uow = store.begin();
                let balance = uow.lock_account(account_id).unwrap().usd_balance;
                tx.send(balance).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        uow.commit();
        assert_eq!(rx.recv().unwrap(), dec!(60));
        reader.join().unwrap();
    }
}
