//! Match Engine Module
//!
//! The facade adapters call into. Every operation runs in its own unit of
//! work; a placement commits before its match is dispatched.

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::thread::JoinHandle;

use super::data::Store;
use super::entry::{Account, AccountId, Order, OrderId, SymbolInfo, Trade};
use super::event::Notifier;
use super::matchlogic::{MatchOutcome, Matcher, SweepReport};
use super::spot::{Dispatcher, OrderProcessor, PlaceOrder};
use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::metrics::record_metrics;

pub struct MatchEngine {
    store: Arc<Store>,
    processor: OrderProcessor,
    matcher: Arc<Matcher>,
    dispatcher: RwLock<Dispatcher>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MatchEngine {
    pub fn new(config: &RuntimeConfig, notifier: Arc<dyn Notifier>) -> MatchEngine {
        let store = Arc::new(Store::new());
        let matcher = Arc::new(Matcher::new(store.clone(), notifier));
        let (dispatcher, worker) = Dispatcher::new(config.dispatch, matcher.clone());
        MatchEngine {
            processor: OrderProcessor::new(
                store.clone(),
                config.commission_rate,
                config.max_decimal_places,
            ),
            store,
            matcher,
            dispatcher: RwLock::new(dispatcher),
            worker: Mutex::new(worker),
        }
    }

    pub fn place_order(&self, request: &PlaceOrder) -> Result<Order> {
        let order = record_metrics("place_order", || self.processor.place_order(request))?;
        self.dispatcher.read().dispatch(order.id);
        Ok(order)
    }

    pub fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        record_metrics("cancel_order", || self.processor.cancel_order(order_id))
    }

    pub fn list_open_orders(&self, caller: AccountId, symbol: Option<&str>) -> Vec<Order> {
        self.processor.list_open_orders(caller, symbol)
    }

    pub fn list_my_orders(&self, account_id: AccountId) -> Vec<Order> {
        self.processor.list_my_orders(account_id)
    }

    pub fn list_symbols(&self) -> Vec<SymbolInfo> {
        self.processor.list_symbols()
    }

    /// One match attempt for an open order, idempotent
    pub fn match_order(&self, order_id: OrderId) -> Result<MatchOutcome> {
        record_metrics("match_order", || self.matcher.match_order(order_id))
    }

    pub fn run_match_sweep(&self) -> SweepReport {
        let report: Result<SweepReport> = record_metrics("match_sweep", || Ok(self.matcher.sweep()));
        report.unwrap_or_default()
    }

    /// Sweep through the configured dispatch: queued engines hand it to the
    /// worker and get no report back
    pub fn schedule_sweep(&self) -> Option<SweepReport> {
        let report: Result<Option<SweepReport>> =
            record_metrics("match_sweep", || Ok(self.dispatcher.read().sweep(&self.matcher)));
        report.unwrap_or_default()
    }

    pub fn open_account(&self, usd_balance: Decimal) -> Result<AccountId> {
        record_metrics("open_account", || self.processor.open_account(usd_balance))
    }

    pub fn deposit_asset(&self, account_id: AccountId, symbol: &str, amount: Decimal) -> Result<Account> {
        record_metrics("deposit_asset", || {
            self.processor.deposit_asset(account_id, symbol, amount)
        })
    }

    /// Profile view: USD balance and every holding
    pub fn account(&self, account_id: AccountId) -> Result<Account> {
        self.processor.account(account_id)
    }

    pub fn order(&self, order_id: OrderId) -> Option<Order> {
        self.store.order(order_id)
    }

    /// Every recorded trade in creation order
    pub fn trades(&self) -> Vec<Trade> {
        self.processor.trades()
    }

    pub fn commission_rate(&self) -> Decimal {
        self.processor.commission_rate()
    }

    /// Stops dispatching and waits for a queued worker to drain. Orders placed
    /// afterwards are left to explicit matching.
    pub fn shutdown(&self) {
        *self.dispatcher.write() = Dispatcher::Off;
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                log::error!("match worker panicked");
            }
        }
    }
}

impl Drop for MatchEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
