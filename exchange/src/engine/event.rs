//! Trade Notifications
//!
//! Settlement produces one [`TradeExecuted`] per trade. It is delivered to the
//! buyer's and the seller's channels individually, never broadcast.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::engine::entry::{AccountId, Order, Symbol};

/// Channel event name used by adapters
pub const TRADE_EXECUTED: &str = "order.matched";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeExecuted {
    /// Both orders as committed, i.e. already filled
    pub buy_order: Order,
    pub sell_order: Order,
    pub symbol: Symbol,
    pub amount: Decimal,
    pub price: Decimal,
    pub trade_value: Decimal,
    pub commission: Decimal,
    /// Unix milliseconds
    pub timestamp: u64,
}

impl TradeExecuted {
    /// Accounts that receive this event, each once
    pub fn recipients(&self) -> Vec<AccountId> {
        let buyer = self.buy_order.account_id;
        let seller = self.sell_order.account_id;
        if buyer == seller {
            vec![buyer]
        } else {
            vec![buyer, seller]
        }
    }
}

/// Delivery capability injected into the engine
pub trait Notifier: Send + Sync {
    fn notify(&self, account_id: AccountId, event: &TradeExecuted);
}

/// Per-account pub/sub
#[derive(Default)]
pub struct ChannelNotifier {
    subscribers: Mutex<HashMap<AccountId, Vec<Sender<TradeExecuted>>>>,
}

impl ChannelNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, account_id: AccountId) -> Receiver<TradeExecuted> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().entry(account_id).or_default().push(tx);
        rx
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, account_id: AccountId, event: &TradeExecuted) {
        let mut subscribers = self.subscribers.lock();
        if let Some(senders) = subscribers.get_mut(&account_id) {
            // dropped receivers unsubscribe
            senders.retain(|tx| tx.send(event.clone()).is_ok());
            if senders.is_empty() {
                subscribers.remove(&account_id);
            }
        }
    }
}

/// Writes each delivery to the log as JSON
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, account_id: AccountId, event: &TradeExecuted) {
        match serde_json::to_string(event) {
            Ok(payload) => log::info!("user.{} {} {}", account_id, TRADE_EXECUTED, payload),
            Err(e) => log::error!("failed to serialize trade event: {}", e),
        }
    }
}
