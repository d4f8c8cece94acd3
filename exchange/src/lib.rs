//! In-memory spot exchange: fund locking at placement, full-match-only order
//! matching and atomic settlement.

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod server;

pub use config::{DispatchMode, RuntimeConfig};
pub use engine::entry::{Account, AccountId, AssetHolding, Order, OrderId, OrderSide, OrderStatus, Symbol, Trade};
pub use engine::event::{ChannelNotifier, LogNotifier, Notifier, TradeExecuted};
pub use engine::matchlogic::{MatchOutcome, SweepReport};
pub use engine::spot::PlaceOrder;
pub use engine::MatchEngine;
pub use error::{ExchangeError, Result};
