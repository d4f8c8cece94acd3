//! Data Structures Module
//!
//! Row storage with units of work, plus the ledger and order-store operations
//! that run inside them.

pub mod ledger;
pub mod orderbook;
pub mod store;

pub use ledger::Ledger;
pub use orderbook::{NewOrder, OrderStore};
pub use store::{Store, UnitOfWork};
