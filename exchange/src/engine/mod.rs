//! Match Engine Module
//!
//! This module contains the core components of the matching engine system:
//! - `data`: Store, ledger and order store operations
//! - `entry`: Orders, accounts, trades and symbols
//! - `event`: Trade notifications
//! - `matchengine`: The facade exposed to adapters
//! - `matchlogic`: Matching and settlement
//! - `spot`: Order placement and match dispatch

pub mod data;
pub mod entry;
pub mod event;
pub mod matchengine;
pub mod matchlogic;
pub mod spot;

pub use matchengine::MatchEngine;
