//! Spot Market Module
//!
//! This module provides functionality for spot market trading:
//! - `order_processor`: Validates requests and runs placement, cancellation and listings
//! - `dispatcher`: Hands committed orders to the matcher

pub mod dispatcher;
pub mod order_processor;

pub use dispatcher::{Dispatcher, MatchCmd};
pub use order_processor::{OrderProcessor, PlaceOrder};
