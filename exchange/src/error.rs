//! Error taxonomy for the exchange engine
//!
//! Business failures (validation, insufficient resources, state conflicts) are
//! returned to the caller and never mutate state. Invariant violations abort the
//! enclosing unit of work and are reported as a separate, fatal class.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::engine::entry::{AccountId, OrderId, OrderStatus, Symbol};

pub type Result<T> = std::result::Result<T, ExchangeError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient USD balance: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("insufficient {symbol} balance: required {required}, available {available}")]
    InsufficientAsset {
        symbol: Symbol,
        required: Decimal,
        available: Decimal,
    },

    #[error("asset not found for symbol: {symbol}")]
    AssetNotFound { symbol: Symbol },

    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("order not found: {0}")]
    NotFound(OrderId),

    #[error("order {order_id} is {status} and cannot be cancelled")]
    InvalidState { order_id: OrderId, status: OrderStatus },

    #[error("locked {symbol} amount {locked} is less than requested {requested}")]
    LockedAmountInvariantViolation {
        symbol: Symbol,
        locked: Decimal,
        requested: Decimal,
    },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl ExchangeError {
    /// True for errors that indicate corrupted state or a bug rather than a
    /// rejected request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExchangeError::LockedAmountInvariantViolation { .. }
                | ExchangeError::InvariantViolation(_)
        )
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        ExchangeError::Validation(msg.into())
    }

    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        ExchangeError::InvariantViolation(msg.into())
    }
}
