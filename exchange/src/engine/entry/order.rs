use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use super::{AccountId, Symbol};
use crate::error::ExchangeError;

/// Numeric order id, allocated in ascending order by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("buy"),
            OrderSide::Sell => f.write_str("sell"),
        }
    }
}

impl FromStr for OrderSide {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            _ => Err(ExchangeError::validation(format!(
                "side must be either \"buy\" or \"sell\", got {:?}",
                s
            ))),
        }
    }
}

/// Filled and Cancelled are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Filled,
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Open => f.write_str("open"),
            OrderStatus::Filled => f.write_str("filled"),
            OrderStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub price: Decimal,
    pub amount: Decimal,
    /// Commission rate in force when the order was placed
    pub commission_rate: Decimal,
    pub status: OrderStatus,
    /// Unix milliseconds
    pub created_at: u64,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: OrderId,
        account_id: AccountId,
        symbol: Symbol,
        side: OrderSide,
        price: Decimal,
        amount: Decimal,
        commission_rate: Decimal,
    ) -> Self {
        Self {
            id,
            account_id,
            symbol,
            side,
            price,
            amount,
            commission_rate,
            status: OrderStatus::Open,
            created_at: now_millis(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    /// price * amount, `None` on overflow
    pub fn value(&self) -> Option<Decimal> {
        self.price.checked_mul(self.amount)
    }

    /// USD reserved for a buy order: value plus the worst-case commission
    pub fn reserved_usd(&self) -> Option<Decimal> {
        self.value()?
            .checked_mul(Decimal::ONE + self.commission_rate)
    }

    /// Full-match rule: opposite side, same symbol, identical amount and a
    /// crossing price (`sell.price <= buy.price`).
    pub fn can_fill_against(&self, other: &Order) -> bool {
        if other.side != self.side.opposite() || self.symbol != other.symbol || self.amount != other.amount {
            return false;
        }
        match self.side {
            OrderSide::Buy => other.price <= self.price,
            OrderSide::Sell => other.price >= self.price,
        }
    }

    /// FIFO key, ties on the timestamp fall back to the id sequence
    pub fn age_key(&self) -> (u64, OrderId) {
        (self.created_at, self.id)
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
