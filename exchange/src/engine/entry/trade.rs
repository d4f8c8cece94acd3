//! Trade Records
//!
//! A trade is the immutable audit record of one settled match.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::now_millis;
use super::{OrderId, Symbol};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub symbol: Symbol,
    /// Execution price, always the seller's ask
    pub price: Decimal,
    pub amount: Decimal,
    pub buyer_fee: Decimal,
    pub seller_fee: Decimal,
    /// Unix milliseconds
    pub created_at: u64,
}

impl Trade {
    pub fn new(
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        symbol: Symbol,
        price: Decimal,
        amount: Decimal,
        buyer_fee: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            buy_order_id,
            sell_order_id,
            symbol,
            price,
            amount,
            buyer_fee,
            seller_fee: Decimal::ZERO,
            created_at: now_millis(),
        }
    }

    /// price * amount
    pub fn value(&self) -> Decimal {
        self.price * self.amount
    }
}
