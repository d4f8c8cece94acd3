pub mod account;
pub mod order;
pub mod symbol;
pub mod trade;

pub use account::{Account, AccountId, AssetHolding};
pub use order::{Order, OrderId, OrderSide, OrderStatus};
pub use symbol::{Symbol, SymbolInfo};
pub use trade::Trade;
