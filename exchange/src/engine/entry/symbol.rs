//! Tradable Symbols
//!
//! The exchange lists a fixed set of assets, each quoted in USD.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ExchangeError;

/// An asset that can be traded against USD
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Symbol {
    BTC,
    ETH,
    SOL,
    ADA,
    DOT,
}

/// Listing entry returned to adapters, `name` and `value` are both the ticker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolInfo {
    pub name: &'static str,
    pub value: &'static str,
}

impl Symbol {
    /// Every listed symbol, in listing order
    pub const ALL: [Symbol; 5] = [Symbol::BTC, Symbol::ETH, Symbol::SOL, Symbol::ADA, Symbol::DOT];

    pub fn as_str(&self) -> &'static str {
        match self {
            Symbol::BTC => "BTC",
            Symbol::ETH => "ETH",
            Symbol::SOL => "SOL",
            Symbol::ADA => "ADA",
            Symbol::DOT => "DOT",
        }
    }

    pub fn info(&self) -> SymbolInfo {
        SymbolInfo {
            name: self.as_str(),
            value: self.as_str(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symbol {
    type Err = ExchangeError;

    /// Case-insensitive, surrounding whitespace is ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        Symbol::ALL
            .iter()
            .copied()
            .find(|symbol| symbol.as_str() == normalized)
            .ok_or_else(|| ExchangeError::validation(format!("unknown symbol: {}", s)))
    }
}
