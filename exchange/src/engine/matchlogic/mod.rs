//! Match Logic Module
//!
//! Full-match-only pairing of a single order against the open book, and the
//! settlement of the resulting pair.

pub mod matcher;
pub mod settlement;

pub use matcher::{MatchOutcome, Matcher, SweepReport};
pub use settlement::{Settled, Settlement, TradeEconomics};
