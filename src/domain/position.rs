//! Trade log entries and the single-asset account they mutate.

use chrono::NaiveDateTime;
use std::fmt;

use crate::domain::signal::PositionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => f.write_str("BUY"),
            TradeSide::Sell => f.write_str("SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub side: TradeSide,
    pub price: f64,
    /// Asset units bought or sold.
    pub size: f64,
    pub timestamp: NaiveDateTime,
}

impl Trade {
    /// price × size
    pub fn notional(&self) -> f64 {
        self.price * self.size
    }
}

/// Cash plus at most one open long holding.
///
/// `position` is set by the entry and exit helpers, not derived from
/// `units`: a holding whose size underflows to zero is still a holding.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub cash: f64,
    pub initial_balance: f64,
    pub units: f64,
    pub position: PositionState,
}

impl Account {
    pub fn new(initial_balance: f64) -> Self {
        Account {
            cash: initial_balance,
            initial_balance,
            units: 0.0,
            position: PositionState::Flat,
        }
    }

    pub fn state(&self) -> PositionState {
        self.position
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.units * price
    }

    /// Cash plus holdings marked at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.market_value(price)
    }
}
