//! Position simulator: a FLAT/LONG state machine walked once over the bars.
//!
//! - FLAT + BUY: spend `trade_size` × cash at the close, record a Buy
//! - LONG + SELL: sell every unit at the close, record a Sell
//! - anything else: no trade
//!
//! An open position at the last bar stays open; the backtest marks it to
//! market instead of closing it.

use chrono::NaiveDateTime;
use log::error;

use crate::domain::bar::Bar;
use crate::domain::error::ConfluenceError;
use crate::domain::indicator::IndicatorFrame;
use crate::domain::position::{Account, Trade, TradeSide};
use crate::domain::signal::{PositionState, RuleSet, Signal};

pub const DEFAULT_TRADE_SIZE: f64 = 0.1;
pub const DEFAULT_INITIAL_BALANCE: f64 = 100.0;

/// Account sizing for one simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub initial_balance: f64,
    /// Fraction of cash committed per entry, in (0, 1].
    pub trade_size: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            initial_balance: DEFAULT_INITIAL_BALANCE,
            trade_size: DEFAULT_TRADE_SIZE,
        }
    }
}

impl SimulationParams {
    pub fn validate(&self) -> Result<(), ConfluenceError> {
        if !(self.trade_size > 0.0 && self.trade_size <= 1.0) {
            return Err(ConfluenceError::invalid_parameter(
                "trade_size",
                format!("must be within (0, 1], got {}", self.trade_size),
            ));
        }
        if !self.initial_balance.is_finite() || self.initial_balance <= 0.0 {
            return Err(ConfluenceError::invalid_parameter(
                "initial_balance",
                format!("must be positive, got {}", self.initial_balance),
            ));
        }
        Ok(())
    }
}

/// Terminal state of a simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub account: Account,
    pub trades: Vec<Trade>,
    /// Close of the last bar, used to mark an open position.
    pub last_close: Option<f64>,
}

impl Simulation {
    /// Cash plus any open holding marked at the last close.
    pub fn final_balance(&self) -> f64 {
        match self.last_close {
            Some(price) if self.account.state() == PositionState::Long => {
                self.account.equity(price)
            }
            _ => self.account.cash,
        }
    }
}

fn invariant(reason: String) -> ConfluenceError {
    error!("simulation aborted: {}", reason);
    ConfluenceError::InvariantViolation { reason }
}

fn check_price(price: f64, timestamp: NaiveDateTime) -> Result<(), ConfluenceError> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(invariant(format!(
            "cannot trade at non-positive price {} ({})",
            price, timestamp
        )))
    }
}

fn check_cash(account: &Account, timestamp: NaiveDateTime) -> Result<(), ConfluenceError> {
    if account.cash < 0.0 || !account.cash.is_finite() {
        return Err(invariant(format!(
            "cash balance {} after trade at {}",
            account.cash, timestamp
        )));
    }
    Ok(())
}

/// Open a long position with `trade_size` of the current cash.
pub fn enter_long(
    account: &mut Account,
    price: f64,
    timestamp: NaiveDateTime,
    trade_size: f64,
) -> Result<Trade, ConfluenceError> {
    if account.state() != PositionState::Flat {
        return Err(invariant(format!("BUY while already long at {}", timestamp)));
    }
    check_price(price, timestamp)?;

    // spend <= cash for any trade_size in (0, 1]
    let spend = account.cash * trade_size;
    let units = spend / price;
    if !units.is_finite() || units < 0.0 {
        return Err(invariant(format!(
            "BUY of {} units at {} ({})",
            units, price, timestamp
        )));
    }
    account.cash -= spend;
    account.units = units;
    account.position = PositionState::Long;
    check_cash(account, timestamp)?;

    Ok(Trade {
        side: TradeSide::Buy,
        price,
        size: units,
        timestamp,
    })
}

/// Liquidate the whole holding.
pub fn exit_long(
    account: &mut Account,
    price: f64,
    timestamp: NaiveDateTime,
) -> Result<Trade, ConfluenceError> {
    if account.state() != PositionState::Long {
        return Err(invariant(format!("SELL while flat at {}", timestamp)));
    }
    check_price(price, timestamp)?;

    let units = account.units;
    account.cash += units * price;
    account.units = 0.0;
    account.position = PositionState::Flat;
    check_cash(account, timestamp)?;

    Ok(Trade {
        side: TradeSide::Sell,
        price,
        size: units,
        timestamp,
    })
}

/// Walk the bars in order, one signal evaluation and at most one trade per bar.
pub fn simulate(
    bars: &[Bar],
    frames: &[IndicatorFrame],
    rules: &RuleSet,
    params: &SimulationParams,
) -> Result<Simulation, ConfluenceError> {
    if bars.len() != frames.len() {
        return Err(invariant(format!(
            "{} bars but {} indicator frames",
            bars.len(),
            frames.len()
        )));
    }

    let mut account = Account::new(params.initial_balance);
    let mut trades = Vec::new();

    for (bar, frame) in bars.iter().zip(frames) {
        let signal = rules.evaluate(bar.close, bar.volume, frame, account.state());
        let trade = match (signal, account.state()) {
            (Signal::Buy, PositionState::Flat) => Some(enter_long(
                &mut account,
                bar.close,
                bar.timestamp,
                params.trade_size,
            )?),
            (Signal::Sell, PositionState::Long) => {
                Some(exit_long(&mut account, bar.close, bar.timestamp)?)
            }
            _ => None,
        };
        trades.extend(trade);
    }

    Ok(Simulation {
        account,
        trades,
        last_close: bars.last().map(|b| b.close),
    })
}
