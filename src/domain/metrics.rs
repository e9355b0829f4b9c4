//! Performance metrics derived from the finalized trade log.
//!
//! Drawdown is measured on a cash-only trajectory: starting from the initial
//! balance, each Buy subtracts price × size and each Sell adds it back.
//! Unrealized value of an open position is not part of that trajectory, so
//! drawdown while a position is open is understated.

use crate::domain::position::{Trade, TradeSide};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub final_balance: f64,
    pub profit: f64,
    pub max_drawdown_pct: f64,
    pub hit_rate_pct: f64,
    /// Completed Buy→Sell round trips.
    pub total_trades: usize,
}

impl BacktestResult {
    pub fn compute(initial_balance: f64, final_balance: f64, trades: &[Trade]) -> Self {
        let (hit_rate_pct, total_trades) = compute_hit_rate(trades);
        BacktestResult {
            final_balance,
            profit: final_balance - initial_balance,
            max_drawdown_pct: compute_drawdown(initial_balance, trades),
            hit_rate_pct,
            total_trades,
        }
    }
}

/// Replay each trade's cash effect starting from `initial_balance`.
pub fn cash_trajectory(initial_balance: f64, trades: &[Trade]) -> Vec<f64> {
    let mut balances = Vec::with_capacity(trades.len() + 1);
    let mut balance = initial_balance;
    balances.push(balance);

    for trade in trades {
        match trade.side {
            TradeSide::Buy => balance -= trade.notional(),
            TradeSide::Sell => balance += trade.notional(),
        }
        balances.push(balance);
    }

    balances
}

/// 100 × max(peak - balance) / peak, where `peak` is the highest balance on the
/// whole trajectory. Returns 0 when that peak is not positive.
pub fn compute_drawdown(initial_balance: f64, trades: &[Trade]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;

    for balance in cash_trajectory(initial_balance, trades) {
        if balance > peak {
            peak = balance;
        }
        let dd = peak - balance;
        if dd > max_dd {
            max_dd = dd;
        }
    }

    if peak > 0.0 {
        max_dd / peak * 100.0
    } else {
        0.0
    }
}

/// Pair trades (0,1), (2,3), …; a pair counts only if it is literally
/// (Buy, Sell) and wins when the sell price exceeds the buy price.
/// Returns (hit rate in percent, completed round trips).
pub fn compute_hit_rate(trades: &[Trade]) -> (f64, usize) {
    let mut wins = 0usize;
    let mut round_trips = 0usize;

    for pair in trades.chunks_exact(2) {
        if pair[0].side == TradeSide::Buy && pair[1].side == TradeSide::Sell {
            round_trips += 1;
            if pair[1].price > pair[0].price {
                wins += 1;
            }
        }
    }

    let hit_rate = if round_trips > 0 {
        wins as f64 / round_trips as f64 * 100.0
    } else {
        0.0
    };

    (hit_rate, round_trips)
}
