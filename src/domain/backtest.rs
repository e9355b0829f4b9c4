//! Single-series backtest: indicators → signals → simulation → metrics.
//!
//! The run is synchronous, performs no I/O, and is deterministic for a given
//! bar sequence and configuration.

use crate::domain::bar::Bar;
use crate::domain::error::ConfluenceError;
use crate::domain::indicator::{IndicatorParams, compute_frames};
use crate::domain::metrics::BacktestResult;
use crate::domain::position::Trade;
use crate::domain::signal::{PositionState, RuleSet};
use crate::domain::simulator::{SimulationParams, simulate};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BacktestConfig {
    pub indicators: IndicatorParams,
    pub rules: RuleSet,
    pub simulation: SimulationParams,
}

impl BacktestConfig {
    /// Reject invalid parameters before any simulation runs.
    pub fn validate(&self) -> Result<(), ConfluenceError> {
        self.indicators.validate()?;
        self.rules.validate()?;
        self.simulation.validate()?;
        Ok(())
    }
}

/// Result record plus the data needed to present it.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub result: BacktestResult,
    pub trades: Vec<Trade>,
    pub bar_count: usize,
    pub final_state: PositionState,
    /// Units still held at the end of the series.
    pub open_units: f64,
}

pub fn run_backtest(bars: &[Bar], config: &BacktestConfig) -> Result<BacktestReport, ConfluenceError> {
    config.validate()?;

    let frames = compute_frames(bars, &config.indicators);
    let simulation = simulate(bars, &frames, &config.rules, &config.simulation)?;
    let final_balance = simulation.final_balance();

    let result = BacktestResult::compute(
        config.simulation.initial_balance,
        final_balance,
        &simulation.trades,
    );

    Ok(BacktestReport {
        result,
        final_state: simulation.account.state(),
        open_units: simulation.account.units,
        trades: simulation.trades,
        bar_count: bars.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::TradeSide;
    use chrono::{Duration, NaiveDate};

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: start + Duration::hours(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect()
    }

    /// 20 bars at 100, a drop to 80 for four bars, a spike to 130, then flat.
    fn dip_and_spike() -> Vec<Bar> {
        let mut closes = vec![100.0; 20];
        closes.extend([80.0; 4]);
        closes.extend([130.0; 6]);
        bars_from_closes(&closes)
    }

    #[test]
    fn dip_and_spike_round_trip() {
        let report = run_backtest(&dip_and_spike(), &BacktestConfig::default()).unwrap();

        assert_eq!(report.trades.len(), 2);
        assert_eq!(report.trades[0].side, TradeSide::Buy);
        assert!((report.trades[0].price - 80.0).abs() < f64::EPSILON);
        assert!((report.trades[0].size - 0.125).abs() < 1e-12);
        assert_eq!(report.trades[1].side, TradeSide::Sell);
        assert!((report.trades[1].price - 130.0).abs() < f64::EPSILON);

        assert!((report.result.final_balance - 106.25).abs() < 1e-9);
        assert!((report.result.profit - 6.25).abs() < 1e-9);
        assert_eq!(report.result.total_trades, 1);
        assert!((report.result.hit_rate_pct - 100.0).abs() < f64::EPSILON);
        assert_eq!(report.final_state, PositionState::Flat);
        assert_eq!(report.bar_count, 30);
    }

    #[test]
    fn invalid_config_fails_before_running() {
        let config = BacktestConfig {
            simulation: SimulationParams {
                trade_size: 2.0,
                ..SimulationParams::default()
            },
            ..BacktestConfig::default()
        };
        let err = run_backtest(&dip_and_spike(), &config).unwrap_err();
        assert!(matches!(err, ConfluenceError::InvalidParameter { .. }));
    }

    #[test]
    fn short_series_produces_no_trades() {
        let bars = bars_from_closes(&[100.0, 90.0, 80.0]);
        let report = run_backtest(&bars, &BacktestConfig::default()).unwrap();

        assert!(report.trades.is_empty());
        assert!((report.result.final_balance - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn open_position_at_end_is_marked_to_market() {
        let mut closes = vec![100.0; 20];
        closes.extend([80.0, 80.0, 90.0]);
        let report = run_backtest(&bars_from_closes(&closes), &BacktestConfig::default()).unwrap();

        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.final_state, PositionState::Long);
        assert!((report.open_units - 0.125).abs() < 1e-12);
        // 90 cash + 0.125 × 90
        assert!((report.result.final_balance - 101.25).abs() < 1e-9);
        assert_eq!(report.result.total_trades, 0);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let bars = dip_and_spike();
        let config = BacktestConfig::default();
        let a = run_backtest(&bars, &config).unwrap();
        let b = run_backtest(&bars, &config).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.result.final_balance.to_bits(),
            b.result.final_balance.to_bits()
        );
    }
}
