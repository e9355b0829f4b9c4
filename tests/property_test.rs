//! Property tests over random price series and parameters.

mod common;

use chrono::Duration;
use common::start_time;
use confluence::domain::backtest::{BacktestConfig, run_backtest};
use confluence::domain::bar::Bar;
use confluence::domain::indicator::stddev::StdDevConvention;
use confluence::domain::indicator::{IndicatorParams, compute_frames};
use confluence::domain::metrics::cash_trajectory;
use confluence::domain::position::TradeSide;
use confluence::domain::signal::{RuleKind, RuleSet};
use confluence::domain::simulator::SimulationParams;
use proptest::prelude::*;

fn bars_strategy() -> impl Strategy<Value = Vec<Bar>> {
    // multiplicative random walk keeps prices positive
    (
        1.0f64..1000.0,
        proptest::collection::vec((-0.2f64..0.2, 0.0f64..0.05, 0.0f64..5000.0), 1..250),
    )
        .prop_map(|(start, steps)| {
            let mut price = start;
            steps
                .into_iter()
                .enumerate()
                .map(|(i, (ret, spread, volume))| {
                    price *= 1.0 + ret;
                    Bar {
                        timestamp: start_time() + Duration::minutes(i as i64),
                        open: price,
                        high: price * (1.0 + spread),
                        low: price * (1.0 - spread),
                        close: price,
                        volume,
                    }
                })
                .collect()
        })
}

fn config_strategy() -> impl Strategy<Value = BacktestConfig> {
    (
        (1usize..30, 0.0f64..4.0, any::<bool>()),
        (1usize..20, 1usize..6, 1usize..20, 1usize..30),
        (any::<bool>(), 0.0f64..4.0),
        (0.01f64..=1.0, 1.0f64..1e6),
    )
        .prop_map(
            |(
                (sma_window, std_dev_factor, population),
                (stochastic_k_window, stochastic_d_window, rsi_window, volume_window),
                (strict, volume_multiple),
                (trade_size, initial_balance),
            )| BacktestConfig {
                indicators: IndicatorParams {
                    sma_window,
                    std_dev_factor,
                    stddev_convention: if population {
                        StdDevConvention::Population
                    } else {
                        StdDevConvention::Sample
                    },
                    stochastic_k_window,
                    stochastic_d_window,
                    rsi_window,
                    volume_window,
                },
                rules: RuleSet {
                    kind: if strict { RuleKind::Strict } else { RuleKind::Basic },
                    volume_multiple,
                    ..RuleSet::default()
                },
                simulation: SimulationParams {
                    initial_balance,
                    trade_size,
                },
            },
        )
}

proptest! {
    #[test]
    fn trade_log_alternates_starting_with_buy(
        bars in bars_strategy(),
        config in config_strategy(),
    ) {
        let report = run_backtest(&bars, &config).unwrap();
        for (i, trade) in report.trades.iter().enumerate() {
            let expected = if i % 2 == 0 { TradeSide::Buy } else { TradeSide::Sell };
            prop_assert_eq!(trade.side, expected);
        }
        prop_assert!(report.trades.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn metrics_stay_in_range(
        bars in bars_strategy(),
        config in config_strategy(),
    ) {
        let report = run_backtest(&bars, &config).unwrap();
        let r = &report.result;

        prop_assert_eq!(r.total_trades, report.trades.len() / 2);
        prop_assert!((0.0..=100.0).contains(&r.hit_rate_pct));
        prop_assert!(r.max_drawdown_pct >= 0.0);
        prop_assert!(r.max_drawdown_pct.is_finite());
        prop_assert!(r.final_balance.is_finite() && r.final_balance > 0.0);
        prop_assert!(
            (r.profit - (r.final_balance - config.simulation.initial_balance)).abs() < 1e-9
        );
    }

    #[test]
    fn cash_never_goes_negative(
        bars in bars_strategy(),
        config in config_strategy(),
    ) {
        let report = run_backtest(&bars, &config).unwrap();
        for balance in cash_trajectory(config.simulation.initial_balance, &report.trades) {
            prop_assert!(balance >= -1e-9 * config.simulation.initial_balance);
        }
    }

    #[test]
    fn oscillators_bounded(
        bars in bars_strategy(),
        config in config_strategy(),
    ) {
        let frames = compute_frames(&bars, &config.indicators);
        prop_assert_eq!(frames.len(), bars.len());
        for frame in &frames {
            if let Some(rsi) = frame.rsi {
                prop_assert!((0.0..=100.0).contains(&rsi));
            }
            if let Some(k) = frame.stochastic_k {
                prop_assert!((-1e-9..=100.0 + 1e-9).contains(&k));
            }
            if let (Some(upper), Some(lower)) = (frame.upper_band, frame.lower_band) {
                prop_assert!(upper >= lower);
            }
        }
    }

    #[test]
    fn runs_are_deterministic(
        bars in bars_strategy(),
        config in config_strategy(),
    ) {
        let a = run_backtest(&bars, &config).unwrap();
        let b = run_backtest(&bars, &config).unwrap();
        prop_assert_eq!(a.result.final_balance.to_bits(), b.result.final_balance.to_bits());
        prop_assert_eq!(a.trades, b.trades);
    }
}
