//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev follows the configured [`StdDevConvention`]; the default is the
//! sample standard deviation (divides by N-1), which widens the bands
//! slightly compared to the population form.
//!
//! Default parameters: period=21, multiplier=2.0
//! Warmup: first (period-1) bars are undefined.

use crate::domain::bar::Bar;
use crate::domain::indicator::stddev::{StdDevConvention, window_stddev};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerPoint {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub stddev: f64,
}

pub fn calculate_bollinger(
    bars: &[Bar],
    period: usize,
    multiplier: f64,
    convention: StdDevConvention,
) -> Vec<Option<BollingerPoint>> {
    if period == 0 {
        return vec![None; bars.len()];
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    (0..closes.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &closes[i + 1 - period..=i];
            let middle = window.iter().sum::<f64>() / period as f64;
            let stddev = window_stddev(window, middle, convention)?;

            Some(BollingerPoint {
                upper: middle + multiplier * stddev,
                middle,
                lower: middle - multiplier * stddev,
                stddev,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<Bar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn bollinger_warmup() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_bollinger(&bars, 3, 2.0, StdDevConvention::Sample);

        assert!(series[0].is_none());
        assert!(series[1].is_none());
        assert!(series[2].is_some());
        assert!(series[3].is_some());
        assert!(series[4].is_some());
    }

    #[test]
    fn bollinger_constant_values() {
        let bars = make_bars(&[100.0, 100.0, 100.0, 100.0, 100.0]);
        let series = calculate_bollinger(&bars, 3, 2.0, StdDevConvention::Sample);

        let point = series[2].expect("band defined after warmup");
        assert!((point.middle - 100.0).abs() < f64::EPSILON);
        assert!((point.upper - 100.0).abs() < f64::EPSILON);
        assert!((point.lower - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bollinger_sample_calculation() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let series = calculate_bollinger(&bars, 3, 2.0, StdDevConvention::Sample);

        let point = series[2].unwrap();
        // sample stddev of 10, 20, 30 is exactly 10
        assert!((point.middle - 20.0).abs() < 1e-10);
        assert!((point.stddev - 10.0).abs() < 1e-10);
        assert!((point.upper - 40.0).abs() < 1e-10);
        assert!((point.lower - 0.0).abs() < 1e-10);
    }

    #[test]
    fn bollinger_population_calculation() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let series = calculate_bollinger(&bars, 3, 1.0, StdDevConvention::Population);

        let point = series[2].unwrap();
        let stddev = (200.0_f64 / 3.0).sqrt();
        assert!((point.upper - (20.0 + stddev)).abs() < 1e-10);
        assert!((point.lower - (20.0 - stddev)).abs() < 1e-10);
    }

    #[test]
    fn bollinger_symmetry() {
        let bars = make_bars(&[10.0, 25.0, 30.0, 12.0]);
        let series = calculate_bollinger(&bars, 3, 2.0, StdDevConvention::Sample);

        for point in series.iter().flatten() {
            let upper_dist = point.upper - point.middle;
            let lower_dist = point.middle - point.lower;
            assert!((upper_dist - lower_dist).abs() < 1e-10);
        }
    }

    #[test]
    fn bollinger_window_longer_than_series() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let series = calculate_bollinger(&bars, 21, 2.0, StdDevConvention::Sample);
        assert_eq!(series.len(), 3);
        assert!(series.iter().all(Option::is_none));
    }
}
