//! Stochastic Oscillator (%K / %D).
//!
//! %K[i] = 100 × (C[i] - LL) / (HH - LL), with LL the lowest low and HH the
//! highest high of the last k bars (current bar included).
//! %D[i] = SMA(d) of %K.
//!
//! A flat range (HH == LL) leaves %K undefined for that bar, and any %D
//! window touching an undefined %K is undefined as well.
//! Warmup: %K needs k bars, %D needs k + d - 1 bars.

use crate::domain::bar::Bar;
use crate::domain::indicator::sma::rolling_mean_defined;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StochasticPoint {
    pub k: Option<f64>,
    pub d: Option<f64>,
}

fn percent_k(window: &[Bar], close: f64) -> Option<f64> {
    let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let highest = window
        .iter()
        .map(|b| b.high)
        .fold(f64::NEG_INFINITY, f64::max);
    let range = highest - lowest;

    if range <= 0.0 || !range.is_finite() {
        return None;
    }

    let k = 100.0 * (close - lowest) / range;
    k.is_finite().then_some(k)
}

pub fn calculate_stochastic(
    bars: &[Bar],
    k_period: usize,
    d_period: usize,
) -> Vec<StochasticPoint> {
    if k_period == 0 {
        return vec![StochasticPoint::default(); bars.len()];
    }

    let k_values: Vec<Option<f64>> = (0..bars.len())
        .map(|i| {
            if i + 1 < k_period {
                return None;
            }
            percent_k(&bars[i + 1 - k_period..=i], bars[i].close)
        })
        .collect();

    let d_values = rolling_mean_defined(&k_values, d_period);

    k_values
        .into_iter()
        .zip(d_values)
        .map(|(k, d)| StochasticPoint { k, d })
        .collect()
}
