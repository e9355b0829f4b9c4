//! Rolling standard deviation of closing prices.
//!
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - SMA(n)[i])^2 for j in 0..n-1) / d)
//! where d = n - 1 for the sample convention and d = n for the population
//! convention. Warmup: first (n-1) bars are undefined. With the sample
//! convention a window of one bar is always undefined.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdDevConvention {
    /// Divide by n - 1.
    #[default]
    Sample,
    /// Divide by n.
    Population,
}

impl StdDevConvention {
    fn denominator(&self, period: usize) -> Option<f64> {
        match self {
            StdDevConvention::Sample if period < 2 => None,
            StdDevConvention::Sample => Some((period - 1) as f64),
            StdDevConvention::Population => Some(period as f64),
        }
    }
}

impl fmt::Display for StdDevConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StdDevConvention::Sample => f.write_str("sample"),
            StdDevConvention::Population => f.write_str("population"),
        }
    }
}

impl FromStr for StdDevConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sample" => Ok(StdDevConvention::Sample),
            "population" => Ok(StdDevConvention::Population),
            other => Err(format!(
                "unknown stddev convention '{}' (expected sample or population)",
                other
            )),
        }
    }
}

/// Standard deviation of a single window around a precomputed mean.
pub fn window_stddev(window: &[f64], mean: f64, convention: StdDevConvention) -> Option<f64> {
    let denominator = convention.denominator(window.len())?;
    let sum_sq: f64 = window
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum();
    Some((sum_sq / denominator).sqrt())
}

pub fn rolling_stddev(
    values: &[f64],
    period: usize,
    convention: StdDevConvention,
) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            let mean = window.iter().sum::<f64>() / period as f64;
            window_stddev(window, mean, convention)
        })
        .collect()
}
