//! Simple moving averages over plain and partially-defined series.
//!
//! SMA(n)[i] = sum(x[i-n+1..=i]) / n
//! Warmup: first (n-1) values are undefined.

/// Rolling mean of `values` over `period` samples.
///
/// Each window is summed from scratch so the result at `i` depends only on
/// the window contents, never on accumulated rounding from earlier bars.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            Some(window.iter().sum::<f64>() / period as f64)
        })
        .collect()
}

/// Rolling mean over a series that may contain undefined points.
///
/// A window containing any undefined point is itself undefined.
pub fn rolling_mean_defined(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let mut sum = 0.0;
            for v in &values[i + 1 - period..=i] {
                sum += (*v)?;
            }
            Some(sum / period as f64)
        })
        .collect()
}
