//! RSI (Relative Strength Index) indicator implementation.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n bars
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n bars are undefined (need n price changes to compute initial average).

use crate::domain::bar::Bar;

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    };
    rsi.is_finite().then(|| rsi.clamp(0.0, 100.0))
}

pub fn calculate_rsi(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    if period == 0 || bars.len() < 2 {
        return vec![None; bars.len()];
    }

    let mut values = Vec::with_capacity(bars.len());
    values.push(None);

    let (gains, losses): (Vec<f64>, Vec<f64>) = bars
        .windows(2)
        .map(|w| {
            let change = w[1].close - w[0].close;
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for gain_idx in 0..gains.len() {
        if gain_idx < period - 1 {
            values.push(None);
        } else if gain_idx == period - 1 {
            avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
            avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
            values.push(rsi_from_averages(avg_gain, avg_loss));
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gains[gain_idx]) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + losses[gain_idx]) / period as f64;
            values.push(rsi_from_averages(avg_gain, avg_loss));
        }
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bar(day: u32, close: f64) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn rsi_empty_bars() {
        let series = calculate_rsi(&[], 14);
        assert!(series.is_empty());
    }

    #[test]
    fn rsi_single_bar() {
        let series = calculate_rsi(&[make_bar(1, 100.0)], 14);
        assert_eq!(series, vec![None]);
    }

    #[test]
    fn rsi_warmup_period() {
        let bars: Vec<Bar> = (1..=15)
            .map(|i| make_bar(i, 100.0 + (i as f64 % 5.0) * 2.0))
            .collect();

        let series = calculate_rsi(&bars, 14);
        assert_eq!(series.len(), 15);

        for (i, value) in series.iter().enumerate().take(14) {
            assert!(value.is_none(), "Bar {} should be undefined", i);
        }
        assert!(series[14].is_some(), "Bar 14 should be defined");
    }

    #[test]
    fn rsi_all_gains_no_losses() {
        let bars: Vec<Bar> = (0..20).map(|i| make_bar(i + 1, 100.0 + i as f64)).collect();
        let series = calculate_rsi(&bars, 14);

        for value in series.iter().skip(14) {
            assert_eq!(*value, Some(100.0));
        }
    }

    #[test]
    fn rsi_all_losses_no_gains() {
        let bars: Vec<Bar> = (0..15).map(|i| make_bar(i + 1, 100.0 - i as f64)).collect();
        let series = calculate_rsi(&bars, 14);

        assert!((series[14].unwrap() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_in_range() {
        let bars: Vec<Bar> = (1..=28)
            .map(|i| make_bar(i, 100.0 + (i as f64 % 7.0 - 3.0) * 2.0))
            .collect();
        let series = calculate_rsi(&bars, 14);

        for rsi in series.iter().flatten() {
            assert!((0.0..=100.0).contains(rsi), "RSI {} out of range", rsi);
        }
    }

    #[test]
    fn rsi_zero_period() {
        let bars = vec![make_bar(1, 100.0), make_bar(2, 101.0)];
        let series = calculate_rsi(&bars, 0);
        assert_eq!(series, vec![None, None]);
    }

    #[test]
    fn rsi_wilder_smoothing_after_seed() {
        // period 2: changes +2, -1, +3
        let bars = vec![
            make_bar(1, 10.0),
            make_bar(2, 12.0),
            make_bar(3, 11.0),
            make_bar(4, 14.0),
        ];
        let series = calculate_rsi(&bars, 2);

        // seed: avg_gain 1.0, avg_loss 0.5 -> RS 2 -> 66.67
        assert!((series[2].unwrap() - 200.0 / 3.0).abs() < 1e-9);
        // next: avg_gain (1.0 + 3) / 2 = 2, avg_loss (0.5 + 0) / 2 = 0.25 -> RS 8
        assert!((series[3].unwrap() - (100.0 - 100.0 / 9.0)).abs() < 1e-9);
    }

    #[test]
    fn rsi_drop_after_flat_run_is_zero() {
        let mut bars: Vec<Bar> = (1..=20).map(|i| make_bar(i, 100.0)).collect();
        bars.push(make_bar(21, 80.0));
        let series = calculate_rsi(&bars, 14);

        assert_eq!(series[19], Some(100.0));
        assert_eq!(series[20], Some(0.0));
    }
}
