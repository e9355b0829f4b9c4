//! Technical indicator engine.
//!
//! This module provides:
//! - `IndicatorParams`: window lengths and band width, validated up front
//! - `IndicatorFrame`: every derived value for one bar, `None` while undefined
//! - `IndicatorType`: indicator identity + parameters, for display
//! - `compute_frames`: the pure bars → frames transformation
//!
//! Undefined values (unfilled windows, flat stochastic ranges) are carried as
//! `None` and never surface as errors.

pub mod bollinger;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod stochastic;

use std::fmt;

use crate::domain::bar::Bar;
use crate::domain::error::ConfluenceError;
use bollinger::calculate_bollinger;
use rsi::calculate_rsi;
use sma::rolling_mean;
use stddev::StdDevConvention;
use stochastic::calculate_stochastic;

pub const DEFAULT_SMA_WINDOW: usize = 21;
pub const DEFAULT_STD_DEV_FACTOR: f64 = 2.0;
pub const DEFAULT_STOCHASTIC_K_WINDOW: usize = 14;
pub const DEFAULT_STOCHASTIC_D_WINDOW: usize = 3;
pub const DEFAULT_RSI_WINDOW: usize = 14;
pub const DEFAULT_VOLUME_WINDOW: usize = 21;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    pub sma_window: usize,
    pub std_dev_factor: f64,
    pub stddev_convention: StdDevConvention,
    pub stochastic_k_window: usize,
    pub stochastic_d_window: usize,
    pub rsi_window: usize,
    pub volume_window: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            sma_window: DEFAULT_SMA_WINDOW,
            std_dev_factor: DEFAULT_STD_DEV_FACTOR,
            stddev_convention: StdDevConvention::Sample,
            stochastic_k_window: DEFAULT_STOCHASTIC_K_WINDOW,
            stochastic_d_window: DEFAULT_STOCHASTIC_D_WINDOW,
            rsi_window: DEFAULT_RSI_WINDOW,
            volume_window: DEFAULT_VOLUME_WINDOW,
        }
    }
}

impl IndicatorParams {
    pub fn validate(&self) -> Result<(), ConfluenceError> {
        let windows = [
            ("sma_window", self.sma_window),
            ("stochastic_k_window", self.stochastic_k_window),
            ("stochastic_d_window", self.stochastic_d_window),
            ("rsi_window", self.rsi_window),
            ("volume_window", self.volume_window),
        ];
        for (name, window) in windows {
            if window < 1 {
                return Err(ConfluenceError::invalid_parameter(
                    name,
                    "window must be at least 1",
                ));
            }
        }

        if !self.std_dev_factor.is_finite() || self.std_dev_factor < 0.0 {
            return Err(ConfluenceError::invalid_parameter(
                "std_dev_factor",
                format!("must be a finite non-negative number, got {}", self.std_dev_factor),
            ));
        }

        Ok(())
    }

    /// Indicators computed for every bar under these parameters.
    pub fn indicator_types(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::Bollinger {
                period: self.sma_window,
                multiplier: self.std_dev_factor,
                convention: self.stddev_convention,
            },
            IndicatorType::Stochastic {
                k_period: self.stochastic_k_window,
                d_period: self.stochastic_d_window,
            },
            IndicatorType::Rsi(self.rsi_window),
            IndicatorType::VolumeSma(self.volume_window),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorType {
    Bollinger {
        period: usize,
        multiplier: f64,
        convention: StdDevConvention,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
    Rsi(usize),
    VolumeSma(usize),
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Bollinger {
                period,
                multiplier,
                convention,
            } => write!(f, "BOLLINGER({},{},{})", period, multiplier, convention),
            IndicatorType::Stochastic { k_period, d_period } => {
                write!(f, "STOCHASTIC({},{})", k_period, d_period)
            }
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::VolumeSma(period) => write!(f, "VOLUME_SMA({})", period),
        }
    }
}

/// Derived values for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndicatorFrame {
    pub sma: Option<f64>,
    pub stddev: Option<f64>,
    pub upper_band: Option<f64>,
    pub lower_band: Option<f64>,
    pub stochastic_k: Option<f64>,
    pub stochastic_d: Option<f64>,
    pub rsi: Option<f64>,
    pub volume_sma: Option<f64>,
}

/// Compute one frame per bar. Pure: identical input gives identical output.
pub fn compute_frames(bars: &[Bar], params: &IndicatorParams) -> Vec<IndicatorFrame> {
    let bands = calculate_bollinger(
        bars,
        params.sma_window,
        params.std_dev_factor,
        params.stddev_convention,
    );
    let stochastic = calculate_stochastic(
        bars,
        params.stochastic_k_window,
        params.stochastic_d_window,
    );
    let rsi = calculate_rsi(bars, params.rsi_window);
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let volume_sma = rolling_mean(&volumes, params.volume_window);

    (0..bars.len())
        .map(|i| {
            let band = bands[i];
            IndicatorFrame {
                sma: band.map(|b| b.middle),
                stddev: band.map(|b| b.stddev),
                upper_band: band.map(|b| b.upper),
                lower_band: band.map(|b| b.lower),
                stochastic_k: stochastic[i].k,
                stochastic_d: stochastic[i].d,
                rsi: rsi[i],
                volume_sma: volume_sma[i],
            }
        })
        .collect()
}
