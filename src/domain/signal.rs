//! Signal evaluation: Bollinger + Stochastic + RSI confluence.
//!
//! # Evaluation Semantics
//!
//! - BUY only while flat: close below the lower band, %K and RSI oversold
//! - SELL only while long: close above the upper band, %K and RSI overbought
//! - The strict rule set also requires %D past the same threshold as %K and a
//!   volume spike over `volume_multiple` × the volume moving average
//! - Any undefined indicator value referenced by a rule yields `Signal::None`

use std::fmt;
use std::str::FromStr;

use crate::domain::error::ConfluenceError;
use crate::domain::indicator::IndicatorFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    None,
    Buy,
    Sell,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::None => f.write_str("NONE"),
            Signal::Buy => f.write_str("BUY"),
            Signal::Sell => f.write_str("SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleKind {
    /// Bands + %K + RSI.
    #[default]
    Basic,
    /// Bands + %K + %D + RSI + volume spike.
    Strict,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Basic => f.write_str("basic"),
            RuleKind::Strict => f.write_str("strict"),
        }
    }
}

impl FromStr for RuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(RuleKind::Basic),
            "strict" => Ok(RuleKind::Strict),
            other => Err(format!(
                "unknown rule set '{}' (expected basic or strict)",
                other
            )),
        }
    }
}

/// Thresholds for the confluence rules.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub kind: RuleKind,
    pub buy_stochastic_max: f64,
    pub sell_stochastic_min: f64,
    pub buy_rsi_max: f64,
    pub sell_rsi_min: f64,
    pub volume_multiple: f64,
}

impl Default for RuleSet {
    fn default() -> Self {
        RuleSet {
            kind: RuleKind::Basic,
            buy_stochastic_max: 20.0,
            sell_stochastic_min: 80.0,
            buy_rsi_max: 30.0,
            sell_rsi_min: 70.0,
            volume_multiple: 3.0,
        }
    }
}

impl RuleSet {
    pub fn strict() -> Self {
        RuleSet {
            kind: RuleKind::Strict,
            ..RuleSet::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfluenceError> {
        let oscillator_bounds = [
            ("buy_stochastic_max", self.buy_stochastic_max),
            ("sell_stochastic_min", self.sell_stochastic_min),
            ("buy_rsi_max", self.buy_rsi_max),
            ("sell_rsi_min", self.sell_rsi_min),
        ];
        for (name, value) in oscillator_bounds {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfluenceError::invalid_parameter(
                    name,
                    format!("must be within [0, 100], got {}", value),
                ));
            }
        }

        if !self.volume_multiple.is_finite() || self.volume_multiple < 0.0 {
            return Err(ConfluenceError::invalid_parameter(
                "volume_multiple",
                format!("must be a finite non-negative number, got {}", self.volume_multiple),
            ));
        }

        Ok(())
    }

    /// Human-readable BUY and SELL conditions for this rule set.
    pub fn describe(&self) -> [String; 2] {
        let mut buy = format!(
            "BUY:  close < lower band, %K < {}, RSI < {}",
            self.buy_stochastic_max, self.buy_rsi_max
        );
        let mut sell = format!(
            "SELL: close > upper band, %K > {}, RSI > {}",
            self.sell_stochastic_min, self.sell_rsi_min
        );
        if self.kind == RuleKind::Strict {
            let volume = format!("volume > {} x volume SMA", self.volume_multiple);
            buy.push_str(&format!(", %D < {}, {}", self.buy_stochastic_max, volume));
            sell.push_str(&format!(", %D > {}, {}", self.sell_stochastic_min, volume));
        }
        [buy, sell]
    }

    /// Evaluate the rules for one bar.
    pub fn evaluate(
        &self,
        close: f64,
        volume: f64,
        frame: &IndicatorFrame,
        state: PositionState,
    ) -> Signal {
        let fired = match state {
            PositionState::Flat => self.buy_conditions(close, volume, frame),
            PositionState::Long => self.sell_conditions(close, volume, frame),
        };

        match (fired, state) {
            (Some(true), PositionState::Flat) => Signal::Buy,
            (Some(true), PositionState::Long) => Signal::Sell,
            _ => Signal::None,
        }
    }

    fn buy_conditions(&self, close: f64, volume: f64, frame: &IndicatorFrame) -> Option<bool> {
        let mut hit = close < frame.lower_band?
            && frame.stochastic_k? < self.buy_stochastic_max
            && frame.rsi? < self.buy_rsi_max;

        if self.kind == RuleKind::Strict {
            hit = hit
                && frame.stochastic_d? < self.buy_stochastic_max
                && self.high_volume(volume, frame)?;
        }

        Some(hit)
    }

    fn sell_conditions(&self, close: f64, volume: f64, frame: &IndicatorFrame) -> Option<bool> {
        let mut hit = close > frame.upper_band?
            && frame.stochastic_k? > self.sell_stochastic_min
            && frame.rsi? > self.sell_rsi_min;

        if self.kind == RuleKind::Strict {
            hit = hit
                && frame.stochastic_d? > self.sell_stochastic_min
                && self.high_volume(volume, frame)?;
        }

        Some(hit)
    }

    fn high_volume(&self, volume: f64, frame: &IndicatorFrame) -> Option<bool> {
        Some(volume > self.volume_multiple * frame.volume_sma?)
    }
}
