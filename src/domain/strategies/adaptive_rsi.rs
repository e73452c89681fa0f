//! RSI reversal whose thresholds and stops adapt to volatility.
//!
//! Volatility is ATR as a percentage of the mean close of the last 20 bars:
//!
//! | ATR%        | thresholds       | stop multiplier |
//! |-------------|------------------|-----------------|
//! | > 1.5       | widened by 5     | 1.5             |
//! | (1.0, 1.5]  | as configured    | 1.2             |
//! | <= 1.0      | narrowed by 5    | 1.0             |
//!
//! The multiplier seen at entry scales the stop-loss and take-profit.

use super::rsi::RSI_MIDLINE;
use super::{SECTION, ensure_ordered, stops_from_config};
use crate::domain::config_validation::{invalid, read_f64, read_period};
use crate::domain::error::{SigtraderError, StrategyError};
use crate::domain::indicator::{calculate_atr, calculate_rsi};
use crate::domain::ohlcv::BarWindow;
use crate::domain::position::Direction;
use crate::domain::strategy::{PercentStops, Strategy};
use crate::ports::config_port::ConfigPort;

const PRICE_LOOKBACK: usize = 20;
const HIGH_VOLATILITY: f64 = 1.5;
const MEDIUM_VOLATILITY: f64 = 1.0;
const THRESHOLD_SHIFT: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct AdaptiveRsi {
    rsi_period: usize,
    atr_period: usize,
    oversold: f64,
    overbought: f64,
    stops: PercentStops,
    multiplier: f64,
}

/// Thresholds and stop multiplier in effect for one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveBands {
    pub oversold: f64,
    pub overbought: f64,
    pub multiplier: f64,
}

impl AdaptiveRsi {
    pub fn new(
        rsi_period: usize,
        atr_period: usize,
        oversold: f64,
        overbought: f64,
        stops: PercentStops,
    ) -> Self {
        Self {
            rsi_period,
            atr_period,
            oversold,
            overbought,
            stops,
            multiplier: 1.0,
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let rsi_period = read_period(config, SECTION, "period", 14)?;
        let atr_period = read_period(config, SECTION, "atr_period", 14)?;
        let oversold = read_f64(config, SECTION, "oversold", 30.0)?;
        let overbought = read_f64(config, SECTION, "overbought", 70.0)?;
        ensure_ordered(
            oversold + THRESHOLD_SHIFT,
            overbought - THRESHOLD_SHIFT,
            "oversold",
            "overbought",
        )?;
        if oversold <= THRESHOLD_SHIFT {
            return Err(invalid(SECTION, "oversold", "must be above 5"));
        }
        if overbought >= 100.0 - THRESHOLD_SHIFT {
            return Err(invalid(SECTION, "overbought", "must be below 95"));
        }
        let stops = stops_from_config(config, PercentStops::new(1.5, 4.0))?;
        Ok(Self::new(rsi_period, atr_period, oversold, overbought, stops))
    }

    /// Bands for a given ATR percentage.
    pub fn bands(&self, atr_pct: f64) -> AdaptiveBands {
        if atr_pct > HIGH_VOLATILITY {
            AdaptiveBands {
                oversold: self.oversold - THRESHOLD_SHIFT,
                overbought: self.overbought + THRESHOLD_SHIFT,
                multiplier: 1.5,
            }
        } else if atr_pct > MEDIUM_VOLATILITY {
            AdaptiveBands {
                oversold: self.oversold,
                overbought: self.overbought,
                multiplier: 1.2,
            }
        } else {
            AdaptiveBands {
                oversold: self.oversold + THRESHOLD_SHIFT,
                overbought: self.overbought - THRESHOLD_SHIFT,
                multiplier: 1.0,
            }
        }
    }

    fn atr_pct(&self, window: &BarWindow<'_>) -> Option<f64> {
        let atr = calculate_atr(window.bars(), self.atr_period).latest_simple()?;
        let recent = window.tail(PRICE_LOOKBACK);
        let avg_price = recent.iter().map(|b| b.close).sum::<f64>() / recent.len() as f64;
        (avg_price > 0.0).then(|| atr / avg_price * 100.0)
    }
}

impl Strategy for AdaptiveRsi {
    fn name(&self) -> &str {
        "Adaptive RSI (ATR-based)"
    }

    fn min_history(&self) -> usize {
        self.rsi_period.max(self.atr_period) + 1
    }

    fn should_enter(&mut self, window: &BarWindow<'_>) -> Result<Option<Direction>, StrategyError> {
        let rsi = calculate_rsi(window.bars(), self.rsi_period).latest_simple();
        let (Some(rsi), Some(atr_pct)) = (rsi, self.atr_pct(window)) else {
            return Ok(None);
        };
        let bands = self.bands(atr_pct);
        self.multiplier = bands.multiplier;

        Ok(if rsi < bands.oversold {
            Some(Direction::Long)
        } else if rsi > bands.overbought {
            Some(Direction::Short)
        } else {
            None
        })
    }

    fn should_exit(
        &mut self,
        window: &BarWindow<'_>,
        _entry_price: f64,
        direction: Direction,
    ) -> Result<bool, StrategyError> {
        let rsi = calculate_rsi(window.bars(), self.rsi_period).latest_simple();
        Ok(rsi.is_some_and(|rsi| match direction {
            Direction::Long => rsi > RSI_MIDLINE,
            Direction::Short => rsi < RSI_MIDLINE,
        }))
    }

    fn stop_loss(&self, entry_price: f64, direction: Direction) -> Result<Option<f64>, StrategyError> {
        Ok(self
            .stops
            .scaled(self.multiplier)
            .stop_loss(entry_price, direction))
    }

    fn take_profit(
        &self,
        entry_price: f64,
        direction: Direction,
    ) -> Result<Option<f64>, StrategyError> {
        Ok(self
            .stops
            .scaled(self.multiplier)
            .take_profit(entry_price, direction))
    }

    fn reset(&mut self) {
        self.multiplier = 1.0;
    }
}
