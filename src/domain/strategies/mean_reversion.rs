//! Bollinger band mean reversion.
//!
//! Long when the close is at or below the lower band with RSI oversold, short
//! at or above the upper band with RSI overbought. The position is closed
//! once price is back at the middle band with at least `min_profit` percent.

use super::{SECTION, ensure_ordered, profit_pct, stops_from_config};
use crate::domain::config_validation::{invalid, read_f64, read_period};
use crate::domain::error::{SigtraderError, StrategyError};
use crate::domain::indicator::{IndicatorValue, calculate_bollinger, calculate_rsi};
use crate::domain::ohlcv::BarWindow;
use crate::domain::position::Direction;
use crate::domain::strategy::{PercentStops, Strategy};
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, Copy)]
struct Bands {
    upper: f64,
    middle: f64,
    lower: f64,
}

#[derive(Debug, Clone)]
pub struct MeanReversion {
    name: String,
    bb_period: usize,
    bb_mult: f64,
    rsi_period: usize,
    oversold: f64,
    overbought: f64,
    min_profit: f64,
    stops: PercentStops,
}

impl MeanReversion {
    pub fn new(bb_period: usize, bb_mult: f64, rsi_period: usize, stops: PercentStops) -> Self {
        Self {
            name: format!("Mean Reversion (BB{bb_period}, RSI{rsi_period})"),
            bb_period,
            bb_mult,
            rsi_period,
            oversold: 30.0,
            overbought: 70.0,
            min_profit: 0.5,
            stops,
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let bb_period = read_period(config, SECTION, "bb_period", 20)?;
        let bb_mult = read_f64(config, SECTION, "bb_stddev", 2.0)?;
        if bb_mult <= 0.0 {
            return Err(invalid(SECTION, "bb_stddev", "must be positive"));
        }
        let rsi_period = read_period(config, SECTION, "rsi_period", 14)?;
        let oversold = read_f64(config, SECTION, "oversold", 30.0)?;
        let overbought = read_f64(config, SECTION, "overbought", 70.0)?;
        ensure_ordered(oversold, overbought, "oversold", "overbought")?;
        let min_profit = read_f64(config, SECTION, "min_profit", 0.5)?;
        let stops = stops_from_config(config, PercentStops::new(2.0, 3.0))?;
        Ok(Self {
            oversold,
            overbought,
            min_profit,
            ..Self::new(bb_period, bb_mult, rsi_period, stops)
        })
    }

    fn bands(&self, window: &BarWindow<'_>) -> Option<Bands> {
        match calculate_bollinger(window.bars(), self.bb_period, self.bb_mult).latest()? {
            IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            } => Some(Bands {
                upper,
                middle,
                lower,
            }),
            _ => None,
        }
    }
}

impl Strategy for MeanReversion {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_history(&self) -> usize {
        self.bb_period.max(self.rsi_period) + 1
    }

    fn should_enter(&mut self, window: &BarWindow<'_>) -> Result<Option<Direction>, StrategyError> {
        let rsi = calculate_rsi(window.bars(), self.rsi_period).latest_simple();
        let (Some(bands), Some(rsi)) = (self.bands(window), rsi) else {
            return Ok(None);
        };
        let price = window.current().close;
        Ok(if price <= bands.lower && rsi < self.oversold {
            Some(Direction::Long)
        } else if price >= bands.upper && rsi > self.overbought {
            Some(Direction::Short)
        } else {
            None
        })
    }

    fn should_exit(
        &mut self,
        window: &BarWindow<'_>,
        entry_price: f64,
        direction: Direction,
    ) -> Result<bool, StrategyError> {
        let Some(bands) = self.bands(window) else {
            return Ok(false);
        };
        let price = window.current().close;
        let reverted = match direction {
            Direction::Long => price >= bands.middle,
            Direction::Short => price <= bands.middle,
        };
        Ok(reverted && profit_pct(entry_price, price, direction) > self.min_profit)
    }

    fn stop_loss(&self, entry_price: f64, direction: Direction) -> Result<Option<f64>, StrategyError> {
        Ok(self.stops.stop_loss(entry_price, direction))
    }

    fn take_profit(
        &self,
        entry_price: f64,
        direction: Direction,
    ) -> Result<Option<f64>, StrategyError> {
        Ok(self.stops.take_profit(entry_price, direction))
    }
}
