//! Multi-indicator confirmation: SMA trend, RSI zone, MACD cross and
//! Bollinger position must all agree before entering.
//!
//! Long: close above SMA, RSI in (30, 55), bullish MACD cross, close between
//! the lower and middle bands. Short mirrors with RSI in (45, 70) and the
//! close between the middle and upper bands. A long is closed when the close
//! drops below the SMA or RSI exceeds 70; a short when the close rises above
//! the SMA or RSI falls below 30.

use super::{MACD_HISTORY, SECTION, macd_cross, stops_from_config};
use crate::domain::config_validation::{invalid, read_f64, read_period};
use crate::domain::error::{SigtraderError, StrategyError};
use crate::domain::indicator::{IndicatorValue, calculate_bollinger, calculate_rsi, calculate_sma};
use crate::domain::ohlcv::BarWindow;
use crate::domain::position::Direction;
use crate::domain::strategy::{PercentStops, Strategy};
use crate::ports::config_port::ConfigPort;

const LONG_RSI_ZONE: (f64, f64) = (30.0, 55.0);
const SHORT_RSI_ZONE: (f64, f64) = (45.0, 70.0);
const EXIT_OVERBOUGHT: f64 = 70.0;
const EXIT_OVERSOLD: f64 = 30.0;

#[derive(Debug, Clone)]
pub struct MultiConfirmation {
    sma_period: usize,
    rsi_period: usize,
    bb_period: usize,
    bb_mult: f64,
    stops: PercentStops,
}

#[derive(Debug, Clone, Copy)]
struct Readings {
    price: f64,
    sma: f64,
    rsi: f64,
}

impl MultiConfirmation {
    pub fn new(
        sma_period: usize,
        rsi_period: usize,
        bb_period: usize,
        bb_mult: f64,
        stops: PercentStops,
    ) -> Self {
        Self {
            sma_period,
            rsi_period,
            bb_period,
            bb_mult,
            stops,
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let sma_period = read_period(config, SECTION, "sma_period", 50)?;
        let rsi_period = read_period(config, SECTION, "rsi_period", 14)?;
        let bb_period = read_period(config, SECTION, "bb_period", 20)?;
        let bb_mult = read_f64(config, SECTION, "bb_stddev", 2.0)?;
        if bb_mult <= 0.0 {
            return Err(invalid(SECTION, "bb_stddev", "must be positive"));
        }
        let stops = stops_from_config(config, PercentStops::new(2.0, 5.0))?;
        Ok(Self::new(sma_period, rsi_period, bb_period, bb_mult, stops))
    }

    fn readings(&self, window: &BarWindow<'_>) -> Option<Readings> {
        Some(Readings {
            price: window.current().close,
            sma: calculate_sma(window.bars(), self.sma_period).latest_simple()?,
            rsi: calculate_rsi(window.bars(), self.rsi_period).latest_simple()?,
        })
    }
}

fn inside((low, high): (f64, f64), value: f64) -> bool {
    low < value && value < high
}

impl Strategy for MultiConfirmation {
    fn name(&self) -> &str {
        "Multi-Indicator Confirmation"
    }

    fn min_history(&self) -> usize {
        self.sma_period.max(self.bb_period).max(MACD_HISTORY) + 1
    }

    fn should_enter(&mut self, window: &BarWindow<'_>) -> Result<Option<Direction>, StrategyError> {
        let Some(r) = self.readings(window) else {
            return Ok(None);
        };
        let Some(IndicatorValue::Bollinger {
            upper,
            middle,
            lower,
        }) = calculate_bollinger(window.bars(), self.bb_period, self.bb_mult).latest()
        else {
            return Ok(None);
        };

        let long_ready = r.price > r.sma
            && inside(LONG_RSI_ZONE, r.rsi)
            && inside((lower, middle), r.price);
        let short_ready = r.price < r.sma
            && inside(SHORT_RSI_ZONE, r.rsi)
            && inside((middle, upper), r.price);
        if !long_ready && !short_ready {
            return Ok(None);
        }

        Ok(match macd_cross(window) {
            Some(Direction::Long) if long_ready => Some(Direction::Long),
            Some(Direction::Short) if short_ready => Some(Direction::Short),
            _ => None,
        })
    }

    fn should_exit(
        &mut self,
        window: &BarWindow<'_>,
        _entry_price: f64,
        direction: Direction,
    ) -> Result<bool, StrategyError> {
        Ok(self.readings(window).is_some_and(|r| match direction {
            Direction::Long => r.price < r.sma || r.rsi > EXIT_OVERBOUGHT,
            Direction::Short => r.price > r.sma || r.rsi < EXIT_OVERSOLD,
        }))
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
