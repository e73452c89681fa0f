//! Channel breakout confirmed by volume and momentum.
//!
//! Long when the close clears the highest high of the previous `lookback`
//! bars on volume above `volume_multiplier` times its average and RSI above
//! 50. Shorts mirror this on the lowest low. Bars without volume never break
//! out. Positions are closed once they are `min_profit` percent in profit.

use super::rsi::RSI_MIDLINE;
use super::{SECTION, profit_pct, stops_from_config};
use crate::domain::config_validation::{invalid, read_f64, read_period};
use crate::domain::error::{SigtraderError, StrategyError};
use crate::domain::indicator::{IndicatorValue, calculate_channel, calculate_rsi};
use crate::domain::ohlcv::BarWindow;
use crate::domain::position::Direction;
use crate::domain::strategy::{PercentStops, Strategy};
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone)]
pub struct Breakout {
    name: String,
    lookback: usize,
    volume_multiplier: f64,
    rsi_period: usize,
    min_profit: f64,
    stops: PercentStops,
}

impl Breakout {
    pub fn new(
        lookback: usize,
        volume_multiplier: f64,
        rsi_period: usize,
        stops: PercentStops,
    ) -> Self {
        Self {
            name: format!("Breakout ({lookback} bars)"),
            lookback,
            volume_multiplier,
            rsi_period,
            min_profit: 2.0,
            stops,
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let lookback = read_period(config, SECTION, "lookback", 20)?;
        let volume_multiplier = read_f64(config, SECTION, "volume_multiplier", 1.5)?;
        if volume_multiplier < 0.0 {
            return Err(invalid(SECTION, "volume_multiplier", "must be non-negative"));
        }
        let rsi_period = read_period(config, SECTION, "rsi_period", 14)?;
        let min_profit = read_f64(config, SECTION, "min_profit", 2.0)?;
        let stops = stops_from_config(config, PercentStops::new(1.5, 4.0))?;
        Ok(Self {
            min_profit,
            ..Self::new(lookback, volume_multiplier, rsi_period, stops)
        })
    }

    /// Mean volume of the `lookback` bars before the current one.
    fn average_volume(&self, window: &BarWindow<'_>) -> Option<f64> {
        let previous = window.previous()?.tail(self.lookback);
        let volumes: Vec<f64> = previous.iter().filter_map(|b| b.volume).collect();
        if volumes.is_empty() {
            return None;
        }
        Some(volumes.iter().sum::<f64>() / volumes.len() as f64)
    }

    fn volume_confirmed(&self, window: &BarWindow<'_>) -> bool {
        match (window.current().volume, self.average_volume(window)) {
            (Some(volume), Some(average)) => volume > average * self.volume_multiplier,
            _ => false,
        }
    }
}

impl Strategy for Breakout {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_history(&self) -> usize {
        self.lookback.max(self.rsi_period) + 1
    }

    fn should_enter(&mut self, window: &BarWindow<'_>) -> Result<Option<Direction>, StrategyError> {
        let Some(IndicatorValue::Channel { upper, lower }) =
            calculate_channel(window.bars(), self.lookback).latest()
        else {
            return Ok(None);
        };
        let Some(rsi) = calculate_rsi(window.bars(), self.rsi_period).latest_simple() else {
            return Ok(None);
        };
        if !self.volume_confirmed(window) {
            return Ok(None);
        }

        let price = window.current().close;
        Ok(if price > upper && rsi > RSI_MIDLINE {
            Some(Direction::Long)
        } else if price < lower && rsi < RSI_MIDLINE {
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
        Ok(profit_pct(entry_price, window.current().close, direction) > self.min_profit)
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
