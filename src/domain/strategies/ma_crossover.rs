//! Moving-average crossover.
//!
//! Long when the short SMA crosses above the long SMA, short on the opposite
//! cross. A position is closed by the cross against it.

use super::{SECTION, cross, ensure_ordered, stops_from_config};
use crate::domain::config_validation::read_period;
use crate::domain::error::{SigtraderError, StrategyError};
use crate::domain::indicator::calculate_sma;
use crate::domain::ohlcv::BarWindow;
use crate::domain::position::Direction;
use crate::domain::strategy::{PercentStops, Strategy};
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone)]
pub struct MaCrossover {
    name: String,
    short_period: usize,
    long_period: usize,
    stops: PercentStops,
}

impl MaCrossover {
    pub fn new(short_period: usize, long_period: usize, stops: PercentStops) -> Self {
        Self {
            name: format!("MA Crossover ({short_period}/{long_period})"),
            short_period,
            long_period,
            stops,
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let short_period = read_period(config, SECTION, "short_period", 20)?;
        let long_period = read_period(config, SECTION, "long_period", 50)?;
        ensure_ordered(
            short_period as f64,
            long_period as f64,
            "short_period",
            "long_period",
        )?;
        let stops = stops_from_config(config, PercentStops::new(0.0, 0.0))?;
        Ok(Self::new(short_period, long_period, stops))
    }

    fn crossover(&self, window: &BarWindow<'_>) -> Option<Direction> {
        let short = calculate_sma(window.bars(), self.short_period);
        let long = calculate_sma(window.bars(), self.long_period);
        cross(
            short.previous_simple()?,
            long.previous_simple()?,
            short.latest_simple()?,
            long.latest_simple()?,
        )
    }
}

impl Strategy for MaCrossover {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_history(&self) -> usize {
        self.long_period + 1
    }

    fn should_enter(&mut self, window: &BarWindow<'_>) -> Result<Option<Direction>, StrategyError> {
        Ok(self.crossover(window))
    }

    fn should_exit(
        &mut self,
        window: &BarWindow<'_>,
        _entry_price: f64,
        direction: Direction,
    ) -> Result<bool, StrategyError> {
        Ok(self
            .crossover(window)
            .is_some_and(|crossed| crossed != direction))
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
