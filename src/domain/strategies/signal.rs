//! Trades the output of a `SignalSource` against a fixed threshold.
//!
//! Enters long when the signal exceeds `threshold` and short when it falls
//! below `-threshold`. Outputs with zero confidence are ignored. A long is
//! closed when the signal turns negative, a short when it turns positive.

use super::{SECTION, stops_from_config};
use crate::domain::config_validation::{invalid, read_f64};
use crate::domain::error::{SigtraderError, StrategyError};
use crate::domain::ohlcv::BarWindow;
use crate::domain::position::Direction;
use crate::domain::strategy::{PercentStops, Strategy};
use crate::domain::technical_signal::{SignalSource, TechnicalSignal};
use crate::ports::config_port::ConfigPort;

pub struct SignalThreshold {
    name: String,
    source: Box<dyn SignalSource + Send>,
    threshold: f64,
    stops: PercentStops,
}

impl SignalThreshold {
    pub fn new(source: Box<dyn SignalSource + Send>, threshold: f64, stops: PercentStops) -> Self {
        Self {
            name: format!("Signal Threshold ({}, {threshold})", source.name()),
            source,
            threshold,
            stops,
        }
    }

    /// Built on `TechnicalSignal`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let threshold = read_f64(config, SECTION, "threshold", 0.3)?;
        if !(0.0..1.0).contains(&threshold) {
            return Err(invalid(SECTION, "threshold", "must be within [0, 1)"));
        }
        let stops = stops_from_config(config, PercentStops::new(3.0, 6.0))?;
        Ok(Self::new(Box::new(TechnicalSignal::default()), threshold, stops))
    }

    fn signal(&self, window: &BarWindow<'_>) -> Result<Option<f64>, StrategyError> {
        let output = self.source.analyze(window)?;
        Ok((output.confidence > 0.0).then_some(output.signal))
    }
}

impl Strategy for SignalThreshold {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_history(&self) -> usize {
        self.source.min_history()
    }

    fn should_enter(&mut self, window: &BarWindow<'_>) -> Result<Option<Direction>, StrategyError> {
        Ok(self.signal(window)?.and_then(|signal| {
            if signal > self.threshold {
                Some(Direction::Long)
            } else if signal < -self.threshold {
                Some(Direction::Short)
            } else {
                None
            }
        }))
    }

    fn should_exit(
        &mut self,
        window: &BarWindow<'_>,
        _entry_price: f64,
        direction: Direction,
    ) -> Result<bool, StrategyError> {
        Ok(self.signal(window)?.is_some_and(|signal| match direction {
            Direction::Long => signal < 0.0,
            Direction::Short => signal > 0.0,
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
