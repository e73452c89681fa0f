//! Fixed-threshold RSI reversal.
//!
//! Long below `oversold`, short above `overbought`; a long is closed once RSI
//! is back above 50 and a short once it is back below 50.

use super::{SECTION, ensure_ordered, stops_from_config};
use crate::domain::config_validation::{invalid, read_f64, read_period};
use crate::domain::error::{SigtraderError, StrategyError};
use crate::domain::indicator::calculate_rsi;
use crate::domain::ohlcv::BarWindow;
use crate::domain::position::Direction;
use crate::domain::strategy::{PercentStops, Strategy};
use crate::ports::config_port::ConfigPort;

pub(crate) const RSI_MIDLINE: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct RsiReversal {
    name: String,
    period: usize,
    oversold: f64,
    overbought: f64,
    stops: PercentStops,
}

impl RsiReversal {
    pub fn new(period: usize, oversold: f64, overbought: f64, stops: PercentStops) -> Self {
        Self {
            name: format!("RSI Reversal ({oversold}/{overbought})"),
            period,
            oversold,
            overbought,
            stops,
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let period = read_period(config, SECTION, "period", 14)?;
        let oversold = read_f64(config, SECTION, "oversold", 30.0)?;
        let overbought = read_f64(config, SECTION, "overbought", 70.0)?;
        if oversold <= 0.0 {
            return Err(invalid(SECTION, "oversold", "must be above 0"));
        }
        if overbought >= 100.0 {
            return Err(invalid(SECTION, "overbought", "must be below 100"));
        }
        ensure_ordered(oversold, overbought, "oversold", "overbought")?;
        let stops = stops_from_config(config, PercentStops::new(2.0, 4.0))?;
        Ok(Self::new(period, oversold, overbought, stops))
    }

    fn rsi(&self, window: &BarWindow<'_>) -> Option<f64> {
        calculate_rsi(window.bars(), self.period).latest_simple()
    }
}

impl Strategy for RsiReversal {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_history(&self) -> usize {
        self.period + 1
    }

    fn should_enter(&mut self, window: &BarWindow<'_>) -> Result<Option<Direction>, StrategyError> {
        Ok(self.rsi(window).and_then(|rsi| {
            if rsi < self.oversold {
                Some(Direction::Long)
            } else if rsi > self.overbought {
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
        Ok(self.rsi(window).is_some_and(|rsi| match direction {
            Direction::Long => rsi > RSI_MIDLINE,
            Direction::Short => rsi < RSI_MIDLINE,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::indicator::test_support::make_bars;
    use crate::domain::strategies::test_support::entries;

    fn strategy() -> RsiReversal {
        RsiReversal::new(5, 30.0, 70.0, PercentStops::new(2.0, 4.0))
    }

    #[test]
    fn falling_prices_enter_long() {
        let bars = make_bars(&[20.0, 19.0, 18.0, 17.0, 16.0, 15.0, 14.0]);
        let signals = entries(&mut strategy(), &bars);
        assert_eq!(signals.first(), Some(&(5, Direction::Long)));
    }

    #[test]
    fn rising_prices_enter_short() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        let signals = entries(&mut strategy(), &bars);
        assert_eq!(signals, vec![(5, Direction::Short)]);
    }

    #[test]
    fn long_exits_above_midline() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        let window = BarWindow::new(&bars, 5).unwrap();
        let mut s = strategy();
        assert!(s.should_exit(&window, 10.0, Direction::Long).unwrap());
        assert!(!s.should_exit(&window, 10.0, Direction::Short).unwrap());
    }

    #[test]
    fn default_stops() {
        let s = strategy();
        let sl = s.stop_loss(100.0, Direction::Long).unwrap().unwrap();
        let tp = s.take_profit(100.0, Direction::Short).unwrap().unwrap();
        assert!((sl - 98.0).abs() < 1e-9);
        assert!((tp - 96.0).abs() < 1e-9);
    }

    #[test]
    fn thresholds_must_be_ordered() {
        let config =
            FileConfigAdapter::from_string("[strategy]\noversold = 70\noverbought = 30\n").unwrap();
        let err = RsiReversal::from_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "oversold"));
    }
}
