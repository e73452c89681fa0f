//! Trend following: trade MACD crosses only in the direction of the SMA trend.
//!
//! The trend is up while SMA(fast) > SMA(slow). Entries also require RSI to
//! sit inside `[rsi_min, rsi_max]`, away from the extremes. A position is
//! closed by the MACD cross against it.

use super::{MACD_HISTORY, SECTION, ensure_ordered, macd_cross, stops_from_config};
use crate::domain::config_validation::{read_f64, read_period};
use crate::domain::error::{SigtraderError, StrategyError};
use crate::domain::indicator::{calculate_rsi, calculate_sma};
use crate::domain::ohlcv::BarWindow;
use crate::domain::position::Direction;
use crate::domain::strategy::{PercentStops, Strategy};
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone)]
pub struct TrendFollowing {
    name: String,
    fast_period: usize,
    slow_period: usize,
    rsi_period: usize,
    rsi_min: f64,
    rsi_max: f64,
    stops: PercentStops,
}

impl TrendFollowing {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        rsi_period: usize,
        rsi_min: f64,
        rsi_max: f64,
        stops: PercentStops,
    ) -> Self {
        Self {
            name: format!("Trend Following ({fast_period}/{slow_period})"),
            fast_period,
            slow_period,
            rsi_period,
            rsi_min,
            rsi_max,
            stops,
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let fast_period = read_period(config, SECTION, "fast_period", 50)?;
        let slow_period = read_period(config, SECTION, "slow_period", 200)?;
        ensure_ordered(
            fast_period as f64,
            slow_period as f64,
            "fast_period",
            "slow_period",
        )?;
        let rsi_period = read_period(config, SECTION, "rsi_period", 14)?;
        let rsi_min = read_f64(config, SECTION, "rsi_min", 40.0)?;
        let rsi_max = read_f64(config, SECTION, "rsi_max", 60.0)?;
        ensure_ordered(rsi_min, rsi_max, "rsi_min", "rsi_max")?;
        let stops = stops_from_config(config, PercentStops::new(2.5, 5.0))?;
        Ok(Self::new(
            fast_period,
            slow_period,
            rsi_period,
            rsi_min,
            rsi_max,
            stops,
        ))
    }

    fn trend(&self, window: &BarWindow<'_>) -> Option<Direction> {
        let fast = calculate_sma(window.bars(), self.fast_period).latest_simple()?;
        let slow = calculate_sma(window.bars(), self.slow_period).latest_simple()?;
        Some(if fast > slow {
            Direction::Long
        } else {
            Direction::Short
        })
    }
}

impl Strategy for TrendFollowing {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_history(&self) -> usize {
        (self.slow_period + 1).max(MACD_HISTORY)
    }

    fn should_enter(&mut self, window: &BarWindow<'_>) -> Result<Option<Direction>, StrategyError> {
        let Some(trend) = self.trend(window) else {
            return Ok(None);
        };
        let calm = calculate_rsi(window.bars(), self.rsi_period)
            .latest_simple()
            .is_some_and(|rsi| (self.rsi_min..=self.rsi_max).contains(&rsi));
        if !calm {
            return Ok(None);
        }
        Ok(macd_cross(window).filter(|&crossed| crossed == trend))
    }

    fn should_exit(
        &mut self,
        window: &BarWindow<'_>,
        _entry_price: f64,
        direction: Direction,
    ) -> Result<bool, StrategyError> {
        Ok(macd_cross(window).is_some_and(|crossed| crossed != direction))
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
    use crate::domain::indicator::test_support::make_bars;
    use crate::domain::strategies::test_support::entries;

    fn strategy() -> TrendFollowing {
        TrendFollowing::new(5, 10, 14, 40.0, 60.0, PercentStops::new(2.5, 5.0))
    }

    fn accelerating_rise(len: usize) -> Vec<f64> {
        (0..len).map(|i| 100.0 + 0.05 * (i * i) as f64).collect()
    }

    fn rise_then_fall() -> Vec<f64> {
        let mut closes = accelerating_rise(45);
        let peak = closes[44];
        closes.extend((1..=20).map(|i| peak - 1.5 * i as f64));
        closes
    }

    #[test]
    fn exits_long_on_bearish_macd_cross() {
        let bars = make_bars(&rise_then_fall());
        let cross_down = (0..bars.len())
            .find(|&i| macd_cross(&BarWindow::new(&bars, i).unwrap()) == Some(Direction::Short))
            .expect("the turn produces a bearish cross");
        assert!(cross_down >= 45);

        let mut s = strategy();
        let window = BarWindow::new(&bars, cross_down).unwrap();
        assert!(s.should_exit(&window, 120.0, Direction::Long).unwrap());
        assert!(!s.should_exit(&window, 120.0, Direction::Short).unwrap());
    }

    #[test]
    fn overheated_rsi_blocks_entries() {
        // A one-way market pins RSI at 100.
        let bars = make_bars(&accelerating_rise(80));
        assert!(entries(&mut strategy(), &bars).is_empty());
    }

    #[test]
    fn warmup_covers_macd() {
        assert_eq!(strategy().min_history(), MACD_HISTORY);
        let long = TrendFollowing::new(50, 200, 14, 40.0, 60.0, PercentStops::new(2.5, 5.0));
        assert_eq!(long.min_history(), 201);
    }
}
