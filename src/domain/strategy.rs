//! The strategy contract the engine drives.
//!
//! Strategies only ever see a `BarWindow`, which physically ends at the bar
//! being evaluated.

use crate::domain::error::StrategyError;
use crate::domain::ohlcv::BarWindow;
use crate::domain::position::Direction;

pub trait Strategy {
    fn name(&self) -> &str;

    /// Bars required before entry signals are meaningful.
    fn min_history(&self) -> usize;

    /// Entry decision for the current bar while flat.
    fn should_enter(&mut self, window: &BarWindow<'_>) -> Result<Option<Direction>, StrategyError>;

    /// Exit decision for the current bar while a position is open.
    fn should_exit(
        &mut self,
        window: &BarWindow<'_>,
        entry_price: f64,
        direction: Direction,
    ) -> Result<bool, StrategyError>;

    /// Stop-loss level, fixed at entry.
    fn stop_loss(&self, _entry_price: f64, _direction: Direction) -> Result<Option<f64>, StrategyError> {
        Ok(None)
    }

    /// Take-profit level, fixed at entry.
    fn take_profit(
        &self,
        _entry_price: f64,
        _direction: Direction,
    ) -> Result<Option<f64>, StrategyError> {
        Ok(None)
    }

    /// Drop any state carried between bars so the instance can be reused.
    fn reset(&mut self) {}
}

/// Percentage stop-loss / take-profit around the entry price. Zero disables a level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentStops {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl PercentStops {
    pub fn new(stop_loss_pct: f64, take_profit_pct: f64) -> Self {
        Self {
            stop_loss_pct,
            take_profit_pct,
        }
    }

    pub fn stop_loss(&self, entry_price: f64, direction: Direction) -> Option<f64> {
        if self.stop_loss_pct <= 0.0 {
            return None;
        }
        let offset = self.stop_loss_pct / 100.0;
        Some(match direction {
            Direction::Long => entry_price * (1.0 - offset),
            Direction::Short => entry_price * (1.0 + offset),
        })
    }

    pub fn take_profit(&self, entry_price: f64, direction: Direction) -> Option<f64> {
        if self.take_profit_pct <= 0.0 {
            return None;
        }
        let offset = self.take_profit_pct / 100.0;
        Some(match direction {
            Direction::Long => entry_price * (1.0 + offset),
            Direction::Short => entry_price * (1.0 - offset),
        })
    }

    /// Same levels with both percentages scaled by `multiplier`.
    pub fn scaled(&self, multiplier: f64) -> Self {
        Self {
            stop_loss_pct: self.stop_loss_pct * multiplier,
            take_profit_pct: self.take_profit_pct * multiplier,
        }
    }
}
