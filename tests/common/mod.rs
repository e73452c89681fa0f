#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use sigtrader::domain::error::StrategyError;
pub use sigtrader::domain::ohlcv::{BarSeries, BarWindow, Interval, OhlcvBar};
use sigtrader::domain::position::Direction;
use sigtrader::domain::strategy::Strategy;
use std::collections::BTreeSet;
use std::io::Write;

pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn make_bar(day: usize, open: f64, high: f64, low: f64, close: f64) -> OhlcvBar {
    OhlcvBar {
        timestamp: start() + Duration::days(day as i64),
        open,
        high,
        low,
        close,
        volume: Some(1000.0),
    }
}

/// Bars with a one-point range around each close.
pub fn bars_from_closes(closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i, c, c + 1.0, c - 1.0, c))
        .collect()
}

pub fn series_from_closes(closes: &[f64]) -> BarSeries {
    BarSeries::new("TEST", Interval::Day1, bars_from_closes(closes)).unwrap()
}

pub fn flat_series(n: usize, price: f64) -> BarSeries {
    let bars = (0..n)
        .map(|i| make_bar(i, price, price, price, price))
        .collect();
    BarSeries::new("FLAT", Interval::Day1, bars).unwrap()
}

/// Smooth oscillation that produces regular crossovers.
pub fn wave_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            100.0 + 10.0 * (t / 8.0).sin() + 3.0 * (t / 3.0).cos() + t * 0.05
        })
        .collect()
}

pub fn csv_from_closes(closes: &[f64]) -> String {
    let mut out = String::from("date,open,high,low,close,volume\n");
    for bar in bars_from_closes(closes) {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.timestamp.date(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume.unwrap_or_default()
        ));
    }
    out
}

pub fn write_temp(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Strategy driven by fixed bar indices.
#[derive(Debug, Clone)]
pub struct ScriptedStrategy {
    pub direction: Direction,
    /// Enter on every flat bar when `None`.
    pub enter_on: Option<BTreeSet<usize>>,
    pub exit_on: BTreeSet<usize>,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    pub fail_at: Option<usize>,
    pub enter_calls: Vec<usize>,
}

impl ScriptedStrategy {
    pub fn always(direction: Direction) -> Self {
        Self {
            direction,
            enter_on: None,
            exit_on: BTreeSet::new(),
            stop_loss_pct: None,
            take_profit_pct: None,
            fail_at: None,
            enter_calls: Vec::new(),
        }
    }

    pub fn exit_on(mut self, indices: &[usize]) -> Self {
        self.exit_on = indices.iter().copied().collect();
        self
    }

    pub fn enter_on(mut self, indices: &[usize]) -> Self {
        self.enter_on = Some(indices.iter().copied().collect());
        self
    }

    pub fn with_stops(mut self, stop_loss_pct: f64, take_profit_pct: f64) -> Self {
        self.stop_loss_pct = Some(stop_loss_pct);
        self.take_profit_pct = Some(take_profit_pct);
        self
    }

    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    fn check(&self, window: &BarWindow<'_>) -> Result<(), StrategyError> {
        match self.fail_at {
            Some(at) if window.index() == at => {
                Err(StrategyError::Other(format!("scripted failure at {at}")))
            }
            _ => Ok(()),
        }
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn min_history(&self) -> usize {
        1
    }

    fn should_enter(&mut self, window: &BarWindow<'_>) -> Result<Option<Direction>, StrategyError> {
        self.check(window)?;
        self.enter_calls.push(window.index());
        let wanted = self
            .enter_on
            .as_ref()
            .is_none_or(|set| set.contains(&window.index()));
        Ok(wanted.then_some(self.direction))
    }

    fn should_exit(
        &mut self,
        window: &BarWindow<'_>,
        _entry_price: f64,
        _direction: Direction,
    ) -> Result<bool, StrategyError> {
        self.check(window)?;
        Ok(self.exit_on.contains(&window.index()))
    }

    fn stop_loss(&self, entry_price: f64, direction: Direction) -> Result<Option<f64>, StrategyError> {
        Ok(self
            .stop_loss_pct
            .map(|pct| entry_price * (1.0 - direction.sign() * pct / 100.0)))
    }

    fn take_profit(
        &self,
        entry_price: f64,
        direction: Direction,
    ) -> Result<Option<f64>, StrategyError> {
        Ok(self
            .take_profit_pct
            .map(|pct| entry_price * (1.0 + direction.sign() * pct / 100.0)))
    }

    fn reset(&mut self) {
        self.enter_calls.clear();
    }
}
