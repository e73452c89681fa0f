//! Signal sources: anything that turns a bar window into an `AgentOutput`.
//!
//! `TechnicalSignal` votes with moving averages, RSI, MACD and Bollinger
//! bands. Each vote is a value in [-1, 1] with a weight; the signal is the
//! weighted mean and the confidence measures how closely the votes agree.

use serde_json::json;

use super::decision::AgentOutput;
use super::error::StrategyError;
use super::indicator::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use super::indicator::{
    IndicatorValue, calculate_bollinger, calculate_macd, calculate_rsi, calculate_sma,
    fibonacci_levels,
};
use super::ohlcv::BarWindow;

pub trait SignalSource {
    fn name(&self) -> &str;

    /// Bars needed before the source produces a non-zero confidence.
    fn min_history(&self) -> usize;

    fn analyze(&self, window: &BarWindow<'_>) -> Result<AgentOutput, StrategyError>;
}

const SHORT_MA: usize = 20;
const LONG_MA: usize = 50;
const RSI_PERIOD: usize = 14;
const BOLLINGER_PERIOD: usize = 20;
const BOLLINGER_MULT: f64 = 2.0;

const MIN_CONFIDENCE: f64 = 0.3;
const MAX_CONFIDENCE: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct TechnicalSignal {
    name: String,
}

impl Default for TechnicalSignal {
    fn default() -> Self {
        Self {
            name: "technical".to_string(),
        }
    }
}

impl TechnicalSignal {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, Copy)]
struct Vote {
    value: f64,
    weight: f64,
}

fn vote(value: f64, weight: f64) -> Vote {
    Vote { value, weight }
}

fn missing(indicator: &str) -> StrategyError {
    StrategyError::Indicator {
        indicator: indicator.to_string(),
        reason: "no value after warmup".to_string(),
    }
}

impl SignalSource for TechnicalSignal {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_history(&self) -> usize {
        LONG_MA
    }

    fn analyze(&self, window: &BarWindow<'_>) -> Result<AgentOutput, StrategyError> {
        if window.len() < self.min_history() {
            tracing::debug!(
                "{}: {} bars, need {}",
                self.name,
                window.len(),
                self.min_history()
            );
            return Ok(AgentOutput {
                source: self.name.clone(),
                signal: 0.0,
                confidence: 0.0,
                metadata: [("status".to_string(), json!("insufficient_data"))].into(),
            });
        }

        let bars = window.bars();
        let price = window.current().close;
        let sma_short = calculate_sma(bars, SHORT_MA)
            .latest_simple()
            .ok_or_else(|| missing("SMA(20)"))?;
        let sma_long = calculate_sma(bars, LONG_MA)
            .latest_simple()
            .ok_or_else(|| missing("SMA(50)"))?;
        let rsi = calculate_rsi(bars, RSI_PERIOD)
            .latest_simple()
            .ok_or_else(|| missing("RSI(14)"))?;
        let Some(IndicatorValue::Macd { histogram, .. }) =
            calculate_macd(bars, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL).latest()
        else {
            return Err(missing("MACD(12,26,9)"));
        };
        let Some(IndicatorValue::Bollinger { upper, lower, .. }) =
            calculate_bollinger(bars, BOLLINGER_PERIOD, BOLLINGER_MULT).latest()
        else {
            return Err(missing("BOLLINGER(20,2)"));
        };

        let mut votes = Vec::with_capacity(5);
        votes.push(vote(if price > sma_short { 0.5 } else { -0.5 }, 0.2));
        votes.push(vote(
            if sma_short > sma_long {
                0.7
            } else if sma_short < sma_long {
                -0.7
            } else {
                0.0
            },
            0.25,
        ));
        votes.push(if rsi < 30.0 {
            vote(0.8, 0.25)
        } else if rsi > 70.0 {
            vote(-0.8, 0.25)
        } else {
            vote((rsi - 50.0) / 50.0, 0.15)
        });
        votes.push(vote(if histogram > 0.0 { 0.6 } else { -0.6 }, 0.2));
        votes.push(if price < lower {
            vote(0.7, 0.1)
        } else if price > upper {
            vote(-0.7, 0.1)
        } else if upper > lower {
            let position = (price - lower) / (upper - lower);
            vote(-(position - 0.5) * 2.0, 0.1)
        } else {
            vote(0.0, 0.1)
        });

        let total_weight: f64 = votes.iter().map(|v| v.weight).sum();
        let signal = (votes.iter().map(|v| v.value * v.weight).sum::<f64>() / total_weight)
            .clamp(-1.0, 1.0);
        let disagreement: f64 = votes.iter().map(|v| (v.value - signal).abs()).sum::<f64>()
            / (votes.len() as f64 * 2.0);
        let confidence = (1.0 - disagreement).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);

        let swing_high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let swing_low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let fibonacci = fibonacci_levels(swing_high, swing_low).nearest(price);

        let mut output = AgentOutput {
            source: self.name.clone(),
            signal,
            confidence,
            metadata: Default::default(),
        }
        .with_metadata("price", price)
        .with_metadata("sma_20", sma_short)
        .with_metadata("sma_50", sma_long)
        .with_metadata("rsi", rsi)
        .with_metadata("macd_histogram", histogram)
        .with_metadata("bollinger", json!({ "upper": upper, "lower": lower }));
        if let Some(fib) = fibonacci {
            output = output.with_metadata(
                "fibonacci",
                json!({
                    "ratio": fib.level.ratio,
                    "level": fib.level.price,
                    "strength": fib.strength,
                    "at_level": fib.at_level,
                }),
            );
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    fn zigzag(len: usize, up: f64, down: f64) -> Vec<f64> {
        let mut price = 1000.0;
        (0..len)
            .map(|i| {
                price += if i % 2 == 0 { up } else { -down };
                price
            })
            .collect()
    }

    #[test]
    fn short_window_has_no_confidence() {
        let bars = make_bars(&zigzag(30, 2.0, 1.0));
        let window = BarWindow::new(&bars, 29).unwrap();
        let output = TechnicalSignal::default().analyze(&window).unwrap();
        assert_eq!(output.signal, 0.0);
        assert_eq!(output.confidence, 0.0);
        assert_eq!(output.metadata["status"], "insufficient_data");
    }

    #[test]
    fn rising_market_is_bullish() {
        let bars = make_bars(&zigzag(80, 2.0, 1.0));
        let window = BarWindow::new(&bars, 79).unwrap();
        let output = TechnicalSignal::default().analyze(&window).unwrap();
        assert!(output.signal > 0.0, "signal {}", output.signal);
        assert!((MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&output.confidence));
        assert!(output.metadata.contains_key("fibonacci"));
    }

    #[test]
    fn falling_market_is_bearish() {
        let bars = make_bars(&zigzag(80, -2.0, -1.0));
        let window = BarWindow::new(&bars, 79).unwrap();
        let output = TechnicalSignal::default().analyze(&window).unwrap();
        assert!(output.signal < 0.0, "signal {}", output.signal);
    }

    #[test]
    fn analysis_ignores_later_bars() {
        let bars = make_bars(&zigzag(90, 2.0, 1.0));
        let source = TechnicalSignal::default();
        let full = source.analyze(&BarWindow::new(&bars, 60).unwrap()).unwrap();
        let cut = source
            .analyze(&BarWindow::new(&bars[..61], 60).unwrap())
            .unwrap();
        assert_eq!(full, cut);
    }
}
