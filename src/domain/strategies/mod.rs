//! Built-in strategies and the factory that builds them from `[strategy]` config.

pub mod adaptive_rsi;
pub mod breakout;
pub mod ma_crossover;
pub mod mean_reversion;
pub mod multi_confirmation;
pub mod rsi;
pub mod signal;
pub mod trend_following;

pub use adaptive_rsi::AdaptiveRsi;
pub use breakout::Breakout;
pub use ma_crossover::MaCrossover;
pub use mean_reversion::MeanReversion;
pub use multi_confirmation::MultiConfirmation;
pub use rsi::RsiReversal;
pub use signal::SignalThreshold;
pub use trend_following::TrendFollowing;

use std::fmt;
use std::str::FromStr;

use crate::domain::config_validation::{invalid, read_f64, require_string};
use crate::domain::error::SigtraderError;
use crate::domain::indicator::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use crate::domain::indicator::{IndicatorValue, calculate_macd};
use crate::domain::ohlcv::BarWindow;
use crate::domain::position::Direction;
use crate::domain::strategy::{PercentStops, Strategy};
use crate::ports::config_port::ConfigPort;

pub(crate) const SECTION: &str = "strategy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    MaCrossover,
    Rsi,
    AdaptiveRsi,
    TrendFollowing,
    MeanReversion,
    Breakout,
    MultiConfirmation,
    Signal,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 8] = [
        StrategyKind::MaCrossover,
        StrategyKind::Rsi,
        StrategyKind::AdaptiveRsi,
        StrategyKind::TrendFollowing,
        StrategyKind::MeanReversion,
        StrategyKind::Breakout,
        StrategyKind::MultiConfirmation,
        StrategyKind::Signal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::MaCrossover => "ma_crossover",
            StrategyKind::Rsi => "rsi",
            StrategyKind::AdaptiveRsi => "adaptive_rsi",
            StrategyKind::TrendFollowing => "trend_following",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::Breakout => "breakout",
            StrategyKind::MultiConfirmation => "multi_confirmation",
            StrategyKind::Signal => "signal",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StrategyKind::MaCrossover => "SMA crossover, exit on the opposite cross",
            StrategyKind::Rsi => "RSI oversold/overbought, exit when RSI crosses 50",
            StrategyKind::AdaptiveRsi => "RSI with ATR-scaled thresholds and stops",
            StrategyKind::TrendFollowing => "MACD cross in the direction of the SMA trend",
            StrategyKind::MeanReversion => "Bollinger band touch with RSI, exit at the middle band",
            StrategyKind::Breakout => "channel breakout confirmed by volume and RSI",
            StrategyKind::MultiConfirmation => "SMA, RSI, MACD and Bollinger must all agree",
            StrategyKind::Signal => "technical signal source crossing a threshold",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = SigtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| SigtraderError::UnknownStrategy {
                name: s.trim().to_string(),
            })
    }
}

pub type BoxedStrategy = Box<dyn Strategy + Send>;

/// Build the strategy named by `[strategy] name`.
pub fn build_strategy(config: &dyn ConfigPort) -> Result<BoxedStrategy, SigtraderError> {
    let kind: StrategyKind = require_string(config, SECTION, "name")?.parse()?;
    build_kind(kind, config)
}

/// Build `kind` with parameters from `[strategy]`, ignoring its `name` key.
pub fn build_kind(
    kind: StrategyKind,
    config: &dyn ConfigPort,
) -> Result<BoxedStrategy, SigtraderError> {
    Ok(match kind {
        StrategyKind::MaCrossover => Box::new(MaCrossover::from_config(config)?),
        StrategyKind::Rsi => Box::new(RsiReversal::from_config(config)?),
        StrategyKind::AdaptiveRsi => Box::new(AdaptiveRsi::from_config(config)?),
        StrategyKind::TrendFollowing => Box::new(TrendFollowing::from_config(config)?),
        StrategyKind::MeanReversion => Box::new(MeanReversion::from_config(config)?),
        StrategyKind::Breakout => Box::new(Breakout::from_config(config)?),
        StrategyKind::MultiConfirmation => Box::new(MultiConfirmation::from_config(config)?),
        StrategyKind::Signal => Box::new(SignalThreshold::from_config(config)?),
    })
}

/// `stop_loss` / `take_profit` percentages from config over per-strategy defaults.
pub(crate) fn stops_from_config(
    config: &dyn ConfigPort,
    defaults: PercentStops,
) -> Result<PercentStops, SigtraderError> {
    let stop_loss_pct = read_f64(config, SECTION, "stop_loss", defaults.stop_loss_pct)?;
    if stop_loss_pct < 0.0 {
        return Err(invalid(SECTION, "stop_loss", "must be non-negative"));
    }
    let take_profit_pct = read_f64(config, SECTION, "take_profit", defaults.take_profit_pct)?;
    if take_profit_pct < 0.0 {
        return Err(invalid(SECTION, "take_profit", "must be non-negative"));
    }
    Ok(PercentStops::new(stop_loss_pct, take_profit_pct))
}

/// Requires `low < high`, reporting against `low_key`.
pub(crate) fn ensure_ordered(
    low: f64,
    high: f64,
    low_key: &str,
    high_key: &str,
) -> Result<(), SigtraderError> {
    if low < high {
        Ok(())
    } else {
        Err(invalid(
            SECTION,
            low_key,
            format!("{low_key} ({low}) must be below {high_key} ({high})"),
        ))
    }
}

/// Direction in which series `a` crossed series `b` between the previous and current bar.
pub(crate) fn cross(prev_a: f64, prev_b: f64, a: f64, b: f64) -> Option<Direction> {
    if prev_a < prev_b && a > b {
        Some(Direction::Long)
    } else if prev_a > prev_b && a < b {
        Some(Direction::Short)
    } else {
        None
    }
}

/// MACD(12,26,9) line crossing its signal line on the current bar.
pub(crate) fn macd_cross(window: &BarWindow<'_>) -> Option<Direction> {
    let series = calculate_macd(window.bars(), DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
    match (series.previous()?, series.latest()?) {
        (
            IndicatorValue::Macd {
                line: prev_line,
                signal: prev_signal,
                ..
            },
            IndicatorValue::Macd { line, signal, .. },
        ) => cross(prev_line, prev_signal, line, signal),
        _ => None,
    }
}

/// Bars before the MACD signal line has two valid points.
pub(crate) const MACD_HISTORY: usize = DEFAULT_SLOW + DEFAULT_SIGNAL;

/// Profit of the current close over `entry_price`, in percent, for `direction`.
pub(crate) fn profit_pct(entry_price: f64, price: f64, direction: Direction) -> f64 {
    direction.sign() * (price - entry_price) / entry_price * 100.0
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn every_kind_builds_with_defaults() {
        let config = FileConfigAdapter::from_string("[strategy]\n").unwrap();
        for kind in StrategyKind::ALL {
            let strategy = build_kind(kind, &config).unwrap();
            assert!(!strategy.name().is_empty());
            assert!(strategy.min_history() > 1, "{kind}");
        }
    }

    #[test]
    fn kind_names_parse() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
        }
        assert_eq!(" RSI ".parse::<StrategyKind>().unwrap(), StrategyKind::Rsi);
    }

    #[test]
    fn build_strategy_uses_name() {
        let config =
            FileConfigAdapter::from_string("[strategy]\nname = breakout\nlookback = 10\n").unwrap();
        let strategy = build_strategy(&config).unwrap();
        assert!(strategy.name().starts_with("Breakout"));
    }

    #[test]
    fn config_stops_override_defaults() {
        let config =
            FileConfigAdapter::from_string("[strategy]\nstop_loss = 1\ntake_profit = 0\n").unwrap();
        let stops = stops_from_config(&config, PercentStops::new(2.0, 4.0)).unwrap();
        assert_eq!(stops.stop_loss_pct, 1.0);
        assert!(stops.take_profit(100.0, Direction::Long).is_none());
    }

    #[test]
    fn cross_detection() {
        assert_eq!(cross(1.0, 2.0, 3.0, 2.0), Some(Direction::Long));
        assert_eq!(cross(3.0, 2.0, 1.0, 2.0), Some(Direction::Short));
        assert_eq!(cross(1.0, 2.0, 2.0, 2.0), None);
        assert_eq!(cross(3.0, 2.0, 4.0, 2.0), None);
    }

    #[test]
    fn profit_pct_by_direction() {
        assert!((profit_pct(100.0, 103.0, Direction::Long) - 3.0).abs() < 1e-12);
        assert!((profit_pct(100.0, 97.0, Direction::Short) - 3.0).abs() < 1e-12);
    }
}
