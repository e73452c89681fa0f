//! Market regime classification from trend strength (ADX) and volatility (ATR%).

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::error::SigtraderError;
use super::indicator::{IndicatorValue, calculate_adx, calculate_atr};
use super::ohlcv::BarWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    TrendingUp,
    TrendingDown,
    Ranging,
    Volatile,
}

impl MarketRegime {
    pub const ALL: [MarketRegime; 4] = [
        MarketRegime::TrendingUp,
        MarketRegime::TrendingDown,
        MarketRegime::Ranging,
        MarketRegime::Volatile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketRegime::TrendingUp => "trending_up",
            MarketRegime::TrendingDown => "trending_down",
            MarketRegime::Ranging => "ranging",
            MarketRegime::Volatile => "volatile",
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketRegime {
    type Err = SigtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        MarketRegime::ALL
            .into_iter()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| SigtraderError::InvalidInput {
                field: "regime".into(),
                reason: format!("unknown regime '{s}'"),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeConfig {
    pub adx_period: usize,
    pub atr_period: usize,
    /// ADX above this is a trend.
    pub trending_threshold: f64,
    /// ADX above this is a strong trend.
    pub strong_trending_threshold: f64,
    /// ATR as a percentage of price above which the market is volatile.
    pub high_volatility_pct: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            adx_period: 14,
            atr_period: 14,
            trending_threshold: 25.0,
            strong_trending_threshold: 40.0,
            high_volatility_pct: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegimeAnalysis {
    pub regime: MarketRegime,
    pub confidence: f64,
    pub adx: f64,
    pub volatility_pct: f64,
    /// ADX / 100, capped at 1.
    pub trend_strength: f64,
}

const TREND_FAST: usize = 20;
const TREND_SLOW: usize = 50;
const FULL_CONFIDENCE_ADX: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct RegimeDetector {
    config: RegimeConfig,
}

impl RegimeDetector {
    pub fn new(config: RegimeConfig) -> Result<Self, SigtraderError> {
        if config.adx_period == 0 || config.atr_period == 0 {
            return Err(SigtraderError::InvalidInput {
                field: "regime periods".into(),
                reason: "must be positive".into(),
            });
        }
        if !(config.trending_threshold > 0.0
            && config.trending_threshold < config.strong_trending_threshold)
        {
            return Err(SigtraderError::InvalidInput {
                field: "trending_threshold".into(),
                reason: "need 0 < trending_threshold < strong_trending_threshold".into(),
            });
        }
        if config.high_volatility_pct <= 0.0 {
            return Err(SigtraderError::InvalidInput {
                field: "high_volatility_pct".into(),
                reason: "must be positive".into(),
            });
        }
        Ok(Self { config })
    }

    /// Bars needed before classification uses the indicators.
    pub fn min_history(&self) -> usize {
        (self.config.adx_period * 2)
            .max(self.config.atr_period)
            .max(TREND_SLOW)
    }

    pub fn detect(&self, window: &BarWindow<'_>) -> RegimeAnalysis {
        let bars = window.bars();
        let adx_value = calculate_adx(bars, self.config.adx_period).latest();
        let atr = calculate_atr(bars, self.config.atr_period).latest_simple();

        let (Some(IndicatorValue::Adx { adx, .. }), Some(atr), true) =
            (adx_value, atr, window.len() >= self.min_history())
        else {
            return RegimeAnalysis {
                regime: MarketRegime::Ranging,
                confidence: 0.5,
                adx: 0.0,
                volatility_pct: 0.0,
                trend_strength: 0.0,
            };
        };

        let mean_close = |n: usize| {
            let tail = window.tail(n);
            tail.iter().map(|b| b.close).sum::<f64>() / tail.len() as f64
        };
        let avg_price = mean_close(TREND_FAST);
        let volatility_pct = if avg_price > 0.0 {
            atr / avg_price * 100.0
        } else {
            0.0
        };
        let uptrend = mean_close(TREND_FAST) > mean_close(TREND_SLOW);
        let (regime, confidence) = self.classify(adx, volatility_pct, uptrend);

        RegimeAnalysis {
            regime,
            confidence,
            adx,
            volatility_pct,
            trend_strength: (adx / 100.0).min(1.0),
        }
    }

    fn classify(&self, adx: f64, volatility_pct: f64, uptrend: bool) -> (MarketRegime, f64) {
        let c = &self.config;
        let trend = if uptrend {
            MarketRegime::TrendingUp
        } else {
            MarketRegime::TrendingDown
        };

        if volatility_pct > c.high_volatility_pct {
            return (
                MarketRegime::Volatile,
                (volatility_pct / c.high_volatility_pct).min(1.0),
            );
        }
        if adx > c.strong_trending_threshold {
            return (trend, (adx / FULL_CONFIDENCE_ADX).min(1.0));
        }
        if adx > c.trending_threshold {
            let span = c.strong_trending_threshold - c.trending_threshold;
            return (trend, (adx - c.trending_threshold) / span);
        }
        (
            MarketRegime::Ranging,
            (1.0 - adx / c.trending_threshold).clamp(0.0, 1.0),
        )
    }
}
