//! Regime-aware strategy selection.
//!
//! The regime is sampled at regular intervals over the series and the most
//! frequent one becomes the dominant regime. Each candidate run is then marked
//! compatible or skipped, and the best compatible run by total return wins.
//! When nothing is compatible every run is considered.

use std::collections::BTreeMap;

use serde::Serialize;

use super::backtest::BacktestResult;
use super::error::SigtraderError;
use super::ohlcv::{BarSeries, BarWindow};
use super::regime::{MarketRegime, RegimeDetector};
use super::strategies::StrategyKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveConfig {
    /// Bars handed to the detector at each sample.
    pub lookback: usize,
    /// Approximate number of regime samples across the series.
    pub samples: usize,
    /// Regime confidence below which no strategy is compatible.
    pub min_confidence: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            lookback: 100,
            samples: 10,
            min_confidence: 0.6,
        }
    }
}

impl AdaptiveConfig {
    pub fn validate(&self) -> Result<(), SigtraderError> {
        if self.lookback == 0 || self.samples == 0 {
            return Err(SigtraderError::InvalidInput {
                field: "lookback/samples".into(),
                reason: "must be positive".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(SigtraderError::InvalidInput {
                field: "min_confidence".into(),
                reason: format!("must be within [0, 1], got {}", self.min_confidence),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeSurvey {
    pub dominant: MarketRegime,
    /// Confidence of the latest sample.
    pub confidence: f64,
    pub counts: BTreeMap<MarketRegime, usize>,
    pub samples: usize,
}

/// Regimes each built-in strategy is suited to.
pub fn suited_regimes(kind: StrategyKind) -> &'static [MarketRegime] {
    use MarketRegime::*;
    match kind {
        StrategyKind::MaCrossover | StrategyKind::TrendFollowing | StrategyKind::AdaptiveRsi => {
            &[TrendingUp, TrendingDown]
        }
        StrategyKind::Breakout => &[TrendingUp],
        StrategyKind::Rsi => &[Ranging],
        StrategyKind::MeanReversion => &[Ranging, Volatile],
        StrategyKind::MultiConfirmation => &[Ranging, TrendingUp],
        StrategyKind::Signal => &MarketRegime::ALL,
    }
}

/// Sample the regime every `len / samples` bars once `lookback` bars are available.
pub fn survey_regimes(
    series: &BarSeries,
    detector: &RegimeDetector,
    config: &AdaptiveConfig,
) -> Result<RegimeSurvey, SigtraderError> {
    config.validate()?;
    let bars = series.bars();
    if bars.len() < config.lookback {
        return Err(SigtraderError::InvalidInput {
            field: "bars".into(),
            reason: format!(
                "regime sampling needs at least {} bars, got {}",
                config.lookback,
                bars.len()
            ),
        });
    }

    let step = (bars.len() / config.samples).max(1);
    let mut counts: BTreeMap<MarketRegime, usize> = BTreeMap::new();
    let mut confidence = 0.0;
    let mut samples = 0;
    for end in (config.lookback..=bars.len()).step_by(step) {
        let slice = &bars[end - config.lookback..end];
        let Some(window) = BarWindow::new(slice, slice.len() - 1) else {
            continue;
        };
        let analysis = detector.detect(&window);
        tracing::debug!(
            "bar {}: {} (confidence {:.2}, ADX {:.1})",
            end - 1,
            analysis.regime,
            analysis.confidence,
            analysis.adx
        );
        *counts.entry(analysis.regime).or_insert(0) += 1;
        confidence = analysis.confidence;
        samples += 1;
    }

    // Ties go to the earlier regime in declaration order.
    let mut dominant = MarketRegime::Ranging;
    let mut best = 0;
    for regime in MarketRegime::ALL {
        let count = counts.get(&regime).copied().unwrap_or(0);
        if count > best {
            best = count;
            dominant = regime;
        }
    }

    Ok(RegimeSurvey {
        dominant,
        confidence,
        counts,
        samples,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compatibility {
    pub compatible: bool,
    pub reason: String,
}

pub fn check_compatibility(
    kind: StrategyKind,
    survey: &RegimeSurvey,
    min_confidence: f64,
) -> Compatibility {
    let regime = survey.dominant;
    if survey.confidence < min_confidence {
        return Compatibility {
            compatible: false,
            reason: format!("low regime confidence ({:.0}%)", survey.confidence * 100.0),
        };
    }
    if suited_regimes(kind).contains(&regime) {
        Compatibility {
            compatible: true,
            reason: format!("good match for {regime} market"),
        }
    } else {
        Compatibility {
            compatible: false,
            reason: format!("not suited to {regime} market"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub kind: StrategyKind,
    pub result: BacktestResult,
    pub compatibility: Compatibility,
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub candidates: Vec<Candidate>,
    /// Index into `candidates`, `None` only when there are no runs.
    pub best: Option<usize>,
    /// True when no run was compatible and the pick came from all runs.
    pub fallback: bool,
}

impl Selection {
    pub fn best(&self) -> Option<&Candidate> {
        self.best.and_then(|i| self.candidates.get(i))
    }
}

pub fn select_best(
    runs: Vec<(StrategyKind, BacktestResult)>,
    survey: &RegimeSurvey,
    min_confidence: f64,
) -> Selection {
    let candidates: Vec<Candidate> = runs
        .into_iter()
        .map(|(kind, result)| Candidate {
            kind,
            result,
            compatibility: check_compatibility(kind, survey, min_confidence),
        })
        .collect();

    let fallback = !candidates.iter().any(|c| c.compatibility.compatible);
    let best = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| fallback || c.compatibility.compatible)
        .fold(None::<(usize, f64)>, |best, (i, c)| {
            let ret = c.result.metrics.total_return_pct;
            match best {
                Some((_, top)) if top >= ret => best,
                _ => Some((i, ret)),
            }
        })
        .map(|(i, _)| i);

    if fallback && !candidates.is_empty() {
        tracing::warn!(
            "no strategy suits the {} regime; choosing among all runs",
            survey.dominant
        );
    }

    Selection {
        candidates,
        best,
        fallback,
    }
}
