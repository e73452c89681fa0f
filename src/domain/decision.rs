//! Aggregation of independent signal sources into one trading decision.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::error::SigtraderError;
use super::regime::MarketRegime;

/// Output of one signal source: a signal in [-1, 1] and a confidence in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentOutput {
    pub source: String,
    pub signal: f64,
    pub confidence: f64,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl AgentOutput {
    pub fn new(source: impl Into<String>, signal: f64, confidence: f64) -> Result<Self, SigtraderError> {
        if !signal.is_finite() || !(-1.0..=1.0).contains(&signal) {
            return Err(SigtraderError::InvalidInput {
                field: "signal".into(),
                reason: format!("must be within [-1, 1], got {signal}"),
            });
        }
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(SigtraderError::InvalidInput {
                field: "confidence".into(),
                reason: format!("must be within [0, 1], got {confidence}"),
            });
        }
        Ok(Self {
            source: source.into(),
            signal,
            confidence,
            metadata: BTreeMap::new(),
        })
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingDecision {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl TradingDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingDecision::StrongBuy => "STRONG_BUY",
            TradingDecision::Buy => "BUY",
            TradingDecision::Hold => "HOLD",
            TradingDecision::Sell => "SELL",
            TradingDecision::StrongSell => "STRONG_SELL",
        }
    }
}

impl fmt::Display for TradingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecisionThresholds {
    pub strong: f64,
    pub medium: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            strong: 0.7,
            medium: 0.5,
        }
    }
}

impl DecisionThresholds {
    /// Requires `0 <= medium < strong <= 1`.
    pub fn new(strong: f64, medium: f64) -> Result<Self, SigtraderError> {
        let thresholds = Self { strong, medium };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), SigtraderError> {
        let ordered = 0.0 <= self.medium && self.medium < self.strong && self.strong <= 1.0;
        if ordered {
            Ok(())
        } else {
            Err(SigtraderError::InvalidThresholds {
                medium: self.medium,
                strong: self.strong,
            })
        }
    }

    /// First match wins: strong buy, buy, strong sell, sell, hold.
    pub fn classify(&self, signal: f64) -> TradingDecision {
        if signal > self.strong {
            TradingDecision::StrongBuy
        } else if signal > self.medium {
            TradingDecision::Buy
        } else if signal < -self.strong {
            TradingDecision::StrongSell
        } else if signal < -self.medium {
            TradingDecision::Sell
        } else {
            TradingDecision::Hold
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionConfig {
    pub thresholds: DecisionThresholds,
    /// Source name to weight. Sources not listed weigh 1.0.
    pub weights: BTreeMap<String, f64>,
    /// Per-regime overrides, layered over `weights`.
    pub regime_weights: BTreeMap<MarketRegime, BTreeMap<String, f64>>,
    /// Weighted signal spread at which confidence drops to zero.
    pub max_spread: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            thresholds: DecisionThresholds::default(),
            weights: BTreeMap::new(),
            regime_weights: BTreeMap::new(),
            max_spread: 1.0,
        }
    }
}

impl DecisionConfig {
    pub fn validate(&self) -> Result<(), SigtraderError> {
        self.thresholds.validate()?;
        if !(self.max_spread.is_finite() && self.max_spread > 0.0) {
            return Err(SigtraderError::InvalidInput {
                field: "max_spread".into(),
                reason: format!("must be positive, got {}", self.max_spread),
            });
        }
        let all_weights = self
            .weights
            .iter()
            .chain(self.regime_weights.values().flat_map(|m| m.iter()));
        for (source, &weight) in all_weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(SigtraderError::InvalidInput {
                    field: format!("weight for '{source}'"),
                    reason: format!("must be a non-negative number, got {weight}"),
                });
            }
        }
        Ok(())
    }

    /// Weight map in effect for `regime`: base weights overridden by that regime's entries.
    pub fn weights_for(&self, regime: Option<MarketRegime>) -> BTreeMap<String, f64> {
        let mut weights = self.weights.clone();
        if let Some(overrides) = regime.and_then(|r| self.regime_weights.get(&r)) {
            weights.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
        }
        weights
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub source: String,
    pub signal: f64,
    pub confidence: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub decision: TradingDecision,
    pub signal: f64,
    pub confidence: f64,
    pub contributions: Vec<Contribution>,
    pub reasoning: String,
    pub regime: Option<MarketRegime>,
}

#[derive(Debug, Clone)]
pub struct DecisionAggregator {
    config: DecisionConfig,
}

impl DecisionAggregator {
    pub fn new(config: DecisionConfig) -> Result<Self, SigtraderError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    pub fn aggregate(&self, outputs: &[AgentOutput]) -> Decision {
        self.aggregate_in_regime(outputs, None)
    }

    pub fn aggregate_in_regime(
        &self,
        outputs: &[AgentOutput],
        regime: Option<MarketRegime>,
    ) -> Decision {
        let weights = self.config.weights_for(regime);
        let contributions: Vec<Contribution> = outputs
            .iter()
            .filter(|o| o.confidence > 0.0)
            .map(|o| Contribution {
                source: o.source.clone(),
                signal: o.signal,
                confidence: o.confidence,
                weight: weights.get(&o.source).copied().unwrap_or(1.0),
            })
            .filter(|c| c.weight > 0.0)
            .collect();

        if contributions.is_empty() {
            tracing::warn!("no usable signal sources among {} outputs", outputs.len());
            return Decision {
                decision: TradingDecision::Hold,
                signal: 0.0,
                confidence: 0.0,
                reasoning: "Decision: HOLD. No usable signal sources.".to_string(),
                contributions,
                regime,
            };
        }

        let total_weight: f64 = contributions.iter().map(|c| c.weight).sum();
        let weighted_mean = |f: &dyn Fn(&Contribution) -> f64| {
            contributions.iter().map(|c| c.weight * f(c)).sum::<f64>() / total_weight
        };
        let signal = weighted_mean(&|c: &Contribution| c.signal).clamp(-1.0, 1.0);
        let mean_confidence = weighted_mean(&|c: &Contribution| c.confidence);
        let spread = weighted_mean(&|c: &Contribution| (c.signal - signal).powi(2)).sqrt();
        let agreement = 1.0 - (spread / self.config.max_spread).clamp(0.0, 1.0);
        let confidence = (mean_confidence * agreement).clamp(0.0, 1.0);

        let decision = self.config.thresholds.classify(signal);
        let reasoning = reasoning(decision, signal, confidence, &contributions, regime);
        tracing::info!(
            "decision {} (signal={:.2}, confidence={:.2}, sources={})",
            decision,
            signal,
            confidence,
            contributions.len()
        );

        Decision {
            decision,
            signal,
            confidence,
            contributions,
            reasoning,
            regime,
        }
    }
}

fn reasoning(
    decision: TradingDecision,
    signal: f64,
    confidence: f64,
    contributions: &[Contribution],
    regime: Option<MarketRegime>,
) -> String {
    let strength = match signal.abs() {
        s if s > 0.6 => "strong",
        s if s > 0.3 => "moderate",
        _ => "weak",
    };
    let direction = if signal > 0.0 {
        "bullish"
    } else if signal < 0.0 {
        "bearish"
    } else {
        "neutral"
    };
    let level = if confidence > 0.7 {
        "high"
    } else if confidence > 0.5 {
        "medium"
    } else {
        "low"
    };

    let mut parts = vec![format!(
        "Decision: {decision} based on {} source(s).",
        contributions.len()
    )];
    if let Some(regime) = regime {
        parts.push(format!("Market regime is {regime}."));
    }
    parts.push(format!("Overall signal is {strength} {direction} ({signal:.2})."));
    parts.push(format!("Confidence is {level} ({confidence:.2})."));
    for c in contributions {
        let stance = if c.signal > 0.2 {
            "buy"
        } else if c.signal < -0.2 {
            "sell"
        } else {
            "neutral"
        };
        parts.push(format!(
            "- {} suggests {stance} (signal={:.2}, confidence={:.2}, weight={:.2})",
            c.source, c.signal, c.confidence, c.weight
        ));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn output(source: &str, signal: f64, confidence: f64) -> AgentOutput {
        AgentOutput::new(source, signal, confidence).unwrap()
    }

    fn aggregator() -> DecisionAggregator {
        DecisionAggregator::new(DecisionConfig::default()).unwrap()
    }

    #[test]
    fn opposing_sources_hold_with_penalised_confidence() {
        let decision = aggregator().aggregate(&[output("a", 0.8, 0.9), output("b", -0.8, 0.9)]);
        assert_eq!(decision.decision, TradingDecision::Hold);
        assert!(decision.signal.abs() < 1e-12);
        assert_relative_eq!(decision.confidence, 0.18, epsilon = 1e-12);
        assert!(decision.confidence < 0.9);
    }

    #[test]
    fn agreeing_sources_keep_confidence() {
        let decision = aggregator().aggregate(&[output("a", 0.8, 0.9), output("b", 0.8, 0.7)]);
        assert_eq!(decision.decision, TradingDecision::StrongBuy);
        assert_relative_eq!(decision.signal, 0.8, epsilon = 1e-12);
        assert_relative_eq!(decision.confidence, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn threshold_bands() {
        let t = DecisionThresholds::default();
        assert_eq!(t.classify(0.75), TradingDecision::StrongBuy);
        assert_eq!(t.classify(0.6), TradingDecision::Buy);
        assert_eq!(t.classify(0.5), TradingDecision::Hold);
        assert_eq!(t.classify(-0.6), TradingDecision::Sell);
        assert_eq!(t.classify(-0.71), TradingDecision::StrongSell);
        assert_eq!(t.classify(0.0), TradingDecision::Hold);
    }

    #[test]
    fn invalid_threshold_ordering_is_rejected() {
        let err = DecisionThresholds::new(0.5, 0.7).unwrap_err();
        assert!(matches!(err, SigtraderError::InvalidThresholds { .. }));
        assert!(DecisionThresholds::new(1.2, 0.5).is_err());
        assert!(DecisionThresholds::new(0.7, -0.1).is_err());
        assert!(DecisionThresholds::new(0.7, 0.0).is_ok());
    }

    #[test]
    fn weights_shift_the_combined_signal() {
        let mut config = DecisionConfig::default();
        config.weights.insert("ml".into(), 3.0);
        let agg = DecisionAggregator::new(config).unwrap();
        let decision = agg.aggregate(&[output("technical", -0.4, 0.8), output("ml", 0.8, 0.8)]);
        // (3 * 0.8 - 0.4) / 4
        assert_relative_eq!(decision.signal, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn regime_weights_override_base_weights() {
        let mut config = DecisionConfig::default();
        config.weights.insert("technical".into(), 2.0);
        config.regime_weights.insert(
            MarketRegime::Volatile,
            BTreeMap::from([("technical".to_string(), 0.0)]),
        );
        let agg = DecisionAggregator::new(config).unwrap();
        let outputs = [output("technical", 0.9, 0.9), output("ml", -0.3, 0.6)];

        let calm = agg.aggregate_in_regime(&outputs, Some(MarketRegime::Ranging));
        assert_relative_eq!(calm.signal, 0.5, epsilon = 1e-12);

        let volatile = agg.aggregate_in_regime(&outputs, Some(MarketRegime::Volatile));
        assert_eq!(volatile.contributions.len(), 1);
        assert_relative_eq!(volatile.signal, -0.3, epsilon = 1e-12);
        assert_eq!(volatile.regime, Some(MarketRegime::Volatile));
    }

    #[test]
    fn zero_confidence_sources_are_ignored() {
        let decision = aggregator().aggregate(&[output("a", 1.0, 0.0)]);
        assert_eq!(decision.decision, TradingDecision::Hold);
        assert_eq!(decision.signal, 0.0);
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.contributions.is_empty());
    }

    #[test]
    fn empty_input_holds() {
        let decision = aggregator().aggregate(&[]);
        assert_eq!(decision.decision, TradingDecision::Hold);
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn negative_weight_is_rejected() {
        let mut config = DecisionConfig::default();
        config.weights.insert("a".into(), -1.0);
        assert!(DecisionAggregator::new(config).is_err());
    }

    #[test]
    fn output_bounds_are_checked() {
        assert!(AgentOutput::new("a", 1.5, 0.5).is_err());
        assert!(AgentOutput::new("a", 0.5, -0.1).is_err());
        assert!(AgentOutput::new("a", f64::NAN, 0.5).is_err());
    }

    #[test]
    fn reasoning_names_each_source() {
        let decision = aggregator().aggregate(&[output("technical", 0.6, 0.8), output("ml", 0.7, 0.9)]);
        assert!(decision.reasoning.starts_with("Decision: BUY"));
        assert!(decision.reasoning.contains("technical suggests buy"));
        assert!(decision.reasoning.contains("ml suggests buy"));
    }
}
