//! Configuration reading and validation.
//!
//! Every value is parsed and range-checked up front and turned into an
//! explicit config struct. A key that is present but malformed is an error,
//! never a silent fallback to the default.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::domain::adaptive::AdaptiveConfig;
use crate::domain::backtest::BacktestConfig;
use crate::domain::decision::{DecisionConfig, DecisionThresholds};
use crate::domain::error::SigtraderError;
use crate::domain::execution::IntrabarPolicy;
use crate::domain::ohlcv::Interval;
use crate::domain::regime::{MarketRegime, RegimeConfig};
use crate::domain::strategies;
use crate::ports::config_port::ConfigPort;

pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> SigtraderError {
    SigtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn present(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn require_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, SigtraderError> {
    present(config, section, key).ok_or_else(|| SigtraderError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    })
}

fn read_parsed<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
    expected: &str,
) -> Result<T, SigtraderError> {
    match present(config, section, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| invalid(section, key, format!("expected {expected}, got '{raw}'"))),
    }
}

pub fn read_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, SigtraderError> {
    let value: f64 = read_parsed(config, section, key, default, "a number")?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(section, key, "must be finite"))
    }
}

pub fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, SigtraderError> {
    read_parsed(config, section, key, default, "a non-negative integer")
}

/// Like `read_usize` but rejects zero.
pub fn read_period(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, SigtraderError> {
    match read_usize(config, section, key, default)? {
        0 => Err(invalid(section, key, "must be at least 1")),
        n => Ok(n),
    }
}

pub fn read_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, SigtraderError> {
    match present(config, section, key) {
        None => Ok(default),
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(invalid(section, key, format!("expected a boolean, got '{raw}'"))),
        },
    }
}

/// Symbol and bar interval of the data being tested.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub symbol: Option<String>,
    pub interval: Interval,
}

pub fn data_settings(config: &dyn ConfigPort) -> Result<DataSettings, SigtraderError> {
    let interval = match present(config, "backtest", "interval") {
        None => Interval::Day1,
        Some(raw) => raw
            .parse::<Interval>()
            .map_err(|e| invalid("backtest", "interval", e.to_string()))?,
    };
    Ok(DataSettings {
        symbol: present(config, "backtest", "symbol"),
        interval,
    })
}

pub fn backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, SigtraderError> {
    const S: &str = "backtest";
    let initial_capital = match present(config, S, "initial_capital") {
        Some(_) => read_f64(config, S, "initial_capital", 0.0)?,
        None => {
            return Err(SigtraderError::ConfigMissing {
                section: S.to_string(),
                key: "initial_capital".to_string(),
            });
        }
    };
    let intrabar_policy = match present(config, S, "intrabar_policy") {
        None => IntrabarPolicy::default(),
        Some(raw) => raw
            .parse::<IntrabarPolicy>()
            .map_err(|e| invalid(S, "intrabar_policy", e.to_string()))?,
    };
    let periods_per_year = match present(config, S, "periods_per_year") {
        None => None,
        Some(_) => Some(read_f64(config, S, "periods_per_year", 0.0)?),
    };

    let settings = BacktestConfig {
        initial_capital,
        commission_per_side: read_f64(config, S, "commission_per_side", 0.0)?,
        commission_pct: read_f64(config, S, "commission_pct", 0.0)?,
        position_size: read_f64(config, S, "position_size", 1.0)?,
        allow_shorting: read_bool(config, S, "allow_shorting", true)?,
        close_at_end: read_bool(config, S, "close_at_end", true)?,
        intrabar_policy,
        periods_per_year,
        risk_free_rate: read_f64(config, S, "risk_free_rate", 0.0)?,
    };
    settings.validate().map_err(|err| match err {
        SigtraderError::InvalidInput { field, reason } => invalid(S, &field, reason),
        other => other,
    })?;
    Ok(settings)
}

pub fn regime_config(config: &dyn ConfigPort) -> Result<RegimeConfig, SigtraderError> {
    const S: &str = "regime";
    let defaults = RegimeConfig::default();
    let regime = RegimeConfig {
        adx_period: read_period(config, S, "adx_period", defaults.adx_period)?,
        atr_period: read_period(config, S, "atr_period", defaults.atr_period)?,
        trending_threshold: read_f64(config, S, "trending_threshold", defaults.trending_threshold)?,
        strong_trending_threshold: read_f64(
            config,
            S,
            "strong_trending_threshold",
            defaults.strong_trending_threshold,
        )?,
        high_volatility_pct: read_f64(
            config,
            S,
            "high_volatility_pct",
            defaults.high_volatility_pct,
        )?,
    };
    if !(regime.trending_threshold > 0.0
        && regime.trending_threshold < regime.strong_trending_threshold)
    {
        return Err(invalid(
            S,
            "trending_threshold",
            "need 0 < trending_threshold < strong_trending_threshold",
        ));
    }
    if regime.high_volatility_pct <= 0.0 {
        return Err(invalid(S, "high_volatility_pct", "must be positive"));
    }
    Ok(regime)
}

pub fn adaptive_config(config: &dyn ConfigPort) -> Result<AdaptiveConfig, SigtraderError> {
    const S: &str = "adaptive";
    let defaults = AdaptiveConfig::default();
    let adaptive = AdaptiveConfig {
        lookback: read_period(config, S, "regime_lookback", defaults.lookback)?,
        samples: read_period(config, S, "samples", defaults.samples)?,
        min_confidence: read_f64(config, S, "min_confidence", defaults.min_confidence)?,
    };
    if !(0.0..=1.0).contains(&adaptive.min_confidence) {
        return Err(invalid(S, "min_confidence", "must be within [0, 1]"));
    }
    Ok(adaptive)
}

fn read_weights(
    config: &dyn ConfigPort,
    section: &str,
) -> Result<BTreeMap<String, f64>, SigtraderError> {
    config
        .keys(section)
        .into_iter()
        .map(|source| {
            let weight = read_f64(config, section, &source, 1.0)?;
            if weight < 0.0 {
                return Err(invalid(section, &source, "weight must be non-negative"));
            }
            Ok((source, weight))
        })
        .collect()
}

pub fn decision_config(config: &dyn ConfigPort) -> Result<DecisionConfig, SigtraderError> {
    const S: &str = "decision";
    let defaults = DecisionConfig::default();
    let thresholds = DecisionThresholds::new(
        read_f64(config, S, "strong_threshold", defaults.thresholds.strong)?,
        read_f64(config, S, "medium_threshold", defaults.thresholds.medium)?,
    )?;
    let max_spread = read_f64(config, S, "max_spread", defaults.max_spread)?;
    if max_spread <= 0.0 {
        return Err(invalid(S, "max_spread", "must be positive"));
    }

    let mut regime_weights = BTreeMap::new();
    for regime in MarketRegime::ALL {
        let weights = read_weights(config, &format!("regime.{regime}"))?;
        if !weights.is_empty() {
            regime_weights.insert(regime, weights);
        }
    }

    Ok(DecisionConfig {
        thresholds,
        weights: read_weights(config, "weights")?,
        regime_weights,
        max_spread,
    })
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    data_settings(config)?;
    backtest_config(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    strategies::build_strategy(config)?;
    Ok(())
}

pub fn validate_decision_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    decision_config(config)?;
    regime_config(config)?;
    adaptive_config(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            r#"
[backtest]
symbol = XAUUSD
interval = 1h
initial_capital = 10000.0
commission_per_side = 2.5
commission_pct = 0.01
position_size = 0.5
allow_shorting = false
close_at_end = true
intrabar_policy = take_profit_first
risk_free_rate = 0.04
"#,
        );
        assert!(validate_backtest_config(&config).is_ok());
        let settings = backtest_config(&config).unwrap();
        assert_eq!(settings.position_size, 0.5);
        assert!(!settings.allow_shorting);
        assert_eq!(settings.intrabar_policy, IntrabarPolicy::TakeProfitFirst);
        assert_eq!(settings.periods_per_year, None);

        let data = data_settings(&config).unwrap();
        assert_eq!(data.interval, Interval::Hour1);
        assert_eq!(data.symbol.as_deref(), Some("XAUUSD"));
    }

    #[test]
    fn defaults_apply_when_keys_absent() {
        let config = make_config("[backtest]\ninitial_capital = 500\n");
        let settings = backtest_config(&config).unwrap();
        assert_eq!(settings.commission_per_side, 0.0);
        assert_eq!(settings.position_size, 1.0);
        assert!(settings.allow_shorting);
        assert!(settings.close_at_end);
        assert_eq!(data_settings(&config).unwrap().interval, Interval::Day1);
    }

    #[test]
    fn missing_initial_capital_fails() {
        let config = make_config("[backtest]\ncommission_per_side = 1\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, SigtraderError::ConfigMissing { key, .. } if key == "initial_capital")
        );
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let config = make_config("[backtest]\ninitial_capital = 0\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "initial_capital")
        );
    }

    #[test]
    fn malformed_number_is_not_defaulted() {
        let config = make_config("[backtest]\ninitial_capital = 100\ncommission_per_side = ten\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "commission_per_side")
        );
    }

    #[test]
    fn negative_commission_fails() {
        let config = make_config("[backtest]\ninitial_capital = 100\ncommission_per_side = -5\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "commission_per_side")
        );
    }

    #[test]
    fn position_size_above_one_fails() {
        let config = make_config("[backtest]\ninitial_capital = 100\nposition_size = 1.5\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "position_size"));
    }

    #[test]
    fn risk_free_rate_out_of_range_fails() {
        let config = make_config("[backtest]\ninitial_capital = 100\nrisk_free_rate = 1.5\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "risk_free_rate")
        );
    }

    #[test]
    fn unknown_interval_fails() {
        let config = make_config("[backtest]\ninitial_capital = 100\ninterval = 3 days\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "interval"));
    }

    #[test]
    fn bad_bool_fails() {
        let config = make_config("[backtest]\ninitial_capital = 100\nallow_shorting = maybe\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "allow_shorting"));
    }

    #[test]
    fn bool_spellings_are_accepted() {
        let config = make_config("[backtest]\na = yes\nb = 1\nc = Off\nd = no\n");
        assert!(read_bool(&config, "backtest", "a", false).unwrap());
        assert!(read_bool(&config, "backtest", "b", false).unwrap());
        assert!(!read_bool(&config, "backtest", "c", true).unwrap());
        assert!(!read_bool(&config, "backtest", "d", true).unwrap());
        assert!(read_bool(&config, "backtest", "missing", true).unwrap());
    }

    #[test]
    fn malformed_integer_is_not_defaulted() {
        let config = make_config("[regime]\nadx_period = fourteen\n");
        let err = regime_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "adx_period"));
    }

    #[test]
    fn adaptive_config_defaults_and_bounds() {
        let defaults = adaptive_config(&make_config("[backtest]\n")).unwrap();
        assert_eq!(defaults, AdaptiveConfig::default());

        let custom = make_config("[adaptive]\nregime_lookback = 60\nmin_confidence = 0.4\n");
        let adaptive = adaptive_config(&custom).unwrap();
        assert_eq!(adaptive.lookback, 60);
        assert_eq!(adaptive.min_confidence, 0.4);

        let err = adaptive_config(&make_config("[adaptive]\nmin_confidence = 1.5\n")).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "min_confidence"));
    }

    #[test]
    fn bad_intrabar_policy_fails() {
        let config = make_config("[backtest]\ninitial_capital = 100\nintrabar_policy = worst_case\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "intrabar_policy")
        );
    }

    #[test]
    fn decision_config_reads_weights_and_regimes() {
        let config = make_config(
            r#"
[decision]
strong_threshold = 0.8
medium_threshold = 0.4

[weights]
technical = 1.0
ml = 2.0

[regime.volatile]
technical = 0.25
"#,
        );
        let decision = decision_config(&config).unwrap();
        assert_eq!(decision.thresholds.strong, 0.8);
        assert_eq!(decision.weights.get("ml"), Some(&2.0));
        assert_eq!(
            decision.weights_for(Some(MarketRegime::Volatile)).get("technical"),
            Some(&0.25)
        );
        assert!(validate_decision_config(&config).is_ok());
    }

    #[test]
    fn inverted_decision_thresholds_fail() {
        let config = make_config("[decision]\nstrong_threshold = 0.4\nmedium_threshold = 0.6\n");
        let err = validate_decision_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::InvalidThresholds { .. }));
    }

    #[test]
    fn negative_weight_fails() {
        let config = make_config("[weights]\nml = -1\n");
        let err = decision_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "ml"));
    }

    #[test]
    fn regime_thresholds_must_be_ordered() {
        let config = make_config("[regime]\ntrending_threshold = 50\n");
        let err = regime_config(&config).unwrap_err();
        assert!(
            matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "trending_threshold")
        );
    }

    #[test]
    fn zero_period_fails() {
        let config = make_config("[regime]\nadx_period = 0\n");
        let err = regime_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "adx_period"));
    }

    #[test]
    fn valid_strategy_config_passes() {
        let config = make_config("[strategy]\nname = rsi\nperiod = 10\nstop_loss = 1.5\n");
        assert!(validate_strategy_config(&config).is_ok());
    }

    #[test]
    fn missing_strategy_name_fails() {
        let config = make_config("[strategy]\nperiod = 10\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigMissing { key, .. } if key == "name"));
    }

    #[test]
    fn unknown_strategy_fails() {
        let config = make_config("[strategy]\nname = martingale\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::UnknownStrategy { name } if name == "martingale"));
    }

    #[test]
    fn negative_stop_loss_fails() {
        let config = make_config("[strategy]\nname = rsi\nstop_loss = -2\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "stop_loss"));
    }
}
