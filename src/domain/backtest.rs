//! Backtest engine and event loop.
//!
//! One pass over the bars, at most one open position. Per bar:
//! 1. stop-loss / take-profit against the bar's range,
//! 2. the strategy's exit signal (or end-of-data liquidation),
//! 3. entry if flat and nothing closed on this bar,
//! 4. one equity sample marked at the close.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::error::{SigtraderError, StrategyError};
use super::execution::{CostModel, IntrabarPolicy, calculate_commission, check_price_exits, size_entry};
use super::metrics::{Metrics, MetricsConfig};
use super::ohlcv::{BarSeries, BarWindow, Interval, OhlcvBar};
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{Direction, ExitReason, Position, Trade};
use super::strategy::Strategy;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub commission_per_side: f64,
    pub commission_pct: f64,
    /// Fraction of capital committed per entry, in (0, 1].
    pub position_size: f64,
    pub allow_shorting: bool,
    pub close_at_end: bool,
    pub intrabar_policy: IntrabarPolicy,
    /// Annualisation constant; derived from the series interval when unset.
    pub periods_per_year: Option<f64>,
    pub risk_free_rate: f64,
}

impl BacktestConfig {
    pub fn new(initial_capital: f64, commission_per_side: f64) -> Self {
        Self {
            initial_capital,
            commission_per_side,
            commission_pct: 0.0,
            position_size: 1.0,
            allow_shorting: true,
            close_at_end: true,
            intrabar_policy: IntrabarPolicy::default(),
            periods_per_year: None,
            risk_free_rate: 0.0,
        }
    }

    pub fn costs(&self) -> CostModel {
        CostModel {
            commission_per_side: self.commission_per_side,
            commission_pct: self.commission_pct,
        }
    }

    pub fn validate(&self) -> Result<(), SigtraderError> {
        let invalid = |field: &str, reason: &str| -> Result<(), SigtraderError> {
            Err(SigtraderError::InvalidInput {
                field: field.to_string(),
                reason: reason.to_string(),
            })
        };
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return invalid("initial_capital", "must be positive");
        }
        if !self.commission_per_side.is_finite() || self.commission_per_side < 0.0 {
            return invalid("commission_per_side", "must be non-negative");
        }
        if !self.commission_pct.is_finite() || self.commission_pct < 0.0 {
            return invalid("commission_pct", "must be non-negative");
        }
        if !(self.position_size > 0.0 && self.position_size <= 1.0) {
            return invalid("position_size", "must be in (0, 1]");
        }
        if let Some(periods) = self.periods_per_year {
            if !periods.is_finite() || periods <= 0.0 {
                return invalid("periods_per_year", "must be positive");
            }
        }
        if !(0.0..1.0).contains(&self.risk_free_rate) {
            return invalid("risk_free_rate", "must be in [0, 1)");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub symbol: String,
    pub interval: Interval,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub bar_count: usize,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: Metrics,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.final_capital, |p| p.equity)
    }
}

/// Run with the default settings for a flat per-side commission.
pub fn run(
    series: &BarSeries,
    strategy: &mut dyn Strategy,
    initial_capital: f64,
    commission_per_side: f64,
) -> Result<BacktestResult, SigtraderError> {
    run_backtest(
        series,
        strategy,
        &BacktestConfig::new(initial_capital, commission_per_side),
    )
}

fn strategy_failure(
    strategy: &str,
    index: usize,
    bar: &OhlcvBar,
    source: StrategyError,
) -> SigtraderError {
    SigtraderError::Strategy {
        strategy: strategy.to_string(),
        index,
        timestamp: bar.timestamp,
        source,
    }
}

fn checked_level(level: Option<f64>, name: &str) -> Result<Option<f64>, StrategyError> {
    match level {
        Some(price) if !price.is_finite() || price <= 0.0 => Err(StrategyError::InvalidParameter {
            name: name.to_string(),
            reason: format!("level {price} is not a positive price"),
        }),
        other => Ok(other),
    }
}

fn close_position(
    portfolio: &mut Portfolio,
    costs: &CostModel,
    exit_price: f64,
    bar: &OhlcvBar,
    index: usize,
    reason: ExitReason,
) {
    let Some(notional) = portfolio.position().map(|p| p.size * exit_price) else {
        return;
    };
    let commission = calculate_commission(notional, costs);
    if let Some(trade) = portfolio.close(exit_price, bar.timestamp, index, commission, reason) {
        tracing::debug!(
            "closed {} at {:.4} on bar {} ({}), pnl {:.2}",
            trade.direction,
            trade.exit_price,
            index,
            reason,
            trade.pnl
        );
    }
}

pub fn run_backtest(
    series: &BarSeries,
    strategy: &mut dyn Strategy,
    config: &BacktestConfig,
) -> Result<BacktestResult, SigtraderError> {
    config.validate()?;
    let bars = series.bars();
    let (Some(first), Some(last_bar)) = (bars.first(), bars.last()) else {
        return Err(SigtraderError::InvalidInput {
            field: "bars".into(),
            reason: "series is empty".into(),
        });
    };

    strategy.reset();
    let name = strategy.name().to_string();
    let min_history = strategy.min_history();
    let costs = config.costs();
    let last = bars.len() - 1;
    let mut portfolio = Portfolio::new(config.initial_capital);

    tracing::info!(
        "Starting backtest: {} on {} {} ({} bars, warmup {})",
        name,
        series.symbol(),
        series.interval(),
        bars.len(),
        min_history
    );

    for (i, bar) in bars.iter().enumerate() {
        let Some(window) = BarWindow::new(bars, i) else {
            break;
        };
        let liquidate_here = config.close_at_end && i == last;
        let mut closed_this_bar = false;

        if let Some((reason, price)) = portfolio
            .position()
            .and_then(|p| check_price_exits(p, bar, config.intrabar_policy))
        {
            close_position(&mut portfolio, &costs, price, bar, i, reason);
            closed_this_bar = true;
        }

        if let Some((entry_price, direction)) =
            portfolio.position().map(|p| (p.entry_price, p.direction))
        {
            let exit = strategy
                .should_exit(&window, entry_price, direction)
                .map_err(|e| strategy_failure(&name, i, bar, e))?;
            if exit {
                close_position(&mut portfolio, &costs, bar.close, bar, i, ExitReason::Signal);
                closed_this_bar = true;
            } else if liquidate_here {
                close_position(&mut portfolio, &costs, bar.close, bar, i, ExitReason::EndOfData);
                closed_this_bar = true;
            }
        }

        if !portfolio.has_position() && !closed_this_bar && !liquidate_here {
            let signal = strategy
                .should_enter(&window)
                .map_err(|e| strategy_failure(&name, i, bar, e))?;
            match signal {
                Some(_) if window.len() < min_history => {
                    tracing::warn!(
                        "{} signalled entry on bar {} with {} bars of history (needs {}); skipped",
                        name,
                        i,
                        window.len(),
                        min_history
                    );
                }
                Some(Direction::Short) if !config.allow_shorting => {
                    tracing::debug!("short entry on bar {} ignored, shorting disabled", i);
                }
                Some(direction) => {
                    let entry_price = bar.close;
                    let stop_loss = strategy
                        .stop_loss(entry_price, direction)
                        .and_then(|l| checked_level(l, "stop_loss"))
                        .map_err(|e| strategy_failure(&name, i, bar, e))?;
                    let take_profit = strategy
                        .take_profit(entry_price, direction)
                        .and_then(|l| checked_level(l, "take_profit"))
                        .map_err(|e| strategy_failure(&name, i, bar, e))?;

                    match size_entry(portfolio.capital, config.position_size, entry_price, &costs) {
                        Some(sizing) => {
                            portfolio.open(Position {
                                direction,
                                entry_price,
                                entry_time: bar.timestamp,
                                entry_index: i,
                                size: sizing.size,
                                stop_loss,
                                take_profit,
                                entry_commission: sizing.commission,
                            })?;
                            tracing::debug!(
                                "opened {} {:.6} units at {:.4} on bar {}",
                                direction,
                                sizing.size,
                                entry_price,
                                i
                            );
                        }
                        None => {
                            tracing::warn!(
                                "insufficient capital {:.2} to enter on bar {}",
                                portfolio.capital,
                                i
                            );
                        }
                    }
                }
                None => {}
            }
        }

        portfolio.record_equity(bar.timestamp, bar.close);
    }

    let (final_capital, trades, equity_curve) = portfolio.into_parts();
    let metrics = Metrics::compute(
        &trades,
        &equity_curve,
        config.initial_capital,
        &MetricsConfig {
            periods_per_year: config
                .periods_per_year
                .unwrap_or_else(|| series.interval().periods_per_year()),
            risk_free_rate: config.risk_free_rate,
        },
    );

    tracing::info!(
        "Finished backtest: {} trades, final capital {:.2}",
        trades.len(),
        final_capital
    );

    Ok(BacktestResult {
        strategy_name: name,
        symbol: series.symbol().to_string(),
        interval: series.interval(),
        start: first.timestamp,
        end: last_bar.timestamp,
        bar_count: bars.len(),
        initial_capital: config.initial_capital,
        final_capital,
        trades,
        equity_curve,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn make_bars(rows: &[(f64, f64, f64)]) -> BarSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = rows
            .iter()
            .enumerate()
            .map(|(i, &(high, low, close))| OhlcvBar {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high,
                low,
                close,
                volume: None,
            })
            .collect();
        BarSeries::new("TEST", Interval::Day1, bars).unwrap()
    }

    fn flat(n: usize, price: f64) -> BarSeries {
        make_bars(&vec![(price, price, price); n])
    }

    /// Enters `direction` whenever flat; exits on listed bar indices.
    struct Scripted {
        direction: Direction,
        exit_on: Vec<usize>,
        stops: Option<(f64, f64)>,
        min_history: usize,
        enter_calls: Vec<usize>,
    }

    impl Scripted {
        fn new(direction: Direction, exit_on: &[usize]) -> Self {
            Self {
                direction,
                exit_on: exit_on.to_vec(),
                stops: None,
                min_history: 1,
                enter_calls: Vec::new(),
            }
        }
    }

    impl Strategy for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn min_history(&self) -> usize {
            self.min_history
        }

        fn should_enter(
            &mut self,
            window: &BarWindow<'_>,
        ) -> Result<Option<Direction>, StrategyError> {
            self.enter_calls.push(window.index());
            Ok(Some(self.direction))
        }

        fn should_exit(
            &mut self,
            window: &BarWindow<'_>,
            _entry_price: f64,
            _direction: Direction,
        ) -> Result<bool, StrategyError> {
            Ok(self.exit_on.contains(&window.index()))
        }

        fn stop_loss(&self, entry: f64, _d: Direction) -> Result<Option<f64>, StrategyError> {
            Ok(self.stops.map(|(sl, _)| entry - sl))
        }

        fn take_profit(&self, entry: f64, _d: Direction) -> Result<Option<f64>, StrategyError> {
            Ok(self.stops.map(|(_, tp)| entry + tp))
        }
    }

    #[test]
    fn config_validation() {
        assert!(BacktestConfig::new(1000.0, 0.0).validate().is_ok());
        assert!(BacktestConfig::new(0.0, 0.0).validate().is_err());
        assert!(BacktestConfig::new(1000.0, -1.0).validate().is_err());
        let bad_size = BacktestConfig {
            position_size: 1.5,
            ..BacktestConfig::new(1000.0, 0.0)
        };
        assert!(bad_size.validate().is_err());
        let bad_rate = BacktestConfig {
            risk_free_rate: 1.0,
            ..BacktestConfig::new(1000.0, 0.0)
        };
        assert!(bad_rate.validate().is_err());
    }

    #[test]
    fn empty_series_is_rejected() {
        let series = BarSeries::new("TEST", Interval::Day1, Vec::new()).unwrap();
        let mut strategy = Scripted::new(Direction::Long, &[]);
        assert!(run(&series, &mut strategy, 1000.0, 0.0).is_err());
    }

    #[test]
    fn exit_signal_closes_at_close() {
        let series = flat(5, 100.0);
        let mut strategy = Scripted::new(Direction::Long, &[3]);
        let result = run(&series, &mut strategy, 1000.0, 1.0).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_index, 0);
        assert_eq!(trade.exit_index, 3);
        assert_eq!(trade.exit_reason, ExitReason::Signal);
        assert!((trade.pnl + 2.0).abs() < 1e-9);
        assert_eq!(result.equity_curve.len(), 5);
        assert!((result.final_capital - 998.0).abs() < 1e-9);
    }

    #[test]
    fn no_same_bar_reentry() {
        let series = flat(5, 100.0);
        let mut strategy = Scripted::new(Direction::Long, &[2]);
        run(&series, &mut strategy, 1000.0, 0.0).unwrap();
        // entered on 0, closed on 2, re-entered on 3
        assert_eq!(strategy.enter_calls, vec![0, 3]);
    }

    #[test]
    fn end_of_data_liquidation() {
        let series = flat(4, 100.0);
        let mut strategy = Scripted::new(Direction::Long, &[]);
        let result = run(&series, &mut strategy, 1000.0, 0.0).unwrap();
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::EndOfData);
        assert_eq!(result.trades[0].exit_index, 3);
        assert!((result.final_equity() - result.final_capital).abs() < 1e-9);
    }

    #[test]
    fn open_position_kept_without_close_at_end() {
        let series = make_bars(&[
            (100.0, 100.0, 100.0),
            (110.0, 110.0, 110.0),
        ]);
        let mut strategy = Scripted::new(Direction::Long, &[]);
        let config = BacktestConfig {
            close_at_end: false,
            ..BacktestConfig::new(1000.0, 0.0)
        };
        let result = run_backtest(&series, &mut strategy, &config).unwrap();
        assert!(result.trades.is_empty());
        assert!((result.final_equity() - 1100.0).abs() < 1e-9);
        assert!((result.final_capital - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn stop_loss_takes_priority_on_wide_bar() {
        let series = make_bars(&[
            (100.0, 100.0, 100.0),
            (120.0, 80.0, 100.0),
            (100.0, 100.0, 100.0),
        ]);
        let mut strategy = Scripted::new(Direction::Long, &[]);
        strategy.stops = Some((5.0, 10.0));
        let result = run(&series, &mut strategy, 1000.0, 0.0).unwrap();
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert!((trade.exit_price - 95.0).abs() < 1e-9);
    }

    #[test]
    fn take_profit_first_policy() {
        let series = make_bars(&[
            (100.0, 100.0, 100.0),
            (120.0, 80.0, 100.0),
            (100.0, 100.0, 100.0),
        ]);
        let mut strategy = Scripted::new(Direction::Long, &[]);
        strategy.stops = Some((5.0, 10.0));
        let config = BacktestConfig {
            intrabar_policy: IntrabarPolicy::TakeProfitFirst,
            ..BacktestConfig::new(1000.0, 0.0)
        };
        let result = run_backtest(&series, &mut strategy, &config).unwrap();
        assert_eq!(result.trades[0].exit_reason, ExitReason::TakeProfit);
        assert!((result.trades[0].exit_price - 110.0).abs() < 1e-9);
    }

    #[test]
    fn shorts_ignored_when_disabled() {
        let series = flat(5, 100.0);
        let mut strategy = Scripted::new(Direction::Short, &[]);
        let config = BacktestConfig {
            allow_shorting: false,
            ..BacktestConfig::new(1000.0, 0.0)
        };
        let result = run_backtest(&series, &mut strategy, &config).unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.equity_curve.len(), 5);
    }

    #[test]
    fn short_profits_on_decline() {
        let series = make_bars(&[
            (100.0, 100.0, 100.0),
            (90.0, 90.0, 90.0),
            (90.0, 90.0, 90.0),
        ]);
        let mut strategy = Scripted::new(Direction::Short, &[1]);
        let result = run(&series, &mut strategy, 1000.0, 0.0).unwrap();
        assert!((result.trades[0].pnl - 100.0).abs() < 1e-9);
    }

    #[test]
    fn insufficient_history_skips_entry() {
        let series = flat(5, 100.0);
        let mut strategy = Scripted::new(Direction::Long, &[]);
        strategy.min_history = 3;
        let result = run(&series, &mut strategy, 1000.0, 0.0).unwrap();
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].entry_index, 2);
    }

    #[test]
    fn invalid_stop_level_fails_run() {
        let series = flat(3, 100.0);
        let mut strategy = Scripted::new(Direction::Long, &[]);
        strategy.stops = Some((200.0, 10.0));
        let err = run(&series, &mut strategy, 1000.0, 0.0).unwrap_err();
        assert!(matches!(err, SigtraderError::Strategy { index: 0, .. }));
    }

    #[test]
    fn position_size_fraction_limits_exposure() {
        let series = make_bars(&[
            (100.0, 100.0, 100.0),
            (110.0, 110.0, 110.0),
            (110.0, 110.0, 110.0),
        ]);
        let mut strategy = Scripted::new(Direction::Long, &[1]);
        let config = BacktestConfig {
            position_size: 0.5,
            ..BacktestConfig::new(1000.0, 0.0)
        };
        let result = run_backtest(&series, &mut strategy, &config).unwrap();
        assert!((result.trades[0].size - 5.0).abs() < 1e-9);
        assert!((result.trades[0].pnl - 50.0).abs() < 1e-9);
    }
}
