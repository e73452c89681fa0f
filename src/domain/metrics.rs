//! Performance metrics derived from a trade list and an equity curve.
//!
//! Values that are undefined for the input (no trades, no losing trades,
//! zero return variance) are `None` rather than NaN or infinity.

use serde::Serialize;

use super::portfolio::EquityPoint;
use super::position::Trade;

/// Variance below this is treated as zero.
const VARIANCE_EPSILON: f64 = 1e-18;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsConfig {
    pub periods_per_year: f64,
    /// Annual risk-free rate as a fraction.
    pub risk_free_rate: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 252.0,
            risk_free_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_return: f64,
    pub total_return_pct: f64,
    pub annualized_return: Option<f64>,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    pub win_rate: Option<f64>,
    pub avg_profit: Option<f64>,
    /// Mean loss magnitude (positive).
    pub avg_loss: Option<f64>,
    pub largest_win: Option<f64>,
    /// Largest loss magnitude (positive).
    pub largest_loss: Option<f64>,
    pub profit_factor: Option<f64>,
    pub total_commission: f64,
    pub max_drawdown: f64,
    /// Relative to the running peak, in percent.
    pub max_drawdown_pct: f64,
    /// Longest stretch of bars spent below a prior peak.
    pub max_drawdown_duration: usize,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    /// Mean holding period in bars.
    pub avg_trade_duration: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drawdown {
    pub max: f64,
    pub max_pct: f64,
    pub max_duration: usize,
}

impl Metrics {
    pub fn compute(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        config: &MetricsConfig,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = final_equity - initial_capital;
        let total_return_pct = if initial_capital > 0.0 {
            total_return / initial_capital * 100.0
        } else {
            0.0
        };

        let annualized_return = annualize(
            final_equity,
            initial_capital,
            equity_curve.len(),
            config.periods_per_year,
        );

        let drawdown = compute_drawdown(equity_curve);
        let returns = period_returns(equity_curve);
        let per_period_rf = config.risk_free_rate / config.periods_per_year;
        let sharpe_ratio = sharpe(&returns, per_period_rf, config.periods_per_year);
        let sortino_ratio = sortino(&returns, per_period_rf, config.periods_per_year);

        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut breakeven_trades = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        let mut largest_win: Option<f64> = None;
        let mut largest_loss: Option<f64> = None;
        let mut total_commission = 0.0_f64;
        let mut total_duration = 0usize;

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                winning_trades += 1;
                gross_profit += pnl;
                largest_win = Some(largest_win.map_or(pnl, |w| w.max(pnl)));
            } else if pnl < 0.0 {
                losing_trades += 1;
                gross_loss += pnl.abs();
                largest_loss = Some(largest_loss.map_or(pnl.abs(), |l| l.max(pnl.abs())));
            } else {
                breakeven_trades += 1;
            }
            total_commission += trade.commission;
            total_duration += trade.duration_bars();
        }

        let total_trades = trades.len();
        let win_rate = (total_trades > 0).then(|| winning_trades as f64 / total_trades as f64);
        let avg_profit = (winning_trades > 0).then(|| gross_profit / winning_trades as f64);
        let avg_loss = (losing_trades > 0).then(|| gross_loss / losing_trades as f64);
        let profit_factor = (gross_loss > 0.0).then(|| gross_profit / gross_loss);
        let avg_trade_duration =
            (total_trades > 0).then(|| total_duration as f64 / total_trades as f64);

        Metrics {
            total_return,
            total_return_pct,
            annualized_return,
            total_trades,
            winning_trades,
            losing_trades,
            breakeven_trades,
            win_rate,
            avg_profit,
            avg_loss,
            largest_win,
            largest_loss,
            profit_factor,
            total_commission,
            max_drawdown: drawdown.max,
            max_drawdown_pct: drawdown.max_pct,
            max_drawdown_duration: drawdown.max_duration,
            sharpe_ratio,
            sortino_ratio,
            avg_trade_duration,
        }
    }
}

fn annualize(
    final_equity: f64,
    initial_capital: f64,
    samples: usize,
    periods_per_year: f64,
) -> Option<f64> {
    if samples < 2 || initial_capital <= 0.0 || periods_per_year <= 0.0 {
        return None;
    }
    let growth = final_equity / initial_capital;
    if growth <= 0.0 {
        return None;
    }
    let years = (samples - 1) as f64 / periods_per_year;
    Some((growth.powf(1.0 / years) - 1.0) * 100.0)
}

/// Single pass with a running peak.
pub fn compute_drawdown(equity_curve: &[EquityPoint]) -> Drawdown {
    let mut result = Drawdown {
        max: 0.0,
        max_pct: 0.0,
        max_duration: 0,
    };
    let Some(first) = equity_curve.first() else {
        return result;
    };

    let mut peak = first.equity;
    let mut underwater = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            underwater = 0;
            continue;
        }
        let dd = peak - point.equity;
        if dd > result.max {
            result.max = dd;
        }
        if peak > 0.0 {
            result.max_pct = result.max_pct.max(dd / peak * 100.0);
        }
        underwater += 1;
        result.max_duration = result.max_duration.max(underwater);
    }

    result
}

/// Simple per-period returns; periods starting from non-positive equity are skipped.
pub fn period_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter(|w| w[0].equity > 0.0)
        .map(|w| (w[1].equity - w[0].equity) / w[0].equity)
        .collect()
}

/// Mean and sample variance (n - 1), or `None` below two values.
fn sample_stats(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, variance))
}

fn sharpe(returns: &[f64], per_period_rf: f64, periods_per_year: f64) -> Option<f64> {
    let (mean, variance) = sample_stats(returns)?;
    if variance <= VARIANCE_EPSILON {
        return None;
    }
    Some((mean - per_period_rf) / variance.sqrt() * periods_per_year.sqrt())
}

/// Denominator is the sample std dev of the returns below the per-period risk-free rate.
fn sortino(returns: &[f64], per_period_rf: f64, periods_per_year: f64) -> Option<f64> {
    let (mean, total_variance) = sample_stats(returns)?;
    if total_variance <= VARIANCE_EPSILON {
        return None;
    }
    let downside: Vec<f64> = returns
        .iter()
        .copied()
        .filter(|&r| r < per_period_rf)
        .collect();
    let (_, downside_variance) = sample_stats(&downside)?;
    if downside_variance <= VARIANCE_EPSILON {
        return None;
    }
    Some((mean - per_period_rf) / downside_variance.sqrt() * periods_per_year.sqrt())
}
