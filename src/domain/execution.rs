//! Fill simulation: commissions, position sizing and intrabar stop/target checks.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::error::SigtraderError;
use super::ohlcv::OhlcvBar;
use super::position::{ExitReason, Position};

/// Which level fills first when one bar's range spans both stop-loss and take-profit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntrabarPolicy {
    #[default]
    StopLossFirst,
    TakeProfitFirst,
}

impl IntrabarPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntrabarPolicy::StopLossFirst => "stop_loss_first",
            IntrabarPolicy::TakeProfitFirst => "take_profit_first",
        }
    }
}

impl fmt::Display for IntrabarPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntrabarPolicy {
    type Err = SigtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stop_loss_first" => Ok(IntrabarPolicy::StopLossFirst),
            "take_profit_first" => Ok(IntrabarPolicy::TakeProfitFirst),
            other => Err(SigtraderError::InvalidInput {
                field: "intrabar_policy".into(),
                reason: format!("expected stop_loss_first or take_profit_first, got '{other}'"),
            }),
        }
    }
}

/// Per-side trading costs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostModel {
    /// Flat fee per side.
    pub commission_per_side: f64,
    /// Percentage of notional per side.
    pub commission_pct: f64,
}

/// Commission for one side: flat fee + (notional * pct / 100).
pub fn calculate_commission(notional: f64, costs: &CostModel) -> f64 {
    costs.commission_per_side + notional * costs.commission_pct / 100.0
}

/// Size and entry commission for a new position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntrySizing {
    pub size: f64,
    pub commission: f64,
}

/// Size a position so that `notional = (capital - commission) * fraction`.
///
/// Returns `None` when nothing is left to invest after costs.
pub fn size_entry(
    capital: f64,
    fraction: f64,
    price: f64,
    costs: &CostModel,
) -> Option<EntrySizing> {
    let investable = capital - costs.commission_per_side;
    if investable <= 0.0 || price <= 0.0 || fraction <= 0.0 {
        return None;
    }
    let pct = costs.commission_pct / 100.0;
    let notional = investable * fraction / (1.0 + pct * fraction);
    Some(EntrySizing {
        size: notional / price,
        commission: calculate_commission(notional, costs),
    })
}

/// Stop-loss / take-profit trigger for `bar`, filled at the level price.
pub fn check_price_exits(
    position: &Position,
    bar: &OhlcvBar,
    policy: IntrabarPolicy,
) -> Option<(ExitReason, f64)> {
    let stop = position
        .stop_loss
        .filter(|_| position.stop_loss_hit(bar))
        .map(|price| (ExitReason::StopLoss, price));
    let target = position
        .take_profit
        .filter(|_| position.take_profit_hit(bar))
        .map(|price| (ExitReason::TakeProfit, price));

    match policy {
        IntrabarPolicy::StopLossFirst => stop.or(target),
        IntrabarPolicy::TakeProfitFirst => target.or(stop),
    }
}
