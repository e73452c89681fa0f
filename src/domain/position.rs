//! Open position and closed trade records.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

use super::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("LONG"),
            Direction::Short => f.write_str("SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::Signal => "signal",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::EndOfData => "end_of_data",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub entry_index: usize,
    pub size: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub entry_commission: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    pub fn is_short(&self) -> bool {
        self.direction == Direction::Short
    }

    pub fn notional(&self) -> f64 {
        self.size * self.entry_price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.direction.sign() * self.size * (price - self.entry_price)
    }

    /// Whether the bar's range reached the stop-loss level.
    pub fn stop_loss_hit(&self, bar: &OhlcvBar) -> bool {
        match (self.stop_loss, self.direction) {
            (Some(sl), Direction::Long) => bar.low <= sl,
            (Some(sl), Direction::Short) => bar.high >= sl,
            (None, _) => false,
        }
    }

    /// Whether the bar's range reached the take-profit level.
    pub fn take_profit_hit(&self, bar: &OhlcvBar) -> bool {
        match (self.take_profit, self.direction) {
            (Some(tp), Direction::Long) => bar.high >= tp,
            (Some(tp), Direction::Short) => bar.low <= tp,
            (None, _) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_index: usize,
    pub exit_index: usize,
    pub size: f64,
    /// Entry plus exit commission.
    pub commission: f64,
    pub gross_pnl: f64,
    /// Gross P&L minus both commissions.
    pub pnl: f64,
    /// Net P&L as a percentage of entry notional.
    pub pnl_pct: f64,
    pub exit_reason: ExitReason,
}

impl Trade {
    /// Build the record for `position` closed at `exit_price`.
    pub fn from_position(
        position: &Position,
        exit_price: f64,
        exit_time: NaiveDateTime,
        exit_index: usize,
        exit_commission: f64,
        exit_reason: ExitReason,
    ) -> Self {
        let gross_pnl = position.unrealized_pnl(exit_price);
        let commission = position.entry_commission + exit_commission;
        let pnl = gross_pnl - commission;
        let notional = position.notional();
        let pnl_pct = if notional > 0.0 {
            pnl / notional * 100.0
        } else {
            0.0
        };
        Self {
            direction: position.direction,
            entry_price: position.entry_price,
            exit_price,
            entry_time: position.entry_time,
            exit_time,
            entry_index: position.entry_index,
            exit_index,
            size: position.size,
            commission,
            gross_pnl,
            pnl,
            pnl_pct,
            exit_reason,
        }
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }

    /// Holding period in bars.
    pub fn duration_bars(&self) -> usize {
        self.exit_index - self.entry_index
    }
}
