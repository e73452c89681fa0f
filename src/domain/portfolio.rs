//! Single-position account state and equity tracking.
//!
//! `capital` is realized cash: entry commission is debited on open, and
//! gross P&L less exit commission is credited on close. Mark-to-market
//! equity is `capital + unrealized P&L`.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::error::SigtraderError;
use super::position::{ExitReason, Position, Trade};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub capital: f64,
    pub initial_capital: f64,
    position: Option<Position>,
    pub closed_trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            capital: initial_capital,
            initial_capital,
            position: None,
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Take on `position`, debiting its entry commission.
    pub fn open(&mut self, position: Position) -> Result<(), SigtraderError> {
        if self.position.is_some() {
            return Err(SigtraderError::PositionAlreadyOpen);
        }
        self.capital -= position.entry_commission;
        self.position = Some(position);
        Ok(())
    }

    /// Close the open position, if any, and return the resulting trade.
    pub fn close(
        &mut self,
        exit_price: f64,
        exit_time: NaiveDateTime,
        exit_index: usize,
        exit_commission: f64,
        reason: ExitReason,
    ) -> Option<&Trade> {
        let position = self.position.take()?;
        let trade = Trade::from_position(
            &position,
            exit_price,
            exit_time,
            exit_index,
            exit_commission,
            reason,
        );
        self.capital += trade.gross_pnl - exit_commission;
        self.closed_trades.push(trade);
        self.closed_trades.last()
    }

    /// Capital plus the open position's unrealized P&L at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.capital
            + self
                .position
                .as_ref()
                .map_or(0.0, |p| p.unrealized_pnl(price))
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime, price: f64) {
        let equity = self.equity(price);
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    pub fn into_parts(self) -> (f64, Vec<Trade>, Vec<EquityPoint>) {
        (self.capital, self.closed_trades, self.equity_curve)
    }
}
