//! JSON report adapter implementing ReportPort.
//!
//! Writes the full `BacktestResult` (trades, equity curve, metrics) as pretty
//! JSON, with compounded calendar-month returns alongside.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Datelike;
use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SigtraderError;
use crate::domain::portfolio::EquityPoint;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyReturn {
    pub year: i32,
    pub month: u32,
    pub return_pct: f64,
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    result: &'a BacktestResult,
    monthly_returns: Vec<MonthlyReturn>,
}

impl<'a> Report<'a> {
    fn new(result: &'a BacktestResult) -> Self {
        Self {
            result,
            monthly_returns: compute_monthly_returns(&result.equity_curve),
        }
    }
}

/// Period returns compounded per calendar month of the later sample, in percent.
pub fn compute_monthly_returns(equity_curve: &[EquityPoint]) -> Vec<MonthlyReturn> {
    let mut monthly: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for pair in equity_curve.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let growth = if prev.equity > 0.0 {
            curr.equity / prev.equity
        } else {
            1.0
        };
        let key = (curr.timestamp.year(), curr.timestamp.month());
        *monthly.entry(key).or_insert(1.0) *= growth;
    }

    monthly
        .into_iter()
        .map(|((year, month), growth)| MonthlyReturn {
            year,
            month,
            return_pct: (growth - 1.0) * 100.0,
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }

    fn write_json<T: Serialize>(value: &T, output_path: &Path) -> Result<(), SigtraderError> {
        let json = serde_json::to_string_pretty(value)?;
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(output_path, json)?;
        tracing::info!("wrote report to {}", output_path.display());
        Ok(())
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &Path) -> Result<(), SigtraderError> {
        Self::write_json(&Report::new(result), output_path)
    }

    fn write_comparison(
        &self,
        results: &[BacktestResult],
        output_path: &Path,
    ) -> Result<(), SigtraderError> {
        let reports: Vec<Report<'_>> = results.iter().map(Report::new).collect();
        Self::write_json(&reports, output_path)
    }
}
