//! Result reporting port trait.

use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SigtraderError;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_path: &Path) -> Result<(), SigtraderError>;

    /// Several runs over the same data, one report. Defaults to the first result.
    fn write_comparison(
        &self,
        results: &[BacktestResult],
        output_path: &Path,
    ) -> Result<(), SigtraderError> {
        match results.first() {
            Some(result) => self.write(result, output_path),
            None => Ok(()),
        }
    }
}
