//! Bar data access port trait.

use crate::domain::error::SigtraderError;
use crate::domain::ohlcv::{BarSeries, Interval};

pub trait DataPort {
    /// Load the validated bar series for `symbol`.
    fn fetch_bars(&self, symbol: &str, interval: Interval) -> Result<BarSeries, SigtraderError>;

    /// Symbols this source can serve, sorted.
    fn list_symbols(&self) -> Result<Vec<String>, SigtraderError>;
}
