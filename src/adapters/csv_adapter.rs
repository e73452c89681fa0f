//! CSV file data adapter.
//!
//! The base path is either a single CSV file or a directory holding one
//! `<SYMBOL>.csv` per symbol. Files need a header row naming `timestamp` (or
//! `date`), `open`, `high`, `low` and `close`; a `volume` column is optional
//! and empty volume cells read as missing.

use crate::domain::error::SigtraderError;
use crate::domain::ohlcv::{BarSeries, Interval, OhlcvBar};
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

pub struct CsvAdapter {
    base_path: PathBuf,
}

/// Positions of the named columns in the header row.
struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl CsvAdapter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        if self.base_path.is_dir() {
            self.base_path.join(format!("{symbol}.csv"))
        } else {
            self.base_path.clone()
        }
    }

    /// Parse bars from CSV text; `source_name` labels errors.
    pub fn parse_bars(content: &str, source_name: &str) -> Result<Vec<OhlcvBar>, SigtraderError> {
        let data_err = |reason: String| SigtraderError::Data {
            source_name: source_name.to_string(),
            reason,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| data_err(format!("CSV header error: {e}")))?
            .clone();
        let columns = Columns::locate(&headers).map_err(data_err)?;

        let mut bars = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            // Header is line 1.
            let line = row + 2;
            let record = result.map_err(|e| data_err(format!("line {line}: {e}")))?;
            let bar = columns
                .read(&record)
                .map_err(|reason| data_err(format!("line {line}: {reason}")))?;
            bars.push(bar);
        }
        Ok(bars)
    }
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, String> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
        };
        let require = |name: &str| find(name).ok_or_else(|| format!("missing {name} column"));

        let timestamp = find("timestamp")
            .or_else(|| find("date"))
            .ok_or_else(|| "missing timestamp column".to_string())?;
        Ok(Self {
            timestamp,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: find("volume"),
        })
    }

    fn read(&self, record: &csv::StringRecord) -> Result<OhlcvBar, String> {
        let field = |index: usize, name: &str| {
            record
                .get(index)
                .ok_or_else(|| format!("missing {name} value"))
        };
        let price = |index: usize, name: &str| -> Result<f64, String> {
            field(index, name)?
                .parse::<f64>()
                .map_err(|e| format!("invalid {name} value: {e}"))
        };

        let volume = match self.volume.and_then(|i| record.get(i)) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<f64>()
                    .map_err(|e| format!("invalid volume value: {e}"))?,
            ),
        };

        Ok(OhlcvBar {
            timestamp: parse_timestamp(field(self.timestamp, "timestamp")?)?,
            open: price(self.open, "open")?,
            high: price(self.high, "high")?,
            low: price(self.low, "low")?,
            close: price(self.close, "close")?,
            volume,
        })
    }
}

/// `YYYY-MM-DD` (midnight) or `YYYY-MM-DD HH:MM[:SS]`, space or `T` separated.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    if let Some(ts) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("invalid timestamp '{raw}'"))
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, symbol: &str, interval: Interval) -> Result<BarSeries, SigtraderError> {
        let path = self.csv_path(symbol);
        let source_name = path.display().to_string();
        let content = fs::read_to_string(&path).map_err(|e| SigtraderError::Data {
            source_name: source_name.clone(),
            reason: format!("failed to read: {e}"),
        })?;

        let bars = Self::parse_bars(&content, &source_name)?;
        tracing::debug!("loaded {} bars for {symbol} from {source_name}", bars.len());
        BarSeries::new(symbol, interval, bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, SigtraderError> {
        if !self.base_path.is_dir() {
            return Ok(file_stem(&self.base_path).into_iter().collect());
        }

        let entries = fs::read_dir(&self.base_path).map_err(|e| SigtraderError::Data {
            source_name: self.base_path.display().to_string(),
            reason: format!("failed to read directory: {e}"),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                symbols.extend(file_stem(&path));
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

/// File name without extension, used as the default symbol for a single file.
pub fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}
