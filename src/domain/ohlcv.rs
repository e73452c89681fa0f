//! OHLCV bars, validated bar series and the prefix view handed to strategies.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::error::SigtraderError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OhlcvBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

impl OhlcvBar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// Whether `price` lies inside this bar's [low, high] range.
    pub fn spans(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }
}

/// Bar interval of a series. Only used for reporting and annualisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Min1,
    Min5,
    Min15,
    Min30,
    Hour1,
    Hour4,
    Day1,
    Week1,
}

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const TRADING_HOURS_PER_DAY: f64 = 24.0;

impl Interval {
    /// Number of bars of this interval in one trading year.
    pub fn periods_per_year(&self) -> f64 {
        let hours = TRADING_DAYS_PER_YEAR * TRADING_HOURS_PER_DAY;
        match self {
            Interval::Min1 => hours * 60.0,
            Interval::Min5 => hours * 12.0,
            Interval::Min15 => hours * 4.0,
            Interval::Min30 => hours * 2.0,
            Interval::Hour1 => hours,
            Interval::Hour4 => hours / 4.0,
            Interval::Day1 => TRADING_DAYS_PER_YEAR,
            Interval::Week1 => 52.0,
        }
    }
}

impl FromStr for Interval {
    type Err = SigtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1min" | "1m" => Ok(Interval::Min1),
            "5min" | "5m" => Ok(Interval::Min5),
            "15min" | "15m" => Ok(Interval::Min15),
            "30min" | "30m" => Ok(Interval::Min30),
            "1h" | "60min" => Ok(Interval::Hour1),
            "4h" => Ok(Interval::Hour4),
            "1day" | "1d" | "daily" => Ok(Interval::Day1),
            "1week" | "1w" | "weekly" => Ok(Interval::Week1),
            other => Err(SigtraderError::InvalidInput {
                field: "interval".into(),
                reason: format!("unknown interval '{other}'"),
            }),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Interval::Min1 => "1min",
            Interval::Min5 => "5min",
            Interval::Min15 => "15min",
            Interval::Min30 => "30min",
            Interval::Hour1 => "1h",
            Interval::Hour4 => "4h",
            Interval::Day1 => "1day",
            Interval::Week1 => "1week",
        };
        f.write_str(s)
    }
}

impl Serialize for Interval {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Check that bars are strictly increasing in time and carry sane prices.
pub fn validate_bars(bars: &[OhlcvBar]) -> Result<(), SigtraderError> {
    for (index, bar) in bars.iter().enumerate() {
        let prices = [bar.open, bar.high, bar.low, bar.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(SigtraderError::InvalidBar {
                index,
                reason: "prices must be finite and positive".into(),
            });
        }
        if bar.high < bar.low {
            return Err(SigtraderError::InvalidBar {
                index,
                reason: format!("high {} is below low {}", bar.high, bar.low),
            });
        }
        if let Some(volume) = bar.volume {
            if !volume.is_finite() || volume < 0.0 {
                return Err(SigtraderError::InvalidBar {
                    index,
                    reason: "volume must be finite and non-negative".into(),
                });
            }
        }
        if index > 0 {
            let previous = bars[index - 1].timestamp;
            if bar.timestamp == previous {
                return Err(SigtraderError::DuplicateTimestamp {
                    index,
                    timestamp: bar.timestamp,
                });
            }
            if bar.timestamp < previous {
                return Err(SigtraderError::UnsortedBars {
                    index,
                    previous,
                    current: bar.timestamp,
                });
            }
        }
    }
    Ok(())
}

/// An immutable, chronologically validated bar sequence for one symbol.
#[derive(Debug, Clone)]
pub struct BarSeries {
    symbol: String,
    interval: Interval,
    bars: Vec<OhlcvBar>,
}

impl BarSeries {
    pub fn new(
        symbol: impl Into<String>,
        interval: Interval,
        bars: Vec<OhlcvBar>,
    ) -> Result<Self, SigtraderError> {
        validate_bars(&bars)?;
        Ok(Self {
            symbol: symbol.into(),
            interval,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Prefix view ending at `index` (inclusive), or `None` past the end.
    pub fn window(&self, index: usize) -> Option<BarWindow<'_>> {
        BarWindow::new(&self.bars, index)
    }

    /// A new series holding only the first `len` bars.
    pub fn truncated(&self, len: usize) -> BarSeries {
        BarSeries {
            symbol: self.symbol.clone(),
            interval: self.interval,
            bars: self.bars[..len.min(self.bars.len())].to_vec(),
        }
    }
}

/// Read-only view of the bars up to and including the current one.
///
/// The slice is cut at construction, so nothing after `index` is reachable.
#[derive(Debug, Clone, Copy)]
pub struct BarWindow<'a> {
    bars: &'a [OhlcvBar],
}

impl<'a> BarWindow<'a> {
    pub fn new(bars: &'a [OhlcvBar], index: usize) -> Option<Self> {
        if index < bars.len() {
            Some(Self {
                bars: &bars[..=index],
            })
        } else {
            None
        }
    }

    /// Index of the current bar in the full sequence.
    pub fn index(&self) -> usize {
        self.bars.len() - 1
    }

    /// Number of bars visible (index + 1).
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn bars(&self) -> &'a [OhlcvBar] {
        self.bars
    }

    pub fn current(&self) -> &'a OhlcvBar {
        &self.bars[self.bars.len() - 1]
    }

    /// The window as it looked one bar earlier.
    pub fn previous(&self) -> Option<BarWindow<'a>> {
        if self.bars.len() > 1 {
            Some(BarWindow {
                bars: &self.bars[..self.bars.len() - 1],
            })
        } else {
            None
        }
    }

    /// The last `n` bars of the window (fewer if the window is shorter).
    pub fn tail(&self, n: usize) -> &'a [OhlcvBar] {
        let start = self.bars.len().saturating_sub(n);
        &self.bars[start..]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn sample_bar() -> OhlcvBar {
        OhlcvBar {
            timestamp: ts(15, 0),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: Some(50_000.0),
        }
    }

    fn bar_at(day: u32, close: f64) -> OhlcvBar {
        OhlcvBar {
            timestamp: ts(day, 0),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: None,
        }
    }

    #[test]
    fn typical_price() {
        let bar = sample_bar();
        let expected = (110.0 + 90.0 + 105.0) / 3.0;
        assert!((bar.typical_price() - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_hl_dominates() {
        let bar = sample_bar();
        assert!((bar.true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bar = sample_bar();
        // high-low=20, |110-70|=40, |90-70|=20 → 40
        assert!((bar.true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_down() {
        let bar = sample_bar();
        assert!((bar.true_range(130.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn spans_is_inclusive() {
        let bar = sample_bar();
        assert!(bar.spans(90.0));
        assert!(bar.spans(110.0));
        assert!(!bar.spans(89.99));
    }

    #[test]
    fn series_accepts_sorted_bars() {
        let series = BarSeries::new(
            "XAU/USD",
            Interval::Day1,
            vec![bar_at(1, 10.0), bar_at(2, 11.0), bar_at(3, 12.0)],
        )
        .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.symbol(), "XAU/USD");
    }

    #[test]
    fn series_rejects_unsorted_bars() {
        let err = BarSeries::new(
            "XAU/USD",
            Interval::Day1,
            vec![bar_at(2, 10.0), bar_at(1, 11.0)],
        )
        .unwrap_err();
        assert!(matches!(err, SigtraderError::UnsortedBars { index: 1, .. }));
    }

    #[test]
    fn series_rejects_duplicate_timestamps() {
        let err = BarSeries::new(
            "XAU/USD",
            Interval::Day1,
            vec![bar_at(1, 10.0), bar_at(2, 11.0), bar_at(2, 12.0)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SigtraderError::DuplicateTimestamp { index: 2, .. }
        ));
    }

    #[test]
    fn series_rejects_non_positive_price() {
        let mut bad = bar_at(1, 10.0);
        bad.low = 0.0;
        let err = BarSeries::new("XAU/USD", Interval::Day1, vec![bad]).unwrap_err();
        assert!(matches!(err, SigtraderError::InvalidBar { index: 0, .. }));
    }

    #[test]
    fn series_rejects_inverted_range() {
        let mut bad = bar_at(1, 10.0);
        bad.high = 8.0;
        let err = BarSeries::new("XAU/USD", Interval::Day1, vec![bad]).unwrap_err();
        assert!(matches!(err, SigtraderError::InvalidBar { .. }));
    }

    #[test]
    fn window_exposes_only_prefix() {
        let bars = vec![bar_at(1, 10.0), bar_at(2, 11.0), bar_at(3, 12.0)];
        let window = BarWindow::new(&bars, 1).unwrap();
        assert_eq!(window.index(), 1);
        assert_eq!(window.len(), 2);
        assert_eq!(window.current().close, 11.0);
        assert_eq!(window.bars().len(), 2);
        assert_eq!(window.closes(), vec![10.0, 11.0]);
    }

    #[test]
    fn window_out_of_range_is_none() {
        let bars = vec![bar_at(1, 10.0)];
        assert!(BarWindow::new(&bars, 1).is_none());
    }

    #[test]
    fn window_previous_steps_back() {
        let bars = vec![bar_at(1, 10.0), bar_at(2, 11.0), bar_at(3, 12.0)];
        let window = BarWindow::new(&bars, 2).unwrap();
        let prev = window.previous().unwrap();
        assert_eq!(prev.index(), 1);
        assert_eq!(prev.current().close, 11.0);
        assert!(BarWindow::new(&bars, 0).unwrap().previous().is_none());
    }

    #[test]
    fn window_tail_clamps() {
        let bars = vec![bar_at(1, 10.0), bar_at(2, 11.0), bar_at(3, 12.0)];
        let window = BarWindow::new(&bars, 2).unwrap();
        assert_eq!(window.tail(2).len(), 2);
        assert_eq!(window.tail(10).len(), 3);
    }

    #[test]
    fn interval_parse_and_annualisation() {
        assert_eq!("1h".parse::<Interval>().unwrap(), Interval::Hour1);
        assert_eq!("1day".parse::<Interval>().unwrap(), Interval::Day1);
        assert!((Interval::Day1.periods_per_year() - 252.0).abs() < f64::EPSILON);
        assert!((Interval::Hour1.periods_per_year() - 6048.0).abs() < f64::EPSILON);
        assert!("3h".parse::<Interval>().is_err());
    }

    #[test]
    fn interval_display_round_trips() {
        for interval in [Interval::Min15, Interval::Hour4, Interval::Week1] {
            assert_eq!(interval.to_string().parse::<Interval>().unwrap(), interval);
        }
    }

    #[test]
    fn truncated_keeps_prefix() {
        let series = BarSeries::new(
            "XAU/USD",
            Interval::Day1,
            vec![bar_at(1, 10.0), bar_at(2, 11.0), bar_at(3, 12.0)],
        )
        .unwrap();
        let short = series.truncated(2);
        assert_eq!(short.len(), 2);
        assert_eq!(short.bars()[1].close, 11.0);
    }
}
