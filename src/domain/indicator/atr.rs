//! Average True Range with Wilder smoothing.
//!
//! TR[0] = high - low; TR[i] = true_range(prev_close).
//! Seed is the mean of the first n TRs, then ATR = (prev * (n-1) + TR) / n.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub(crate) fn true_ranges(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

pub fn calculate_atr(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Atr(period));
    }

    let tr_values = true_ranges(bars);
    let mut results: Vec<IndicatorPoint> = Vec::with_capacity(bars.len());
    let mut atr = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i + 1 < period {
            results.push(IndicatorPoint::warmup(
                bar.timestamp,
                IndicatorValue::Simple(0.0),
            ));
            continue;
        }
        atr = if i + 1 == period {
            tr_values[..=i].iter().sum::<f64>() / period as f64
        } else {
            (atr * (period - 1) as f64 + tr_values[i]) / period as f64
        };
        results.push(IndicatorPoint::simple(bar.timestamp, atr));
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values: results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_hlc_bars;

    #[test]
    fn atr_warmup() {
        let bars = make_hlc_bars(&[(110.0, 90.0, 100.0); 5]);
        let series = calculate_atr(&bars, 3);
        assert_eq!(series.values.len(), 5);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[4].valid);
    }

    #[test]
    fn atr_seed_is_average() {
        let bars = make_hlc_bars(&[
            (110.0, 100.0, 105.0),
            (115.0, 105.0, 110.0),
            (120.0, 110.0, 115.0),
        ]);
        let series = calculate_atr(&bars, 3);
        // TRs: 10, max(10, 10, 0)=10, max(10, 10, 0)=10
        let v = series.latest_simple().unwrap();
        assert!((v - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn atr_wilder_smoothing() {
        let bars = make_hlc_bars(&[
            (102.0, 98.0, 100.0),
            (102.0, 98.0, 100.0),
            (110.0, 100.0, 108.0),
        ]);
        let series = calculate_atr(&bars, 2);
        // seed = (4 + 4) / 2 = 4, next TR = max(10, 10, 0) = 10
        let v = series.latest_simple().unwrap();
        assert!((v - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn atr_short_input_is_all_warmup() {
        let bars = make_hlc_bars(&[(110.0, 90.0, 100.0); 2]);
        let series = calculate_atr(&bars, 14);
        assert_eq!(series.values.len(), 2);
        assert!(series.latest().is_none());
    }
}
