//! Price channel: highest high and lowest low of the n bars *before* each bar.
//!
//! The current bar is excluded so a close above `upper` is a breakout.
//! Warmup: first n bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_channel(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Channel(period));
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i < period {
                return IndicatorPoint::warmup(
                    bar.timestamp,
                    IndicatorValue::Channel {
                        upper: 0.0,
                        lower: 0.0,
                    },
                );
            }
            let lookback = &bars[i - period..i];
            let upper = lookback.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let lower = lookback.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Channel { upper, lower },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Channel(period),
        values,
    }
}
