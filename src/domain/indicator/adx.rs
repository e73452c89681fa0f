//! Average Directional Index with +DI / -DI.
//!
//! +DM = up move when it exceeds the down move and is positive, else 0;
//! -DM is symmetric. TR, +DM and -DM are Wilder-summed over n bars,
//! DI = 100 * DM / TR, DX = 100 * |+DI - -DI| / (+DI + -DI).
//! ADX is the mean of the first n DX values, then Wilder-smoothed.
//!
//! Warmup: first 2n - 1 bars are invalid.

use crate::domain::indicator::atr::true_ranges;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

fn directional_index(dm: f64, tr: f64) -> f64 {
    if tr > 0.0 { 100.0 * dm / tr } else { 0.0 }
}

fn dx(plus_di: f64, minus_di: f64) -> f64 {
    let sum = plus_di + minus_di;
    if sum > 0.0 {
        100.0 * (plus_di - minus_di).abs() / sum
    } else {
        0.0
    }
}

pub fn calculate_adx(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let blank = IndicatorValue::Adx {
        adx: 0.0,
        plus_di: 0.0,
        minus_di: 0.0,
    };
    let mut values: Vec<IndicatorPoint> = bars
        .iter()
        .map(|b| IndicatorPoint::warmup(b.timestamp, blank))
        .collect();

    if period == 0 || bars.len() < 2 * period {
        return IndicatorSeries {
            indicator_type: IndicatorType::Adx(period),
            values,
        };
    }

    let tr = true_ranges(bars);
    let mut plus_dm = vec![0.0; bars.len()];
    let mut minus_dm = vec![0.0; bars.len()];
    for i in 1..bars.len() {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    let n = period as f64;
    let mut sm_tr: f64 = tr[1..=period].iter().sum();
    let mut sm_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut sm_minus: f64 = minus_dm[1..=period].iter().sum();

    let mut dx_values = Vec::with_capacity(bars.len());
    let mut adx = 0.0;

    for i in period..bars.len() {
        if i > period {
            sm_tr = sm_tr - sm_tr / n + tr[i];
            sm_plus = sm_plus - sm_plus / n + plus_dm[i];
            sm_minus = sm_minus - sm_minus / n + minus_dm[i];
        }
        let plus_di = directional_index(sm_plus, sm_tr);
        let minus_di = directional_index(sm_minus, sm_tr);
        dx_values.push(dx(plus_di, minus_di));

        if dx_values.len() < period {
            values[i].value = IndicatorValue::Adx {
                adx: 0.0,
                plus_di,
                minus_di,
            };
            continue;
        }
        adx = if dx_values.len() == period {
            dx_values.iter().sum::<f64>() / n
        } else {
            (adx * (n - 1.0) + dx_values[dx_values.len() - 1]) / n
        };
        values[i] = IndicatorPoint {
            timestamp: bars[i].timestamp,
            valid: true,
            value: IndicatorValue::Adx {
                adx,
                plus_di,
                minus_di,
            },
        };
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Adx(period),
        values,
    }
}
