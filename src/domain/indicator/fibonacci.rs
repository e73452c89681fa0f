//! Fibonacci retracement levels between a swing high and a swing low.
//!
//! Level price = high - (high - low) * ratio.

use serde::Serialize;

pub const RATIOS: [f64; 7] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

/// Share of the swing range within which a price counts as sitting on a level.
const LEVEL_TOLERANCE: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FibonacciLevel {
    pub ratio: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FibonacciLevels {
    pub high: f64,
    pub low: f64,
    pub levels: Vec<FibonacciLevel>,
}

/// Where a price sits relative to its closest retracement level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FibonacciProximity {
    pub level: FibonacciLevel,
    pub distance: f64,
    /// 1.0 on the level, falling linearly to 0.0 at the tolerance edge.
    pub strength: f64,
    pub at_level: bool,
}

/// Retracement levels for a swing. `high` and `low` may be given in either order.
pub fn fibonacci_levels(high: f64, low: f64) -> FibonacciLevels {
    let (high, low) = if high >= low { (high, low) } else { (low, high) };
    let range = high - low;
    let levels = RATIOS
        .iter()
        .map(|&ratio| FibonacciLevel {
            ratio,
            price: high - range * ratio,
        })
        .collect();
    FibonacciLevels { high, low, levels }
}

impl FibonacciLevels {
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Closest level to `price`.
    pub fn nearest(&self, price: f64) -> Option<FibonacciProximity> {
        let level = self.levels.iter().copied().min_by(|a, b| {
            (a.price - price)
                .abs()
                .total_cmp(&(b.price - price).abs())
        })?;
        let distance = (level.price - price).abs();
        let tolerance = self.range() * LEVEL_TOLERANCE;
        let strength = if tolerance > 0.0 {
            (1.0 - distance / tolerance).clamp(0.0, 1.0)
        } else if distance == 0.0 {
            1.0
        } else {
            0.0
        };
        Some(FibonacciProximity {
            level,
            distance,
            strength,
            at_level: strength > 0.0,
        })
    }
}
