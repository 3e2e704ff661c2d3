//! Price reference levels: floor pivots, VWAP and volume ratio.

use serde::{Deserialize, Serialize};

use crate::domain::Candle;

/// Classic floor pivots from one completed candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotLevels {
    pub pivot: f64,
    pub r1: f64,
    pub r2: f64,
    pub s1: f64,
    pub s2: f64,
}

impl PivotLevels {
    pub fn from_candle(c: &Candle) -> Self {
        let pivot = (c.high + c.low + c.close) / 3.0;
        let range = c.high - c.low;
        Self {
            pivot,
            r1: 2.0 * pivot - c.low,
            r2: pivot + range,
            s1: 2.0 * pivot - c.high,
            s2: pivot - range,
        }
    }

    /// Pivots of the last completed candle, i.e. the one before the latest.
    pub fn from_previous(candles: &[Candle]) -> Option<Self> {
        let n = candles.len();
        if n < 2 {
            return None;
        }
        Some(Self::from_candle(&candles[n - 2]))
    }

    /// All five levels, pivot first.
    pub fn levels(&self) -> [f64; 5] {
        [self.pivot, self.r1, self.r2, self.s1, self.s2]
    }
}

/// Volume-weighted average of typical price over the whole series.
pub fn vwap(candles: &[Candle]) -> Option<f64> {
    let (pv, vol) = candles
        .iter()
        .filter(|c| c.volume.is_finite() && c.volume > 0.0)
        .fold((0.0, 0.0), |(pv, vol), c| {
            (pv + c.typical_price() * c.volume, vol + c.volume)
        });
    (vol > 0.0).then(|| pv / vol)
}

/// Latest volume divided by the mean of the `period` volumes before it.
pub fn volume_ratio(candles: &[Candle], period: usize) -> Option<f64> {
    let n = candles.len();
    if period == 0 || n < period + 1 {
        return None;
    }
    let prior = &candles[n - 1 - period..n - 1];
    let avg = prior.iter().map(|c| c.volume).sum::<f64>() / period as f64;
    (avg > 0.0).then(|| candles[n - 1].volume / avg)
}
