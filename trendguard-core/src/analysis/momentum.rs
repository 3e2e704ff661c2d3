//! Momentum strength on a 0 (strongly bearish) to 100 (strongly bullish) scale.

use crate::domain::Direction;
use crate::indicators::{value_back, IndicatorSeries};

const RSI_DELTA_LOOKBACK: usize = 5;

/// Above this the momentum reads as up, below `MOMENTUM_DOWN` as down.
pub const MOMENTUM_UP: f64 = 55.0;
pub const MOMENTUM_DOWN: f64 = 45.0;

/// Components of the raw momentum score, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MomentumBreakdown {
    pub rsi_level: f64,
    pub rsi_delta: f64,
    pub macd_sign: f64,
    pub macd_delta: f64,
    pub roc: f64,
}

impl MomentumBreakdown {
    /// Raw score in [-100, 100].
    pub fn raw(&self) -> f64 {
        (self.rsi_level + self.rsi_delta + self.macd_sign + self.macd_delta + self.roc)
            .clamp(-100.0, 100.0)
    }

    /// Strength in [0, 100].
    pub fn strength(&self) -> f64 {
        50.0 + self.raw() / 2.0
    }
}

pub fn momentum_breakdown(ind: &IndicatorSeries) -> MomentumBreakdown {
    let rsi = value_back(&ind.rsi, 0).unwrap_or(50.0);
    let rsi_delta = value_back(&ind.rsi, RSI_DELTA_LOOKBACK)
        .map(|prev| (2.0 * (rsi - prev)).clamp(-15.0, 15.0))
        .unwrap_or(0.0);

    // Ignore float noise around zero on flat markets.
    let tol = 1e-9 * value_back(&ind.close, 0).map_or(1.0, |c| c.abs().max(1.0));
    let hist = value_back(&ind.macd_hist, 0);
    let macd_sign = match hist {
        Some(h) if h > tol => 15.0,
        Some(h) if h < -tol => -15.0,
        _ => 0.0,
    };
    let macd_delta = match (hist, value_back(&ind.macd_hist, 1)) {
        (Some(h), Some(prev)) if h - prev > tol => 10.0,
        (Some(h), Some(prev)) if prev - h > tol => -10.0,
        _ => 0.0,
    };

    let roc = value_back(&ind.roc, 0).map_or(0.0, |r| (5.0 * r).clamp(-20.0, 20.0));

    MomentumBreakdown {
        rsi_level: 0.8 * (rsi - 50.0),
        rsi_delta,
        macd_sign,
        macd_delta,
        roc,
    }
}

pub fn momentum_strength(ind: &IndicatorSeries) -> f64 {
    momentum_breakdown(ind).strength()
}

pub fn momentum_direction(strength: f64) -> Direction {
    if strength > MOMENTUM_UP {
        Direction::Bullish
    } else if strength < MOMENTUM_DOWN {
        Direction::Bearish
    } else {
        Direction::Neutral
    }
}
