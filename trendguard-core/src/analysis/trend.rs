//! EMA point scoring and trend quality.

use crate::domain::{Candle, Direction};
use crate::indicators::{value_back, IndicatorSeries};

/// Outcome of EMA point scoring for one timeframe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendAssessment {
    pub direction: Direction,
    /// 50..=100, magnitude in `direction`. 50 when neutral.
    pub strength: f64,
    pub bull_points: u32,
    pub bear_points: u32,
}

impl TrendAssessment {
    pub fn score(&self) -> u32 {
        match self.direction {
            Direction::Bullish => self.bull_points,
            Direction::Bearish => self.bear_points,
            Direction::Neutral => self.bull_points.max(self.bear_points),
        }
    }
}

const SLOPE_LOOKBACK: usize = 5;
const MIN_POINTS: u32 = 6;

fn award(bull: &mut u32, bear: &mut u32, a: Option<f64>, b: Option<f64>, points: u32) {
    if let (Some(a), Some(b)) = (a, b) {
        let eps = 1e-9 * b.abs().max(1.0);
        if a > b + eps {
            *bull += points;
        } else if a < b - eps {
            *bear += points;
        }
    }
}

/// Score price against the four trend EMAs (0..=18 points per side).
///
/// EMA50 stands in for EMA200 until the long EMA has warmed up.
pub fn score_trend(ind: &IndicatorSeries) -> TrendAssessment {
    let price = value_back(&ind.close, 0);
    let ema9 = value_back(&ind.ema9, 0);
    let ema21 = value_back(&ind.ema21, 0);
    let ema50 = value_back(&ind.ema50, 0);
    let ema200 = value_back(&ind.ema200, 0).or(ema50);

    let (mut bull, mut bear) = (0u32, 0u32);
    award(&mut bull, &mut bear, price, ema9, 2);
    award(&mut bull, &mut bear, price, ema21, 2);
    award(&mut bull, &mut bear, price, ema50, 3);
    award(&mut bull, &mut bear, price, ema200, 3);
    award(&mut bull, &mut bear, ema9, ema21, 2);
    award(&mut bull, &mut bear, ema21, ema50, 3);
    award(&mut bull, &mut bear, ema9, value_back(&ind.ema9, SLOPE_LOOKBACK), 1);
    award(&mut bull, &mut bear, ema21, value_back(&ind.ema21, SLOPE_LOOKBACK), 2);

    let (direction, points) = if bull >= MIN_POINTS && bull > bear {
        (Direction::Bullish, bull)
    } else if bear >= MIN_POINTS && bear > bull {
        (Direction::Bearish, bear)
    } else {
        (Direction::Neutral, 0)
    };

    TrendAssessment {
        direction,
        strength: bucket_strength(points),
        bull_points: bull,
        bear_points: bear,
    }
}

/// Map winning points to strength: 6..8 → 55..65, 9..11 → 70..80, 12..18 → 85..100.
fn bucket_strength(points: u32) -> f64 {
    let p = points as f64;
    match points {
        12.. => (85.0 + (p - 12.0) * 2.5).min(100.0),
        9..=11 => 70.0 + (p - 9.0) * 5.0,
        6..=8 => 55.0 + (p - 6.0) * 5.0,
        _ => 50.0,
    }
}

/// Inputs to trend quality that come from outside the EMA scoring.
#[derive(Debug, Clone, Copy)]
pub struct QualityInputs {
    pub trend: Direction,
    pub momentum: Direction,
    pub atr_pct: f64,
}

/// Trend quality 0..=100.
pub fn trend_quality(candles: &[Candle], inputs: QualityInputs) -> f64 {
    let mut quality: f64 = 50.0;

    match inputs.trend {
        Direction::Neutral => quality -= 10.0,
        trend if trend == inputs.momentum => quality += 20.0,
        _ => {}
    }

    quality += 3.0 * consistent_closes(candles, inputs.trend, 9) as f64;
    quality -= 3.0 * close_reversals(candles, 10) as f64;

    if inputs.atr_pct > 0.0 && inputs.atr_pct < 1.0 {
        quality += 10.0;
    } else if inputs.atr_pct > 3.0 {
        quality -= 10.0;
    }

    quality.clamp(0.0, 100.0)
}

/// How many of the last `window` candles closed in `trend`'s direction.
fn consistent_closes(candles: &[Candle], trend: Direction, window: usize) -> usize {
    if !trend.is_directional() || candles.len() < 2 {
        return 0;
    }
    let start = candles.len().saturating_sub(window + 1);
    candles[start..]
        .windows(2)
        .filter(|w| match trend {
            Direction::Bullish => w[1].close > w[0].close,
            Direction::Bearish => w[1].close < w[0].close,
            Direction::Neutral => false,
        })
        .count()
}

/// Close-to-close direction flips within the last `window` candles.
fn close_reversals(candles: &[Candle], window: usize) -> usize {
    let start = candles.len().saturating_sub(window);
    let signs: Vec<f64> = candles[start..]
        .windows(2)
        .map(|w| (w[1].close - w[0].close).signum())
        .filter(|s| *s != 0.0)
        .collect();
    signs.windows(2).filter(|s| s[0] != s[1]).count()
}
