//! Market structure classification over the last 20 candles.

use crate::domain::{Candle, MarketStructure};

const WINDOW: usize = 20;
const TRENDING_PAIRS: usize = 12;
const RANGE_FACTOR: f64 = 3.0;

pub fn classify_structure(candles: &[Candle]) -> MarketStructure {
    let n = candles.len();
    if n < WINDOW {
        return MarketStructure::Choppy;
    }
    let window = &candles[n - WINDOW..];
    let (prior, last) = window.split_at(WINDOW - 1);
    let last = &last[0];

    let prior_high = prior.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let prior_low = prior.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    if last.close > prior_high {
        return MarketStructure::BreakoutUp;
    }
    if last.close < prior_low {
        return MarketStructure::BreakoutDown;
    }

    let (mut higher, mut lower) = (0usize, 0usize);
    for pair in window.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if b.high > a.high && b.low > a.low {
            higher += 1;
        } else if b.high < a.high && b.low < a.low {
            lower += 1;
        }
    }
    if higher >= TRENDING_PAIRS {
        return MarketStructure::TrendingUp;
    }
    if lower >= TRENDING_PAIRS {
        return MarketStructure::TrendingDown;
    }

    let high = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let mean_range = window.iter().map(Candle::range).sum::<f64>() / WINDOW as f64;
    if high - low < RANGE_FACTOR * mean_range {
        return MarketStructure::Ranging;
    }

    MarketStructure::Choppy
}
