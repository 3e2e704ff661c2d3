//! Support/resistance candidates nearest the current price.

use crate::domain::Candle;
use crate::indicators::IndicatorSeries;

const PERIODS: [usize; 3] = [20, 50, 100];
const SWING_WINDOW: usize = 50;
const FIB_RATIOS: [f64; 5] = [0.236, 0.382, 0.5, 0.618, 0.786];

/// Floor pivots, period extremes, Fibonacci retracements, round numbers and
/// VWAP, deduplicated at `min_spacing` (fraction of price) and sorted by
/// distance to `price`. At most `limit` levels.
pub fn key_levels(
    candles: &[Candle],
    ind: &IndicatorSeries,
    price: f64,
    min_spacing: f64,
    limit: usize,
) -> Vec<f64> {
    if price <= 0.0 || !price.is_finite() {
        return Vec::new();
    }
    let mut candidates = Vec::with_capacity(24);

    if let Some(p) = ind.pivots {
        candidates.extend(p.levels());
    }

    for period in PERIODS {
        if candles.len() >= period {
            let (high, low) = extremes(&candles[candles.len() - period..]);
            candidates.push(high);
            candidates.push(low);
        }
    }

    let swing = &candles[candles.len().saturating_sub(SWING_WINDOW)..];
    if !swing.is_empty() {
        let (high, low) = extremes(swing);
        candidates.extend(FIB_RATIOS.iter().map(|r| high - r * (high - low)));
    }

    candidates.extend(psychological_levels(price));

    if let Some(vwap) = ind.vwap {
        candidates.push(vwap);
    }

    candidates.retain(|l| l.is_finite() && *l > 0.0);
    candidates.sort_by(|a, b| (a - price).abs().total_cmp(&(b - price).abs()));

    let mut kept: Vec<f64> = Vec::with_capacity(limit);
    for level in candidates {
        if kept.len() == limit {
            break;
        }
        if kept.iter().all(|k| (k - level).abs() / price >= min_spacing) {
            kept.push(level);
        }
    }
    kept
}

fn extremes(candles: &[Candle]) -> (f64, f64) {
    candles.iter().fold((f64::NEG_INFINITY, f64::INFINITY), |(h, l), c| {
        (h.max(c.high), l.min(c.low))
    })
}

/// Nearest round number and two steps either side, step scaled to price.
pub fn psychological_levels(price: f64) -> Vec<f64> {
    if price <= 0.0 || !price.is_finite() {
        return Vec::new();
    }
    let step = 10f64.powf(price.log10().floor() - 1.0);
    let nearest = (price / step).round() * step;
    (-2..=2).map(|k| nearest + k as f64 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{make_candles, IndicatorCalculator};

    #[test]
    fn round_numbers_scale_with_price() {
        let levels = psychological_levels(1_234.0);
        assert_eq!(levels.len(), 5);
        // step = 100 for a four-digit price
        assert!((levels[2] - 1_200.0).abs() < 1e-9);
        assert!((levels[0] - 1_000.0).abs() < 1e-9);

        let fx = psychological_levels(1.0842);
        assert!((fx[2] - 1.1).abs() < 1e-9);
    }

    #[test]
    fn levels_are_sorted_spaced_and_capped() {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + (i as f64 * 0.2).sin() * 8.0).collect();
        let candles = make_candles(&closes);
        let ind = IndicatorCalculator::default().compute_candles(&candles);
        let price = closes[119];
        let levels = key_levels(&candles, &ind, price, 0.002, 5);

        assert_eq!(levels.len(), 5);
        for pair in levels.windows(2) {
            assert!((pair[0] - price).abs() <= (pair[1] - price).abs());
        }
        for (i, a) in levels.iter().enumerate() {
            for b in &levels[i + 1..] {
                assert!((a - b).abs() / price >= 0.002);
            }
        }
    }

    #[test]
    fn bad_price_yields_nothing() {
        let candles = make_candles(&[1.0, 2.0]);
        let ind = IndicatorCalculator::default().compute_candles(&candles);
        assert!(key_levels(&candles, &ind, 0.0, 0.002, 5).is_empty());
    }
}
