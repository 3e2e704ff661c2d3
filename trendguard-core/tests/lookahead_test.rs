//! Look-ahead contamination tests for every indicator.
//!
//! No indicator value at candle t may depend on candles after t. Each test
//! computes on a truncated series (0..100) and the full series (0..200) and
//! requires the overlapping prefix to be identical.

use chrono::{Duration, TimeZone, Utc};
use trendguard_core::domain::Candle;
use trendguard_core::indicators::*;

/// Deterministic pseudo-random walk.
fn make_test_candles(n: usize) -> Vec<Candle> {
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let mut price = 100.0;
    (0..n)
        .map(|i| {
            let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
            let change = ((seed % 200) as f64 - 100.0) * 0.05;
            price = (price + change).max(10.0);
            let open = price - 0.5;
            let close = price + 0.3;
            Candle {
                time: base + Duration::hours(i as i64),
                open,
                high: open.max(close) + 2.0,
                low: open.min(close) - 2.0,
                close,
                volume: 1_000.0 + (i as f64 * 100.0),
            }
        })
        .collect()
}

fn assert_no_lookahead(indicator: &dyn Indicator, full: &[Candle], truncated_len: usize) {
    let truncated = indicator.compute(&full[..truncated_len]);
    let complete = indicator.compute(full);
    assert_eq!(truncated.len(), truncated_len, "{}: truncated length", indicator.name());
    assert_eq!(complete.len(), full.len(), "{}: full length", indicator.name());

    for i in 0..truncated_len {
        let (t, f) = (truncated[i], complete[i]);
        if t.is_nan() && f.is_nan() {
            continue;
        }
        assert!(
            (t - f).abs() < 1e-10,
            "{}: look-ahead contamination at candle {i}: truncated={t}, full={f}",
            indicator.name()
        );
    }
}

#[test]
fn lookahead_moving_averages() {
    let candles = make_test_candles(200);
    assert_no_lookahead(&Sma::new(20), &candles, 100);
    assert_no_lookahead(&Sma::volume(20), &candles, 100);
    assert_no_lookahead(&Ema::new(9), &candles, 100);
    assert_no_lookahead(&Ema::new(50), &candles, 100);
}

#[test]
fn lookahead_oscillators() {
    let candles = make_test_candles(200);
    assert_no_lookahead(&Rsi::new(14), &candles, 100);
    assert_no_lookahead(&Roc::new(10), &candles, 100);
    assert_no_lookahead(&Macd::new(12, 26, 9, MacdLine::Macd), &candles, 100);
    assert_no_lookahead(&Macd::new(12, 26, 9, MacdLine::Histogram), &candles, 100);
}

#[test]
fn lookahead_volatility() {
    let candles = make_test_candles(200);
    assert_no_lookahead(&Atr::new(14), &candles, 100);
    assert_no_lookahead(&Adx::new(14), &candles, 100);
    assert_no_lookahead(&Bollinger::upper(20, 2.0), &candles, 100);
    assert_no_lookahead(&Bollinger::lower(20, 2.0), &candles, 100);
}

#[test]
fn warmup_matches_lookback() {
    let candles = make_test_candles(200);
    let indicators: Vec<Box<dyn Indicator>> = vec![
        Box::new(Sma::new(20)),
        Box::new(Ema::new(21)),
        Box::new(Rsi::new(14)),
        Box::new(Atr::new(14)),
        Box::new(Adx::new(14)),
        Box::new(Roc::new(10)),
        Box::new(Macd::new(12, 26, 9, MacdLine::Signal)),
    ];
    for ind in &indicators {
        let values = ind.compute(&candles);
        let lookback = ind.lookback();
        assert!(values[..lookback].iter().all(|v| v.is_nan()), "{} warms up early", ind.name());
        assert!(!values[lookback].is_nan(), "{} warms up late", ind.name());
    }
}
