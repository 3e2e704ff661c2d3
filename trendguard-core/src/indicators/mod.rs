//! Indicator math shared by the analyzer and the change detector.
//!
//! Every indicator is a pure function: candle history in, a series of the same
//! length out, with `f64::NAN` during warm-up. `IndicatorCalculator` runs the
//! fixed set once per timeframe and exposes both the full series and a typed
//! snapshot of the latest values.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod calculator;
pub mod ema;
pub mod levels;
pub mod macd;
pub mod roc;
pub mod rsi;
pub mod sma;

pub use adx::Adx;
pub use atr::Atr;
pub use bollinger::{Bollinger, BollingerBand};
pub use calculator::{IndicatorCalculator, IndicatorParams, IndicatorSeries, IndicatorSnapshot, ParamsError};
pub use ema::Ema;
pub use levels::PivotLevels;
pub use macd::{Macd, MacdLine};
pub use roc::Roc;
pub use rsi::Rsi;
pub use sma::Sma;

use crate::domain::Candle;

/// Trait for candle indicators.
///
/// # Look-ahead guard
/// No output at index t may depend on candles after t.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_21", "atr_14").
    fn name(&self) -> &str;

    /// Number of candles before the first valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator over the whole series.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Last finite value of a series, if any.
pub fn last_valid(series: &[f64]) -> Option<f64> {
    series.last().copied().filter(|v| v.is_finite())
}

/// Value `offset` positions before the end (0 = last), if finite.
pub fn value_back(series: &[f64], offset: usize) -> Option<f64> {
    let n = series.len();
    if offset >= n {
        return None;
    }
    Some(series[n - 1 - offset]).filter(|v| v.is_finite())
}

/// Build synthetic candles from closes for testing.
///
/// open = previous close, high/low = body ± 1.0, volume = 1000, one minute apart.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                time: base + Duration::minutes(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1_000.0,
            }
        })
        .collect()
}

/// Build candles from explicit (open, high, low, close) tuples for testing.
#[cfg(test)]
pub fn make_ohlc_candles(data: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Candle {
            time: base + Duration::minutes(i as i64),
            open,
            high,
            low,
            close,
            volume: 1_000.0,
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
