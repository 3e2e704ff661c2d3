//! Double top / double bottom reversal patterns.

use chrono::{DateTime, Utc};

use crate::domain::{AlertAction, AlertType, Candle, CriticalAlert, Severity};

/// Fibonacci extension used for the measured-move target.
const TARGET_EXTENSION: f64 = 0.618;
/// Neighbours on each side a pivot must exceed.
const PIVOT_SPAN: usize = 2;

/// Indices of candles whose `value` strictly beats `PIVOT_SPAN` neighbours
/// on each side, in the direction given by `beats`.
fn pivots(candles: &[Candle], value: fn(&Candle) -> f64, beats: fn(f64, f64) -> bool) -> Vec<usize> {
    let n = candles.len();
    if n < 2 * PIVOT_SPAN + 1 {
        return Vec::new();
    }
    (PIVOT_SPAN..n - PIVOT_SPAN)
        .filter(|&i| {
            let v = value(&candles[i]);
            (1..=PIVOT_SPAN).all(|k| beats(v, value(&candles[i - k])) && beats(v, value(&candles[i + k])))
        })
        .collect()
}

fn within(a: f64, b: f64, tolerance: f64) -> bool {
    let reference = a.abs().max(b.abs());
    reference > 0.0 && (a - b).abs() / reference <= tolerance
}

/// Double top confirmed by a close below the twin peaks.
pub fn detect_double_top(
    candles: &[Candle],
    window: usize,
    tolerance: f64,
    at: DateTime<Utc>,
) -> Option<CriticalAlert> {
    let window = &candles[candles.len().saturating_sub(window)..];
    let peaks = pivots(window, |c| c.high, |a, b| a > b);
    let [.., first, second] = peaks.as_slice() else {
        return None;
    };
    let (h1, h2) = (window[*first].high, window[*second].high);
    if !within(h1, h2, tolerance) {
        return None;
    }

    let level = (h1 + h2) / 2.0;
    let close = window.last()?.close;
    if close >= level * (1.0 - tolerance) {
        return None;
    }

    let neckline = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let target = neckline - TARGET_EXTENSION * (level - neckline);
    Some(
        CriticalAlert::new(
            at,
            Severity::High,
            AlertType::DoubleTopRejection,
            AlertAction::CloseLongs,
            level,
            format!("Double top rejected near {level:.5}, neckline {neckline:.5}"),
        )
        .with_indicator("peak_1", h1)
        .with_indicator("peak_2", h2)
        .with_indicator("neckline", neckline)
        .with_indicator("target", target),
    )
}

/// Double bottom confirmed by a close above the twin valleys.
pub fn detect_double_bottom(
    candles: &[Candle],
    window: usize,
    tolerance: f64,
    at: DateTime<Utc>,
) -> Option<CriticalAlert> {
    let window = &candles[candles.len().saturating_sub(window)..];
    let valleys = pivots(window, |c| c.low, |a, b| a < b);
    let [.., first, second] = valleys.as_slice() else {
        return None;
    };
    let (l1, l2) = (window[*first].low, window[*second].low);
    if !within(l1, l2, tolerance) {
        return None;
    }

    let level = (l1 + l2) / 2.0;
    let close = window.last()?.close;
    if close <= level * (1.0 + tolerance) {
        return None;
    }

    let neckline = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let target = neckline + TARGET_EXTENSION * (neckline - level);
    Some(
        CriticalAlert::new(
            at,
            Severity::High,
            AlertType::DoubleBottomBounce,
            AlertAction::CloseShorts,
            level,
            format!("Double bottom held near {level:.5}, neckline {neckline:.5}"),
        )
        .with_indicator("valley_1", l1)
        .with_indicator("valley_2", l2)
        .with_indicator("neckline", neckline)
        .with_indicator("target", target),
    )
}

/// Top first, then bottom; at most one alert.
pub fn detect_double_pattern(
    candles: &[Candle],
    window: usize,
    tolerance: f64,
    at: DateTime<Utc>,
) -> Option<CriticalAlert> {
    detect_double_top(candles, window, tolerance, at)
        .or_else(|| detect_double_bottom(candles, window, tolerance, at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_ohlc_candles;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    /// Twin highs at 100.00 and 100.15, then a close at 99.70.
    fn double_top_window() -> Vec<Candle> {
        let highs = [
            99.0, 99.2, 99.4, 99.6, 100.00, 99.5, 99.3, 99.25, 99.2, 99.4, 99.6, 100.15, 99.6, 99.4, 99.2, 99.0,
            98.9, 99.2, 99.5, 99.8,
        ];
        let mut data: Vec<(f64, f64, f64, f64)> = highs.iter().map(|&h| (h - 0.3, h, h - 0.6, h - 0.2)).collect();
        let last = data.len() - 1;
        data[last] = (99.75, 99.8, 99.6, 99.7);
        make_ohlc_candles(&data)
    }

    #[test]
    fn double_top_rejection() {
        let candles = double_top_window();
        let alert = detect_double_top(&candles, 20, 0.002, at()).expect("double top");
        assert_eq!(alert.alert_type, AlertType::DoubleTopRejection);
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.action, AlertAction::CloseLongs);
        let neckline = alert.indicators["neckline"];
        assert!(neckline < 100.0 && neckline < 100.15);
        assert!(alert.indicators["target"] < neckline);
    }

    #[test]
    fn double_top_needs_confirmation() {
        let mut candles = double_top_window();
        let last = candles.len() - 1;
        candles[last].close = 99.95;
        assert!(detect_double_top(&candles, 20, 0.002, at()).is_none());
    }

    #[test]
    fn peaks_too_far_apart() {
        let mut candles = double_top_window();
        candles[11].high = 100.6;
        assert!(detect_double_top(&candles, 20, 0.002, at()).is_none());
    }

    #[test]
    fn double_bottom_bounce() {
        // Mirror the top: negate around 200.
        let mirrored: Vec<(f64, f64, f64, f64)> = double_top_window()
            .iter()
            .map(|c| (200.0 - c.open, 200.0 - c.low, 200.0 - c.high, 200.0 - c.close))
            .collect();
        let candles = make_ohlc_candles(&mirrored);
        let alert = detect_double_pattern(&candles, 20, 0.002, at()).expect("double bottom");
        assert_eq!(alert.alert_type, AlertType::DoubleBottomBounce);
        assert_eq!(alert.action, AlertAction::CloseShorts);
        assert!(alert.indicators["neckline"] > 100.0);
    }
}
