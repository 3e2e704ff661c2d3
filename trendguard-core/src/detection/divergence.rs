//! RSI momentum divergence between timeframes.

use chrono::{DateTime, Utc};

use super::FrameView;
use crate::domain::{AlertAction, AlertType, CriticalAlert, Severity, Timeframe};
use crate::indicators::value_back;

/// Candles over which RSI momentum is measured.
pub const RSI_MOMENTUM_LOOKBACK: usize = 5;

/// RSI change over the last `RSI_MOMENTUM_LOOKBACK` candles.
pub fn rsi_momentum(rsi: &[f64]) -> Option<f64> {
    Some(value_back(rsi, 0)? - value_back(rsi, RSI_MOMENTUM_LOOKBACK)?)
}

/// Severity and action for a divergence of `delta` RSI points.
pub fn classify_divergence(delta: f64) -> (Severity, AlertAction) {
    if delta > 10.0 {
        (Severity::Critical, AlertAction::CloseAll)
    } else if delta > 7.0 {
        (Severity::High, AlertAction::ReducePosition)
    } else if delta > 5.0 {
        (Severity::Medium, AlertAction::TightenStops)
    } else {
        (Severity::Low, AlertAction::Monitor)
    }
}

/// Largest pairwise RSI-momentum gap above `threshold`, if any.
///
/// `series` pairs each timeframe with its RSI series.
pub fn divergence_from_rsi(
    series: &[(Timeframe, &[f64])],
    threshold: f64,
    price: f64,
    at: DateTime<Utc>,
) -> Option<CriticalAlert> {
    let momenta: Vec<(Timeframe, f64)> = series
        .iter()
        .filter_map(|(tf, rsi)| rsi_momentum(rsi).map(|m| (*tf, m)))
        .collect();

    let mut best: Option<(f64, (Timeframe, f64), (Timeframe, f64))> = None;
    for (i, a) in momenta.iter().enumerate() {
        for b in &momenta[i + 1..] {
            let delta = (a.1 - b.1).abs();
            if delta > threshold && best.map_or(true, |(d, _, _)| delta > d) {
                best = Some((delta, *a, *b));
            }
        }
    }

    let (delta, (tf_a, m_a), (tf_b, m_b)) = best?;
    let (severity, action) = classify_divergence(delta);
    let (rising, falling) = if m_a >= m_b { (tf_a, tf_b) } else { (tf_b, tf_a) };
    Some(
        CriticalAlert::new(
            at,
            severity,
            AlertType::MultiTimeframeDivergence,
            action,
            price,
            format!("RSI momentum divergence of {delta:.1} points: {rising} leading, {falling} lagging"),
        )
        .with_indicator("rsi_delta", delta)
        .with_indicator(&format!("rsi_momentum_{tf_a}"), m_a)
        .with_indicator(&format!("rsi_momentum_{tf_b}"), m_b),
    )
}

pub fn detect_divergence(frames: &[FrameView<'_>], threshold: f64, at: DateTime<Utc>) -> Option<CriticalAlert> {
    let series: Vec<(Timeframe, &[f64])> = frames
        .iter()
        .map(|f| (f.timeframe, f.indicators.rsi.as_slice()))
        .collect();
    let price = frames.first().and_then(|f| f.candles.last()).map_or(0.0, |c| c.close);
    divergence_from_rsi(&series, threshold, price, at)
}
