//! Volume spikes against the recent average.

use chrono::{DateTime, Utc};

use crate::domain::{AlertAction, AlertType, BodyDirection, Candle, CriticalAlert, Severity};
use crate::indicators::levels::volume_ratio;

const HIGH_MULTIPLE: f64 = 3.0;

pub fn detect_volume_anomaly(
    candles: &[Candle],
    period: usize,
    threshold: f64,
    at: DateTime<Utc>,
) -> Option<CriticalAlert> {
    let ratio = volume_ratio(candles, period)?;
    if ratio <= threshold {
        return None;
    }
    let last = candles.last()?;
    let (severity, action) = if ratio > HIGH_MULTIPLE {
        (Severity::High, AlertAction::TightenStops)
    } else {
        (Severity::Medium, AlertAction::Monitor)
    };
    let (tag, bullish) = match last.body_direction() {
        BodyDirection::Bullish => ("bullish", 1.0),
        BodyDirection::Bearish => ("bearish", -1.0),
        BodyDirection::Doji => ("indecisive", 0.0),
    };
    Some(
        CriticalAlert::new(
            at,
            severity,
            AlertType::VolumeAnomaly,
            action,
            last.close,
            format!("Volume {ratio:.1}x average on a {tag} candle"),
        )
        .with_indicator("volume_ratio", ratio)
        .with_indicator("body_direction", bullish),
    )
}
