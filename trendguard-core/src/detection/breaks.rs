//! Volume-confirmed support and resistance breaks.

use chrono::{DateTime, Utc};

use crate::domain::{AlertAction, AlertType, Candle, CriticalAlert, Severity};
use crate::indicators::levels::volume_ratio;

#[derive(Debug, Clone, Copy)]
pub struct BreakParams {
    /// Fraction of the level the close must clear.
    pub buffer: f64,
    /// Volume multiple of the prior average required to confirm.
    pub volume_confirm: f64,
    pub volume_period: usize,
}

/// First key level the latest candle broke through, if volume confirms it.
pub fn detect_level_break(
    candles: &[Candle],
    key_levels: &[f64],
    params: BreakParams,
    at: DateTime<Utc>,
) -> Option<CriticalAlert> {
    let [.., prev, curr] = candles else {
        return None;
    };
    let ratio = volume_ratio(candles, params.volume_period)?;
    if ratio <= params.volume_confirm {
        return None;
    }

    for &level in key_levels {
        if prev.close >= level && curr.close < level * (1.0 - params.buffer) {
            let next = key_levels.iter().copied().filter(|l| *l < level).reduce(f64::max);
            return Some(build(AlertType::SupportBreak, level, next, curr.close, ratio, at));
        }
        if prev.close <= level && curr.close > level * (1.0 + params.buffer) {
            let next = key_levels.iter().copied().filter(|l| *l > level).reduce(f64::min);
            return Some(build(AlertType::ResistanceBreak, level, next, curr.close, ratio, at));
        }
    }
    None
}

/// Severity from the room to the next level in the break direction.
pub fn break_severity(level: f64, next: Option<f64>) -> Severity {
    let Some(next) = next else {
        return Severity::Medium;
    };
    let gap_pct = (next - level).abs() / level * 100.0;
    if gap_pct > 2.0 {
        Severity::High
    } else if gap_pct > 1.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn build(
    alert_type: AlertType,
    level: f64,
    next: Option<f64>,
    close: f64,
    ratio: f64,
    at: DateTime<Utc>,
) -> CriticalAlert {
    let severity = break_severity(level, next);
    let support = alert_type == AlertType::SupportBreak;
    let action = match (severity, support) {
        (Severity::High, true) => AlertAction::CloseLongs,
        (Severity::High, false) => AlertAction::CloseShorts,
        _ => AlertAction::AdjustStops,
    };
    let kind = if support { "Support" } else { "Resistance" };
    let mut alert = CriticalAlert::new(
        at,
        severity,
        alert_type,
        action,
        level,
        format!("{kind} at {level:.5} broken, close {close:.5} on {ratio:.1}x volume"),
    )
    .with_indicator("close", close)
    .with_indicator("volume_ratio", ratio);
    if let Some(next) = next {
        alert = alert.with_indicator("next_level", next);
    }
    alert
}
