//! Volatility expansion: recent mean true range against the window before it.

use chrono::{DateTime, Utc};

use crate::domain::{AlertAction, AlertType, Candle, CriticalAlert, Severity};
use crate::indicators::atr::mean_true_range;

pub fn classify_expansion(ratio: f64) -> Option<(Severity, AlertAction)> {
    if ratio > 2.5 {
        Some((Severity::Critical, AlertAction::CloseAll))
    } else if ratio > 2.0 {
        Some((Severity::High, AlertAction::ReduceSize))
    } else if ratio > 1.5 {
        Some((Severity::Medium, AlertAction::TightenStops))
    } else {
        None
    }
}

pub fn detect_volatility_expansion(
    candles: &[Candle],
    period: usize,
    at: DateTime<Utc>,
) -> Option<CriticalAlert> {
    let n = candles.len();
    // The prior window needs one extra candle for its first previous close.
    if period == 0 || n < 2 * period + 1 {
        return None;
    }
    let recent = mean_true_range(candles, n - period, n);
    let prior = mean_true_range(candles, n - 2 * period, n - period);
    if prior <= 0.0 {
        return None;
    }
    let ratio = recent / prior;
    let (severity, action) = classify_expansion(ratio)?;
    let close = candles[n - 1].close;
    Some(
        CriticalAlert::new(
            at,
            severity,
            AlertType::VolatilityExpansion,
            action,
            close,
            format!("Average true range expanded {ratio:.2}x over the prior {period} candles"),
        )
        .with_indicator("atr_ratio", ratio)
        .with_indicator("atr_recent", recent)
        .with_indicator("atr_prior", prior),
    )
}
