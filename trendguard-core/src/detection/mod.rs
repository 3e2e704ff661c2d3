//! Critical-change detection across timeframes.
//!
//! Each detector is a pure function returning at most one alert. The
//! detector struct owns calibration, per-timeframe RSI bands and the rolling
//! alert history; `run_full_scan` is the only place that mutates it.

pub mod breaks;
pub mod divergence;
pub mod exhaustion;
pub mod patterns;
pub mod volatility;
pub mod volume;

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use breaks::{detect_level_break, BreakParams};
pub use divergence::{detect_divergence, divergence_from_rsi};
pub use exhaustion::detect_exhaustion;
pub use patterns::{detect_double_bottom, detect_double_pattern, detect_double_top};
pub use volatility::detect_volatility_expansion;
pub use volume::detect_volume_anomaly;

use crate::domain::{AlertType, Candle, CriticalAlert, InstrumentClass, Severity, Timeframe};
use crate::indicators::IndicatorSeries;

/// Detector calibration. Thresholds here are tuning defaults, not derived values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// RSI-momentum gap between timeframes that counts as divergence.
    pub divergence_threshold: f64,
    /// Maximum relative gap between twin peaks/valleys.
    pub pattern_tolerance: f64,
    pub pattern_window: usize,
    /// Fraction of a level the close must clear to count as a break.
    pub level_buffer: f64,
    pub volume_confirm: f64,
    pub volume_anomaly: f64,
    pub volume_period: usize,
    pub volatility_period: usize,
    /// 1.0 keeps everything; below 0.8 drops LOW; below 0.5 keeps HIGH and CRITICAL only.
    pub sensitivity: f64,
    pub history_limit: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            divergence_threshold: 5.0,
            pattern_tolerance: 0.002,
            pattern_window: 20,
            level_buffer: 0.0005,
            volume_confirm: 1.5,
            volume_anomaly: 2.0,
            volume_period: 20,
            volatility_period: 14,
            sensitivity: 1.0,
            history_limit: 100,
        }
    }
}

impl DetectionConfig {
    /// Lowest severity that survives the sensitivity filter.
    pub fn minimum_severity(&self) -> Severity {
        if self.sensitivity < 0.5 {
            Severity::High
        } else if self.sensitivity < 0.8 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// RSI oversold/overbought band for one timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiBands {
    pub oversold: f64,
    pub overbought: f64,
}

impl RsiBands {
    pub fn new(oversold: f64, overbought: f64) -> Self {
        Self { oversold, overbought }
    }
}

impl Default for RsiBands {
    fn default() -> Self {
        Self::new(30.0, 70.0)
    }
}

/// Per-timeframe RSI bands: crypto intraday 25/75, monthly 35/65, else 30/70.
pub fn configure_thresholds(class: InstrumentClass) -> BTreeMap<Timeframe, RsiBands> {
    Timeframe::ALL
        .iter()
        .map(|&tf| {
            let bands = match (class, tf) {
                (_, Timeframe::MN1) => RsiBands::new(35.0, 65.0),
                (InstrumentClass::Crypto, tf) if tf.is_intraday() => RsiBands::new(25.0, 75.0),
                _ => RsiBands::default(),
            };
            (tf, bands)
        })
        .collect()
}

/// Borrowed inputs for one timeframe.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub timeframe: Timeframe,
    pub candles: &'a [Candle],
    pub indicators: &'a IndicatorSeries,
    pub key_levels: &'a [f64],
}

#[derive(Debug, Clone)]
pub struct CriticalChangeDetector {
    config: DetectionConfig,
    bands: BTreeMap<Timeframe, RsiBands>,
    history: VecDeque<CriticalAlert>,
}

impl CriticalChangeDetector {
    pub fn new(class: InstrumentClass, config: DetectionConfig) -> Self {
        Self {
            bands: configure_thresholds(class),
            history: VecDeque::with_capacity(config.history_limit),
            config,
        }
    }

    pub fn for_symbol(symbol: &str) -> Self {
        Self::new(InstrumentClass::from_symbol(symbol), DetectionConfig::default())
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn bands(&self, timeframe: Timeframe) -> RsiBands {
        self.bands.get(&timeframe).copied().unwrap_or_default()
    }

    /// Alerts from previous scans, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &CriticalAlert> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Run every detector and return the deduplicated, severity-ranked survivors.
    ///
    /// Frames may arrive in any order; per-timeframe detectors walk them
    /// shortest first and keep only their first hit.
    pub fn run_full_scan(&mut self, frames: &[FrameView<'_>]) -> Vec<CriticalAlert> {
        let mut frames: Vec<FrameView<'_>> = frames.iter().copied().filter(|f| !f.candles.is_empty()).collect();
        frames.sort_by_key(|f| f.timeframe);
        let Some(at) = frames.iter().filter_map(|f| f.candles.last()).map(|c| c.time).max() else {
            return Vec::new();
        };

        let mut found = self.scan_frames(&frames, at);
        let raw = found.len();

        found = dedupe_by_type(found);
        found.sort_by(|a, b| b.severity.cmp(&a.severity));
        let floor = self.config.minimum_severity();
        found.retain(|a| a.severity >= floor);

        for alert in &found {
            if self.history.len() == self.config.history_limit {
                self.history.pop_front();
            }
            if self.config.history_limit > 0 {
                self.history.push_back(alert.clone());
            }
        }

        tracing::debug!(raw, kept = found.len(), frames = frames.len(), "change scan complete");
        found
    }

    fn scan_frames(&self, frames: &[FrameView<'_>], at: DateTime<Utc>) -> Vec<CriticalAlert> {
        let cfg = &self.config;
        let mut found = Vec::new();

        if let Some(alert) = detect_divergence(frames, cfg.divergence_threshold, at) {
            found.push(alert);
        }

        let params = BreakParams {
            buffer: cfg.level_buffer,
            volume_confirm: cfg.volume_confirm,
            volume_period: cfg.volume_period,
        };
        let hits = [
            frames
                .iter()
                .find_map(|f| detect_double_pattern(f.candles, cfg.pattern_window, cfg.pattern_tolerance, at)),
            frames
                .iter()
                .find_map(|f| detect_level_break(f.candles, f.key_levels, params, at)),
            frames
                .iter()
                .find_map(|f| detect_exhaustion(f.candles, f.indicators, self.bands(f.timeframe), at)),
            frames
                .iter()
                .find_map(|f| detect_volatility_expansion(f.candles, cfg.volatility_period, at)),
            frames
                .iter()
                .find_map(|f| detect_volume_anomaly(f.candles, cfg.volume_period, cfg.volume_anomaly, at)),
        ];
        found.extend(hits.into_iter().flatten());
        found
    }
}

/// Keep the most severe alert per type. Ties keep the first seen.
pub fn dedupe_by_type(alerts: Vec<CriticalAlert>) -> Vec<CriticalAlert> {
    let mut by_type: BTreeMap<AlertType, CriticalAlert> = BTreeMap::new();
    for alert in alerts {
        match by_type.get(&alert.alert_type) {
            Some(existing) if existing.severity >= alert.severity => {}
            _ => {
                by_type.insert(alert.alert_type, alert);
            }
        }
    }
    by_type.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AlertAction;
    use chrono::TimeZone;

    fn alert(alert_type: AlertType, severity: Severity) -> CriticalAlert {
        CriticalAlert::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            severity,
            alert_type,
            AlertAction::Monitor,
            1.0,
            "test",
        )
    }

    #[test]
    fn thresholds_per_class() {
        let crypto = configure_thresholds(InstrumentClass::Crypto);
        assert_eq!(crypto[&Timeframe::M15], RsiBands::new(25.0, 75.0));
        assert_eq!(crypto[&Timeframe::D1], RsiBands::new(30.0, 70.0));
        assert_eq!(crypto[&Timeframe::MN1], RsiBands::new(35.0, 65.0));

        let fx = configure_thresholds(InstrumentClass::Forex);
        assert_eq!(fx[&Timeframe::M15], RsiBands::default());
        assert_eq!(fx[&Timeframe::MN1], RsiBands::new(35.0, 65.0));
    }

    #[test]
    fn dedupe_keeps_max_severity() {
        let out = dedupe_by_type(vec![
            alert(AlertType::VolumeAnomaly, Severity::Medium),
            alert(AlertType::VolumeAnomaly, Severity::High),
            alert(AlertType::SupportBreak, Severity::Low),
            alert(AlertType::VolumeAnomaly, Severity::Low),
        ]);
        assert_eq!(out.len(), 2);
        let volume = out.iter().find(|a| a.alert_type == AlertType::VolumeAnomaly).unwrap();
        assert_eq!(volume.severity, Severity::High);
    }

    #[test]
    fn sensitivity_floor() {
        let mut cfg = DetectionConfig::default();
        assert_eq!(cfg.minimum_severity(), Severity::Low);
        cfg.sensitivity = 0.7;
        assert_eq!(cfg.minimum_severity(), Severity::Medium);
        cfg.sensitivity = 0.4;
        assert_eq!(cfg.minimum_severity(), Severity::High);
    }

    #[test]
    fn empty_scan_is_empty() {
        let mut detector = CriticalChangeDetector::for_symbol("EURUSD");
        assert!(detector.run_full_scan(&[]).is_empty());
        assert_eq!(detector.history_len(), 0);
    }
}
