//! Market and volatility regimes, and the conditions they are derived from.

use serde::{Deserialize, Serialize};
use trendguard_core::domain::{ConsensusSignal, CriticalAlert, Direction, Severity};
use trendguard_core::indicators::IndicatorSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    Bull,
    Bear,
    #[default]
    Sideways,
    Volatile,
}

impl MarketRegime {
    /// Size multiplier applied at the end of the sizing pipeline.
    pub fn size_multiplier(&self) -> f64 {
        match self {
            Self::Bear => 0.7,
            Self::Volatile => 0.5,
            Self::Bull => 1.1,
            Self::Sideways => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityRegime {
    Low,
    #[default]
    Normal,
    High,
}

const HIGH_VOLATILITY: f64 = 50.0;
const LOW_VOLATILITY: f64 = 20.0;
const VOLATILE_MARKET: f64 = 40.0;
const TRENDING: f64 = 30.0;
const VOLUME_SURGE: f64 = 1.5;

pub fn classify_volatility(volatility: f64) -> VolatilityRegime {
    if volatility > HIGH_VOLATILITY {
        VolatilityRegime::High
    } else if volatility < LOW_VOLATILITY {
        VolatilityRegime::Low
    } else {
        VolatilityRegime::Normal
    }
}

/// Bull/bear needs a strong signed trend on surging volume; otherwise the
/// market is volatile or sideways.
pub fn classify_market(volatility: f64, trend_strength: f64, volume_ratio: f64) -> MarketRegime {
    if trend_strength.abs() > TRENDING && volume_ratio > VOLUME_SURGE {
        if trend_strength > 0.0 {
            MarketRegime::Bull
        } else {
            MarketRegime::Bear
        }
    } else if volatility > VOLATILE_MARKET {
        MarketRegime::Volatile
    } else {
        MarketRegime::Sideways
    }
}

/// Scales ATR% of price onto the 0..100 volatility axis.
const VOLATILITY_PER_ATR_PCT: f64 = 25.0;

/// Inputs to the regime update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketConditions {
    /// 0..=100.
    pub volatility: f64,
    /// Signed: positive for up trends, negative for down trends.
    pub trend_strength: f64,
    pub volume_ratio: f64,
}

impl MarketConditions {
    /// Volatility from ATR% of price, trend strength from ADX signed by the
    /// consensus direction, volume ratio as observed.
    pub fn from_evaluation(consensus: &ConsensusSignal, snapshot: &IndicatorSnapshot) -> Self {
        let sign = match consensus.direction {
            Direction::Bullish => 1.0,
            Direction::Bearish => -1.0,
            Direction::Neutral => 0.0,
        };
        Self {
            volatility: (snapshot.atr_pct() * VOLATILITY_PER_ATR_PCT).clamp(0.0, 100.0),
            trend_strength: sign * snapshot.adx,
            volume_ratio: snapshot.volume_ratio,
        }
    }
}

/// Confidence left after discounting open alerts: HIGH −10, CRITICAL −25
/// each, never below zero.
pub fn alert_pressure(confidence: f64, alerts: &[CriticalAlert]) -> f64 {
    let penalty: f64 = alerts
        .iter()
        .map(|a| match a.severity {
            Severity::Critical => 25.0,
            Severity::High => 10.0,
            Severity::Medium | Severity::Low => 0.0,
        })
        .sum();
    (confidence - penalty).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use trendguard_core::domain::{AlertAction, AlertType, Timeframe};

    #[test]
    fn volatility_bands() {
        assert_eq!(classify_volatility(55.0), VolatilityRegime::High);
        assert_eq!(classify_volatility(10.0), VolatilityRegime::Low);
        assert_eq!(classify_volatility(30.0), VolatilityRegime::Normal);
    }

    #[test]
    fn trend_needs_volume() {
        assert_eq!(classify_market(20.0, 35.0, 2.0), MarketRegime::Bull);
        assert_eq!(classify_market(20.0, -35.0, 2.0), MarketRegime::Bear);
        assert_eq!(classify_market(20.0, 35.0, 1.0), MarketRegime::Sideways);
        assert_eq!(classify_market(45.0, 35.0, 1.0), MarketRegime::Volatile);
    }

    #[test]
    fn conditions_from_evaluation() {
        let consensus = ConsensusSignal {
            direction: Direction::Bearish,
            strength: 75.0,
            confidence: 70.0,
            alignment: 80.0,
            quality: 60.0,
            dominant_timeframe: Timeframe::H4,
            bullish_score: 0.1,
            bearish_score: 0.8,
            neutral_score: 0.1,
            timeframe_count: 3,
            degraded: false,
        };
        let snapshot = IndicatorSnapshot {
            atr: 2.0,
            adx: 40.0,
            volume_ratio: 1.8,
            ..IndicatorSnapshot::neutral(100.0)
        };
        let c = MarketConditions::from_evaluation(&consensus, &snapshot);
        assert_eq!(c.volatility, 50.0);
        assert_eq!(c.trend_strength, -40.0);
        assert_eq!(classify_market(c.volatility, c.trend_strength, c.volume_ratio), MarketRegime::Bear);
    }

    #[test]
    fn alerts_press_confidence() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let alert = |s| CriticalAlert::new(at, s, AlertType::VolumeAnomaly, AlertAction::Monitor, 1.0, "x");
        let alerts = [alert(Severity::High), alert(Severity::Critical), alert(Severity::Low)];
        assert_eq!(alert_pressure(70.0, &alerts), 35.0);
        assert_eq!(alert_pressure(20.0, &alerts), 0.0);
    }
}
