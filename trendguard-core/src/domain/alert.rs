//! Critical alerts emitted by the change detector.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity. Strictly ordered LOW < MEDIUM < HIGH < CRITICAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Which detector produced an alert. Deduplication keys on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    MultiTimeframeDivergence,
    DoubleTopRejection,
    DoubleBottomBounce,
    SupportBreak,
    ResistanceBreak,
    BearishMomentumDivergence,
    BullishMomentumDivergence,
    MomentumWeakening,
    VolatilityExpansion,
    VolumeAnomaly,
}

/// Response the orchestrator is asked to take, in escalating order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertAction {
    Monitor,
    TightenStops,
    AdjustStops,
    ReduceSize,
    ReducePosition,
    CloseLongs,
    CloseShorts,
    CloseAll,
    StopTrading,
}

/// One detector finding. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalAlert {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub message: String,
    pub action: AlertAction,
    pub price_level: f64,
    pub indicators: BTreeMap<String, f64>,
}

impl CriticalAlert {
    pub fn new(
        timestamp: DateTime<Utc>,
        severity: Severity,
        alert_type: AlertType,
        action: AlertAction,
        price_level: f64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            severity,
            alert_type,
            message: message.into(),
            action,
            price_level,
            indicators: BTreeMap::new(),
        }
    }

    /// Attach a named indicator reading (builder style).
    pub fn with_indicator(mut self, key: &str, value: f64) -> Self {
        self.indicators.insert(key.to_string(), value);
        self
    }
}
