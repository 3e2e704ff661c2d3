//! Per-timeframe and consensus signal types.

use serde::{Deserialize, Serialize};

use super::timeframe::Timeframe;

/// Directional call of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl Direction {
    pub fn is_directional(&self) -> bool {
        !matches!(self, Self::Neutral)
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Bullish => Self::Bearish,
            Self::Bearish => Self::Bullish,
            Self::Neutral => Self::Neutral,
        }
    }
}

/// Price-action classification over the most recent 20 candles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketStructure {
    BreakoutUp,
    BreakoutDown,
    TrendingUp,
    TrendingDown,
    Ranging,
    #[default]
    Choppy,
}

impl MarketStructure {
    pub fn is_breakout(&self) -> bool {
        matches!(self, Self::BreakoutUp | Self::BreakoutDown)
    }
}

/// Analysis result for one timeframe. Created once per evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeSignal {
    pub timeframe: Timeframe,
    pub direction: Direction,
    /// 0..=100
    pub strength: f64,
    pub rsi: f64,
    pub macd_signal: f64,
    pub volume_ratio: f64,
    /// Up to five price levels, nearest to the current price first.
    pub key_levels: Vec<f64>,
    /// 0..=100; zero when history is insufficient.
    pub trend_quality: f64,
    pub structure: MarketStructure,
    /// Winning side's trend points (0..=18).
    pub trend_score: u32,
    /// 0 = strongly bearish, 100 = strongly bullish.
    pub momentum_strength: f64,
    /// Trend direction a NEUTRAL signal leans toward.
    pub bias: Direction,
    pub price: f64,
}

impl TimeframeSignal {
    /// Neutral signal used when a timeframe has too little history.
    pub fn neutral(timeframe: Timeframe, price: f64) -> Self {
        Self {
            timeframe,
            direction: Direction::Neutral,
            strength: 50.0,
            rsi: 50.0,
            macd_signal: 0.0,
            volume_ratio: 1.0,
            key_levels: Vec::new(),
            trend_quality: 0.0,
            structure: MarketStructure::Choppy,
            trend_score: 0,
            momentum_strength: 50.0,
            bias: Direction::Neutral,
            price,
        }
    }
}

/// Aggregated multi-timeframe verdict. One per evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusSignal {
    pub direction: Direction,
    pub strength: f64,
    pub confidence: f64,
    pub alignment: f64,
    pub quality: f64,
    pub dominant_timeframe: Timeframe,
    pub bullish_score: f64,
    pub bearish_score: f64,
    pub neutral_score: f64,
    pub timeframe_count: usize,
    /// True when one or more inputs were served from a stale cache.
    #[serde(default)]
    pub degraded: bool,
}

/// Confidence multiplier applied when inputs are stale.
pub const DEGRADED_CONFIDENCE_FACTOR: f64 = 0.8;

impl ConsensusSignal {
    /// Mark the consensus as built on stale data and discount its confidence.
    pub fn degrade(mut self) -> Self {
        if !self.degraded {
            self.degraded = true;
            self.confidence = (self.confidence * DEGRADED_CONFIDENCE_FACTOR).clamp(0.0, 100.0);
        }
        self
    }
}
