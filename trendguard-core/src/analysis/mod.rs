//! Multi-timeframe consensus analysis.
//!
//! Each timeframe is scored independently (trend, momentum, structure, key
//! levels) into a `TimeframeSignal`; `get_consensus_signal` then folds those
//! into one weighted `ConsensusSignal`.

pub mod consensus;
pub mod key_levels;
pub mod momentum;
pub mod structure;
pub mod trend;
pub mod weights;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use consensus::build_consensus;
pub use momentum::{momentum_breakdown, momentum_direction, momentum_strength, MomentumBreakdown};
pub use structure::classify_structure;
pub use trend::{score_trend, trend_quality, QualityInputs, TrendAssessment};
pub use weights::{configure_weights, WeightTable};

use crate::domain::{
    Candle, CandleSeries, ConsensusSignal, Direction, InstrumentClass, MarketStructure, Timeframe,
    TimeframeSignal,
};
use crate::indicators::{IndicatorCalculator, IndicatorSeries};

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("consensus requires at least one timeframe signal")]
    EmptyTimeframeMap,
}

/// Analyzer calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Below this many candles a timeframe reads as neutral.
    pub min_candles: usize,
    /// Momentum strength needed to confirm a bullish trend (mirrored for bearish).
    pub momentum_confirm: f64,
    pub ranging_factor: f64,
    pub breakout_factor: f64,
    pub key_level_count: usize,
    /// Minimum spacing between key levels, as a fraction of price.
    pub key_level_spacing: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_candles: 50,
            momentum_confirm: 60.0,
            ranging_factor: 0.7,
            breakout_factor: 1.2,
            key_level_count: 5,
            key_level_spacing: 0.002,
        }
    }
}

/// Scores each timeframe and aggregates them for one instrument class.
#[derive(Debug, Clone)]
pub struct MultiTimeframeAnalyzer {
    config: AnalysisConfig,
    weights: WeightTable,
    calculator: IndicatorCalculator,
}

impl MultiTimeframeAnalyzer {
    pub fn new(class: InstrumentClass, config: AnalysisConfig) -> Self {
        Self {
            config,
            weights: configure_weights(class),
            calculator: IndicatorCalculator::default(),
        }
    }

    pub fn for_symbol(symbol: &str) -> Self {
        Self::new(InstrumentClass::from_symbol(symbol), AnalysisConfig::default())
    }

    pub fn with_calculator(mut self, calculator: IndicatorCalculator) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Compute indicators for `series` and score it.
    pub fn analyze_timeframe(&self, timeframe: Timeframe, series: &CandleSeries) -> TimeframeSignal {
        let indicators = self.calculator.compute(series);
        self.analyze_with(timeframe, series.candles(), &indicators)
    }

    /// Score a timeframe from precomputed indicators.
    pub fn analyze_with(
        &self,
        timeframe: Timeframe,
        candles: &[Candle],
        indicators: &IndicatorSeries,
    ) -> TimeframeSignal {
        let snapshot = indicators.snapshot();
        if candles.len() < self.config.min_candles {
            let mut neutral = TimeframeSignal::neutral(timeframe, snapshot.close);
            neutral.rsi = snapshot.rsi;
            neutral.macd_signal = snapshot.macd_signal;
            neutral.volume_ratio = snapshot.volume_ratio;
            return neutral;
        }

        let trend = score_trend(indicators);
        let momentum = momentum_strength(indicators);
        let quality = trend_quality(
            candles,
            QualityInputs {
                trend: trend.direction,
                momentum: momentum_direction(momentum),
                atr_pct: snapshot.atr_pct(),
            },
        );
        let structure = classify_structure(candles);
        let key_levels = key_levels::key_levels(
            candles,
            indicators,
            snapshot.close,
            self.config.key_level_spacing,
            self.config.key_level_count,
        );

        let confirm = self.config.momentum_confirm;
        let (direction, mut strength, bias) = match trend.direction {
            Direction::Bullish if momentum > confirm => (
                Direction::Bullish,
                0.6 * trend.strength + 0.4 * momentum,
                Direction::Bullish,
            ),
            Direction::Bearish if momentum < 100.0 - confirm => (
                Direction::Bearish,
                0.6 * trend.strength + 0.4 * (100.0 - momentum),
                Direction::Bearish,
            ),
            leaning => (
                Direction::Neutral,
                50.0 + 0.25 * (trend.strength - 50.0),
                leaning,
            ),
        };
        match structure {
            MarketStructure::Ranging => strength *= self.config.ranging_factor,
            s if s.is_breakout() => strength *= self.config.breakout_factor,
            _ => {}
        }

        tracing::trace!(
            %timeframe,
            ?direction,
            trend_points = trend.score(),
            momentum,
            quality,
            ?structure,
            "timeframe scored"
        );

        TimeframeSignal {
            timeframe,
            direction,
            strength: strength.clamp(0.0, 100.0),
            rsi: snapshot.rsi,
            macd_signal: snapshot.macd_signal,
            volume_ratio: snapshot.volume_ratio,
            key_levels,
            trend_quality: quality,
            structure,
            trend_score: trend.score(),
            momentum_strength: momentum,
            bias,
            price: snapshot.close,
        }
    }

    pub fn get_consensus_signal(
        &self,
        signals: &BTreeMap<Timeframe, TimeframeSignal>,
    ) -> Result<ConsensusSignal, AnalysisError> {
        build_consensus(signals, &self.weights)
    }
}
