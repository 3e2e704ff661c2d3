//! Evaluation facade: candles in, consensus and alerts out.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisConfig, AnalysisError, MultiTimeframeAnalyzer};
use crate::detection::{CriticalChangeDetector, DetectionConfig, FrameView};
use crate::domain::{
    CandleSeries, ConsensusSignal, CriticalAlert, InstrumentClass, Timeframe, TimeframeSignal,
};
use crate::feed::{CandleFeed, FeedGateway};
use crate::indicators::{IndicatorCalculator, IndicatorParams, IndicatorSeries, IndicatorSnapshot};

/// Everything the engine is calibrated with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub indicators: IndicatorParams,
    pub analysis: AnalysisConfig,
    pub detection: DetectionConfig,
}

/// Output of one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub symbol: String,
    pub consensus: ConsensusSignal,
    pub signals: BTreeMap<Timeframe, TimeframeSignal>,
    pub snapshots: BTreeMap<Timeframe, IndicatorSnapshot>,
    pub alerts: Vec<CriticalAlert>,
}

impl Evaluation {
    /// Indicator snapshot of the dominant timeframe.
    pub fn dominant_snapshot(&self) -> Option<&IndicatorSnapshot> {
        self.snapshots.get(&self.consensus.dominant_timeframe)
    }
}

/// Wires the indicator calculator into the analyzer and the change detector.
///
/// Per-timeframe work runs in parallel; the detector's alert history is the
/// only state carried between cycles.
#[derive(Debug, Clone)]
pub struct SignalEngine {
    calculator: IndicatorCalculator,
    analyzer: MultiTimeframeAnalyzer,
    detector: CriticalChangeDetector,
}

impl SignalEngine {
    pub fn new(class: InstrumentClass, config: EngineConfig) -> Self {
        let calculator = IndicatorCalculator::new(config.indicators);
        Self {
            analyzer: MultiTimeframeAnalyzer::new(class, config.analysis).with_calculator(calculator.clone()),
            detector: CriticalChangeDetector::new(class, config.detection),
            calculator,
        }
    }

    pub fn for_symbol(symbol: &str) -> Self {
        Self::new(InstrumentClass::from_symbol(symbol), EngineConfig::default())
    }

    pub fn analyzer(&self) -> &MultiTimeframeAnalyzer {
        &self.analyzer
    }

    pub fn detector(&self) -> &CriticalChangeDetector {
        &self.detector
    }

    /// Evaluate one symbol. Fails only when `frames` is empty.
    pub fn evaluate(
        &mut self,
        symbol: &str,
        frames: &BTreeMap<Timeframe, CandleSeries>,
    ) -> Result<Evaluation, AnalysisError> {
        let computed: Vec<(Timeframe, IndicatorSeries, TimeframeSignal)> = frames
            .par_iter()
            .map(|(&tf, series)| {
                let indicators = self.calculator.compute(series);
                let signal = self.analyzer.analyze_with(tf, series.candles(), &indicators);
                (tf, indicators, signal)
            })
            .collect();

        let signals: BTreeMap<Timeframe, TimeframeSignal> =
            computed.iter().map(|(tf, _, s)| (*tf, s.clone())).collect();
        let consensus = self.analyzer.get_consensus_signal(&signals)?;

        let views: Vec<FrameView<'_>> = computed
            .iter()
            .filter_map(|(tf, indicators, signal)| {
                frames.get(tf).map(|series| FrameView {
                    timeframe: *tf,
                    candles: series.candles(),
                    indicators,
                    key_levels: &signal.key_levels,
                })
            })
            .collect();
        let alerts = self.detector.run_full_scan(&views);

        let snapshots = computed
            .iter()
            .map(|(tf, indicators, _)| (*tf, indicators.snapshot()))
            .collect();

        tracing::info!(
            symbol,
            direction = ?consensus.direction,
            strength = consensus.strength,
            confidence = consensus.confidence,
            alerts = alerts.len(),
            "evaluation complete"
        );

        Ok(Evaluation {
            symbol: symbol.to_string(),
            consensus,
            signals,
            snapshots,
            alerts,
        })
    }

    /// Pull candles through a gateway and evaluate them. Stale or missing
    /// inputs discount the consensus confidence.
    pub fn evaluate_feed<F: CandleFeed + 'static>(
        &mut self,
        gateway: &FeedGateway<F>,
        symbol: &str,
        timeframes: &[Timeframe],
        lookback: usize,
    ) -> Result<Evaluation, AnalysisError> {
        let (frames, degraded) = gateway.fetch_all(symbol, timeframes, lookback);
        let mut evaluation = self.evaluate(symbol, &frames)?;
        if degraded {
            evaluation.consensus = evaluation.consensus.degrade();
        }
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use crate::feed::SyntheticFeed;
    use std::time::Duration;

    fn synthetic_frames(symbol: &str, timeframes: &[Timeframe], n: usize) -> BTreeMap<Timeframe, CandleSeries> {
        let feed = SyntheticFeed::new(11);
        timeframes
            .iter()
            .map(|&tf| (tf, feed.get_candles(symbol, tf, n).unwrap()))
            .collect()
    }

    #[test]
    fn empty_frames_error() {
        let mut engine = SignalEngine::for_symbol("EURUSD");
        assert_eq!(engine.evaluate("EURUSD", &BTreeMap::new()), Err(AnalysisError::EmptyTimeframeMap));
    }

    #[test]
    fn evaluates_every_timeframe() {
        let tfs = [Timeframe::H1, Timeframe::H4, Timeframe::D1];
        let mut engine = SignalEngine::for_symbol("XAUUSD");
        let eval = engine.evaluate("XAUUSD", &synthetic_frames("XAUUSD", &tfs, 250)).unwrap();
        assert_eq!(eval.signals.len(), 3);
        assert_eq!(eval.snapshots.len(), 3);
        assert_eq!(eval.consensus.timeframe_count, 3);
        assert!(eval.dominant_snapshot().is_some());
        assert!((0.0..=100.0).contains(&eval.consensus.confidence));
    }

    #[test]
    fn zero_periods_do_not_panic() {
        let tfs = [Timeframe::H1, Timeframe::H4];
        let config = EngineConfig {
            indicators: IndicatorParams {
                atr_period: 0,
                adx_period: 0,
                rsi_period: 0,
                ..IndicatorParams::default()
            },
            ..EngineConfig::default()
        };
        let mut engine = SignalEngine::new(InstrumentClass::Metals, config);
        let eval = engine.evaluate("XAUUSD", &synthetic_frames("XAUUSD", &tfs, 250)).unwrap();
        assert_eq!(eval.signals.len(), 2);
        assert!(eval.snapshots.values().all(|s| s.atr == 0.0 && s.rsi == 50.0));
    }

    #[test]
    fn short_history_is_neutral() {
        let tfs = [Timeframe::H1, Timeframe::H4];
        let mut engine = SignalEngine::for_symbol("EURUSD");
        let eval = engine.evaluate("EURUSD", &synthetic_frames("EURUSD", &tfs, 20)).unwrap();
        assert_eq!(eval.consensus.direction, Direction::Neutral);
        assert!(eval.signals.values().all(|s| s.trend_quality == 0.0));
    }

    #[test]
    fn degraded_feed_discounts_confidence() {
        let tfs = [Timeframe::H1, Timeframe::H4];
        let gateway = FeedGateway::new(SyntheticFeed::new(11).with_capacity(100), Duration::from_secs(5));
        let mut engine = SignalEngine::for_symbol("EURUSD");
        let fresh = engine.evaluate_feed(&gateway, "EURUSD", &tfs, 100).unwrap();
        assert!(!fresh.consensus.degraded);

        // Over capacity: the feed refuses and the gateway serves its cache.
        let stale = engine.evaluate_feed(&gateway, "EURUSD", &tfs, 101).unwrap();
        assert!(stale.consensus.degraded);
        assert!((stale.consensus.confidence - fresh.consensus.confidence * 0.8).abs() < 1e-9);
    }
}
