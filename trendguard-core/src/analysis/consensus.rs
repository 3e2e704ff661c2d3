//! Weighted aggregation of per-timeframe signals.

use std::collections::BTreeMap;

use super::weights::WeightTable;
use super::AnalysisError;
use crate::domain::{ConsensusSignal, Direction, Timeframe, TimeframeSignal};

const HIGH_QUALITY: f64 = 70.0;
const THRESHOLD_HIGH_QUALITY: f64 = 55.0;
const THRESHOLD_DEFAULT: f64 = 60.0;
const CONFLICT_PENALTY: f64 = 20.0;
const LONG_AGREEMENT_BONUS: f64 = 10.0;

pub fn build_consensus(
    signals: &BTreeMap<Timeframe, TimeframeSignal>,
    table: &WeightTable,
) -> Result<ConsensusSignal, AnalysisError> {
    if signals.is_empty() {
        return Err(AnalysisError::EmptyTimeframeMap);
    }
    let n = signals.len();
    let base = table.resolve(signals.keys().copied());

    let mut weights: BTreeMap<Timeframe, f64> = signals
        .iter()
        .map(|(tf, s)| (*tf, base[tf] * s.trend_quality / 100.0))
        .collect();
    if weights.values().all(|w| *w <= 0.0) {
        weights = base.clone();
    }

    let (mut bull, mut bear, mut neutral) = (0.0, 0.0, 0.0);
    for (tf, s) in signals {
        let ws = weights[tf] * s.strength;
        match s.direction {
            Direction::Bullish => bull += ws,
            Direction::Bearish => bear += ws,
            Direction::Neutral => neutral += ws,
        }
    }
    let total = bull + bear + neutral;
    let (bullish_score, bearish_score, neutral_score) = if total > 0.0 {
        (bull / total, bear / total, neutral / total)
    } else {
        (0.0, 0.0, 1.0)
    };

    let quality = signals.values().map(|s| s.trend_quality).sum::<f64>() / n as f64;
    let threshold = if quality > HIGH_QUALITY {
        THRESHOLD_HIGH_QUALITY
    } else {
        THRESHOLD_DEFAULT
    };
    let (bull_pct, bear_pct) = (bullish_score * 100.0, bearish_score * 100.0);
    let (direction, strength) = if bull_pct > bear_pct && bull_pct > threshold {
        (Direction::Bullish, bull_pct)
    } else if bear_pct > bull_pct && bear_pct > threshold {
        (Direction::Bearish, bear_pct)
    } else {
        (Direction::Neutral, 50.0)
    };

    let alignment = alignment(signals, &weights, direction);

    let has_bull = signals.values().any(|s| s.direction == Direction::Bullish);
    let has_bear = signals.values().any(|s| s.direction == Direction::Bearish);
    let mut confidence = 50.0
        + 0.5 * (alignment - 50.0)
        + 0.3 * (quality - 50.0)
        + (2.0 * n as f64).min(10.0);
    if has_bull && has_bear {
        confidence -= CONFLICT_PENALTY;
    }
    if longest_two_agree(signals) {
        confidence += LONG_AGREEMENT_BONUS;
    }

    Ok(ConsensusSignal {
        direction,
        strength: strength.clamp(0.0, 100.0),
        confidence: confidence.clamp(0.0, 100.0),
        alignment: alignment.clamp(0.0, 100.0),
        quality,
        dominant_timeframe: dominant_timeframe(signals, &base),
        bullish_score,
        bearish_score,
        neutral_score,
        timeframe_count: n,
        degraded: false,
    })
}

/// Weighted agreement with `consensus`, 0..=100.
fn alignment(
    signals: &BTreeMap<Timeframe, TimeframeSignal>,
    weights: &BTreeMap<Timeframe, f64>,
    consensus: Direction,
) -> f64 {
    let total: f64 = weights.values().sum();
    if total <= 0.0 {
        return 50.0;
    }
    let agreeing: f64 = signals
        .iter()
        .map(|(tf, s)| {
            let agreement = match (consensus, s.direction) {
                (Direction::Neutral, Direction::Neutral) => 1.0,
                (Direction::Neutral, _) => 0.5,
                (_, Direction::Neutral) => 0.5,
                (c, d) if c == d => 1.0,
                _ => 0.0,
            };
            weights[tf] * agreement
        })
        .sum();
    agreeing / total * 100.0
}

fn longest_two_agree(signals: &BTreeMap<Timeframe, TimeframeSignal>) -> bool {
    let mut longest = signals.values().rev();
    match (longest.next(), longest.next()) {
        (Some(a), Some(b)) => a.direction.is_directional() && a.direction == b.direction,
        _ => false,
    }
}

/// argmax(strength × table weight); ties go to the longer timeframe.
fn dominant_timeframe(
    signals: &BTreeMap<Timeframe, TimeframeSignal>,
    base: &BTreeMap<Timeframe, f64>,
) -> Timeframe {
    let mut best: Option<(Timeframe, f64)> = None;
    for (tf, s) in signals {
        let score = s.strength * base[tf];
        if best.map_or(true, |(_, b)| score >= b) {
            best = Some((*tf, score));
        }
    }
    best.map(|(tf, _)| tf).unwrap_or(Timeframe::H1)
}
