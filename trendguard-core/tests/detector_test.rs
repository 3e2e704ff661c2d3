//! Change detector driven through `run_full_scan`, the way the engine calls it.

use chrono::{Duration, TimeZone, Utc};
use trendguard_core::detection::{CriticalChangeDetector, DetectionConfig, FrameView};
use trendguard_core::domain::{AlertAction, AlertType, Candle, InstrumentClass, Severity, Timeframe};
use trendguard_core::indicators::{IndicatorCalculator, IndicatorParams, IndicatorSeries};

fn ohlc(data: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Candle {
            time: base + Duration::hours(i as i64),
            open,
            high,
            low,
            close,
            volume: 1_000.0,
        })
        .collect()
}

/// Twin highs at 100.00 and 100.15, then a close at 99.70.
fn double_top_candles() -> Vec<Candle> {
    let highs = [
        99.0, 99.2, 99.4, 99.6, 100.00, 99.5, 99.3, 99.25, 99.2, 99.4, 99.6, 100.15, 99.6, 99.4, 99.2, 99.0, 98.9,
        99.2, 99.5, 99.8,
    ];
    let mut data: Vec<(f64, f64, f64, f64)> = highs.iter().map(|&h| (h - 0.3, h, h - 0.6, h - 0.2)).collect();
    let last = data.len() - 1;
    data[last] = (99.75, 99.8, 99.6, 99.7);
    ohlc(&data)
}

fn flat_candles(n: usize) -> Vec<Candle> {
    ohlc(&vec![(100.0, 100.5, 99.5, 100.0); n])
}

#[test]
fn double_top_surfaces_in_full_scan() {
    let candles = double_top_candles();
    let indicators = IndicatorCalculator::new(IndicatorParams::default()).compute_candles(&candles);
    let frame = FrameView {
        timeframe: Timeframe::H1,
        candles: &candles,
        indicators: &indicators,
        key_levels: &[],
    };

    let mut detector = CriticalChangeDetector::for_symbol("XAUUSD");
    let alerts = detector.run_full_scan(&[frame]);

    let top = alerts
        .iter()
        .find(|a| a.alert_type == AlertType::DoubleTopRejection)
        .expect("double top alert");
    assert_eq!(top.severity, Severity::High);
    assert_eq!(top.action, AlertAction::CloseLongs);
    assert_eq!(top.timestamp, candles[candles.len() - 1].time);
    assert!((top.indicators["peak_1"] - 100.00).abs() < 1e-9);
    assert!((top.indicators["peak_2"] - 100.15).abs() < 1e-9);

    assert!(alerts.windows(2).all(|w| w[0].severity >= w[1].severity));
    assert_eq!(detector.history_len(), alerts.len());
}

#[test]
fn divergence_between_timeframes() {
    let candles = flat_candles(30);
    let fast = IndicatorSeries {
        rsi: vec![50.0, 51.0, 52.0, 52.5, 53.0, 54.0],
        ..IndicatorSeries::default()
    };
    let slow = IndicatorSeries {
        rsi: vec![50.0, 49.0, 48.5, 47.0, 46.5, 46.0],
        ..IndicatorSeries::default()
    };
    let frames = [
        FrameView {
            timeframe: Timeframe::H4,
            candles: &candles,
            indicators: &slow,
            key_levels: &[],
        },
        FrameView {
            timeframe: Timeframe::H1,
            candles: &candles,
            indicators: &fast,
            key_levels: &[],
        },
    ];

    let mut detector = CriticalChangeDetector::for_symbol("EURUSD");
    let alerts = detector.run_full_scan(&frames);
    let divergence = alerts
        .iter()
        .find(|a| a.alert_type == AlertType::MultiTimeframeDivergence)
        .expect("divergence alert");
    assert_eq!(divergence.severity, Severity::High);
    assert_eq!(divergence.action, AlertAction::ReducePosition);
    assert!((divergence.indicators["rsi_delta"] - 8.0).abs() < 1e-9);
    assert!((divergence.price_level - 100.0).abs() < 1e-9);
}

#[test]
fn low_sensitivity_drops_minor_alerts() {
    let candles = flat_candles(30);
    let fast = IndicatorSeries {
        rsi: vec![50.0, 50.0, 50.0, 50.0, 50.0, 53.0],
        ..IndicatorSeries::default()
    };
    let slow = IndicatorSeries {
        rsi: vec![50.0, 50.0, 50.0, 50.0, 50.0, 47.0],
        ..IndicatorSeries::default()
    };
    let frames = [
        FrameView {
            timeframe: Timeframe::H1,
            candles: &candles,
            indicators: &fast,
            key_levels: &[],
        },
        FrameView {
            timeframe: Timeframe::H4,
            candles: &candles,
            indicators: &slow,
            key_levels: &[],
        },
    ];

    // Delta of 6 is MEDIUM: kept at full sensitivity, dropped at 0.4.
    let mut eager = CriticalChangeDetector::for_symbol("EURUSD");
    let kept = eager.run_full_scan(&frames);
    assert!(kept
        .iter()
        .any(|a| a.alert_type == AlertType::MultiTimeframeDivergence && a.severity == Severity::Medium));

    let config = DetectionConfig {
        sensitivity: 0.4,
        ..DetectionConfig::default()
    };
    let mut strict = CriticalChangeDetector::new(InstrumentClass::Forex, config);
    assert!(strict.run_full_scan(&frames).iter().all(|a| a.severity >= Severity::High));
}

#[test]
fn history_is_bounded() {
    let candles = double_top_candles();
    let indicators = IndicatorCalculator::new(IndicatorParams::default()).compute_candles(&candles);
    let frame = FrameView {
        timeframe: Timeframe::H1,
        candles: &candles,
        indicators: &indicators,
        key_levels: &[],
    };

    let config = DetectionConfig {
        history_limit: 3,
        ..DetectionConfig::default()
    };
    let mut detector = CriticalChangeDetector::new(InstrumentClass::Metals, config);
    for _ in 0..5 {
        detector.run_full_scan(&[frame]);
    }
    assert!(detector.history_len() <= 3);
    assert!(detector.history().all(|a| a.timestamp == candles[candles.len() - 1].time));
}

#[test]
fn frames_without_candles_are_skipped() {
    let indicators = IndicatorSeries::default();
    let frame = FrameView {
        timeframe: Timeframe::D1,
        candles: &[],
        indicators: &indicators,
        key_levels: &[],
    };
    let mut detector = CriticalChangeDetector::for_symbol("BTCUSD");
    assert!(detector.run_full_scan(&[frame]).is_empty());
}
