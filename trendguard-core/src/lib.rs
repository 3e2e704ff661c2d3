//! TrendGuard Core: domain types, indicators, multi-timeframe consensus,
//! critical-change detection.
//!
//! - Candle series, timeframes, signals and alerts
//! - One indicator calculator shared by the analyzer and the detector
//! - Per-timeframe scoring and weighted consensus
//! - Independent change detectors with severity-ranked dedupe
//! - Candle feeds behind a deadline-bounded gateway
//! - `SignalEngine`, the facade that ties them together

pub mod analysis;
pub mod detection;
pub mod domain;
pub mod engine;
pub mod feed;
pub mod indicators;

pub use engine::{EngineConfig, Evaluation, SignalEngine};
