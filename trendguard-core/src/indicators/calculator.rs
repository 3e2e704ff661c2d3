//! One pass over a candle series producing every indicator the analyzer and
//! the detector read.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::adx::adx_of_candles;
use super::atr::atr_of_candles;
use super::bollinger::bollinger_bands;
use super::ema::ema_of_series;
use super::last_valid;
use super::levels::{volume_ratio, vwap, PivotLevels};
use super::macd::macd_series;
use super::roc::roc_of_series;
use super::rsi::rsi_of_series;
use super::sma::sma_of_series;
use crate::domain::{Candle, CandleSeries};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    #[error("indicators.{0} must be at least 1")]
    ZeroPeriod(&'static str),

    #[error("indicators.macd_fast ({fast}) must be shorter than macd_slow ({slow})")]
    MacdOrder { fast: usize, slow: usize },

    #[error("indicators.bb_multiplier must be positive and finite, got {0}")]
    BandMultiplier(f64),
}

/// Indicator periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_multiplier: f64,
    pub atr_period: usize,
    pub adx_period: usize,
    pub sma_period: usize,
    pub ema_period: usize,
    pub volume_period: usize,
    pub roc_period: usize,
    /// Trend EMAs: short, medium, long, very long.
    pub trend_emas: [usize; 4],
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_multiplier: 2.0,
            atr_period: 14,
            adx_period: 14,
            sma_period: 20,
            ema_period: 12,
            volume_period: 20,
            roc_period: 10,
            trend_emas: [9, 21, 50, 200],
        }
    }
}

impl IndicatorParams {
    /// Rejects periods the indicators cannot use. The calculator itself
    /// tolerates them (the affected series stay NaN), so this is for
    /// settings loaded from outside.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let periods = [
            ("rsi_period", self.rsi_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("bb_period", self.bb_period),
            ("atr_period", self.atr_period),
            ("adx_period", self.adx_period),
            ("sma_period", self.sma_period),
            ("ema_period", self.ema_period),
            ("volume_period", self.volume_period),
            ("roc_period", self.roc_period),
            ("trend_emas", self.trend_emas.iter().copied().min().unwrap_or(0)),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, p)| *p == 0) {
            return Err(ParamsError::ZeroPeriod(*name));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(ParamsError::MacdOrder {
                fast: self.macd_fast,
                slow: self.macd_slow,
            });
        }
        if !(self.bb_multiplier.is_finite() && self.bb_multiplier > 0.0) {
            return Err(ParamsError::BandMultiplier(self.bb_multiplier));
        }
        Ok(())
    }
}

/// Full per-candle indicator series for one timeframe.
///
/// Every vector has the same length as the candle series; warm-up is NaN.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSeries {
    pub close: Vec<f64>,
    pub ema9: Vec<f64>,
    pub ema21: Vec<f64>,
    pub ema50: Vec<f64>,
    pub ema200: Vec<f64>,
    pub rsi: Vec<f64>,
    pub macd: Vec<f64>,
    pub macd_signal: Vec<f64>,
    pub macd_hist: Vec<f64>,
    pub atr: Vec<f64>,
    pub adx: Vec<f64>,
    pub bb_upper: Vec<f64>,
    pub bb_mid: Vec<f64>,
    pub bb_lower: Vec<f64>,
    pub sma20: Vec<f64>,
    pub ema12: Vec<f64>,
    pub volume_sma: Vec<f64>,
    /// Rate of change over `roc_period`, percent.
    pub roc: Vec<f64>,
    pub pivots: Option<PivotLevels>,
    pub vwap: Option<f64>,
    pub volume_ratio: Option<f64>,
}

fn latest(series: &[f64], fallback: f64) -> f64 {
    last_valid(series).unwrap_or(fallback)
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// Latest values, with neutral fallbacks for anything still warming up.
    pub fn snapshot(&self) -> IndicatorSnapshot {
        let close = self.close.last().copied().filter(|c| c.is_finite()).unwrap_or(0.0);
        let neutral = IndicatorSnapshot::neutral(close);

        IndicatorSnapshot {
            close,
            rsi: latest(&self.rsi, neutral.rsi),
            macd: latest(&self.macd, neutral.macd),
            macd_signal: latest(&self.macd_signal, neutral.macd_signal),
            macd_hist: latest(&self.macd_hist, neutral.macd_hist),
            bb_upper: latest(&self.bb_upper, neutral.bb_upper),
            bb_mid: latest(&self.bb_mid, neutral.bb_mid),
            bb_lower: latest(&self.bb_lower, neutral.bb_lower),
            atr: latest(&self.atr, neutral.atr),
            adx: latest(&self.adx, neutral.adx),
            sma20: latest(&self.sma20, neutral.sma20),
            ema12: latest(&self.ema12, neutral.ema12),
            volume_ratio: self.volume_ratio.unwrap_or(neutral.volume_ratio),
            pivot: self.pivots.map_or(neutral.pivot, |p| p.pivot),
            r1: self.pivots.map_or(neutral.r1, |p| p.r1),
            s1: self.pivots.map_or(neutral.s1, |p| p.s1),
            vwap: self.vwap.unwrap_or(neutral.vwap),
        }
    }
}

/// Latest indicator values for one timeframe. Never NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub bb_upper: f64,
    pub bb_mid: f64,
    pub bb_lower: f64,
    pub atr: f64,
    pub adx: f64,
    pub sma20: f64,
    pub ema12: f64,
    pub volume_ratio: f64,
    pub pivot: f64,
    pub r1: f64,
    pub s1: f64,
    pub vwap: f64,
}

impl IndicatorSnapshot {
    /// Neutral values: price-like fields sit at `close`, oscillators at rest.
    pub fn neutral(close: f64) -> Self {
        Self {
            close,
            rsi: 50.0,
            macd: 0.0,
            macd_signal: 0.0,
            macd_hist: 0.0,
            bb_upper: close,
            bb_mid: close,
            bb_lower: close,
            atr: 0.0,
            adx: 0.0,
            sma20: close,
            ema12: close,
            volume_ratio: 1.0,
            pivot: close,
            r1: close,
            s1: close,
            vwap: close,
        }
    }

    /// ATR as a percentage of price; 0 when price is unknown.
    pub fn atr_pct(&self) -> f64 {
        if self.close > 0.0 {
            self.atr / self.close * 100.0
        } else {
            0.0
        }
    }
}

/// Computes the fixed indicator set for a candle series.
#[derive(Debug, Clone, Default)]
pub struct IndicatorCalculator {
    params: IndicatorParams,
}

impl IndicatorCalculator {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    pub fn compute(&self, series: &CandleSeries) -> IndicatorSeries {
        self.compute_candles(series.candles())
    }

    /// Never panics on bad periods; series that cannot be computed stay NaN.
    pub fn compute_candles(&self, candles: &[Candle]) -> IndicatorSeries {
        let p = &self.params;
        let close: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let volume: Vec<f64> = candles.iter().map(|c| c.volume).collect();
        let macd = macd_series(&close, p.macd_fast, p.macd_slow, p.macd_signal);
        let bands = bollinger_bands(&close, p.bb_period, p.bb_multiplier);
        let [e_short, e_mid, e_long, e_very_long] = p.trend_emas;

        IndicatorSeries {
            ema9: ema_of_series(&close, e_short),
            ema21: ema_of_series(&close, e_mid),
            ema50: ema_of_series(&close, e_long),
            ema200: ema_of_series(&close, e_very_long),
            rsi: rsi_of_series(&close, p.rsi_period),
            macd: macd.macd,
            macd_signal: macd.signal,
            macd_hist: macd.histogram,
            atr: atr_of_candles(candles, p.atr_period),
            adx: adx_of_candles(candles, p.adx_period),
            bb_upper: bands.upper,
            bb_mid: bands.middle,
            bb_lower: bands.lower,
            sma20: sma_of_series(&close, p.sma_period),
            ema12: ema_of_series(&close, p.ema_period),
            volume_sma: sma_of_series(&volume, p.volume_period),
            roc: roc_of_series(&close, p.roc_period),
            pivots: PivotLevels::from_previous(candles),
            vwap: vwap(candles),
            volume_ratio: volume_ratio(candles, p.volume_period),
            close,
        }
    }

    pub fn snapshot(&self, series: &CandleSeries) -> IndicatorSnapshot {
        self.compute(series).snapshot()
    }
}
