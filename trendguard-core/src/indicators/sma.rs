//! Simple Moving Average (SMA).
//!
//! Rolling mean over a fixed window. First valid value at index period-1.
//! A NaN anywhere in the window makes that output NaN.

use super::Indicator;
use crate::domain::Candle;

/// Which candle field an SMA averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmaSource {
    Close,
    Volume,
}

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    source: SmaSource,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self::with_source(period, SmaSource::Close)
    }

    /// SMA of candle volume, used for volume ratios.
    pub fn volume(period: usize) -> Self {
        Self::with_source(period, SmaSource::Volume)
    }

    fn with_source(period: usize, source: SmaSource) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        let prefix = match source {
            SmaSource::Close => "sma",
            SmaSource::Volume => "volume_sma",
        };
        Self {
            period,
            source,
            name: format!("{prefix}_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let values: Vec<f64> = match self.source {
            SmaSource::Close => candles.iter().map(|c| c.close).collect(),
            SmaSource::Volume => candles.iter().map(|c| c.volume).collect(),
        };
        sma_of_series(&values, self.period)
    }
}

/// Rolling mean of an arbitrary series.
pub fn sma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut sum = 0.0;
    let mut nan_count = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            nan_count += 1;
        } else {
            sum += v;
        }
        if i >= period {
            let leaving = values[i - period];
            if leaving.is_nan() {
                nan_count -= 1;
            } else {
                sum -= leaving;
            }
        }
        if i + 1 >= period && nan_count == 0 {
            result[i] = sum / period as f64;
        }
    }
    result
}

/// Plain arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn sma_5_basic() {
        let candles = make_candles(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
        let result = Sma::new(5).compute(&candles);
        assert!(result[..4].iter().all(|v| v.is_nan()));
        assert_approx(result[4], 12.0, DEFAULT_EPSILON);
        assert_approx(result[5], 13.0, DEFAULT_EPSILON);
        assert_approx(result[6], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_nan_window_recovers() {
        let values = [10.0, 11.0, f64::NAN, 13.0, 14.0, 15.0];
        let result = sma_of_series(&values, 3);
        assert!(result[2].is_nan());
        assert!(result[3].is_nan());
        assert!(result[4].is_nan());
        assert_approx(result[5], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn volume_sma_reads_volume() {
        let mut candles = make_candles(&[1.0, 1.0, 1.0]);
        candles[2].volume = 4_000.0;
        let result = Sma::volume(3).compute(&candles);
        assert_approx(result[2], 2_000.0, DEFAULT_EPSILON);
        assert_eq!(Sma::volume(3).name(), "volume_sma_3");
    }

    #[test]
    fn sma_too_few_values() {
        assert!(sma_of_series(&[1.0, 2.0], 5).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn sma_lookback() {
        assert_eq!(Sma::new(20).lookback(), 19);
    }
}
