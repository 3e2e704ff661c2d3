//! MACD: EMA(fast) - EMA(slow), with an EMA(signal) of that line.
//!
//! The signal EMA seeds on the first `signal` valid MACD values, so the first
//! signal/histogram value lands at index (slow - 1) + (signal - 1).

use super::ema::ema_of_series;
use super::Indicator;
use crate::domain::Candle;

/// Which MACD output to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdLine {
    Macd,
    Signal,
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    line: MacdLine,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize, line: MacdLine) -> Self {
        assert!(fast >= 1 && signal >= 1, "MACD periods must be >= 1");
        assert!(fast < slow, "MACD fast period must be shorter than slow");
        let label = match line {
            MacdLine::Macd => "line",
            MacdLine::Signal => "signal",
            MacdLine::Histogram => "hist",
        };
        Self {
            fast,
            slow,
            signal,
            line,
            name: format!("macd_{label}_{fast}_{slow}_{signal}"),
        }
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.line {
            MacdLine::Macd => self.slow - 1,
            MacdLine::Signal | MacdLine::Histogram => self.slow + self.signal - 2,
        }
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let series = macd_series(&closes, self.fast, self.slow, self.signal);
        match self.line {
            MacdLine::Macd => series.macd,
            MacdLine::Signal => series.signal,
            MacdLine::Histogram => series.histogram,
        }
    }
}

/// MACD line, signal line and histogram for one input.
#[derive(Debug, Clone, Default)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd_series(values: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let ema_fast = ema_of_series(values, fast);
    let ema_slow = ema_of_series(values, slow);
    let macd: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_of_series(&macd, signal);
    let histogram = macd
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect();
    MacdSeries {
        macd,
        signal: signal_line,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn constant_price_is_flat() {
        let series = macd_series(&[50.0; 40], 12, 26, 9);
        assert!(series.macd[24].is_nan());
        assert_approx(series.macd[25], 0.0, DEFAULT_EPSILON);
        assert!(series.signal[32].is_nan());
        assert_approx(series.signal[33], 0.0, DEFAULT_EPSILON);
        assert_approx(series.histogram[39], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn macd_is_ema_difference() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let series = macd_series(&closes, 2, 4, 3);
        let fast = ema_of_series(&closes, 2);
        let slow = ema_of_series(&closes, 4);
        for i in 3..10 {
            assert_approx(series.macd[i], fast[i] - slow[i], DEFAULT_EPSILON);
        }
        // Linear ramp: both EMAs lag by a fixed amount, so the line is constant.
        assert_approx(series.macd[9], series.macd[5], 1e-9);
        assert!(series.macd[9] > 0.0);
    }

    #[test]
    fn histogram_is_line_minus_signal() {
        let candles = make_candles(&[1.0, 3.0, 2.0, 5.0, 4.0, 6.0, 8.0, 7.0, 9.0, 12.0]);
        let line = Macd::new(2, 4, 3, MacdLine::Macd).compute(&candles);
        let signal = Macd::new(2, 4, 3, MacdLine::Signal).compute(&candles);
        let hist = Macd::new(2, 4, 3, MacdLine::Histogram).compute(&candles);
        assert!(hist[4].is_nan());
        for i in 5..10 {
            assert_approx(hist[i], line[i] - signal[i], DEFAULT_EPSILON);
        }
    }

    #[test]
    fn lookback() {
        assert_eq!(Macd::new(12, 26, 9, MacdLine::Histogram).lookback(), 33);
    }
}
