//! ADX, Average Directional Index (Wilder).
//!
//! 1. +DM / -DM from consecutive candles
//! 2. Wilder-smooth +DM, -DM and TR
//! 3. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 4. ADX = Wilder-smoothed DX
//!
//! The first candle has no predecessor, so the first ADX lands at 2 * period - 1.

use super::atr::{true_range, wilder_smooth};
use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            name: format!("adx_{period}"),
        }
    }
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        adx_of_candles(candles, self.period)
    }
}

/// ADX over `candles`. All NaN when `period` is 0.
pub fn adx_of_candles(candles: &[Candle], period: usize) -> Vec<f64> {
    let n = candles.len();
    if n < 2 {
        return vec![f64::NAN; n];
    }

    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];
    for i in 1..n {
        let up = candles[i].high - candles[i - 1].high;
        let down = candles[i - 1].low - candles[i].low;
        if up.is_nan() || down.is_nan() {
            continue;
        }
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    let mut tr = true_range(candles);
    tr[0] = f64::NAN;
    let smooth_tr = wilder_smooth(&tr, period);
    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);

    let mut dx = vec![f64::NAN; n];
    for i in 0..n {
        let (str_, sp, sm) = (smooth_tr[i], smooth_plus[i], smooth_minus[i]);
        if str_.is_nan() || sp.is_nan() || sm.is_nan() {
            continue;
        }
        if str_ == 0.0 {
            dx[i] = 0.0;
            continue;
        }
        let plus_di = 100.0 * sp / str_;
        let minus_di = 100.0 * sm / str_;
        let sum = plus_di + minus_di;
        dx[i] = if sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / sum
        };
    }

    wilder_smooth(&dx, period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, make_ohlc_candles};

    #[test]
    fn adx_bounds() {
        let candles = make_ohlc_candles(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (106.0, 107.0, 98.0, 99.0),
            (99.0, 103.0, 97.0, 101.0),
            (101.0, 106.0, 100.0, 105.0),
            (105.0, 110.0, 103.0, 108.0),
            (108.0, 112.0, 106.0, 110.0),
            (110.0, 111.0, 104.0, 105.0),
            (105.0, 109.0, 103.0, 107.0),
            (107.0, 113.0, 105.0, 112.0),
        ]);
        let result = Adx::new(3).compute(&candles);
        assert!(result[4].is_nan());
        assert!(!result[5].is_nan());
        for v in result.iter().filter(|v| !v.is_nan()) {
            assert!((0.0..=100.0).contains(v), "ADX out of bounds: {v}");
        }
    }

    #[test]
    fn adx_pure_uptrend_is_100() {
        // Every candle makes a higher high and higher low: -DM is always zero.
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + 2.0 * i as f64).collect();
        let result = Adx::new(5).compute(&make_candles(&closes));
        assert_approx(result[19], 100.0, 1e-9);
    }

    #[test]
    fn adx_short_series() {
        assert!(Adx::new(14).compute(&make_candles(&[1.0])).iter().all(|v| v.is_nan()));
    }
}
