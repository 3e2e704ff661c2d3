//! Price/RSI divergence and fading MACD momentum on a single timeframe.

use chrono::{DateTime, Utc};

use super::RsiBands;
use crate::domain::{AlertAction, AlertType, Candle, CriticalAlert, Severity};
use crate::indicators::{value_back, IndicatorSeries};

const LOOKBACK: usize = 3;
const WEAKENING_RSI: f64 = 60.0;

pub fn detect_exhaustion(
    candles: &[Candle],
    ind: &IndicatorSeries,
    bands: RsiBands,
    at: DateTime<Utc>,
) -> Option<CriticalAlert> {
    let close = candles.last()?.close;
    let prior_close = candles.len().checked_sub(LOOKBACK + 1).map(|i| candles[i].close)?;
    let rsi = value_back(&ind.rsi, 0)?;
    let prior_rsi = value_back(&ind.rsi, LOOKBACK)?;

    if close > prior_close && rsi < prior_rsi && rsi > bands.overbought {
        return Some(
            CriticalAlert::new(
                at,
                Severity::High,
                AlertType::BearishMomentumDivergence,
                AlertAction::CloseLongs,
                close,
                format!("Higher close with falling RSI {rsi:.1} above {:.0}", bands.overbought),
            )
            .with_indicator("rsi", rsi)
            .with_indicator("prior_rsi", prior_rsi),
        );
    }
    if close < prior_close && rsi > prior_rsi && rsi < bands.oversold {
        return Some(
            CriticalAlert::new(
                at,
                Severity::High,
                AlertType::BullishMomentumDivergence,
                AlertAction::CloseShorts,
                close,
                format!("Lower close with rising RSI {rsi:.1} below {:.0}", bands.oversold),
            )
            .with_indicator("rsi", rsi)
            .with_indicator("prior_rsi", prior_rsi),
        );
    }

    let h0 = value_back(&ind.macd_hist, 0)?;
    let h1 = value_back(&ind.macd_hist, 1)?;
    let h2 = value_back(&ind.macd_hist, 2)?;
    if h2 > h1 && h1 > h0 && rsi > WEAKENING_RSI {
        return Some(
            CriticalAlert::new(
                at,
                Severity::Medium,
                AlertType::MomentumWeakening,
                AlertAction::TightenStops,
                close,
                format!("MACD histogram falling three candles with RSI {rsi:.1}"),
            )
            .with_indicator("rsi", rsi)
            .with_indicator("macd_hist", h0),
        );
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_candles;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn indicators(rsi: Vec<f64>, hist: Vec<f64>) -> IndicatorSeries {
        IndicatorSeries {
            rsi,
            macd_hist: hist,
            ..IndicatorSeries::default()
        }
    }

    #[test]
    fn bearish_divergence_above_overbought() {
        let candles = make_candles(&[100.0, 101.0, 100.5, 102.0]);
        let ind = indicators(vec![80.0, 78.0, 76.0, 75.0], vec![0.0; 4]);
        let alert = detect_exhaustion(&candles, &ind, RsiBands::default(), at()).unwrap();
        assert_eq!(alert.alert_type, AlertType::BearishMomentumDivergence);
        assert_eq!(alert.action, AlertAction::CloseLongs);
        assert_eq!(alert.severity, Severity::High);
    }

    #[test]
    fn bullish_divergence_below_oversold() {
        let candles = make_candles(&[100.0, 99.0, 99.5, 98.0]);
        let ind = indicators(vec![20.0, 22.0, 24.0, 25.0], vec![0.0; 4]);
        let alert = detect_exhaustion(&candles, &ind, RsiBands::default(), at()).unwrap();
        assert_eq!(alert.alert_type, AlertType::BullishMomentumDivergence);
        assert_eq!(alert.action, AlertAction::CloseShorts);
    }

    #[test]
    fn crypto_bands_are_wider() {
        let candles = make_candles(&[100.0, 101.0, 100.5, 102.0]);
        let ind = indicators(vec![80.0, 78.0, 76.0, 72.0], vec![0.0; 4]);
        let crypto = RsiBands::new(25.0, 75.0);
        assert!(detect_exhaustion(&candles, &ind, crypto, at()).is_none());
        assert!(detect_exhaustion(&candles, &ind, RsiBands::default(), at()).is_some());
    }

    #[test]
    fn fading_histogram_weakens() {
        let candles = make_candles(&[100.0, 101.0, 102.0, 103.0]);
        let ind = indicators(vec![60.0, 62.0, 64.0, 65.0], vec![0.5, 0.4, 0.3, 0.2]);
        let alert = detect_exhaustion(&candles, &ind, RsiBands::default(), at()).unwrap();
        assert_eq!(alert.alert_type, AlertType::MomentumWeakening);
        assert_eq!(alert.severity, Severity::Medium);
        assert_eq!(alert.action, AlertAction::TightenStops);
    }

    #[test]
    fn quiet_market_is_silent() {
        let candles = make_candles(&[100.0, 100.5, 100.2, 100.4]);
        let ind = indicators(vec![50.0, 51.0, 50.5, 52.0], vec![0.1, 0.2, 0.1, 0.3]);
        assert!(detect_exhaustion(&candles, &ind, RsiBands::default(), at()).is_none());
    }
}
