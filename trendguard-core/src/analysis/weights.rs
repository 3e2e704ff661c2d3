//! Per-instrument timeframe weight tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{InstrumentClass, Timeframe};

/// Fixed weight per timeframe. Timeframes absent from the table weigh zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    weights: BTreeMap<Timeframe, f64>,
}

impl WeightTable {
    pub fn new(weights: BTreeMap<Timeframe, f64>) -> Self {
        Self { weights }
    }

    pub fn weight(&self, timeframe: Timeframe) -> f64 {
        self.weights.get(&timeframe).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Timeframe, f64)> + '_ {
        self.weights.iter().map(|(tf, w)| (*tf, *w))
    }

    /// Weights for the given timeframes, falling back to equal weights when
    /// none of them appear in the table.
    pub fn resolve<I>(&self, timeframes: I) -> BTreeMap<Timeframe, f64>
    where
        I: IntoIterator<Item = Timeframe>,
    {
        let mut resolved: BTreeMap<Timeframe, f64> =
            timeframes.into_iter().map(|tf| (tf, self.weight(tf))).collect();
        if !resolved.is_empty() && resolved.values().all(|w| *w <= 0.0) {
            let equal = 1.0 / resolved.len() as f64;
            resolved.values_mut().for_each(|w| *w = equal);
        }
        resolved
    }
}

/// Weight table for an instrument class.
pub fn configure_weights(class: InstrumentClass) -> WeightTable {
    use Timeframe::*;
    let pairs: &[(Timeframe, f64)] = match class {
        InstrumentClass::Metals => &[(M15, 0.10), (H1, 0.20), (H4, 0.30), (D1, 0.25), (W1, 0.15)],
        InstrumentClass::Crypto => &[(M5, 0.10), (M15, 0.15), (H1, 0.25), (H4, 0.30), (D1, 0.20)],
        InstrumentClass::Forex => &[(M15, 0.10), (H1, 0.20), (H4, 0.25), (D1, 0.30), (W1, 0.15)],
    };
    WeightTable::new(pairs.iter().copied().collect())
}
