//! Open positions and closed-trade records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// A stop below the entry protects a long, above it a short.
    pub fn from_prices(entry: f64, stop: f64) -> Self {
        if stop <= entry {
            Self::Buy
        } else {
            Self::Sell
        }
    }

    /// +1 for longs, −1 for shorts.
    pub fn sign(&self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        })
    }
}

/// An open position. `size` is in instrument units, not lots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: u64,
    pub symbol: String,
    pub side: TradeSide,
    pub entry_price: f64,
    pub size: f64,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: Option<f64>,
}

impl Position {
    /// Signed profit of closing at `exit_price`.
    pub fn pnl_at(&self, exit_price: f64) -> f64 {
        self.side.sign() * (exit_price - self.entry_price) * self.size
    }

    pub fn notional(&self) -> f64 {
        self.entry_price * self.size
    }

    /// Move the stop toward the market, never away from it.
    ///
    /// Longs only accept a higher stop, shorts only a lower one. Returns the
    /// stop in force afterwards.
    pub fn tighten_stop(&mut self, new_stop: f64) -> f64 {
        let clamped = match (self.side, self.stop_loss) {
            (TradeSide::Buy, Some(current)) => new_stop.max(current),
            (TradeSide::Sell, Some(current)) => new_stop.min(current),
            (_, None) => new_stop,
        };
        self.stop_loss = Some(clamped);
        clamped
    }
}

/// A completed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub symbol: String,
    pub side: TradeSide,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub pnl: f64,
    /// Return on the entry notional, as a fraction.
    pub pnl_pct: f64,
    pub balance_after: f64,
}

impl TradeResult {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}
