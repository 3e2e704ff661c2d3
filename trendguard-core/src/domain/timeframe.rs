//! Timeframes and instrument classes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Candle interval. Variants are declared shortest → longest, so the derived
/// `Ord` sorts by duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
    #[serde(rename = "1M")]
    MN1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 9] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
        Timeframe::W1,
        Timeframe::MN1,
    ];

    /// Nominal interval length in minutes (a month counts as 30 days).
    pub fn minutes(&self) -> i64 {
        match self {
            Self::M1 => 1,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::M30 => 30,
            Self::H1 => 60,
            Self::H4 => 240,
            Self::D1 => 1_440,
            Self::W1 => 10_080,
            Self::MN1 => 43_200,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::D1 => "1d",
            Self::W1 => "1w",
            Self::MN1 => "1M",
        }
    }

    pub fn is_intraday(&self) -> bool {
        *self < Self::D1
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown timeframe: {0}")]
pub struct ParseTimeframeError(pub String);

impl FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "1M" (month) and "1m" (minute) differ only by case, so match exactly first.
        if let Some(tf) = Self::ALL.iter().find(|tf| tf.as_str() == s) {
            return Ok(*tf);
        }
        match s.to_ascii_lowercase().as_str() {
            "m1" => Ok(Self::M1),
            "m5" => Ok(Self::M5),
            "m15" => Ok(Self::M15),
            "m30" => Ok(Self::M30),
            "h1" | "60m" => Ok(Self::H1),
            "h4" | "240m" => Ok(Self::H4),
            "d1" | "1day" | "daily" => Ok(Self::D1),
            "w1" | "weekly" => Ok(Self::W1),
            "mn1" | "mn" | "monthly" => Ok(Self::MN1),
            _ => Err(ParseTimeframeError(s.to_string())),
        }
    }
}

/// Coarse instrument classification driving weight tables, RSI bands and lot size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentClass {
    Metals,
    Crypto,
    #[default]
    Forex,
}

const METAL_TOKENS: [&str; 6] = ["XAU", "XAG", "GOLD", "SILVER", "XPT", "XPD"];
const CRYPTO_TOKENS: [&str; 10] = [
    "BTC", "ETH", "SOL", "XRP", "DOGE", "ADA", "BNB", "USDT", "USDC", "LTC",
];

impl InstrumentClass {
    /// Classify a symbol by pattern-matching its name.
    pub fn from_symbol(symbol: &str) -> Self {
        let upper = symbol.to_ascii_uppercase();
        if METAL_TOKENS.iter().any(|t| upper.contains(t)) {
            Self::Metals
        } else if CRYPTO_TOKENS.iter().any(|t| upper.contains(t)) {
            Self::Crypto
        } else {
            Self::Forex
        }
    }
}
