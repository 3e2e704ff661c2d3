//! Risk configuration, loadable from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Warn/block pair for one risk limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold<T> {
    pub warn: T,
    pub block: T,
}

/// Portfolio-level limits checked before every new trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Realised daily loss limit as a fraction of initial capital.
    pub daily_loss: f64,
    /// Realised weekly loss limit as a fraction of initial capital.
    pub weekly_loss: f64,
    /// Fraction of a loss limit at which a warning is raised.
    pub loss_warn_fraction: f64,
    pub consecutive_losses: Threshold<u32>,
    pub drawdown: Threshold<f64>,
    pub open_positions: Threshold<usize>,
    pub leverage: Threshold<f64>,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            daily_loss: 0.05,
            weekly_loss: 0.10,
            loss_warn_fraction: 0.75,
            consecutive_losses: Threshold { warn: 3, block: 5 },
            drawdown: Threshold { warn: 0.10, block: 0.15 },
            open_positions: Threshold { warn: 5, block: 7 },
            leverage: Threshold { warn: 2.0, block: 3.0 },
        }
    }
}

/// One symmetric entry of the correlation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub a: String,
    pub b: String,
    pub rho: f64,
}

impl CorrelationPair {
    fn new(a: &str, b: &str, rho: f64) -> Self {
        Self {
            a: a.to_string(),
            b: b.to_string(),
            rho,
        }
    }
}

/// Fixed pairwise correlations between symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationTable {
    pairs: Vec<CorrelationPair>,
}

impl CorrelationTable {
    pub fn new(pairs: Vec<CorrelationPair>) -> Self {
        Self { pairs }
    }

    /// Correlation between two symbols. Symmetric; 1.0 on the diagonal and
    /// 0.0 for pairs the table does not list.
    pub fn lookup(&self, a: &str, b: &str) -> f64 {
        if a.eq_ignore_ascii_case(b) {
            return 1.0;
        }
        self.pairs
            .iter()
            .find(|p| {
                (p.a.eq_ignore_ascii_case(a) && p.b.eq_ignore_ascii_case(b))
                    || (p.a.eq_ignore_ascii_case(b) && p.b.eq_ignore_ascii_case(a))
            })
            .map_or(0.0, |p| p.rho)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new(vec![
            CorrelationPair::new("EURUSD", "GBPUSD", 0.85),
            CorrelationPair::new("EURUSD", "USDCHF", -0.90),
            CorrelationPair::new("EURUSD", "AUDUSD", 0.70),
            CorrelationPair::new("GBPUSD", "USDCHF", -0.75),
            CorrelationPair::new("AUDUSD", "NZDUSD", 0.90),
            CorrelationPair::new("USDJPY", "USDCHF", 0.60),
            CorrelationPair::new("XAUUSD", "XAGUSD", 0.80),
            CorrelationPair::new("XAUUSD", "EURUSD", 0.40),
            CorrelationPair::new("XAUUSD", "USDCHF", -0.45),
            CorrelationPair::new("BTCUSD", "ETHUSD", 0.85),
            CorrelationPair::new("BTCUSD", "SOLUSD", 0.75),
            CorrelationPair::new("ETHUSD", "SOLUSD", 0.80),
        ])
    }
}

/// Everything the adaptive risk manager is calibrated with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub initial_balance: f64,
    /// Fraction of the balance risked per trade before adjustments.
    pub max_risk_per_trade: f64,
    /// Conservative multiplier applied to the raw Kelly fraction.
    pub kelly_fraction: f64,
    pub min_kelly: f64,
    pub max_kelly: f64,
    /// Closed trades required before Kelly sizing takes part.
    pub kelly_min_trades: usize,
    /// Trailing trades feeding the Kelly statistics.
    pub kelly_window: usize,
    /// Returns required before VaR adjusts the size.
    pub var_min_samples: usize,
    /// Position size bounds, in lots.
    pub min_size: f64,
    pub max_size: f64,
    /// Take-profit distance in multiples of the stop distance.
    pub take_profit_r: f64,
    pub max_open_positions: usize,
    /// Closed trades kept in history and persisted.
    pub history_limit: usize,
    /// Annual risk-free rate used by Sharpe and Sortino.
    pub risk_free_rate: f64,
    pub limits: LimitConfig,
    pub correlations: CorrelationTable,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            max_risk_per_trade: 0.02,
            kelly_fraction: 0.25,
            min_kelly: 0.01,
            max_kelly: 0.25,
            kelly_min_trades: 10,
            kelly_window: 50,
            var_min_samples: 20,
            min_size: 0.01,
            max_size: 5.0,
            take_profit_r: 2.0,
            max_open_positions: 7,
            history_limit: 100,
            risk_free_rate: 0.02,
            limits: LimitConfig::default(),
            correlations: CorrelationTable::default(),
        }
    }
}

impl RiskConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_balance > 0.0) {
            return Err(ConfigError::Invalid("initial_balance must be positive".into()));
        }
        if !(self.max_risk_per_trade > 0.0 && self.max_risk_per_trade < 1.0) {
            return Err(ConfigError::Invalid("max_risk_per_trade must be in (0, 1)".into()));
        }
        if self.min_kelly > self.max_kelly {
            return Err(ConfigError::Invalid(format!(
                "min_kelly {} exceeds max_kelly {}",
                self.min_kelly, self.max_kelly
            )));
        }
        if !(self.min_size > 0.0) || self.min_size > self.max_size {
            return Err(ConfigError::Invalid(format!(
                "size bounds [{}, {}] are not a positive range",
                self.min_size, self.max_size
            )));
        }
        if self.take_profit_r <= 0.0 {
            return Err(ConfigError::Invalid("take_profit_r must be positive".into()));
        }
        Ok(())
    }
}
