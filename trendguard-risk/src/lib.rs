//! TrendGuard Risk: adaptive position sizing and account risk control.
//!
//! - Fractional Kelly and VaR/CVaR estimates from the trade history
//! - Position sizing as a pipeline of pure, separately tested stages
//! - Portfolio limits reported as warnings and blocks
//! - Risk metrics and a composite risk score
//! - Account state behind one lock, persisted with a checksummed snapshot

pub mod config;
pub mod kelly;
pub mod limits;
pub mod manager;
pub mod metrics;
pub mod persistence;
pub mod position;
pub mod regime;
pub mod sizing;
pub mod var;

pub use config::{ConfigError, LimitConfig, RiskConfig};
pub use limits::RiskCheckResult;
pub use manager::{AdaptiveRiskManager, RiskManagerState};
pub use metrics::RiskMetrics;
pub use persistence::{JsonFileStore, PersistError, StateSnapshot, StateStore};
pub use position::{Position, TradeResult, TradeSide};
pub use regime::{MarketConditions, MarketRegime, VolatilityRegime};
pub use sizing::{PositionSizing, RiskParameters};

use thiserror::Error;

/// Hard failures of risk operations. Limit breaches are not errors; they are
/// reported through [`RiskCheckResult`].
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("entry {entry} and stop {stop} must both be positive")]
    InvalidPrice { entry: f64, stop: f64 },

    #[error("stop {stop} equals entry {entry}")]
    InvalidStopDistance { entry: f64, stop: f64 },

    #[error("open position limit of {max} reached")]
    PositionLimitReached { max: usize },

    #[error("a {side} position in {symbol} is already open")]
    DuplicatePosition { symbol: String, side: TradeSide },

    #[error("no open position with id {0}")]
    PositionNotFound(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<AdaptiveRiskManager>();
        require_sync::<AdaptiveRiskManager>();
        require_send::<RiskManagerState>();
        require_sync::<RiskManagerState>();
        require_send::<JsonFileStore>();
        require_sync::<JsonFileStore>();
        require_send::<RiskError>();
        require_sync::<RiskError>();
    }

    #[test]
    fn errors_render_their_inputs() {
        let err = RiskError::InvalidStopDistance { entry: 100.0, stop: 100.0 };
        assert_eq!(err.to_string(), "stop 100 equals entry 100");
        let err = RiskError::DuplicatePosition {
            symbol: "XAUUSD".into(),
            side: TradeSide::Buy,
        };
        assert_eq!(err.to_string(), "a BUY position in XAUUSD is already open");
    }
}
