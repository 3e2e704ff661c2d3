//! Domain types for TrendGuard

pub mod alert;
pub mod candle;
pub mod signal;
pub mod timeframe;

pub use alert::{AlertAction, AlertType, CriticalAlert, Severity};
pub use candle::{BodyDirection, Candle, CandleSeries, SeriesError};
pub use signal::{ConsensusSignal, Direction, MarketStructure, TimeframeSignal};
pub use timeframe::{InstrumentClass, ParseTimeframeError, Timeframe};

/// Symbol type alias
pub type Symbol = String;
