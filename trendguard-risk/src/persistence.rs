//! Risk state persistence.
//!
//! The snapshot is serialized to a JSON string and wrapped in an envelope
//! carrying the schema version and a blake3 checksum of that string. Writes
//! go to a `.tmp` sibling first and are renamed into place.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::RiskMetrics;
use crate::position::TradeResult;
use crate::regime::{MarketRegime, VolatilityRegime};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state file I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("state serialization: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("checksum mismatch: expected {expected}, found {found}")]
    ChecksumMismatch { expected: String, found: String },

    #[error("unsupported schema version {0}")]
    UnsupportedSchema(u32),
}

/// Everything needed to resume an account after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub schema_version: u32,
    pub timestamp: DateTime<Utc>,
    pub initial_balance: f64,
    pub current_balance: f64,
    pub peak_balance: f64,
    pub consecutive_losses: u32,
    pub market_regime: MarketRegime,
    pub volatility_regime: VolatilityRegime,
    pub metrics: RiskMetrics,
    /// Most recent closed trades, oldest first.
    pub trades: Vec<TradeResult>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    schema_version: u32,
    checksum: String,
    payload: String,
}

/// Somewhere a snapshot can be kept between runs.
pub trait StateStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<StateSnapshot>, PersistError>;

    fn save(&self, snapshot: &StateSnapshot) -> Result<(), PersistError>;
}

/// Single JSON file store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

fn checksum(payload: &str) -> String {
    blake3::hash(payload.as_bytes()).to_hex().to_string()
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<StateSnapshot>, PersistError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let envelope: Envelope = serde_json::from_str(&content)?;
        if envelope.schema_version != SCHEMA_VERSION {
            return Err(PersistError::UnsupportedSchema(envelope.schema_version));
        }
        let found = checksum(&envelope.payload);
        if found != envelope.checksum {
            return Err(PersistError::ChecksumMismatch {
                expected: envelope.checksum,
                found,
            });
        }
        let snapshot: StateSnapshot = serde_json::from_str(&envelope.payload)?;
        if snapshot.schema_version != SCHEMA_VERSION {
            return Err(PersistError::UnsupportedSchema(snapshot.schema_version));
        }
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &StateSnapshot) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string(snapshot)?;
        let envelope = Envelope {
            schema_version: SCHEMA_VERSION,
            checksum: checksum(&payload),
            payload,
        };
        let tmp = self.tmp_path();
        fs::write(&tmp, serde_json::to_string_pretty(&envelope)?)?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            PersistError::Io(e)
        })?;
        Ok(())
    }
}
