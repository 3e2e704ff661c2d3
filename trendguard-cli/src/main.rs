//! TrendGuard CLI: evaluate candles, size trades, inspect account risk.
//!
//! Commands:
//! - `evaluate` — multi-timeframe consensus and alerts from CSV candle files
//! - `demo` — the same evaluation on synthetic candles, plus a sized trade
//! - `size` — position size and risk parameters for a trade idea
//! - `limits` — risk limit check against a persisted account
//! - `metrics` — risk metrics of a persisted account

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use trendguard_core::analysis::AnalysisConfig;
use trendguard_core::detection::DetectionConfig;
use trendguard_core::domain::{Candle, CandleSeries, Direction, InstrumentClass, Timeframe};
use trendguard_core::feed::{FeedGateway, SyntheticFeed};
use trendguard_core::indicators::IndicatorParams;
use trendguard_core::{EngineConfig, Evaluation, SignalEngine};
use trendguard_risk::regime::alert_pressure;
use trendguard_risk::{
    AdaptiveRiskManager, JsonFileStore, MarketConditions, MarketRegime, RiskConfig, RiskParameters,
};

#[derive(Parser)]
#[command(
    name = "trendguard",
    about = "TrendGuard CLI — multi-timeframe signals and adaptive risk"
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. info, debug, trendguard_risk=trace).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// TOML file with [indicators], [analysis], [detection] and [risk] tables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a symbol from CSV candle files, one per timeframe.
    Evaluate {
        #[arg(long)]
        symbol: String,

        /// TIMEFRAME=PATH, repeatable (e.g. --candles 1h=eurusd_1h.csv).
        #[arg(long = "candles", required = true)]
        candles: Vec<String>,
    },
    /// Evaluate synthetic candles and size a trade in the consensus direction.
    Demo {
        #[arg(long, default_value = "XAUUSD")]
        symbol: String,

        /// Candles per timeframe.
        #[arg(long, default_value_t = 250)]
        candles: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Comma-separated timeframes.
        #[arg(long, default_value = "1h,4h,1d", value_delimiter = ',')]
        timeframes: Vec<String>,
    },
    /// Size a position for a trade idea.
    Size {
        #[arg(long)]
        symbol: String,

        #[arg(long)]
        entry: f64,

        #[arg(long)]
        stop: f64,

        /// Signal confidence, 0-100.
        #[arg(long, default_value_t = 50.0)]
        confidence: f64,

        /// Market volatility, 0-100.
        #[arg(long, default_value_t = 20.0)]
        volatility: f64,

        /// Correlation to the open portfolio. Derived from open positions when omitted.
        #[arg(long)]
        correlation: Option<f64>,

        /// Persisted account state. A fresh account is used when omitted.
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Check risk limits of a persisted account.
    Limits {
        #[arg(long)]
        state: PathBuf,
    },
    /// Risk metrics of a persisted account.
    Metrics {
        #[arg(long)]
        state: PathBuf,
    },
}

/// Settings file layout. Missing tables keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    indicators: IndicatorParams,
    analysis: AnalysisConfig,
    detection: DetectionConfig,
    risk: RiskConfig,
}

impl AppConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("loading config {}", path.display()))
    }

    fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.indicators.validate()?;
        config.risk.validate()?;
        Ok(config)
    }

    fn engine(&self) -> EngineConfig {
        EngineConfig {
            indicators: self.indicators.clone(),
            analysis: self.analysis.clone(),
            detection: self.detection.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Evaluate { symbol, candles } => run_evaluate(&config, &symbol, &candles),
        Commands::Demo {
            symbol,
            candles,
            seed,
            timeframes,
        } => run_demo(&config, &symbol, candles, seed, &timeframes),
        Commands::Size {
            symbol,
            entry,
            stop,
            confidence,
            volatility,
            correlation,
            state,
        } => {
            let manager = open_manager(&config, state.as_deref());
            let params = manager.size_position(&symbol, entry, stop, confidence, volatility, correlation)?;
            print_json(&params)
        }
        Commands::Limits { state } => {
            let manager = open_manager(&config, Some(&state));
            print_json(&manager.check_risk_limits())
        }
        Commands::Metrics { state } => {
            let manager = open_manager(&config, Some(&state));
            print_json(&manager.get_risk_metrics())
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_manager(config: &AppConfig, state: Option<&Path>) -> AdaptiveRiskManager {
    match state {
        Some(path) => AdaptiveRiskManager::with_store(config.risk.clone(), JsonFileStore::new(path)),
        None => AdaptiveRiskManager::new(config.risk.clone()),
    }
}

fn run_evaluate(config: &AppConfig, symbol: &str, specs: &[String]) -> Result<()> {
    let mut frames = BTreeMap::new();
    for spec in specs {
        let (timeframe, path) = parse_candle_spec(spec)?;
        let series = load_candles(symbol, timeframe, &path)?;
        tracing::debug!(%timeframe, candles = series.len(), path = %path.display(), "loaded candles");
        if frames.insert(timeframe, series).is_some() {
            bail!("timeframe {timeframe} given more than once");
        }
    }

    let mut engine = SignalEngine::new(InstrumentClass::from_symbol(symbol), config.engine());
    let evaluation = engine.evaluate(symbol, &frames)?;
    print_json(&evaluation)
}

/// `1h=path/to/file.csv` → (H1, path).
fn parse_candle_spec(spec: &str) -> Result<(Timeframe, PathBuf)> {
    let Some((tf, path)) = spec.split_once('=') else {
        bail!("expected TIMEFRAME=PATH, got '{spec}'");
    };
    let timeframe: Timeframe = tf.trim().parse()?;
    Ok((timeframe, PathBuf::from(path.trim())))
}

/// Read `time,open,high,low,close,volume` rows (RFC 3339 times) into a series.
fn load_candles(symbol: &str, timeframe: Timeframe, path: &Path) -> Result<CandleSeries> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("opening candle file {}", path.display()))?;
    let mut candles = Vec::new();
    for (row, record) in reader.deserialize::<Candle>().enumerate() {
        let candle = record.with_context(|| format!("{} row {}", path.display(), row + 1))?;
        candles.push(candle);
    }
    let series = CandleSeries::new(symbol, timeframe, candles)
        .with_context(|| format!("candles in {}", path.display()))?;
    Ok(series)
}

#[derive(Debug, Serialize)]
struct DemoReport {
    evaluation: Evaluation,
    regime: MarketRegime,
    conditions: Option<MarketConditions>,
    trade: Option<RiskParameters>,
}

const ATR_STOP_MULTIPLE: f64 = 2.0;

fn run_demo(config: &AppConfig, symbol: &str, candles: usize, seed: u64, timeframes: &[String]) -> Result<()> {
    let timeframes = timeframes
        .iter()
        .map(|tf| tf.trim().parse::<Timeframe>())
        .collect::<Result<Vec<_>, _>>()?;
    if timeframes.is_empty() {
        bail!("at least one timeframe is required");
    }

    let gateway = FeedGateway::new(SyntheticFeed::new(seed), Duration::from_secs(5));
    let mut engine = SignalEngine::new(InstrumentClass::from_symbol(symbol), config.engine());
    let evaluation = engine.evaluate_feed(&gateway, symbol, &timeframes, candles)?;

    let manager = AdaptiveRiskManager::new(config.risk.clone());
    let consensus = &evaluation.consensus;
    let conditions = evaluation
        .dominant_snapshot()
        .map(|snapshot| (MarketConditions::from_evaluation(consensus, snapshot), snapshot.close, snapshot.atr));

    let mut trade = None;
    if let Some((conditions, close, atr)) = conditions {
        manager.apply_market_conditions(&conditions);
        let offset = ATR_STOP_MULTIPLE * atr;
        let stop = match consensus.direction {
            Direction::Bullish => Some(close - offset),
            Direction::Bearish => Some(close + offset),
            Direction::Neutral => None,
        };
        if let Some(stop) = stop.filter(|s| *s > 0.0 && offset > 0.0) {
            let confidence = alert_pressure(consensus.confidence, &evaluation.alerts);
            trade = Some(manager.size_position(symbol, close, stop, confidence, conditions.volatility, None)?);
        }
    }

    print_json(&DemoReport {
        regime: manager.market_regime(),
        conditions: conditions.map(|(c, _, _)| c),
        trade,
        evaluation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn candle_spec_parses() {
        let (tf, path) = parse_candle_spec("4h=data/eurusd_4h.csv").unwrap();
        assert_eq!(tf, Timeframe::H4);
        assert_eq!(path, PathBuf::from("data/eurusd_4h.csv"));
        assert!(parse_candle_spec("data.csv").is_err());
        assert!(parse_candle_spec("7x=data.csv").is_err());
    }

    #[test]
    fn config_tables_are_optional() {
        let config = AppConfig::from_toml("[risk]\nmax_risk_per_trade = 0.01\n").unwrap();
        assert_eq!(config.risk.max_risk_per_trade, 0.01);
        assert_eq!(config.analysis, AnalysisConfig::default());
        assert!(AppConfig::from_toml("[risk]\nmax_risk_per_trade = 2.0\n").is_err());
    }

    #[test]
    fn bad_indicator_periods_are_rejected() {
        let err = AppConfig::from_toml("[indicators]\natr_period = 0\n").unwrap_err();
        assert!(err.to_string().contains("atr_period"), "{err}");
        assert!(AppConfig::from_toml("[indicators]\nmacd_fast = 30\n").is_err());
        assert!(AppConfig::from_toml("[indicators]\nroc_period = 5\n").is_ok());
    }

    #[test]
    fn csv_candles_load_in_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time,open,high,low,close,volume").unwrap();
        writeln!(file, "2024-01-02T00:00:00Z,1.1000,1.1020,1.0990,1.1010,1200").unwrap();
        writeln!(file, "2024-01-02T01:00:00Z,1.1010,1.1030,1.1000,1.1025,900").unwrap();
        let series = load_candles("EURUSD", Timeframe::H1, file.path()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.candles()[1].close, 1.1025);

        writeln!(file, "2024-01-02T00:30:00Z,1.1,1.1,1.1,1.1,1").unwrap();
        assert!(load_candles("EURUSD", Timeframe::H1, file.path()).is_err());
    }
}
