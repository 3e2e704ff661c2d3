//! Candle sources and the deadline-bounded gateway in front of them.
//!
//! A `CandleFeed` is the data collaborator. `FeedGateway` is what callers
//! use: it hands each fetch to its single worker thread, waits at most the
//! configured deadline, and falls back to the last good series it saw
//! (flagged as degraded) when the feed is slow or failing. A stalled feed
//! holds up only that one worker; requests whose caller already gave up
//! are dropped without calling the feed.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::domain::{Candle, CandleSeries, InstrumentClass, SeriesError, Timeframe};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{symbol} {timeframe}: {available} candles available, {required} required")]
    DataUnavailable {
        symbol: String,
        timeframe: Timeframe,
        required: usize,
        available: usize,
    },

    #[error("feed returned an invalid series: {0}")]
    InvalidSeries(#[from] SeriesError),

    #[error("feed error: {0}")]
    Backend(String),
}

/// Source of ordered candles for a (symbol, timeframe).
pub trait CandleFeed: Send + Sync {
    /// The most recent `lookback` candles. Fails with `DataUnavailable` when
    /// fewer exist.
    fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<CandleSeries, FeedError>;
}

/// Deterministic random-walk candles.
///
/// Each (seed, symbol, timeframe) gets its own BLAKE3-derived sub-seed, so
/// the same request always yields the same series regardless of call order.
#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    master_seed: u64,
    end: DateTime<Utc>,
    capacity: usize,
}

impl SyntheticFeed {
    pub fn new(master_seed: u64) -> Self {
        Self {
            master_seed,
            end: Utc.with_ymd_and_hms(2024, 6, 28, 16, 0, 0).single().unwrap_or_default(),
            capacity: 5_000,
        }
    }

    /// Timestamp of the newest candle.
    pub fn ending_at(mut self, end: DateTime<Utc>) -> Self {
        self.end = end;
        self
    }

    /// Largest series the feed will produce.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn sub_seed(&self, symbol: &str, timeframe: Timeframe) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        hasher.update(timeframe.as_str().as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    fn generate(&self, symbol: &str, timeframe: Timeframe, n: usize) -> Vec<Candle> {
        let mut rng = StdRng::seed_from_u64(self.sub_seed(symbol, timeframe));
        let mut price: f64 = match InstrumentClass::from_symbol(symbol) {
            InstrumentClass::Metals => 2_000.0,
            InstrumentClass::Crypto => 40_000.0,
            InstrumentClass::Forex => 1.1,
        };
        // Per-candle volatility grows with the square root of the interval.
        let sigma = 0.002 * (timeframe.minutes() as f64 / 60.0).sqrt();
        let drift = rng.gen_range(-0.15_f64..0.15) * sigma;
        let step = chrono::Duration::minutes(timeframe.minutes());
        let start = self.end - step * (n.saturating_sub(1) as i32);

        let mut candles = Vec::with_capacity(n);
        for i in 0..n {
            let open = price;
            let ret = drift + sigma * (rng.gen::<f64>() + rng.gen::<f64>() + rng.gen::<f64>() - 1.5);
            let close = (open * (1.0 + ret)).max(f64::MIN_POSITIVE);
            let wick_up = rng.gen::<f64>() * sigma * 0.5;
            let wick_down = rng.gen::<f64>() * sigma * 0.5;
            candles.push(Candle {
                time: start + step * i as i32,
                open,
                high: open.max(close) * (1.0 + wick_up),
                low: open.min(close) * (1.0 - wick_down),
                close,
                volume: (1_000.0 * rng.gen_range(0.5_f64..1.5)).round(),
            });
            price = close;
        }
        candles
    }
}

impl CandleFeed for SyntheticFeed {
    fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<CandleSeries, FeedError> {
        if lookback > self.capacity {
            return Err(FeedError::DataUnavailable {
                symbol: symbol.to_string(),
                timeframe,
                required: lookback,
                available: self.capacity,
            });
        }
        let candles = self.generate(symbol, timeframe, lookback);
        Ok(CandleSeries::new(symbol, timeframe, candles)?)
    }
}

/// In-memory feed over preloaded series.
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    series: HashMap<(String, Timeframe), CandleSeries>,
}

impl StaticFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, series: CandleSeries) {
        self.series
            .insert((series.symbol().to_string(), series.timeframe()), series);
    }

    pub fn with(mut self, series: CandleSeries) -> Self {
        self.insert(series);
        self
    }
}

impl CandleFeed for StaticFeed {
    fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<CandleSeries, FeedError> {
        let available = self
            .series
            .get(&(symbol.to_string(), timeframe))
            .map_or(0, CandleSeries::len);
        match self.series.get(&(symbol.to_string(), timeframe)) {
            Some(series) if series.len() >= lookback => Ok(series.tail(lookback)),
            _ => Err(FeedError::DataUnavailable {
                symbol: symbol.to_string(),
                timeframe,
                required: lookback,
                available,
            }),
        }
    }
}

/// Result of one gateway fetch.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub series: CandleSeries,
    /// True when `series` is a cached copy or an empty stand-in.
    pub degraded: bool,
}

type FeedReply = Result<CandleSeries, FeedError>;

/// One queued fetch for the gateway worker.
struct FetchJob {
    symbol: String,
    timeframe: Timeframe,
    lookback: usize,
    expires: Instant,
    reply: mpsc::Sender<FeedReply>,
}

/// Deadline-bounded access to a feed with a last-good cache.
pub struct FeedGateway<F: CandleFeed + 'static> {
    jobs: Option<mpsc::Sender<FetchJob>>,
    deadline: Duration,
    cache: Mutex<HashMap<(String, Timeframe), CandleSeries>>,
    _feed: PhantomData<fn() -> F>,
}

impl<F: CandleFeed + 'static> FeedGateway<F> {
    /// Starts the worker thread that owns `feed`. If the thread cannot be
    /// spawned every fetch degrades to the cache.
    pub fn new(feed: F, deadline: Duration) -> Self {
        let (tx, rx) = mpsc::channel::<FetchJob>();
        let jobs = match thread::Builder::new()
            .name("candle-feed".to_string())
            .spawn(move || run_worker(feed, rx))
        {
            Ok(_) => Some(tx),
            Err(e) => {
                tracing::error!(error = %e, "could not start candle feed worker");
                None
            }
        };
        Self {
            jobs,
            deadline,
            cache: Mutex::new(HashMap::new()),
            _feed: PhantomData,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Fetch one series. Never fails: on error or timeout the last good
    /// series (or an empty one) is returned with `degraded` set.
    pub fn fetch(&self, symbol: &str, timeframe: Timeframe, lookback: usize) -> Fetched {
        let key = (symbol.to_string(), timeframe);
        match self.fetch_with_deadline(symbol, timeframe, lookback) {
            Ok(series) => {
                if let Ok(mut cache) = self.cache.lock() {
                    cache.insert(key, series.clone());
                }
                Fetched {
                    series,
                    degraded: false,
                }
            }
            Err(reason) => {
                let cached = self.cache.lock().ok().and_then(|cache| cache.get(&key).cloned());
                tracing::warn!(
                    symbol,
                    %timeframe,
                    %reason,
                    cached = cached.is_some(),
                    "candle fetch failed, serving fallback"
                );
                Fetched {
                    series: cached.unwrap_or_else(|| CandleSeries::empty(symbol, timeframe)),
                    degraded: true,
                }
            }
        }
    }

    /// Fetch several timeframes; `degraded` is set if any of them was.
    pub fn fetch_all(
        &self,
        symbol: &str,
        timeframes: &[Timeframe],
        lookback: usize,
    ) -> (std::collections::BTreeMap<Timeframe, CandleSeries>, bool) {
        let mut degraded = false;
        let series = timeframes
            .iter()
            .map(|&tf| {
                let fetched = self.fetch(symbol, tf, lookback);
                degraded |= fetched.degraded;
                (tf, fetched.series)
            })
            .collect();
        (series, degraded)
    }

    fn fetch_with_deadline(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<CandleSeries, String> {
        let jobs = self.jobs.as_ref().ok_or("feed worker not running")?;
        let (reply, rx) = mpsc::channel();
        let job = FetchJob {
            symbol: symbol.to_string(),
            timeframe,
            lookback,
            expires: Instant::now() + self.deadline,
            reply,
        };
        jobs.send(job).map_err(|_| "feed worker exited".to_string())?;

        match rx.recv_timeout(self.deadline) {
            Ok(Ok(series)) => Ok(series),
            Ok(Err(e)) => Err(e.to_string()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(format!("deadline of {:?} exceeded", self.deadline)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err("feed worker exited".to_string()),
        }
    }
}

/// Serves jobs in order until the gateway is dropped.
fn run_worker<F: CandleFeed>(feed: F, jobs: mpsc::Receiver<FetchJob>) {
    for job in jobs {
        if Instant::now() >= job.expires {
            tracing::debug!(symbol = %job.symbol, timeframe = %job.timeframe, "skipping expired fetch");
            continue;
        }
        let result = feed.get_candles(&job.symbol, job.timeframe, job.lookback);
        // The caller may have given up already.
        let _ = job.reply.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn synthetic_is_deterministic() {
        let feed = SyntheticFeed::new(42);
        let a = feed.get_candles("XAUUSD", Timeframe::H1, 200).unwrap();
        let b = feed.get_candles("XAUUSD", Timeframe::H1, 200).unwrap();
        assert_eq!(a, b);
        let other = feed.get_candles("EURUSD", Timeframe::H1, 200).unwrap();
        assert_ne!(a.closes(), other.closes());
    }

    #[test]
    fn synthetic_candles_are_sane() {
        let series = SyntheticFeed::new(7).get_candles("BTCUSDT", Timeframe::M15, 300).unwrap();
        assert_eq!(series.len(), 300);
        assert!(series.candles().iter().all(Candle::is_sane));
        assert!(series.candles().iter().all(|c| (500.0..=1_500.0).contains(&c.volume)));
        assert_eq!(
            series.candles()[1].time - series.candles()[0].time,
            chrono::Duration::minutes(15)
        );
    }

    #[test]
    fn synthetic_capacity_limit() {
        let feed = SyntheticFeed::new(1).with_capacity(10);
        assert!(matches!(
            feed.get_candles("EURUSD", Timeframe::H1, 11),
            Err(FeedError::DataUnavailable { available: 10, .. })
        ));
    }

    #[test]
    fn static_feed_requires_enough_history() {
        let series = SyntheticFeed::new(3).get_candles("EURUSD", Timeframe::H4, 60).unwrap();
        let feed = StaticFeed::new().with(series);
        assert_eq!(feed.get_candles("EURUSD", Timeframe::H4, 50).unwrap().len(), 50);
        assert!(feed.get_candles("EURUSD", Timeframe::H4, 61).is_err());
        assert!(feed.get_candles("EURUSD", Timeframe::D1, 1).is_err());
    }

    /// Succeeds until switched off, then fails or stalls.
    struct Flaky {
        inner: SyntheticFeed,
        healthy: Arc<AtomicBool>,
        stall: bool,
    }

    impl CandleFeed for Flaky {
        fn get_candles(&self, symbol: &str, timeframe: Timeframe, lookback: usize) -> Result<CandleSeries, FeedError> {
            if self.healthy.load(Ordering::SeqCst) {
                return self.inner.get_candles(symbol, timeframe, lookback);
            }
            if self.stall {
                thread::sleep(Duration::from_millis(500));
            }
            Err(FeedError::Backend("down".into()))
        }
    }

    #[test]
    fn gateway_serves_cache_when_feed_fails() {
        let healthy = Arc::new(AtomicBool::new(true));
        let gateway = FeedGateway::new(
            Flaky {
                inner: SyntheticFeed::new(9),
                healthy: Arc::clone(&healthy),
                stall: false,
            },
            Duration::from_secs(5),
        );
        let fresh = gateway.fetch("EURUSD", Timeframe::H1, 80);
        assert!(!fresh.degraded);

        healthy.store(false, Ordering::SeqCst);
        let stale = gateway.fetch("EURUSD", Timeframe::H1, 80);
        assert!(stale.degraded);
        assert_eq!(stale.series, fresh.series);

        let missing = gateway.fetch("EURUSD", Timeframe::D1, 80);
        assert!(missing.degraded);
        assert!(missing.series.is_empty());
    }

    #[test]
    fn gateway_enforces_deadline() {
        let gateway = FeedGateway::new(
            Flaky {
                inner: SyntheticFeed::new(9),
                healthy: Arc::new(AtomicBool::new(false)),
                stall: true,
            },
            Duration::from_millis(20),
        );
        let started = std::time::Instant::now();
        let fetched = gateway.fetch("EURUSD", Timeframe::H1, 80);
        assert!(fetched.degraded);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    /// Stalls every call and records how many run at once.
    struct Stalling {
        calls: Arc<AtomicUsize>,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl CandleFeed for Stalling {
        fn get_candles(&self, _symbol: &str, _timeframe: Timeframe, _lookback: usize) -> Result<CandleSeries, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(300));
            self.running.fetch_sub(1, Ordering::SeqCst);
            Err(FeedError::Backend("stalled".into()))
        }
    }

    #[test]
    fn stalled_feed_does_not_pile_up_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let gateway = FeedGateway::new(
            Stalling {
                calls: Arc::clone(&calls),
                running: Arc::new(AtomicUsize::new(0)),
                peak: Arc::clone(&peak),
            },
            Duration::from_millis(20),
        );

        for _ in 0..5 {
            assert!(gateway.fetch("EURUSD", Timeframe::H1, 80).degraded);
        }
        // Let the stalled call finish and the queue drain.
        thread::sleep(Duration::from_millis(600));

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        // Requests queued behind the stall expired before the worker got to them.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
