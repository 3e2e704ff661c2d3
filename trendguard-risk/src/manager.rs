//! The adaptive risk manager: one account, one lock.
//!
//! Every operation locks the state once. Read-only reports clone the state
//! under the lock and compute outside it. Snapshots are written under the
//! lock after each close so saves land in close order.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trendguard_core::domain::InstrumentClass;

use crate::config::RiskConfig;
use crate::kelly::{kelly_criterion, KellyBounds, TradeStats};
use crate::limits::{check_limits, RiskCheckResult};
use crate::metrics::{period_returns, RiskMetrics};
use crate::persistence::{PersistError, StateSnapshot, StateStore, SCHEMA_VERSION};
use crate::position::{Position, TradeResult, TradeSide};
use crate::regime::{classify_market, classify_volatility, MarketConditions, MarketRegime, VolatilityRegime};
use crate::sizing::{self, lot_size, BlendWeights, PositionSizing, RiskParameters, SizingInputs};
use crate::var::{VarEstimate, MIN_VAR_SAMPLES};
use crate::RiskError;

/// Mutable account state.
///
/// `equity_curve` always holds one more point than `trade_history`: the
/// balance before the oldest kept trade, then the balance after each trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskManagerState {
    pub initial_balance: f64,
    pub current_balance: f64,
    pub peak_balance: f64,
    pub equity_curve: Vec<f64>,
    pub open_positions: Vec<Position>,
    pub trade_history: VecDeque<TradeResult>,
    pub consecutive_losses: u32,
    pub market_regime: MarketRegime,
    pub volatility_regime: VolatilityRegime,
    pub next_position_id: u64,
}

impl RiskManagerState {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            current_balance: initial_balance,
            peak_balance: initial_balance,
            equity_curve: vec![initial_balance],
            open_positions: Vec::new(),
            trade_history: VecDeque::new(),
            consecutive_losses: 0,
            market_regime: MarketRegime::default(),
            volatility_regime: VolatilityRegime::default(),
            next_position_id: 1,
        }
    }

    /// Current decline from the peak balance, as a fraction. Never negative.
    pub fn drawdown(&self) -> f64 {
        if self.peak_balance <= 0.0 {
            return 0.0;
        }
        ((self.peak_balance - self.current_balance) / self.peak_balance).max(0.0)
    }

    fn record(&mut self, trade: TradeResult, history_limit: usize) {
        self.current_balance = trade.balance_after;
        self.peak_balance = self.peak_balance.max(self.current_balance);
        self.equity_curve.push(self.current_balance);
        if trade.pnl < 0.0 {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
        self.trade_history.push_back(trade);

        let limit = history_limit.max(1);
        while self.trade_history.len() > limit {
            self.trade_history.pop_front();
        }
        let excess = self.equity_curve.len().saturating_sub(self.trade_history.len() + 1);
        self.equity_curve.drain(..excess);
    }

    fn snapshot(&self, metrics: RiskMetrics, timestamp: DateTime<Utc>) -> StateSnapshot {
        StateSnapshot {
            schema_version: SCHEMA_VERSION,
            timestamp,
            initial_balance: self.initial_balance,
            current_balance: self.current_balance,
            peak_balance: self.peak_balance,
            consecutive_losses: self.consecutive_losses,
            market_regime: self.market_regime,
            volatility_regime: self.volatility_regime,
            metrics,
            trades: self.trade_history.iter().cloned().collect(),
        }
    }

    /// Rebuild state from a snapshot. Open positions are not persisted.
    pub fn from_snapshot(snapshot: StateSnapshot) -> Self {
        let start = snapshot
            .trades
            .first()
            .map(|t| t.balance_after - t.pnl)
            .unwrap_or(snapshot.current_balance);
        let mut equity_curve = Vec::with_capacity(snapshot.trades.len() + 1);
        equity_curve.push(start);
        equity_curve.extend(snapshot.trades.iter().map(|t| t.balance_after));

        Self {
            initial_balance: snapshot.initial_balance,
            current_balance: snapshot.current_balance,
            peak_balance: snapshot.peak_balance.max(snapshot.current_balance),
            equity_curve,
            open_positions: Vec::new(),
            trade_history: snapshot.trades.into(),
            consecutive_losses: snapshot.consecutive_losses,
            market_regime: snapshot.market_regime,
            volatility_regime: snapshot.volatility_regime,
            next_position_id: 1,
        }
    }
}

/// Sizes positions and enforces account limits from the running trade record.
pub struct AdaptiveRiskManager {
    config: RiskConfig,
    state: Mutex<RiskManagerState>,
    store: Option<Box<dyn StateStore>>,
}

impl AdaptiveRiskManager {
    /// Fresh account at `config.initial_balance`, not persisted.
    pub fn new(config: RiskConfig) -> Self {
        let state = RiskManagerState::new(config.initial_balance);
        Self {
            config,
            state: Mutex::new(state),
            store: None,
        }
    }

    /// Resume from `store`, or start fresh when it is empty or unreadable.
    pub fn with_store(config: RiskConfig, store: impl StateStore + 'static) -> Self {
        let state = match store.load() {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    balance = snapshot.current_balance,
                    trades = snapshot.trades.len(),
                    "restored risk state"
                );
                RiskManagerState::from_snapshot(snapshot)
            }
            Ok(None) => RiskManagerState::new(config.initial_balance),
            Err(e) => {
                tracing::warn!(error = %e, "risk state unreadable, starting from initial balance");
                RiskManagerState::new(config.initial_balance)
            }
        };
        Self {
            config,
            state: Mutex::new(state),
            store: Some(Box::new(store)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RiskManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Consistent copy of the current state.
    pub fn state(&self) -> RiskManagerState {
        self.lock().clone()
    }

    pub fn balance(&self) -> f64 {
        self.lock().current_balance
    }

    pub fn market_regime(&self) -> MarketRegime {
        self.lock().market_regime
    }

    pub fn volatility_regime(&self) -> VolatilityRegime {
        self.lock().volatility_regime
    }

    pub fn open_positions(&self) -> Vec<Position> {
        self.lock().open_positions.clone()
    }

    // ─── Estimators ─────────────────────────────────────────────────

    fn kelly_bounds(&self) -> KellyBounds {
        KellyBounds {
            fraction: self.config.kelly_fraction,
            min: self.config.min_kelly,
            max: self.config.max_kelly,
        }
    }

    /// Fractional Kelly within the configured bounds.
    pub fn calculate_kelly_criterion(&self, win_rate: f64, avg_win: f64, avg_loss: f64) -> f64 {
        kelly_criterion(win_rate, avg_win, avg_loss, self.kelly_bounds())
    }

    pub fn calculate_var(&self, returns: &[f64], confidence: f64, horizon: u32) -> VarEstimate {
        crate::var::calculate_var(returns, confidence, horizon)
    }

    /// Kelly fraction over the trailing window, once enough trades exist.
    fn history_kelly(&self, state: &RiskManagerState) -> Option<f64> {
        let n = state.trade_history.len();
        if n < self.config.kelly_min_trades.max(1) {
            return None;
        }
        let skip = n.saturating_sub(self.config.kelly_window.max(1));
        let stats = TradeStats::from_trades(state.trade_history.iter().skip(skip));
        Some(kelly_criterion(stats.win_rate, stats.avg_win, stats.avg_loss, self.kelly_bounds()))
    }

    /// VaR95 of the equity-curve returns, once enough samples exist.
    fn history_var95(&self, state: &RiskManagerState) -> Option<f64> {
        let returns = period_returns(&state.equity_curve);
        if returns.len() < self.config.var_min_samples.max(MIN_VAR_SAMPLES) {
            return None;
        }
        Some(crate::var::calculate_var(&returns, 0.95, 1).var)
    }

    // ─── Sizing ─────────────────────────────────────────────────────

    /// Size a trade in lots of the symbol's instrument class.
    pub fn calculate_position_size(
        &self,
        symbol: &str,
        entry: f64,
        stop: f64,
        confidence: f64,
        volatility: f64,
        correlation: f64,
    ) -> Result<PositionSizing, RiskError> {
        let inputs = {
            let state = self.lock();
            SizingInputs {
                balance: state.current_balance,
                max_risk_per_trade: self.config.max_risk_per_trade,
                entry,
                stop,
                confidence,
                volatility,
                correlation,
                kelly: self.history_kelly(&state),
                var95: self.history_var95(&state),
                regime: state.market_regime,
                lot_size: lot_size(InstrumentClass::from_symbol(symbol)),
                min_size: self.config.min_size,
                max_size: self.config.max_size,
                weights: BlendWeights::default(),
            }
        };
        sizing::calculate_position_size(&inputs)
    }

    /// Full trade parameters. Without an explicit correlation the open
    /// portfolio's correlation to the new trade is used.
    pub fn size_position(
        &self,
        symbol: &str,
        entry: f64,
        stop: f64,
        confidence: f64,
        volatility: f64,
        correlation: Option<f64>,
    ) -> Result<RiskParameters, RiskError> {
        let correlation = match correlation {
            Some(c) => c,
            None => self.calculate_portfolio_correlation(symbol, TradeSide::from_prices(entry, stop)),
        };
        let sizing = self.calculate_position_size(symbol, entry, stop, confidence, volatility, correlation)?;
        let params = RiskParameters::from_sizing(symbol, entry, stop, confidence, self.config.take_profit_r, sizing);
        tracing::debug!(
            symbol,
            side = %params.side,
            lots = params.position_size,
            risk = params.risk_per_trade,
            correlation,
            "position sized"
        );
        Ok(params)
    }

    /// Mean absolute correlation of a prospective trade to the open
    /// positions. Opposite-side positions count with ρ negated before the
    /// magnitude is taken. Capped at 1; 0 with nothing open.
    pub fn calculate_portfolio_correlation(&self, symbol: &str, side: TradeSide) -> f64 {
        let state = self.lock();
        if state.open_positions.is_empty() {
            return 0.0;
        }
        let total: f64 = state
            .open_positions
            .iter()
            .map(|p| {
                let rho = self.config.correlations.lookup(symbol, &p.symbol);
                let signed = if p.side == side { rho } else { -rho };
                signed.abs()
            })
            .sum();
        (total / state.open_positions.len() as f64).min(1.0)
    }

    // ─── Limits and regime ──────────────────────────────────────────

    pub fn check_risk_limits(&self) -> RiskCheckResult {
        self.check_risk_limits_at(Utc::now())
    }

    /// Limit check with an explicit clock for the daily and weekly windows.
    pub fn check_risk_limits_at(&self, now: DateTime<Utc>) -> RiskCheckResult {
        let result = check_limits(&self.lock(), &self.config.limits, now);
        if !result.can_trade {
            tracing::warn!(blocks = ?result.blocks, "trading blocked by risk limits");
        }
        result
    }

    pub fn update_market_regime(&self, volatility: f64, trend_strength: f64, volume_ratio: f64) -> MarketRegime {
        let regime = classify_market(volatility, trend_strength, volume_ratio);
        let vol_regime = classify_volatility(volatility);
        let mut state = self.lock();
        if state.market_regime != regime || state.volatility_regime != vol_regime {
            tracing::info!(
                from = ?state.market_regime,
                to = ?regime,
                volatility = ?vol_regime,
                "market regime changed"
            );
        }
        state.market_regime = regime;
        state.volatility_regime = vol_regime;
        regime
    }

    pub fn apply_market_conditions(&self, conditions: &MarketConditions) -> MarketRegime {
        self.update_market_regime(conditions.volatility, conditions.trend_strength, conditions.volume_ratio)
    }

    // ─── Reporting ──────────────────────────────────────────────────

    pub fn calculate_risk_metrics(&self) -> RiskMetrics {
        let state = self.state();
        RiskMetrics::compute(&state, &self.config)
    }

    /// Same as [`Self::calculate_risk_metrics`]; repeated calls without
    /// intervening trades return identical values.
    pub fn get_risk_metrics(&self) -> RiskMetrics {
        self.calculate_risk_metrics()
    }

    // ─── Positions ──────────────────────────────────────────────────

    pub fn add_position(
        &self,
        symbol: &str,
        side: TradeSide,
        entry_price: f64,
        size: f64,
        stop_loss: Option<f64>,
    ) -> Result<u64, RiskError> {
        self.add_position_at(symbol, side, entry_price, size, stop_loss, Utc::now())
    }

    /// Open a position of `size` units.
    pub fn add_position_at(
        &self,
        symbol: &str,
        side: TradeSide,
        entry_price: f64,
        size: f64,
        stop_loss: Option<f64>,
        entry_time: DateTime<Utc>,
    ) -> Result<u64, RiskError> {
        if !(entry_price > 0.0) {
            return Err(RiskError::InvalidPrice {
                entry: entry_price,
                stop: stop_loss.unwrap_or(0.0),
            });
        }
        let mut state = self.lock();
        let max = self.config.max_open_positions;
        if state.open_positions.len() >= max {
            return Err(RiskError::PositionLimitReached { max });
        }
        if state.open_positions.iter().any(|p| p.symbol == symbol && p.side == side) {
            return Err(RiskError::DuplicatePosition {
                symbol: symbol.to_string(),
                side,
            });
        }
        let id = state.next_position_id;
        state.next_position_id += 1;
        state.open_positions.push(Position {
            id,
            symbol: symbol.to_string(),
            side,
            entry_price,
            size,
            entry_time,
            stop_loss,
        });
        tracing::info!(id, symbol, %side, entry_price, size, "position opened");
        Ok(id)
    }

    pub fn close_position(&self, id: u64, exit_price: f64) -> Result<TradeResult, RiskError> {
        self.close_position_at(id, exit_price, Utc::now())
    }

    /// Close a position, book its PnL and persist the new state.
    pub fn close_position_at(&self, id: u64, exit_price: f64, exit_time: DateTime<Utc>) -> Result<TradeResult, RiskError> {
        if !(exit_price > 0.0) {
            return Err(RiskError::InvalidPrice {
                entry: exit_price,
                stop: exit_price,
            });
        }
        let mut state = self.lock();
        let idx = state
            .open_positions
            .iter()
            .position(|p| p.id == id)
            .ok_or(RiskError::PositionNotFound(id))?;
        let position = state.open_positions.remove(idx);

        let pnl = position.pnl_at(exit_price);
        let notional = position.notional();
        let trade = TradeResult {
            symbol: position.symbol,
            side: position.side,
            entry_time: position.entry_time,
            exit_time,
            entry_price: position.entry_price,
            exit_price,
            size: position.size,
            pnl,
            pnl_pct: if notional > 0.0 { pnl / notional } else { 0.0 },
            balance_after: state.current_balance + pnl,
        };
        state.record(trade.clone(), self.config.history_limit);

        tracing::info!(
            id,
            symbol = %trade.symbol,
            pnl = trade.pnl,
            balance = state.current_balance,
            consecutive_losses = state.consecutive_losses,
            "position closed"
        );

        self.persist(&state, exit_time);
        Ok(trade)
    }

    /// Move a position's stop. Stops only tighten; the stop in force is
    /// returned.
    pub fn adjust_stop(&self, id: u64, new_stop: f64) -> Result<f64, RiskError> {
        let mut state = self.lock();
        let position = state
            .open_positions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RiskError::PositionNotFound(id))?;
        let applied = position.tighten_stop(new_stop);
        if applied != new_stop {
            tracing::debug!(id, requested = new_stop, applied, "stop adjustment clamped");
        }
        Ok(applied)
    }

    // ─── Persistence ────────────────────────────────────────────────

    fn persist(&self, state: &RiskManagerState, timestamp: DateTime<Utc>) {
        let Some(store) = &self.store else {
            return;
        };
        let metrics = RiskMetrics::compute(state, &self.config);
        if let Err(e) = store.save(&state.snapshot(metrics, timestamp)) {
            tracing::warn!(error = %e, "failed to persist risk state");
        }
    }

    /// Write the current state to the store, if there is one.
    pub fn flush(&self) -> Result<(), PersistError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let state = self.lock();
        let metrics = RiskMetrics::compute(&state, &self.config);
        store.save(&state.snapshot(metrics, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn equity_curve_tracks_history_limit() {
        let mut state = RiskManagerState::new(1_000.0);
        for i in 0..5 {
            let balance = state.current_balance + 10.0;
            state.record(
                TradeResult {
                    symbol: "EURUSD".into(),
                    side: TradeSide::Buy,
                    entry_time: t0(),
                    exit_time: t0(),
                    entry_price: 1.0,
                    exit_price: 1.0,
                    size: 1.0,
                    pnl: 10.0,
                    pnl_pct: 0.01 * f64::from(i),
                    balance_after: balance,
                },
                3,
            );
        }
        assert_eq!(state.trade_history.len(), 3);
        assert_eq!(state.equity_curve, vec![1_020.0, 1_030.0, 1_040.0, 1_050.0]);
    }

    #[test]
    fn snapshot_rebuilds_curve() {
        let mgr = AdaptiveRiskManager::new(RiskConfig::default());
        let id = mgr.add_position_at("XAUUSD", TradeSide::Buy, 2_000.0, 10.0, Some(1_990.0), t0()).unwrap();
        mgr.close_position_at(id, 2_010.0, t0()).unwrap();
        let state = mgr.state();
        let restored = RiskManagerState::from_snapshot(state.snapshot(RiskMetrics::default(), t0()));
        assert_eq!(restored.equity_curve, state.equity_curve);
        assert_eq!(restored.current_balance, state.current_balance);
    }

    #[test]
    fn duplicate_and_limit_rejected() {
        let config = RiskConfig {
            max_open_positions: 2,
            ..RiskConfig::default()
        };
        let mgr = AdaptiveRiskManager::new(config);
        mgr.add_position("EURUSD", TradeSide::Buy, 1.1, 1_000.0, None).unwrap();
        assert!(matches!(
            mgr.add_position("EURUSD", TradeSide::Buy, 1.1, 1_000.0, None),
            Err(RiskError::DuplicatePosition { .. })
        ));
        mgr.add_position("EURUSD", TradeSide::Sell, 1.1, 1_000.0, None).unwrap();
        assert!(matches!(
            mgr.add_position("GBPUSD", TradeSide::Buy, 1.3, 1_000.0, None),
            Err(RiskError::PositionLimitReached { max: 2 })
        ));
    }

    #[test]
    fn portfolio_correlation_averages_magnitudes() {
        let mgr = AdaptiveRiskManager::new(RiskConfig::default());
        assert_eq!(mgr.calculate_portfolio_correlation("BTCUSD", TradeSide::Buy), 0.0);
        mgr.add_position("ETHUSD", TradeSide::Buy, 3_000.0, 1.0, None).unwrap();
        let same = mgr.calculate_portfolio_correlation("BTCUSD", TradeSide::Buy);
        let hedge = mgr.calculate_portfolio_correlation("BTCUSD", TradeSide::Sell);
        assert!((same - 0.85).abs() < 1e-12);
        assert!((hedge - 0.85).abs() < 1e-12);

        mgr.add_position("SOLUSD", TradeSide::Sell, 150.0, 10.0, None).unwrap();
        // (|0.85| + |−0.75|) / 2: a hedge still adds exposure.
        let mixed = mgr.calculate_portfolio_correlation("BTCUSD", TradeSide::Buy);
        assert!((mixed - 0.80).abs() < 1e-12);

        // Unlisted pairs contribute zero.
        mgr.add_position("EURUSD", TradeSide::Buy, 1.1, 1_000.0, None).unwrap();
        let diluted = mgr.calculate_portfolio_correlation("BTCUSD", TradeSide::Buy);
        assert!((diluted - 1.6 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn regime_update_changes_sizing_multiplier() {
        let mgr = AdaptiveRiskManager::new(RiskConfig::default());
        assert_eq!(mgr.update_market_regime(45.0, 10.0, 1.0), MarketRegime::Volatile);
        assert_eq!(mgr.volatility_regime(), VolatilityRegime::Normal);
        let sizing = mgr.calculate_position_size("XAUUSD", 100.0, 98.0, 70.0, 20.0, 0.0).unwrap();
        assert_eq!(sizing.regime_multiplier, 0.5);
    }

    #[test]
    fn missing_position_errors() {
        let mgr = AdaptiveRiskManager::new(RiskConfig::default());
        assert!(matches!(mgr.close_position(42, 1.0), Err(RiskError::PositionNotFound(42))));
        assert!(matches!(mgr.adjust_stop(42, 1.0), Err(RiskError::PositionNotFound(42))));
    }
}
