//! Risk metrics: pure functions over the equity curve and closed trades.
//!
//! Trade-level returns are treated as daily observations when annualising
//! (√252 for Sharpe/Sortino, ×252 for the Calmar numerator).

use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::kelly::{kelly_criterion, KellyBounds, TradeStats};
use crate::manager::RiskManagerState;
use crate::position::TradeResult;
use crate::var::calculate_var;

const TRADING_DAYS: f64 = 252.0;

/// Snapshot of account risk, as reported to collaborators and persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub var_95: f64,
    pub var_99: f64,
    pub cvar_95: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    /// Fractions, 0.15 = 15% below the peak.
    pub max_drawdown: f64,
    pub current_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub recovery_factor: f64,
    pub kelly_fraction: f64,
    /// 0..=100, higher is riskier.
    pub risk_score: f64,
    pub trade_count: usize,
    pub net_pnl: f64,
    pub consecutive_losses: u32,
}

impl RiskMetrics {
    pub fn compute(state: &RiskManagerState, config: &RiskConfig) -> Self {
        let trades: Vec<&TradeResult> = state.trade_history.iter().collect();
        let trade_returns: Vec<f64> = trades.iter().map(|t| t.pnl_pct).collect();
        let curve_returns = period_returns(&state.equity_curve);

        let var95 = calculate_var(&curve_returns, 0.95, 1);
        let var99 = calculate_var(&curve_returns, 0.99, 1);

        let window = trades.len().saturating_sub(config.kelly_window);
        let stats = TradeStats::from_trades(trades[window..].iter().copied());
        let kelly = kelly_criterion(
            stats.win_rate,
            stats.avg_win,
            stats.avg_loss,
            KellyBounds {
                fraction: config.kelly_fraction,
                min: config.min_kelly,
                max: config.max_kelly,
            },
        );

        let max_dd = max_drawdown(&state.equity_curve);
        let net_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let mut metrics = Self {
            var_95: var95.var,
            var_99: var99.var,
            cvar_95: var95.cvar,
            sharpe: sharpe_ratio(&trade_returns, config.risk_free_rate),
            sortino: sortino_ratio(&trade_returns, config.risk_free_rate),
            calmar: calmar_ratio(&trade_returns, max_dd),
            max_drawdown: max_dd,
            current_drawdown: state.drawdown(),
            win_rate: win_rate(trades.iter().copied()),
            profit_factor: profit_factor(trades.iter().copied()),
            recovery_factor: recovery_factor(net_pnl, max_drawdown_amount(&state.equity_curve)),
            kelly_fraction: kelly,
            risk_score: 0.0,
            trade_count: trades.len(),
            net_pnl,
            consecutive_losses: state.consecutive_losses,
        };
        metrics.risk_score = risk_score(&metrics);
        metrics
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Annualised Sharpe ratio of per-trade returns.
///
/// Returns 0.0 with fewer than 2 returns or zero variance.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&excess) / std * TRADING_DAYS.sqrt()
}

/// Annualised Sortino ratio (downside deviation only).
///
/// Returns 0.0 with fewer than 2 returns or no downside.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let downside_sq: f64 = excess.iter().filter(|r| **r < 0.0).map(|r| r * r).sum();
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(&excess) / downside_std * TRADING_DAYS.sqrt()
}

/// Annualised mean return over max drawdown. 0.0 without a drawdown.
pub fn calmar_ratio(returns: &[f64], max_drawdown: f64) -> f64 {
    if returns.is_empty() || max_drawdown <= 0.0 {
        return 0.0;
    }
    mean_f64(returns) * TRADING_DAYS / max_drawdown
}

/// Largest peak-to-trough decline as a positive fraction of the peak.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    max_dd
}

/// Largest peak-to-trough decline in account currency.
pub fn max_drawdown_amount(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        max_dd = max_dd.max(peak - eq);
    }
    max_dd
}

pub fn win_rate<'a>(trades: impl IntoIterator<Item = &'a TradeResult>) -> f64 {
    let (mut n, mut wins) = (0usize, 0usize);
    for t in trades {
        n += 1;
        wins += usize::from(t.is_winner());
    }
    if n == 0 {
        0.0
    } else {
        wins as f64 / n as f64
    }
}

/// Gross profit over gross loss, capped at 100.0 when there are no losses.
pub fn profit_factor<'a>(trades: impl IntoIterator<Item = &'a TradeResult>) -> f64 {
    let (mut gross_profit, mut gross_loss) = (0.0, 0.0);
    for t in trades {
        if t.pnl > 0.0 {
            gross_profit += t.pnl;
        } else {
            gross_loss -= t.pnl;
        }
    }
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Net profit over the largest drawdown amount. 0.0 without a drawdown.
pub fn recovery_factor(net_pnl: f64, max_drawdown_amount: f64) -> f64 {
    if max_drawdown_amount <= 0.0 {
        return 0.0;
    }
    net_pnl / max_drawdown_amount
}

/// Composite score, base 50, higher is riskier.
///
/// Bands: VaR95 ±20, Sharpe ±15, max drawdown ±15, win rate ±10,
/// consecutive losses ±10. Bands that need a trade history are skipped
/// without one.
pub fn risk_score(m: &RiskMetrics) -> f64 {
    let mut score: f64 = 50.0;

    let var = m.var_95.abs();
    if var > 0.0 {
        score += if var > 0.05 {
            20.0
        } else if var > 0.03 {
            10.0
        } else if var < 0.01 {
            -20.0
        } else if var < 0.02 {
            -10.0
        } else {
            0.0
        };
    }

    if m.trade_count >= 2 {
        score += if m.sharpe < 0.0 {
            15.0
        } else if m.sharpe > 2.0 {
            -15.0
        } else if m.sharpe > 1.0 {
            -7.5
        } else {
            0.0
        };
    }

    score += if m.max_drawdown > 0.20 {
        15.0
    } else if m.max_drawdown > 0.10 {
        7.5
    } else if m.max_drawdown < 0.05 {
        -15.0
    } else {
        0.0
    };

    if m.trade_count > 0 {
        score += if m.win_rate < 0.4 {
            10.0
        } else if m.win_rate > 0.6 {
            -10.0
        } else {
            0.0
        };
        score += if m.consecutive_losses >= 5 {
            10.0
        } else if m.consecutive_losses >= 3 {
            5.0
        } else if m.consecutive_losses == 0 {
            -10.0
        } else {
            0.0
        };
    }

    score.clamp(0.0, 100.0)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Period-over-period returns of an equity curve.
pub fn period_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::TradeSide;
    use chrono::{TimeZone, Utc};

    fn trade(pnl: f64) -> TradeResult {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        TradeResult {
            symbol: "EURUSD".into(),
            side: TradeSide::Buy,
            entry_time: t,
            exit_time: t,
            entry_price: 100.0,
            exit_price: 100.0 + pnl / 10.0,
            size: 10.0,
            pnl,
            pnl_pct: pnl / 1_000.0,
            balance_after: 0.0,
        }
    }

    #[test]
    fn drawdown_of_curve() {
        let curve = [100.0, 120.0, 90.0, 110.0, 130.0];
        assert!((max_drawdown(&curve) - 0.25).abs() < 1e-12);
        assert!((max_drawdown_amount(&curve) - 30.0).abs() < 1e-12);
        assert_eq!(max_drawdown(&[100.0, 101.0, 102.0]), 0.0);
    }

    #[test]
    fn win_rate_and_profit_factor() {
        let trades = [trade(100.0), trade(-50.0), trade(200.0), trade(-50.0)];
        assert_eq!(win_rate(&trades), 0.5);
        assert!((profit_factor(&trades) - 3.0).abs() < 1e-12);
        assert_eq!(profit_factor(&[trade(10.0)]), 100.0);
        assert_eq!(profit_factor(&[] as &[TradeResult]), 0.0);
    }

    #[test]
    fn sharpe_sign_follows_mean() {
        assert!(sharpe_ratio(&[0.01, 0.02, 0.015, 0.005], 0.0) > 0.0);
        assert!(sharpe_ratio(&[-0.01, -0.02, -0.015, -0.005], 0.0) < 0.0);
        assert_eq!(sharpe_ratio(&[0.01, 0.01], 0.0), 0.0);
    }

    #[test]
    fn sortino_without_downside_is_zero() {
        assert_eq!(sortino_ratio(&[0.01, 0.02], 0.0), 0.0);
        assert!(sortino_ratio(&[0.03, -0.01, 0.02], 0.0) > 0.0);
    }

    #[test]
    fn fresh_account_scores_low_risk() {
        let m = RiskMetrics::default();
        // Only the drawdown band applies: 50 − 15.
        assert_eq!(risk_score(&m), 35.0);
    }

    #[test]
    fn losing_streak_scores_high_risk() {
        let m = RiskMetrics {
            var_95: -0.06,
            sharpe: -1.0,
            max_drawdown: 0.25,
            win_rate: 0.2,
            consecutive_losses: 6,
            trade_count: 10,
            ..RiskMetrics::default()
        };
        assert_eq!(risk_score(&m), 100.0);
    }
}
