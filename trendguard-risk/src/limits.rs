//! Portfolio risk limits checked before a new trade.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{LimitConfig, Threshold};
use crate::manager::RiskManagerState;

/// Outcome of a limit check. Breaches are data, not errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskCheckResult {
    pub can_trade: bool,
    pub warnings: Vec<String>,
    pub blocks: Vec<String>,
}

impl RiskCheckResult {
    fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    fn block(&mut self, message: String) {
        self.blocks.push(message);
    }
}

/// Realised loss (positive number) of trades that closed on `now`'s UTC day.
pub fn daily_loss(state: &RiskManagerState, now: DateTime<Utc>) -> f64 {
    realised_loss(state, |t| t.date_naive() == now.date_naive())
}

/// Realised loss (positive number) of trades that closed in `now`'s ISO week.
pub fn weekly_loss(state: &RiskManagerState, now: DateTime<Utc>) -> f64 {
    let week = now.iso_week();
    realised_loss(state, |t| t.iso_week() == week)
}

fn realised_loss(state: &RiskManagerState, in_window: impl Fn(DateTime<Utc>) -> bool) -> f64 {
    let pnl: f64 = state
        .trade_history
        .iter()
        .filter(|t| in_window(t.exit_time))
        .map(|t| t.pnl)
        .sum();
    (-pnl).max(0.0)
}

/// Open notional over the current balance.
pub fn portfolio_leverage(state: &RiskManagerState) -> f64 {
    if state.current_balance <= 0.0 {
        return 0.0;
    }
    state.open_positions.iter().map(|p| p.notional()).sum::<f64>() / state.current_balance
}

fn check_loss(result: &mut RiskCheckResult, label: &str, loss: f64, limit: f64, warn_fraction: f64) {
    if limit <= 0.0 {
        return;
    }
    if loss >= limit {
        result.block(format!("{label} loss {loss:.2} reached limit {limit:.2}"));
    } else if loss >= limit * warn_fraction {
        result.warn(format!("{label} loss {loss:.2} is {:.0}% of limit {limit:.2}", loss / limit * 100.0));
    }
}

/// Block at `>= block`, warn at `>= warn`.
fn check_at_least<T>(result: &mut RiskCheckResult, value: T, t: Threshold<T>, describe: impl Fn(T) -> String)
where
    T: PartialOrd + Copy,
{
    if value >= t.block {
        result.block(describe(value));
    } else if value >= t.warn {
        result.warn(describe(value));
    }
}

/// Block at `> block`, warn at `> warn`.
fn check_above(result: &mut RiskCheckResult, value: f64, t: Threshold<f64>, describe: impl Fn(f64) -> String) {
    if value > t.block {
        result.block(describe(value));
    } else if value > t.warn {
        result.warn(describe(value));
    }
}

/// Evaluate every limit in a fixed order: daily loss, weekly loss,
/// consecutive losses, drawdown, open positions, leverage.
pub fn check_limits(state: &RiskManagerState, limits: &LimitConfig, now: DateTime<Utc>) -> RiskCheckResult {
    let mut result = RiskCheckResult::default();
    let capital = state.initial_balance;

    check_loss(
        &mut result,
        "daily",
        daily_loss(state, now),
        limits.daily_loss * capital,
        limits.loss_warn_fraction,
    );
    check_loss(
        &mut result,
        "weekly",
        weekly_loss(state, now),
        limits.weekly_loss * capital,
        limits.loss_warn_fraction,
    );
    check_at_least(&mut result, state.consecutive_losses, limits.consecutive_losses, |n| {
        format!("{n} consecutive losses")
    });
    check_above(&mut result, state.drawdown(), limits.drawdown, |dd| {
        format!("drawdown {:.1}%", dd * 100.0)
    });
    check_at_least(&mut result, state.open_positions.len(), limits.open_positions, |n| {
        format!("{n} open positions")
    });
    check_above(&mut result, portfolio_leverage(state), limits.leverage, |lev| {
        format!("portfolio leverage {lev:.2}x")
    });

    result.can_trade = result.blocks.is_empty();
    result
}
