//! Fractional Kelly criterion.

use serde::{Deserialize, Serialize};

use crate::position::TradeResult;

/// Win/loss statistics over a trade window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub trades: usize,
    pub win_rate: f64,
    /// Mean profit of winning trades.
    pub avg_win: f64,
    /// Mean absolute loss of losing trades.
    pub avg_loss: f64,
}

impl TradeStats {
    pub fn from_trades<'a>(trades: impl IntoIterator<Item = &'a TradeResult>) -> Self {
        let (mut n, mut wins, mut losses) = (0usize, 0usize, 0usize);
        let (mut win_sum, mut loss_sum) = (0.0, 0.0);
        for t in trades {
            n += 1;
            if t.is_winner() {
                wins += 1;
                win_sum += t.pnl;
            } else if t.pnl < 0.0 {
                losses += 1;
                loss_sum += -t.pnl;
            }
        }
        if n == 0 {
            return Self::default();
        }
        Self {
            trades: n,
            win_rate: wins as f64 / n as f64,
            avg_win: if wins > 0 { win_sum / wins as f64 } else { 0.0 },
            avg_loss: if losses > 0 { loss_sum / losses as f64 } else { 0.0 },
        }
    }
}

/// Clamp range and multiplier for the Kelly fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KellyBounds {
    pub fraction: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for KellyBounds {
    fn default() -> Self {
        Self {
            fraction: 0.25,
            min: 0.01,
            max: 0.25,
        }
    }
}

/// f = (p·b − q) / b with b = avg_win / avg_loss, scaled by `bounds.fraction`
/// and clamped to `[bounds.min, bounds.max]`.
///
/// Degenerate inputs (no losses, no wins, non-finite values) return the minimum.
pub fn kelly_criterion(win_rate: f64, avg_win: f64, avg_loss: f64, bounds: KellyBounds) -> f64 {
    let valid = win_rate.is_finite() && avg_win.is_finite() && avg_loss.is_finite();
    if !valid || win_rate <= 0.0 || avg_loss <= 0.0 || avg_win <= 0.0 {
        return bounds.min;
    }
    let p = win_rate.min(1.0);
    let q = 1.0 - p;
    let b = avg_win / avg_loss;
    let f = (p * b - q) / b;
    (f * bounds.fraction).clamp(bounds.min, bounds.max)
}
