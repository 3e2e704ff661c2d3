//! Position sizing as a pipeline of pure adjustments.
//!
//! base → {kelly, var, volatility, correlation} → weighted blend →
//! confidence → regime → clamp. Every stage is a free function so each can be
//! tested in isolation; [`calculate_position_size`] composes them.

use serde::{Deserialize, Serialize};
use trendguard_core::domain::InstrumentClass;

use crate::position::TradeSide;
use crate::regime::MarketRegime;
use crate::RiskError;

/// Units per lot for an instrument class.
pub fn lot_size(class: InstrumentClass) -> f64 {
    match class {
        InstrumentClass::Forex => 100_000.0,
        InstrumentClass::Metals => 100.0,
        InstrumentClass::Crypto => 1.0,
    }
}

/// Blend weights of the five sizing components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeights {
    pub base: f64,
    pub kelly: f64,
    pub var: f64,
    pub volatility: f64,
    pub correlation: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            base: 0.20,
            kelly: 0.25,
            var: 0.15,
            volatility: 0.20,
            correlation: 0.10,
        }
    }
}

// ─── Pipeline stages ────────────────────────────────────────────────

/// Units that risk `balance × risk_fraction` between entry and stop.
pub fn base_units(balance: f64, risk_fraction: f64, entry: f64, stop: f64) -> Result<f64, RiskError> {
    if !(entry > 0.0) || !(stop > 0.0) {
        return Err(RiskError::InvalidPrice { entry, stop });
    }
    let distance = (entry - stop).abs();
    if distance == 0.0 {
        return Err(RiskError::InvalidStopDistance { entry, stop });
    }
    Ok(balance * risk_fraction / distance)
}

/// Base size rescaled from the fixed risk fraction to the Kelly fraction.
pub fn kelly_adjusted(base: f64, kelly: f64, max_risk: f64) -> f64 {
    if max_risk <= 0.0 {
        return base;
    }
    base * kelly / max_risk
}

/// Shrinks by |VaR95|, floored at half size. `None` leaves the size unchanged.
pub fn var_adjusted(base: f64, var95: Option<f64>) -> f64 {
    match var95 {
        Some(var) => base * (1.0 - var.abs()).max(0.5),
        None => base,
    }
}

/// Shrinks with volatility (0..100), floored at 30% of base.
pub fn volatility_adjusted(base: f64, volatility: f64) -> f64 {
    base * (1.0 - volatility.max(0.0) / 100.0).max(0.3)
}

/// Shrinks with portfolio correlation, floored at half size.
pub fn correlation_adjusted(base: f64, correlation: f64) -> f64 {
    base * (1.0 - correlation.abs()).max(0.5)
}

/// Weighted sum of the components. With a Kelly component the weights apply
/// as given; without one the remaining weights are renormalised to sum to 1.
pub fn blend(base: f64, kelly: Option<f64>, var: f64, volatility: f64, correlation: f64, w: BlendWeights) -> f64 {
    let rest = w.base * base + w.var * var + w.volatility * volatility + w.correlation * correlation;
    match kelly {
        Some(k) => rest + w.kelly * k,
        None => {
            let weight = w.base + w.var + w.volatility + w.correlation;
            if weight <= 0.0 {
                base
            } else {
                rest / weight
            }
        }
    }
}

/// 0.5 at zero confidence, 1.0 at full confidence.
pub fn confidence_adjustment(confidence: f64) -> f64 {
    0.5 + confidence.clamp(0.0, 100.0) / 200.0
}

// ─── Composition ────────────────────────────────────────────────────

/// Everything one sizing run needs. Built by the manager from its state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingInputs {
    pub balance: f64,
    pub max_risk_per_trade: f64,
    pub entry: f64,
    pub stop: f64,
    /// 0..=100.
    pub confidence: f64,
    /// 0..=100.
    pub volatility: f64,
    pub correlation: f64,
    /// Kelly fraction, when enough trades exist.
    pub kelly: Option<f64>,
    /// VaR95 of recent returns, when enough samples exist.
    pub var95: Option<f64>,
    pub regime: MarketRegime,
    pub lot_size: f64,
    pub min_size: f64,
    pub max_size: f64,
    pub weights: BlendWeights,
}

/// Stage-by-stage breakdown. Sizes are in lots unless named `_units`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSizing {
    pub base_units: f64,
    pub base_size: f64,
    pub kelly_size: Option<f64>,
    pub var_size: f64,
    pub volatility_size: f64,
    pub correlation_size: f64,
    pub blended_size: f64,
    pub confidence_adjustment: f64,
    pub regime_multiplier: f64,
    pub final_size: f64,
    pub final_units: f64,
    pub leverage: f64,
    pub risk_amount: f64,
    pub stop_distance: f64,
    pub side: TradeSide,
}

pub fn calculate_position_size(inputs: &SizingInputs) -> Result<PositionSizing, RiskError> {
    let units = base_units(inputs.balance, inputs.max_risk_per_trade, inputs.entry, inputs.stop)?;
    let lot = if inputs.lot_size > 0.0 { inputs.lot_size } else { 1.0 };
    let base = units / lot;

    let kelly_size = inputs
        .kelly
        .map(|k| kelly_adjusted(base, k, inputs.max_risk_per_trade));
    let var_size = var_adjusted(base, inputs.var95);
    let volatility_size = volatility_adjusted(base, inputs.volatility);
    let correlation_size = correlation_adjusted(base, inputs.correlation);

    let blended = blend(
        base,
        kelly_size,
        var_size,
        volatility_size,
        correlation_size,
        inputs.weights,
    );
    let confidence = confidence_adjustment(inputs.confidence);
    let regime = inputs.regime.size_multiplier();
    let final_size = (blended * confidence * regime).clamp(inputs.min_size, inputs.max_size);

    let final_units = final_size * lot;
    let stop_distance = (inputs.entry - inputs.stop).abs();
    let leverage = if inputs.balance > 0.0 {
        final_units * inputs.entry / inputs.balance
    } else {
        0.0
    };

    Ok(PositionSizing {
        base_units: units,
        base_size: base,
        kelly_size,
        var_size,
        volatility_size,
        correlation_size,
        blended_size: blended,
        confidence_adjustment: confidence,
        regime_multiplier: regime,
        final_size,
        final_units,
        leverage,
        risk_amount: final_units * stop_distance,
        stop_distance,
        side: TradeSide::from_prices(inputs.entry, inputs.stop),
    })
}

/// Sizing result handed to the execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    pub symbol: String,
    pub side: TradeSide,
    /// Lots.
    pub position_size: f64,
    pub position_units: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Targets at 1R, 2R and 3R.
    pub take_profit_levels: Vec<f64>,
    /// Account currency at risk if the stop is hit.
    pub risk_per_trade: f64,
    pub confidence_level: f64,
    pub risk_reward_ratio: f64,
    pub leverage: f64,
    pub sizing: PositionSizing,
}

impl RiskParameters {
    pub fn from_sizing(symbol: &str, entry: f64, stop: f64, confidence: f64, reward_r: f64, sizing: PositionSizing) -> Self {
        let distance = sizing.stop_distance;
        let sign = sizing.side.sign();
        let target = |r: f64| entry + sign * r * distance;
        Self {
            symbol: symbol.to_string(),
            side: sizing.side,
            position_size: sizing.final_size,
            position_units: sizing.final_units,
            entry_price: entry,
            stop_loss: stop,
            take_profit: target(reward_r),
            take_profit_levels: vec![target(1.0), target(2.0), target(3.0)],
            risk_per_trade: sizing.risk_amount,
            confidence_level: confidence,
            risk_reward_ratio: reward_r,
            leverage: sizing.leverage,
            sizing,
        }
    }
}
