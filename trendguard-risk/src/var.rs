//! Value at Risk and Conditional VaR on a return sample.
//!
//! Returns are fractions (−0.02 = a 2% loss). VaR is reported as the return
//! threshold itself, so it is normally negative.

use serde::{Deserialize, Serialize};

use crate::metrics::{mean_f64, std_dev};

/// Samples required before VaR is estimated.
pub const MIN_VAR_SAMPLES: usize = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VarEstimate {
    /// The more conservative of the two estimates.
    pub var: f64,
    /// Mean of the returns at or below `var`.
    pub cvar: f64,
    pub parametric: f64,
    pub historical: f64,
}

/// VaR/CVaR at `confidence` (e.g. 0.95) over `horizon` periods.
///
/// Parametric: mean + z(1 − confidence)·σ·√horizon. Historical: the
/// (1 − confidence) percentile of the sample. Fewer than
/// [`MIN_VAR_SAMPLES`] returns yields all zeros.
pub fn calculate_var(returns: &[f64], confidence: f64, horizon: u32) -> VarEstimate {
    let sample: Vec<f64> = returns.iter().copied().filter(|r| r.is_finite()).collect();
    if sample.len() < MIN_VAR_SAMPLES || !(confidence > 0.0 && confidence < 1.0) {
        return VarEstimate::default();
    }

    let tail = 1.0 - confidence;
    let horizon = f64::from(horizon.max(1));
    let parametric = mean_f64(&sample) + normal_quantile(tail) * std_dev(&sample) * horizon.sqrt();

    let mut sorted = sample;
    sorted.sort_by(|a, b| a.total_cmp(b));
    let historical = percentile(&sorted, tail);

    let var = if parametric.abs() >= historical.abs() {
        parametric
    } else {
        historical
    };
    let beyond: Vec<f64> = sorted.iter().copied().take_while(|r| *r <= var).collect();
    let cvar = if beyond.is_empty() { var } else { mean_f64(&beyond) };

    VarEstimate {
        var,
        cvar,
        parametric,
        historical,
    }
}

/// Linear-interpolated percentile of an ascending sample, `q` in [0, 1].
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

/// Inverse standard normal CDF (Acklam's rational approximation,
/// relative error below 1.15e-9).
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_reference_points() {
        assert!(normal_quantile(0.5).abs() < 1e-9);
        assert!((normal_quantile(0.05) + 1.644_853_626_951_472).abs() < 1e-8);
        assert!((normal_quantile(0.01) + 2.326_347_874_040_841).abs() < 1e-8);
        assert!((normal_quantile(0.975) - 1.959_963_984_540_054).abs() < 1e-8);
    }

    #[test]
    fn percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 1.0), 5.0);
        assert!((percentile(&sorted, 0.1) - 1.4).abs() < 1e-12);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn short_sample_is_zero() {
        assert_eq!(calculate_var(&[-0.01; 19], 0.95, 1), VarEstimate::default());
    }

    #[test]
    fn var_is_conservative_and_cvar_is_deeper() {
        let returns: Vec<f64> = (0..40).map(|i| if i % 5 == 0 { -0.03 } else { 0.01 }).collect();
        let est = calculate_var(&returns, 0.95, 1);
        assert!(est.var < 0.0);
        assert!(est.var.abs() >= est.parametric.abs().min(est.historical.abs()));
        assert!(est.var.abs() >= est.historical.abs() || est.var == est.parametric);
        assert!(est.cvar <= est.var);
    }

    #[test]
    fn horizon_widens_parametric_var() {
        let returns: Vec<f64> = (0..30).map(|i| ((i % 7) as f64 - 3.0) * 0.004).collect();
        let one = calculate_var(&returns, 0.99, 1);
        let ten = calculate_var(&returns, 0.99, 10);
        assert!(ten.parametric < one.parametric);
    }
}
