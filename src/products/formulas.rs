//! Per-cell product formulas
//!
//! A [`Formula`] is evaluated on the calibrated values of one grid cell. Every
//! variant that divides substitutes `0.0` for a zero denominator, so a finite
//! input never yields NaN or infinity.

use serde::{Deserialize, Serialize};

/// Kelvin to Celsius offset
pub const KELVIN_OFFSET: f64 = 273.15;
/// Default fire detection threshold (K)
pub const DEFAULT_FIRE_THRESHOLD_K: f64 = 350.0;
/// Default OLR empirical constant
pub const DEFAULT_OLR_K: f64 = 1.1;
/// Default AOD saturation epsilon
pub const DEFAULT_AOD_EPSILON: f64 = 0.1;
/// Default water vapour normalization factor
pub const DEFAULT_WV_NORM_FACTOR: f64 = 1.0;

/// Tunable constants of the formula family.
///
/// The OLR constant and AOD epsilon are empirical defaults, not physical constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaParams {
    pub fire_threshold_k: f64,
    pub olr_k: f64,
    pub aod_epsilon: f64,
    pub wv_norm_factor: f64,
}

impl Default for FormulaParams {
    fn default() -> Self {
        Self {
            fire_threshold_k: DEFAULT_FIRE_THRESHOLD_K,
            olr_k: DEFAULT_OLR_K,
            aod_epsilon: DEFAULT_AOD_EPSILON,
            wv_norm_factor: DEFAULT_WV_NORM_FACTOR,
        }
    }
}

/// Formula variants of the product catalogue
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Formula {
    /// `a`
    Passthrough,
    /// `a + delta`
    Offset { delta: f64 },
    /// `1` if `a > threshold`, else `0`
    Threshold { threshold: f64 },
    /// `k * (a + b)`
    ScaledSum { k: f64 },
    /// `(a - b) / (a + b)`
    NormalizedDifference,
    /// `scale * a / (a + epsilon)`
    SaturatingRatio { scale: f64, epsilon: f64 },
    /// `scale * a / divisor`
    Ratio { scale: f64, divisor: f64 },
    /// `a - b`
    Difference,
}

impl Formula {
    /// Number of band arguments
    #[must_use]
    pub const fn arity(&self) -> usize {
        match self {
            Self::Passthrough
            | Self::Offset { .. }
            | Self::Threshold { .. }
            | Self::SaturatingRatio { .. }
            | Self::Ratio { .. } => 1,
            Self::ScaledSum { .. } | Self::NormalizedDifference | Self::Difference => 2,
        }
    }

    /// Whether the formula divides and therefore carries a zero-denominator guard
    #[must_use]
    pub const fn divides(&self) -> bool {
        matches!(
            self,
            Self::NormalizedDifference | Self::SaturatingRatio { .. } | Self::Ratio { .. }
        )
    }

    /// Evaluate on one cell. `args` must hold [`Formula::arity`] values.
    #[must_use]
    pub fn eval(&self, args: &[f64]) -> f64 {
        let a = args[0];
        match *self {
            Self::Passthrough => a,
            Self::Offset { delta } => a + delta,
            Self::Threshold { threshold } => {
                if a > threshold {
                    1.0
                } else {
                    0.0
                }
            }
            Self::ScaledSum { k } => k * (a + args[1]),
            Self::NormalizedDifference => guarded_div(a - args[1], a + args[1]),
            Self::SaturatingRatio { scale, epsilon } => scale * guarded_div(a, a + epsilon),
            Self::Ratio { scale, divisor } => scale * guarded_div(a, divisor),
            Self::Difference => a - args[1],
        }
    }
}

/// `num / den`, or `0.0` when the denominator is zero.
#[inline]
pub fn guarded_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}
