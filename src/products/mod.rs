//! Derived geophysical products
//!
//! Every product is a [`ProductKind`] whose numeric behavior is described by a
//! [`ProductSpec`]: which bands it reads, the [`Formula`] applied per cell, its
//! unit, valid range and display domain. The [`ProductRegistry`] evaluates specs
//! against calibrated bands and records per-product outcomes.
//!
//! # Organization
//!
//! - [`formulas`]: the per-cell formula variants and their division guards
//! - [`registry`]: evaluation of one or many products with partial-failure semantics

pub mod formulas;
pub mod registry;

pub use formulas::{Formula, FormulaParams};
pub use registry::{BandSet, BatchOutcome, ProductFailure, ProductRegistry};

use crate::errors::{Result, SatBandsError};
use crate::geoframe::AffineTransform;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Spectral role a product input plays; resolved to a container band name by
/// [`crate::config::BandMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandRole {
    Vis,
    Swir,
    Mir,
    Tir1,
    Tir2,
    Wv,
    Nir,
    Red,
}

impl BandRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vis => "vis",
            Self::Swir => "swir",
            Self::Mir => "mir",
            Self::Tir1 => "tir1",
            Self::Tir2 => "tir2",
            Self::Wv => "wv",
            Self::Nir => "nir",
            Self::Red => "red",
        }
    }
}

/// The fixed catalogue of derived products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// Brightness temperature in Kelvin
    BrightnessTemperature,
    /// Land surface temperature in Celsius
    Lst,
    /// Sea surface temperature in Celsius
    Sst,
    /// Binary fire mask from a brightness temperature threshold
    FireMask,
    /// Outgoing longwave radiation estimate
    Olr,
    /// Normalized difference vegetation index
    Ndvi,
    /// Normalized difference snow index
    Ndsi,
    /// Aerosol optical depth proxy
    Aod,
    /// Upper tropospheric humidity, `100 * W / (W + 1)`
    Uth,
    /// Water vapour content, `100 * W / norm_factor`
    WaterVaporContent,
    /// Atmospheric motion proxy (band difference)
    Amv,
}

impl ProductKind {
    pub const ALL: [ProductKind; 11] = [
        Self::BrightnessTemperature,
        Self::Lst,
        Self::Sst,
        Self::FireMask,
        Self::Olr,
        Self::Ndvi,
        Self::Ndsi,
        Self::Aod,
        Self::Uth,
        Self::WaterVaporContent,
        Self::Amv,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BrightnessTemperature => "brightness_temperature",
            Self::Lst => "lst",
            Self::Sst => "sst",
            Self::FireMask => "fire_mask",
            Self::Olr => "olr",
            Self::Ndvi => "ndvi",
            Self::Ndsi => "ndsi",
            Self::Aod => "aod",
            Self::Uth => "uth",
            Self::WaterVaporContent => "water_vapor_content",
            Self::Amv => "amv",
        }
    }

    /// Spectral roles read by the product, in formula argument order
    #[must_use]
    pub const fn input_roles(self) -> &'static [BandRole] {
        match self {
            Self::BrightnessTemperature | Self::Lst | Self::FireMask => &[BandRole::Tir1],
            Self::Sst => &[BandRole::Tir2],
            Self::Olr => &[BandRole::Tir1, BandRole::Tir2],
            Self::Ndvi => &[BandRole::Nir, BandRole::Red],
            Self::Ndsi => &[BandRole::Vis, BandRole::Swir],
            Self::Aod => &[BandRole::Vis],
            Self::Uth | Self::WaterVaporContent => &[BandRole::Wv],
            Self::Amv => &[BandRole::Mir, BandRole::Wv],
        }
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductKind {
    type Err = SatBandsError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        let alias = match wanted.as_str() {
            "bt" | "brightness" => "brightness_temperature",
            "fire" => "fire_mask",
            "wv" | "wvc" | "water_vapour_content" => "water_vapor_content",
            other => other,
        };
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == alias)
            .ok_or_else(|| SatBandsError::invalid_config(format!("unknown product '{s}'")))
    }
}

/// Declared output range of a product
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Whether values outside the range are clamped into it
    pub clip: bool,
}

impl ValidRange {
    pub const UNRESTRICTED: Self = Self {
        min: None,
        max: None,
        clip: false,
    };

    pub const fn nominal(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            clip: false,
        }
    }

    pub const fn clipped(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            clip: true,
        }
    }

    /// Clamp `value` if this range clips, otherwise return it unchanged.
    /// NaN passes through.
    pub fn apply(&self, value: f64) -> f64 {
        if !self.clip || value.is_nan() {
            return value;
        }
        let lower = self.min.map_or(value, |m| value.max(m));
        self.max.map_or(lower, |m| lower.min(m))
    }
}

/// Sample type written to the raster for a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputDtype {
    Float32,
    UInt8,
}

/// Everything the registry needs to evaluate one product
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSpec {
    pub kind: ProductKind,
    pub formula: Formula,
    pub unit: &'static str,
    pub valid_range: ValidRange,
    /// Fixed normalization domain; `None` means the observed min/max
    pub fixed_domain: Option<(f64, f64)>,
    pub dtype: OutputDtype,
    pub nodata: f64,
}

impl ProductSpec {
    /// Build the product spec of `kind` with the given formula parameters.
    pub fn for_kind(kind: ProductKind, params: &FormulaParams, float_nodata: f64) -> Self {
        let (formula, unit, valid_range, fixed_domain) = match kind {
            ProductKind::BrightnessTemperature => {
                (Formula::Passthrough, "K", ValidRange::UNRESTRICTED, None)
            }
            ProductKind::Lst | ProductKind::Sst => (
                Formula::Offset {
                    delta: -formulas::KELVIN_OFFSET,
                },
                "degC",
                ValidRange::UNRESTRICTED,
                None,
            ),
            ProductKind::FireMask => (
                Formula::Threshold {
                    threshold: params.fire_threshold_k,
                },
                "1",
                ValidRange::nominal(0.0, 1.0),
                Some((0.0, 1.0)),
            ),
            ProductKind::Olr => (
                Formula::ScaledSum { k: params.olr_k },
                "W m-2",
                ValidRange::UNRESTRICTED,
                None,
            ),
            ProductKind::Ndvi | ProductKind::Ndsi => (
                Formula::NormalizedDifference,
                "1",
                ValidRange::clipped(-1.0, 1.0),
                Some((-1.0, 1.0)),
            ),
            ProductKind::Aod => (
                Formula::SaturatingRatio {
                    scale: 1.0,
                    epsilon: params.aod_epsilon,
                },
                "1",
                ValidRange::nominal(0.0, 1.0),
                None,
            ),
            ProductKind::Uth => (
                Formula::SaturatingRatio {
                    scale: 100.0,
                    epsilon: 1.0,
                },
                "%",
                ValidRange::nominal(0.0, 100.0),
                None,
            ),
            ProductKind::WaterVaporContent => (
                Formula::Ratio {
                    scale: 100.0,
                    divisor: params.wv_norm_factor,
                },
                "%",
                ValidRange::nominal(0.0, 100.0),
                None,
            ),
            ProductKind::Amv => (
                Formula::Difference,
                "W m-2 sr-1 um-1",
                ValidRange::UNRESTRICTED,
                None,
            ),
        };

        let (dtype, nodata) = match kind {
            ProductKind::FireMask => (OutputDtype::UInt8, 255.0),
            _ => (OutputDtype::Float32, float_nodata),
        };

        Self {
            kind,
            formula,
            unit,
            valid_range,
            fixed_domain,
            dtype,
            nodata,
        }
    }

    /// Parameters recorded alongside the product statistics
    pub fn parameters(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        match self.formula {
            Formula::Threshold { threshold } => {
                out.insert("threshold_used".to_string(), threshold);
            }
            Formula::ScaledSum { k } => {
                out.insert("empirical_constant_used".to_string(), k);
            }
            Formula::SaturatingRatio { epsilon, .. } => {
                out.insert("epsilon_used".to_string(), epsilon);
            }
            Formula::Ratio { divisor, .. } => {
                out.insert("normalization_factor_used".to_string(), divisor);
            }
            _ => {}
        }
        out
    }
}

/// A computed product grid with its validity mask.
///
/// Invalid cells hold the product's no-data sentinel; they are never part of the
/// statistics but are written to the raster as-is.
#[derive(Debug, Clone)]
pub struct DerivedProduct {
    spec: ProductSpec,
    values: Array2<f64>,
    valid: Array2<bool>,
    transform: AffineTransform,
    inputs: Vec<String>,
}

impl DerivedProduct {
    pub(crate) fn new(
        spec: ProductSpec,
        values: Array2<f64>,
        valid: Array2<bool>,
        transform: AffineTransform,
        inputs: Vec<String>,
    ) -> Self {
        Self {
            spec,
            values,
            valid,
            transform,
            inputs,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ProductKind {
        self.spec.kind
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.spec.kind.as_str()
    }

    #[must_use]
    pub fn unit(&self) -> &'static str {
        self.spec.unit
    }

    #[must_use]
    pub fn spec(&self) -> &ProductSpec {
        &self.spec
    }

    #[must_use]
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    #[must_use]
    pub fn mask(&self) -> &Array2<bool> {
        &self.valid
    }

    #[must_use]
    pub fn transform(&self) -> &AffineTransform {
        &self.transform
    }

    /// Names of the calibrated bands the product was computed from
    #[must_use]
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    #[must_use]
    pub fn nodata(&self) -> f64 {
        self.spec.nodata
    }

    #[must_use]
    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Iterator over the values of valid cells
    pub fn valid_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values
            .iter()
            .zip(self.valid.iter())
            .filter_map(|(&v, &ok)| ok.then_some(v))
    }
}
