//! Product evaluation with partial-failure semantics
//!
//! Products of one source file are independent: each reads only its input bands
//! and the shared [`GeoFrame`], so a batch is evaluated in parallel and one
//! failing product never aborts the others.

use super::{DerivedProduct, FormulaParams, ProductKind, ProductSpec, ValidRange};
use crate::calibration::CalibratedBand;
use crate::config::BandMap;
use crate::errors::{Result, SatBandsError};
use crate::geoframe::GeoFrame;
use ndarray::{Array2, Zip};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Default no-data sentinel of floating point products
pub const DEFAULT_NODATA: f64 = -9999.0;

/// Calibrated bands of one source file, keyed by container band name
#[derive(Debug, Default, Clone)]
pub struct BandSet {
    bands: HashMap<String, CalibratedBand>,
}

impl BandSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, band: CalibratedBand) {
        self.bands.insert(band.name().to_string(), band);
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CalibratedBand> {
        self.bands.values_mut()
    }

    pub fn get(&self, name: &str) -> Option<&CalibratedBand> {
        self.bands.get(name)
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bands.keys().map(String::as_str)
    }

    /// Look up the inputs of `kind` through the role-to-band mapping.
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::MissingBand`] for the first role that is unmapped
    /// or whose band is absent.
    pub fn resolve(&self, kind: ProductKind, map: &BandMap) -> Result<Vec<&CalibratedBand>> {
        kind.input_roles()
            .iter()
            .map(|&role| {
                let name = map
                    .band_for(role)
                    .ok_or_else(|| SatBandsError::missing_band(role.as_str()))?;
                self.get(name)
                    .ok_or_else(|| SatBandsError::missing_band(name))
            })
            .collect()
    }
}

impl FromIterator<CalibratedBand> for BandSet {
    fn from_iter<I: IntoIterator<Item = CalibratedBand>>(iter: I) -> Self {
        let mut set = Self::new();
        for band in iter {
            set.insert(band);
        }
        set
    }
}

/// A product that could not be computed
#[derive(Debug)]
pub struct ProductFailure {
    pub kind: ProductKind,
    pub error: SatBandsError,
}

/// Outcome of evaluating a batch of products
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub products: Vec<DerivedProduct>,
    pub failures: Vec<ProductFailure>,
}

impl BatchOutcome {
    /// Names of the products that were skipped
    pub fn skipped(&self) -> Vec<&'static str> {
        self.failures.iter().map(|f| f.kind.as_str()).collect()
    }
}

/// Evaluates product specs against calibrated bands
#[derive(Debug, Clone)]
pub struct ProductRegistry {
    params: FormulaParams,
    nodata: f64,
}

impl Default for ProductRegistry {
    fn default() -> Self {
        Self::new(FormulaParams::default())
    }
}

impl ProductRegistry {
    pub fn new(params: FormulaParams) -> Self {
        Self {
            params,
            nodata: DEFAULT_NODATA,
        }
    }

    /// Override the no-data sentinel of floating point products
    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn params(&self) -> &FormulaParams {
        &self.params
    }

    /// Numeric spec of `kind` under this registry's parameters
    pub fn spec(&self, kind: ProductKind) -> ProductSpec {
        ProductSpec::for_kind(kind, &self.params, self.nodata)
    }

    /// Compute one product from explicit inputs.
    ///
    /// A cell is valid only when every input cell is valid. Values are clipped to
    /// the product's valid range when it clips; invalid cells receive the no-data sentinel.
    ///
    /// # Errors
    ///
    /// - [`SatBandsError::MissingBand`] if fewer inputs than the formula needs
    /// - [`SatBandsError::ShapeMismatch`] if inputs are not co-registered
    /// - [`SatBandsError::DivisionGuardViolation`] if a ratio leaked a non-finite value
    pub fn compute(
        &self,
        kind: ProductKind,
        inputs: &[&CalibratedBand],
        frame: &GeoFrame,
    ) -> Result<DerivedProduct> {
        let spec = self.spec(kind);
        let formula = spec.formula;
        let range = spec.valid_range;

        if inputs.len() < formula.arity() {
            let role = kind.input_roles()[inputs.len()];
            return Err(SatBandsError::missing_band(role.as_str()));
        }
        let inputs = &inputs[..formula.arity()];

        let dim = inputs[0].dim();
        if let Some(other) = inputs.iter().find(|b| b.dim() != dim) {
            return Err(SatBandsError::ShapeMismatch {
                product: kind.as_str().to_string(),
                left: vec![dim.0, dim.1],
                right: vec![other.dim().0, other.dim().1],
            });
        }

        let mut values = Array2::<f64>::zeros(dim);
        let mut valid = Array2::<bool>::from_elem(dim, false);

        match inputs {
            [a] => Zip::from(&mut values)
                .and(&mut valid)
                .and(a.values())
                .and(a.mask())
                .par_for_each(|out, ok, &x, &mx| {
                    *ok = mx;
                    if mx {
                        *out = clip_finite(range, formula.eval(&[x]));
                    }
                }),
            [a, b] => Zip::from(&mut values)
                .and(&mut valid)
                .and(a.values())
                .and(a.mask())
                .and(b.values())
                .and(b.mask())
                .par_for_each(|out, ok, &x, &mx, &y, &my| {
                    *ok = mx && my;
                    if *ok {
                        *out = clip_finite(range, formula.eval(&[x, y]));
                    }
                }),
            _ => unreachable!("formula arity is 1 or 2"),
        }

        let leaked = values
            .iter()
            .zip(valid.iter())
            .filter(|&(v, &ok)| ok && !v.is_finite())
            .count();
        if leaked > 0 {
            if formula.divides() {
                return Err(SatBandsError::DivisionGuardViolation {
                    product: kind.as_str().to_string(),
                    cells: leaked,
                });
            }
            // Overflow in a non-ratio formula: drop the cells rather than the product.
            warn!(product = %kind, cells = leaked, "masking non-finite cells");
            Zip::from(&values).and(&mut valid).for_each(|v, ok| {
                if !v.is_finite() {
                    *ok = false;
                }
            });
        }

        let nodata = spec.nodata;
        Zip::from(&mut values).and(&valid).par_for_each(|v, &ok| {
            if !ok {
                *v = nodata;
            }
        });

        debug!(product = %kind, rows = dim.0, cols = dim.1, "computed product");

        Ok(DerivedProduct::new(
            spec,
            values,
            valid,
            frame.transform_for(dim),
            inputs.iter().map(|b| b.name().to_string()).collect(),
        ))
    }

    /// Compute `kinds` in parallel, recording each failure instead of aborting.
    ///
    /// Output order follows `kinds`.
    pub fn compute_all(
        &self,
        kinds: &[ProductKind],
        bands: &BandSet,
        map: &BandMap,
        frame: &GeoFrame,
    ) -> BatchOutcome {
        let results: Vec<(ProductKind, Result<DerivedProduct>)> = kinds
            .par_iter()
            .map(|&kind| {
                let result = bands
                    .resolve(kind, map)
                    .and_then(|inputs| self.compute(kind, &inputs, frame));
                (kind, result)
            })
            .collect();

        let mut outcome = BatchOutcome::default();
        for (kind, result) in results {
            match result {
                Ok(product) => {
                    info!(product = %kind, "product computed");
                    outcome.products.push(product);
                }
                Err(error) => {
                    warn!(product = %kind, %error, "skipping product");
                    outcome.failures.push(ProductFailure { kind, error });
                }
            }
        }
        outcome
    }
}

/// Apply the range to a finite value; non-finite values are left for the guard check.
fn clip_finite(range: ValidRange, value: f64) -> f64 {
    if value.is_finite() {
        range.apply(value)
    } else {
        value
    }
}
