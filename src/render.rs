//! Normalization of products for an external color renderer
//!
//! The renderer receives values in `[0, 1]` plus a transparency mask. Products
//! with a fixed display domain (NDVI, NDSI, fire mask) are normalized against
//! that domain so colors are comparable across scenes; all others use their
//! observed min/max.

use crate::errors::{Result, SatBandsError};
use crate::products::DerivedProduct;
use crate::statistics::summary_stats;
use ndarray::{Array2, Array3, Axis, Zip};

/// A product mapped into `[0, 1]`.
///
/// Invalid cells keep the product's raw value and are flagged transparent.
#[derive(Debug, Clone)]
pub struct NormalizedArray {
    values: Array2<f64>,
    transparent: Array2<bool>,
    domain: (f64, f64),
}

impl NormalizedArray {
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// `true` where the renderer must draw nothing
    pub fn transparent(&self) -> &Array2<bool> {
        &self.transparent
    }

    /// Domain the values were normalized against
    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    /// Alpha channel: 0 for transparent cells, 255 otherwise
    pub fn alpha(&self) -> Array2<u8> {
        self.transparent.mapv(|t| if t { 0 } else { 255 })
    }

    /// Two-band stack `[normalized, alpha / 255]` for a raster writer.
    pub fn to_stack(&self) -> Array3<f64> {
        let (rows, cols) = self.values.dim();
        let mut out = Array3::<f64>::zeros((2, rows, cols));
        out.index_axis_mut(Axis(0), 0).assign(&self.values);
        out.index_axis_mut(Axis(0), 1)
            .assign(&self.transparent.mapv(|t| if t { 0.0 } else { 1.0 }));
        out
    }
}

/// Resolve the normalization domain: explicit, then the product's fixed domain,
/// then the observed min/max of valid cells.
///
/// # Errors
///
/// - [`SatBandsError::InvalidConfig`] if an explicit domain is not finite or has `max < min`
/// - [`SatBandsError::EmptyProduct`] if the observed domain is needed and no cell is valid
pub fn resolve_domain(product: &DerivedProduct, domain: Option<(f64, f64)>) -> Result<(f64, f64)> {
    if let Some((lo, hi)) = domain {
        if !lo.is_finite() || !hi.is_finite() || hi < lo {
            return Err(SatBandsError::invalid_config(format!(
                "invalid display domain [{lo}, {hi}] for '{}'",
                product.name()
            )));
        }
        return Ok((lo, hi));
    }
    if let Some(fixed) = product.spec().fixed_domain {
        return Ok(fixed);
    }
    let stats = summary_stats(product)?;
    Ok((stats.min, stats.max))
}

/// Map the valid cells of `product` into `[0, 1]`.
///
/// Values outside the domain are clamped. A zero-width domain maps every valid
/// cell to `0.0`.
///
/// # Errors
///
/// See [`resolve_domain`].
pub fn normalize(product: &DerivedProduct, domain: Option<(f64, f64)>) -> Result<NormalizedArray> {
    let (lo, hi) = resolve_domain(product, domain)?;
    let span = hi - lo;

    let mut values = product.values().clone();
    Zip::from(&mut values)
        .and(product.mask())
        .par_for_each(|v, &ok| {
            if ok {
                *v = if span > 0.0 {
                    ((*v - lo) / span).clamp(0.0, 1.0)
                } else {
                    0.0
                };
            }
        });

    Ok(NormalizedArray {
        values,
        transparent: product.mask().mapv(|ok| !ok),
        domain: (lo, hi),
    })
}
