//! Radiometric calibration of raw bands
//!
//! Converts stored digital counts into physical units with
//! `value = raw * scale_factor + add_offset`, masking fill cells on the raw value.

use crate::band::{CalibrationParams, NumericBand};
use crate::errors::{Result, SatBandsError};
use ndarray::{Array2, Zip};
use tracing::debug;

/// A band in physical units together with its validity mask.
///
/// Immutable once constructed; products borrow it read-only.
#[derive(Debug, Clone)]
pub struct CalibratedBand {
    name: String,
    values: Array2<f64>,
    valid: Array2<bool>,
    params: CalibrationParams,
    units: Option<String>,
    long_name: Option<String>,
    wavelength: Option<String>,
}

impl CalibratedBand {
    /// Build a calibrated band directly from physical values and a mask.
    ///
    /// Used for data that arrives already calibrated.
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::ShapeMismatch`] if `values` and `valid` differ in shape.
    pub fn from_parts(
        name: impl Into<String>,
        values: Array2<f64>,
        valid: Array2<bool>,
    ) -> Result<Self> {
        let name = name.into();
        if values.dim() != valid.dim() {
            return Err(SatBandsError::ShapeMismatch {
                product: name,
                left: values.shape().to_vec(),
                right: valid.shape().to_vec(),
            });
        }
        Ok(Self {
            name,
            values,
            valid,
            params: CalibrationParams::default(),
            units: None,
            long_name: None,
            wavelength: None,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Validity mask, `true` where the cell holds usable data
    #[must_use]
    pub fn mask(&self) -> &Array2<bool> {
        &self.valid
    }

    #[must_use]
    pub fn params(&self) -> &CalibrationParams {
        &self.params
    }

    #[must_use]
    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    #[must_use]
    pub fn long_name(&self) -> Option<&str> {
        self.long_name.as_deref()
    }

    #[must_use]
    pub fn wavelength(&self) -> Option<&str> {
        self.wavelength.as_deref()
    }

    /// (rows, cols)
    #[must_use]
    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Invalidate every cell where `keep` is false.
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::ShapeMismatch`] if `keep` is not on the band's grid.
    pub fn restrict(&mut self, keep: &Array2<bool>) -> Result<()> {
        if keep.dim() != self.values.dim() {
            return Err(SatBandsError::ShapeMismatch {
                product: self.name.clone(),
                left: self.values.shape().to_vec(),
                right: keep.shape().to_vec(),
            });
        }
        Zip::from(&mut self.values)
            .and(&mut self.valid)
            .and(keep)
            .for_each(|v, ok, &k| {
                if !k {
                    *v = f64::NAN;
                    *ok = false;
                }
            });
        Ok(())
    }
}

/// Calibrate a band with the parameters read from its source attributes.
///
/// # Errors
///
/// Returns [`crate::SatBandsError::Shape`] if the band is not 2D after squeezing.
pub fn calibrate_band(band: &NumericBand) -> Result<CalibratedBand> {
    calibrate(band, &band.calibration)
}

/// Calibrate a band with explicit parameters.
///
/// Raw samples are promoted to `f64` before scaling. A cell is invalid when its
/// raw value equals `params.fill_value`, the raw value is not finite, or the
/// scaled value overflows. Invalid cells keep a NaN value so they can never be
/// mistaken for data.
///
/// # Errors
///
/// Returns [`crate::SatBandsError::Shape`] if the band is not 2D after squeezing.
pub fn calibrate(band: &NumericBand, params: &CalibrationParams) -> Result<CalibratedBand> {
    let raw = band.squeeze()?;
    let dim = raw.dim();
    let scale = params.scale_factor;
    let offset = params.add_offset;
    let fill = params.fill_value;

    let mut values = Array2::<f64>::zeros(dim);
    let mut valid = Array2::<bool>::from_elem(dim, false);

    Zip::from(&mut values)
        .and(&mut valid)
        .and(&raw)
        .par_for_each(|value, ok, &r| {
            let is_fill = fill.map_or(false, |fv| r == fv);
            let scaled = r * scale + offset;
            if is_fill || !r.is_finite() || !scaled.is_finite() {
                *value = f64::NAN;
                *ok = false;
            } else {
                *value = scaled;
                *ok = true;
            }
        });

    let calibrated = CalibratedBand {
        name: band.name.clone(),
        values,
        valid,
        params: *params,
        units: band.units.clone(),
        long_name: band.long_name.clone(),
        wavelength: band.wavelength.clone(),
    };

    debug!(
        band = %band.name,
        rows = dim.0,
        cols = dim.1,
        scale,
        offset,
        valid = calibrated.valid_count(),
        "calibrated band"
    );

    Ok(calibrated)
}
