//! Raw band data model
//!
//! A [`NumericBand`] is a grid exactly as it was read from the container, plus the
//! attributes needed to calibrate it. It carries no logic beyond shape validation.

use crate::errors::{Result, SatBandsError};
use ndarray::{Array2, ArrayD};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage type of the raw samples in the source container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawDtype {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl RawDtype {
    /// Get the string representation of the dtype
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::U8 => "uint8",
            Self::I8 => "int8",
            Self::U16 => "uint16",
            Self::I16 => "int16",
            Self::U32 => "uint32",
            Self::I32 => "int32",
            Self::F32 => "float32",
            Self::F64 => "float64",
        }
    }

    /// Whether the samples are integer digital counts
    #[must_use]
    pub const fn is_integer(self) -> bool {
        !matches!(self, Self::F32 | Self::F64)
    }

    /// Size of one element in bytes
    #[must_use]
    pub const fn size_bytes(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

impl fmt::Display for RawDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linear calibration parameters: `value = raw * scale_factor + add_offset`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub scale_factor: f64,
    pub add_offset: f64,
    pub fill_value: Option<f64>,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            add_offset: 0.0,
            fill_value: None,
        }
    }
}

/// A raw band as read from the data source.
///
/// Samples are held as `f64` regardless of [`RawDtype`]; every integer type the
/// containers use fits exactly, so no count is altered on load.
#[derive(Debug, Clone)]
pub struct NumericBand {
    pub name: String,
    pub dtype: RawDtype,
    pub data: ArrayD<f64>,
    pub calibration: CalibrationParams,
    pub units: Option<String>,
    pub long_name: Option<String>,
    pub wavelength: Option<String>,
}

impl NumericBand {
    /// Create a band with default calibration (scale 1, offset 0, no fill value)
    pub fn new(name: impl Into<String>, dtype: RawDtype, data: ArrayD<f64>) -> Self {
        Self {
            name: name.into(),
            dtype,
            data,
            calibration: CalibrationParams::default(),
            units: None,
            long_name: None,
            wavelength: None,
        }
    }

    pub fn with_calibration(mut self, calibration: CalibrationParams) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_long_name(mut self, long_name: impl Into<String>) -> Self {
        self.long_name = Some(long_name.into());
        self
    }

    pub fn with_wavelength(mut self, wavelength: impl Into<String>) -> Self {
        self.wavelength = Some(wavelength.into());
        self
    }

    /// Shape of the raw grid as stored
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Collapse singleton dimensions and return the 2D grid.
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::Shape`] if the squeezed grid is not rank 2.
    pub fn squeeze(&self) -> Result<Array2<f64>> {
        let dims: Vec<usize> = self.shape().iter().copied().filter(|&d| d != 1).collect();
        if dims.len() != 2 {
            return Err(SatBandsError::Shape {
                band: self.name.clone(),
                shape: self.shape().to_vec(),
            });
        }

        // Logical-order iteration handles non-standard layouts as well.
        let samples: Vec<f64> = self.data.iter().copied().collect();
        Ok(Array2::from_shape_vec((dims[0], dims[1]), samples)?)
    }
}
