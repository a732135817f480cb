//! Centralized error handling for satbands
//!
//! Every fallible operation in the crate returns [`Result`]. Errors raised while
//! computing a single band or product are recoverable at the registry boundary;
//! the remaining variants abort the run (see [`SatBandsError::is_fatal`]).

use thiserror::Error;

/// Main error type for satbands operations
#[derive(Error, Debug)]
pub enum SatBandsError {
    /// Band grid is not two-dimensional after squeezing singleton dimensions
    #[error("band '{band}' has shape {shape:?}; expected a 2D grid after removing singleton dimensions")]
    Shape { band: String, shape: Vec<usize> },

    /// Requested band is absent from the data source
    #[error("band '{band}' not found in source")]
    MissingBand { band: String },

    /// Input bands of a product are not co-registered
    #[error("product '{product}' inputs disagree on shape: {left:?} vs {right:?}")]
    ShapeMismatch {
        product: String,
        left: Vec<usize>,
        right: Vec<usize>,
    },

    /// Projected bounds collapse or invert
    #[error(
        "degenerate geospatial frame: left={left}, right={right}, bottom={bottom}, top={top}"
    )]
    DegenerateFrame {
        left: f64,
        right: f64,
        bottom: f64,
        top: f64,
    },

    /// No valid cells to summarize
    #[error("product '{product}' has no valid cells")]
    EmptyProduct { product: String },

    /// A ratio formula leaked a non-finite value into its output
    #[error("product '{product}' produced {cells} non-finite cells from a guarded ratio")]
    DivisionGuardViolation { product: String, cells: usize },

    /// Geodesy service failure
    #[error("projection error: {0}")]
    Projection(String),

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Thread pool configuration error
    #[error("thread pool error: {0}")]
    ThreadPool(String),

    /// NetCDF/HDF5 container operation errors
    #[error("NetCDF error: {0}")]
    NetCDF(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Zip archive errors
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// GeoTIFF encoding errors
    #[error("GeoTIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Array shape or dimension error
    #[error("array error: {0}")]
    Array(#[from] ndarray::ShapeError),
}

impl SatBandsError {
    /// Create a MissingBand error.
    pub fn missing_band(band: impl Into<String>) -> Self {
        Self::MissingBand { band: band.into() }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether the error invalidates the whole run rather than a single product.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DegenerateFrame { .. }
                | Self::Projection(_)
                | Self::InvalidConfig(_)
                | Self::ThreadPool(_)
        )
    }
}

/// Result type alias for satbands operations
pub type Result<T> = std::result::Result<T, SatBandsError>;
