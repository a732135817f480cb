//! satbands: calibrated bands and derived products from satellite imagery
//!
//! satbands reads multi-band imager containers (HDF5 / NetCDF-4), converts raw
//! digital counts to physical units, and derives georeferenced geophysical
//! products such as brightness temperature, land and sea surface temperature,
//! fire masks, OLR, NDVI/NDSI, aerosol optical depth and humidity, together with
//! their statistics, coverage classifications and display-normalized rasters.
//!
//! ## Key Features
//!
//! - **Calibration**: `value = raw * scale + offset`, with fill cells masked on the raw value
//! - **Georeferencing**: one projected frame per file, shared by every band and product
//! - **Formula registry**: every product is data, evaluated in parallel with per-product failure isolation
//! - **Statistics**: min/max/mean/std and bucketed coverage over valid cells only
//! - **Outputs**: GeoTIFF or NetCDF rasters, JSON statistics and a zip bundle
//!
//! ## Module Organization
//!
//! - [`band`]: raw band model and squeeze validation
//! - [`calibration`]: radiometric calibration and validity masks
//! - [`projection`]: forward projections behind the [`projection::Projector`] seam
//! - [`geoframe`]: geographic bounds, projected frame and affine transform
//! - [`products`]: product catalogue, formulas and the evaluating registry
//! - [`statistics`]: summaries, classification schemes and JSON records
//! - [`render`]: normalization for an external color renderer
//! - [`data_source`]: the band container abstraction and an in-memory source
//! - [`netcdf_io`]: NetCDF/HDF5 band source and raster writer
//! - [`geotiff_io`]: GeoTIFF raster writer
//! - [`output`]: raster sink and packaging traits, tags and statistics JSON
//! - [`metadata`]: container inspection and product level detection
//! - [`config`]: pipeline configuration
//! - [`pipeline`]: end-to-end run over one container
//! - [`parallel`]: thread pool configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use satbands::prelude::*;
//!
//! let source = NetCdfBandSource::open("3RIMG_30MAR2025_0615_L1C_ASIA_MER_V01R00.h5")?;
//! let config = PipelineConfig {
//!     products: vec![ProductKind::Ndsi, ProductKind::Aod, ProductKind::FireMask],
//!     ..PipelineConfig::default()
//! };
//! let pipeline = Pipeline::new(config)?;
//! let packager = ZipPackager::new("output");
//! let report = pipeline.run(
//!     &source,
//!     &GeoTiffRasterWriter,
//!     Some(&packager as &dyn ArchivePackager),
//! )?;
//! for skipped in &report.skipped {
//!     println!("skipped {}: {}", skipped.name, skipped.reason);
//! }
//! # Ok::<(), satbands::SatBandsError>(())
//! ```

pub mod band;
pub mod calibration;
pub mod config;
pub mod data_source;
pub mod errors;
pub mod geoframe;
pub mod geotiff_io;
pub mod metadata;
pub mod netcdf_io;
pub mod output;
pub mod parallel;
pub mod pipeline;
pub mod products;
pub mod projection;
pub mod render;
pub mod statistics;

pub use errors::{Result, SatBandsError};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::band::{CalibrationParams, NumericBand, RawDtype};
    pub use crate::calibration::{calibrate, calibrate_band, CalibratedBand};
    pub use crate::config::{AttributeKeys, BandMap, PipelineConfig, RasterFormat};
    pub use crate::data_source::{BandSource, MemoryBandSource};
    pub use crate::errors::{Result, SatBandsError};
    pub use crate::geoframe::{build_transform, AffineTransform, GeoBounds, GeoFrame};
    pub use crate::geotiff_io::GeoTiffRasterWriter;
    pub use crate::metadata::{extract_metadata, ProductLevel};
    pub use crate::netcdf_io::{NetCdfBandSource, NetCdfRasterWriter};
    pub use crate::output::{ArchivePackager, RasterSink, ZipPackager};
    pub use crate::parallel::ParallelConfig;
    pub use crate::pipeline::{Pipeline, RunReport};
    pub use crate::products::{
        DerivedProduct, FormulaParams, ProductKind, ProductRegistry, ProductSpec,
    };
    pub use crate::projection::{LonLat, ProjectionDef, Projector};
    pub use crate::render::{normalize, NormalizedArray};
    pub use crate::statistics::{summarize, ClassificationScheme, ProductStats};
}
