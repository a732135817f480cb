//! Output collaborators: raster sinks, archive packaging and statistics JSON
//!
//! The core hands finished arrays to a [`RasterSink`] together with their affine
//! transform, CRS and a tag map, and never depends on how the sink encodes them.
//! Finished files are bundled by an [`ArchivePackager`].

use crate::calibration::CalibratedBand;
use crate::errors::{Result, SatBandsError};
use crate::geoframe::AffineTransform;
use crate::products::{DerivedProduct, OutputDtype};
use crate::projection::ProjectionDef;
use crate::statistics::{ProductStats, StatsRecord};
use chrono::Utc;
use ndarray::{ArrayView2, ArrayView3};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Raster metadata tags
pub type Tags = BTreeMap<String, String>;

/// Samples handed to a sink
#[derive(Debug, Clone, Copy)]
pub enum RasterData<'a> {
    /// One band, `(rows, cols)`
    Single(ArrayView2<'a, f64>),
    /// Band stack, `(bands, rows, cols)`
    Stack(ArrayView3<'a, f64>),
}

impl RasterData<'_> {
    /// `(bands, rows, cols)`
    pub fn dim(&self) -> (usize, usize, usize) {
        match self {
            Self::Single(a) => (1, a.nrows(), a.ncols()),
            Self::Stack(a) => a.dim(),
        }
    }
}

/// Everything a sink needs to persist one raster
#[derive(Debug, Clone)]
pub struct Raster<'a> {
    pub name: &'a str,
    pub data: RasterData<'a>,
    pub dtype: OutputDtype,
    pub nodata: Option<f64>,
    pub transform: AffineTransform,
    pub crs: &'a ProjectionDef,
    pub tags: Tags,
}

/// Raster encoding service
pub trait RasterSink: Send + Sync {
    /// File extension of written rasters, without the dot
    fn extension(&self) -> &'static str;

    /// Persist `raster` at `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns the backend's I/O or encoding error.
    fn write_raster(&self, path: &Path, raster: &Raster<'_>) -> Result<()>;
}

/// Archive packaging service
pub trait ArchivePackager {
    /// Bundle `files` into one archive named `name` and return its path.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a file cannot be read or the archive written.
    fn package(&self, name: &str, files: &[PathBuf]) -> Result<PathBuf>;
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    archive: &'a str,
    created: String,
    files: Vec<String>,
}

/// Packages outputs as `<root>/<name>.zip` holding the deflated files plus a
/// `manifest.json` entry listing them.
#[derive(Debug, Clone)]
pub struct ZipPackager {
    root: PathBuf,
}

impl ZipPackager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArchivePackager for ZipPackager {
    fn package(&self, name: &str, files: &[PathBuf]) -> Result<PathBuf> {
        let archive = self.root.join(format!("{name}.zip"));
        let mut zip = ZipWriter::new(BufWriter::new(File::create(&archive)?));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut listed = Vec::with_capacity(files.len());
        for file in files {
            let entry = file
                .file_name()
                .ok_or_else(|| {
                    SatBandsError::invalid_config(format!("'{}' has no file name", file.display()))
                })?
                .to_string_lossy()
                .into_owned();
            zip.start_file(entry.as_str(), options)?;
            io::copy(&mut File::open(file)?, &mut zip)?;
            listed.push(entry);
        }

        let manifest = Manifest {
            archive: name,
            created: Utc::now().to_rfc3339(),
            files: listed,
        };
        zip.start_file("manifest.json", options)?;
        serde_json::to_writer_pretty(&mut zip, &manifest)?;
        zip.finish()?.flush()?;

        info!(archive = %archive.display(), files = files.len(), "packaged outputs");
        Ok(archive)
    }
}

/// Write a statistics record as pretty JSON.
///
/// # Errors
///
/// Returns an I/O or JSON error.
pub fn write_stats_json(path: &Path, record: &StatsRecord) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, record)?;
    debug!(path = %path.display(), "wrote statistics");
    Ok(())
}

/// Tags attached to a derived product raster
pub fn product_tags(product: &DerivedProduct, stats: Option<&ProductStats>) -> Tags {
    let mut tags = Tags::new();
    tags.insert("PRODUCT".into(), product.name().to_string());
    tags.insert("UNITS".into(), product.unit().to_string());
    tags.insert("INPUT_BANDS".into(), product.inputs().join(","));
    if let Some((lo, hi)) = product.spec().fixed_domain {
        tags.insert("DISPLAY_DOMAIN".into(), format!("{lo},{hi}"));
    }
    for (k, v) in product.spec().parameters() {
        tags.insert(k.to_uppercase(), v.to_string());
    }
    if let Some(s) = stats {
        tags.insert("STATISTICS_MINIMUM".into(), s.summary.min.to_string());
        tags.insert("STATISTICS_MAXIMUM".into(), s.summary.max.to_string());
        tags.insert("STATISTICS_MEAN".into(), s.summary.mean.to_string());
        tags.insert("STATISTICS_STDDEV".into(), s.summary.std.to_string());
        tags.insert(
            "STATISTICS_VALID_PERCENT".into(),
            s.summary.valid_percentage().to_string(),
        );
    }
    tags
}

/// Tags attached to a calibrated base band raster
pub fn band_tags(band: &CalibratedBand) -> Tags {
    let mut tags = Tags::new();
    tags.insert("BAND".into(), band.name().to_string());
    if let Some(units) = band.units() {
        tags.insert("UNITS".into(), units.to_string());
    }
    if let Some(wavelength) = band.wavelength() {
        tags.insert("WAVELENGTH".into(), wavelength.to_string());
    }
    if let Some(long_name) = band.long_name() {
        tags.insert("LONG_NAME".into(), long_name.to_string());
    }
    let params = band.params();
    tags.insert("SCALE_FACTOR".into(), params.scale_factor.to_string());
    tags.insert("ADD_OFFSET".into(), params.add_offset.to_string());
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn zip_packager_writes_entries_and_manifest() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.nc");
        let b = dir.path().join("b.json");
        std::fs::write(&a, b"raster").unwrap();
        std::fs::write(&b, b"{}").unwrap();

        let archive = ZipPackager::new(dir.path())
            .package("bundle", &[a, b])
            .unwrap();
        assert_eq!(archive, dir.path().join("bundle.zip"));

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        assert_eq!(zip.len(), 3);
        let mut content = String::new();
        io::Read::read_to_string(&mut zip.by_name("a.nc").unwrap(), &mut content).unwrap();
        assert_eq!(content, "raster");

        let manifest: serde_json::Value =
            serde_json::from_reader(zip.by_name("manifest.json").unwrap()).unwrap();
        assert_eq!(manifest["files"].as_array().unwrap().len(), 2);
        assert_eq!(manifest["archive"], "bundle");
    }

    #[test]
    fn zip_packager_reports_missing_input() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone.nc");
        assert!(ZipPackager::new(dir.path()).package("bundle", &[missing]).is_err());
    }
}
