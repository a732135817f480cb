//! End-to-end product generation for one source container
//!
//! Bands are loaded and calibrated once, a single [`GeoFrame`] is built and
//! shared by every product, products are evaluated in parallel and each
//! successful product is summarized, normalized and handed to the raster sink.
//! A product that fails at any stage is reported as skipped and contributes no
//! file to the outputs or the archive. Only configuration and frame errors abort
//! the run.

use crate::calibration::calibrate_band;
use crate::config::PipelineConfig;
use crate::data_source::BandSource;
use crate::errors::Result;
use crate::geoframe::GeoFrame;
use crate::metadata::ProductLevel;
use crate::output::{
    band_tags, product_tags, write_stats_json, ArchivePackager, Raster, RasterData, RasterSink,
};
use crate::products::{BandSet, DerivedProduct, OutputDtype, ProductKind, ProductRegistry};
use crate::render::{normalize, NormalizedArray};
use crate::statistics::{fire_summary, summarize, ClassificationScheme, ProductStats};
use ndarray::Zip;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// A band or product left out of the run, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skipped {
    pub name: String,
    pub reason: String,
}

/// Outcome of a pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub source: String,
    pub level: Option<ProductLevel>,
    /// Written files, in write order
    pub outputs: Vec<PathBuf>,
    pub skipped: Vec<Skipped>,
    pub archive: Option<PathBuf>,
    pub stats: Vec<ProductStats>,
}

impl RunReport {
    /// Names of skipped products and bands
    pub fn skipped_names(&self) -> Vec<&str> {
        self.skipped.iter().map(|s| s.name.as_str()).collect()
    }

    fn skip(&mut self, name: impl Into<String>, reason: impl ToString) {
        self.skipped.push(Skipped {
            name: name.into(),
            reason: reason.to_string(),
        });
    }
}

/// Product generation driven by a validated [`PipelineConfig`]
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    registry: ProductRegistry,
}

impl Pipeline {
    /// # Errors
    ///
    /// Returns [`crate::SatBandsError::InvalidConfig`] if the configuration fails validation.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let registry = ProductRegistry::new(config.formulas).with_nodata(config.nodata);
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline over `source`.
    ///
    /// # Errors
    ///
    /// Fatal errors only: L2C input without base export, unresolvable bounds, a
    /// degenerate frame or area of interest, or an output directory that cannot
    /// be created. Per-band and per-product failures are recorded in
    /// [`RunReport::skipped`].
    pub fn run(
        &self,
        source: &dyn BandSource,
        sink: &dyn RasterSink,
        packager: Option<&dyn ArchivePackager>,
    ) -> Result<RunReport> {
        let cfg = &self.config;
        let mut report = RunReport {
            source: source.source_name(),
            ..RunReport::default()
        };

        report.level = ProductLevel::from_filename(&report.source);
        let derive = match report.level {
            Some(level) if !level.supports_products() => {
                if !cfg.base_bands {
                    level.ensure_supported()?;
                }
                info!(%level, "base export only; derived products are skipped");
                for kind in &cfg.products {
                    report.skip(
                        kind.as_str(),
                        format!("derived products need L1B or L1C input, got {level}"),
                    );
                }
                false
            }
            _ => true,
        };
        let base_names = if cfg.base_bands {
            cfg.base_datasets_for(report.level)
        } else {
            Vec::new()
        };

        let mut bands = self.load_bands(source, derive, &base_names, &mut report);

        let bounds = match cfg.bounds {
            Some(b) => b,
            None => source.bounds_from_attributes()?,
        };
        let frame = GeoFrame::new(bounds, cfg.projection.clone()).map_err(|e| {
            error!(error = %e, "cannot build the geospatial frame; aborting run");
            e
        })?;

        if let Some(aoi) = &cfg.aoi {
            for band in bands.iter_mut() {
                let keep = frame.aoi_mask(aoi, band.dim())?;
                band.restrict(&keep)?;
            }
            info!(?aoi, "restricted bands to the area of interest");
        }

        fs::create_dir_all(&cfg.output_dir)?;
        let stem = file_stem(&report.source);

        if derive {
            let outcome = self
                .registry
                .compute_all(&cfg.products, &bands, &cfg.bands, &frame);
            for failure in &outcome.failures {
                report.skip(failure.kind.as_str(), &failure.error);
            }

            for product in &outcome.products {
                match self.export_product(product, &bands, &frame, sink, &stem) {
                    Ok((files, stats)) => {
                        report.outputs.extend(files);
                        report.stats.push(stats);
                    }
                    Err(e) => {
                        warn!(product = product.name(), error = %e, "skipping product");
                        report.skip(product.name(), e);
                    }
                }
            }
        }

        let mut base_names = base_names;
        base_names.sort_unstable();
        base_names.dedup();
        for name in &base_names {
            let Some(band) = bands.get(name) else { continue };
            let path = cfg
                .output_dir
                .join(format!("{stem}_{name}.{}", sink.extension()));
            let mut values = band.values().clone();
            Zip::from(&mut values).and(band.mask()).for_each(|v, &ok| {
                if !ok {
                    *v = cfg.nodata;
                }
            });
            let raster = Raster {
                name,
                data: RasterData::Single(values.view()),
                dtype: OutputDtype::Float32,
                nodata: Some(cfg.nodata),
                transform: frame.transform_for(band.dim()),
                crs: frame.projection(),
                tags: band_tags(band),
            };
            match sink.write_raster(&path, &raster) {
                Ok(()) => report.outputs.push(path),
                Err(e) => {
                    warn!(band = %name, error = %e, "skipping base band export");
                    discard(&path);
                    report.skip(name.as_str(), e);
                }
            }
        }

        if let Some(packager) = packager {
            if report.outputs.is_empty() {
                warn!("nothing to package");
            } else {
                let name = cfg
                    .archive_name
                    .clone()
                    .unwrap_or_else(|| format!("{stem}_products"));
                report.archive = Some(packager.package(&name, &report.outputs)?);
            }
        }

        info!(
            source = %report.source,
            outputs = report.outputs.len(),
            skipped = report.skipped.len(),
            "run complete"
        );
        Ok(report)
    }

    /// Load and calibrate every band the run needs; failures are recorded and
    /// only affect the products depending on them. Only base dataset failures
    /// are reported as skipped.
    fn load_bands(
        &self,
        source: &dyn BandSource,
        derive: bool,
        base_names: &[String],
        report: &mut RunReport,
    ) -> BandSet {
        let cfg = &self.config;
        let mut wanted = if derive {
            cfg.bands.bands_for(&cfg.products)
        } else {
            Vec::new()
        };
        for name in base_names {
            if !wanted.contains(name) {
                wanted.push(name.clone());
            }
        }

        let mut set = BandSet::new();
        for name in wanted {
            match source
                .load_band(&name, &cfg.attributes)
                .and_then(|raw| calibrate_band(&raw))
            {
                Ok(band) => set.insert(band),
                Err(e) => {
                    warn!(band = %name, error = %e, "band unavailable");
                    if base_names.contains(&name) {
                        report.skip(name, e);
                    }
                }
            }
        }
        info!(bands = set.len(), "calibrated bands");
        set
    }

    /// Summarize, normalize and write one product. Returns the written files;
    /// on failure none of its files are left behind.
    fn export_product(
        &self,
        product: &DerivedProduct,
        bands: &BandSet,
        frame: &GeoFrame,
        sink: &dyn RasterSink,
        stem: &str,
    ) -> Result<(Vec<PathBuf>, ProductStats)> {
        let cfg = &self.config;
        let schemes = ClassificationScheme::defaults_for(product.kind());

        let (stats, normalized) = rayon::join(
            || summarize(product, &schemes),
            || cfg.normalized.then(|| normalize(product, None)).transpose(),
        );
        let mut stats = stats?;
        let normalized = normalized?;

        if product.kind() == ProductKind::FireMask {
            if let Some(temperature) = bands.get(&cfg.bands.tir1) {
                stats = stats.with_fire(fire_summary(product, temperature)?);
            }
        }

        let mut files = Vec::new();
        match self.write_product(product, &stats, normalized, frame, sink, stem, &mut files) {
            Ok(()) => Ok((files, stats)),
            Err(e) => {
                files.iter().for_each(|p| discard(p));
                Err(e)
            }
        }
    }

    /// Write the product files, recording each path before it is written so a
    /// partial write can be removed.
    #[allow(clippy::too_many_arguments)]
    fn write_product(
        &self,
        product: &DerivedProduct,
        stats: &ProductStats,
        normalized: Option<NormalizedArray>,
        frame: &GeoFrame,
        sink: &dyn RasterSink,
        stem: &str,
        files: &mut Vec<PathBuf>,
    ) -> Result<()> {
        let cfg = &self.config;
        let name = product.name();
        let ext = sink.extension();

        let path = cfg.output_dir.join(format!("{stem}_{name}.{ext}"));
        files.push(path.clone());
        let raster = Raster {
            name,
            data: RasterData::Single(product.values().view()),
            dtype: product.spec().dtype,
            nodata: Some(product.nodata()),
            transform: *product.transform(),
            crs: frame.projection(),
            tags: product_tags(product, Some(stats)),
        };
        sink.write_raster(&path, &raster)?;

        if let Some(normalized) = normalized {
            let stack = normalized.to_stack();
            let mut tags = product_tags(product, None);
            let (lo, hi) = normalized.domain();
            tags.insert("NORMALIZATION_DOMAIN".into(), format!("{lo},{hi}"));
            tags.insert("BAND_2".into(), "alpha".into());
            let path = cfg.output_dir.join(format!("{stem}_{name}_normalized.{ext}"));
            files.push(path.clone());
            let raster = Raster {
                name,
                data: RasterData::Stack(stack.view()),
                dtype: OutputDtype::Float32,
                nodata: Some(product.nodata()),
                transform: *product.transform(),
                crs: frame.projection(),
                tags,
            };
            sink.write_raster(&path, &raster)?;
        }

        let path = cfg.output_dir.join(format!("{stem}_{name}_stats.json"));
        files.push(path.clone());
        write_stats_json(&path, &stats.to_record())?;
        Ok(())
    }
}

/// Remove a partially written output.
fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "cannot remove partial output"),
    }
}

fn file_stem(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .map_or_else(|| source.to_string(), |s| s.to_string_lossy().into_owned())
}
