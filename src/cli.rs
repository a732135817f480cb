//! Defines command-line interface options using `clap` for the satbands binary.

use clap::Parser;
use satbands::config::{PipelineConfig, RasterFormat};
use satbands::errors::{Result, SatBandsError};
use satbands::geoframe::GeoBounds;
use satbands::products::ProductKind;
use std::path::PathBuf;

/// Calibrate satellite bands and derive georeferenced products
#[derive(Parser, Debug)]
#[command(
    version,
    name = "satbands",
    about = "Calibrate HDF5/NetCDF satellite bands and derive georeferenced geophysical products"
)]
pub struct Args {
    /// Path to the source HDF5/NetCDF container
    #[arg(short, long)]
    pub file: PathBuf,

    /// JSON configuration file; CLI flags override its values
    #[arg(short, long, env = "SATBANDS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Comma-separated products to generate, e.g. "ndsi,aod,fire"
    #[arg(short, long, value_parser = parse_product, value_delimiter = ',')]
    pub products: Option<Vec<ProductKind>>,

    /// Directory receiving rasters, statistics and the archive
    #[arg(short, long, env = "SATBANDS_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Also export the calibrated base bands
    #[arg(long)]
    pub base_bands: bool,

    /// Comma-separated datasets exported by --base-bands, e.g. "DHI,GHI"
    #[arg(long, value_delimiter = ',')]
    pub base_datasets: Option<Vec<String>>,

    /// Area of interest as "west,south,east,north" in degrees
    #[arg(long, value_parser = parse_aoi, allow_hyphen_values = true)]
    pub aoi: Option<GeoBounds>,

    /// Raster format: geotiff or netcdf
    #[arg(long, value_parser = parse_format)]
    pub format: Option<RasterFormat>,

    /// Name of the output archive
    #[arg(long)]
    pub archive_name: Option<String>,

    /// Skip packaging the outputs
    #[arg(long)]
    pub no_archive: bool,

    /// List all bands in the container
    #[arg(long)]
    pub list_bands: bool,

    /// Describe a specific band (data type, shape, and attributes)
    #[arg(long)]
    pub describe: Option<String>,

    /// Export container metadata as JSON to this path
    #[arg(long)]
    pub metadata_json: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    /// Whether the invocation only inspects the container
    pub fn inspect_only(&self) -> bool {
        self.list_bands || self.describe.is_some() || self.metadata_json.is_some()
    }

    /// Load the configuration file (or defaults) and apply CLI overrides.
    pub fn resolve_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(products) = &self.products {
            config.products.clone_from(products);
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        if self.base_bands {
            config.base_bands = true;
        }
        if self.base_datasets.is_some() {
            config.base_datasets.clone_from(&self.base_datasets);
        }
        if self.aoi.is_some() {
            config.aoi = self.aoi;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if self.archive_name.is_some() {
            config.archive_name.clone_from(&self.archive_name);
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_product(s: &str) -> std::result::Result<ProductKind, String> {
    s.parse::<ProductKind>().map_err(|e| e.to_string())
}

fn parse_format(s: &str) -> std::result::Result<RasterFormat, String> {
    s.parse::<RasterFormat>().map_err(|e| e.to_string())
}

fn parse_aoi(s: &str) -> std::result::Result<GeoBounds, String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("area of interest: {e}"))?;
    match values[..] {
        [west, south, east, north] => Ok(GeoBounds::new(west, south, east, north)),
        _ => Err(SatBandsError::invalid_config(format!(
            "area of interest needs 4 values, got {}",
            values.len()
        ))
        .to_string()),
    }
}
