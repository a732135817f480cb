//! Pipeline configuration
//!
//! Everything the source tooling hard-coded (projection, bounds, band names,
//! attribute keys, empirical constants, output locations) is an explicit value
//! here. A config is loaded from JSON, overridden by CLI flags and validated once
//! before a run.

use crate::errors::{Result, SatBandsError};
use crate::geoframe::GeoBounds;
use crate::metadata::ProductLevel;
use crate::products::registry::DEFAULT_NODATA;
use crate::products::{BandRole, FormulaParams, ProductKind};
use crate::projection::ProjectionDef;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Container band name for each spectral role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandMap {
    pub vis: String,
    pub swir: String,
    pub mir: String,
    pub tir1: String,
    pub tir2: String,
    pub wv: String,
    pub nir: Option<String>,
    pub red: Option<String>,
}

impl Default for BandMap {
    fn default() -> Self {
        Self {
            vis: "IMG_VIS".to_string(),
            swir: "IMG_SWIR".to_string(),
            mir: "IMG_MIR".to_string(),
            tir1: "IMG_TIR1".to_string(),
            tir2: "IMG_TIR2".to_string(),
            wv: "IMG_WV".to_string(),
            nir: None,
            red: None,
        }
    }
}

impl BandMap {
    /// Band name mapped to `role`, or `None` if the role is unmapped
    pub fn band_for(&self, role: BandRole) -> Option<&str> {
        match role {
            BandRole::Vis => Some(&self.vis),
            BandRole::Swir => Some(&self.swir),
            BandRole::Mir => Some(&self.mir),
            BandRole::Tir1 => Some(&self.tir1),
            BandRole::Tir2 => Some(&self.tir2),
            BandRole::Wv => Some(&self.wv),
            BandRole::Nir => self.nir.as_deref(),
            BandRole::Red => self.red.as_deref(),
        }
    }

    /// Distinct band names needed by `kinds`, in first-use order
    pub fn bands_for(&self, kinds: &[ProductKind]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for role in kinds.iter().flat_map(|k| k.input_roles()) {
            if let Some(name) = self.band_for(*role) {
                if !out.iter().any(|n| n == name) {
                    out.push(name.to_string());
                }
            }
        }
        out
    }

    /// All mapped band names
    pub fn all_bands(&self) -> Vec<String> {
        let roles = [
            BandRole::Vis,
            BandRole::Swir,
            BandRole::Mir,
            BandRole::Tir1,
            BandRole::Tir2,
            BandRole::Wv,
            BandRole::Nir,
            BandRole::Red,
        ];
        roles
            .iter()
            .filter_map(|r| self.band_for(*r).map(str::to_string))
            .collect()
    }
}

/// Ordered attribute key candidates. `{band}` is replaced by the band name and
/// the first key present on the band wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeKeys {
    pub scale_factor: Vec<String>,
    pub add_offset: Vec<String>,
    pub fill_value: Vec<String>,
    pub units: Vec<String>,
    pub long_name: Vec<String>,
    pub wavelength: Vec<String>,
}

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

impl Default for AttributeKeys {
    fn default() -> Self {
        Self {
            scale_factor: keys(&[
                "{band}_lab_radiance_scale_factor",
                "lab_radiance_scale_factor",
                "scale_factor",
            ]),
            add_offset: keys(&[
                "{band}_lab_radiance_add_offset",
                "lab_radiance_add_offset",
                "add_offset",
            ]),
            fill_value: keys(&["_FillValue", "{band}__FillValue", "missing_value"]),
            units: keys(&["{band}_RADIANCE_units", "{band}_units", "units"]),
            long_name: keys(&["{band}_long_name", "long_name"]),
            wavelength: keys(&["{band}_central_wavelength", "central_wavelength"]),
        }
    }
}

impl AttributeKeys {
    /// Expand the `{band}` placeholder of `candidates` for `band`
    pub fn expand(candidates: &[String], band: &str) -> Vec<String> {
        candidates.iter().map(|k| k.replace("{band}", band)).collect()
    }
}

/// Root attribute names holding the geographic bounds
pub const BOUNDS_ATTRIBUTES: [&str; 4] = [
    "left_longitude",
    "lower_latitude",
    "right_longitude",
    "upper_latitude",
];

/// Radiation datasets of L2C containers, exported as base datasets
pub const L2C_RADIATION_DATASETS: [&str; 4] = ["DHI", "DNI", "GHI", "INS"];

/// Raster encoding of written products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    #[default]
    GeoTiff,
    NetCdf,
}

impl std::str::FromStr for RasterFormat {
    type Err = SatBandsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "geotiff" | "tiff" | "tif" => Ok(Self::GeoTiff),
            "netcdf" | "nc" => Ok(Self::NetCdf),
            other => Err(SatBandsError::invalid_config(format!(
                "unknown raster format '{other}'"
            ))),
        }
    }
}

/// Full configuration of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub projection: ProjectionDef,
    /// Fixed bounds; `None` reads them from the container root attributes
    pub bounds: Option<GeoBounds>,
    pub bands: BandMap,
    pub attributes: AttributeKeys,
    pub formulas: FormulaParams,
    pub products: Vec<ProductKind>,
    /// Also export the calibrated input bands
    pub base_bands: bool,
    /// Datasets exported by `base_bands`; `None` picks the mapped bands, or the
    /// radiation datasets for L2C input
    pub base_datasets: Option<Vec<String>>,
    /// Lon/lat rectangle; cells outside it are invalid in every band and product
    pub aoi: Option<GeoBounds>,
    pub format: RasterFormat,
    /// Also export a normalized raster with an alpha band per product
    pub normalized: bool,
    pub output_dir: PathBuf,
    pub nodata: f64,
    pub archive_name: Option<String>,
    pub threads: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            projection: ProjectionDef::default(),
            bounds: None,
            bands: BandMap::default(),
            attributes: AttributeKeys::default(),
            formulas: FormulaParams::default(),
            products: ProductKind::ALL.to_vec(),
            base_bands: false,
            base_datasets: None,
            aoi: None,
            format: RasterFormat::default(),
            normalized: true,
            output_dir: PathBuf::from("output"),
            nodata: DEFAULT_NODATA,
            archive_name: None,
            threads: None,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; absent fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened and
    /// [`SatBandsError::Json`] if it is not a valid configuration.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Datasets exported as base bands for input of `level`
    pub fn base_datasets_for(&self, level: Option<ProductLevel>) -> Vec<String> {
        match (&self.base_datasets, level) {
            (Some(list), _) => list.clone(),
            (None, Some(ProductLevel::L2C)) => {
                L2C_RADIATION_DATASETS.iter().map(|s| s.to_string()).collect()
            }
            (None, _) => self.bands.all_bands(),
        }
    }

    /// Parse a comma-separated product list such as `"ndvi,aod,fire"`.
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::InvalidConfig`] for an unknown product.
    pub fn parse_products(list: &str) -> Result<Vec<ProductKind>> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<ProductKind>())
            .collect()
    }

    /// Check invariants the formulas and run depend on.
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::InvalidConfig`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        let f = &self.formulas;
        if !(f.aod_epsilon.is_finite() && f.aod_epsilon > 0.0) {
            return Err(SatBandsError::invalid_config("aod_epsilon must be > 0"));
        }
        if !f.wv_norm_factor.is_finite() || f.wv_norm_factor == 0.0 {
            return Err(SatBandsError::invalid_config("wv_norm_factor must be non-zero"));
        }
        if !f.olr_k.is_finite() || !f.fire_threshold_k.is_finite() {
            return Err(SatBandsError::invalid_config(
                "olr_k and fire_threshold_k must be finite",
            ));
        }
        if self.products.is_empty() && !self.base_bands {
            return Err(SatBandsError::invalid_config("no products selected"));
        }
        if self.threads == Some(0) {
            return Err(SatBandsError::invalid_config("threads must be > 0"));
        }
        if !self.nodata.is_finite() {
            return Err(SatBandsError::invalid_config("nodata must be finite"));
        }
        if let Some(b) = &self.bounds {
            if b.east <= b.west || b.north <= b.south {
                return Err(SatBandsError::invalid_config(format!(
                    "bounds must satisfy west < east and south < north, got {b:?}"
                )));
            }
        }
        if let Some(a) = &self.aoi {
            if a.east <= a.west || a.north <= a.south || a.south < -90.0 || a.north > 90.0 {
                return Err(SatBandsError::invalid_config(format!(
                    "area of interest must satisfy west < east and -90 <= south < north <= 90, got {a:?}"
                )));
            }
        }
        if matches!(&self.base_datasets, Some(list) if list.is_empty()) {
            return Err(SatBandsError::invalid_config("base_datasets is empty"));
        }
        if let ProjectionDef::Mercator { a, b, .. } = self.projection {
            if !(a > 0.0 && b > 0.0 && b <= a) {
                return Err(SatBandsError::invalid_config(
                    "mercator axes must satisfy 0 < b <= a",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn unmapped_role_has_no_band() {
        let map = BandMap::default();
        assert_eq!(map.band_for(BandRole::Tir2), Some("IMG_TIR2"));
        assert_eq!(map.band_for(BandRole::Nir), None);
    }

    #[test]
    fn bands_for_is_deduplicated() {
        let map = BandMap::default();
        let bands = map.bands_for(&[ProductKind::Lst, ProductKind::Olr, ProductKind::FireMask]);
        assert_eq!(bands, vec!["IMG_TIR1".to_string(), "IMG_TIR2".to_string()]);
    }

    #[test]
    fn rejects_non_positive_epsilon() {
        let mut cfg = PipelineConfig::default();
        cfg.formulas.aod_epsilon = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_product_list_with_aliases() {
        let kinds = PipelineConfig::parse_products("ndvi, aod,fire,wv").unwrap();
        assert_eq!(
            kinds,
            vec![
                ProductKind::Ndvi,
                ProductKind::Aod,
                ProductKind::FireMask,
                ProductKind::WaterVaporContent
            ]
        );
        assert!(PipelineConfig::parse_products("ndvi,bogus").is_err());
    }

    #[test]
    fn partial_json_takes_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{"products": ["aod"], "formulas": {"aod_epsilon": 0.2}}"#)
                .unwrap();
        assert_eq!(cfg.products, vec![ProductKind::Aod]);
        assert_eq!(cfg.formulas.aod_epsilon, 0.2);
        assert_eq!(cfg.formulas.olr_k, 1.1);
        assert_eq!(cfg.bands.tir1, "IMG_TIR1");
    }

    #[test]
    fn base_datasets_follow_level() {
        let cfg = PipelineConfig::default();
        assert_eq!(
            cfg.base_datasets_for(Some(ProductLevel::L2C)),
            vec!["DHI", "DNI", "GHI", "INS"]
        );
        assert_eq!(cfg.base_datasets_for(Some(ProductLevel::L1C)).len(), 6);

        let cfg = PipelineConfig {
            base_datasets: Some(vec!["GHI".into()]),
            ..PipelineConfig::default()
        };
        assert_eq!(cfg.base_datasets_for(Some(ProductLevel::L2C)), vec!["GHI"]);
    }

    #[test]
    fn rejects_inverted_aoi() {
        let cfg = PipelineConfig {
            aoi: Some(GeoBounds::new(80.0, 20.0, 70.0, 30.0)),
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn raster_format_names() {
        assert_eq!("tif".parse::<RasterFormat>().unwrap(), RasterFormat::GeoTiff);
        assert_eq!("NetCDF".parse::<RasterFormat>().unwrap(), RasterFormat::NetCdf);
        assert!("png".parse::<RasterFormat>().is_err());
    }

    #[test]
    fn placeholder_expansion() {
        let keys = AttributeKeys::default();
        let expanded = AttributeKeys::expand(&keys.scale_factor, "IMG_VIS");
        assert_eq!(expanded[0], "IMG_VIS_lab_radiance_scale_factor");
        assert_eq!(expanded[1], "lab_radiance_scale_factor");
    }
}
