//! Data source abstraction over hierarchical band containers
//!
//! A [`BandSource`] exposes named raw grids plus per-band and root attributes.
//! Attribute values are carried as JSON so every container backend shares one
//! representation. Loading a band resolves its calibration attributes through
//! the ordered key candidates of [`AttributeKeys`]; an absent key means the
//! default, never an error.

use crate::band::{CalibrationParams, NumericBand, RawDtype};
use crate::config::{AttributeKeys, BOUNDS_ATTRIBUTES};
use crate::errors::{Result, SatBandsError};
use crate::geoframe::GeoBounds;
use ndarray::ArrayD;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tracing::debug;

/// Attribute map of a band or of the container root
pub type Attributes = BTreeMap<String, JsonValue>;

/// Metadata for one band
#[derive(Debug, Clone)]
pub struct BandMetadata {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: RawDtype,
    pub dimensions: Vec<String>,
    pub attributes: Attributes,
}

/// Read access to a container of named bands
pub trait BandSource {
    /// Human-readable identifier of the source, usually the file name
    fn source_name(&self) -> String;

    /// List all bands in the source
    fn list_bands(&self) -> Result<Vec<String>>;

    /// Metadata of one band
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::MissingBand`] if the band does not exist.
    fn band_metadata(&self, name: &str) -> Result<BandMetadata>;

    /// Raw samples of one band, widened to `f64`
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::MissingBand`] if the band does not exist.
    fn read_raw(&self, name: &str) -> Result<ArrayD<f64>>;

    /// Attributes attached to the container root
    fn root_attributes(&self) -> Result<Attributes>;

    /// Read a band together with its calibration attributes.
    ///
    /// Band attributes are searched first, then root attributes, for each key
    /// candidate in order.
    fn load_band(&self, name: &str, keys: &AttributeKeys) -> Result<NumericBand> {
        let meta = self.band_metadata(name)?;
        let root = self.root_attributes()?;
        let lookup =
            |candidates: &[String]| lookup_attribute(&meta.attributes, &root, candidates, name);

        let calibration = CalibrationParams {
            scale_factor: lookup(&keys.scale_factor)
                .and_then(json_as_f64)
                .unwrap_or(1.0),
            add_offset: lookup(&keys.add_offset).and_then(json_as_f64).unwrap_or(0.0),
            fill_value: lookup(&keys.fill_value).and_then(json_as_f64),
        };

        let data = self.read_raw(name)?;
        let mut band = NumericBand::new(name, meta.dtype, data).with_calibration(calibration);
        if let Some(units) = lookup(&keys.units).and_then(json_as_string) {
            band = band.with_units(units);
        }
        if let Some(long_name) = lookup(&keys.long_name).and_then(json_as_string) {
            band = band.with_long_name(long_name);
        }
        if let Some(wavelength) = lookup(&keys.wavelength).and_then(json_as_string) {
            band = band.with_wavelength(wavelength);
        }

        debug!(
            band = name,
            dtype = %meta.dtype,
            scale = calibration.scale_factor,
            offset = calibration.add_offset,
            fill = ?calibration.fill_value,
            "loaded band"
        );
        Ok(band)
    }

    /// Geographic bounds from the root attributes
    /// `left_longitude`, `lower_latitude`, `right_longitude`, `upper_latitude`.
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::InvalidConfig`] if any of them is absent or not numeric.
    fn bounds_from_attributes(&self) -> Result<GeoBounds> {
        let root = self.root_attributes()?;
        let mut v = [0.0_f64; 4];
        for (slot, key) in v.iter_mut().zip(BOUNDS_ATTRIBUTES) {
            *slot = root.get(key).and_then(json_as_f64).ok_or_else(|| {
                SatBandsError::invalid_config(format!(
                    "root attribute '{key}' missing; configure bounds explicitly"
                ))
            })?;
        }
        Ok(GeoBounds::new(v[0], v[1], v[2], v[3]))
    }
}

/// First candidate key present on the band, falling back to the root.
fn lookup_attribute<'a>(
    band: &'a Attributes,
    root: &'a Attributes,
    candidates: &[String],
    band_name: &str,
) -> Option<&'a JsonValue> {
    AttributeKeys::expand(candidates, band_name)
        .iter()
        .find_map(|k| band.get(k).or_else(|| root.get(k)))
}

/// Numeric attribute value; single-element arrays are unwrapped.
pub fn json_as_f64(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::Array(items) if items.len() == 1 => json_as_f64(&items[0]),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text attribute value; numbers are formatted, single-element arrays unwrapped.
pub fn json_as_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Array(items) if items.len() == 1 => json_as_string(&items[0]),
        _ => None,
    }
}

#[derive(Debug, Clone)]
struct MemoryBand {
    dtype: RawDtype,
    data: ArrayD<f64>,
    attributes: Attributes,
}

/// In-memory [`BandSource`], for tests and for callers that already hold grids
#[derive(Debug, Clone, Default)]
pub struct MemoryBandSource {
    name: String,
    bands: BTreeMap<String, MemoryBand>,
    root: Attributes,
}

impl MemoryBandSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a band; replaces any band of the same name.
    pub fn with_band(
        mut self,
        name: impl Into<String>,
        dtype: RawDtype,
        data: ArrayD<f64>,
        attributes: Attributes,
    ) -> Self {
        self.bands.insert(
            name.into(),
            MemoryBand {
                dtype,
                data,
                attributes,
            },
        );
        self
    }

    pub fn with_root_attribute(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.root.insert(key.into(), value);
        self
    }

    fn band(&self, name: &str) -> Result<&MemoryBand> {
        self.bands
            .get(name)
            .ok_or_else(|| SatBandsError::missing_band(name))
    }
}

impl BandSource for MemoryBandSource {
    fn source_name(&self) -> String {
        self.name.clone()
    }

    fn list_bands(&self) -> Result<Vec<String>> {
        Ok(self.bands.keys().cloned().collect())
    }

    fn band_metadata(&self, name: &str) -> Result<BandMetadata> {
        let band = self.band(name)?;
        Ok(BandMetadata {
            name: name.to_string(),
            shape: band.data.shape().to_vec(),
            dtype: band.dtype,
            dimensions: (0..band.data.ndim()).map(|i| format!("dim_{i}")).collect(),
            attributes: band.attributes.clone(),
        })
    }

    fn read_raw(&self, name: &str) -> Result<ArrayD<f64>> {
        Ok(self.band(name)?.data.clone())
    }

    fn root_attributes(&self) -> Result<Attributes> {
        Ok(self.root.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;
    use serde_json::json;

    fn source() -> MemoryBandSource {
        let mut attrs = Attributes::new();
        attrs.insert("IMG_VIS_lab_radiance_scale_factor".into(), json!([0.5]));
        attrs.insert("_FillValue".into(), json!(1023));
        attrs.insert("IMG_VIS_RADIANCE_units".into(), json!("mW cm-2 sr-1 um-1"));
        MemoryBandSource::new("mem")
            .with_band(
                "IMG_VIS",
                RawDtype::U16,
                ArrayD::from_elem(IxDyn(&[1, 2, 2]), 4.0),
                attrs,
            )
            .with_root_attribute("lab_radiance_add_offset", json!(1.5))
    }

    #[test]
    fn resolves_band_then_root_candidates() {
        let band = source()
            .load_band("IMG_VIS", &AttributeKeys::default())
            .unwrap();
        assert_eq!(band.calibration.scale_factor, 0.5);
        assert_eq!(band.calibration.add_offset, 1.5);
        assert_eq!(band.calibration.fill_value, Some(1023.0));
        assert_eq!(band.units.as_deref(), Some("mW cm-2 sr-1 um-1"));
        assert_eq!(band.dtype, RawDtype::U16);
    }

    #[test]
    fn absent_keys_use_defaults() {
        let src = MemoryBandSource::new("mem").with_band(
            "B",
            RawDtype::F32,
            ArrayD::zeros(IxDyn(&[2, 2])),
            Attributes::new(),
        );
        let band = src.load_band("B", &AttributeKeys::default()).unwrap();
        assert_eq!(band.calibration, CalibrationParams::default());
    }

    #[test]
    fn missing_band_error() {
        let err = source().load_band("IMG_X", &AttributeKeys::default()).unwrap_err();
        assert!(matches!(err, SatBandsError::MissingBand { .. }));
    }

    #[test]
    fn missing_bounds_attribute() {
        assert!(source().bounds_from_attributes().is_err());
    }
}
