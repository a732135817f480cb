//! NetCDF/HDF5 container I/O
//!
//! [`NetCdfBandSource`] reads bands and attributes from a NetCDF-4 (HDF5) file.
//! [`NetCdfRasterWriter`] persists rasters as NetCDF files carrying the GDAL
//! conventions: a `crs` grid-mapping variable with `spatial_ref` and
//! `GeoTransform`, `x`/`y` cell-centre coordinates, `_FillValue`, and the tag
//! map as global attributes.

use crate::band::RawDtype;
use crate::data_source::{Attributes, BandMetadata, BandSource};
use crate::errors::{Result, SatBandsError};
use crate::output::{Raster, RasterData, RasterSink};
use crate::products::OutputDtype;
use crate::projection::{ProjectionDef, Projector};
use chrono::Utc;
use ndarray::{ArrayD, IxDyn};
use netcdf::{AttributeValue, File};
use serde_json::{Number, Value as JsonValue};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

fn json_number(v: f64) -> JsonValue {
    Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number)
}

fn json_numbers<T: Copy + Into<f64>>(values: &[T]) -> JsonValue {
    JsonValue::Array(values.iter().map(|&v| json_number(v.into())).collect())
}

/// Convert a NetCDF attribute value into its JSON representation.
pub fn attribute_to_json(value: AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Str(s) => JsonValue::String(s),
        AttributeValue::Strs(ss) => JsonValue::Array(ss.into_iter().map(JsonValue::String).collect()),
        AttributeValue::Float(f) => json_number(f64::from(f)),
        AttributeValue::Floats(fs) => json_numbers(&fs),
        AttributeValue::Double(d) => json_number(d),
        AttributeValue::Doubles(ds) => json_numbers(&ds),
        AttributeValue::Int(i) => JsonValue::from(i),
        AttributeValue::Ints(is) => json_numbers(&is),
        AttributeValue::Short(s) => JsonValue::from(s),
        AttributeValue::Shorts(ss) => json_numbers(&ss),
        AttributeValue::Uchar(u) => JsonValue::from(u),
        AttributeValue::Uchars(us) => json_numbers(&us),
        AttributeValue::Ushort(u) => JsonValue::from(u),
        AttributeValue::Ushorts(us) => json_numbers(&us),
        AttributeValue::Uint(u) => JsonValue::from(u),
        AttributeValue::Uints(us) => json_numbers(&us),
        other => JsonValue::String(format!("{other:?}")),
    }
}

/// Map the debug description of a NetCDF variable type to a [`RawDtype`].
///
/// Unknown types are read as `f64`.
pub fn dtype_from_description(description: &str) -> RawDtype {
    let d = description.to_lowercase();
    let sized = [
        ("u8", RawDtype::U8),
        ("i8", RawDtype::I8),
        ("u16", RawDtype::U16),
        ("i16", RawDtype::I16),
        ("u32", RawDtype::U32),
        ("i32", RawDtype::I32),
        ("f32", RawDtype::F32),
        ("f64", RawDtype::F64),
    ];
    if let Some((_, dtype)) = sized.iter().find(|(tag, _)| d.contains(tag)) {
        return *dtype;
    }
    // C type names; unsigned first since "uint" contains "int".
    let named = [
        ("ubyte", RawDtype::U8),
        ("uchar", RawDtype::U8),
        ("ushort", RawDtype::U16),
        ("uint", RawDtype::U32),
        ("double", RawDtype::F64),
        ("float", RawDtype::F32),
        ("short", RawDtype::I16),
        ("int", RawDtype::I32),
        ("byte", RawDtype::I8),
        ("char", RawDtype::I8),
    ];
    named
        .iter()
        .find(|(tag, _)| d.contains(tag))
        .map_or(RawDtype::F64, |(_, dtype)| *dtype)
}

/// [`BandSource`] over a NetCDF-4 / HDF5 file
pub struct NetCdfBandSource {
    path: PathBuf,
    file: File,
}

impl NetCdfBandSource {
    /// Open `path` read-only.
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::NetCDF`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = netcdf::open(&path)?;
        debug!(path = %path.display(), "opened container");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn variable(&self, name: &str) -> Result<netcdf::Variable<'_>> {
        self.file
            .variable(name)
            .ok_or_else(|| SatBandsError::missing_band(name))
    }
}

impl BandSource for NetCdfBandSource {
    fn source_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }

    fn list_bands(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.file.variables().map(|v| v.name()).collect();
        names.sort();
        Ok(names)
    }

    fn band_metadata(&self, name: &str) -> Result<BandMetadata> {
        let var = self.variable(name)?;
        let mut attributes = Attributes::new();
        for attr in var.attributes() {
            match attr.value() {
                Ok(value) => {
                    attributes.insert(attr.name().to_string(), attribute_to_json(value));
                }
                Err(e) => warn!(band = name, attribute = attr.name(), error = %e, "unreadable attribute"),
            }
        }
        Ok(BandMetadata {
            name: name.to_string(),
            shape: var.dimensions().iter().map(|d| d.len()).collect(),
            dtype: dtype_from_description(&format!("{:?}", var.vartype())),
            dimensions: var.dimensions().iter().map(|d| d.name().to_string()).collect(),
            attributes,
        })
    }

    fn read_raw(&self, name: &str) -> Result<ArrayD<f64>> {
        let var = self.variable(name)?;
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let values: Vec<f64> = var.get_values::<f64, _>(..)?;
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
    }

    fn root_attributes(&self) -> Result<Attributes> {
        let mut out = Attributes::new();
        for attr in self.file.attributes() {
            out.insert(attr.name().to_string(), attribute_to_json(attr.value()?));
        }
        Ok(out)
    }
}

/// [`RasterSink`] writing GDAL-readable NetCDF files
#[derive(Debug, Clone)]
pub struct NetCdfRasterWriter {
    producer: String,
}

impl Default for NetCdfRasterWriter {
    fn default() -> Self {
        Self::new(concat!("satbands ", env!("CARGO_PKG_VERSION")))
    }
}

impl NetCdfRasterWriter {
    /// `producer` is recorded in the `history` attribute.
    pub fn new(producer: impl Into<String>) -> Self {
        Self {
            producer: producer.into(),
        }
    }
}

fn coordinate_units(crs: &ProjectionDef) -> (&'static str, &'static str, &'static str) {
    match crs {
        ProjectionDef::Geographic => ("degrees_east", "degrees_north", "longitude"),
        _ => ("m", "m", "projection_x_coordinate"),
    }
}

impl RasterSink for NetCdfRasterWriter {
    fn extension(&self) -> &'static str {
        "nc"
    }

    fn write_raster(&self, path: &Path, raster: &Raster<'_>) -> Result<()> {
        if path.exists() {
            fs::remove_file(path)?;
        }
        let mut file = netcdf::create(path)?;

        let (bands, rows, cols) = raster.data.dim();
        let stacked = matches!(raster.data, RasterData::Stack(_));
        if stacked {
            file.add_dimension("band", bands)?;
        }
        file.add_dimension("y", rows)?;
        file.add_dimension("x", cols)?;

        let t = raster.transform;
        let xs: Vec<f64> = (0..cols).map(|c| t.c + t.a * (c as f64 + 0.5)).collect();
        let ys: Vec<f64> = (0..rows).map(|r| t.f + t.e * (r as f64 + 0.5)).collect();
        let (x_units, y_units, x_name) = coordinate_units(raster.crs);
        {
            let mut x = file.add_variable::<f64>("x", &["x"])?;
            x.put_attribute("standard_name", x_name.to_string())?;
            x.put_attribute("units", x_units.to_string())?;
            x.put_values(&xs, ..)?;
        }
        {
            let y_name = if x_name == "longitude" {
                "latitude"
            } else {
                "projection_y_coordinate"
            };
            let mut y = file.add_variable::<f64>("y", &["y"])?;
            y.put_attribute("standard_name", y_name.to_string())?;
            y.put_attribute("units", y_units.to_string())?;
            y.put_values(&ys, ..)?;
        }
        {
            let proj = raster.crs.proj_string();
            let geotransform = t
                .to_gdal()
                .iter()
                .map(|v| format!("{v:.10}"))
                .collect::<Vec<_>>()
                .join(" ");
            let mut crs = file.add_variable::<i32>("crs", &[])?;
            crs.put_attribute("spatial_ref", proj.clone())?;
            crs.put_attribute("proj4", proj)?;
            crs.put_attribute("crs_label", raster.crs.crs_label())?;
            crs.put_attribute("GeoTransform", geotransform)?;
        }

        let dims: Vec<&str> = if stacked {
            vec!["band", "y", "x"]
        } else {
            vec!["y", "x"]
        };
        let samples: Vec<f64> = match raster.data {
            RasterData::Single(a) => a.iter().copied().collect(),
            RasterData::Stack(a) => a.iter().copied().collect(),
        };

        match raster.dtype {
            OutputDtype::Float32 => {
                #[allow(clippy::cast_possible_truncation)]
                let data: Vec<f32> = samples.iter().map(|&v| v as f32).collect();
                let mut var = file.add_variable::<f32>(raster.name, &dims)?;
                if let Some(nodata) = raster.nodata {
                    #[allow(clippy::cast_possible_truncation)]
                    let fill = nodata as f32;
                    var.put_attribute("_FillValue", fill)?;
                }
                var.put_attribute("grid_mapping", "crs".to_string())?;
                var.put_values(&data, ..)?;
            }
            OutputDtype::UInt8 => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let data: Vec<u8> = samples
                    .iter()
                    .map(|&v| v.round().clamp(0.0, 255.0) as u8)
                    .collect();
                let mut var = file.add_variable::<u8>(raster.name, &dims)?;
                if let Some(nodata) = raster.nodata {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let fill = nodata.clamp(0.0, 255.0) as u8;
                    var.put_attribute("_FillValue", fill)?;
                }
                var.put_attribute("grid_mapping", "crs".to_string())?;
                var.put_values(&data, ..)?;
            }
        }

        for (key, value) in &raster.tags {
            file.add_attribute(key, value.clone())?;
        }
        file.add_attribute("Conventions", "CF-1.8".to_string())?;
        file.add_attribute(
            "history",
            format!("Created by {} on {}", self.producer, Utc::now().to_rfc3339()),
        )?;

        debug!(
            path = %path.display(),
            raster = raster.name,
            bands,
            rows,
            cols,
            "wrote raster"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtype_descriptions() {
        assert_eq!(dtype_from_description("Int(U16)"), RawDtype::U16);
        assert_eq!(dtype_from_description("Float(F32)"), RawDtype::F32);
        assert_eq!(dtype_from_description("ushort"), RawDtype::U16);
        assert_eq!(dtype_from_description("uint"), RawDtype::U32);
        assert_eq!(dtype_from_description("int"), RawDtype::I32);
        assert_eq!(dtype_from_description("double"), RawDtype::F64);
        assert_eq!(dtype_from_description("compound"), RawDtype::F64);
    }

    #[test]
    fn attribute_conversion() {
        assert_eq!(
            attribute_to_json(AttributeValue::Str("K".into())),
            JsonValue::String("K".into())
        );
        assert_eq!(attribute_to_json(AttributeValue::Double(0.5)), json_number(0.5));
        assert_eq!(
            attribute_to_json(AttributeValue::Floats(vec![0.25, 1.0])),
            JsonValue::Array(vec![json_number(0.25), json_number(1.0)])
        );
    }
}
