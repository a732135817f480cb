//! Container inspection: band listing, band description, metadata export and
//! product level detection.

use crate::data_source::BandSource;
use crate::errors::{Result, SatBandsError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::fmt;

/// Processing level encoded in the source file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductLevel {
    L1B,
    L1C,
    L2C,
}

impl ProductLevel {
    /// Detect the level from a file name such as `3RIMG_..._L1C_ASIA_MER_V01R00.h5`.
    ///
    /// Returns `None` when the name carries no known level token.
    pub fn from_filename(name: &str) -> Option<Self> {
        let upper = name.to_uppercase();
        upper
            .split(|c: char| !c.is_ascii_alphanumeric())
            .find_map(|token| match token {
                "L1B" => Some(Self::L1B),
                "L1C" => Some(Self::L1C),
                "L2C" => Some(Self::L2C),
                _ => None,
            })
    }

    /// Whether derived products can be generated from this level
    pub fn supports_products(self) -> bool {
        !matches!(self, Self::L2C)
    }

    /// Reject levels that cannot feed the product pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::InvalidConfig`] for L2C input.
    pub fn ensure_supported(self) -> Result<Self> {
        if self.supports_products() {
            Ok(self)
        } else {
            Err(SatBandsError::invalid_config(format!(
                "{self} files are already geophysical products; derived product generation needs L1B or L1C input"
            )))
        }
    }
}

impl fmt::Display for ProductLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::L1B => "L1B",
            Self::L1C => "L1C",
            Self::L2C => "L2C",
        };
        f.write_str(s)
    }
}

/// JSON document describing the whole container: `root_attributes`,
/// `datasets` (shape, dimensions, dtype and attributes of each band) and
/// `file_info`.
pub fn extract_metadata(source: &dyn BandSource) -> Result<JsonValue> {
    let root: Map<String, JsonValue> = source.root_attributes()?.into_iter().collect();

    let mut datasets = Map::new();
    for name in source.list_bands()? {
        let meta = source.band_metadata(&name)?;
        let attributes: Map<String, JsonValue> = meta.attributes.into_iter().collect();
        datasets.insert(
            name,
            json!({
                "shape": meta.shape,
                "dimensions": meta.dimensions,
                "dtype": meta.dtype.as_str(),
                "attributes": attributes,
            }),
        );
    }

    let source_name = source.source_name();
    let level = ProductLevel::from_filename(&source_name).map(|l| l.to_string());
    Ok(json!({
        "root_attributes": root,
        "datasets": datasets,
        "file_info": {
            "filename": source_name,
            "product_level": level,
            "extraction_date": Utc::now().to_rfc3339(),
        },
    }))
}

/// Lists all bands in a clean, organized format.
pub fn print_band_listing(source: &dyn BandSource) -> Result<()> {
    println!("\n Bands in {}", source.source_name());
    println!("==============");

    let names = source.list_bands()?;
    if names.is_empty() {
        println!("   (No bands found)");
        return Ok(());
    }

    for name in names {
        let meta = source.band_metadata(&name)?;
        let shape: Vec<String> = meta.shape.iter().map(ToString::to_string).collect();
        if shape.is_empty() {
            println!("    {} ({}): scalar", name, meta.dtype);
        } else {
            println!(
                "    {} ({}): [{}] = ({})",
                name,
                meta.dtype,
                meta.dimensions.join(", "),
                shape.join(" x ")
            );
        }

        let key_attrs: Vec<String> = ["units", "long_name", "_FillValue"]
            .iter()
            .filter_map(|k| meta.attributes.get(*k).map(|v| format!("{k}: {v}")))
            .collect();
        if !key_attrs.is_empty() {
            println!("      - {}", key_attrs.join(", "));
        }
    }

    println!("\nTip: Use --describe <BAND> for all attributes of a band");
    Ok(())
}

/// Describes a band showing its data type, shape, attributes and storage size.
pub fn describe_band(source: &dyn BandSource, name: &str) -> Result<()> {
    let meta = source.band_metadata(name)?;

    println!("\n Band Description: {name}");
    println!("={}", "=".repeat(name.len() + 18));
    println!(
        " Data type: {} ({})",
        meta.dtype,
        if meta.dtype.is_integer() {
            "digital counts"
        } else {
            "floating point"
        }
    );

    if meta.shape.is_empty() {
        println!(" Dimensions: (scalar)");
    } else {
        println!(" Dimensions: [{}]", meta.dimensions.join(", "));
        println!(
            " Shape: ({})",
            meta.shape
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" x ")
        );
        let squeezed = meta.shape.iter().filter(|&&d| d != 1).count();
        if squeezed != 2 {
            println!(" Warning: {squeezed} non-singleton dimensions; only 2D grids can be calibrated");
        }
    }

    if meta.attributes.is_empty() {
        println!("\n  Attributes: (none)");
    } else {
        println!("\n  Attributes:");
        for (key, value) in &meta.attributes {
            match value {
                JsonValue::String(s) => println!("   - {key}: \"{s}\""),
                other => println!("   - {key}: {other}"),
            }
        }
    }

    let total_elements: usize = meta.shape.iter().product();
    let total_bytes = total_elements * meta.dtype.size_bytes();
    println!("\n Storage Information:");
    println!("    Total elements: {total_elements}");
    println!("    Element size: {} bytes", meta.dtype.size_bytes());
    println!("    Total size: {}", human_size(total_bytes));

    Ok(())
}

fn human_size(bytes: usize) -> String {
    let b = bytes as f64;
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if b < 1024.0 * 1024.0 {
        format!("{:.2} KB", b / 1024.0)
    } else if b < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB", b / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", b / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_from_filename() {
        assert_eq!(
            ProductLevel::from_filename("3RIMG_30MAR2025_0615_L1C_ASIA_MER_V01R00.h5"),
            Some(ProductLevel::L1C)
        );
        assert_eq!(
            ProductLevel::from_filename("3rimg_l1b_std.h5"),
            Some(ProductLevel::L1B)
        );
        assert_eq!(ProductLevel::from_filename("scene.h5"), None);
    }

    #[test]
    fn l2c_is_rejected() {
        assert!(ProductLevel::L2C.ensure_supported().is_err());
        assert!(ProductLevel::L1C.ensure_supported().is_ok());
    }

    #[test]
    fn sizes() {
        assert_eq!(human_size(10), "10 bytes");
        assert_eq!(human_size(2048), "2.00 KB");
    }
}
