//! Per-product statistics records

use super::classification::{ClassificationScheme, SchemeSummary};
use super::operations::{summarize_values, StatOperation, SummaryStats};
use crate::calibration::CalibratedBand;
use crate::errors::{Result, SatBandsError};
use crate::products::{DerivedProduct, ProductKind};
use ndarray::Zip;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use tracing::debug;

/// Flat JSON record: string keys to numbers, strings or null
pub type StatsRecord = Map<String, JsonValue>;

/// Fire detection extras
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireSummary {
    pub fire_pixel_count: usize,
    /// Share of valid cells flagged as fire, in percent
    pub fire_coverage_percent: f64,
    /// Hottest brightness temperature among fire cells
    pub max_fire_temperature: Option<f64>,
    pub threshold_used: f64,
}

/// Statistics of one derived product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStats {
    pub product: String,
    pub units: String,
    pub summary: SummaryStats,
    pub parameters: BTreeMap<String, f64>,
    pub classifications: Vec<SchemeSummary>,
    pub fire: Option<FireSummary>,
}

/// Summarize the valid cells of `product` and classify them under `schemes`.
///
/// # Errors
///
/// Returns [`SatBandsError::EmptyProduct`] if the product has no valid cell.
pub fn summarize(product: &DerivedProduct, schemes: &[ClassificationScheme]) -> Result<ProductStats> {
    let values: Vec<f64> = product.valid_values().collect();
    let summary = summarize_values(product.name(), &values, product.values().len())?;
    let classifications = schemes.iter().map(|s| s.classify(&values)).collect();

    debug!(
        product = product.name(),
        valid = summary.valid_cells,
        schemes = schemes.len(),
        "summarized product"
    );

    Ok(ProductStats {
        product: product.name().to_string(),
        units: product.unit().to_string(),
        summary,
        parameters: product.spec().parameters(),
        classifications,
        fire: None,
    })
}

/// Fire extras of a fire mask, with temperatures from the band it was thresholded on.
///
/// # Errors
///
/// - [`SatBandsError::InvalidConfig`] if `mask` is not a fire mask
/// - [`SatBandsError::ShapeMismatch`] if the grids differ
pub fn fire_summary(mask: &DerivedProduct, temperature: &CalibratedBand) -> Result<FireSummary> {
    if mask.kind() != ProductKind::FireMask {
        return Err(SatBandsError::invalid_config(format!(
            "fire statistics need a fire mask, got '{}'",
            mask.name()
        )));
    }
    if mask.dim() != temperature.dim() {
        let (l, r) = (mask.dim(), temperature.dim());
        return Err(SatBandsError::ShapeMismatch {
            product: mask.name().to_string(),
            left: vec![l.0, l.1],
            right: vec![r.0, r.1],
        });
    }

    let mut valid = 0usize;
    let mut fire = 0usize;
    let mut hottest: Option<f64> = None;
    Zip::from(mask.values())
        .and(mask.mask())
        .and(temperature.values())
        .for_each(|&flag, &ok, &t| {
            if !ok {
                return;
            }
            valid += 1;
            if flag == 1.0 {
                fire += 1;
                hottest = Some(hottest.map_or(t, |h| h.max(t)));
            }
        });

    Ok(FireSummary {
        fire_pixel_count: fire,
        fire_coverage_percent: if valid == 0 {
            0.0
        } else {
            fire as f64 / valid as f64 * 100.0
        },
        max_fire_temperature: hottest,
        threshold_used: mask
            .spec()
            .parameters()
            .get("threshold_used")
            .copied()
            .unwrap_or(f64::NAN),
    })
}

fn number(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number)
}

impl ProductStats {
    pub fn with_fire(mut self, fire: FireSummary) -> Self {
        self.fire = Some(fire);
        self
    }

    /// Flatten into a single-level record.
    ///
    /// Classification entries use `<scheme>.<bucket>.pixel_count` and
    /// `<scheme>.<bucket>.percentage` keys.
    pub fn to_record(&self) -> StatsRecord {
        let mut rec = StatsRecord::new();
        rec.insert("product".into(), JsonValue::String(self.product.clone()));
        rec.insert("units".into(), JsonValue::String(self.units.clone()));
        for op in StatOperation::ALL {
            rec.insert(op.as_str().into(), number(self.summary.get(op)));
        }
        rec.insert("valid_cells".into(), self.summary.valid_cells.into());
        rec.insert("total_cells".into(), self.summary.total_cells.into());
        for (k, v) in &self.parameters {
            rec.insert(k.clone(), number(*v));
        }
        for scheme in &self.classifications {
            for b in &scheme.buckets {
                let prefix = format!("{}.{}", scheme.scheme, b.name);
                rec.insert(format!("{prefix}.pixel_count"), b.pixel_count.into());
                rec.insert(format!("{prefix}.percentage"), number(b.percentage));
                rec.insert(format!("{prefix}.range"), JsonValue::String(b.range.clone()));
            }
        }
        if let Some(fire) = &self.fire {
            rec.insert("fire_pixel_count".into(), fire.fire_pixel_count.into());
            rec.insert(
                "fire_coverage_percent".into(),
                number(fire.fire_coverage_percent),
            );
            rec.insert(
                "max_fire_temperature".into(),
                fire.max_fire_temperature.map_or(JsonValue::Null, number),
            );
        }
        rec
    }
}
