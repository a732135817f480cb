//! Bucketed coverage classification
//!
//! A [`ClassificationScheme`] is an ordered list of named half-open ranges
//! `[lower, upper)`. Either bound may be open-ended, so a scheme can partition the
//! whole real line. Percentages are taken over the valid-cell count, never the
//! grid size.

use crate::errors::{Result, SatBandsError};
use crate::products::ProductKind;
use serde::{Deserialize, Serialize};

/// One named range of a scheme. `None` bounds are unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Bucket {
    pub fn new(name: impl Into<String>, lower: Option<f64>, upper: Option<f64>) -> Self {
        Self {
            name: name.into(),
            lower,
            upper,
        }
    }

    /// `[lower, upper)` membership
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.lower.map_or(true, |lo| value >= lo) && self.upper.map_or(true, |hi| value < hi)
    }

    /// Human-readable range, e.g. `[0.1, 0.3)`
    pub fn range_label(&self) -> String {
        let lo = self.lower.map_or_else(|| "-inf".to_string(), |v| v.to_string());
        let hi = self.upper.map_or_else(|| "inf".to_string(), |v| v.to_string());
        format!("[{lo}, {hi})")
    }
}

/// A named, ordered set of buckets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationScheme {
    pub name: String,
    pub buckets: Vec<Bucket>,
}

/// Count and share of one bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub name: String,
    pub range: String,
    pub pixel_count: usize,
    pub percentage: f64,
}

/// Result of classifying one product under one scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeSummary {
    pub scheme: String,
    pub buckets: Vec<BucketSummary>,
}

impl SchemeSummary {
    /// Sum of bucket percentages; 100 for a scheme covering the real line.
    pub fn total_percentage(&self) -> f64 {
        self.buckets.iter().map(|b| b.percentage).sum()
    }
}

impl ClassificationScheme {
    /// Build a scheme, checking that buckets are ordered and do not overlap.
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::InvalidConfig`] for an empty scheme, an empty
    /// bucket, or buckets out of order.
    pub fn new(name: impl Into<String>, buckets: Vec<Bucket>) -> Result<Self> {
        let name = name.into();
        if buckets.is_empty() {
            return Err(SatBandsError::invalid_config(format!(
                "classification '{name}' has no buckets"
            )));
        }
        for b in &buckets {
            if let (Some(lo), Some(hi)) = (b.lower, b.upper) {
                if hi <= lo {
                    return Err(SatBandsError::invalid_config(format!(
                        "bucket '{}' of '{name}' is empty: {}",
                        b.name,
                        b.range_label()
                    )));
                }
            }
        }
        for pair in buckets.windows(2) {
            match (pair[0].upper, pair[1].lower) {
                (Some(hi), Some(lo)) if hi <= lo => {}
                _ => {
                    return Err(SatBandsError::invalid_config(format!(
                        "buckets '{}' and '{}' of '{name}' overlap or are out of order",
                        pair[0].name, pair[1].name
                    )))
                }
            }
        }
        Ok(Self { name, buckets })
    }

    /// Contiguous scheme from ascending edges: `names.len() == edges.len() + 1`.
    /// The first bucket is `[start, edges[0])` and the last is unbounded above.
    ///
    /// # Errors
    ///
    /// See [`ClassificationScheme::new`].
    pub fn from_edges(
        name: impl Into<String>,
        start: Option<f64>,
        edges: &[f64],
        names: &[&str],
    ) -> Result<Self> {
        let name = name.into();
        if names.len() != edges.len() + 1 {
            return Err(SatBandsError::invalid_config(format!(
                "classification '{name}' needs {} bucket names, got {}",
                edges.len() + 1,
                names.len()
            )));
        }
        let lowers = std::iter::once(start).chain(edges.iter().copied().map(Some));
        let uppers = edges.iter().copied().map(Some).chain(std::iter::once(None));
        let buckets = names
            .iter()
            .zip(lowers.zip(uppers))
            .map(|(n, (lo, hi))| Bucket::new(*n, lo, hi))
            .collect();
        Self::new(name, buckets)
    }

    /// Whether the buckets partition the full real line
    pub fn covers_real_line(&self) -> bool {
        let first_open = self.buckets.first().is_some_and(|b| b.lower.is_none());
        let last_open = self.buckets.last().is_some_and(|b| b.upper.is_none());
        let contiguous = self
            .buckets
            .windows(2)
            .all(|p| p[0].upper.is_some() && p[0].upper == p[1].lower);
        first_open && last_open && contiguous
    }

    /// Count `values` per bucket and express each count as a percentage of
    /// `values.len()`. Values outside every bucket count toward the denominator
    /// only.
    pub fn classify(&self, values: &[f64]) -> SchemeSummary {
        let mut counts = vec![0usize; self.buckets.len()];
        for &v in values {
            if let Some(i) = self.buckets.iter().position(|b| b.contains(v)) {
                counts[i] += 1;
            }
        }
        let total = values.len();
        let buckets = self
            .buckets
            .iter()
            .zip(counts)
            .map(|(b, count)| BucketSummary {
                name: b.name.clone(),
                range: b.range_label(),
                pixel_count: count,
                percentage: if total == 0 {
                    0.0
                } else {
                    count as f64 / total as f64 * 100.0
                },
            })
            .collect();
        SchemeSummary {
            scheme: self.name.clone(),
            buckets,
        }
    }

    /// Aerosol load levels
    pub fn aod_levels() -> Self {
        Self::fixed(
            "aod_level",
            Some(0.0),
            &[0.1, 0.3, 0.5],
            &["clear", "moderate", "hazy", "very_hazy"],
        )
    }

    /// Humidity levels of the water vapour content product
    pub fn humidity_levels() -> Self {
        Self::fixed(
            "humidity_level",
            Some(0.0),
            &[20.0, 40.0, 60.0, 80.0],
            &["very_dry", "dry", "moderate", "humid", "very_humid"],
        )
    }

    /// Snow cover split at NDSI 0.4
    pub fn snow_cover() -> Self {
        Self::fixed("snow_cover", None, &[0.4], &["no_snow", "snow"])
    }

    /// Fire mask split between 0 and 1
    pub fn fire_detection() -> Self {
        Self::fixed("fire_detection", None, &[0.5], &["no_fire", "fire"])
    }

    /// Default schemes reported for `kind`
    pub fn defaults_for(kind: ProductKind) -> Vec<Self> {
        match kind {
            ProductKind::Aod => vec![Self::aod_levels()],
            ProductKind::WaterVaporContent => vec![Self::humidity_levels()],
            ProductKind::Ndsi => vec![Self::snow_cover()],
            ProductKind::FireMask => vec![Self::fire_detection()],
            _ => Vec::new(),
        }
    }

    // Built-in edges are sorted literals.
    fn fixed(name: &str, start: Option<f64>, edges: &[f64], names: &[&str]) -> Self {
        let lowers = std::iter::once(start).chain(edges.iter().copied().map(Some));
        let uppers = edges.iter().copied().map(Some).chain(std::iter::once(None));
        Self {
            name: name.to_string(),
            buckets: names
                .iter()
                .zip(lowers.zip(uppers))
                .map(|(n, (lo, hi))| Bucket::new(*n, lo, hi))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_open_boundaries() {
        let s = ClassificationScheme::aod_levels();
        let out = s.classify(&[0.0, 0.1, 0.29, 0.3, 0.5, 2.0]);
        let counts: Vec<usize> = out.buckets.iter().map(|b| b.pixel_count).collect();
        assert_eq!(counts, vec![1, 2, 1, 2]);
    }

    #[test]
    fn open_scheme_sums_to_hundred() {
        let s = ClassificationScheme::snow_cover();
        assert!(s.covers_real_line());
        let out = s.classify(&[-1.0, -0.2, 0.39, 0.4, 0.9, 1.0, 0.0]);
        assert!((out.total_percentage() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn bounded_below_scheme_does_not_cover_real_line() {
        assert!(!ClassificationScheme::humidity_levels().covers_real_line());
    }

    #[test]
    fn overlapping_buckets_are_rejected() {
        let buckets = vec![
            Bucket::new("a", Some(0.0), Some(1.0)),
            Bucket::new("b", Some(0.5), None),
        ];
        assert!(ClassificationScheme::new("x", buckets).is_err());
    }

    #[test]
    fn from_edges_checks_name_count() {
        assert!(ClassificationScheme::from_edges("x", None, &[1.0], &["a"]).is_err());
        let s = ClassificationScheme::from_edges("x", None, &[1.0, 2.0], &["a", "b", "c"]).unwrap();
        assert!(s.covers_real_line());
    }
}
