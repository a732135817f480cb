//! Summary statistics over the valid cells of a product

use super::parallel::{parallel_moments, parallel_sq_deviation};
use crate::errors::{Result, SatBandsError};
use crate::products::DerivedProduct;
use serde::{Deserialize, Serialize};

/// Supported summary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatOperation {
    /// Smallest valid value
    Min,
    /// Largest valid value
    Max,
    /// Arithmetic mean
    Mean,
    /// Population standard deviation
    Std,
}

impl StatOperation {
    pub const ALL: [StatOperation; 4] = [Self::Min, Self::Max, Self::Mean, Self::Std];

    /// Key used in statistics records
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Mean => "mean",
            Self::Std => "std",
        }
    }
}

/// Min, max, mean and standard deviation of a product's valid cells.
///
/// `std` is the population standard deviation (divides by the valid count).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub valid_cells: usize,
    pub total_cells: usize,
}

impl SummaryStats {
    /// Value of a single operation
    #[must_use]
    pub fn get(&self, op: StatOperation) -> f64 {
        match op {
            StatOperation::Min => self.min,
            StatOperation::Max => self.max,
            StatOperation::Mean => self.mean,
            StatOperation::Std => self.std,
        }
    }

    /// Fraction of the grid that is valid, in percent
    #[must_use]
    pub fn valid_percentage(&self) -> f64 {
        if self.total_cells == 0 {
            0.0
        } else {
            self.valid_cells as f64 / self.total_cells as f64 * 100.0
        }
    }
}

/// Compute [`SummaryStats`] over the valid cells of `product`.
///
/// # Errors
///
/// Returns [`SatBandsError::EmptyProduct`] if the product has no valid cell.
pub fn summary_stats(product: &DerivedProduct) -> Result<SummaryStats> {
    let values: Vec<f64> = product.valid_values().collect();
    summarize_values(product.name(), &values, product.values().len())
}

/// Compute [`SummaryStats`] over a slice of valid values.
///
/// # Errors
///
/// Returns [`SatBandsError::EmptyProduct`] if `values` is empty.
pub fn summarize_values(name: &str, values: &[f64], total_cells: usize) -> Result<SummaryStats> {
    let moments = parallel_moments(values).ok_or_else(|| SatBandsError::EmptyProduct {
        product: name.to_string(),
    })?;
    let n = moments.count as f64;
    let mean = moments.sum / n;
    let std = (parallel_sq_deviation(values, mean) / n).sqrt();

    Ok(SummaryStats {
        min: moments.min,
        max: moments.max,
        mean,
        std,
        valid_cells: moments.count,
        total_cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_std() {
        let s = summarize_values("t", &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8).unwrap();
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);
        assert!((s.mean - 5.0).abs() < 1e-12);
        assert!((s.std - 2.0).abs() < 1e-12);
        assert_eq!(s.get(StatOperation::Std), s.std);
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = summarize_values("aod", &[], 4).unwrap_err();
        assert!(matches!(err, SatBandsError::EmptyProduct { ref product } if product == "aod"));
    }

    #[test]
    fn valid_percentage_of_grid() {
        let s = summarize_values("t", &[1.0], 4).unwrap();
        assert_eq!(s.valid_percentage(), 25.0);
    }
}
