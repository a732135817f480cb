//! Parallel reductions backing the summary statistics
//!
//! Values are reduced with rayon's `fold`/`reduce` so large grids use every
//! worker of the global pool; the second pass for the variance reuses the mean
//! from the first one to stay numerically stable.

use rayon::prelude::*;

/// Partial result of a single-pass reduction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl Moments {
    const EMPTY: Self = Self {
        count: 0,
        sum: 0.0,
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
    };

    fn push(mut self, x: f64) -> Self {
        self.count += 1;
        self.sum += x;
        self.min = self.min.min(x);
        self.max = self.max.max(x);
        self
    }

    fn merge(self, other: Self) -> Self {
        Self {
            count: self.count + other.count,
            sum: self.sum + other.sum,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Count, sum, min and max of `values`; `None` when empty.
pub fn parallel_moments(values: &[f64]) -> Option<Moments> {
    let moments = values
        .par_iter()
        .fold(|| Moments::EMPTY, |acc, &x| acc.push(x))
        .reduce(|| Moments::EMPTY, Moments::merge);
    (moments.count > 0).then_some(moments)
}

/// Sum of squared deviations from `mean`.
pub fn parallel_sq_deviation(values: &[f64], mean: f64) -> f64 {
    values.par_iter().map(|&x| (x - mean) * (x - mean)).sum()
}
