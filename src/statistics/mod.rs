//! Statistics and classification of derived products
//!
//! Every statistic is taken over the valid cells of a product only; invalid
//! cells never enter a min, max, mean, standard deviation or classification
//! denominator.
//!
//! # Organization
//!
//! - [`operations`]: min/max/mean/std summaries
//! - [`parallel`]: rayon reductions backing the summaries
//! - [`classification`]: half-open bucket schemes and coverage percentages
//! - [`summary`]: per-product records, fire extras and JSON flattening

pub mod classification;
pub mod operations;
pub mod parallel;
pub mod summary;

pub use classification::{Bucket, BucketSummary, ClassificationScheme, SchemeSummary};
pub use operations::{summary_stats, StatOperation, SummaryStats};
pub use summary::{fire_summary, summarize, FireSummary, ProductStats, StatsRecord};
