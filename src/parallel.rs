//! Parallel processing configuration
//!
//! Product evaluation and the per-cell kernels run on rayon's global pool; this
//! module sizes that pool once per process.

use crate::errors::{Result, SatBandsError};
use rayon::ThreadPoolBuilder;
use tracing::{debug, info};

/// Configuration for parallel processing
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Use every available CPU core
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    /// Set up the global rayon pool.
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::ThreadPool`] for a zero thread count or when the
    /// global pool was already initialized.
    pub fn setup_global_pool(&self) -> Result<()> {
        match self.num_threads {
            Some(0) => Err(SatBandsError::ThreadPool(
                "thread count must be at least 1".to_string(),
            )),
            Some(n) => {
                ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build_global()
                    .map_err(|e| {
                        SatBandsError::ThreadPool(format!(
                            "failed to initialize thread pool with {n} threads: {e}"
                        ))
                    })?;
                info!(threads = n, "configured parallel processing");
                Ok(())
            }
            None => {
                debug!(threads = rayon::current_num_threads(), "using default thread pool");
                Ok(())
            }
        }
    }

    /// Threads of the current pool
    pub fn current_threads(&self) -> usize {
        rayon::current_num_threads()
    }
}

/// Parallel processing environment
#[derive(Debug, Clone)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
    pub available_parallelism: usize,
}

pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        current_threads: rayon::current_num_threads(),
        available_cores: num_cpus::get(),
        available_parallelism: std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(1),
    }
}

impl ParallelInfo {
    pub fn log(&self) {
        debug!(
            current_threads = self.current_threads,
            available_cores = self.available_cores,
            available_parallelism = self.available_parallelism,
            "parallel processing environment"
        );
    }
}
