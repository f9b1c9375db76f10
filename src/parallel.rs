//! Thread pool sizing
//!
//! The grid search and the per-cell comparison run on Rayon's global pool.

use crate::errors::{EmSitdError, Result};
use rayon::ThreadPoolBuilder;
use tracing::info;

/// Requested worker threads; `None` keeps Rayon's default of one per core
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    #[must_use]
    pub const fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Size the global Rayon pool and return the number of threads in use.
    ///
    /// # Errors
    ///
    /// Returns [`EmSitdError::ThreadPoolError`] for a zero thread count or
    /// when the global pool was already built.
    pub fn setup_global_pool(&self) -> Result<usize> {
        if let Some(num_threads) = self.num_threads {
            if num_threads == 0 {
                return Err(EmSitdError::ThreadPoolError(
                    "thread count must be at least 1".to_string(),
                ));
            }
            ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()
                .map_err(|e| {
                    EmSitdError::ThreadPoolError(format!(
                        "Failed to initialize thread pool with {num_threads} threads: {e}"
                    ))
                })?;
        }

        let threads = rayon::current_num_threads();
        info!(threads, available_cores = num_cpus::get(), "thread pool ready");
        Ok(threads)
    }
}
