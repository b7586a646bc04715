//! Runtime configuration
//!
//! One integer really matters: the worker-thread count, fixed for the life
//! of the runtime. An out-of-range value refuses initialization, the only
//! fatal error in the system.

use veldt_core::{Error, Result, MAX_WORKER_THREADS};

/// Configuration supplied once at runtime construction.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of worker threads; `1..=MAX_WORKER_THREADS`
    pub worker_threads: usize,
    /// Submission-queue capacity; submissions beyond it fail fast
    pub max_queue_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            worker_threads: 4,
            max_queue_depth: 4096,
        }
    }
}

impl RuntimeConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 || self.worker_threads > MAX_WORKER_THREADS {
            return Err(Error::Config(format!(
                "worker_threads must be in 1..={}, got {}",
                MAX_WORKER_THREADS, self.worker_threads
            )));
        }
        if self.max_queue_depth == 0 {
            return Err(Error::Config(
                "max_queue_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
