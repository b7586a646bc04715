//! Process-wide limits
//!
//! Hard caps enforced by the dispatch layer and by pool initialization.
//! Violations surface as `Config` or `InvalidArgument`/`BadBatchEntry` errors
//! before any work item is built.

/// Maximum number of worker threads a pool may be configured with.
pub const MAX_WORKER_THREADS: usize = 32_767;

/// Maximum key length in bytes, also applied to iterator seek targets.
pub const MAX_KEY_BYTES: usize = 64 * 1024;

/// Maximum value length in bytes for a single batch entry.
pub const MAX_VALUE_BYTES: usize = 256 * 1024 * 1024;
