//! Error types for veldt
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! The taxonomy follows where an error is resolved:
//! - argument, handle, and protocol errors are returned synchronously from
//!   the dispatch layer, before any work item is built,
//! - engine and submission errors reach the caller as exactly one reply
//!   message, so a caller that awaits a reply never hangs.

use std::io;
use thiserror::Error;

/// Result type alias for veldt operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the asynchronous storage facade
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Operation requested through a closed or invalid handle
    #[error("invalid handle")]
    InvalidHandle,

    /// Malformed or missing input, detected before submission
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A batch entry failed validation; reports the offending entry
    #[error("bad write action at entry {index}: {reason}")]
    BadBatchEntry {
        /// Zero-based index of the offending entry in the batch
        index: usize,
        /// Why the entry was rejected
        reason: String,
    },

    /// The storage engine reported failure; status carried verbatim
    #[error("engine error: {0}")]
    Engine(String),

    /// The work queue could not accept the item (saturated or shutting down)
    #[error("submission failed: worker pool is saturated or shutting down")]
    SubmitFailed,

    /// Invalid process-wide configuration, fatal at initialization
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Engine(e.to_string())
    }
}
