//! Core types and traits for veldt
//!
//! This crate defines the foundational pieces shared by the facade and by
//! engine implementations:
//! - Error: error taxonomy and `Result` alias
//! - Options: OpenOptions, ReadOptions, WriteOptions
//! - WriteBatch: ordered, atomically-applied put/delete batches
//! - Traits: Engine, Connection, Cursor (the storage-engine boundary)
//! - Limits: process-wide hard caps

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod limits;
pub mod options;
pub mod traits;

// Re-export commonly used types and traits
pub use error::{Error, Result};
pub use limits::{MAX_KEY_BYTES, MAX_VALUE_BYTES, MAX_WORKER_THREADS};
pub use options::{BatchOp, OpenOptions, ReadOptions, WriteBatch, WriteOptions};
pub use traits::{Connection, Cursor, Engine};
