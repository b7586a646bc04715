//! Veldt - asynchronous facade over embedded key/value engines
//!
//! Veldt turns the blocking operations of an embedded key/value store into
//! asynchronous requests executed by a dedicated worker pool. Callers hand
//! each request a [`Mailbox`] and an opaque [`CallerToken`]; results come
//! back as [`Envelope`]s carrying that token, so a single receiver can
//! multiplex replies for any number of outstanding operations.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use veldt::{Mailbox, MoveAction, OpenOptions, Runtime, RuntimeConfig, WriteBatch, WriteOptions};
//! use veldt_engine::MemEngine;
//!
//! let rt = Runtime::new(RuntimeConfig::default(), Arc::new(MemEngine::new()))?;
//! let (mailbox, rx) = Mailbox::channel();
//!
//! rt.open(&mailbox, 1, "/tmp/db", OpenOptions::default())?;
//! let db = match rx.recv()?.reply {
//!     veldt::Reply::DbOpened(db) => db,
//!     other => panic!("open failed: {other:?}"),
//! };
//!
//! let mut batch = WriteBatch::new();
//! batch.put(b"k".to_vec(), b"v".to_vec());
//! rt.write(&mailbox, 2, &db, batch, WriteOptions::default())?;
//! ```
//!
//! # Architecture
//!
//! The [`Runtime`] validates each request synchronously, then submits it to
//! an internal worker pool. Workers execute against a pluggable [`Engine`]
//! and deliver replies through the caller's mailbox. Iterators add a small
//! state machine on top: after a successful move the worker speculatively
//! prefetches the next entry, so a caller streaming forward usually finds
//! its answer already buffered. See [`Runtime::iterator_move`].
//!
//! Storage itself lives behind the [`Engine`] / [`Connection`] / [`Cursor`]
//! traits from `veldt-core`; `veldt-engine` ships an in-memory
//! implementation used throughout the test suites.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod handle;
mod iter;
mod pool;
mod reply;
mod runtime;
mod work;

pub use config::RuntimeConfig;
pub use handle::DbHandle;
pub use iter::{IterHandle, MoveAction, MoveOutcome};
pub use pool::PoolStats;
pub use reply::{CallerToken, Envelope, Mailbox, Reply};
pub use runtime::Runtime;

pub use veldt_core::{
    limits, BatchOp, Connection, Cursor, Engine, Error, OpenOptions, ReadOptions, Result,
    WriteBatch, WriteOptions,
};
