//! Engine boundary traits
//!
//! This module defines the `Engine`, `Connection`, and `Cursor` traits that
//! mark the storage-engine boundary. The facade treats the engine as opaque:
//! everything behind these traits (ordering, compaction, durability) is the
//! engine's business. Swapping the default in-memory engine for an on-disk
//! LSM engine must not touch the layers above.
//!
//! Thread safety: `Engine` and `Connection` must be safe to call concurrently
//! from multiple worker threads (`Send + Sync`). A `Cursor` is stepped by one
//! thread at a time (the facade serializes moves per iterator) but may hop
//! between threads, so it is `Send` only.

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::options::{OpenOptions, ReadOptions, WriteBatch, WriteOptions};

/// A storage-engine factory: opens, destroys, and repairs databases by path.
pub trait Engine: Send + Sync + 'static {
    /// Open (or create, per `opts`) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Engine` with the engine's own status message on
    /// failure; no connection object exists afterwards.
    fn open(&self, path: &Path, opts: &OpenOptions) -> Result<Arc<dyn Connection>>;

    /// Destroy the database at `path`, releasing its storage.
    ///
    /// Connections already open against it keep working on the orphaned
    /// state; only the name is reclaimed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Engine` if the database cannot be destroyed.
    fn destroy(&self, path: &Path, opts: &OpenOptions) -> Result<()>;

    /// Repair the (closed) database at `path` as best the engine can.
    ///
    /// # Errors
    ///
    /// Returns `Error::Engine` if repair fails.
    fn repair(&self, path: &Path, opts: &OpenOptions) -> Result<()>;
}

/// One open connection to a database.
///
/// All methods may block on engine I/O; callers above the facade never see
/// that because connections are only driven from worker threads.
pub trait Connection: Send + Sync {
    /// Point lookup. `Ok(None)` means the key is absent.
    ///
    /// # Errors
    ///
    /// Returns `Error::Engine` on a read failure.
    fn get(&self, key: &[u8], opts: &ReadOptions) -> Result<Option<Vec<u8>>>;

    /// Apply `batch` atomically: all operations or none.
    ///
    /// # Errors
    ///
    /// Returns `Error::Engine` on a write failure; the store is unchanged.
    fn write(&self, batch: &WriteBatch, opts: &WriteOptions) -> Result<()>;

    /// Create a cursor over a point-in-time snapshot of the database.
    ///
    /// Writes applied after creation are never visible through the cursor.
    /// The cursor starts unpositioned (`valid() == false`).
    ///
    /// # Errors
    ///
    /// Returns `Error::Engine` if the snapshot cannot be taken.
    fn cursor(&self, opts: &ReadOptions) -> Result<Box<dyn Cursor>>;

    /// Engine-specific introspection property, or `None` if unknown.
    fn property(&self, name: &str) -> Option<String>;
}

/// A bidirectional cursor over an immutable snapshot.
///
/// Positioning follows the usual embedded-engine contract: the cursor starts
/// invalid; `seek_to_first`/`seek_to_last`/`seek` position it absolutely;
/// `next`/`prev` are no-ops on an invalid cursor (callers guard with
/// `valid()`); `key()`/`value()` must only be called while `valid()`.
pub trait Cursor: Send {
    /// Position at the first entry, or invalid if the snapshot is empty.
    fn seek_to_first(&mut self);
    /// Position at the last entry, or invalid if the snapshot is empty.
    fn seek_to_last(&mut self);
    /// Position at the first entry with key >= `target`, or invalid.
    fn seek(&mut self, target: &[u8]);
    /// Advance to the next entry; invalid once past the last.
    fn next(&mut self);
    /// Step back to the previous entry; invalid once before the first.
    fn prev(&mut self);
    /// True while positioned at an entry.
    fn valid(&self) -> bool;
    /// Key at the current position. Only meaningful while `valid()`.
    fn key(&self) -> &[u8];
    /// Value at the current position. Only meaningful while `valid()`.
    fn value(&self) -> &[u8];
}
