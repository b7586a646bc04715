//! In-memory engine: path registry and ordered stores
//!
//! The default engine backing the facade:
//! - `MemEngine`: process-wide registry mapping paths to stores (`DashMap`,
//!   so opens of different databases never contend)
//! - `Store`: `BTreeMap<Vec<u8>, Vec<u8>>` behind `parking_lot::RwLock`;
//!   batches apply under one write lock, so readers see all of a batch or
//!   none of it
//! - connections hand out snapshot cursors by cloning the map at creation
//!
//! `destroy` removes the name from the registry; connections already open
//! keep their `Arc` to the orphaned store, matching the file-backed engines
//! this stands in for (unlinking a file does not invalidate open descriptors).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use veldt_core::{
    BatchOp, Connection, Cursor, Engine, Error, OpenOptions, ReadOptions, Result, WriteBatch,
    WriteOptions,
};

use crate::cursor::SnapshotCursor;

/// Property prefix recognized by `Connection::property`.
const PROPERTY_PREFIX: &str = "veldt.";

/// One named database: an ordered map of raw byte strings.
#[derive(Debug, Default)]
struct Store {
    data: RwLock<std::collections::BTreeMap<Vec<u8>, Vec<u8>>>,
}

/// In-memory storage engine keyed by path.
///
/// Implements the `Engine` trait for the default, zero-I/O backend. Each
/// distinct path names an independent store; reopening a path connects to
/// the same data until `destroy` reclaims the name.
#[derive(Debug, Default)]
pub struct MemEngine {
    registry: DashMap<PathBuf, Arc<Store>>,
}

impl MemEngine {
    /// Create an engine with an empty registry.
    pub fn new() -> Self {
        MemEngine::default()
    }

    /// Number of databases currently registered.
    pub fn database_count(&self) -> usize {
        self.registry.len()
    }
}

impl Engine for MemEngine {
    fn open(&self, path: &Path, opts: &OpenOptions) -> Result<Arc<dyn Connection>> {
        let store = match self.registry.entry(path.to_path_buf()) {
            dashmap::mapref::entry::Entry::Occupied(e) => {
                if opts.error_if_exists {
                    return Err(Error::Engine(format!(
                        "database already exists: {}",
                        path.display()
                    )));
                }
                Arc::clone(e.get())
            }
            dashmap::mapref::entry::Entry::Vacant(e) => {
                if !opts.create_if_missing {
                    return Err(Error::Engine(format!(
                        "database does not exist: {}",
                        path.display()
                    )));
                }
                debug!(path = %path.display(), "creating database");
                Arc::clone(&*e.insert(Arc::new(Store::default())))
            }
        };

        Ok(Arc::new(MemConnection { store }))
    }

    fn destroy(&self, path: &Path, _opts: &OpenOptions) -> Result<()> {
        debug!(path = %path.display(), "destroying database");
        self.registry.remove(path);
        Ok(())
    }

    fn repair(&self, path: &Path, _opts: &OpenOptions) -> Result<()> {
        // Nothing to repair in memory; succeed so callers can treat repair
        // as engine-agnostic.
        let _ = path;
        Ok(())
    }
}

/// A connection to one in-memory store.
struct MemConnection {
    store: Arc<Store>,
}

impl Connection for MemConnection {
    fn get(&self, key: &[u8], _opts: &ReadOptions) -> Result<Option<Vec<u8>>> {
        Ok(self.store.data.read().get(key).cloned())
    }

    fn write(&self, batch: &WriteBatch, _opts: &WriteOptions) -> Result<()> {
        // One write lock for the whole batch: atomic as a unit.
        let mut data = self.store.data.write();
        for op in batch.ops() {
            match op {
                BatchOp::Put { key, value } => {
                    data.insert(key.clone(), value.clone());
                }
                BatchOp::Delete { key } => {
                    data.remove(key);
                }
            }
        }
        Ok(())
    }

    fn cursor(&self, _opts: &ReadOptions) -> Result<Box<dyn Cursor>> {
        let entries: Vec<(Vec<u8>, Vec<u8>)> = self
            .store
            .data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Box::new(SnapshotCursor::new(entries)))
    }

    fn property(&self, name: &str) -> Option<String> {
        match name.strip_prefix(PROPERTY_PREFIX)? {
            "num-entries" => Some(self.store.data.read().len().to_string()),
            "approximate-size" => {
                let size: usize = self
                    .store
                    .data
                    .read()
                    .iter()
                    .map(|(k, v)| k.len() + v.len())
                    .sum();
                Some(size.to_string())
            }
            _ => None,
        }
    }
}
