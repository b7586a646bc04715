//! Database handles
//!
//! A `DbHandle` is a cloneable, closeable reference to one open engine
//! connection. Clones are held by the caller and by every in-flight work
//! item that targets the database, so the connection provably outlives
//! every operation that touches it: shared ownership makes the connection's
//! release happen exactly once, when the last clone drops.
//!
//! Close is two-phase: `close()` marks the handle closing and returns
//! immediately. New submissions are rejected from that point on, while work
//! already in flight keeps its clone and completes normally. No lock guards
//! engine calls; the lifecycle alone makes use-after-close impossible.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use veldt_core::{Connection, Error, Result};

struct DbInner {
    path: PathBuf,
    conn: Arc<dyn Connection>,
    closing: AtomicBool,
}

/// A handle to one open database.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<DbInner>,
}

impl DbHandle {
    pub(crate) fn new(path: PathBuf, conn: Arc<dyn Connection>) -> Self {
        DbHandle {
            inner: Arc::new(DbInner {
                path,
                conn,
                closing: AtomicBool::new(false),
            }),
        }
    }

    /// Path the database was opened at.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// True once `close` has been requested.
    pub fn is_closing(&self) -> bool {
        self.inner.closing.load(Ordering::Acquire)
    }

    /// Request close. Never blocks; idempotent (a second call is a no-op).
    ///
    /// New submissions through any clone of this handle fail with
    /// `InvalidHandle` from now on. The engine connection stays open until
    /// every in-flight work item has released its clone, then is closed
    /// exactly once.
    pub fn close(&self) {
        if !self.inner.closing.swap(true, Ordering::AcqRel) {
            debug!(path = %self.inner.path.display(), "database close requested");
        }
    }

    /// Connection for a new submission; fails once the handle is closing.
    pub(crate) fn acquire(&self) -> Result<Arc<dyn Connection>> {
        if self.is_closing() {
            return Err(Error::InvalidHandle);
        }
        Ok(Arc::clone(&self.inner.conn))
    }

    /// Connection for executing work already admitted. In-flight items stay
    /// valid across a concurrent `close`, so no closing check here.
    pub(crate) fn connection(&self) -> &Arc<dyn Connection> {
        &self.inner.conn
    }
}

impl fmt::Debug for DbHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbHandle")
            .field("path", &self.inner.path)
            .field("closing", &self.is_closing())
            .finish()
    }
}
