//! The dispatch layer
//!
//! `Runtime` owns the worker pool and the engine: one explicit context
//! object injected into every call path, never ambient module state.
//!
//! Asynchronous operations (`open`, `write`, `get`, `iterator`,
//! `iterator_move`) validate their arguments on the calling thread, build a
//! work item, and submit it; the caller gets the result later as exactly one
//! mailbox message. Validation failures are returned synchronously and never
//! consume a worker. When the queue itself refuses an item, the dispatch
//! layer fulfills the reply obligation on the spot with an error envelope,
//! so a caller awaiting its mailbox is never stranded.
//!
//! Administrative operations (`close`, `property`, `is_empty`, `destroy`,
//! `repair`) run synchronously on the calling thread.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use veldt_core::{
    BatchOp, Engine, Error, OpenOptions, ReadOptions, Result, WriteBatch, WriteOptions,
    MAX_KEY_BYTES, MAX_VALUE_BYTES,
};

use crate::config::RuntimeConfig;
use crate::handle::DbHandle;
use crate::iter::{IterHandle, MoveAction, MoveOutcome, MovePlan, MoveTicket};
use crate::pool::{PoolStats, WorkerPool};
use crate::reply::{CallerToken, Mailbox};
use crate::work::{Task, WorkItem};

/// Process-scoped context: worker pool plus storage engine.
pub struct Runtime {
    pool: WorkerPool,
    engine: Arc<dyn Engine>,
}

impl Runtime {
    /// Build a runtime over `engine` with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an out-of-range worker count or queue
    /// depth; nothing is spawned in that case.
    pub fn new(config: RuntimeConfig, engine: Arc<dyn Engine>) -> Result<Runtime> {
        config.validate()?;
        debug!(
            worker_threads = config.worker_threads,
            max_queue_depth = config.max_queue_depth,
            "starting runtime"
        );
        let pool = WorkerPool::new(
            config.worker_threads,
            config.max_queue_depth,
            Arc::clone(&engine),
        );
        Ok(Runtime { pool, engine })
    }

    /// Queue an open. Replies `DbOpened` with a fresh handle, or `Error`
    /// carrying the engine's status.
    pub fn open(
        &self,
        mailbox: &Mailbox,
        token: CallerToken,
        path: impl Into<PathBuf>,
        opts: OpenOptions,
    ) -> Result<()> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidArgument("empty database path".to_string()));
        }
        self.submit_or_reply(WorkItem {
            token,
            mailbox: mailbox.clone(),
            task: Task::Open { path, opts },
        });
        Ok(())
    }

    /// Queue a write batch. Replies `Written`, or `Error` on engine failure.
    ///
    /// The batch is validated here, entry by entry; a bad entry fails
    /// synchronously naming its index and never reaches a worker. The engine
    /// applies the batch atomically as a unit.
    pub fn write(
        &self,
        mailbox: &Mailbox,
        token: CallerToken,
        db: &DbHandle,
        batch: WriteBatch,
        opts: WriteOptions,
    ) -> Result<()> {
        db.acquire()?;
        validate_batch(&batch)?;
        self.submit_or_reply(WorkItem {
            token,
            mailbox: mailbox.clone(),
            task: Task::Write {
                db: db.clone(),
                batch,
                opts,
            },
        });
        Ok(())
    }

    /// Queue a point lookup. Replies `Value`, `NotFound`, or `Error`.
    pub fn get(
        &self,
        mailbox: &Mailbox,
        token: CallerToken,
        db: &DbHandle,
        key: impl Into<Vec<u8>>,
        opts: ReadOptions,
    ) -> Result<()> {
        db.acquire()?;
        let key = key.into();
        if key.len() > MAX_KEY_BYTES {
            return Err(Error::InvalidArgument(format!(
                "key of {} bytes exceeds maximum of {}",
                key.len(),
                MAX_KEY_BYTES
            )));
        }
        self.submit_or_reply(WorkItem {
            token,
            mailbox: mailbox.clone(),
            task: Task::Get {
                db: db.clone(),
                key,
                opts,
            },
        });
        Ok(())
    }

    /// Queue iterator creation. Replies `IteratorCreated` with a handle
    /// bound to a snapshot taken at creation; all moves on that handle
    /// reply to this mailbox and token.
    pub fn iterator(
        &self,
        mailbox: &Mailbox,
        token: CallerToken,
        db: &DbHandle,
        opts: ReadOptions,
        keys_only: bool,
    ) -> Result<()> {
        db.acquire()?;
        self.submit_or_reply(WorkItem {
            token,
            mailbox: mailbox.clone(),
            task: Task::CreateIterator {
                db: db.clone(),
                opts,
                keys_only,
            },
        });
        Ok(())
    }

    /// Move an iterator.
    ///
    /// Returns `MoveOutcome::Queued` when the result will arrive as one
    /// mailbox message, or `MoveOutcome::Ready` when a finished background
    /// prefetch was consumed synchronously (in which case no message
    /// follows, and the next prefetch is already running).
    ///
    /// # Errors
    ///
    /// `InvalidHandle` for a closing iterator, `InvalidArgument` for an
    /// oversized seek target, `SubmitFailed` if the queue refused the move
    /// (the iterator is left idle and usable).
    pub fn iterator_move(&self, iter: &IterHandle, action: MoveAction) -> Result<MoveOutcome> {
        if let MoveAction::Seek(target) = &action {
            if target.len() > MAX_KEY_BYTES {
                return Err(Error::InvalidArgument(format!(
                    "seek target of {} bytes exceeds maximum of {}",
                    target.len(),
                    MAX_KEY_BYTES
                )));
            }
        }

        match iter.plan_move(action)? {
            MovePlan::Submit(ticket) => {
                self.submit_move(iter, ticket)?;
                Ok(MoveOutcome::Queued)
            }
            MovePlan::Await => Ok(MoveOutcome::Queued),
            MovePlan::Ready { reply, next } => {
                // The caller already has its answer; a refused follow-up
                // only breaks the speculation chain, which restarts on the
                // next prefetch request.
                if self.submit_move(iter, next).is_err() {
                    warn!("prefetch chain submission refused; chain abandoned");
                }
                Ok(MoveOutcome::Ready(reply))
            }
        }
    }

    fn submit_move(&self, iter: &IterHandle, ticket: Arc<MoveTicket>) -> Result<()> {
        let item = WorkItem {
            token: iter.token(),
            mailbox: iter.mailbox().clone(),
            task: Task::Move {
                iter: iter.clone(),
                ticket,
            },
        };
        if self.pool.submit(item).is_err() {
            iter.abandon_move();
            return Err(Error::SubmitFailed);
        }
        Ok(())
    }

    /// Request database close: non-blocking, idempotent. In-flight work
    /// finishes normally; the engine connection is released once the last
    /// reference drops.
    pub fn close(&self, db: &DbHandle) {
        db.close();
    }

    /// Request iterator close: non-blocking, idempotent; cancels any
    /// pending move.
    pub fn iterator_close(&self, iter: &IterHandle) {
        iter.close();
    }

    /// Read an engine introspection property. Synchronous.
    pub fn property(&self, db: &DbHandle, name: &str) -> Result<Option<String>> {
        let conn = db.acquire()?;
        Ok(conn.property(name))
    }

    /// True when the database holds no entries. Synchronous.
    pub fn is_empty(&self, db: &DbHandle) -> Result<bool> {
        let conn = db.acquire()?;
        let mut cursor = conn.cursor(&ReadOptions::default())?;
        cursor.seek_to_first();
        Ok(!cursor.valid())
    }

    /// Destroy the database at `path`. Synchronous.
    pub fn destroy(&self, path: &Path, opts: &OpenOptions) -> Result<()> {
        self.engine.destroy(path, opts)
    }

    /// Repair the database at `path`. Synchronous.
    pub fn repair(&self, path: &Path, opts: &OpenOptions) -> Result<()> {
        self.engine.repair(path, opts)
    }

    /// Block until all queued and executing work has completed.
    pub fn drain(&self) {
        self.pool.drain();
    }

    /// Tear down: drain remaining work and join all workers. Idempotent;
    /// also runs on drop. Submissions refused afterwards get error replies.
    pub fn shutdown(&self) {
        debug!("runtime shutdown");
        self.pool.shutdown();
    }

    /// Worker-pool metrics snapshot.
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Submit, or fulfill the reply obligation immediately with an error
    /// envelope when the queue refuses the item.
    fn submit_or_reply(&self, item: WorkItem) {
        if let Err(item) = self.pool.submit(item) {
            warn!(token = item.token, "work queue refused item; replying with error");
            item.reject(Error::SubmitFailed);
        }
    }
}

fn validate_batch(batch: &WriteBatch) -> Result<()> {
    for (index, op) in batch.ops().iter().enumerate() {
        let (key, value_len) = match op {
            BatchOp::Put { key, value } => (key, value.len()),
            BatchOp::Delete { key } => (key, 0),
        };
        if key.len() > MAX_KEY_BYTES {
            return Err(Error::BadBatchEntry {
                index,
                reason: format!(
                    "key of {} bytes exceeds maximum of {}",
                    key.len(),
                    MAX_KEY_BYTES
                ),
            });
        }
        if value_len > MAX_VALUE_BYTES {
            return Err(Error::BadBatchEntry {
                index,
                reason: format!(
                    "value of {} bytes exceeds maximum of {}",
                    value_len, MAX_VALUE_BYTES
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::Reply;
    use veldt_core::MAX_WORKER_THREADS;
    use veldt_engine::MemEngine;

    fn runtime() -> Runtime {
        Runtime::new(RuntimeConfig::default(), Arc::new(MemEngine::new())).unwrap()
    }

    fn open_db(rt: &Runtime, mailbox: &Mailbox, rx: &std::sync::mpsc::Receiver<crate::Envelope>) -> DbHandle {
        rt.open(mailbox, 1, "testdb", OpenOptions::default()).unwrap();
        match rx.recv().unwrap().reply {
            Reply::DbOpened(db) => db,
            other => panic!("expected DbOpened, got {:?}", other),
        }
    }

    #[test]
    fn test_config_error_is_fatal_at_init() {
        let bad = RuntimeConfig {
            worker_threads: 0,
            ..RuntimeConfig::default()
        };
        assert!(matches!(
            Runtime::new(bad, Arc::new(MemEngine::new())),
            Err(Error::Config(_))
        ));

        let bad = RuntimeConfig {
            worker_threads: MAX_WORKER_THREADS + 1,
            ..RuntimeConfig::default()
        };
        assert!(Runtime::new(bad, Arc::new(MemEngine::new())).is_err());
    }

    #[test]
    fn test_empty_path_rejected_synchronously() {
        let rt = runtime();
        let (mailbox, rx) = Mailbox::channel();
        assert!(matches!(
            rt.open(&mailbox, 1, "", OpenOptions::default()),
            Err(Error::InvalidArgument(_))
        ));
        rt.drain();
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_bad_batch_entry_reported_with_index() {
        let rt = runtime();
        let (mailbox, rx) = Mailbox::channel();
        let db = open_db(&rt, &mailbox, &rx);

        let mut batch = WriteBatch::new();
        batch.put(b"fine".to_vec(), b"v".to_vec());
        batch.put(vec![0u8; MAX_KEY_BYTES + 1], b"v".to_vec());

        match rt.write(&mailbox, 2, &db, batch, WriteOptions::default()) {
            Err(Error::BadBatchEntry { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected BadBatchEntry, got {:?}", other),
        }

        // Never reached a worker
        rt.drain();
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_closed_handle_rejected_synchronously() {
        let rt = runtime();
        let (mailbox, rx) = Mailbox::channel();
        let db = open_db(&rt, &mailbox, &rx);

        rt.close(&db);
        rt.close(&db); // idempotent

        assert!(matches!(
            rt.get(&mailbox, 2, &db, b"k".to_vec(), ReadOptions::default()),
            Err(Error::InvalidHandle)
        ));
        assert!(matches!(
            rt.write(&mailbox, 3, &db, WriteBatch::new(), WriteOptions::default()),
            Err(Error::InvalidHandle)
        ));
        assert!(matches!(
            rt.iterator(&mailbox, 4, &db, ReadOptions::default(), false),
            Err(Error::InvalidHandle)
        ));
        assert!(matches!(rt.property(&db, "veldt.num-entries"), Err(Error::InvalidHandle)));
    }

    #[test]
    fn test_sync_admin_operations() {
        let rt = runtime();
        let (mailbox, rx) = Mailbox::channel();
        let db = open_db(&rt, &mailbox, &rx);

        assert!(rt.is_empty(&db).unwrap());

        let mut batch = WriteBatch::new();
        batch.put(b"k".to_vec(), b"v".to_vec());
        rt.write(&mailbox, 2, &db, batch, WriteOptions::default())
            .unwrap();
        rt.drain();
        assert!(matches!(rx.recv().unwrap().reply, Reply::Written));

        assert!(!rt.is_empty(&db).unwrap());
        assert_eq!(
            rt.property(&db, "veldt.num-entries").unwrap().as_deref(),
            Some("1")
        );
        assert_eq!(rt.property(&db, "veldt.unknown").unwrap(), None);

        rt.repair(Path::new("testdb"), &OpenOptions::default()).unwrap();
        rt.destroy(Path::new("testdb"), &OpenOptions::default()).unwrap();
    }

    #[test]
    fn test_submission_after_shutdown_replies_with_error() {
        let rt = runtime();
        let (mailbox, rx) = Mailbox::channel();
        let db = open_db(&rt, &mailbox, &rx);

        rt.shutdown();

        // Queue refused: one error reply carrying the original token,
        // never a silent drop
        rt.get(&mailbox, 42, &db, b"k".to_vec(), ReadOptions::default())
            .unwrap();
        let env = rx.recv().unwrap();
        assert_eq!(env.token, 42);
        assert!(matches!(env.reply, Reply::Error(Error::SubmitFailed)));
    }
}
