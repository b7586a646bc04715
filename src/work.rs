//! Work items
//!
//! One queued unit of asynchronous work: the caller's mailbox and token plus
//! a task tag over the five operation kinds. Workers dispatch by exhaustive
//! match, so adding a variant is a compile-time checklist rather than a
//! virtual-call hierarchy.
//!
//! Every executed item sends at most one reply; the only silent executions
//! are superseded or buffered iterator moves, whose reply obligation has
//! moved elsewhere (to the superseding move, or to the synchronous
//! prefetch-consume path).

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use veldt_core::{Engine, Error, OpenOptions, ReadOptions, WriteBatch, WriteOptions};

use crate::handle::DbHandle;
use crate::iter::{IterHandle, MoveTicket};
use crate::reply::{CallerToken, Mailbox, Reply};

/// Variant-specific payload of a work item.
pub(crate) enum Task {
    /// Open (or create) a database
    Open {
        path: PathBuf,
        opts: OpenOptions,
    },
    /// Apply a write batch atomically
    Write {
        db: DbHandle,
        batch: WriteBatch,
        opts: WriteOptions,
    },
    /// Point lookup
    Get {
        db: DbHandle,
        key: Vec<u8>,
        opts: ReadOptions,
    },
    /// Create a snapshot iterator
    CreateIterator {
        db: DbHandle,
        opts: ReadOptions,
        keys_only: bool,
    },
    /// Step an iterator (explicit or speculative)
    Move {
        iter: IterHandle,
        ticket: Arc<MoveTicket>,
    },
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Task::Open { .. } => "Open",
            Task::Write { .. } => "Write",
            Task::Get { .. } => "Get",
            Task::CreateIterator { .. } => "CreateIterator",
            Task::Move { .. } => "Move",
        })
    }
}

/// One queued unit of asynchronous work.
pub(crate) struct WorkItem {
    pub(crate) token: CallerToken,
    pub(crate) mailbox: Mailbox,
    pub(crate) task: Task,
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("token", &self.token)
            .field("task", &self.task)
            .finish()
    }
}

impl WorkItem {
    /// Dispose of an item the queue refused, fulfilling its reply obligation
    /// with an error so the caller is never left waiting.
    pub(crate) fn reject(self, err: Error) {
        self.mailbox.send(self.token, Reply::Error(err));
    }

    /// Execute on a worker thread. `resubmit` enqueues follow-up work (the
    /// chained prefetch) and hands the item back on failure.
    pub(crate) fn execute<F>(self, engine: &Arc<dyn Engine>, resubmit: F)
    where
        F: FnOnce(WorkItem) -> Result<(), WorkItem>,
    {
        let WorkItem {
            token,
            mailbox,
            task,
        } = self;

        let reply = match task {
            Task::Open { path, opts } => match engine.open(&path, &opts) {
                Ok(conn) => Reply::DbOpened(DbHandle::new(path, conn)),
                Err(e) => Reply::Error(e),
            },

            Task::Write { db, batch, opts } => {
                match db.connection().write(&batch, &opts) {
                    Ok(()) => Reply::Written,
                    Err(e) => Reply::Error(e),
                }
            }

            Task::Get { db, key, opts } => match db.connection().get(&key, &opts) {
                Ok(Some(value)) => Reply::Value(value),
                Ok(None) => Reply::NotFound,
                Err(e) => Reply::Error(e),
            },

            Task::CreateIterator {
                db,
                opts,
                keys_only,
            } => match db.connection().cursor(&opts) {
                Ok(cursor) => Reply::IteratorCreated(IterHandle::new(
                    db,
                    cursor,
                    keys_only,
                    mailbox.clone(),
                    token,
                )),
                Err(e) => Reply::Error(e),
            },

            Task::Move { iter, ticket } => {
                let done = iter.complete_move(&ticket);

                // Chain the speculative follow-up before the reply goes out,
                // so a caller reacting to the message finds the next
                // prefetch already in flight.
                if let Some(next) = done.resubmit {
                    let follow_up = WorkItem {
                        token,
                        mailbox: mailbox.clone(),
                        task: Task::Move {
                            iter: iter.clone(),
                            ticket: next,
                        },
                    };
                    if resubmit(follow_up).is_err() {
                        warn!(token, "prefetch resubmission refused; chain abandoned");
                        iter.abandon_move();
                    }
                }

                match done.reply {
                    Some(reply) => reply,
                    None => return, // buffered or superseded: no reply owed here
                }
            }
        };

        mailbox.send(token, reply);
    }
}
