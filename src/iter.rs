//! Iterator handles and the move/prefetch protocol
//!
//! An `IterHandle` owns a snapshot cursor plus the state that coordinates a
//! caller issuing move requests with a worker thread that may have already
//! advanced the cursor speculatively.
//!
//! # Protocol states
//!
//! The caller/worker race is adjudicated by four explicit states, held in a
//! single `AtomicU8` and only ever changed by compare-exchange or by the
//! thread that currently owns the transition:
//!
//! - `Idle`: no move in flight, no buffered result
//! - `AwaitingReply`: a move is queued or executing and its result is owed
//!   to the caller as a message
//! - `PrefetchInFlight`: a speculative move is queued or executing; nobody
//!   is waiting for it yet
//! - `PrefetchReady`: a speculative move finished and its result is buffered
//!   at the cursor position
//!
//! The contended edges are `PrefetchInFlight -> AwaitingReply` (caller claims
//! the running prefetch) versus `PrefetchInFlight -> PrefetchReady` (worker
//! buffers the finished prefetch): compare-exchange guarantees exactly one
//! side wins, so every request gets either one synchronous result or one
//! message, never both and never neither.
//!
//! # Single-flight
//!
//! At most one move is outstanding per iterator, enforced by the `pending`
//! ticket slot. Superseding a move cancels its ticket; a worker re-checks
//! cancellation around the cursor step, so a superseded move never sends a
//! stale reply. The cursor itself sits behind a mutex, so even a cancelled
//! straggler cannot step it concurrently with its successor.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use veldt_core::{Cursor, Error, Result};

use crate::handle::DbHandle;
use crate::reply::{CallerToken, Mailbox, Reply};

/// How to move an iterator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveAction {
    /// Position at the first entry
    First,
    /// Position at the last entry
    Last,
    /// Advance one entry
    Next,
    /// Step back one entry
    Prev,
    /// Consume the speculatively-advanced position (or start speculating)
    Prefetch,
    /// Position at the first entry with key >= target
    Seek(Vec<u8>),
}

impl MoveAction {
    fn is_prefetch(&self) -> bool {
        matches!(self, MoveAction::Prefetch)
    }
}

/// How a move request was resolved at submission time.
#[derive(Debug)]
pub enum MoveOutcome {
    /// The result will arrive as exactly one mailbox message
    Queued,
    /// The result was already buffered and is returned synchronously;
    /// no message will follow for this request
    Ready(Reply),
}

// Protocol states (AtomicU8 values)
const IDLE: u8 = 0;
const AWAITING_REPLY: u8 = 1;
const PREFETCH_IN_FLIGHT: u8 = 2;
const PREFETCH_READY: u8 = 3;

/// One queued move. Cancelled when a newer move supersedes it; the worker
/// holds its own strong reference, so cancellation never races destruction.
pub(crate) struct MoveTicket {
    pub(crate) action: MoveAction,
    cancelled: AtomicBool,
}

impl MoveTicket {
    fn new(action: MoveAction) -> Arc<Self> {
        Arc::new(MoveTicket {
            action,
            cancelled: AtomicBool::new(false),
        })
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// What the dispatch layer must do with a planned move.
pub(crate) enum MovePlan {
    /// Submit this ticket to the pool; reply arrives as a message
    Submit(Arc<MoveTicket>),
    /// A move already in flight owes the reply; submit nothing
    Await,
    /// Buffered prefetch consumed synchronously; submit `next` to keep one
    /// prefetch running ahead
    Ready {
        /// The synchronous reply
        reply: Reply,
        /// The next speculative move to submit
        next: Arc<MoveTicket>,
    },
}

/// Outcome of executing a move on a worker thread.
pub(crate) struct MoveCompletion {
    /// Reply to send, if this move still owes one
    pub(crate) reply: Option<Reply>,
    /// Follow-up speculative move to enqueue before the reply goes out
    pub(crate) resubmit: Option<Arc<MoveTicket>>,
}

impl MoveCompletion {
    fn silent() -> Self {
        MoveCompletion {
            reply: None,
            resubmit: None,
        }
    }
}

struct IterInner {
    db: DbHandle,
    cursor: Mutex<Box<dyn Cursor>>,
    keys_only: bool,
    state: AtomicU8,
    pending: Mutex<Option<Arc<MoveTicket>>>,
    closing: AtomicBool,
    mailbox: Mailbox,
    token: CallerToken,
}

/// A handle to one snapshot iterator.
///
/// Created by a `CreateIterator` work item; all moves on it reply to the
/// mailbox and token captured at creation. Cloneable and closeable like a
/// database handle; the iterator keeps its database alive.
#[derive(Clone)]
pub struct IterHandle {
    inner: Arc<IterInner>,
}

impl IterHandle {
    pub(crate) fn new(
        db: DbHandle,
        cursor: Box<dyn Cursor>,
        keys_only: bool,
        mailbox: Mailbox,
        token: CallerToken,
    ) -> Self {
        IterHandle {
            inner: Arc::new(IterInner {
                db,
                cursor: Mutex::new(cursor),
                keys_only,
                state: AtomicU8::new(IDLE),
                pending: Mutex::new(None),
                closing: AtomicBool::new(false),
                mailbox,
                token,
            }),
        }
    }

    /// True when moves reply with keys only.
    pub fn keys_only(&self) -> bool {
        self.inner.keys_only
    }

    /// True once `close` has been requested.
    pub fn is_closing(&self) -> bool {
        self.inner.closing.load(Ordering::Acquire)
    }

    /// The database this iterator reads from.
    pub fn db(&self) -> &DbHandle {
        &self.inner.db
    }

    /// Request close. Never blocks; idempotent. Cancels any pending move;
    /// the cursor and the reference to the database are released when the
    /// last clone (including clones held by in-flight moves) drops.
    pub fn close(&self) {
        if !self.inner.closing.swap(true, Ordering::AcqRel) {
            if let Some(old) = self.inner.pending.lock().take() {
                old.cancel();
            }
        }
    }

    pub(crate) fn mailbox(&self) -> &Mailbox {
        &self.inner.mailbox
    }

    pub(crate) fn token(&self) -> CallerToken {
        self.inner.token
    }

    /// Caller side of the protocol: resolve a move request into a plan.
    pub(crate) fn plan_move(&self, action: MoveAction) -> Result<MovePlan> {
        if self.is_closing() {
            return Err(Error::InvalidHandle);
        }
        let inner = &self.inner;

        if !action.is_prefetch() {
            // Explicit move: abandon the prefetch chain. Cancel before
            // flagging AwaitingReply so a straggling prefetch worker that
            // observes the new state also observes its cancellation.
            let ticket = self.install_ticket(action);
            inner.state.store(AWAITING_REPLY, Ordering::Release);
            return Ok(MovePlan::Submit(ticket));
        }

        loop {
            match inner.state.load(Ordering::Acquire) {
                PREFETCH_READY => {
                    if inner
                        .state
                        .compare_exchange(
                            PREFETCH_READY,
                            PREFETCH_IN_FLIGHT,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        // We won the buffered result: reply synchronously
                        // and keep a prefetch running ahead.
                        let reply = self.reply_at_cursor();
                        let next = self.install_ticket(MoveAction::Prefetch);
                        return Ok(MovePlan::Ready { reply, next });
                    }
                }
                PREFETCH_IN_FLIGHT => {
                    if inner
                        .state
                        .compare_exchange(
                            PREFETCH_IN_FLIGHT,
                            AWAITING_REPLY,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        // Claimed the running prefetch; its completion will
                        // be delivered as our message.
                        return Ok(MovePlan::Await);
                    }
                }
                IDLE => {
                    // First prefetch of a chain.
                    let ticket = self.install_ticket(MoveAction::Prefetch);
                    inner.state.store(AWAITING_REPLY, Ordering::Release);
                    return Ok(MovePlan::Submit(ticket));
                }
                _ => {
                    // AwaitingReply: a reply is already owed for this
                    // iterator; issuing another prefetch adds no work.
                    return Ok(MovePlan::Await);
                }
            }
            // Lost a race; the state has moved on. Re-read and retry.
        }
    }

    /// Worker side of the protocol: step the cursor and decide how (and
    /// whether) to reply.
    pub(crate) fn complete_move(&self, ticket: &Arc<MoveTicket>) -> MoveCompletion {
        let inner = &self.inner;
        let reply = {
            let mut cursor = inner.cursor.lock();
            if ticket.is_cancelled() {
                return MoveCompletion::silent();
            }
            match &ticket.action {
                MoveAction::First => cursor.seek_to_first(),
                MoveAction::Last => cursor.seek_to_last(),
                MoveAction::Seek(target) => cursor.seek(target),
                MoveAction::Next | MoveAction::Prefetch => {
                    if cursor.valid() {
                        cursor.next();
                    }
                }
                MoveAction::Prev => {
                    if cursor.valid() {
                        cursor.prev();
                    }
                }
            }
            Self::reply_from(&**cursor, inner.keys_only)
        };

        if ticket.is_cancelled() {
            // Superseded mid-step; the successor owes the reply now.
            return MoveCompletion::silent();
        }

        if ticket.action.is_prefetch() {
            if inner
                .state
                .compare_exchange(
                    PREFETCH_IN_FLIGHT,
                    PREFETCH_READY,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                // Nobody asked yet: the result stays buffered at the cursor.
                return MoveCompletion::silent();
            }
            if ticket.is_cancelled() {
                // An explicit move superseded us between the step and the
                // exchange; it owes the reply.
                return MoveCompletion::silent();
            }
            // A caller claimed this prefetch (AwaitingReply). Chain the next
            // speculative move before the message goes out so the caller can
            // never observe a gap in the prefetch pipeline. The swap happens
            // under the pending lock, and only if the slot still holds this
            // ticket; otherwise an explicit move took the slot inside the
            // completion window and owns the reply now.
            let next = MoveTicket::new(MoveAction::Prefetch);
            {
                let mut pending = inner.pending.lock();
                match pending.as_ref() {
                    Some(current) if Arc::ptr_eq(current, ticket) => {
                        *pending = Some(Arc::clone(&next));
                    }
                    _ => return MoveCompletion::silent(),
                }
                inner.state.store(PREFETCH_IN_FLIGHT, Ordering::Release);
            }
            return MoveCompletion {
                reply: Some(reply),
                resubmit: Some(next),
            };
        }

        // Explicit move: replied by message, unless a newer move took the
        // slot inside the completion window and owns the reply now.
        if !self.clear_ticket(ticket) {
            return MoveCompletion::silent();
        }
        inner.state.store(IDLE, Ordering::Release);
        MoveCompletion {
            reply: Some(reply),
            resubmit: None,
        }
    }

    /// Tear down speculative state after a failed prefetch resubmission, so
    /// the next prefetch request starts a fresh chain instead of waiting for
    /// a message that will never come.
    pub(crate) fn abandon_move(&self) {
        if let Some(old) = self.inner.pending.lock().take() {
            old.cancel();
        }
        self.inner.state.store(IDLE, Ordering::Release);
    }

    /// True while a move ticket is outstanding for this iterator.
    pub(crate) fn has_pending_move(&self) -> bool {
        self.inner.pending.lock().is_some()
    }

    /// Build the synchronous reply for a consumed buffered prefetch.
    fn reply_at_cursor(&self) -> Reply {
        let cursor = self.inner.cursor.lock();
        Self::reply_from(&**cursor, self.inner.keys_only)
    }

    fn reply_from(cursor: &dyn Cursor, keys_only: bool) -> Reply {
        if cursor.valid() {
            Reply::Entry {
                key: cursor.key().to_vec(),
                value: (!keys_only).then(|| cursor.value().to_vec()),
            }
        } else {
            Reply::InvalidIterator
        }
    }

    /// Install a fresh ticket in the single-flight slot, cancelling and
    /// releasing whatever it held.
    fn install_ticket(&self, action: MoveAction) -> Arc<MoveTicket> {
        let ticket = MoveTicket::new(action);
        let mut pending = self.inner.pending.lock();
        if let Some(old) = pending.take() {
            old.cancel();
        }
        *pending = Some(Arc::clone(&ticket));
        ticket
    }

    /// Release the slot if it still holds this ticket; false means a newer
    /// move (or a close) has taken it.
    fn clear_ticket(&self, ticket: &Arc<MoveTicket>) -> bool {
        let mut pending = self.inner.pending.lock();
        match pending.as_ref() {
            Some(current) if Arc::ptr_eq(current, ticket) => {
                *pending = None;
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for IterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterHandle")
            .field("db", &self.inner.db.path())
            .field("keys_only", &self.inner.keys_only)
            .field("closing", &self.is_closing())
            .finish()
    }
}
