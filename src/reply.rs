//! Completion delivery
//!
//! Every submitted operation owes its caller exactly one completion. The
//! caller hands in a `Mailbox` (the sending half of a channel) and an opaque
//! token; the facade sends one `Envelope` carrying that token verbatim plus
//! the result, on success and on failure alike. A caller that awaits its
//! mailbox never hangs on a submitted operation.
//!
//! Tokens are never interpreted by the core; they only let one mailbox
//! multiplex completions for many outstanding operations.

use std::sync::mpsc;

use tracing::trace;

use veldt_core::Error;

use crate::handle::DbHandle;
use crate::iter::IterHandle;

/// Opaque caller-supplied identity, copied verbatim into the reply.
pub type CallerToken = u64;

/// One completion message: the caller's token plus the operation result.
#[derive(Debug)]
pub struct Envelope {
    /// Token supplied at submission
    pub token: CallerToken,
    /// Operation result
    pub reply: Reply,
}

/// The sending half of a caller's completion channel.
///
/// Cheap to clone; one clone is captured per submission (and one per
/// iterator, reused for every move reply on that iterator).
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: mpsc::Sender<Envelope>,
}

impl Mailbox {
    /// Create a mailbox and the receiver the caller drains.
    pub fn channel() -> (Mailbox, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel();
        (Mailbox { tx }, rx)
    }

    /// Deliver one completion. A dropped receiver discards the completion;
    /// the send obligation is considered met either way.
    pub(crate) fn send(&self, token: CallerToken, reply: Reply) {
        if self.tx.send(Envelope { token, reply }).is_err() {
            trace!(token, "mailbox receiver dropped; completion discarded");
        }
    }
}

/// Result payload of one completed operation.
#[derive(Debug)]
pub enum Reply {
    /// Open succeeded; the new database handle
    DbOpened(DbHandle),
    /// Write batch applied
    Written,
    /// Point lookup found a value
    Value(Vec<u8>),
    /// Point lookup found nothing
    NotFound,
    /// Iterator created against a fresh snapshot
    IteratorCreated(IterHandle),
    /// Iterator move landed on an entry; `value` is `None` for keys-only
    /// iterators
    Entry {
        /// Key at the iterator's position
        key: Vec<u8>,
        /// Value at the iterator's position, unless keys-only
        value: Option<Vec<u8>>,
    },
    /// Iterator move ran off the end, off the front, or hit an erroring
    /// iterator; the handle remains usable for absolute moves
    InvalidIterator,
    /// The operation failed; see the error for which taxonomy class
    Error(Error),
}
