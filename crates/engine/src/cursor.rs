//! Snapshot cursor over cloned entries
//!
//! The in-memory engine takes snapshots by deep-cloning the ordered map at
//! cursor creation. Expensive but correct: the cursor owns its data, never
//! sees later writes, and needs no coordination with the live store.
//!
//! A lazy, version-filtered cursor could replace this behind the same trait
//! without touching the facade.

use veldt_core::Cursor;

/// Position sentinel: the cursor is unpositioned or has run off either end.
const INVALID: usize = usize::MAX;

/// A bidirectional cursor over a point-in-time copy of the store.
///
/// Starts unpositioned; follows the `Cursor` trait contract (relative moves
/// are no-ops while invalid, `key`/`value` require `valid()`).
pub struct SnapshotCursor {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: usize,
}

impl SnapshotCursor {
    /// Build a cursor from entries already in ascending key order.
    pub(crate) fn new(entries: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        SnapshotCursor {
            entries,
            pos: INVALID,
        }
    }

    fn current(&self) -> &(Vec<u8>, Vec<u8>) {
        debug_assert!(self.valid(), "cursor accessed while invalid");
        &self.entries[self.pos]
    }
}

impl Cursor for SnapshotCursor {
    fn seek_to_first(&mut self) {
        self.pos = if self.entries.is_empty() { INVALID } else { 0 };
    }

    fn seek_to_last(&mut self) {
        self.pos = match self.entries.len() {
            0 => INVALID,
            n => n - 1,
        };
    }

    fn seek(&mut self, target: &[u8]) {
        let idx = self.entries.partition_point(|(k, _)| k.as_slice() < target);
        self.pos = if idx < self.entries.len() { idx } else { INVALID };
    }

    fn next(&mut self) {
        if self.valid() {
            let nxt = self.pos + 1;
            self.pos = if nxt < self.entries.len() { nxt } else { INVALID };
        }
    }

    fn prev(&mut self) {
        if self.valid() {
            self.pos = if self.pos > 0 { self.pos - 1 } else { INVALID };
        }
    }

    fn valid(&self) -> bool {
        self.pos < self.entries.len()
    }

    fn key(&self) -> &[u8] {
        &self.current().0
    }

    fn value(&self) -> &[u8] {
        &self.current().1
    }
}
