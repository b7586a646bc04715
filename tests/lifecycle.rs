//! Handle lifecycle integration tests
//!
//! Close semantics, in-flight work surviving a close, queue saturation, and
//! teardown. The blocking cases use a gated stub engine so the test controls
//! exactly when a worker finishes.

#[path = "common/mod.rs"]
mod common;

use common::*;

use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use veldt::{
    Connection, Cursor, Engine, Error, Mailbox, MoveAction, OpenOptions, ReadOptions, Reply,
    Result, Runtime, RuntimeConfig, WriteBatch, WriteOptions,
};

/// One-shot latch: workers park in `wait` until the test calls `release`.
struct Gate {
    released: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    fn new() -> Arc<Self> {
        Arc::new(Gate {
            released: Mutex::new(false),
            cond: Condvar::new(),
        })
    }

    fn release(&self) {
        *self.released.lock().unwrap() = true;
        self.cond.notify_all();
    }

    fn wait(&self) {
        let mut released = self.released.lock().unwrap();
        while !*released {
            released = self.cond.wait(released).unwrap();
        }
    }
}

/// Connection whose reads block on the gate, then echo the key back.
struct GatedConn {
    gate: Arc<Gate>,
}

impl Connection for GatedConn {
    fn get(&self, key: &[u8], _opts: &ReadOptions) -> Result<Option<Vec<u8>>> {
        self.gate.wait();
        Ok(Some(key.to_vec()))
    }
    fn write(&self, _batch: &WriteBatch, _opts: &WriteOptions) -> Result<()> {
        self.gate.wait();
        Ok(())
    }
    fn cursor(&self, _opts: &ReadOptions) -> Result<Box<dyn Cursor>> {
        Err(Error::Engine("no cursors".to_string()))
    }
    fn property(&self, _name: &str) -> Option<String> {
        None
    }
}

struct GatedEngine {
    gate: Arc<Gate>,
}

impl Engine for GatedEngine {
    fn open(&self, _path: &Path, _opts: &OpenOptions) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(GatedConn {
            gate: Arc::clone(&self.gate),
        }))
    }
    fn destroy(&self, _path: &Path, _opts: &OpenOptions) -> Result<()> {
        Ok(())
    }
    fn repair(&self, _path: &Path, _opts: &OpenOptions) -> Result<()> {
        Ok(())
    }
}

fn gated_runtime(worker_threads: usize, max_queue_depth: usize) -> (Runtime, Arc<Gate>) {
    init_tracing();
    let gate = Gate::new();
    let engine = Arc::new(GatedEngine {
        gate: Arc::clone(&gate),
    });
    let config = RuntimeConfig {
        worker_threads,
        max_queue_depth,
    };
    (Runtime::new(config, engine).unwrap(), gate)
}

/// Spin until the queue is empty and exactly `active` items are executing,
/// so the test knows which item the worker is parked on.
fn wait_for_active(rt: &Runtime, active: usize) {
    let deadline = Instant::now() + RECV_TIMEOUT;
    loop {
        let stats = rt.stats();
        if stats.queue_depth == 0 && stats.active_items == active {
            return;
        }
        assert!(Instant::now() < deadline, "no worker picked up the item");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn close_defers_past_in_flight_work() {
    let (rt, gate) = gated_runtime(1, 16);
    let (mailbox, rx) = Mailbox::channel();
    let db = open_db(&rt, &mailbox, &rx, "gated");

    // The worker picks this up and parks on the gate
    rt.get(&mailbox, 1, &db, b"slow".to_vec(), ReadOptions::default())
        .unwrap();
    wait_for_active(&rt, 1);

    // Close returns immediately and rejects new submissions...
    rt.close(&db);
    assert!(db.is_closing());
    assert!(matches!(
        rt.get(&mailbox, 2, &db, b"k".to_vec(), ReadOptions::default()),
        Err(Error::InvalidHandle)
    ));

    // ...while the in-flight read completes normally once unblocked
    gate.release();
    rt.drain();
    let env = recv(&rx);
    assert_eq!(env.token, 1);
    assert!(matches!(env.reply, Reply::Value(v) if v == b"slow"));
}

#[test]
fn saturated_queue_replies_with_error() {
    let (rt, gate) = gated_runtime(1, 1);
    let (mailbox, rx) = Mailbox::channel();
    let db = open_db(&rt, &mailbox, &rx, "gated");

    // Occupy the single worker, then fill the single queue slot
    rt.get(&mailbox, 1, &db, b"first".to_vec(), ReadOptions::default())
        .unwrap();
    wait_for_active(&rt, 1);
    rt.get(&mailbox, 2, &db, b"second".to_vec(), ReadOptions::default())
        .unwrap();

    // The third submission is refused: one error envelope, original token,
    // delivered before any worker finishes
    rt.get(&mailbox, 3, &db, b"third".to_vec(), ReadOptions::default())
        .unwrap();
    let env = recv(&rx);
    assert_eq!(env.token, 3);
    assert!(matches!(env.reply, Reply::Error(Error::SubmitFailed)));

    // The accepted operations still complete
    gate.release();
    rt.drain();
    let mut tokens: Vec<u64> = rx.try_iter().map(|env| env.token).collect();
    tokens.sort_unstable();
    assert_eq!(tokens, vec![1, 2]);
}

#[test]
fn destroy_orphans_open_connections() {
    let rt = runtime();
    let (mailbox, rx) = Mailbox::channel();
    let db = open_db(&rt, &mailbox, &rx, "doomed");
    put(&rt, &mailbox, &rx, &db, b"k", b"v");

    rt.destroy(Path::new("doomed"), &OpenOptions::default())
        .unwrap();

    // The old handle keeps working against the orphaned state
    assert_eq!(get(&rt, &mailbox, &rx, &db, b"k"), Some(b"v".to_vec()));

    // The name is free again: reopening yields a fresh, empty database
    let fresh = open_db(&rt, &mailbox, &rx, "doomed");
    assert!(rt.is_empty(&fresh).unwrap());
}

#[test]
fn iterator_keeps_database_alive_past_close() {
    let rt = runtime();
    let (mailbox, rx) = Mailbox::channel();
    let db = open_db(&rt, &mailbox, &rx, "held_by_iter");
    put(&rt, &mailbox, &rx, &db, b"k", b"v");
    let iter = make_iterator(&rt, &mailbox, &rx, &db, false);

    rt.close(&db);

    // New database operations are rejected, but the iterator's snapshot
    // is unaffected
    assert!(matches!(
        rt.iterator(&mailbox, 9, &db, ReadOptions::default(), false),
        Err(Error::InvalidHandle)
    ));
    rt.iterator_move(&iter, MoveAction::First).unwrap();
    match recv(&rx).reply {
        Reply::Entry { key, .. } => assert_eq!(key, b"k"),
        other => panic!("expected Entry, got {:?}", other),
    }
}

#[test]
fn shutdown_is_idempotent_and_final() {
    let rt = runtime();
    let (mailbox, rx) = Mailbox::channel();
    let db = open_db(&rt, &mailbox, &rx, "teardown");
    put(&rt, &mailbox, &rx, &db, b"k", b"v");

    rt.shutdown();
    rt.shutdown();

    let stats = rt.stats();
    assert_eq!(stats.queue_depth, 0);
    assert_eq!(stats.active_items, 0);
    assert!(stats.items_completed >= 2);

    // Later submissions fail over to error envelopes
    rt.get(&mailbox, 7, &db, b"k".to_vec(), ReadOptions::default())
        .unwrap();
    let env = recv(&rx);
    assert_eq!(env.token, 7);
    assert!(matches!(env.reply, Reply::Error(Error::SubmitFailed)));
}
