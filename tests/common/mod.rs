//! Shared test utilities for the integration test suites.
//!
//! Import via `#[path = "common/mod.rs"] mod common;` from any test file.

#![allow(dead_code)]

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Once};
use std::time::Duration;

use veldt::{
    DbHandle, Envelope, IterHandle, Mailbox, OpenOptions, ReadOptions, Reply, Runtime,
    RuntimeConfig, WriteBatch, WriteOptions,
};
use veldt_engine::MemEngine;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

static INIT_TRACING: Once = Once::new();

/// Route facade logs through the test harness (visible with --nocapture).
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

pub fn runtime() -> Runtime {
    init_tracing();
    Runtime::new(RuntimeConfig::default(), Arc::new(MemEngine::new())).unwrap()
}

pub fn runtime_with(worker_threads: usize, max_queue_depth: usize) -> Runtime {
    init_tracing();
    let config = RuntimeConfig {
        worker_threads,
        max_queue_depth,
    };
    Runtime::new(config, Arc::new(MemEngine::new())).unwrap()
}

/// Receive one envelope, failing loudly instead of hanging the suite.
pub fn recv(rx: &Receiver<Envelope>) -> Envelope {
    rx.recv_timeout(RECV_TIMEOUT).expect("reply never arrived")
}

pub fn open_db(rt: &Runtime, mailbox: &Mailbox, rx: &Receiver<Envelope>, path: &str) -> DbHandle {
    rt.open(mailbox, 0, path, OpenOptions::default()).unwrap();
    match recv(rx).reply {
        Reply::DbOpened(db) => db,
        other => panic!("expected DbOpened, got {:?}", other),
    }
}

/// Apply one batch and wait for the `Written` acknowledgement.
pub fn write_batch(
    rt: &Runtime,
    mailbox: &Mailbox,
    rx: &Receiver<Envelope>,
    db: &DbHandle,
    batch: WriteBatch,
) {
    rt.write(mailbox, 0, db, batch, WriteOptions::default())
        .unwrap();
    match recv(rx).reply {
        Reply::Written => {}
        other => panic!("expected Written, got {:?}", other),
    }
}

pub fn put(rt: &Runtime, mailbox: &Mailbox, rx: &Receiver<Envelope>, db: &DbHandle, key: &[u8], value: &[u8]) {
    let mut batch = WriteBatch::new();
    batch.put(key.to_vec(), value.to_vec());
    write_batch(rt, mailbox, rx, db, batch);
}

pub fn get(
    rt: &Runtime,
    mailbox: &Mailbox,
    rx: &Receiver<Envelope>,
    db: &DbHandle,
    key: &[u8],
) -> Option<Vec<u8>> {
    rt.get(mailbox, 0, db, key.to_vec(), ReadOptions::default())
        .unwrap();
    match recv(rx).reply {
        Reply::Value(v) => Some(v),
        Reply::NotFound => None,
        other => panic!("expected Value or NotFound, got {:?}", other),
    }
}

pub fn make_iterator(
    rt: &Runtime,
    mailbox: &Mailbox,
    rx: &Receiver<Envelope>,
    db: &DbHandle,
    keys_only: bool,
) -> IterHandle {
    rt.iterator(mailbox, 0, db, ReadOptions::default(), keys_only)
        .unwrap();
    match recv(rx).reply {
        Reply::IteratorCreated(iter) => iter,
        other => panic!("expected IteratorCreated, got {:?}", other),
    }
}
