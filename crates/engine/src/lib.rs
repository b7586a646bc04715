//! Default in-memory storage engine for veldt
//!
//! Implements the `veldt-core` engine traits with:
//! - `MemEngine`: path-keyed registry of independent stores (DashMap)
//! - ordered stores (`BTreeMap` + `parking_lot::RwLock`) with atomic batches
//! - `SnapshotCursor`: point-in-time cursors via deep clone
//!
//! This backend exists so the facade is usable (and testable) without any
//! on-disk engine; a persistent engine plugs in behind the same traits.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
pub mod store;

pub use cursor::SnapshotCursor;
pub use store::MemEngine;
