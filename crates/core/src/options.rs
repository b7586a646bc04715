//! Options structs and write batches
//!
//! Plain-data knobs handed through the facade to the engine, mirroring the
//! usual embedded-engine surface: open-time tuning, per-read flags, and a
//! per-write sync flag. Engines are free to ignore knobs that do not apply
//! to them.
//!
//! `WriteBatch` is the ordered unit of write work: a builder accumulating
//! put/delete operations that the engine applies atomically as a whole.

/// Options applied when opening (or creating) a database.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Create the database if it does not already exist
    pub create_if_missing: bool,
    /// Fail the open if the database already exists
    pub error_if_exists: bool,
    /// Aggressive internal consistency checking
    pub paranoid_checks: bool,
    /// Memtable budget in bytes, if the engine has one
    pub write_buffer_size: Option<usize>,
    /// File-descriptor budget, if the engine has one
    pub max_open_files: Option<i32>,
    /// On-disk table block size in bytes
    pub sst_block_size: Option<usize>,
    /// Restart-point interval within a table block
    pub block_restart_interval: Option<i32>,
    /// Block cache capacity in bytes; zero disables the cache
    pub cache_size: Option<usize>,
    /// Compress table blocks
    pub compression: bool,
    /// Bloom filter bits per key; `None` disables the filter
    pub bloom_bits_per_key: Option<u32>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            create_if_missing: true,
            error_if_exists: false,
            paranoid_checks: false,
            write_buffer_size: None,
            max_open_files: None,
            sst_block_size: None,
            block_restart_interval: None,
            cache_size: None,
            compression: true,
            bloom_bits_per_key: Some(16),
        }
    }
}

/// Options applied to reads (point lookups and iterator creation).
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Verify block checksums on every read
    pub verify_checksums: bool,
    /// Populate the block cache with data read
    pub fill_cache: bool,
}

/// Options applied to write batches.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Force the write to stable storage before replying
    pub sync: bool,
}

/// A single operation within a write batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Store `value` under `key`, replacing any existing value
    Put {
        /// Key bytes
        key: Vec<u8>,
        /// Value bytes
        value: Vec<u8>,
    },
    /// Remove `key` if present
    Delete {
        /// Key bytes
        key: Vec<u8>,
    },
}

/// An ordered batch of put/delete operations, applied atomically.
///
/// `clear` discards everything accumulated so far, so a batch can be
/// rebuilt mid-construction without reallocating.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        WriteBatch::default()
    }

    /// Append a put operation
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Append a delete operation
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Delete { key: key.into() });
        self
    }

    /// Discard all operations accumulated so far
    pub fn clear(&mut self) -> &mut Self {
        self.ops.clear();
        self
    }

    /// Number of operations in the batch
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when the batch holds no operations
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The operations in application order
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_options_defaults() {
        let opts = OpenOptions::default();
        assert!(opts.create_if_missing);
        assert!(!opts.error_if_exists);
        assert_eq!(opts.bloom_bits_per_key, Some(16));
    }

    #[test]
    fn test_batch_order_preserved() {
        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.delete(b"b".to_vec());
        batch.put(b"c".to_vec(), b"3".to_vec());

        assert_eq!(batch.len(), 3);
        assert!(matches!(batch.ops()[0], BatchOp::Put { .. }));
        assert!(matches!(batch.ops()[1], BatchOp::Delete { .. }));
        assert!(matches!(batch.ops()[2], BatchOp::Put { .. }));
    }

    #[test]
    fn test_batch_clear_discards_pending_ops() {
        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.clear();
        assert!(batch.is_empty());

        // Ops appended after a clear survive
        batch.put(b"b".to_vec(), b"2".to_vec());
        assert_eq!(batch.len(), 1);
    }
}
