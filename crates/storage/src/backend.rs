//! Storage backend trait abstraction
//!
//! Provides a unified column-family interface that works across different
//! storage implementations. Batches are atomic: concurrent readers observe
//! either none or all of a batch's operations.

use std::fmt;

/// Explicit-fact index, subject-predicate-object order
pub const CF_SPO: &str = "spo";
/// Explicit-fact index, predicate-object-subject order
pub const CF_POS: &str = "pos";
/// Explicit-fact index, object-subject-predicate order
pub const CF_OSP: &str = "osp";
/// Inferred triples, subject-predicate-object order
pub const CF_DERIVED: &str = "derived";

/// Every column family a backend must provide
pub const ALL_COLUMN_FAMILIES: [&str; 4] = [CF_SPO, CF_POS, CF_OSP, CF_DERIVED];

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Unknown column family name
    #[error("Unknown column family: {0}")]
    UnknownColumnFamily(String),

    /// I/O error (file system, network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed key bytes
    #[error("Corrupt key: expected {expected} bytes, got {actual}")]
    CorruptKey {
        /// Expected key length
        expected: usize,
        /// Observed key length
        actual: usize,
    },

    /// Backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),
}

/// One operation inside an atomic write batch
#[derive(Debug, Clone)]
pub enum BatchOp {
    /// Insert or overwrite a key
    Put {
        /// Target column family
        cf: &'static str,
        /// Key bytes
        key: Vec<u8>,
        /// Value bytes (empty for index entries)
        value: Vec<u8>,
    },
    /// Delete a key; absent keys are a no-op
    Delete {
        /// Target column family
        cf: &'static str,
        /// Key bytes
        key: Vec<u8>,
    },
}

/// Abstract storage backend over named column families.
///
/// Implementations must be thread-safe; mutation goes through `&self` so a
/// backend can be shared behind an `Arc` between the triple index and the
/// derived store.
pub trait StorageBackend: Send + Sync {
    /// Get a value by key
    fn get(&self, cf: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Put a key-value pair
    fn put(&self, cf: &str, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Delete a key (no-op when absent)
    fn delete(&self, cf: &str, key: &[u8]) -> StorageResult<()>;

    /// Check if a key exists
    fn exists(&self, cf: &str, key: &[u8]) -> StorageResult<bool> {
        Ok(self.get(cf, key)?.is_some())
    }

    /// Apply a batch of operations atomically.
    fn write_batch(&self, ops: Vec<BatchOp>) -> StorageResult<()>;

    /// Scan all `(key, value)` pairs whose key starts with `prefix`, in
    /// key-ascending order.
    ///
    /// The returned iterator is single-pass; consumers should drop it
    /// promptly so backend cursors are released.
    fn prefix_scan<'a>(
        &'a self,
        cf: &str,
        prefix: &[u8],
    ) -> StorageResult<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>>;

    /// A read view isolated from concurrent writes.
    fn snapshot<'a>(&'a self) -> StorageResult<Box<dyn ReadView + 'a>>;

    /// Get storage statistics
    fn stats(&self) -> StorageStats {
        StorageStats::default()
    }
}

/// Read-only view of a backend at a point in time.
pub trait ReadView {
    /// Get a value by key
    fn get(&self, cf: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Prefix scan within the view, key-ascending
    fn prefix_scan<'a>(
        &'a self,
        cf: &str,
        prefix: &[u8],
    ) -> StorageResult<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>>;
}

/// Storage statistics
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    /// Total number of keys across all column families
    pub key_count: u64,
    /// Number of read operations
    pub reads: u64,
    /// Number of write operations
    pub writes: u64,
    /// Number of delete operations
    pub deletes: u64,
}

impl fmt::Display for StorageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StorageStats {{ keys: {}, reads: {}, writes: {}, deletes: {} }}",
            self.key_count, self.reads, self.writes, self.deletes
        )
    }
}
