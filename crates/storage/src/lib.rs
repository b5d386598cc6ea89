//! Storage backends and triple indexes for the entailment core
//!
//! This crate provides a trait-based abstraction over column-family
//! key/value backends and the two higher-level stores built on top of it:
//!
//! 1. **`StorageBackend`**: `get`/`put`/`delete`/`write_batch`/`prefix_scan`
//!    over named column families, with atomic batches
//! 2. **`TripleIndex`**: the explicit-fact index kept in three permutation
//!    column families (`spo`, `pos`, `osp`)
//! 3. **`DerivedStore`**: the separate column family holding inferred
//!    triples, so entailments can be cleared and rebuilt without touching
//!    asserted data
//!
//! Keys are the 24-byte big-endian concatenation of three dictionary IDs,
//! so lexicographic key order equals tuple order and 8/16-byte prefixes
//! select by one or two leading positions.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod backend;
mod derived;
mod index;
/// Triple key encoding (24-byte big-endian ID concatenation)
pub mod keys;
mod memory;

#[cfg(feature = "rocksdb-backend")]
mod rocksdb_backend;

pub use backend::{
    BatchOp, ReadView, StorageBackend, StorageError, StorageResult, StorageStats, ALL_COLUMN_FAMILIES,
    CF_DERIVED, CF_OSP, CF_POS, CF_SPO,
};
pub use derived::DerivedStore;
pub use index::{IdPattern, PatternSlot, TripleIndex};
pub use keys::IdTriple;
pub use memory::MemoryBackend;

#[cfg(feature = "rocksdb-backend")]
pub use rocksdb_backend::RocksDbBackend;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_compiles() {
        let _backend = MemoryBackend::new();
    }
}
