//! Process-wide immutable snapshot registries
//!
//! Compiled rule sets and TBox hierarchies are published as `Arc`'d
//! immutable snapshots keyed by an opaque ontology identifier. Readers
//! clone the `Arc` and never block publication; publication replaces the
//! entry atomically, so no reader ever observes a torn snapshot.
//!
//! Keys must never be derived from untrusted input; the capacity cap is a
//! backstop against registry exhaustion, not a substitute for that rule.

use crate::{ReasoningError, ReasoningResult};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Default maximum number of live keys per registry.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 1024;

/// Snapshots that carry a version identifier for staleness checks.
pub trait Versioned {
    /// The snapshot's version
    fn version(&self) -> u64;
}

/// A keyed registry of immutable snapshots.
pub struct SnapshotRegistry<T> {
    entries: RwLock<FxHashMap<String, Arc<T>>>,
    capacity: usize,
}

impl<T> SnapshotRegistry<T> {
    /// Create a registry with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REGISTRY_CAPACITY)
    }

    /// Create a registry with an explicit capacity cap
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            capacity,
        }
    }

    /// Publish a snapshot under a key, replacing any previous one.
    pub fn store(&self, key: &str, value: T) -> ReasoningResult<Arc<T>> {
        let snapshot = Arc::new(value);
        let mut entries = self.entries.write();
        if !entries.contains_key(key) && entries.len() >= self.capacity {
            return Err(ReasoningError::RegistryFull(self.capacity));
        }
        entries.insert(key.to_string(), Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Load the snapshot for a key. A miss is a domain value, not an error.
    pub fn load(&self, key: &str) -> Option<Arc<T>> {
        self.entries.read().get(key).cloned()
    }

    /// Remove and return the snapshot for a key
    pub fn remove(&self, key: &str) -> Option<Arc<T>> {
        self.entries.write().remove(key)
    }

    /// Check if a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// All live keys
    pub fn list_keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Drop every snapshot
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T: Versioned> SnapshotRegistry<T> {
    /// True whenever the stored version differs from the caller-held one,
    /// including when the key is gone entirely.
    pub fn is_stale(&self, key: &str, expected_version: u64) -> bool {
        match self.load(key) {
            Some(snapshot) => snapshot.version() != expected_version,
            None => true,
        }
    }
}

impl<T> Default for SnapshotRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
