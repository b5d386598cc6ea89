//! In-memory storage backend
//!
//! Zero-persistence backend used by tests, previews, and deployments that
//! can rebuild state on startup. One ordered map per column family so that
//! `prefix_scan` yields keys in ascending order, matching the persistent
//! backends.

use crate::backend::{
    BatchOp, ReadView, StorageBackend, StorageError, StorageResult, StorageStats,
    ALL_COLUMN_FAMILIES,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

type CfMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory storage backend.
///
/// Cloning shares the underlying storage, so the triple index and the
/// derived store can hold the same backend.
#[derive(Clone)]
pub struct MemoryBackend {
    /// One ordered keyspace per column family
    cfs: Arc<RwLock<Vec<CfMap>>>,

    /// Statistics
    stats: Arc<RwLock<StorageStats>>,
}

impl MemoryBackend {
    /// Create a new in-memory backend with all standard column families
    pub fn new() -> Self {
        Self {
            cfs: Arc::new(RwLock::new(vec![CfMap::new(); ALL_COLUMN_FAMILIES.len()])),
            stats: Arc::new(RwLock::new(StorageStats::default())),
        }
    }

    fn cf_index(cf: &str) -> StorageResult<usize> {
        ALL_COLUMN_FAMILIES
            .iter()
            .position(|&name| name == cf)
            .ok_or_else(|| StorageError::UnknownColumnFamily(cf.to_string()))
    }

    /// Total number of keys across all column families
    pub fn len(&self) -> usize {
        self.cfs.read().iter().map(BTreeMap::len).sum()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect_prefix(cfs: &[CfMap], cf: &str, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let idx = Self::cf_index(cf)?;
        let map = &cfs[idx];
        let pairs = map
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(pairs)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, cf: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let idx = Self::cf_index(cf)?;
        let value = self.cfs.read()[idx].get(key).cloned();
        self.stats.write().reads += 1;
        Ok(value)
    }

    fn put(&self, cf: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let idx = Self::cf_index(cf)?;
        self.cfs.write()[idx].insert(key.to_vec(), value.to_vec());
        let mut stats = self.stats.write();
        stats.writes += 1;
        stats.key_count = self.len() as u64;
        Ok(())
    }

    fn delete(&self, cf: &str, key: &[u8]) -> StorageResult<()> {
        let idx = Self::cf_index(cf)?;
        self.cfs.write()[idx].remove(key);
        let mut stats = self.stats.write();
        stats.deletes += 1;
        stats.key_count = self.len() as u64;
        Ok(())
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> StorageResult<()> {
        // Resolve all column families up front so a bad op cannot leave the
        // batch half-applied.
        let resolved: Vec<(usize, BatchOp)> = ops
            .into_iter()
            .map(|op| {
                let cf = match &op {
                    BatchOp::Put { cf, .. } | BatchOp::Delete { cf, .. } => cf,
                };
                Self::cf_index(cf).map(|idx| (idx, op))
            })
            .collect::<StorageResult<_>>()?;

        let op_count = resolved.len() as u64;
        let mut cfs = self.cfs.write();
        for (idx, op) in resolved {
            match op {
                BatchOp::Put { key, value, .. } => {
                    cfs[idx].insert(key, value);
                }
                BatchOp::Delete { key, .. } => {
                    cfs[idx].remove(&key);
                }
            }
        }
        let key_count: usize = cfs.iter().map(BTreeMap::len).sum();
        drop(cfs);

        let mut stats = self.stats.write();
        stats.writes += op_count;
        stats.key_count = key_count as u64;
        Ok(())
    }

    fn prefix_scan<'a>(
        &'a self,
        cf: &str,
        prefix: &[u8],
    ) -> StorageResult<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>> {
        // Materialized under the read lock; the lock is not held while the
        // caller consumes the iterator.
        let pairs = Self::collect_prefix(&self.cfs.read(), cf, prefix)?;
        self.stats.write().reads += 1;
        Ok(Box::new(pairs.into_iter()))
    }

    fn snapshot<'a>(&'a self) -> StorageResult<Box<dyn ReadView + 'a>> {
        Ok(Box::new(MemorySnapshot {
            cfs: self.cfs.read().clone(),
        }))
    }

    fn stats(&self) -> StorageStats {
        self.stats.read().clone()
    }
}

/// Point-in-time copy of the backend state.
struct MemorySnapshot {
    cfs: Vec<CfMap>,
}

impl ReadView for MemorySnapshot {
    fn get(&self, cf: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let idx = MemoryBackend::cf_index(cf)?;
        Ok(self.cfs[idx].get(key).cloned())
    }

    fn prefix_scan<'a>(
        &'a self,
        cf: &str,
        prefix: &[u8],
    ) -> StorageResult<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>> {
        let pairs = MemoryBackend::collect_prefix(&self.cfs, cf, prefix)?;
        Ok(Box::new(pairs.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CF_DERIVED, CF_SPO};

    #[test]
    fn test_basic_operations() {
        let db = MemoryBackend::new();

        db.put(CF_SPO, b"key1", b"value1").unwrap();
        db.put(CF_SPO, b"key2", b"value2").unwrap();

        assert_eq!(db.get(CF_SPO, b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(db.get(CF_SPO, b"key3").unwrap(), None);
        assert!(db.exists(CF_SPO, b"key1").unwrap());

        // Column families are separate keyspaces
        assert_eq!(db.get(CF_DERIVED, b"key1").unwrap(), None);

        db.delete(CF_SPO, b"key1").unwrap();
        assert_eq!(db.get(CF_SPO, b"key1").unwrap(), None);
    }

    #[test]
    fn test_unknown_cf_rejected() {
        let db = MemoryBackend::new();
        assert!(db.get("nope", b"k").is_err());
    }

    #[test]
    fn test_prefix_scan_ordered() {
        let db = MemoryBackend::new();
        db.put(CF_SPO, b"ab2", b"").unwrap();
        db.put(CF_SPO, b"ab1", b"").unwrap();
        db.put(CF_SPO, b"ac1", b"").unwrap();

        let keys: Vec<_> = db
            .prefix_scan(CF_SPO, b"ab")
            .unwrap()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"ab1".to_vec(), b"ab2".to_vec()]);
    }

    #[test]
    fn test_write_batch_applies_all() {
        let db = MemoryBackend::new();
        db.put(CF_SPO, b"old", b"").unwrap();

        db.write_batch(vec![
            BatchOp::Put {
                cf: CF_SPO,
                key: b"new".to_vec(),
                value: b"".to_vec(),
            },
            BatchOp::Delete {
                cf: CF_SPO,
                key: b"old".to_vec(),
            },
            BatchOp::Put {
                cf: CF_DERIVED,
                key: b"d".to_vec(),
                value: b"".to_vec(),
            },
        ])
        .unwrap();

        assert!(db.exists(CF_SPO, b"new").unwrap());
        assert!(!db.exists(CF_SPO, b"old").unwrap());
        assert!(db.exists(CF_DERIVED, b"d").unwrap());
    }

    #[test]
    fn test_snapshot_isolated_from_writes() {
        let db = MemoryBackend::new();
        db.put(CF_SPO, b"k", b"v").unwrap();

        let snap = db.snapshot().unwrap();
        db.put(CF_SPO, b"k2", b"v2").unwrap();
        db.delete(CF_SPO, b"k").unwrap();

        assert_eq!(snap.get(CF_SPO, b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(snap.get(CF_SPO, b"k2").unwrap(), None);
    }

    #[test]
    fn test_stats_tracking() {
        let db = MemoryBackend::new();
        db.put(CF_SPO, b"a", b"").unwrap();
        db.get(CF_SPO, b"a").unwrap();
        db.delete(CF_SPO, b"a").unwrap();

        let stats = db.stats();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.reads, 1);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.key_count, 0);
    }
}
