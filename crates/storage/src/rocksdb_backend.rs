//! RocksDB persistent storage backend
//!
//! LSM-tree based storage with atomic write batches, compression, and
//! crash recovery. Each logical column family maps to a RocksDB column
//! family created at open time.

use crate::backend::{
    BatchOp, ReadView, StorageBackend, StorageError, StorageResult, StorageStats,
    ALL_COLUMN_FAMILIES,
};
use parking_lot::RwLock;
use rocksdb::{
    ColumnFamilyDescriptor, DBCompressionType, Direction, IteratorMode, Options, WriteBatch, DB,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// RocksDB storage backend.
///
/// Cloning shares the database handle.
#[derive(Clone)]
pub struct RocksDbBackend {
    /// RocksDB database handle (thread-safe)
    db: Arc<DB>,

    /// Database path on disk
    path: PathBuf,

    /// Statistics
    stats: Arc<RwLock<StorageStats>>,
}

impl RocksDbBackend {
    /// Open (or create) a database at the specified path with all standard
    /// column families.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(1000);
        opts.set_keep_log_file_num(10);
        opts.set_max_background_jobs(4);
        opts.set_compression_type(DBCompressionType::Snappy);

        let cf_descriptors: Vec<_> = ALL_COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &path, cf_descriptors)
            .map_err(|e| StorageError::Backend(format!("Failed to open RocksDB: {e}")))?;

        Ok(Self {
            db: Arc::new(db),
            path,
            stats: Arc::new(RwLock::new(StorageStats::default())),
        })
    }

    /// Get the database path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cf_handle(&self, cf: &str) -> StorageResult<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(cf)
            .ok_or_else(|| StorageError::UnknownColumnFamily(cf.to_string()))
    }
}

fn prefix_iter<'a, I>(iter: I, prefix: Vec<u8>) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>
where
    I: Iterator<Item = Result<(Box<[u8]>, Box<[u8]>), rocksdb::Error>> + 'a,
{
    let mapped = iter
        .filter_map(|res| {
            res.map_err(|e| tracing::warn!(error = %e, "rocksdb iterator error"))
                .ok()
        })
        .map(|(k, v)| (k.to_vec(), v.to_vec()))
        .take_while(move |(k, _)| k.starts_with(&prefix));
    Box::new(mapped)
}

impl StorageBackend for RocksDbBackend {
    fn get(&self, cf: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let handle = self.cf_handle(cf)?;
        let result = self
            .db
            .get_cf(handle, key)
            .map_err(|e| StorageError::Backend(format!("RocksDB get error: {e}")))?;
        self.stats.write().reads += 1;
        Ok(result)
    }

    fn put(&self, cf: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let handle = self.cf_handle(cf)?;
        self.db
            .put_cf(handle, key, value)
            .map_err(|e| StorageError::Backend(format!("RocksDB put error: {e}")))?;
        self.stats.write().writes += 1;
        Ok(())
    }

    fn delete(&self, cf: &str, key: &[u8]) -> StorageResult<()> {
        let handle = self.cf_handle(cf)?;
        self.db
            .delete_cf(handle, key)
            .map_err(|e| StorageError::Backend(format!("RocksDB delete error: {e}")))?;
        self.stats.write().deletes += 1;
        Ok(())
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> StorageResult<()> {
        let mut batch = WriteBatch::default();
        let op_count = ops.len() as u64;

        for op in ops {
            match op {
                BatchOp::Put { cf, key, value } => {
                    batch.put_cf(self.cf_handle(cf)?, key, value);
                }
                BatchOp::Delete { cf, key } => {
                    batch.delete_cf(self.cf_handle(cf)?, key);
                }
            }
        }

        self.db
            .write(batch)
            .map_err(|e| StorageError::Backend(format!("RocksDB batch write error: {e}")))?;
        self.stats.write().writes += op_count;
        Ok(())
    }

    fn prefix_scan<'a>(
        &'a self,
        cf: &str,
        prefix: &[u8],
    ) -> StorageResult<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>> {
        let handle = self.cf_handle(cf)?;
        let iter = self
            .db
            .iterator_cf(handle, IteratorMode::From(prefix, Direction::Forward));
        self.stats.write().reads += 1;
        Ok(prefix_iter(iter, prefix.to_vec()))
    }

    fn snapshot<'a>(&'a self) -> StorageResult<Box<dyn ReadView + 'a>> {
        Ok(Box::new(RocksDbSnapshot {
            backend: self,
            snapshot: self.db.snapshot(),
        }))
    }

    fn stats(&self) -> StorageStats {
        let mut stats = self.stats.read().clone();
        if let Ok(Some(count)) = self.db.property_int_value("rocksdb.estimate-num-keys") {
            stats.key_count = count;
        }
        stats
    }
}

/// Read view over a RocksDB snapshot.
struct RocksDbSnapshot<'a> {
    backend: &'a RocksDbBackend,
    snapshot: rocksdb::Snapshot<'a>,
}

impl ReadView for RocksDbSnapshot<'_> {
    fn get(&self, cf: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let handle = self.backend.cf_handle(cf)?;
        self.snapshot
            .get_cf(handle, key)
            .map_err(|e| StorageError::Backend(format!("RocksDB snapshot get error: {e}")))
    }

    fn prefix_scan<'b>(
        &'b self,
        cf: &str,
        prefix: &[u8],
    ) -> StorageResult<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'b>> {
        let handle = self.backend.cf_handle(cf)?;
        let iter = self
            .snapshot
            .iterator_cf(handle, IteratorMode::From(prefix, Direction::Forward));
        Ok(prefix_iter(iter, prefix.to_vec()))
    }
}
