//! Derived-fact store
//!
//! Inferred triples live in their own column family, keyed exactly like
//! the `spo` index (24-byte SPO key, empty value). Keeping them out of the
//! explicit index lets materialization be cleared and rebuilt without
//! touching asserted data, and lets deletion reason about the two sets
//! separately.

use crate::backend::{BatchOp, StorageBackend, StorageResult, CF_DERIVED};
use crate::index::{IdPattern, PatternSlot, TripleIndex};
use crate::keys::{self, IdTriple};
use std::sync::Arc;

/// Default number of keys deleted per batch by [`DerivedStore::clear_all`].
pub const CLEAR_BATCH_SIZE: usize = 1000;

/// The store of inferred triples.
pub struct DerivedStore<B> {
    backend: Arc<B>,
}

impl<B> Clone for DerivedStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

impl<B: StorageBackend> DerivedStore<B> {
    /// Create a derived store over the given backend
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Insert derived triples in one atomic batch; idempotent.
    pub fn insert_derived(&self, triples: &[IdTriple]) -> StorageResult<()> {
        if triples.is_empty() {
            return Ok(());
        }
        let ops = triples
            .iter()
            .map(|t| BatchOp::Put {
                cf: CF_DERIVED,
                key: keys::spo_key(t).to_vec(),
                value: Vec::new(),
            })
            .collect();
        self.backend.write_batch(ops)
    }

    /// Delete derived triples in one atomic batch; absent keys are a no-op.
    pub fn delete_derived(&self, triples: &[IdTriple]) -> StorageResult<()> {
        if triples.is_empty() {
            return Ok(());
        }
        let ops = triples
            .iter()
            .map(|t| BatchOp::Delete {
                cf: CF_DERIVED,
                key: keys::spo_key(t).to_vec(),
            })
            .collect();
        self.backend.write_batch(ops)
    }

    /// Check if a triple is in the derived store
    pub fn derived_exists(&self, t: &IdTriple) -> StorageResult<bool> {
        self.backend.exists(CF_DERIVED, &keys::spo_key(t))
    }

    /// Number of derived triples
    pub fn count(&self) -> StorageResult<u64> {
        Ok(self.backend.prefix_scan(CF_DERIVED, &[])?.count() as u64)
    }

    /// Delete every derived triple, streaming the column family in batches
    /// so the full key set is never resident at once. Returns the number of
    /// keys deleted.
    pub fn clear_all(&self) -> StorageResult<u64> {
        self.clear_in_batches(CLEAR_BATCH_SIZE)
    }

    /// `clear_all` with an explicit batch size
    pub fn clear_in_batches(&self, batch_size: usize) -> StorageResult<u64> {
        let batch_size = batch_size.max(1);
        let mut deleted = 0u64;
        loop {
            let chunk: Vec<Vec<u8>> = self
                .backend
                .prefix_scan(CF_DERIVED, &[])?
                .take(batch_size)
                .map(|(k, _)| k)
                .collect();
            if chunk.is_empty() {
                return Ok(deleted);
            }
            deleted += chunk.len() as u64;
            let ops = chunk
                .into_iter()
                .map(|key| BatchOp::Delete { cf: CF_DERIVED, key })
                .collect();
            self.backend.write_batch(ops)?;
        }
    }

    /// Look up derived triples matching a pattern.
    ///
    /// The derived column family only has SPO ordering, so prefix selection
    /// follows the leading bound positions: exact key when fully bound,
    /// 16-byte prefix for `(s, p)`, 8-byte prefix for `(s)`, and otherwise a
    /// full scan with a per-triple filter.
    pub fn lookup_derived<'a>(
        &'a self,
        pattern: &IdPattern,
    ) -> StorageResult<Box<dyn Iterator<Item = IdTriple> + 'a>> {
        use PatternSlot::{Bound, Var};

        if let (Bound(s), Bound(p), Bound(o)) = (pattern.s, pattern.p, pattern.o) {
            let t = IdTriple::new(s, p, o);
            let found = self.derived_exists(&t)?;
            return Ok(Box::new(found.then_some(t).into_iter()));
        }

        let prefix = match (pattern.s, pattern.p) {
            (Bound(s), Bound(p)) => keys::prefix2(s, p).to_vec(),
            (Bound(s), Var) => keys::prefix1(s).to_vec(),
            _ => Vec::new(),
        };

        let residual = *pattern;
        let iter = self
            .backend
            .prefix_scan(CF_DERIVED, &prefix)?
            .filter_map(|(k, _)| {
                keys::decode_spo_key(&k)
                    .map_err(|e| tracing::warn!(error = %e, "skipping undecodable derived key"))
                    .ok()
            })
            .filter(move |t| residual.matches(t));
        Ok(Box::new(iter))
    }

    /// Union of explicit and derived lookups.
    ///
    /// A triple present in both stores is yielded twice; set-based
    /// consumers are unaffected.
    pub fn lookup_all<'a>(
        &'a self,
        explicit: &'a TripleIndex<B>,
        pattern: &IdPattern,
    ) -> StorageResult<Box<dyn Iterator<Item = IdTriple> + 'a>> {
        let from_explicit = explicit.lookup(pattern)?;
        let from_derived = self.lookup_derived(pattern)?;
        Ok(Box::new(from_explicit.chain(from_derived)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;

    fn t(s: u64, p: u64, o: u64) -> IdTriple {
        IdTriple::new(s, p, o)
    }

    fn store() -> DerivedStore<MemoryBackend> {
        DerivedStore::new(Arc::new(MemoryBackend::new()))
    }

    #[test]
    fn test_insert_is_idempotent() {
        let store = store();
        store.insert_derived(&[t(1, 2, 3)]).unwrap();
        store.insert_derived(&[t(1, 2, 3)]).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.derived_exists(&t(1, 2, 3)).unwrap());
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let store = store();
        store.insert_derived(&[t(1, 2, 3)]).unwrap();
        store.delete_derived(&[t(9, 9, 9)]).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_clear_all_streams_batches() {
        let store = store();
        let triples: Vec<_> = (0..2500).map(|i| t(i, 1, 2)).collect();
        store.insert_derived(&triples).unwrap();

        let deleted = store.clear_all().unwrap();
        assert_eq!(deleted, 2500);
        assert_eq!(store.count().unwrap(), 0);

        // Clearing an empty store deletes nothing
        assert_eq!(store.clear_all().unwrap(), 0);
    }

    #[test]
    fn test_lookup_prefix_selection() {
        let store = store();
        store
            .insert_derived(&[t(1, 10, 100), t(1, 10, 101), t(1, 11, 100), t(2, 10, 100)])
            .unwrap();

        use PatternSlot::{Bound, Var};
        let count = |p: IdPattern| store.lookup_derived(&p).unwrap().count();

        assert_eq!(count(IdPattern::new(Bound(1), Bound(10), Bound(100))), 1);
        assert_eq!(count(IdPattern::new(Bound(1), Bound(10), Var)), 2);
        assert_eq!(count(IdPattern::new(Bound(1), Var, Var)), 3);
        // p-only requires the filtered full scan
        assert_eq!(count(IdPattern::new(Var, Bound(10), Var)), 3);
        assert_eq!(count(IdPattern::new(Var, Var, Bound(100))), 3);
        assert_eq!(count(IdPattern::all()), 4);
    }

    #[test]
    fn test_lookup_all_unions_both_stores() {
        let backend = Arc::new(MemoryBackend::new());
        let index = TripleIndex::new(Arc::clone(&backend));
        let store = DerivedStore::new(backend);

        index.insert_triples(&[t(1, 2, 3)]).unwrap();
        store.insert_derived(&[t(1, 2, 4)]).unwrap();

        let all: Vec<_> = store
            .lookup_all(&index, &IdPattern::all())
            .unwrap()
            .collect();
        assert_eq!(all.len(), 2);
        assert!(all.contains(&t(1, 2, 3)));
        assert!(all.contains(&t(1, 2, 4)));
    }
}
