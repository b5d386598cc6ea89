//! Explicit-fact triple index
//!
//! Three permutation column families inspired by the TDB-style quad
//! stores: `spo`, `pos`, `osp`. Every bound-position combination of a
//! lookup pattern maps to an exact key or a key prefix in one of the
//! three, so no lookup ever needs a residual filter.

use crate::backend::{BatchOp, StorageBackend, StorageResult, CF_OSP, CF_POS, CF_SPO};
use crate::keys::{self, IdTriple};
use std::sync::Arc;

/// One position of an index pattern: a bound ID or a wildcard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternSlot {
    /// Match exactly this dictionary ID
    Bound(u64),
    /// Match any ID
    Var,
}

impl PatternSlot {
    /// Check if this slot is bound
    pub fn is_bound(&self) -> bool {
        matches!(self, PatternSlot::Bound(_))
    }
}

impl From<Option<u64>> for PatternSlot {
    fn from(opt: Option<u64>) -> Self {
        match opt {
            Some(v) => PatternSlot::Bound(v),
            None => PatternSlot::Var,
        }
    }
}

/// A lookup pattern at the persistence layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdPattern {
    /// Subject slot
    pub s: PatternSlot,
    /// Predicate slot
    pub p: PatternSlot,
    /// Object slot
    pub o: PatternSlot,
}

impl IdPattern {
    /// Create a new pattern
    pub fn new(s: PatternSlot, p: PatternSlot, o: PatternSlot) -> Self {
        Self { s, p, o }
    }

    /// Pattern matching every triple
    pub fn all() -> Self {
        Self {
            s: PatternSlot::Var,
            p: PatternSlot::Var,
            o: PatternSlot::Var,
        }
    }

    /// Check if a triple matches this pattern
    pub fn matches(&self, t: &IdTriple) -> bool {
        let slot_matches = |slot: PatternSlot, v: u64| match slot {
            PatternSlot::Bound(b) => b == v,
            PatternSlot::Var => true,
        };
        slot_matches(self.s, t.s) && slot_matches(self.p, t.p) && slot_matches(self.o, t.o)
    }

    /// Count how many positions are bound
    pub fn bound_count(&self) -> usize {
        [self.s, self.p, self.o]
            .iter()
            .filter(|slot| slot.is_bound())
            .count()
    }
}

/// The explicit-fact index over a shared backend.
pub struct TripleIndex<B> {
    backend: Arc<B>,
}

impl<B> Clone for TripleIndex<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

impl<B: StorageBackend> TripleIndex<B> {
    /// Create an index over the given backend
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Access the underlying backend
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Insert triples into all three permutations in one atomic batch.
    /// Idempotent: re-inserting an existing triple is a no-op.
    pub fn insert_triples(&self, triples: &[IdTriple]) -> StorageResult<()> {
        if triples.is_empty() {
            return Ok(());
        }
        let mut ops = Vec::with_capacity(triples.len() * 3);
        for t in triples {
            ops.push(BatchOp::Put {
                cf: CF_SPO,
                key: keys::spo_key(t).to_vec(),
                value: Vec::new(),
            });
            ops.push(BatchOp::Put {
                cf: CF_POS,
                key: keys::pos_key(t).to_vec(),
                value: Vec::new(),
            });
            ops.push(BatchOp::Put {
                cf: CF_OSP,
                key: keys::osp_key(t).to_vec(),
                value: Vec::new(),
            });
        }
        self.backend.write_batch(ops)
    }

    /// Delete triples from all three permutations in one atomic batch.
    /// Absent triples are a no-op.
    pub fn delete_triples(&self, triples: &[IdTriple]) -> StorageResult<()> {
        if triples.is_empty() {
            return Ok(());
        }
        let mut ops = Vec::with_capacity(triples.len() * 3);
        for t in triples {
            ops.push(BatchOp::Delete {
                cf: CF_SPO,
                key: keys::spo_key(t).to_vec(),
            });
            ops.push(BatchOp::Delete {
                cf: CF_POS,
                key: keys::pos_key(t).to_vec(),
            });
            ops.push(BatchOp::Delete {
                cf: CF_OSP,
                key: keys::osp_key(t).to_vec(),
            });
        }
        self.backend.write_batch(ops)
    }

    /// Check if a triple is present
    pub fn triple_exists(&self, t: &IdTriple) -> StorageResult<bool> {
        self.backend.exists(CF_SPO, &keys::spo_key(t))
    }

    /// Number of stored triples
    pub fn count(&self) -> StorageResult<u64> {
        Ok(self.backend.prefix_scan(CF_SPO, &[])?.count() as u64)
    }

    /// Look up all triples matching the pattern, in the storage order of
    /// the chosen permutation.
    pub fn lookup<'a>(
        &'a self,
        pattern: &IdPattern,
    ) -> StorageResult<Box<dyn Iterator<Item = IdTriple> + 'a>> {
        use PatternSlot::{Bound, Var};

        let scan = move |cf: &'static str,
                    prefix: Vec<u8>,
                    decode: fn(&[u8]) -> StorageResult<IdTriple>|
         -> StorageResult<Box<dyn Iterator<Item = IdTriple> + 'a>> {
            let iter = self.backend.prefix_scan(cf, &prefix)?.filter_map(move |(k, _)| {
                decode(&k)
                    .map_err(|e| tracing::warn!(error = %e, cf, "skipping undecodable index key"))
                    .ok()
            });
            Ok(Box::new(iter))
        };

        match (pattern.s, pattern.p, pattern.o) {
            (Bound(s), Bound(p), Bound(o)) => {
                let t = IdTriple::new(s, p, o);
                let found = self.triple_exists(&t)?;
                Ok(Box::new(found.then_some(t).into_iter()))
            }
            (Bound(s), Bound(p), Var) => scan(CF_SPO, keys::prefix2(s, p).to_vec(), keys::decode_spo_key),
            (Bound(s), Var, Bound(o)) => scan(CF_OSP, keys::prefix2(o, s).to_vec(), keys::decode_osp_key),
            (Bound(s), Var, Var) => scan(CF_SPO, keys::prefix1(s).to_vec(), keys::decode_spo_key),
            (Var, Bound(p), Bound(o)) => scan(CF_POS, keys::prefix2(p, o).to_vec(), keys::decode_pos_key),
            (Var, Bound(p), Var) => scan(CF_POS, keys::prefix1(p).to_vec(), keys::decode_pos_key),
            (Var, Var, Bound(o)) => scan(CF_OSP, keys::prefix1(o).to_vec(), keys::decode_osp_key),
            (Var, Var, Var) => scan(CF_SPO, Vec::new(), keys::decode_spo_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;

    fn index_with(triples: &[IdTriple]) -> TripleIndex<MemoryBackend> {
        let index = TripleIndex::new(Arc::new(MemoryBackend::new()));
        index.insert_triples(triples).unwrap();
        index
    }

    fn t(s: u64, p: u64, o: u64) -> IdTriple {
        IdTriple::new(s, p, o)
    }

    #[test]
    fn test_insert_and_exists() {
        let index = index_with(&[t(1, 2, 3)]);
        assert!(index.triple_exists(&t(1, 2, 3)).unwrap());
        assert!(!index.triple_exists(&t(3, 2, 1)).unwrap());
        assert_eq!(index.count().unwrap(), 1);
    }

    #[test]
    fn test_insert_idempotent() {
        let index = index_with(&[t(1, 2, 3), t(1, 2, 3)]);
        assert_eq!(index.count().unwrap(), 1);
    }

    #[test]
    fn test_delete() {
        let index = index_with(&[t(1, 2, 3), t(4, 5, 6)]);
        index.delete_triples(&[t(1, 2, 3), t(7, 8, 9)]).unwrap();
        assert!(!index.triple_exists(&t(1, 2, 3)).unwrap());
        assert!(index.triple_exists(&t(4, 5, 6)).unwrap());
    }

    #[test]
    fn test_lookup_every_bound_combination() {
        let data = [t(1, 10, 100), t(1, 10, 101), t(1, 11, 100), t(2, 10, 100)];
        let index = index_with(&data);

        let count = |pattern: IdPattern| index.lookup(&pattern).unwrap().count();
        use PatternSlot::{Bound, Var};

        assert_eq!(count(IdPattern::new(Bound(1), Bound(10), Bound(100))), 1);
        assert_eq!(count(IdPattern::new(Bound(1), Bound(10), Var)), 2);
        assert_eq!(count(IdPattern::new(Bound(1), Var, Bound(100))), 2);
        assert_eq!(count(IdPattern::new(Bound(1), Var, Var)), 3);
        assert_eq!(count(IdPattern::new(Var, Bound(10), Bound(100))), 2);
        assert_eq!(count(IdPattern::new(Var, Bound(10), Var)), 3);
        assert_eq!(count(IdPattern::new(Var, Var, Bound(100))), 3);
        assert_eq!(count(IdPattern::all()), 4);
    }

    #[test]
    fn test_lookup_results_match_pattern() {
        let index = index_with(&[t(1, 10, 100), t(2, 10, 200)]);
        let pattern = IdPattern::new(PatternSlot::Var, PatternSlot::Bound(10), PatternSlot::Var);
        for found in index.lookup(&pattern).unwrap() {
            assert!(pattern.matches(&found));
        }
    }
}
