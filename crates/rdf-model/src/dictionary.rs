//! Bidirectional term/ID dictionary
//!
//! The persistence layer keys triples on 64-bit IDs; the rule layer works
//! with structured terms. This dictionary provides the thread-safe two-way
//! mapping between them with:
//! - Deduplication of identical terms
//! - Dense IDs starting at 1 (0 is reserved and never issued)
//! - Stable IDs for the lifetime of the process

use crate::{Term, Triple};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Thread-safe bidirectional term interning dictionary.
///
/// Cloning is cheap and shares the underlying storage.
#[derive(Clone)]
pub struct Dictionary {
    inner: Arc<RwLock<DictionaryInner>>,
}

struct DictionaryInner {
    ids: FxHashMap<Term, u64>,
    /// Indexed by `id - 1`; IDs are dense.
    terms: Vec<Term>,
}

impl Dictionary {
    /// Create a new empty dictionary
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(DictionaryInner {
                ids: FxHashMap::default(),
                terms: Vec::new(),
            })),
        }
    }

    /// Intern a term and return its ID, allocating one on first sight.
    pub fn encode(&self, term: &Term) -> u64 {
        // Fast path: already interned (read lock)
        {
            let guard = self.inner.read();
            if let Some(&id) = guard.ids.get(term) {
                return id;
            }
        }

        let mut guard = self.inner.write();

        // Double-check after acquiring the write lock
        if let Some(&id) = guard.ids.get(term) {
            return id;
        }

        guard.terms.push(term.clone());
        let id = guard.terms.len() as u64;
        guard.ids.insert(term.clone(), id);
        id
    }

    /// Look up the ID of a term without allocating one.
    pub fn id_of(&self, term: &Term) -> Option<u64> {
        self.inner.read().ids.get(term).copied()
    }

    /// Resolve an ID back to its term.
    pub fn decode(&self, id: u64) -> Option<Term> {
        if id == 0 {
            return None;
        }
        self.inner.read().terms.get((id - 1) as usize).cloned()
    }

    /// Encode a ground triple into its three IDs
    pub fn encode_triple(&self, triple: &Triple) -> (u64, u64, u64) {
        (
            self.encode(&triple.subject),
            self.encode(&triple.predicate),
            self.encode(&triple.object),
        )
    }

    /// Decode three IDs back into a triple, if all are known
    pub fn decode_triple(&self, (s, p, o): (u64, u64, u64)) -> Option<Triple> {
        Some(Triple {
            subject: self.decode(s)?,
            predicate: self.decode(p)?,
            object: self.decode(o)?,
        })
    }

    /// Number of interned terms
    pub fn len(&self) -> usize {
        self.inner.read().terms.len()
    }

    /// Check if the dictionary is empty
    pub fn is_empty(&self) -> bool {
        self.inner.read().terms.is_empty()
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_same_term() {
        let dict = Dictionary::new();
        let a = dict.encode(&Term::iri("http://ex.org/a"));
        let b = dict.encode(&Term::iri("http://ex.org/a"));
        assert_eq!(a, b);
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn test_encode_different_terms() {
        let dict = Dictionary::new();
        let a = dict.encode(&Term::iri("http://ex.org/a"));
        let b = dict.encode(&Term::literal("a"));
        assert_ne!(a, b);
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn test_ids_start_at_one() {
        let dict = Dictionary::new();
        assert_eq!(dict.encode(&Term::iri("http://ex.org/a")), 1);
        assert_eq!(dict.decode(0), None);
    }

    #[test]
    fn test_decode_round_trip() {
        let dict = Dictionary::new();
        let term = Term::literal_lang("chat", "fr");
        let id = dict.encode(&term);
        assert_eq!(dict.decode(id), Some(term));
        assert_eq!(dict.decode(id + 100), None);
    }

    #[test]
    fn test_triple_round_trip() {
        let dict = Dictionary::new();
        let triple = Triple::iris("http://ex.org/s", "http://ex.org/p", "http://ex.org/o");
        let ids = dict.encode_triple(&triple);
        assert_eq!(dict.decode_triple(ids), Some(triple));
    }

    proptest::proptest! {
        #[test]
        fn prop_encode_decode_round_trip(iri in "[a-z]{1,12}", value in ".{0,24}") {
            let dict = Dictionary::new();
            for term in [
                Term::iri(iri.as_str()),
                Term::literal(value.as_str()),
                Term::literal_lang(value.as_str(), "en"),
            ] {
                let id = dict.encode(&term);
                proptest::prop_assert_eq!(dict.decode(id), Some(term));
            }
        }
    }

    #[test]
    fn test_clone_shares_storage() {
        let d1 = Dictionary::new();
        let id = d1.encode(&Term::iri("http://ex.org/a"));

        let d2 = d1.clone();
        assert_eq!(d2.id_of(&Term::iri("http://ex.org/a")), Some(id));
        assert_eq!(d2.len(), 1);
    }
}
