//! Fact sets and storage capabilities
//!
//! The engine never talks to storage directly: callers hand it a
//! `lookup_fn` capability for pattern lookups and a `store_fn` for
//! persisting new derivations. The factories here build those closures
//! over the triple index and the derived store, or over plain in-memory
//! sets for tests and previews.

use crate::model::Bindings;
use crate::ReasoningResult;
use ahash::AHashSet;
use parking_lot::RwLock;
use rdf_model::{Dictionary, Pattern, Term, Triple};
use storage::{DerivedStore, IdPattern, PatternSlot, StorageBackend, TripleIndex};
use std::sync::Arc;

/// A set of ground triples
pub type FactSet = AHashSet<Triple>;

/// Pattern-lookup capability handed to the engine.
///
/// `Arc` so parallel rule tasks can share it across threads.
pub type LookupFn = Arc<dyn Fn(&Pattern) -> ReasoningResult<Vec<Triple>> + Send + Sync>;

/// Persistence capability for newly derived facts.
pub type StoreFn = Arc<dyn Fn(&FactSet) -> ReasoningResult<()> + Send + Sync>;

/// Which fact population a storage-backed lookup consults.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FactSource {
    /// Asserted triples only
    Explicit,
    /// Inferred triples only
    Derived,
    /// Union of both
    Both,
}

/// Filter an in-memory fact set by a pattern, ignoring bindings.
pub fn filter_matching<'a>(
    facts: &'a FactSet,
    pattern: &'a Pattern,
) -> impl Iterator<Item = &'a Triple> {
    facts.iter().filter(move |t| pattern.matches(t))
}

/// Unify a ground triple against a pattern, extending `bindings`.
///
/// Variable positions bind or must agree with an existing binding;
/// constant positions require equality. `None` means no match.
pub fn extend_binding(bindings: &Bindings, pattern: &Pattern, fact: &Triple) -> Option<Bindings> {
    let mut extended = bindings.clone();
    for (pat_term, value) in [
        (&pattern.subject, &fact.subject),
        (&pattern.predicate, &fact.predicate),
        (&pattern.object, &fact.object),
    ] {
        match pat_term.as_variable() {
            Some(name) => match extended.get(name) {
                Some(bound) if bound != value => return None,
                Some(_) => {}
                None => {
                    extended.insert(name.to_string(), value.clone());
                }
            },
            None if pat_term != value => return None,
            None => {}
        }
    }
    Some(extended)
}

/// A lookup over nothing: every pattern has zero matches.
///
/// Used when the entire fact population is already seeded into the engine.
pub fn empty_lookup() -> LookupFn {
    Arc::new(|_| Ok(Vec::new()))
}

/// A lookup over a fixed in-memory fact set.
pub fn set_lookup(facts: FactSet) -> LookupFn {
    let facts = Arc::new(facts);
    Arc::new(move |pattern| Ok(filter_matching(&facts, pattern).cloned().collect()))
}

/// A store that discards everything (dry runs against ephemeral state).
pub fn sink_store() -> StoreFn {
    Arc::new(|_| Ok(()))
}

/// A store that accumulates everything written into a shared set.
pub fn collecting_store() -> (StoreFn, Arc<RwLock<FactSet>>) {
    let collected = Arc::new(RwLock::new(FactSet::default()));
    let sink = Arc::clone(&collected);
    let store: StoreFn = Arc::new(move |facts| {
        sink.write().extend(facts.iter().cloned());
        Ok(())
    });
    (store, collected)
}

fn term_slot(dict: &Dictionary, term: &Term) -> Option<PatternSlot> {
    if term.is_variable() {
        return Some(PatternSlot::Var);
    }
    // A constant the dictionary has never seen cannot match any stored
    // triple.
    dict.id_of(term).map(PatternSlot::Bound)
}

fn to_id_pattern(dict: &Dictionary, pattern: &Pattern) -> Option<IdPattern> {
    Some(IdPattern::new(
        term_slot(dict, &pattern.subject)?,
        term_slot(dict, &pattern.predicate)?,
        term_slot(dict, &pattern.object)?,
    ))
}

/// Build a lookup over the persistent stores.
///
/// Pattern constants are translated to dictionary IDs; results are decoded
/// back to terms. IDs that no longer decode are skipped with a warning.
pub fn store_lookup<B: StorageBackend + 'static>(
    dict: Dictionary,
    index: TripleIndex<B>,
    derived: DerivedStore<B>,
    source: FactSource,
) -> LookupFn {
    Arc::new(move |pattern| {
        let Some(id_pattern) = to_id_pattern(&dict, pattern) else {
            return Ok(Vec::new());
        };

        let mut ids = Vec::new();
        match source {
            FactSource::Explicit => ids.extend(index.lookup(&id_pattern)?),
            FactSource::Derived => ids.extend(derived.lookup_derived(&id_pattern)?),
            FactSource::Both => ids.extend(derived.lookup_all(&index, &id_pattern)?),
        }

        let mut triples = Vec::with_capacity(ids.len());
        for id_triple in ids {
            match dict.decode_triple(id_triple.into()) {
                Some(t) => triples.push(t),
                None => tracing::warn!(?id_triple, "skipping triple with unknown dictionary id"),
            }
        }
        Ok(triples)
    })
}

/// Build a store that writes new derivations into the derived column
/// family in one atomic batch per call.
pub fn derived_store_fn<B: StorageBackend + 'static>(
    dict: Dictionary,
    derived: DerivedStore<B>,
) -> StoreFn {
    Arc::new(move |facts| {
        let ids: Vec<storage::IdTriple> = facts
            .iter()
            .map(|t| dict.encode_triple(t).into())
            .collect();
        derived.insert_derived(&ids)?;
        Ok(())
    })
}
