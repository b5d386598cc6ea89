//! Incremental addition
//!
//! Adding facts never replays the whole materialization: the engine is
//! seeded with only the novel triples as its delta, so the cost is
//! bounded by the consequences of the addition, not by the size of the
//! existing fact population.

use crate::engine::{self, MaterializeOptions, MaterializeStats};
use crate::facts::{
    self, collecting_store, derived_store_fn, set_lookup, store_lookup, FactSet, FactSource,
};
use crate::model::Rule;
use crate::ReasoningResult;
use rdf_model::{Dictionary, Triple};
use storage::{DerivedStore, IdTriple, StorageBackend, TripleIndex};

/// Statistics from an incremental addition.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddStats {
    /// Novel explicit triples inserted
    pub explicit_added: usize,
    /// Facts derived as a consequence of the delta
    pub derived_count: usize,
    /// Fixpoint iterations the delta needed
    pub iterations: usize,
    /// Wall-clock duration
    pub duration_ms: u64,
}

impl AddStats {
    fn from_materialization(explicit_added: usize, stats: &MaterializeStats) -> Self {
        Self {
            explicit_added,
            derived_count: stats.total_derived,
            iterations: stats.iterations,
            duration_ms: stats.duration_ms,
        }
    }
}

/// Add triples to an in-memory fact population.
///
/// Returns the updated population (existing ∪ novel ∪ consequences) and
/// the addition statistics.
pub fn add_facts(
    triples: Vec<Triple>,
    existing: &FactSet,
    rules: &[Rule],
    opts: &MaterializeOptions,
) -> ReasoningResult<(FactSet, AddStats)> {
    let novel: FactSet = triples
        .into_iter()
        .filter(|t| !existing.contains(t))
        .collect();
    if novel.is_empty() {
        return Ok((existing.clone(), AddStats::default()));
    }

    let lookup = set_lookup(existing.clone());
    let (store, collected) = collecting_store();
    let stats = engine::materialize(&lookup, &store, rules, novel.clone(), opts)?;

    let mut all = existing.clone();
    all.extend(novel.iter().cloned());
    let derived = collected.read().clone();
    all.extend(derived);

    Ok((all, AddStats::from_materialization(novel.len(), &stats)))
}

/// Add triples against the persistent stores.
///
/// Novel explicit triples go into the triple index; consequences of the
/// delta go into the derived store.
pub fn add_to_store<B: StorageBackend + 'static>(
    dict: &Dictionary,
    index: &TripleIndex<B>,
    derived: &DerivedStore<B>,
    triples: Vec<Triple>,
    rules: &[Rule],
    opts: &MaterializeOptions,
) -> ReasoningResult<AddStats> {
    // Filter to triples present in neither store
    let mut novel = Vec::new();
    let mut novel_ids = Vec::new();
    for triple in triples {
        let ids: IdTriple = dict.encode_triple(&triple).into();
        if index.triple_exists(&ids)? || derived.derived_exists(&ids)? {
            continue;
        }
        if !novel_ids.contains(&ids) {
            novel.push(triple);
            novel_ids.push(ids);
        }
    }
    if novel.is_empty() {
        return Ok(AddStats::default());
    }

    index.insert_triples(&novel_ids)?;

    let lookup = store_lookup(
        dict.clone(),
        index.clone(),
        derived.clone(),
        FactSource::Both,
    );
    let store = derived_store_fn(dict.clone(), derived.clone());
    let initial: FactSet = novel.iter().cloned().collect();
    let stats = engine::materialize(&lookup, &store, rules, initial, opts)?;

    Ok(AddStats::from_materialization(novel.len(), &stats))
}

/// Dry-run addition: everything runs against ephemeral state, and only
/// the derivations that are new relative to `existing` come back.
pub fn preview_add(
    triples: Vec<Triple>,
    existing: &FactSet,
    rules: &[Rule],
    opts: &MaterializeOptions,
) -> ReasoningResult<FactSet> {
    let novel: FactSet = triples
        .into_iter()
        .filter(|t| !existing.contains(t))
        .collect();
    if novel.is_empty() {
        return Ok(FactSet::default());
    }

    let lookup = set_lookup(existing.clone());
    let (store, collected) = collecting_store();
    engine::materialize(&lookup, &store, rules, novel.clone(), opts)?;

    let derived = collected.read();
    Ok(facts::FactSet::from_iter(
        derived
            .iter()
            .filter(|t| !existing.contains(*t) && !novel.contains(*t))
            .cloned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{self, Profile};
    use rdf_model::{vocab, Term};
    use std::sync::Arc;
    use storage::MemoryBackend;

    fn ex(local: &str) -> Term {
        Term::iri(format!("http://example.org/{local}"))
    }

    fn rdfs_rules() -> Vec<Rule> {
        catalog::rules_for_profile(Profile::Rdfs)
            .into_iter()
            .map(|d| d.rule)
            .collect()
    }

    fn typed(x: &str, c: &str) -> Triple {
        Triple::new(ex(x), Term::iri(vocab::RDF_TYPE), ex(c))
    }

    fn sco(sub: &str, sup: &str) -> Triple {
        Triple::new(ex(sub), Term::iri(vocab::RDFS_SUB_CLASS_OF), ex(sup))
    }

    #[test]
    fn test_add_derives_consequences_only() {
        let existing: FactSet = [sco("Student", "Person"), typed("alice", "Student"), typed("alice", "Person")]
            .into_iter()
            .collect();

        let (all, stats) = add_facts(
            vec![typed("bob", "Student")],
            &existing,
            &rdfs_rules(),
            &MaterializeOptions::default(),
        )
        .unwrap();

        assert_eq!(stats.explicit_added, 1);
        assert_eq!(stats.derived_count, 1);
        assert!(all.contains(&typed("bob", "Person")));
        assert_eq!(all.len(), existing.len() + 2);
    }

    #[test]
    fn test_add_is_idempotent() {
        let existing: FactSet = [sco("Student", "Person")].into_iter().collect();
        let (after_first, first) = add_facts(
            vec![typed("alice", "Student")],
            &existing,
            &rdfs_rules(),
            &MaterializeOptions::default(),
        )
        .unwrap();
        assert_eq!(first.explicit_added, 1);

        let (after_second, second) = add_facts(
            vec![typed("alice", "Student")],
            &after_first,
            &rdfs_rules(),
            &MaterializeOptions::default(),
        )
        .unwrap();
        assert_eq!(second.explicit_added, 0);
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn test_add_to_store() {
        let dict = Dictionary::new();
        let backend = Arc::new(MemoryBackend::new());
        let index = TripleIndex::new(Arc::clone(&backend));
        let derived = DerivedStore::new(Arc::clone(&backend));

        let seed = [sco("Student", "Person"), typed("alice", "Student")];
        let ids: Vec<IdTriple> = seed.iter().map(|t| dict.encode_triple(t).into()).collect();
        index.insert_triples(&ids).unwrap();

        let stats = add_to_store(
            &dict,
            &index,
            &derived,
            vec![typed("bob", "Student")],
            &rdfs_rules(),
            &MaterializeOptions::default(),
        )
        .unwrap();

        assert_eq!(stats.explicit_added, 1);
        assert_eq!(stats.derived_count, 1);
        let expected: IdTriple = dict.encode_triple(&typed("bob", "Person")).into();
        assert!(derived.derived_exists(&expected).unwrap());
    }

    #[test]
    fn test_preview_add_leaves_no_trace() {
        let existing: FactSet = [sco("Student", "Person")].into_iter().collect();
        let preview = preview_add(
            vec![typed("alice", "Student")],
            &existing,
            &rdfs_rules(),
            &MaterializeOptions::default(),
        )
        .unwrap();

        let expected: FactSet = [typed("alice", "Person")].into_iter().collect();
        assert_eq!(preview, expected);
    }
}
