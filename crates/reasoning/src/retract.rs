//! Deletion with reasoning (Backward/Forward)
//!
//! Deleting a fact may strand derivations that depended on it, while other
//! derivations survive on independent justifications. The two phases:
//!
//! 1. **Backward**: BFS from the deleted facts through the rules to the
//!    set of derived facts that could transitively have depended on them.
//! 2. **Forward**: for each potentially invalid fact, try to re-derive it
//!    from the surviving population; keep it if any rule still justifies
//!    it, delete it otherwise.
//!
//! The binding search in the forward phase is bounded; exceeding the
//! ceiling conservatively treats the fact as non-re-derivable, so
//! over-deletion is possible but incorrect retention never is.

use crate::facts::{extend_binding, filter_matching, FactSet};
use crate::model::{substitute_pattern, Bindings, Rule};
use crate::{ReasoningError, ReasoningResult};
use ahash::AHashSet;
use rdf_model::{Dictionary, Triple};
use std::time::Instant;
use storage::{DerivedStore, IdTriple, StorageBackend, TripleIndex};

/// Options for deletion with reasoning.
#[derive(Clone, Debug)]
pub struct DeleteOptions {
    /// Depth bound for the backward dependency trace
    pub max_trace_depth: usize,
    /// Ceiling on the intermediate binding-set size during re-derivation
    pub binding_limit: usize,
    /// Batch size for bulk deletion
    pub chunk_size: usize,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            max_trace_depth: 100,
            binding_limit: 10_000,
            chunk_size: 1000,
        }
    }
}

/// Outcome of the backward phase.
#[derive(Clone, Debug, Default)]
pub struct TraceResult {
    /// Derived facts that may have depended on the deleted ones
    pub potentially_invalid: FactSet,
    /// BFS levels actually explored
    pub trace_depth: usize,
    /// Facts examined while collecting dependents
    pub facts_examined: usize,
}

/// Statistics from a deletion.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeleteStats {
    /// Explicit triples removed from the index
    pub explicit_deleted: usize,
    /// Derived triples removed from the derived store
    pub derived_deleted: usize,
    /// Potentially invalid derivations that survived re-derivation
    pub derived_kept: usize,
    /// Size of the backward phase's result
    pub potentially_invalid_count: usize,
    /// Wall-clock duration
    pub duration_ms: u64,
}

impl DeleteStats {
    /// Fold another batch's statistics into this one.
    pub fn merge(&mut self, other: &DeleteStats) {
        self.explicit_deleted += other.explicit_deleted;
        self.derived_deleted += other.derived_deleted;
        self.derived_kept += other.derived_kept;
        self.potentially_invalid_count += other.potentially_invalid_count;
        self.duration_ms += other.duration_ms;
    }
}

/// Backward phase: collect the derived facts that could transitively have
/// depended on any deleted fact.
///
/// A derived fact `d` potentially depends on `f` under rule `r` iff `d`
/// unifies with `r`'s head, `f` unifies with some body pattern under
/// bindings consistent with the head match, and every remaining body
/// pattern has some match in the full fact set under those bindings
/// (checked per pattern, which is deliberately conservative).
pub fn backward_trace(
    deleted: &FactSet,
    all_facts: &FactSet,
    all_derived: &FactSet,
    rules: &[Rule],
    max_depth: usize,
) -> TraceResult {
    let mut result = TraceResult::default();
    let mut visited: FactSet = deleted.clone();
    let mut frontier: FactSet = deleted.clone();

    while !frontier.is_empty() && result.trace_depth < max_depth {
        let mut next_frontier = FactSet::default();

        for rule in rules {
            let patterns = rule.body_patterns();
            for fact in &frontier {
                for (index, pattern) in patterns.iter().enumerate() {
                    let Some(input_bindings) = extend_binding(&Bindings::new(), pattern, fact)
                    else {
                        continue;
                    };

                    for candidate in all_derived {
                        result.facts_examined += 1;
                        if visited.contains(candidate) {
                            continue;
                        }
                        let Some(combined) =
                            extend_binding(&input_bindings, &rule.head, candidate)
                        else {
                            continue;
                        };
                        if remaining_patterns_satisfiable(
                            &patterns, index, &combined, all_facts,
                        ) {
                            next_frontier.insert(candidate.clone());
                            visited.insert(candidate.clone());
                            result.potentially_invalid.insert(candidate.clone());
                        }
                    }
                }
            }
        }

        frontier = next_frontier;
        result.trace_depth += 1;
    }

    result
}

/// Conservative check that each body pattern other than the matched one
/// has at least one match in the fact set under the combined bindings.
fn remaining_patterns_satisfiable(
    patterns: &[&rdf_model::Pattern],
    matched_index: usize,
    bindings: &Bindings,
    all_facts: &FactSet,
) -> bool {
    patterns.iter().enumerate().all(|(index, pattern)| {
        if index == matched_index {
            return true;
        }
        let grounded = substitute_pattern(pattern, bindings);
        match grounded.to_triple() {
            Some(exact) => all_facts.contains(&exact),
            None => filter_matching(all_facts, &grounded).next().is_some(),
        }
    })
}

/// Can `fact` be derived from `valid` by any rule, without using itself?
///
/// Errors with [`ReasoningError::BindingLimitExceeded`] when the join
/// blows past the ceiling; callers treat that as "cannot re-derive".
pub fn can_rederive(
    fact: &Triple,
    valid: &FactSet,
    rules: &[Rule],
    binding_limit: usize,
) -> ReasoningResult<bool> {
    for rule in rules {
        let Some(head_bindings) = extend_binding(&Bindings::new(), &rule.head, fact) else {
            continue;
        };

        let mut bindings: Vec<Bindings> = vec![head_bindings];
        for pattern in rule.body_patterns() {
            let mut extended: AHashSet<Bindings> = AHashSet::default();
            for binding in &bindings {
                let grounded = substitute_pattern(pattern, binding);
                if let Some(exact) = grounded.to_triple() {
                    if valid.contains(&exact) {
                        if let Some(next) = extend_binding(binding, pattern, &exact) {
                            extended.insert(next);
                        }
                    }
                    continue;
                }
                for candidate in filter_matching(valid, &grounded) {
                    if let Some(next) = extend_binding(binding, pattern, candidate) {
                        extended.insert(next);
                        if extended.len() > binding_limit {
                            return Err(ReasoningError::BindingLimitExceeded(binding_limit));
                        }
                    }
                }
            }
            bindings = extended.into_iter().collect();
            if bindings.is_empty() {
                break;
            }
        }

        if bindings.iter().any(|b| rule.evaluate_conditions(b)) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// The forward phase's partition of the potentially invalid facts.
#[derive(Clone, Debug, Default)]
pub struct RederivePartition {
    /// Still derivable from the surviving population
    pub keep: FactSet,
    /// No surviving justification
    pub delete: FactSet,
}

/// Forward phase: re-derive survivors.
///
/// Facts are checked against
/// `(all_facts − deleted − unresolved_potentially_invalid) ∪ kept_so_far`,
/// never against themselves. Sorted order makes the partition
/// deterministic.
pub fn forward_rederive(
    potentially_invalid: &FactSet,
    all_facts: &FactSet,
    deleted: &FactSet,
    rules: &[Rule],
    binding_limit: usize,
) -> RederivePartition {
    let mut partition = RederivePartition::default();

    // Base population: survivors that are not under suspicion themselves
    let mut working: FactSet = all_facts
        .iter()
        .filter(|t| !deleted.contains(*t) && !potentially_invalid.contains(*t))
        .cloned()
        .collect();

    let mut ordered: Vec<Triple> = potentially_invalid.iter().cloned().collect();
    ordered.sort();

    for fact in ordered {
        let rederivable = match can_rederive(&fact, &working, rules, binding_limit) {
            Ok(found) => found,
            Err(ReasoningError::BindingLimitExceeded(limit)) => {
                tracing::warn!(
                    fact = %fact,
                    limit,
                    "binding ceiling hit; conservatively treating fact as non-re-derivable"
                );
                false
            }
            Err(_) => false,
        };
        if rederivable {
            working.insert(fact.clone());
            partition.keep.insert(fact);
        } else {
            partition.delete.insert(fact);
        }
    }

    partition
}

/// A planned deletion against in-memory fact populations.
#[derive(Clone, Debug, Default)]
pub struct DeletePlan {
    /// Requested triples found in the explicit set
    pub explicit_to_delete: FactSet,
    /// Requested derived triples plus stranded derivations
    pub derived_to_delete: FactSet,
    /// Potentially invalid derivations that survived
    pub kept: FactSet,
    /// Backward phase outcome
    pub trace: TraceResult,
}

/// Plan a deletion: partition the request, trace dependents, re-derive
/// survivors. Pure with respect to the inputs.
pub fn plan_deletion(
    requested: &[Triple],
    explicit: &FactSet,
    derived: &FactSet,
    rules: &[Rule],
    opts: &DeleteOptions,
) -> DeletePlan {
    let explicit_to_delete: FactSet = requested
        .iter()
        .filter(|t| explicit.contains(*t))
        .cloned()
        .collect();
    let derived_requested: FactSet = requested
        .iter()
        .filter(|t| derived.contains(*t))
        .cloned()
        .collect();

    let mut all_facts: FactSet = explicit.clone();
    all_facts.extend(derived.iter().cloned());

    let mut deleted: FactSet = explicit_to_delete.clone();
    deleted.extend(derived_requested.iter().cloned());

    let trace = backward_trace(&deleted, &all_facts, derived, rules, opts.max_trace_depth);
    let partition = forward_rederive(
        &trace.potentially_invalid,
        &all_facts,
        &deleted,
        rules,
        opts.binding_limit,
    );

    let mut derived_to_delete = derived_requested;
    derived_to_delete.extend(partition.delete.iter().cloned());

    DeletePlan {
        explicit_to_delete,
        derived_to_delete,
        kept: partition.keep,
        trace,
    }
}

/// Delete triples from the persistent stores with reasoning.
///
/// The whole batch either commits or leaves the store unchanged: the
/// backward/forward analysis runs first, and the index and derived-store
/// writes are atomic batches.
pub fn delete_with_reasoning<B: StorageBackend + 'static>(
    dict: &Dictionary,
    index: &TripleIndex<B>,
    derived_store: &DerivedStore<B>,
    requested: &[Triple],
    rules: &[Rule],
    opts: &DeleteOptions,
) -> ReasoningResult<DeleteStats> {
    let started = Instant::now();
    tracing::debug!(requested = requested.len(), "delete start");

    let explicit = load_facts(dict, index.lookup(&storage::IdPattern::all())?)?;
    let derived = load_facts(dict, derived_store.lookup_derived(&storage::IdPattern::all())?)?;

    let plan = plan_deletion(requested, &explicit, &derived, rules, opts);

    let explicit_ids: Vec<IdTriple> = plan
        .explicit_to_delete
        .iter()
        .map(|t| dict.encode_triple(t).into())
        .collect();
    index.delete_triples(&explicit_ids)?;

    let derived_ids: Vec<IdTriple> = plan
        .derived_to_delete
        .iter()
        .map(|t| dict.encode_triple(t).into())
        .collect();
    derived_store.delete_derived(&derived_ids)?;

    let stats = DeleteStats {
        explicit_deleted: plan.explicit_to_delete.len(),
        derived_deleted: plan.derived_to_delete.len(),
        derived_kept: plan.kept.len(),
        potentially_invalid_count: plan.trace.potentially_invalid.len(),
        duration_ms: started.elapsed().as_millis() as u64,
    };
    tracing::debug!(
        explicit = stats.explicit_deleted,
        derived = stats.derived_deleted,
        kept = stats.derived_kept,
        duration_ms = stats.duration_ms,
        "delete stop"
    );
    Ok(stats)
}

/// Bulk deletion: the input is chunked; each chunk commits independently
/// and a failing chunk leaves earlier chunks committed.
pub fn delete_bulk<B: StorageBackend + 'static>(
    dict: &Dictionary,
    index: &TripleIndex<B>,
    derived_store: &DerivedStore<B>,
    requested: &[Triple],
    rules: &[Rule],
    opts: &DeleteOptions,
) -> ReasoningResult<DeleteStats> {
    let mut total = DeleteStats::default();
    for chunk in requested.chunks(opts.chunk_size.max(1)) {
        let stats = delete_with_reasoning(dict, index, derived_store, chunk, rules, opts)?;
        total.merge(&stats);
    }
    Ok(total)
}

fn load_facts<I: Iterator<Item = IdTriple>>(
    dict: &Dictionary,
    ids: I,
) -> ReasoningResult<FactSet> {
    let mut facts = FactSet::default();
    for id_triple in ids {
        match dict.decode_triple(id_triple.into()) {
            Some(t) => {
                facts.insert(t);
            }
            None => tracing::warn!(?id_triple, "skipping triple with unknown dictionary id"),
        }
    }
    Ok(facts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{self, Profile};
    use rdf_model::{vocab, Term};

    fn ex(local: &str) -> Term {
        Term::iri(format!("http://example.org/{local}"))
    }

    fn typed(x: &str, c: &str) -> Triple {
        Triple::new(ex(x), Term::iri(vocab::RDF_TYPE), ex(c))
    }

    fn sco(sub: &str, sup: &str) -> Triple {
        Triple::new(ex(sub), Term::iri(vocab::RDFS_SUB_CLASS_OF), ex(sup))
    }

    fn rdfs_rules() -> Vec<Rule> {
        catalog::rules_for_profile(Profile::Rdfs)
            .into_iter()
            .map(|d| d.rule)
            .collect()
    }

    fn fact_set(triples: &[Triple]) -> FactSet {
        triples.iter().cloned().collect()
    }

    #[test]
    fn test_backward_trace_finds_dependent() {
        let explicit = fact_set(&[sco("Student", "Person"), typed("alice", "Student")]);
        let derived = fact_set(&[typed("alice", "Person")]);
        let mut all = explicit.clone();
        all.extend(derived.iter().cloned());

        let deleted = fact_set(&[typed("alice", "Student")]);
        let trace = backward_trace(&deleted, &all, &derived, &rdfs_rules(), 100);

        assert!(trace.potentially_invalid.contains(&typed("alice", "Person")));
        assert!(trace.facts_examined > 0);
        assert!(trace.trace_depth >= 1);
    }

    #[test]
    fn test_backward_trace_follows_chains() {
        // alice:Person derives alice:Agent via Person ⊑ Agent
        let explicit = fact_set(&[
            sco("Student", "Person"),
            sco("Person", "Agent"),
            typed("alice", "Student"),
        ]);
        let derived = fact_set(&[typed("alice", "Person"), typed("alice", "Agent")]);
        let mut all = explicit.clone();
        all.extend(derived.iter().cloned());

        let deleted = fact_set(&[typed("alice", "Student")]);
        let trace = backward_trace(&deleted, &all, &derived, &rdfs_rules(), 100);

        assert!(trace.potentially_invalid.contains(&typed("alice", "Person")));
        assert!(trace.potentially_invalid.contains(&typed("alice", "Agent")));
    }

    #[test]
    fn test_depth_bound_halts_trace() {
        let explicit = fact_set(&[
            sco("Student", "Person"),
            sco("Person", "Agent"),
            typed("alice", "Student"),
        ]);
        let derived = fact_set(&[typed("alice", "Person"), typed("alice", "Agent")]);
        let mut all = explicit.clone();
        all.extend(derived.iter().cloned());

        let deleted = fact_set(&[typed("alice", "Student")]);
        let trace = backward_trace(&deleted, &all, &derived, &rdfs_rules(), 1);

        assert_eq!(trace.trace_depth, 1);
        assert!(trace.potentially_invalid.contains(&typed("alice", "Person")));
    }

    #[test]
    fn test_can_rederive() {
        let valid = fact_set(&[sco("GradStudent", "Person"), typed("alice", "GradStudent")]);
        assert!(can_rederive(&typed("alice", "Person"), &valid, &rdfs_rules(), 10_000).unwrap());

        let empty = FactSet::default();
        assert!(!can_rederive(&typed("alice", "Person"), &empty, &rdfs_rules(), 10_000).unwrap());
    }

    #[test]
    fn test_binding_limit_is_conservative() {
        let mut valid = FactSet::default();
        for i in 0..50 {
            valid.insert(sco(&format!("C{i}"), "Person"));
            valid.insert(typed("alice", &format!("C{i}")));
        }

        // Ridiculously small ceiling: the search must bail out
        let result = can_rederive(&typed("alice", "Person"), &valid, &rdfs_rules(), 3);
        assert!(matches!(result, Err(ReasoningError::BindingLimitExceeded(3))));

        let partition = forward_rederive(
            &fact_set(&[typed("alice", "Person")]),
            &valid,
            &FactSet::default(),
            &rdfs_rules(),
            3,
        );
        // Over-deletion, never incorrect retention
        assert!(partition.delete.contains(&typed("alice", "Person")));
    }

    #[test]
    fn test_plan_deletes_stranded_derivation() {
        let explicit = fact_set(&[sco("Student", "Person"), typed("alice", "Student")]);
        let derived = fact_set(&[typed("alice", "Person")]);

        let plan = plan_deletion(
            &[typed("alice", "Student")],
            &explicit,
            &derived,
            &rdfs_rules(),
            &DeleteOptions::default(),
        );

        assert_eq!(plan.explicit_to_delete, fact_set(&[typed("alice", "Student")]));
        assert!(plan.derived_to_delete.contains(&typed("alice", "Person")));
        assert!(plan.kept.is_empty());
    }

    #[test]
    fn test_plan_keeps_alternative_justification() {
        let explicit = fact_set(&[
            sco("Student", "Person"),
            sco("GradStudent", "Person"),
            typed("alice", "Student"),
            typed("alice", "GradStudent"),
        ]);
        let derived = fact_set(&[typed("alice", "Person")]);

        let plan = plan_deletion(
            &[typed("alice", "Student")],
            &explicit,
            &derived,
            &rdfs_rules(),
            &DeleteOptions::default(),
        );

        // Re-derivable through GradStudent: must stay
        assert!(plan.kept.contains(&typed("alice", "Person")));
        assert!(!plan.derived_to_delete.contains(&typed("alice", "Person")));
    }

    #[test]
    fn test_deleting_derived_fact_directly() {
        let explicit = fact_set(&[sco("Student", "Person"), typed("alice", "Student")]);
        let derived = fact_set(&[typed("alice", "Person")]);

        let plan = plan_deletion(
            &[typed("alice", "Person")],
            &explicit,
            &derived,
            &rdfs_rules(),
            &DeleteOptions::default(),
        );

        assert!(plan.explicit_to_delete.is_empty());
        assert!(plan.derived_to_delete.contains(&typed("alice", "Person")));
    }
}
