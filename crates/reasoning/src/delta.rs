//! Delta computation and pattern matching
//!
//! The semi-naive step: a rule's new consequences are exactly the matches
//! in which at least one body pattern matches a triple of the delta, with
//! the remaining patterns free to match anywhere in the existing fact
//! population. Running the join once per choice of delta pattern and
//! unioning the results avoids rederiving everything that was already
//! derivable before the delta arrived.

use crate::facts::{extend_binding, filter_matching, FactSet, LookupFn};
use crate::model::{substitute_pattern, BodyElement, Bindings, Rule};
use crate::{ReasoningError, ReasoningResult};
use ahash::AHashSet;

/// Apply one rule against a delta.
///
/// `locals` are in-memory fact sets consulted in addition to `lookup` for
/// the non-delta patterns (the engine passes the accumulated fact set and
/// the current iteration's prior-stratum derivations).
///
/// The caller subtracts already-known facts from the result; this function
/// only guarantees every returned triple is a ground instantiation of the
/// head under some delta-touching body match that satisfies all
/// conditions.
pub fn apply_rule_delta(
    lookup: &LookupFn,
    rule: &Rule,
    delta: &FactSet,
    locals: &[&FactSet],
) -> ReasoningResult<FactSet> {
    let pattern_count = rule.body_patterns().len();
    let mut results = FactSet::default();

    for delta_index in 0..pattern_count {
        let survivors = match_body(lookup, rule, delta, locals, delta_index)?;
        for binding in survivors {
            let head = substitute_pattern(&rule.head, &binding);
            match head.to_triple() {
                Some(triple) => {
                    results.insert(triple);
                }
                None => {
                    return Err(ReasoningError::InvalidRule {
                        name: rule.name.clone(),
                        reason: format!("head {head} not ground after body match"),
                    })
                }
            }
        }
    }

    Ok(results)
}

/// Walk the body in order, extending the binding set pattern by pattern.
/// The pattern at `delta_index` matches only the delta; every other
/// pattern matches the existing population. Conditions are applied in
/// place once their variables are bound, or at the end otherwise.
fn match_body(
    lookup: &LookupFn,
    rule: &Rule,
    delta: &FactSet,
    locals: &[&FactSet],
    delta_index: usize,
) -> ReasoningResult<Vec<Bindings>> {
    let mut bindings: Vec<Bindings> = vec![Bindings::new()];
    let mut deferred = Vec::new();
    let mut pattern_index = 0usize;

    for element in &rule.body {
        if bindings.is_empty() {
            return Ok(Vec::new());
        }
        match element {
            BodyElement::Pattern(pattern) => {
                let mut extended: AHashSet<Bindings> = AHashSet::default();
                for binding in &bindings {
                    if pattern_index == delta_index {
                        for fact in delta {
                            if let Some(next) = extend_binding(binding, pattern, fact) {
                                extended.insert(next);
                            }
                        }
                    } else {
                        // Ground what we can so the storage lookup selects
                        // by prefix; unification still runs against the
                        // original pattern.
                        let grounded = substitute_pattern(pattern, binding);
                        for fact in lookup(&grounded)? {
                            if let Some(next) = extend_binding(binding, pattern, &fact) {
                                extended.insert(next);
                            }
                        }
                        if let Some(exact) = grounded.to_triple() {
                            // Fully bound: a membership probe replaces the scan
                            if locals.iter().any(|local| local.contains(&exact)) {
                                if let Some(next) = extend_binding(binding, pattern, &exact) {
                                    extended.insert(next);
                                }
                            }
                        } else {
                            for local in locals {
                                for fact in filter_matching(local, &grounded) {
                                    if let Some(next) = extend_binding(binding, pattern, fact) {
                                        extended.insert(next);
                                    }
                                }
                            }
                        }
                    }
                }
                bindings = extended.into_iter().collect();
                pattern_index += 1;
            }
            BodyElement::Condition(condition) => {
                let vars = condition.variables();
                let decidable =
                    |b: &Bindings| vars.iter().all(|v| b.contains_key(v));
                // A condition sitting before all its variables bind cannot
                // be decided yet; keep it for the end.
                if bindings.iter().all(|b| decidable(b)) {
                    bindings.retain(|b| crate::model::evaluate_condition(condition, b));
                } else {
                    deferred.push(condition);
                }
            }
        }
    }

    bindings.retain(|b| {
        deferred
            .iter()
            .all(|c| crate::model::evaluate_condition(c, b))
    });
    Ok(bindings)
}
