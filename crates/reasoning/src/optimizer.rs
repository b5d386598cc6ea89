//! Rule optimizer
//!
//! Three independent transformations over compiled rules:
//! 1. Greedy pattern reordering by estimated selectivity
//! 2. Condition placement at the earliest point where all variables are
//!    bound
//! 3. Batching by head predicate so the engine can share intermediates
//!
//! Plus dead-rule detection against the schema snapshot.

use crate::catalog::RuleDefinition;
use crate::model::{BodyElement, Condition, Rule};
use crate::schema::SchemaInfo;
use rdf_model::{Pattern, Term};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

/// Optional predicate frequency statistics for selectivity estimation.
#[derive(Clone, Debug, Default)]
pub struct PredicateStats {
    /// Triple count per predicate IRI
    pub counts: FxHashMap<String, u64>,
    /// Total triple count
    pub total: u64,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Position {
    Subject,
    Predicate,
    Object,
}

fn position_selectivity(
    term: &Term,
    position: Position,
    bound: &BTreeSet<String>,
    stats: Option<&PredicateStats>,
) -> f64 {
    match term {
        Term::Variable(name) => {
            if bound.contains(name) {
                0.01
            } else {
                match position {
                    Position::Subject | Position::Object => 0.1,
                    Position::Predicate => 0.01,
                }
            }
        }
        Term::Iri(iri) => match position {
            Position::Predicate => {
                if let Some(stats) = stats.filter(|s| s.total > 0) {
                    if let Some(&count) = stats.counts.get(iri) {
                        return (count as f64 / stats.total as f64).max(f64::MIN_POSITIVE);
                    }
                }
                0.001
            }
            Position::Subject | Position::Object => 0.01,
        },
        // Blank nodes select like any other individual constant
        Term::BlankNode(_) => 0.01,
        Term::PlainLiteral(_) | Term::TypedLiteral { .. } | Term::LangLiteral { .. } => 0.001,
    }
}

/// Estimated fraction of the database matching `pattern` given the
/// currently bound variables. Product of position selectivities
/// (independence assumption); lower is more selective.
pub fn estimate_selectivity(
    pattern: &Pattern,
    bound: &BTreeSet<String>,
    stats: Option<&PredicateStats>,
) -> f64 {
    position_selectivity(&pattern.subject, Position::Subject, bound, stats)
        * position_selectivity(&pattern.predicate, Position::Predicate, bound, stats)
        * position_selectivity(&pattern.object, Position::Object, bound, stats)
}

/// Greedy reorder: repeatedly pick the unplaced pattern with minimum
/// estimated selectivity under the variables bound so far. Ties keep the
/// original relative order.
pub fn reorder_patterns(patterns: &[Pattern], stats: Option<&PredicateStats>) -> Vec<Pattern> {
    let mut remaining: Vec<(usize, &Pattern)> = patterns.iter().enumerate().collect();
    let mut bound: BTreeSet<String> = BTreeSet::new();
    let mut ordered = Vec::with_capacity(patterns.len());

    while !remaining.is_empty() {
        let mut best = 0;
        let mut best_cost = f64::INFINITY;
        for (slot, (_, pattern)) in remaining.iter().enumerate() {
            let cost = estimate_selectivity(pattern, &bound, stats);
            if cost < best_cost {
                best_cost = cost;
                best = slot;
            }
        }
        let (_, pattern) = remaining.remove(best);
        bound.extend(pattern.variables());
        ordered.push(pattern.clone());
    }

    ordered
}

/// Interleave conditions into an ordered pattern list at the earliest
/// position where all their variables are bound. Conditions whose
/// variables never all bind go last. Relative condition order is kept for
/// ties.
pub fn place_conditions(patterns: Vec<Pattern>, conditions: Vec<Condition>) -> Vec<BodyElement> {
    // earliest insertion point per condition: after pattern k such that
    // vars(condition) ⊆ vars(patterns[..=k])
    let mut bound_after: Vec<BTreeSet<String>> = Vec::with_capacity(patterns.len());
    let mut acc = BTreeSet::new();
    for pattern in &patterns {
        acc.extend(pattern.variables());
        bound_after.push(acc.clone());
    }

    let tail = patterns.len();
    let mut placed: Vec<(usize, usize, Condition)> = conditions
        .into_iter()
        .enumerate()
        .map(|(order, condition)| {
            let vars = condition.variables();
            let slot = bound_after
                .iter()
                .position(|bound| vars.is_subset(bound))
                .unwrap_or(tail);
            (slot, order, condition)
        })
        .collect();
    placed.sort_by_key(|(slot, order, _)| (*slot, *order));

    let mut body = Vec::with_capacity(tail + placed.len());
    let mut placed = placed.into_iter().peekable();
    for (idx, pattern) in patterns.into_iter().enumerate() {
        body.push(BodyElement::Pattern(pattern));
        while let Some((_, _, condition)) = placed.next_if(|(slot, _, _)| *slot == idx) {
            body.push(BodyElement::Condition(condition));
        }
    }
    for (_, _, condition) in placed {
        body.push(BodyElement::Condition(condition));
    }
    body
}

/// Reorder one rule's body and re-place its conditions.
pub fn optimize_rule(rule: &Rule, stats: Option<&PredicateStats>) -> Rule {
    let patterns: Vec<Pattern> = rule.body_patterns().into_iter().cloned().collect();
    let conditions: Vec<Condition> = rule.body_conditions().into_iter().cloned().collect();
    let body = place_conditions(reorder_patterns(&patterns, stats), conditions);
    Rule::new(rule.name.clone(), rule.head.clone(), body)
}

/// A rule is dead when its required schema feature is absent.
pub fn is_dead(definition: &RuleDefinition, schema: &SchemaInfo) -> bool {
    !schema.satisfies(definition.requirement)
}

/// Names of the dead rules in a definition list.
pub fn dead_rules(definitions: &[RuleDefinition], schema: &SchemaInfo) -> Vec<String> {
    definitions
        .iter()
        .filter(|d| is_dead(d, schema))
        .map(|d| d.rule.name.clone())
        .collect()
}

/// How a batch of rules relates.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BatchType {
    /// Multiple rules with a shared head predicate and overlapping bodies
    SamePredicate,
    /// All heads share the same variable/constant skeleton
    SameHead,
    /// No sharing detected
    Independent,
}

/// Rules grouped by head predicate, with the patterns they share.
#[derive(Clone, Debug)]
pub struct RuleBatch {
    /// Batch classification
    pub batch_type: BatchType,
    /// The grouping predicate
    pub head_predicate: Term,
    /// Member rules
    pub rules: Vec<Rule>,
    /// Body patterns appearing in more than one member
    pub shared_patterns: Vec<Pattern>,
}

fn head_skeleton(pattern: &Pattern) -> [Option<&Term>; 3] {
    // Variables erase to None; constants keep their identity
    fn slot(t: &Term) -> Option<&Term> {
        if t.is_variable() {
            None
        } else {
            Some(t)
        }
    }
    [
        slot(&pattern.subject),
        slot(&pattern.predicate),
        slot(&pattern.object),
    ]
}

/// Group rules by head predicate and classify each group.
pub fn batch_rules(rules: &[Rule]) -> Vec<RuleBatch> {
    let mut groups: Vec<(Term, Vec<&Rule>)> = Vec::new();
    for rule in rules {
        let key = rule.head.predicate.clone();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(rule),
            None => groups.push((key, vec![rule])),
        }
    }

    groups
        .into_iter()
        .map(|(head_predicate, members)| {
            let mut pattern_uses: FxHashMap<&Pattern, usize> = FxHashMap::default();
            for rule in &members {
                for pattern in rule.body_patterns() {
                    *pattern_uses.entry(pattern).or_default() += 1;
                }
            }
            let shared_patterns: Vec<Pattern> = pattern_uses
                .into_iter()
                .filter(|(_, uses)| *uses > 1)
                .map(|(p, _)| p.clone())
                .collect();

            let batch_type = if members.len() > 1 && !shared_patterns.is_empty() {
                BatchType::SamePredicate
            } else if members.len() > 1
                && members
                    .windows(2)
                    .all(|w| head_skeleton(&w[0].head) == head_skeleton(&w[1].head))
            {
                BatchType::SameHead
            } else {
                BatchType::Independent
            };

            RuleBatch {
                batch_type,
                head_predicate,
                rules: members.into_iter().cloned().collect(),
                shared_patterns,
            }
        })
        .collect()
}
