//! End-to-end deletion scenarios (Backward/Forward).

use std::sync::Arc;

use rdf_model::{vocab, Term, Triple};
use reasoning::catalog::Profile;
use reasoning::retract::{can_rederive, DeleteOptions};
use reasoning::facts::FactSet;
use reasoning::{Reasoner, ReasonerOptions, ReasoningMode};
use storage::MemoryBackend;

fn ex(local: &str) -> Term {
    Term::iri(format!("http://example.org/{local}"))
}

fn typed(x: &str, c: &str) -> Triple {
    Triple::new(ex(x), Term::iri(vocab::RDF_TYPE), ex(c))
}

fn sco(sub: &str, sup: &str) -> Triple {
    Triple::new(ex(sub), Term::iri(vocab::RDFS_SUB_CLASS_OF), ex(sup))
}

fn rdfs_reasoner() -> Reasoner<MemoryBackend> {
    Reasoner::configure(
        Arc::new(MemoryBackend::new()),
        Profile::Rdfs,
        ReasoningMode::Materialized,
        ReasonerOptions::default(),
    )
}

fn rdfs_rules() -> Vec<reasoning::Rule> {
    reasoning::catalog::rules_for_profile(Profile::Rdfs)
        .into_iter()
        .map(|d| d.rule)
        .collect()
}

/// Deletion soundness: every remaining derived fact must still be
/// derivable from the remaining population.
fn assert_sound(r: &Reasoner<MemoryBackend>) {
    let explicit = r.explicit_facts().unwrap();
    let derived = r.derived_facts().unwrap();
    let rules = rdfs_rules();
    let mut pool: FactSet = explicit.clone();
    pool.extend(derived.iter().cloned());
    for fact in &derived {
        pool.remove(fact);
        assert!(
            can_rederive(fact, &pool, &rules, 1_000_000).unwrap(),
            "derived fact {fact} survives without justification"
        );
        pool.insert(fact.clone());
    }
}

#[test]
fn deleting_sole_justification_retracts_derivation() {
    let mut r = rdfs_reasoner();
    r.materialize(Some(vec![sco("Student", "Person"), typed("alice", "Student")]))
        .unwrap();

    let stats = r.delete(&[typed("alice", "Student")]).unwrap();
    assert_eq!(stats.explicit_deleted, 1);
    assert_eq!(stats.derived_deleted, 1);
    assert_eq!(stats.derived_kept, 0);

    let status = r.status().unwrap();
    assert_eq!(status.explicit_count, 1); // Student subClassOf Person stays
    assert_eq!(status.derived_count, 0);
}

#[test]
fn alternative_justification_is_kept() {
    let mut r = rdfs_reasoner();
    r.materialize(Some(vec![
        sco("Student", "Person"),
        sco("GradStudent", "Person"),
        typed("alice", "Student"),
        typed("alice", "GradStudent"),
    ]))
    .unwrap();
    assert_eq!(r.status().unwrap().derived_count, 1);

    let stats = r.delete(&[typed("alice", "Student")]).unwrap();
    assert_eq!(stats.explicit_deleted, 1);
    // alice type Person is re-derivable via GradStudent and must remain
    assert_eq!(stats.derived_kept, 1);
    assert_eq!(stats.derived_deleted, 0);
    assert_eq!(r.status().unwrap().derived_count, 1);
}

#[test]
fn deleting_a_derived_fact_directly() {
    let mut r = rdfs_reasoner();
    r.materialize(Some(vec![sco("Student", "Person"), typed("alice", "Student")]))
        .unwrap();

    let stats = r.delete(&[typed("alice", "Person")]).unwrap();
    assert_eq!(stats.explicit_deleted, 0);
    assert_eq!(stats.derived_deleted, 1);
    assert_eq!(r.status().unwrap().explicit_count, 2);
}

#[test]
fn bulk_deletion_chunks_and_aggregates() {
    let mut r = rdfs_reasoner();
    let mut seed = vec![sco("Student", "Person")];
    for i in 0..20 {
        seed.push(typed(&format!("s{i}"), "Student"));
    }
    r.materialize(Some(seed)).unwrap();
    assert_eq!(r.status().unwrap().derived_count, 20);

    let requests: Vec<Triple> = (0..20).map(|i| typed(&format!("s{i}"), "Student")).collect();
    let stats = r.delete(&requests).unwrap();
    assert_eq!(stats.explicit_deleted, 20);
    assert_eq!(stats.derived_deleted, 20);
    assert_eq!(r.status().unwrap().derived_count, 0);
}

#[test]
fn deletion_depth_bound_chain() {
    // A 120-deep subclass chain exceeds the default trace depth of 100;
    // the operation must still succeed, possibly over-deleting, and the
    // result must stay sound.
    let chain_length: usize = 120;
    let mut seed = Vec::new();
    for i in 0..chain_length {
        seed.push(sco(&format!("C{i}"), &format!("C{}", i + 1)));
    }
    seed.push(typed("alice", "C0"));

    let mut r = rdfs_reasoner();
    r.materialize(Some(seed)).unwrap();

    let before = r.status().unwrap();
    assert!(before.derived_count > 0);

    let options = DeleteOptions::default();
    assert_eq!(options.max_trace_depth, 100);
    let stats = r.delete(&[typed("alice", "C0")]).unwrap();
    assert_eq!(stats.explicit_deleted, 1);
    // Every alice-typing hung off alice type C0
    assert!(stats.derived_deleted >= chain_length);

    // No alice-typing survives, and what remains is sound
    let after = r.status().unwrap();
    assert!(after.derived_count < before.derived_count);
    let derived = r.derived_facts().unwrap();
    assert!(!derived.iter().any(|t| t.subject == ex("alice")));
    assert_sound(&r);
}

#[test]
fn deletion_soundness_invariant() {
    let mut r = rdfs_reasoner();
    r.materialize(Some(vec![
        sco("Student", "Person"),
        sco("Person", "Agent"),
        sco("GradStudent", "Person"),
        typed("alice", "Student"),
        typed("alice", "GradStudent"),
        typed("bob", "Person"),
    ]))
    .unwrap();

    r.delete(&[typed("alice", "Student"), typed("bob", "Person")])
        .unwrap();

    // alice type Person survives via GradStudent, and everything left in
    // the derived store has a justification.
    let derived = r.derived_facts().unwrap();
    assert!(derived.contains(&typed("alice", "Person")));
    assert_sound(&r);
}
