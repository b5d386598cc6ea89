//! TBox cache
//!
//! Precomputed transitive closures of the class and property hierarchies,
//! plus the OWL property characteristics, published as immutable
//! process-wide snapshots. Recomputed only when a batch of modified
//! triples actually touches TBox vocabulary.

use crate::facts::FactSet;
use crate::registry::{SnapshotRegistry, Versioned};
use crate::{ReasoningError, ReasoningResult};
use ahash::{AHashMap, AHashSet};
use rdf_model::{vocab, Term, Triple};
use std::sync::OnceLock;

/// Closure iteration cap; a hierarchy that has not settled by then is
/// treated as pathological.
const MAX_CLOSURE_ITERATIONS: usize = 1000;

type TermSetMap = AHashMap<Term, AHashSet<Term>>;

/// Statistics captured when a hierarchy snapshot is built.
#[derive(Clone, Debug, Default)]
pub struct HierarchyStats {
    /// Number of nodes in the hierarchy
    pub nodes: usize,
    /// Number of direct edges extracted
    pub direct_edges: usize,
    /// Fixpoint iterations the closure needed
    pub iterations: usize,
}

/// Transitive closure of `rdfs:subClassOf`.
#[derive(Clone, Debug)]
pub struct ClassHierarchy {
    superclasses: TermSetMap,
    subclasses: TermSetMap,
    /// Build statistics
    pub stats: HierarchyStats,
    /// Snapshot version
    pub version: u64,
}

impl ClassHierarchy {
    /// Compute the hierarchy from the current fact set.
    pub fn compute(facts: &FactSet) -> ReasoningResult<Self> {
        let sub_class_of = Term::iri(vocab::RDFS_SUB_CLASS_OF);
        let direct = extract_direct(facts, &sub_class_of);
        let direct_edges = direct.values().map(|s: &AHashSet<Term>| s.len()).sum();

        let (superclasses, iterations) = transitive_closure(direct)?;
        let subclasses = invert(&superclasses);

        Ok(Self {
            stats: HierarchyStats {
                nodes: superclasses.len(),
                direct_edges,
                iterations,
            },
            version: rand::random(),
            superclasses,
            subclasses,
        })
    }

    /// All superclasses of a class, transitively
    pub fn superclasses(&self, class: &Term) -> AHashSet<Term> {
        self.superclasses.get(class).cloned().unwrap_or_default()
    }

    /// All subclasses of a class, transitively
    pub fn subclasses(&self, class: &Term) -> AHashSet<Term> {
        self.subclasses.get(class).cloned().unwrap_or_default()
    }

    /// Number of classes known to the hierarchy
    pub fn len(&self) -> usize {
        self.superclasses.len()
    }

    /// Check if the hierarchy is empty
    pub fn is_empty(&self) -> bool {
        self.superclasses.is_empty()
    }
}

impl Versioned for ClassHierarchy {
    fn version(&self) -> u64 {
        self.version
    }
}

/// The OWL property characteristics, extracted in a single pass.
#[derive(Clone, Debug, Default)]
pub struct PropertyCharacteristics {
    /// Properties declared transitive
    pub transitive: AHashSet<Term>,
    /// Properties declared symmetric
    pub symmetric: AHashSet<Term>,
    /// Properties declared functional
    pub functional: AHashSet<Term>,
    /// Properties declared inverse-functional
    pub inverse_functional: AHashSet<Term>,
    /// Inverse pairs, stored in both directions
    pub inverse_pairs: AHashMap<Term, Term>,
}

/// Transitive closure of `rdfs:subPropertyOf` plus characteristics.
#[derive(Clone, Debug)]
pub struct PropertyHierarchy {
    superproperties: TermSetMap,
    subproperties: TermSetMap,
    /// Property characteristics
    pub characteristics: PropertyCharacteristics,
    /// Build statistics
    pub stats: HierarchyStats,
    /// Snapshot version
    pub version: u64,
}

impl PropertyHierarchy {
    /// Compute the hierarchy and characteristics from the current fact
    /// set. Characteristics come out of one pass over the facts.
    pub fn compute(facts: &FactSet) -> ReasoningResult<Self> {
        let sub_property_of = Term::iri(vocab::RDFS_SUB_PROPERTY_OF);
        let direct = extract_direct(facts, &sub_property_of);
        let direct_edges = direct.values().map(|s: &AHashSet<Term>| s.len()).sum();

        let rdf_type = Term::iri(vocab::RDF_TYPE);
        let inverse_of = Term::iri(vocab::OWL_INVERSE_OF);
        let transitive_class = Term::iri(vocab::OWL_TRANSITIVE_PROPERTY);
        let symmetric_class = Term::iri(vocab::OWL_SYMMETRIC_PROPERTY);
        let functional_class = Term::iri(vocab::OWL_FUNCTIONAL_PROPERTY);
        let inverse_functional_class = Term::iri(vocab::OWL_INVERSE_FUNCTIONAL_PROPERTY);

        let mut characteristics = PropertyCharacteristics::default();
        for triple in facts {
            if triple.predicate == rdf_type {
                let target = if triple.object == transitive_class {
                    &mut characteristics.transitive
                } else if triple.object == symmetric_class {
                    &mut characteristics.symmetric
                } else if triple.object == functional_class {
                    &mut characteristics.functional
                } else if triple.object == inverse_functional_class {
                    &mut characteristics.inverse_functional
                } else {
                    continue;
                };
                target.insert(triple.subject.clone());
            } else if triple.predicate == inverse_of {
                characteristics
                    .inverse_pairs
                    .insert(triple.subject.clone(), triple.object.clone());
                characteristics
                    .inverse_pairs
                    .insert(triple.object.clone(), triple.subject.clone());
            }
        }

        let (superproperties, iterations) = transitive_closure(direct)?;
        let subproperties = invert(&superproperties);

        Ok(Self {
            stats: HierarchyStats {
                nodes: superproperties.len(),
                direct_edges,
                iterations,
            },
            version: rand::random(),
            superproperties,
            subproperties,
            characteristics,
        })
    }

    /// All superproperties of a property, transitively
    pub fn superproperties(&self, property: &Term) -> AHashSet<Term> {
        self.superproperties.get(property).cloned().unwrap_or_default()
    }

    /// All subproperties of a property, transitively
    pub fn subproperties(&self, property: &Term) -> AHashSet<Term> {
        self.subproperties.get(property).cloned().unwrap_or_default()
    }

    /// Check if a property is declared transitive
    pub fn is_transitive(&self, property: &Term) -> bool {
        self.characteristics.transitive.contains(property)
    }

    /// Check if a property is declared symmetric
    pub fn is_symmetric(&self, property: &Term) -> bool {
        self.characteristics.symmetric.contains(property)
    }

    /// Check if a property is declared functional
    pub fn is_functional(&self, property: &Term) -> bool {
        self.characteristics.functional.contains(property)
    }

    /// Check if a property is declared inverse-functional
    pub fn is_inverse_functional(&self, property: &Term) -> bool {
        self.characteristics.inverse_functional.contains(property)
    }

    /// The declared inverse of a property, in either direction
    pub fn inverse_of(&self, property: &Term) -> Option<&Term> {
        self.characteristics.inverse_pairs.get(property)
    }
}

impl Versioned for PropertyHierarchy {
    fn version(&self) -> u64 {
        self.version
    }
}

/// Direct-successor map from all triples with the given predicate.
/// Nodes appearing only as targets get an empty entry so every mentioned
/// node is known to the hierarchy.
fn extract_direct(facts: &FactSet, predicate: &Term) -> TermSetMap {
    let mut direct: TermSetMap = AHashMap::new();
    for triple in facts {
        if &triple.predicate == predicate {
            direct
                .entry(triple.subject.clone())
                .or_default()
                .insert(triple.object.clone());
            direct.entry(triple.object.clone()).or_default();
        }
    }
    direct
}

/// Iterative fixpoint: expand each node's successor set by its
/// successors' sets until nothing changes. Cycles settle (sets stop
/// growing) rather than loop.
fn transitive_closure(mut map: TermSetMap) -> ReasoningResult<(TermSetMap, usize)> {
    let mut iterations = 0;
    loop {
        if iterations >= MAX_CLOSURE_ITERATIONS {
            return Err(ReasoningError::MaxIterationsExceeded(MAX_CLOSURE_ITERATIONS));
        }
        iterations += 1;

        let mut changed = false;
        let keys: Vec<Term> = map.keys().cloned().collect();
        for key in keys {
            let reachable: AHashSet<Term> = map[&key]
                .iter()
                .filter_map(|next| map.get(next))
                .flatten()
                .cloned()
                .collect();
            let entry = map.entry(key).or_default();
            let before = entry.len();
            entry.extend(reachable);
            changed |= entry.len() != before;
        }

        if !changed {
            return Ok((map, iterations));
        }
    }
}

fn invert(map: &TermSetMap) -> TermSetMap {
    let mut inverted: TermSetMap = AHashMap::new();
    for (node, successors) in map {
        inverted.entry(node.clone()).or_default();
        for successor in successors {
            inverted
                .entry(successor.clone())
                .or_default()
                .insert(node.clone());
        }
    }
    inverted
}

/// Which caches a batch of modified triples invalidates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TboxImpact {
    /// Class hierarchy affected
    pub class: bool,
    /// Property hierarchy or characteristics affected
    pub property: bool,
}

impl TboxImpact {
    /// Any cache affected
    pub fn any(&self) -> bool {
        self.class || self.property
    }
}

fn tbox_predicates() -> &'static AHashSet<&'static str> {
    static PREDICATES: OnceLock<AHashSet<&'static str>> = OnceLock::new();
    PREDICATES.get_or_init(|| {
        [
            vocab::RDFS_SUB_CLASS_OF,
            vocab::RDFS_SUB_PROPERTY_OF,
            vocab::OWL_INVERSE_OF,
            vocab::RDFS_DOMAIN,
            vocab::RDFS_RANGE,
        ]
        .into_iter()
        .collect()
    })
}

fn characteristic_classes() -> &'static AHashSet<&'static str> {
    static CLASSES: OnceLock<AHashSet<&'static str>> = OnceLock::new();
    CLASSES.get_or_init(|| {
        [
            vocab::OWL_TRANSITIVE_PROPERTY,
            vocab::OWL_SYMMETRIC_PROPERTY,
            vocab::OWL_FUNCTIONAL_PROPERTY,
            vocab::OWL_INVERSE_FUNCTIONAL_PROPERTY,
        ]
        .into_iter()
        .collect()
    })
}

/// A triple modifies the TBox iff its predicate is schema vocabulary, or
/// it types a property with one of the four characteristic classes.
pub fn is_tbox_triple(triple: &Triple) -> bool {
    match triple.predicate.as_iri() {
        Some(vocab::RDF_TYPE) => triple
            .object
            .as_iri()
            .is_some_and(|o| characteristic_classes().contains(o)),
        Some(predicate) => tbox_predicates().contains(predicate),
        None => false,
    }
}

/// Categorize a batch of modified triples without touching any state.
pub fn needs_recomputation(modified: &[Triple]) -> TboxImpact {
    let mut impact = TboxImpact::default();
    for triple in modified {
        match triple.predicate.as_iri() {
            Some(vocab::RDFS_SUB_CLASS_OF) => impact.class = true,
            Some(vocab::RDFS_SUB_PROPERTY_OF) | Some(vocab::OWL_INVERSE_OF) => {
                impact.property = true
            }
            Some(vocab::RDFS_DOMAIN) | Some(vocab::RDFS_RANGE) => {
                // Domain/range feed rule applicability, not the
                // hierarchies themselves; either cache may hold stale
                // statistics, so flag both.
                impact.class = true;
                impact.property = true;
            }
            Some(vocab::RDF_TYPE)
                if triple
                    .object
                    .as_iri()
                    .is_some_and(|o| characteristic_classes().contains(o)) =>
            {
                impact.property = true;
            }
            _ => {}
        }
        if impact.class && impact.property {
            break;
        }
    }
    impact
}

/// The process-wide class-hierarchy registry.
pub fn class_hierarchies() -> &'static SnapshotRegistry<ClassHierarchy> {
    static REGISTRY: OnceLock<SnapshotRegistry<ClassHierarchy>> = OnceLock::new();
    REGISTRY.get_or_init(SnapshotRegistry::new)
}

/// The process-wide property-hierarchy registry.
pub fn property_hierarchies() -> &'static SnapshotRegistry<PropertyHierarchy> {
    static REGISTRY: OnceLock<SnapshotRegistry<PropertyHierarchy>> = OnceLock::new();
    REGISTRY.get_or_init(SnapshotRegistry::new)
}

/// Invalidate the affected snapshots for `key` and, when `recompute` is
/// set, rebuild them from `current_facts` and republish.
pub fn handle_tbox_update(
    modified: &[Triple],
    current_facts: &FactSet,
    key: &str,
    recompute: bool,
) -> ReasoningResult<TboxImpact> {
    let impact = needs_recomputation(modified);

    if impact.class {
        class_hierarchies().remove(key);
        if recompute {
            class_hierarchies().store(key, ClassHierarchy::compute(current_facts)?)?;
        }
    }
    if impact.property {
        property_hierarchies().remove(key);
        if recompute {
            property_hierarchies().store(key, PropertyHierarchy::compute(current_facts)?)?;
        }
    }

    Ok(impact)
}
