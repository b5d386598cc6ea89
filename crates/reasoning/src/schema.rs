//! Schema extraction
//!
//! Probes the current fact population for the TBox features that decide
//! rule applicability and specialization. Enumerations are bounded by
//! `max_properties` so a hostile ontology cannot balloon the compiler.

use crate::catalog::SchemaRequirement;
use crate::facts::LookupFn;
use crate::ReasoningResult;
use ahash::AHashSet;
use rdf_model::{vocab, Pattern, Term};

/// Options for schema extraction.
#[derive(Clone, Debug)]
pub struct SchemaOptions {
    /// Upper bound on each property-characteristic enumeration
    pub max_properties: usize,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            max_properties: 10_000,
        }
    }
}

/// The schema features extracted from the current explicit+derived state.
#[derive(Clone, Debug, Default)]
pub struct SchemaInfo {
    /// `rdfs:subClassOf` triples present
    pub has_subclass: bool,
    /// `rdfs:subPropertyOf` triples present
    pub has_subproperty: bool,
    /// `rdfs:domain` triples present
    pub has_domain: bool,
    /// `rdfs:range` triples present
    pub has_range: bool,
    /// `owl:sameAs` triples present
    pub has_sameas: bool,
    /// Restriction vocabulary (`owl:onProperty`) present
    pub has_restrictions: bool,
    /// `owl:equivalentClass` or `owl:equivalentProperty` present
    pub has_equivalence: bool,
    /// IRIs declared `owl:TransitiveProperty`
    pub transitive_properties: AHashSet<String>,
    /// IRIs declared `owl:SymmetricProperty`
    pub symmetric_properties: AHashSet<String>,
    /// IRIs declared `owl:FunctionalProperty`
    pub functional_properties: AHashSet<String>,
    /// IRIs declared `owl:InverseFunctionalProperty`
    pub inverse_functional_properties: AHashSet<String>,
    /// `owl:inverseOf` pairs, as asserted
    pub inverse_pairs: Vec<(String, String)>,
    /// Snapshot version for cache invalidation
    pub version: u64,
}

impl SchemaInfo {
    /// Check whether a rule's schema requirement is met.
    pub fn satisfies(&self, requirement: SchemaRequirement) -> bool {
        match requirement {
            SchemaRequirement::Always => true,
            SchemaRequirement::SubClass => self.has_subclass,
            SchemaRequirement::SubProperty => self.has_subproperty,
            SchemaRequirement::Domain => self.has_domain,
            SchemaRequirement::Range => self.has_range,
            SchemaRequirement::SameAs => self.has_sameas,
            SchemaRequirement::Restrictions => self.has_restrictions,
            SchemaRequirement::Equivalence => self.has_equivalence,
            SchemaRequirement::Transitive => !self.transitive_properties.is_empty(),
            SchemaRequirement::Symmetric => !self.symmetric_properties.is_empty(),
            SchemaRequirement::Functional => !self.functional_properties.is_empty(),
            SchemaRequirement::InverseFunctional => !self.inverse_functional_properties.is_empty(),
            SchemaRequirement::Inverse => !self.inverse_pairs.is_empty(),
        }
    }

    /// The enumerated properties backing a characteristic requirement, if
    /// the requirement has one.
    pub fn enumeration(&self, requirement: SchemaRequirement) -> Option<&AHashSet<String>> {
        match requirement {
            SchemaRequirement::Transitive => Some(&self.transitive_properties),
            SchemaRequirement::Symmetric => Some(&self.symmetric_properties),
            SchemaRequirement::Functional => Some(&self.functional_properties),
            SchemaRequirement::InverseFunctional => Some(&self.inverse_functional_properties),
            _ => None,
        }
    }
}

fn any_with_predicate(lookup: &LookupFn, predicate: &str) -> ReasoningResult<bool> {
    let pattern = Pattern::new(Term::var("s"), Term::iri(predicate), Term::var("o"));
    Ok(!lookup(&pattern)?.is_empty())
}

fn properties_of_class(
    lookup: &LookupFn,
    class_iri: &str,
    cap: usize,
) -> ReasoningResult<AHashSet<String>> {
    let pattern = Pattern::new(
        Term::var("p"),
        Term::iri(vocab::RDF_TYPE),
        Term::iri(class_iri),
    );
    Ok(lookup(&pattern)?
        .into_iter()
        .filter_map(|t| t.subject.as_iri().map(str::to_owned))
        .take(cap)
        .collect())
}

/// Extract a schema snapshot from the fact population behind `lookup`.
pub fn extract_schema(lookup: &LookupFn, opts: &SchemaOptions) -> ReasoningResult<SchemaInfo> {
    let cap = opts.max_properties;

    let inverse_pairs: Vec<(String, String)> = lookup(&Pattern::new(
        Term::var("p1"),
        Term::iri(vocab::OWL_INVERSE_OF),
        Term::var("p2"),
    ))?
    .into_iter()
    .filter_map(|t| match (t.subject.as_iri(), t.object.as_iri()) {
        (Some(a), Some(b)) => Some((a.to_owned(), b.to_owned())),
        _ => None,
    })
    .take(cap)
    .collect();

    Ok(SchemaInfo {
        has_subclass: any_with_predicate(lookup, vocab::RDFS_SUB_CLASS_OF)?,
        has_subproperty: any_with_predicate(lookup, vocab::RDFS_SUB_PROPERTY_OF)?,
        has_domain: any_with_predicate(lookup, vocab::RDFS_DOMAIN)?,
        has_range: any_with_predicate(lookup, vocab::RDFS_RANGE)?,
        has_sameas: any_with_predicate(lookup, vocab::OWL_SAME_AS)?,
        has_restrictions: any_with_predicate(lookup, vocab::OWL_ON_PROPERTY)?,
        has_equivalence: any_with_predicate(lookup, vocab::OWL_EQUIVALENT_CLASS)?
            || any_with_predicate(lookup, vocab::OWL_EQUIVALENT_PROPERTY)?,
        transitive_properties: properties_of_class(lookup, vocab::OWL_TRANSITIVE_PROPERTY, cap)?,
        symmetric_properties: properties_of_class(lookup, vocab::OWL_SYMMETRIC_PROPERTY, cap)?,
        functional_properties: properties_of_class(lookup, vocab::OWL_FUNCTIONAL_PROPERTY, cap)?,
        inverse_functional_properties: properties_of_class(
            lookup,
            vocab::OWL_INVERSE_FUNCTIONAL_PROPERTY,
            cap,
        )?,
        inverse_pairs,
        version: rand::random(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{set_lookup, FactSet};
    use rdf_model::Triple;

    fn ex(local: &str) -> Term {
        Term::iri(format!("http://example.org/{local}"))
    }

    fn schema_from(triples: Vec<Triple>) -> SchemaInfo {
        let facts: FactSet = triples.into_iter().collect();
        extract_schema(&set_lookup(facts), &SchemaOptions::default()).unwrap()
    }

    #[test]
    fn test_empty_schema() {
        let schema = schema_from(vec![]);
        assert!(!schema.has_subclass);
        assert!(!schema.satisfies(SchemaRequirement::Transitive));
        assert!(schema.satisfies(SchemaRequirement::Always));
    }

    #[test]
    fn test_flags_and_enumerations() {
        let schema = schema_from(vec![
            Triple::new(ex("Student"), Term::iri(vocab::RDFS_SUB_CLASS_OF), ex("Person")),
            Triple::new(
                ex("partOf"),
                Term::iri(vocab::RDF_TYPE),
                Term::iri(vocab::OWL_TRANSITIVE_PROPERTY),
            ),
            Triple::new(ex("hasParent"), Term::iri(vocab::OWL_INVERSE_OF), ex("hasChild")),
        ]);

        assert!(schema.has_subclass);
        assert!(!schema.has_domain);
        assert!(schema
            .transitive_properties
            .contains("http://example.org/partOf"));
        assert_eq!(
            schema.inverse_pairs,
            vec![(
                "http://example.org/hasParent".to_string(),
                "http://example.org/hasChild".to_string()
            )]
        );
        assert!(schema.satisfies(SchemaRequirement::Inverse));
    }

    #[test]
    fn test_max_properties_cap() {
        let triples: Vec<Triple> = (0..50)
            .map(|i| {
                Triple::new(
                    ex(&format!("p{i}")),
                    Term::iri(vocab::RDF_TYPE),
                    Term::iri(vocab::OWL_TRANSITIVE_PROPERTY),
                )
            })
            .collect();
        let facts: FactSet = triples.into_iter().collect();
        let opts = SchemaOptions { max_properties: 10 };
        let schema = extract_schema(&set_lookup(facts), &opts).unwrap();
        assert_eq!(schema.transitive_properties.len(), 10);
    }
}
