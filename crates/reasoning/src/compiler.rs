//! Rule compiler
//!
//! Turns a profile plus a schema snapshot into an immutable compiled rule
//! set: filter the catalog down to applicable rules, specialize the
//! property-characteristic rules against the schema's enumerations, run
//! the optimizer, and publish the result into the process-wide registry.

use crate::catalog::{self, Profile, RuleDefinition, SchemaRequirement};
use crate::model::{BodyElement, Bindings, Rule};
use crate::optimizer::{self, PredicateStats};
use crate::registry::{SnapshotRegistry, Versioned};
use crate::schema::SchemaInfo;
use crate::ReasoningResult;
use rdf_model::Term;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use xxhash_rust::xxh64::xxh64;

/// Characters that make an IRI unsafe to splice into dynamic queries.
const FORBIDDEN_IRI_CHARS: [char; 6] = ['>', '}', ';', '{', '\n', '\r'];

/// Compiler options.
#[derive(Clone, Debug)]
pub struct CompilerOptions {
    /// Bound on schema property enumerations
    pub max_properties: usize,
    /// Bound on specialized copies emitted per generic rule
    pub max_specializations: usize,
    /// If set, only these rule names are compiled (Custom profile)
    pub include: Option<Vec<String>>,
    /// Rule names dropped regardless of profile
    pub exclude: Vec<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            max_properties: 10_000,
            max_specializations: 1_000,
            include: None,
            exclude: Vec::new(),
        }
    }
}

/// A generic rule instantiated for one concrete property.
#[derive(Clone, Debug)]
pub struct SpecializedRule {
    /// The instantiated rule
    pub rule: Rule,
    /// Name of the generic rule it came from
    pub base: String,
    /// The property IRI substituted in
    pub property: String,
}

/// An immutable compiled rule set.
#[derive(Clone, Debug)]
pub struct CompiledRuleSet {
    /// The profile this set was compiled for
    pub profile: Profile,
    /// Applicable generic rules, optimized, catalog order
    pub rules: Vec<RuleDefinition>,
    /// Specialized instantiations of the characteristic rules
    pub specialized: Vec<SpecializedRule>,
    /// The schema snapshot the set was compiled against
    pub schema: SchemaInfo,
    /// Fresh version identifier
    pub version: u64,
}

impl CompiledRuleSet {
    /// The rules the engine may materialize: every generic rule not marked
    /// placeholder, then the specialized copies.
    pub fn materializable_rules(&self) -> Vec<Rule> {
        let mut rules: Vec<Rule> = self
            .rules
            .iter()
            .filter(|d| d.materialize)
            .map(|d| d.rule.clone())
            .collect();
        rules.extend(self.specialized.iter().map(|s| s.rule.clone()));
        rules
    }

    /// Look up rules by name across generic and specialized entries.
    pub fn contains_rule(&self, name: &str) -> bool {
        self.rules.iter().any(|d| d.rule.name == name)
            || self.specialized.iter().any(|s| s.rule.name == name)
    }

    /// A specialized rule is dead when its property dropped out of the
    /// schema enumeration it was compiled from.
    pub fn dead_specializations(&self, schema: &SchemaInfo) -> Vec<String> {
        self.specialized
            .iter()
            .filter(|s| {
                let requirement = catalog::rule_by_name(&s.base)
                    .map(|d| d.requirement)
                    .unwrap_or(SchemaRequirement::Always);
                match requirement {
                    SchemaRequirement::Inverse => !schema
                        .inverse_pairs
                        .iter()
                        .any(|(a, b)| *a == s.property || *b == s.property),
                    other => schema
                        .enumeration(other)
                        .map(|e| !e.contains(&s.property))
                        .unwrap_or(false),
                }
            })
            .map(|s| s.rule.name.clone())
            .collect()
    }
}

impl Versioned for CompiledRuleSet {
    fn version(&self) -> u64 {
        self.version
    }
}

/// The process-wide registry of compiled rule sets.
pub fn compiled_rule_sets() -> &'static SnapshotRegistry<CompiledRuleSet> {
    static REGISTRY: OnceLock<SnapshotRegistry<CompiledRuleSet>> = OnceLock::new();
    REGISTRY.get_or_init(SnapshotRegistry::new)
}

/// `true` whenever the published version under `key` differs from the
/// caller-held one (or the key is gone), signalling recompilation.
pub fn is_stale(key: &str, expected_version: u64) -> bool {
    compiled_rule_sets().is_stale(key, expected_version)
}

/// Reject IRIs containing characters that could break out of a dynamically
/// assembled query.
pub fn is_safe_iri(iri: &str) -> bool {
    !iri.contains(&FORBIDDEN_IRI_CHARS[..])
}

fn sanitized_local_name(iri: &str) -> String {
    let local = iri
        .rsplit(|c| c == '#' || c == '/')
        .next()
        .unwrap_or(iri);
    let cleaned: String = local
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Specialized-rule name: base name, sanitized local part, and a short
/// content hash of the full IRI so IRIs differing only in punctuation
/// cannot collide.
fn specialized_name(base: &str, iri: &str) -> String {
    format!(
        "{base}-{}-{:08x}",
        sanitized_local_name(iri),
        xxh64(iri.as_bytes(), 0) as u32
    )
}

/// Drop the type-declaration pattern at the body front and substitute the
/// property variable, yielding the specialized rule.
fn specialize_characteristic(definition: &RuleDefinition, iri: &str) -> Option<SpecializedRule> {
    if !is_safe_iri(iri) {
        tracing::warn!(rule = %definition.rule.name, iri, "skipping specialization for unsafe IRI");
        return None;
    }

    let rule = &definition.rule;
    let mut bindings = Bindings::new();
    bindings.insert("p".to_string(), Term::iri(iri));

    // body[0] is the `?p rdf:type owl:XProperty` declaration
    let body: Vec<BodyElement> = rule
        .body
        .iter()
        .skip(1)
        .map(|e| substitute_element(e, &bindings))
        .collect();

    Some(SpecializedRule {
        rule: Rule::new(
            specialized_name(&rule.name, iri),
            crate::model::substitute_pattern(&rule.head, &bindings),
            body,
        ),
        base: rule.name.clone(),
        property: iri.to_string(),
    })
}

/// For `prp-inv{1,2}`: drop the `owl:inverseOf` pattern and substitute
/// both property variables.
fn specialize_inverse(
    definition: &RuleDefinition,
    p1: &str,
    p2: &str,
) -> Option<SpecializedRule> {
    if !is_safe_iri(p1) || !is_safe_iri(p2) {
        tracing::warn!(rule = %definition.rule.name, p1, p2, "skipping specialization for unsafe IRI");
        return None;
    }

    let rule = &definition.rule;
    let mut bindings = Bindings::new();
    bindings.insert("p1".to_string(), Term::iri(p1));
    bindings.insert("p2".to_string(), Term::iri(p2));

    let body: Vec<BodyElement> = rule
        .body
        .iter()
        .skip(1)
        .map(|e| substitute_element(e, &bindings))
        .collect();

    // The rule fires on assertions of the substituted body property; name
    // it after that one.
    let named_for = if definition.rule.name.ends_with('1') { p1 } else { p2 };

    Some(SpecializedRule {
        rule: Rule::new(
            specialized_name(&rule.name, named_for),
            crate::model::substitute_pattern(&rule.head, &bindings),
            body,
        ),
        base: rule.name.clone(),
        property: named_for.to_string(),
    })
}

fn substitute_element(element: &BodyElement, bindings: &Bindings) -> BodyElement {
    match element {
        BodyElement::Pattern(p) => {
            BodyElement::Pattern(crate::model::substitute_pattern(p, bindings))
        }
        BodyElement::Condition(c) => {
            BodyElement::Condition(crate::model::substitute_condition(c, bindings))
        }
    }
}

fn specializations_for(
    definition: &RuleDefinition,
    schema: &SchemaInfo,
    max_specializations: usize,
) -> Vec<SpecializedRule> {
    let mut out = Vec::new();
    match definition.requirement {
        SchemaRequirement::Inverse => {
            for (p1, p2) in schema.inverse_pairs.iter().take(max_specializations) {
                out.extend(specialize_inverse(definition, p1, p2));
            }
        }
        requirement => {
            if let Some(enumeration) = schema.enumeration(requirement) {
                let mut iris: Vec<&String> = enumeration.iter().collect();
                iris.sort();
                for iri in iris.into_iter().take(max_specializations) {
                    out.extend(specialize_characteristic(definition, iri));
                }
            }
        }
    }
    out
}

/// Compile a profile against a schema snapshot.
pub fn compile(
    profile: Profile,
    schema: SchemaInfo,
    opts: &CompilerOptions,
    stats: Option<&PredicateStats>,
) -> ReasoningResult<CompiledRuleSet> {
    let started = Instant::now();
    tracing::debug!(profile = profile.name(), "compile start");

    let mut definitions = catalog::rules_for_profile(profile);

    if let Some(include) = &opts.include {
        definitions.retain(|d| include.contains(&d.rule.name));
    }
    definitions.retain(|d| !opts.exclude.contains(&d.rule.name));

    // Applicability filter: a rule survives iff its schema feature is
    // present. eq-ref has no requirement and always survives.
    definitions.retain(|d| schema.satisfies(d.requirement));

    let mut specialized = Vec::new();
    for definition in &definitions {
        if definition.requirement.is_specializable() {
            specialized.extend(specializations_for(
                definition,
                &schema,
                opts.max_specializations,
            ));
        }
    }

    // Optimize pattern order and condition placement in every rule body.
    let optimize_started = Instant::now();
    tracing::debug!(rules = definitions.len() + specialized.len(), "optimize start");
    for definition in &mut definitions {
        definition.rule = optimizer::optimize_rule(&definition.rule, stats);
    }
    for special in &mut specialized {
        special.rule = optimizer::optimize_rule(&special.rule, stats);
    }
    tracing::debug!(
        duration_ms = optimize_started.elapsed().as_millis() as u64,
        "optimize stop"
    );

    let set = CompiledRuleSet {
        profile,
        rules: definitions,
        specialized,
        schema,
        version: rand::random(),
    };

    tracing::debug!(
        profile = profile.name(),
        rules = set.rules.len(),
        specialized = set.specialized.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "compile stop"
    );
    Ok(set)
}

/// Compile and publish under an opaque ontology key.
pub fn compile_and_publish(
    key: &str,
    profile: Profile,
    schema: SchemaInfo,
    opts: &CompilerOptions,
    stats: Option<&PredicateStats>,
) -> ReasoningResult<Arc<CompiledRuleSet>> {
    let set = compile(profile, schema, opts, stats)?;
    compiled_rule_sets().store(key, set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashSet;

    fn schema_with_transitive(iris: &[&str]) -> SchemaInfo {
        SchemaInfo {
            transitive_properties: iris.iter().map(|s| s.to_string()).collect::<AHashSet<_>>(),
            ..SchemaInfo::default()
        }
    }

    #[test]
    fn test_applicability_filter() {
        let schema = SchemaInfo {
            has_subclass: true,
            ..SchemaInfo::default()
        };
        let set = compile(Profile::Owl2Rl, schema, &CompilerOptions::default(), None).unwrap();
        let names: Vec<_> = set.rules.iter().map(|d| d.rule.name.as_str()).collect();

        assert!(names.contains(&"cax-sco"));
        assert!(names.contains(&"scm-sco"));
        assert!(names.contains(&"eq-ref"));
        assert!(!names.contains(&"prp-trp"));
        assert!(!names.contains(&"eq-sym"));
        assert!(set.specialized.is_empty());
    }

    #[test]
    fn test_specialization_drops_declaration_and_substitutes() {
        let schema = schema_with_transitive(&["http://example.org/partOf"]);
        let set = compile(Profile::Owl2Rl, schema, &CompilerOptions::default(), None).unwrap();

        assert_eq!(set.specialized.len(), 1);
        let special = &set.specialized[0];
        assert_eq!(special.base, "prp-trp");
        assert!(special.rule.name.starts_with("prp-trp-partOf-"));
        // Declaration pattern dropped: two joins remain
        assert_eq!(special.rule.body_patterns().len(), 2);
        // Property variable substituted everywhere
        for pattern in special.rule.body_patterns() {
            assert_eq!(pattern.predicate, Term::iri("http://example.org/partOf"));
        }
        assert_eq!(
            special.rule.head.predicate,
            Term::iri("http://example.org/partOf")
        );
        assert!(special.rule.is_safe());
    }

    #[test]
    fn test_inverse_specialization() {
        let schema = SchemaInfo {
            inverse_pairs: vec![(
                "http://example.org/hasParent".to_string(),
                "http://example.org/hasChild".to_string(),
            )],
            ..SchemaInfo::default()
        };
        let set = compile(Profile::Owl2Rl, schema, &CompilerOptions::default(), None).unwrap();

        // prp-inv1 and prp-inv2, one each
        assert_eq!(set.specialized.len(), 2);
        for special in &set.specialized {
            assert_eq!(special.rule.body_patterns().len(), 1);
            assert!(special.rule.is_safe());
        }
    }

    #[test]
    fn test_unsafe_iri_skipped() {
        let schema = schema_with_transitive(&["http://example.org/ok", "http://evil.org/a>b;{}"]);
        let set = compile(Profile::Owl2Rl, schema, &CompilerOptions::default(), None).unwrap();
        assert_eq!(set.specialized.len(), 1);
        assert_eq!(set.specialized[0].property, "http://example.org/ok");
    }

    #[test]
    fn test_specialization_cap() {
        let iris: Vec<String> = (0..40).map(|i| format!("http://example.org/p{i}")).collect();
        let refs: Vec<&str> = iris.iter().map(String::as_str).collect();
        let schema = schema_with_transitive(&refs);
        let opts = CompilerOptions {
            max_specializations: 25,
            ..CompilerOptions::default()
        };
        let set = compile(Profile::Owl2Rl, schema, &opts, None).unwrap();
        assert_eq!(set.specialized.len(), 25);
    }

    #[test]
    fn test_name_hash_disambiguates() {
        // Same sanitized local part, different IRIs
        let a = specialized_name("prp-trp", "http://example.org/part-of");
        let b = specialized_name("prp-trp", "http://example.org/part.of");
        assert_ne!(a, b);
        assert!(a.starts_with("prp-trp-part_of-"));
    }

    #[test]
    fn test_include_exclude_lists() {
        let schema = SchemaInfo {
            has_subclass: true,
            has_subproperty: true,
            ..SchemaInfo::default()
        };
        let opts = CompilerOptions {
            include: Some(vec!["cax-sco".to_string(), "scm-spo".to_string()]),
            exclude: vec!["scm-spo".to_string()],
            ..CompilerOptions::default()
        };
        let set = compile(Profile::Custom, schema, &opts, None).unwrap();
        let names: Vec<_> = set.rules.iter().map(|d| d.rule.name.as_str()).collect();
        assert_eq!(names, vec!["cax-sco"]);
    }

    #[test]
    fn test_publish_and_staleness() {
        let key = "test-ontology-publish";
        compiled_rule_sets().remove(key);

        let published = compile_and_publish(
            key,
            Profile::Rdfs,
            SchemaInfo::default(),
            &CompilerOptions::default(),
            None,
        )
        .unwrap();

        assert!(!is_stale(key, published.version));
        assert!(is_stale(key, published.version.wrapping_add(1)));

        compiled_rule_sets().remove(key);
        assert!(is_stale(key, published.version));
    }

    #[test]
    fn test_dead_specializations() {
        let schema = schema_with_transitive(&["http://example.org/partOf"]);
        let set = compile(Profile::Owl2Rl, schema, &CompilerOptions::default(), None).unwrap();

        let drained = SchemaInfo::default();
        let dead = set.dead_specializations(&drained);
        assert_eq!(dead.len(), 1);

        let same = schema_with_transitive(&["http://example.org/partOf"]);
        assert!(set.dead_specializations(&same).is_empty());
    }
}
