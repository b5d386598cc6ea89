//! Rules catalog
//!
//! The fixed OWL 2 RL / RDFS rule set, keyed by the W3C short names.
//! The RDFS profile carries the hierarchy and domain/range rules; OWL 2 RL
//! adds property characteristics, equality, equivalence, and the
//! restriction rules.
//!
//! `eq-ref` is cataloged for enumeration but never materialized: it would
//! derive a reflexive `sameAs` for every resource, so query answering
//! treats `x sameAs x` as implicit instead.

use crate::model::{BodyElement, Condition, Rule};
use crate::{ReasoningError, ReasoningResult};
use rdf_model::{vocab, Pattern, Term};

/// Rule family selector.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Profile {
    /// Hierarchy and domain/range rules only
    Rdfs,
    /// Full OWL 2 RL rule set
    Owl2Rl,
    /// Caller-selected rule subset (via compiler include/exclude lists)
    Custom,
    /// No rules
    None,
}

impl Profile {
    /// Stable profile name
    pub fn name(&self) -> &'static str {
        match self {
            Profile::Rdfs => "rdfs",
            Profile::Owl2Rl => "owl2rl",
            Profile::Custom => "custom",
            Profile::None => "none",
        }
    }

    /// Parse a profile name
    pub fn from_name(name: &str) -> ReasoningResult<Self> {
        match name {
            "rdfs" => Ok(Profile::Rdfs),
            "owl2rl" => Ok(Profile::Owl2Rl),
            "custom" => Ok(Profile::Custom),
            "none" => Ok(Profile::None),
            other => Err(ReasoningError::UnknownProfile(other.to_string())),
        }
    }
}

/// The schema feature a rule needs in order to ever fire.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SchemaRequirement {
    /// Always applicable
    Always,
    /// `rdfs:subClassOf` triples present
    SubClass,
    /// `rdfs:subPropertyOf` triples present
    SubProperty,
    /// `rdfs:domain` triples present
    Domain,
    /// `rdfs:range` triples present
    Range,
    /// `owl:sameAs` triples present
    SameAs,
    /// Restriction vocabulary present
    Restrictions,
    /// `owl:equivalentClass` / `owl:equivalentProperty` present
    Equivalence,
    /// At least one declared transitive property
    Transitive,
    /// At least one declared symmetric property
    Symmetric,
    /// At least one declared functional property
    Functional,
    /// At least one declared inverse-functional property
    InverseFunctional,
    /// At least one `owl:inverseOf` pair
    Inverse,
}

impl SchemaRequirement {
    /// Requirements whose rules get specialized per enumerated property.
    pub fn is_specializable(self) -> bool {
        matches!(
            self,
            SchemaRequirement::Transitive
                | SchemaRequirement::Symmetric
                | SchemaRequirement::Functional
                | SchemaRequirement::InverseFunctional
                | SchemaRequirement::Inverse
        )
    }
}

/// A catalog entry: the rule plus its metadata.
#[derive(Clone, Debug)]
pub struct RuleDefinition {
    /// The rule itself
    pub rule: Rule,
    /// Human-readable description
    pub description: &'static str,
    /// Smallest profile containing this rule
    pub profile: Profile,
    /// Schema feature gating applicability
    pub requirement: SchemaRequirement,
    /// Whether the engine may materialize this rule (`false` for `eq-ref`)
    pub materialize: bool,
}

fn v(name: &str) -> Term {
    Term::var(name)
}

fn iri(s: &str) -> Term {
    Term::iri(s)
}

fn pat(s: Term, p: Term, o: Term) -> BodyElement {
    BodyElement::Pattern(Pattern::new(s, p, o))
}

fn head(s: Term, p: Term, o: Term) -> Pattern {
    Pattern::new(s, p, o)
}

fn def(
    name: &str,
    description: &'static str,
    profile: Profile,
    requirement: SchemaRequirement,
    head: Pattern,
    body: Vec<BodyElement>,
) -> RuleDefinition {
    RuleDefinition {
        rule: Rule::new(name, head, body),
        description,
        profile,
        requirement,
        materialize: true,
    }
}

/// All catalog entries, RDFS rules first.
pub fn all_rules() -> Vec<RuleDefinition> {
    use Profile::{Owl2Rl, Rdfs};
    use SchemaRequirement as Req;

    let rdf_type = || iri(vocab::RDF_TYPE);
    let sco = || iri(vocab::RDFS_SUB_CLASS_OF);
    let spo = || iri(vocab::RDFS_SUB_PROPERTY_OF);
    let same_as = || iri(vocab::OWL_SAME_AS);

    let mut rules = vec![
        // RDFS
        def(
            "scm-sco",
            "subClassOf is transitive",
            Rdfs,
            Req::SubClass,
            head(v("c1"), sco(), v("c3")),
            vec![
                pat(v("c1"), sco(), v("c2")),
                pat(v("c2"), sco(), v("c3")),
            ],
        ),
        def(
            "scm-spo",
            "subPropertyOf is transitive",
            Rdfs,
            Req::SubProperty,
            head(v("p1"), spo(), v("p3")),
            vec![
                pat(v("p1"), spo(), v("p2")),
                pat(v("p2"), spo(), v("p3")),
            ],
        ),
        def(
            "cax-sco",
            "instances of a class belong to its superclasses",
            Rdfs,
            Req::SubClass,
            head(v("x"), rdf_type(), v("c2")),
            vec![
                pat(v("x"), rdf_type(), v("c1")),
                pat(v("c1"), sco(), v("c2")),
            ],
        ),
        def(
            "prp-spo1",
            "assertions propagate to superproperties",
            Rdfs,
            Req::SubProperty,
            head(v("x"), v("p2"), v("y")),
            vec![
                pat(v("p1"), spo(), v("p2")),
                pat(v("x"), v("p1"), v("y")),
            ],
        ),
        def(
            "prp-dom",
            "property domain types the subject",
            Rdfs,
            Req::Domain,
            head(v("x"), rdf_type(), v("c")),
            vec![
                pat(v("p"), iri(vocab::RDFS_DOMAIN), v("c")),
                pat(v("x"), v("p"), v("y")),
            ],
        ),
        def(
            "prp-rng",
            "property range types the object",
            Rdfs,
            Req::Range,
            head(v("y"), rdf_type(), v("c")),
            vec![
                pat(v("p"), iri(vocab::RDFS_RANGE), v("c")),
                pat(v("x"), v("p"), v("y")),
                BodyElement::Condition(Condition::IsIri(v("y"))),
            ],
        ),
        // OWL 2 RL: property characteristics
        def(
            "prp-trp",
            "transitive property composition",
            Owl2Rl,
            Req::Transitive,
            head(v("x"), v("p"), v("z")),
            vec![
                pat(v("p"), rdf_type(), iri(vocab::OWL_TRANSITIVE_PROPERTY)),
                pat(v("x"), v("p"), v("y")),
                pat(v("y"), v("p"), v("z")),
            ],
        ),
        def(
            "prp-symp",
            "symmetric property reversal",
            Owl2Rl,
            Req::Symmetric,
            head(v("y"), v("p"), v("x")),
            vec![
                pat(v("p"), rdf_type(), iri(vocab::OWL_SYMMETRIC_PROPERTY)),
                pat(v("x"), v("p"), v("y")),
            ],
        ),
        def(
            "prp-inv1",
            "inverseOf, forward direction",
            Owl2Rl,
            Req::Inverse,
            head(v("y"), v("p2"), v("x")),
            vec![
                pat(v("p1"), iri(vocab::OWL_INVERSE_OF), v("p2")),
                pat(v("x"), v("p1"), v("y")),
            ],
        ),
        def(
            "prp-inv2",
            "inverseOf, backward direction",
            Owl2Rl,
            Req::Inverse,
            head(v("y"), v("p1"), v("x")),
            vec![
                pat(v("p1"), iri(vocab::OWL_INVERSE_OF), v("p2")),
                pat(v("x"), v("p2"), v("y")),
            ],
        ),
        def(
            "prp-fp",
            "functional property values coincide",
            Owl2Rl,
            Req::Functional,
            head(v("y1"), same_as(), v("y2")),
            vec![
                pat(v("p"), rdf_type(), iri(vocab::OWL_FUNCTIONAL_PROPERTY)),
                pat(v("x"), v("p"), v("y1")),
                pat(v("x"), v("p"), v("y2")),
                BodyElement::Condition(Condition::NotEqual(v("y1"), v("y2"))),
            ],
        ),
        def(
            "prp-ifp",
            "inverse-functional property subjects coincide",
            Owl2Rl,
            Req::InverseFunctional,
            head(v("x1"), same_as(), v("x2")),
            vec![
                pat(v("p"), rdf_type(), iri(vocab::OWL_INVERSE_FUNCTIONAL_PROPERTY)),
                pat(v("x1"), v("p"), v("y")),
                pat(v("x2"), v("p"), v("y")),
                BodyElement::Condition(Condition::NotEqual(v("x1"), v("x2"))),
            ],
        ),
        // OWL 2 RL: equality. The NotEqual guards keep reflexive sameAs
        // facts out of the materialization, consistent with the eq-ref
        // policy.
        def(
            "eq-sym",
            "sameAs is symmetric",
            Owl2Rl,
            Req::SameAs,
            head(v("y"), same_as(), v("x")),
            vec![
                pat(v("x"), same_as(), v("y")),
                BodyElement::Condition(Condition::NotEqual(v("x"), v("y"))),
            ],
        ),
        def(
            "eq-trans",
            "sameAs is transitive",
            Owl2Rl,
            Req::SameAs,
            head(v("x"), same_as(), v("z")),
            vec![
                pat(v("x"), same_as(), v("y")),
                pat(v("y"), same_as(), v("z")),
                BodyElement::Condition(Condition::NotEqual(v("x"), v("z"))),
            ],
        ),
        def(
            "eq-rep-s",
            "sameAs replaces subjects",
            Owl2Rl,
            Req::SameAs,
            head(v("s2"), v("p"), v("o")),
            vec![
                pat(v("s"), same_as(), v("s2")),
                pat(v("s"), v("p"), v("o")),
            ],
        ),
        def(
            "eq-rep-p",
            "sameAs replaces predicates",
            Owl2Rl,
            Req::SameAs,
            head(v("s"), v("p2"), v("o")),
            vec![
                pat(v("p"), same_as(), v("p2")),
                pat(v("s"), v("p"), v("o")),
            ],
        ),
        def(
            "eq-rep-o",
            "sameAs replaces objects",
            Owl2Rl,
            Req::SameAs,
            head(v("s"), v("p"), v("o2")),
            vec![
                pat(v("o"), same_as(), v("o2")),
                pat(v("s"), v("p"), v("o")),
            ],
        ),
        // OWL 2 RL: restriction rules
        def(
            "cls-hv1",
            "hasValue restriction members carry the value",
            Owl2Rl,
            Req::Restrictions,
            head(v("u"), v("p"), v("v")),
            vec![
                pat(v("x"), iri(vocab::OWL_HAS_VALUE), v("v")),
                pat(v("x"), iri(vocab::OWL_ON_PROPERTY), v("p")),
                pat(v("u"), iri(vocab::RDF_TYPE), v("x")),
            ],
        ),
        def(
            "cls-hv2",
            "carriers of the value join the hasValue restriction",
            Owl2Rl,
            Req::Restrictions,
            head(v("u"), iri(vocab::RDF_TYPE), v("x")),
            vec![
                pat(v("x"), iri(vocab::OWL_HAS_VALUE), v("v")),
                pat(v("x"), iri(vocab::OWL_ON_PROPERTY), v("p")),
                pat(v("u"), v("p"), v("v")),
            ],
        ),
        def(
            "cls-svf1",
            "someValuesFrom witness classifies the subject",
            Owl2Rl,
            Req::Restrictions,
            head(v("u"), iri(vocab::RDF_TYPE), v("x")),
            vec![
                pat(v("x"), iri(vocab::OWL_SOME_VALUES_FROM), v("y")),
                pat(v("x"), iri(vocab::OWL_ON_PROPERTY), v("p")),
                pat(v("u"), v("p"), v("w")),
                pat(v("w"), iri(vocab::RDF_TYPE), v("y")),
            ],
        ),
        def(
            "cls-svf2",
            "someValuesFrom owl:Thing classifies any subject with the property",
            Owl2Rl,
            Req::Restrictions,
            head(v("u"), iri(vocab::RDF_TYPE), v("x")),
            vec![
                pat(
                    v("x"),
                    iri(vocab::OWL_SOME_VALUES_FROM),
                    iri(vocab::OWL_THING),
                ),
                pat(v("x"), iri(vocab::OWL_ON_PROPERTY), v("p")),
                pat(v("u"), v("p"), v("w")),
            ],
        ),
        def(
            "cls-avf",
            "allValuesFrom classifies property values of members",
            Owl2Rl,
            Req::Restrictions,
            head(v("w"), iri(vocab::RDF_TYPE), v("y")),
            vec![
                pat(v("x"), iri(vocab::OWL_ALL_VALUES_FROM), v("y")),
                pat(v("x"), iri(vocab::OWL_ON_PROPERTY), v("p")),
                pat(v("u"), iri(vocab::RDF_TYPE), v("x")),
                pat(v("u"), v("p"), v("w")),
            ],
        ),
        // Supplements: equivalence
        def(
            "cax-eqc1",
            "equivalentClass membership, forward",
            Owl2Rl,
            Req::Equivalence,
            head(v("x"), iri(vocab::RDF_TYPE), v("c2")),
            vec![
                pat(v("c1"), iri(vocab::OWL_EQUIVALENT_CLASS), v("c2")),
                pat(v("x"), iri(vocab::RDF_TYPE), v("c1")),
            ],
        ),
        def(
            "cax-eqc2",
            "equivalentClass membership, backward",
            Owl2Rl,
            Req::Equivalence,
            head(v("x"), iri(vocab::RDF_TYPE), v("c1")),
            vec![
                pat(v("c1"), iri(vocab::OWL_EQUIVALENT_CLASS), v("c2")),
                pat(v("x"), iri(vocab::RDF_TYPE), v("c2")),
            ],
        ),
        def(
            "prp-eqp1",
            "equivalentProperty assertions, forward",
            Owl2Rl,
            Req::Equivalence,
            head(v("x"), v("p2"), v("y")),
            vec![
                pat(v("p1"), iri(vocab::OWL_EQUIVALENT_PROPERTY), v("p2")),
                pat(v("x"), v("p1"), v("y")),
            ],
        ),
        def(
            "prp-eqp2",
            "equivalentProperty assertions, backward",
            Owl2Rl,
            Req::Equivalence,
            head(v("x"), v("p1"), v("y")),
            vec![
                pat(v("p1"), iri(vocab::OWL_EQUIVALENT_PROPERTY), v("p2")),
                pat(v("x"), v("p2"), v("y")),
            ],
        ),
    ];

    // eq-ref is a placeholder: enumerable, never materialized.
    let mut eq_ref = def(
        "eq-ref",
        "reflexivity of sameAs (implicit at query time)",
        Owl2Rl,
        SchemaRequirement::Always,
        head(v("s"), same_as(), v("s")),
        vec![pat(v("s"), v("p"), v("o"))],
    );
    eq_ref.materialize = false;
    rules.push(eq_ref);

    rules
}

/// Look up a single rule by its stable name
pub fn rule_by_name(name: &str) -> ReasoningResult<RuleDefinition> {
    all_rules()
        .into_iter()
        .find(|d| d.rule.name == name)
        .ok_or_else(|| ReasoningError::UnknownRule(name.to_string()))
}

/// The rules belonging to a profile.
///
/// `Custom` starts from the full catalog; the compiler's include/exclude
/// lists narrow it. `None` is empty.
pub fn rules_for_profile(profile: Profile) -> Vec<RuleDefinition> {
    match profile {
        Profile::None => Vec::new(),
        Profile::Rdfs => all_rules()
            .into_iter()
            .filter(|d| d.profile == Profile::Rdfs)
            .collect(),
        Profile::Owl2Rl | Profile::Custom => all_rules(),
    }
}

/// Rule names materialized in hybrid mode: the hierarchy subset whose
/// closure is cheap and widely queried. The rest stays query-time.
pub const HYBRID_MATERIALIZED_RULES: [&str; 4] = ["scm-sco", "scm-spo", "cax-sco", "prp-spo1"];
