//! Rule model
//!
//! Rules are `head :- body` where the head is a single triple pattern and
//! the body is an ordered list of patterns and binding-level conditions.
//! Safety invariant: every head variable occurs in some body pattern, so a
//! satisfied body always grounds the head.

use rdf_model::{Pattern, Term};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A mapping from variable names to ground terms.
///
/// `BTreeMap` so bindings hash and iterate deterministically; binding sets
/// are deduplicated during joins.
pub type Bindings = BTreeMap<String, Term>;

/// A filter over bindings; never consults the database.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Condition {
    /// True iff the two terms are unequal after substitution
    NotEqual(Term, Term),
    /// True iff the substituted term is an IRI
    IsIri(Term),
    /// True iff the substituted term is a blank node
    IsBlank(Term),
    /// True iff the substituted term is a literal
    IsLiteral(Term),
    /// True iff the variable appears in the binding map
    Bound(String),
}

impl Condition {
    /// The variable names this condition inspects
    pub fn variables(&self) -> BTreeSet<String> {
        let term_vars = |t: &Term| t.as_variable().map(str::to_owned);
        match self {
            Condition::NotEqual(a, b) => [a, b].into_iter().filter_map(term_vars).collect(),
            Condition::IsIri(t) | Condition::IsBlank(t) | Condition::IsLiteral(t) => {
                term_vars(t).into_iter().collect()
            }
            Condition::Bound(v) => std::iter::once(v.clone()).collect(),
        }
    }
}

/// One element of a rule body
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum BodyElement {
    /// A triple pattern matched against the fact set
    Pattern(Pattern),
    /// A condition evaluated against the bindings
    Condition(Condition),
}

/// A Datalog-style rule over triple patterns.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Rule {
    /// Stable rule identifier (e.g. `cax-sco`)
    pub name: String,
    /// Head pattern, instantiated for every surviving binding
    pub head: Pattern,
    /// Ordered body elements
    pub body: SmallVec<[BodyElement; 4]>,
}

impl Rule {
    /// Create a new rule
    pub fn new(name: impl Into<String>, head: Pattern, body: Vec<BodyElement>) -> Self {
        Self {
            name: name.into(),
            head,
            body: SmallVec::from_vec(body),
        }
    }

    /// The body's patterns, in order
    pub fn body_patterns(&self) -> Vec<&Pattern> {
        self.body
            .iter()
            .filter_map(|e| match e {
                BodyElement::Pattern(p) => Some(p),
                BodyElement::Condition(_) => None,
            })
            .collect()
    }

    /// The body's conditions, in order
    pub fn body_conditions(&self) -> Vec<&Condition> {
        self.body
            .iter()
            .filter_map(|e| match e {
                BodyElement::Condition(c) => Some(c),
                BodyElement::Pattern(_) => None,
            })
            .collect()
    }

    /// All variable names in the rule (head and body)
    pub fn variables(&self) -> BTreeSet<String> {
        let mut vars = self.head.variables();
        for pattern in self.body_patterns() {
            vars.extend(pattern.variables());
        }
        vars
    }

    /// Safety: every head variable also occurs in a body pattern.
    pub fn is_safe(&self) -> bool {
        let body_vars: BTreeSet<String> = self
            .body_patterns()
            .iter()
            .flat_map(|p| p.variables())
            .collect();
        self.head.variables().is_subset(&body_vars)
    }

    /// Evaluate every body condition against the bindings
    pub fn evaluate_conditions(&self, bindings: &Bindings) -> bool {
        self.body_conditions()
            .iter()
            .all(|c| evaluate_condition(c, bindings))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} :- ", self.name, self.head)?;
        for (i, element) in self.body.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match element {
                BodyElement::Pattern(p) => write!(f, "{p}")?,
                BodyElement::Condition(c) => write!(f, "{c:?}")?,
            }
        }
        Ok(())
    }
}

/// Substitute bound variables in a term; unbound variables and constants
/// pass through unchanged.
pub fn substitute(term: &Term, bindings: &Bindings) -> Term {
    match term {
        Term::Variable(name) => bindings.get(name).cloned().unwrap_or_else(|| term.clone()),
        _ => term.clone(),
    }
}

/// Substitute bound variables in all three positions of a pattern
pub fn substitute_pattern(pattern: &Pattern, bindings: &Bindings) -> Pattern {
    Pattern::new(
        substitute(&pattern.subject, bindings),
        substitute(&pattern.predicate, bindings),
        substitute(&pattern.object, bindings),
    )
}

/// Substitute bound variables inside a condition
pub fn substitute_condition(condition: &Condition, bindings: &Bindings) -> Condition {
    match condition {
        Condition::NotEqual(a, b) => {
            Condition::NotEqual(substitute(a, bindings), substitute(b, bindings))
        }
        Condition::IsIri(t) => Condition::IsIri(substitute(t, bindings)),
        Condition::IsBlank(t) => Condition::IsBlank(substitute(t, bindings)),
        Condition::IsLiteral(t) => Condition::IsLiteral(substitute(t, bindings)),
        Condition::Bound(v) => Condition::Bound(v.clone()),
    }
}

/// Evaluate a condition against a binding map
pub fn evaluate_condition(condition: &Condition, bindings: &Bindings) -> bool {
    match condition {
        Condition::NotEqual(a, b) => substitute(a, bindings) != substitute(b, bindings),
        Condition::IsIri(t) => substitute(t, bindings).is_iri(),
        Condition::IsBlank(t) => substitute(t, bindings).is_blank(),
        Condition::IsLiteral(t) => substitute(t, bindings).is_literal(),
        Condition::Bound(var) => bindings.contains_key(var),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ex(local: &str) -> Term {
        Term::iri(format!("http://example.org/{local}"))
    }

    fn pattern(s: Term, p: Term, o: Term) -> Pattern {
        Pattern::new(s, p, o)
    }

    fn sample_rule() -> Rule {
        // head(x, knows, y) :- (x, knows, y)
        Rule::new(
            "sample",
            pattern(Term::var("x"), ex("knows"), Term::var("y")),
            vec![BodyElement::Pattern(pattern(
                Term::var("x"),
                ex("knows"),
                Term::var("y"),
            ))],
        )
    }

    #[test]
    fn test_rule_accessors() {
        let rule = Rule::new(
            "r",
            pattern(Term::var("x"), ex("p"), Term::var("y")),
            vec![
                BodyElement::Pattern(pattern(Term::var("x"), ex("p"), Term::var("y"))),
                BodyElement::Condition(Condition::NotEqual(Term::var("x"), Term::var("y"))),
            ],
        );
        assert_eq!(rule.body_patterns().len(), 1);
        assert_eq!(rule.body_conditions().len(), 1);
        assert_eq!(rule.variables().len(), 2);
    }

    #[test]
    fn test_safety() {
        assert!(sample_rule().is_safe());

        let unsafe_rule = Rule::new(
            "bad",
            pattern(Term::var("z"), ex("p"), Term::var("x")),
            vec![BodyElement::Pattern(pattern(
                Term::var("x"),
                ex("p"),
                Term::var("y"),
            ))],
        );
        assert!(!unsafe_rule.is_safe());
    }

    #[test]
    fn test_substitute() {
        let mut bindings = Bindings::new();
        bindings.insert("x".to_string(), ex("alice"));

        assert_eq!(substitute(&Term::var("x"), &bindings), ex("alice"));
        assert_eq!(substitute(&Term::var("y"), &bindings), Term::var("y"));
        assert_eq!(substitute(&ex("bob"), &bindings), ex("bob"));

        let pat = substitute_pattern(
            &pattern(Term::var("x"), ex("knows"), Term::var("y")),
            &bindings,
        );
        assert_eq!(pat.subject, ex("alice"));
        assert_eq!(pat.object, Term::var("y"));
    }

    #[test]
    fn test_condition_semantics() {
        let mut bindings = Bindings::new();
        bindings.insert("x".to_string(), ex("alice"));
        bindings.insert("y".to_string(), ex("alice"));
        bindings.insert("lit".to_string(), Term::literal("v"));
        bindings.insert("b".to_string(), Term::blank(1));

        assert!(!evaluate_condition(
            &Condition::NotEqual(Term::var("x"), Term::var("y")),
            &bindings
        ));
        assert!(evaluate_condition(
            &Condition::NotEqual(Term::var("x"), Term::var("lit")),
            &bindings
        ));
        assert!(evaluate_condition(&Condition::IsIri(Term::var("x")), &bindings));
        assert!(evaluate_condition(&Condition::IsBlank(Term::var("b")), &bindings));
        assert!(evaluate_condition(&Condition::IsLiteral(Term::var("lit")), &bindings));
        assert!(!evaluate_condition(&Condition::IsLiteral(Term::var("x")), &bindings));
        assert!(evaluate_condition(&Condition::Bound("x".to_string()), &bindings));
        assert!(!evaluate_condition(&Condition::Bound("nope".to_string()), &bindings));
    }

    #[test]
    fn test_unbound_not_equal_compares_variables() {
        // Neither side bound: the substituted values are the variables
        // themselves, so distinct variables compare unequal.
        let bindings = Bindings::new();
        assert!(evaluate_condition(
            &Condition::NotEqual(Term::var("x"), Term::var("y")),
            &bindings
        ));
        assert!(!evaluate_condition(
            &Condition::NotEqual(Term::var("x"), Term::var("x")),
            &bindings
        ));
    }
}
