//! RDF triples and triple patterns

use crate::Term;
use std::collections::BTreeSet;
use std::fmt;

/// A ground RDF triple: subject, predicate, object.
///
/// Construction does not enforce RDF positional rules (literal subjects and
/// the like); the ingest surface owns that validation. It does reject
/// variables, which have no meaning in a fact.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    /// Subject term
    pub subject: Term,
    /// Predicate term
    pub predicate: Term,
    /// Object term
    pub object: Term,
}

impl Triple {
    /// Create a new ground triple.
    ///
    /// # Panics
    ///
    /// Panics if any position is a variable.
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        assert!(
            subject.is_ground() && predicate.is_ground() && object.is_ground(),
            "Triple positions must be ground terms"
        );
        Triple {
            subject,
            predicate,
            object,
        }
    }

    /// Convenience constructor from three IRI strings.
    pub fn iris(s: impl Into<String>, p: impl Into<String>, o: impl Into<String>) -> Self {
        Triple::new(Term::iri(s), Term::iri(p), Term::iri(o))
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

impl fmt::Debug for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A triple pattern: each position is either a constant term or a variable.
///
/// Shared variables across the patterns of a rule body express joins.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pattern {
    /// Subject position
    pub subject: Term,
    /// Predicate position
    pub predicate: Term,
    /// Object position
    pub object: Term,
}

impl Pattern {
    /// Create a new pattern
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Pattern {
            subject,
            predicate,
            object,
        }
    }

    /// Iterate the three positions in subject, predicate, object order
    pub fn positions(&self) -> [&Term; 3] {
        [&self.subject, &self.predicate, &self.object]
    }

    /// Check whether no position is a variable
    pub fn is_ground(&self) -> bool {
        self.positions().iter().all(|t| t.is_ground())
    }

    /// Collect the variable names appearing in this pattern
    pub fn variables(&self) -> BTreeSet<String> {
        self.positions()
            .iter()
            .filter_map(|t| t.as_variable())
            .map(str::to_owned)
            .collect()
    }

    /// Check if a ground triple matches this pattern, ignoring bindings.
    ///
    /// Variables match anything; constants require equality.
    pub fn matches(&self, triple: &Triple) -> bool {
        let position_matches = |pat: &Term, val: &Term| pat.is_variable() || pat == val;
        position_matches(&self.subject, &triple.subject)
            && position_matches(&self.predicate, &triple.predicate)
            && position_matches(&self.object, &triple.object)
    }

    /// Convert to a ground triple, if no position is a variable
    pub fn to_triple(&self) -> Option<Triple> {
        if self.is_ground() {
            Some(Triple {
                subject: self.subject.clone(),
                predicate: self.predicate.clone(),
                object: self.object.clone(),
            })
        } else {
            None
        }
    }
}

impl From<Triple> for Pattern {
    fn from(t: Triple) -> Self {
        Pattern {
            subject: t.subject,
            predicate: t.predicate,
            object: t.object,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ex(local: &str) -> Term {
        Term::iri(format!("http://example.org/{local}"))
    }

    #[test]
    fn test_triple_creation() {
        let t = Triple::new(ex("s"), ex("p"), Term::literal("v"));
        assert_eq!(t.subject, ex("s"));
        assert_eq!(t.to_string(), "<http://example.org/s> <http://example.org/p> \"v\" .");
    }

    #[test]
    #[should_panic(expected = "must be ground")]
    fn test_triple_rejects_variables() {
        Triple::new(Term::var("x"), ex("p"), ex("o"));
    }

    #[test]
    fn test_pattern_matches() {
        let t = Triple::new(ex("s"), ex("p"), ex("o"));

        let exact = Pattern::new(ex("s"), ex("p"), ex("o"));
        assert!(exact.matches(&t));
        assert!(exact.is_ground());

        let wild = Pattern::new(Term::var("x"), ex("p"), Term::var("y"));
        assert!(wild.matches(&t));
        assert!(!wild.is_ground());
        assert_eq!(wild.variables().len(), 2);

        let miss = Pattern::new(ex("other"), ex("p"), Term::var("y"));
        assert!(!miss.matches(&t));
    }

    #[test]
    fn test_pattern_to_triple() {
        let ground = Pattern::new(ex("s"), ex("p"), ex("o"));
        assert!(ground.to_triple().is_some());

        let open = Pattern::new(ex("s"), ex("p"), Term::var("o"));
        assert!(open.to_triple().is_none());
    }
}
