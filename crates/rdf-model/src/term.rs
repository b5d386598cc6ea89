//! RDF terms
//!
//! Owned representation: terms cross thread boundaries during parallel rule
//! evaluation and live inside long-lived fact sets, so they carry no
//! lifetimes. Strings are deduplicated at the storage boundary by the
//! dictionary instead.

use std::fmt;

/// An RDF term as seen by the rule layer.
///
/// Ground terms are every variant except `Variable`; patterns may contain
/// variables in any position.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    /// IRI reference
    /// Example: <http://example.org/resource>
    Iri(String),

    /// Blank node with unique identifier
    /// Example: _:b0
    BlankNode(u64),

    /// Plain literal without language tag or datatype
    /// Example: "John"
    PlainLiteral(String),

    /// Typed literal
    /// Example: "42"^^xsd:integer
    TypedLiteral {
        /// Lexical form
        value: String,
        /// Datatype IRI
        datatype: String,
    },

    /// Language-tagged literal
    /// Example: "John"@en
    LangLiteral {
        /// Lexical form
        value: String,
        /// Language tag
        lang: String,
    },

    /// Rule/pattern variable
    /// Example: ?x
    Variable(String),
}

impl Term {
    /// Create an IRI term
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    /// Create a blank node term
    pub fn blank(id: u64) -> Self {
        Term::BlankNode(id)
    }

    /// Create a plain literal
    pub fn literal(value: impl Into<String>) -> Self {
        Term::PlainLiteral(value.into())
    }

    /// Create a typed literal
    pub fn literal_typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::TypedLiteral {
            value: value.into(),
            datatype: datatype.into(),
        }
    }

    /// Create a language-tagged literal
    pub fn literal_lang(value: impl Into<String>, lang: impl Into<String>) -> Self {
        Term::LangLiteral {
            value: value.into(),
            lang: lang.into(),
        }
    }

    /// Create a variable
    pub fn var(name: impl Into<String>) -> Self {
        Term::Variable(name.into())
    }

    /// Check if this is an IRI
    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    /// Check if this is a blank node
    pub fn is_blank(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    /// Check if this is any literal kind
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Term::PlainLiteral(_) | Term::TypedLiteral { .. } | Term::LangLiteral { .. }
        )
    }

    /// Check if this is a variable
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// Check if this term carries no variable
    pub fn is_ground(&self) -> bool {
        !self.is_variable()
    }

    /// Get the IRI string, if this is an IRI
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// Get the variable name, if this is a variable
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Term::Variable(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{iri}>"),
            Term::BlankNode(id) => write!(f, "_:b{id}"),
            Term::PlainLiteral(value) => write!(f, "\"{value}\""),
            Term::TypedLiteral { value, datatype } => write!(f, "\"{value}\"^^<{datatype}>"),
            Term::LangLiteral { value, lang } => write!(f, "\"{value}\"@{lang}"),
            Term::Variable(name) => write!(f, "?{name}"),
        }
    }
}

// Debug delegates to Display; the N-Triples-ish form is the useful one in
// test failures and trace output.
impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
