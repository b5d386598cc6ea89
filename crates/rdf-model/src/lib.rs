//! RDF data model for the entailment core
//!
//! This crate provides the term-level and storage-level representations of
//! RDF data:
//! - `Term`: tagged union over IRIs, blank nodes, literals, and variables
//! - `Triple` / `Pattern`: ground triples and triple patterns
//! - `Dictionary`: thread-safe bidirectional mapping between terms and
//!   64-bit IDs used by the persistence layer
//! - `vocab`: the RDF/RDFS/OWL/XSD constants the reasoner needs
//!
//! # Example
//!
//! ```rust
//! use rdf_model::{Dictionary, Term, Triple};
//!
//! let dict = Dictionary::new();
//! let triple = Triple::new(
//!     Term::iri("http://example.org/alice"),
//!     Term::iri("http://example.org/knows"),
//!     Term::iri("http://example.org/bob"),
//! );
//! let ids = dict.encode_triple(&triple);
//! assert_eq!(dict.decode_triple(ids), Some(triple));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod dictionary;
mod term;
mod triple;
/// Standard RDF vocabularies (RDF, RDFS, OWL, XSD)
pub mod vocab;

pub use dictionary::Dictionary;
pub use term::Term;
pub use triple::{Pattern, Triple};

/// Errors that can occur when working with RDF data
#[derive(Debug, thiserror::Error)]
pub enum RdfError {
    /// Invalid IRI format
    #[error("Invalid IRI: {0}")]
    InvalidIri(String),

    /// A variable appeared where a ground term was required
    #[error("Unbound variable in ground position: ?{0}")]
    UnboundVariable(String),

    /// Dictionary lookup failed for an ID
    #[error("Unknown dictionary ID: {0}")]
    UnknownId(u64),
}

/// Result type for RDF operations
pub type Result<T> = std::result::Result<T, RdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_compiles() {
        let dict = Dictionary::new();
        assert!(dict.is_empty());
    }
}
