//! OWL 2 RL / RDFS reasoning core
//!
//! Forward-chaining materialization over a persistent triple index with
//! incremental maintenance:
//! - Datalog-style rules over triple patterns, compiled and specialized
//!   against the ontology's schema
//! - Semi-naive fixpoint evaluation with optional parallel rule execution
//!   inside a stratum
//! - Incremental addition seeded by the delta only
//! - Backward/Forward deletion: trace possibly-invalidated derivations,
//!   then re-derive survivors
//! - Precomputed class/property hierarchies in process-wide immutable
//!   snapshots
//!
//! The SPARQL surface, the RDF syntax parsers, and the term dictionary
//! persistence are external collaborators; this crate consumes them
//! through the capability closures in [`facts`] and the `storage` crate's
//! backend trait.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod catalog;
pub mod compiler;
pub mod delta;
pub mod engine;
pub mod facts;
pub mod incremental;
pub mod model;
pub mod optimizer;
pub mod reasoner;
pub mod registry;
pub mod retract;
pub mod schema;
pub mod tbox;

pub use catalog::{Profile, RuleDefinition};
pub use compiler::{CompiledRuleSet, CompilerOptions};
pub use engine::{MaterializeOptions, MaterializeStats};
pub use facts::{FactSet, LookupFn, StoreFn};
pub use model::{BodyElement, Condition, Rule};
pub use facts::FactSource;
pub use incremental::AddStats;
pub use reasoner::{Reasoner, ReasonerOptions, ReasonerState, ReasoningMode, StatusReport};
pub use retract::{DeleteOptions, DeleteStats};
pub use schema::SchemaInfo;

use std::time::Duration;

/// Result type for reasoning operations
pub type ReasoningResult<T> = Result<T, ReasoningError>;

/// Errors surfaced by the reasoning core.
///
/// Registry misses are not errors: lookups return `Option`.
#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    /// Fixpoint loop exceeded its iteration bound
    #[error("Materialization exceeded {0} iterations")]
    MaxIterationsExceeded(usize),

    /// Fact set reached its size bound
    #[error("Fact set reached the limit of {0} facts")]
    MaxFactsExceeded(usize),

    /// A parallel rule task exceeded its wall-clock budget
    #[error("Rule task exceeded its timeout of {0:?}")]
    TaskTimeout(Duration),

    /// A parallel rule task panicked
    #[error("Rule task crashed: {0}")]
    TaskCrashed(String),

    /// Rule failed the safety check (head variable not in body)
    #[error("Invalid rule {name}: {reason}")]
    InvalidRule {
        /// Rule name
        name: String,
        /// What the safety check found
        reason: String,
    },

    /// Re-derivation search exceeded its binding ceiling
    #[error("Binding search exceeded the ceiling of {0}")]
    BindingLimitExceeded(usize),

    /// IRI contains characters forbidden in dynamic queries
    #[error("Unsafe IRI rejected: {0}")]
    InvalidIri(String),

    /// Catalog lookup failed
    #[error("Unknown rule: {0}")]
    UnknownRule(String),

    /// Profile lookup failed
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    /// Snapshot registry reached its capacity cap
    #[error("Snapshot registry is full ({0} entries)")]
    RegistryFull(usize),

    /// Persistence-layer failure, preserved unchanged
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<storage::StorageError> for ReasoningError {
    fn from(e: storage::StorageError) -> Self {
        ReasoningError::Backend(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_preserved() {
        let inner = storage::StorageError::Backend("disk on fire".to_string());
        let err = ReasoningError::from(inner);
        assert!(err.to_string().contains("disk on fire"));
    }
}
