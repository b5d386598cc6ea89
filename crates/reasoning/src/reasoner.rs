//! Reasoner facade
//!
//! Ties the compiler, engine, TBox caches, and the persistent stores into
//! one handle with the operational surface: configure, materialize, add,
//! delete, preview, status.

use crate::catalog::{Profile, HYBRID_MATERIALIZED_RULES};
use crate::compiler::{self, CompiledRuleSet, CompilerOptions};
use crate::engine::{self, MaterializeOptions, MaterializeStats};
use crate::facts::{
    derived_store_fn, empty_lookup, store_lookup, FactSet, FactSource,
};
use crate::incremental::{self, AddStats};
use crate::model::Rule;
use crate::retract::{self, DeleteOptions, DeleteStats};
use crate::schema::{extract_schema, SchemaOptions};
use crate::{tbox, ReasoningResult};
use rdf_model::{Dictionary, Triple};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use storage::{DerivedStore, IdPattern, IdTriple, StorageBackend, TripleIndex};

/// How much inference is materialized.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReasoningMode {
    /// All inferences precomputed into the derived store
    Materialized,
    /// Nothing precomputed; inference happens during query answering
    QueryTime,
    /// The hierarchy rule subset is materialized, the rest is query-time
    Hybrid,
    /// No inference at all
    None,
}

/// Lifecycle state of a reasoner handle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReasonerState {
    /// Configured, nothing materialized yet
    Initialized,
    /// Materialization is current
    Materialized,
    /// Schema changed since the last materialization
    Stale,
    /// The last operation failed
    Error,
}

/// Options bundle for a reasoner handle.
#[derive(Clone, Debug, Default)]
pub struct ReasonerOptions {
    /// Engine options
    pub materialize: MaterializeOptions,
    /// Compiler options
    pub compiler: CompilerOptions,
    /// Deletion options
    pub delete: DeleteOptions,
}

/// Point-in-time report of a reasoner's state.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusReport {
    /// Profile name
    pub profile: String,
    /// Reasoning mode
    pub mode: ReasoningMode,
    /// Asserted triple count
    pub explicit_count: u64,
    /// Inferred triple count
    pub derived_count: u64,
    /// Unix-epoch milliseconds of the last successful materialization
    pub last_materialization_ms: Option<u64>,
    /// Lifecycle state
    pub state: ReasonerState,
}

/// A configured reasoner over a shared storage backend.
pub struct Reasoner<B> {
    profile: Profile,
    mode: ReasoningMode,
    options: ReasonerOptions,
    dict: Dictionary,
    index: TripleIndex<B>,
    derived: DerivedStore<B>,
    /// Opaque registry key for this handle's compiled rules and TBox caches
    ontology_key: String,
    compiled_version: Option<u64>,
    state: ReasonerState,
    last_materialization_ms: Option<u64>,
}

impl<B: StorageBackend + 'static> Reasoner<B> {
    /// Configure a reasoner handle over a backend.
    pub fn configure(
        backend: Arc<B>,
        profile: Profile,
        mode: ReasoningMode,
        options: ReasonerOptions,
    ) -> Self {
        let index = TripleIndex::new(Arc::clone(&backend));
        let derived = DerivedStore::new(backend);
        Self {
            profile,
            mode,
            options,
            dict: Dictionary::new(),
            index,
            derived,
            ontology_key: format!("ontology-{:016x}", rand::random::<u64>()),
            compiled_version: None,
            state: ReasonerState::Initialized,
            last_materialization_ms: None,
        }
    }

    /// The dictionary shared with ingest
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    /// The registry key this handle publishes snapshots under
    pub fn ontology_key(&self) -> &str {
        &self.ontology_key
    }

    /// Compile (or recompile) the rule set for the current fact state and
    /// publish it under this handle's key.
    fn compile_rules(&mut self) -> ReasoningResult<Arc<CompiledRuleSet>> {
        if let Some(version) = self.compiled_version {
            if !compiler::is_stale(&self.ontology_key, version) {
                if let Some(set) = compiler::compiled_rule_sets().load(&self.ontology_key) {
                    return Ok(set);
                }
            }
        }

        let lookup = store_lookup(
            self.dict.clone(),
            self.index.clone(),
            self.derived.clone(),
            FactSource::Both,
        );
        let schema_opts = SchemaOptions {
            max_properties: self.options.compiler.max_properties,
        };
        let schema = extract_schema(&lookup, &schema_opts)?;
        let set = compiler::compile_and_publish(
            &self.ontology_key,
            self.profile,
            schema,
            &self.options.compiler,
            None,
        )?;
        self.compiled_version = Some(set.version);
        Ok(set)
    }

    /// The rules this mode actually materializes.
    fn active_rules(&self, compiled: &CompiledRuleSet) -> Vec<Rule> {
        match self.mode {
            ReasoningMode::Materialized => compiled.materializable_rules(),
            ReasoningMode::Hybrid => compiled
                .materializable_rules()
                .into_iter()
                .filter(|r| {
                    HYBRID_MATERIALIZED_RULES.contains(&r.name.as_str())
                })
                .collect(),
            ReasoningMode::QueryTime | ReasoningMode::None => Vec::new(),
        }
    }

    /// Snapshot of the asserted triples, decoded to terms.
    pub fn explicit_facts(&self) -> ReasoningResult<FactSet> {
        let mut facts = FactSet::default();
        for id_triple in self.index.lookup(&IdPattern::all())? {
            if let Some(t) = self.dict.decode_triple(id_triple.into()) {
                facts.insert(t);
            }
        }
        Ok(facts)
    }

    /// Snapshot of the inferred triples, decoded to terms.
    pub fn derived_facts(&self) -> ReasoningResult<FactSet> {
        let mut facts = FactSet::default();
        for id_triple in self.derived.lookup_derived(&IdPattern::all())? {
            if let Some(t) = self.dict.decode_triple(id_triple.into()) {
                facts.insert(t);
            }
        }
        Ok(facts)
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Materialize the closure of the current explicit facts (optionally
    /// inserting `initial_facts` first).
    ///
    /// The whole population is seeded as the engine's delta; the derived
    /// store receives every inference.
    pub fn materialize(&mut self, initial_facts: Option<Vec<Triple>>) -> ReasoningResult<MaterializeStats> {
        if let Some(triples) = initial_facts {
            let ids: Vec<IdTriple> = triples
                .iter()
                .map(|t| self.dict.encode_triple(t).into())
                .collect();
            self.index.insert_triples(&ids)?;
            // Schema-bearing input invalidates any previously compiled set
            self.after_write(&triples)?;
        }

        let compiled = self.compile_rules()?;
        let rules = self.active_rules(&compiled);

        let mut seed = self.explicit_facts()?;
        seed.extend(self.derived_facts()?);

        let store = derived_store_fn(self.dict.clone(), self.derived.clone());
        let result = engine::materialize(
            &empty_lookup(),
            &store,
            &rules,
            seed,
            &self.options.materialize,
        );

        match result {
            Ok(stats) => {
                self.state = ReasonerState::Materialized;
                self.last_materialization_ms = Some(Self::now_ms());
                Ok(stats)
            }
            Err(error) => {
                self.state = ReasonerState::Error;
                Err(error)
            }
        }
    }

    /// Incrementally add triples; only the delta's consequences are
    /// computed. TBox-touching additions invalidate the caches and mark
    /// the handle stale.
    pub fn add(&mut self, triples: Vec<Triple>) -> ReasoningResult<AddStats> {
        let compiled = self.compile_rules()?;
        let rules = self.active_rules(&compiled);

        let stats = incremental::add_to_store(
            &self.dict,
            &self.index,
            &self.derived,
            triples.clone(),
            &rules,
            &self.options.materialize,
        )?;

        self.after_write(&triples)?;
        Ok(stats)
    }

    /// Delete triples with reasoning (Backward/Forward), in chunks.
    pub fn delete(&mut self, triples: &[Triple]) -> ReasoningResult<DeleteStats> {
        let compiled = self.compile_rules()?;
        let rules = self.active_rules(&compiled);

        let stats = retract::delete_bulk(
            &self.dict,
            &self.index,
            &self.derived,
            triples,
            &rules,
            &self.options.delete,
        )?;

        self.after_write(triples)?;
        Ok(stats)
    }

    /// Handle TBox invalidation after a mutation.
    fn after_write(&mut self, touched: &[Triple]) -> ReasoningResult<()> {
        let impact = tbox::needs_recomputation(touched);
        if impact.any() {
            let mut current = self.explicit_facts()?;
            current.extend(self.derived_facts()?);
            tbox::handle_tbox_update(touched, &current, &self.ontology_key, false)?;
            // The compiled set was built against the old schema
            compiler::compiled_rule_sets().remove(&self.ontology_key);
            self.compiled_version = None;
            if self.state == ReasonerState::Materialized {
                self.state = ReasonerState::Stale;
            }
        }
        Ok(())
    }

    /// Dry-run addition: the derivations the triples would introduce,
    /// without touching any store.
    pub fn preview_add(&mut self, triples: Vec<Triple>) -> ReasoningResult<FactSet> {
        let compiled = self.compile_rules()?;
        let rules = self.active_rules(&compiled);

        let mut existing = self.explicit_facts()?;
        existing.extend(self.derived_facts()?);
        incremental::preview_add(triples, &existing, &rules, &self.options.materialize)
    }

    /// Dry-run deletion: the statistics a deletion would produce, without
    /// touching any store.
    pub fn preview_delete(&mut self, triples: &[Triple]) -> ReasoningResult<DeleteStats> {
        let compiled = self.compile_rules()?;
        let rules = self.active_rules(&compiled);

        let explicit = self.explicit_facts()?;
        let derived = self.derived_facts()?;
        let plan = retract::plan_deletion(triples, &explicit, &derived, &rules, &self.options.delete);

        Ok(DeleteStats {
            explicit_deleted: plan.explicit_to_delete.len(),
            derived_deleted: plan.derived_to_delete.len(),
            derived_kept: plan.kept.len(),
            potentially_invalid_count: plan.trace.potentially_invalid.len(),
            duration_ms: 0,
        })
    }

    /// Current status of this handle.
    pub fn status(&self) -> ReasoningResult<StatusReport> {
        Ok(StatusReport {
            profile: self.profile.name().to_string(),
            mode: self.mode,
            explicit_count: self.index.count()?,
            derived_count: self.derived.count()?,
            last_materialization_ms: self.last_materialization_ms,
            state: self.state,
        })
    }

    /// Tear down this handle's published snapshots.
    pub fn unload(&mut self) {
        compiler::compiled_rule_sets().remove(&self.ontology_key);
        tbox::class_hierarchies().remove(&self.ontology_key);
        tbox::property_hierarchies().remove(&self.ontology_key);
        self.compiled_version = None;
        self.state = ReasonerState::Initialized;
    }
}

impl<B> Drop for Reasoner<B> {
    fn drop(&mut self) {
        compiler::compiled_rule_sets().remove(&self.ontology_key);
        tbox::class_hierarchies().remove(&self.ontology_key);
        tbox::property_hierarchies().remove(&self.ontology_key);
    }
}
