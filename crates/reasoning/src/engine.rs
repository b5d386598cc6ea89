//! Semi-naive evaluation engine
//!
//! Delta-driven fixpoint: each iteration applies every rule against the
//! facts discovered in the previous iteration, subtracts what was already
//! known, persists the remainder, and repeats until nothing new appears.
//! All OWL 2 RL rules form a single stratum; the strata interface exists
//! for future rule sets that need ordering.
//!
//! Within a stratum, rules may evaluate in parallel. Results are merged by
//! set union, which is order-independent, so the final materialization is
//! deterministic under every scheduling choice.

use crate::delta::apply_rule_delta;
use crate::facts::{FactSet, LookupFn, StoreFn};
use crate::model::Rule;
use crate::{ReasoningError, ReasoningResult};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Options for one materialization run.
#[derive(Clone, Debug)]
pub struct MaterializeOptions {
    /// Fixpoint loop bound
    pub max_iterations: usize,
    /// Bound on the accumulated fact set
    pub max_facts: usize,
    /// Evaluate a stratum's rules concurrently
    pub parallel: bool,
    /// Ceiling on concurrent rule tasks
    pub max_concurrency: usize,
    /// Per rule-task wall-clock budget
    pub task_timeout: Duration,
    /// Pre-flight safety check on every rule
    pub validate_rules: bool,
    /// Emit start/stop/iteration telemetry events
    pub emit_telemetry: bool,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            max_facts: 10_000_000,
            parallel: false,
            max_concurrency: num_cpus::get(),
            task_timeout: Duration::from_secs(60),
            validate_rules: false,
            emit_telemetry: true,
        }
    }
}

/// Statistics from a materialization run.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaterializeStats {
    /// Fixpoint iterations executed
    pub iterations: usize,
    /// Facts derived beyond the initial set
    pub total_derived: usize,
    /// New derivations per iteration
    pub derivations_per_iteration: Vec<usize>,
    /// Total rule applications
    pub rules_applied: usize,
    /// Wall-clock duration
    pub duration_ms: u64,
}

/// Materialize with a single stratum.
pub fn materialize(
    lookup: &LookupFn,
    store: &StoreFn,
    rules: &[Rule],
    initial_facts: FactSet,
    opts: &MaterializeOptions,
) -> ReasoningResult<MaterializeStats> {
    materialize_strata(lookup, store, &[rules.to_vec()], initial_facts, opts)
}

/// Materialize with `parallel` preset.
pub fn materialize_parallel(
    lookup: &LookupFn,
    store: &StoreFn,
    rules: &[Rule],
    initial_facts: FactSet,
    opts: &MaterializeOptions,
) -> ReasoningResult<MaterializeStats> {
    let opts = MaterializeOptions {
        parallel: true,
        ..opts.clone()
    };
    materialize(lookup, store, rules, initial_facts, &opts)
}

/// Run the fixpoint over an ordered list of strata.
pub fn materialize_strata(
    lookup: &LookupFn,
    store: &StoreFn,
    strata: &[Vec<Rule>],
    initial_facts: FactSet,
    opts: &MaterializeOptions,
) -> ReasoningResult<MaterializeStats> {
    let started = Instant::now();
    let rule_count: usize = strata.iter().map(Vec::len).sum();

    if opts.validate_rules {
        for rule in strata.iter().flatten() {
            if !rule.is_safe() {
                return Err(ReasoningError::InvalidRule {
                    name: rule.name.clone(),
                    reason: "head variable does not occur in any body pattern".to_string(),
                });
            }
        }
    }

    if opts.emit_telemetry {
        tracing::debug!(
            rules = rule_count,
            initial = initial_facts.len(),
            parallel = opts.parallel,
            "materialize start"
        );
    }

    let mut stats = MaterializeStats::default();
    let mut all_facts = initial_facts.clone();
    let mut delta = initial_facts;

    while !delta.is_empty() {
        if stats.iterations >= opts.max_iterations {
            return Err(ReasoningError::MaxIterationsExceeded(opts.max_iterations));
        }
        if all_facts.len() >= opts.max_facts {
            return Err(ReasoningError::MaxFactsExceeded(opts.max_facts));
        }

        let mut iteration_output = FactSet::default();
        // Earlier strata's derivations are visible to later strata within
        // the same iteration.
        let mut carry = FactSet::default();
        for stratum in strata {
            let stratum_output = if opts.parallel && stratum.len() > 1 {
                apply_stratum_parallel(lookup, stratum, &delta, &all_facts, &carry, opts)?
            } else {
                apply_stratum_sequential(lookup, stratum, &delta, &all_facts, &carry)?
            };
            stats.rules_applied += stratum.len();
            carry.extend(stratum_output.iter().cloned());
            iteration_output.extend(stratum_output);
        }

        let new_derivations: FactSet = iteration_output
            .into_iter()
            .filter(|t| !all_facts.contains(t))
            .collect();

        stats.iterations += 1;
        stats.derivations_per_iteration.push(new_derivations.len());
        if opts.emit_telemetry {
            tracing::debug!(
                iteration = stats.iterations,
                derived = new_derivations.len(),
                total = all_facts.len(),
                "materialize iteration"
            );
        }

        if !new_derivations.is_empty() {
            store(&new_derivations)?;
        }
        all_facts.extend(new_derivations.iter().cloned());
        stats.total_derived += new_derivations.len();
        delta = new_derivations;
    }

    stats.duration_ms = started.elapsed().as_millis() as u64;
    if opts.emit_telemetry {
        tracing::info!(
            iterations = stats.iterations,
            derived = stats.total_derived,
            duration_ms = stats.duration_ms,
            "materialize stop"
        );
    }
    Ok(stats)
}

fn apply_stratum_sequential(
    lookup: &LookupFn,
    rules: &[Rule],
    delta: &FactSet,
    all_facts: &FactSet,
    carry: &FactSet,
) -> ReasoningResult<FactSet> {
    let mut output = FactSet::default();
    for rule in rules {
        output.extend(apply_rule_delta(lookup, rule, delta, &[all_facts, carry])?);
    }
    Ok(output)
}

/// Evaluate a stratum's rules over a bounded worker pool.
///
/// Every task sees the same delta and fact snapshot and writes nothing
/// shared; the union of their outputs is taken on the driver thread, so
/// completion order cannot influence the result. The first error or
/// timeout aborts the materialization before anything is stored for this
/// iteration.
fn apply_stratum_parallel(
    lookup: &LookupFn,
    rules: &[Rule],
    delta: &FactSet,
    all_facts: &FactSet,
    carry: &FactSet,
    opts: &MaterializeOptions,
) -> ReasoningResult<FactSet> {
    let rules: Arc<Vec<Rule>> = Arc::new(rules.to_vec());
    let delta = Arc::new(delta.clone());
    let local = {
        let mut snapshot = all_facts.clone();
        snapshot.extend(carry.iter().cloned());
        Arc::new(snapshot)
    };

    let (task_tx, task_rx) = crossbeam_channel::unbounded::<usize>();
    let (result_tx, result_rx) = crossbeam_channel::unbounded();
    for index in 0..rules.len() {
        let _ = task_tx.send(index);
    }
    drop(task_tx);

    let workers = opts.max_concurrency.clamp(1, rules.len());
    for _ in 0..workers {
        let task_rx = task_rx.clone();
        let result_tx = result_tx.clone();
        let lookup = Arc::clone(lookup);
        let rules = Arc::clone(&rules);
        let delta = Arc::clone(&delta);
        let local = Arc::clone(&local);
        std::thread::spawn(move || {
            while let Ok(index) = task_rx.recv() {
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    apply_rule_delta(&lookup, &rules[index], &delta, &[local.as_ref()])
                }));
                let message = match outcome {
                    Ok(result) => result,
                    Err(panic) => Err(ReasoningError::TaskCrashed(panic_message(panic.as_ref()))),
                };
                if result_tx.send(message).is_err() {
                    // Driver gave up (error or timeout); stop working.
                    break;
                }
            }
        });
    }
    drop(result_tx);

    let deadline = Instant::now() + opts.task_timeout;
    let mut union = FactSet::default();
    for _ in 0..rules.len() {
        match result_rx.recv_deadline(deadline) {
            Ok(Ok(derived)) => union.extend(derived),
            Ok(Err(error)) => return Err(error),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                return Err(ReasoningError::TaskTimeout(opts.task_timeout))
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                return Err(ReasoningError::TaskCrashed(
                    "worker pool disconnected".to_string(),
                ))
            }
        }
    }
    Ok(union)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
