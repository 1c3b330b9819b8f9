use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::entry::Entry;
use crate::env::EvaluatorEnv;
use crate::error::EvaluatorError;
use crate::result::{BatchEvaluationResult, EvaluationResult};

/// Broad grouping of evaluators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Quality,
    Rag,
    Safety,
    Policy,
    Other,
    Custom,
}

/// Static metadata describing a concrete evaluator.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluatorDefinition {
    /// Registry identifier, e.g. `"openai/moderation"`.
    pub id: &'static str,
    /// Display name, used as the column name in result tables.
    pub name: &'static str,
    pub description: &'static str,
    pub category: Category,
    /// Environment variables that must be set for the evaluator to run.
    pub env_vars: &'static [&'static str],
    /// Entry fields that must be present (non-null) for an entry to be evaluated.
    pub required_fields: &'static [&'static str],
    /// Guardrails gate content; non-guardrails only score it.
    pub is_guardrail: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<&'static str>,
}

/// A pluggable scoring or classification unit.
///
/// Implementors provide `evaluate` for a single entry. The provided
/// `evaluate_one` and `evaluate_batch` wrap it so that failures never escape
/// as errors: every entry ends up with an [`EvaluationResult`].
#[async_trait]
pub trait Evaluator: Send + Sync + 'static {
    fn definition(&self) -> &EvaluatorDefinition;

    /// Validated settings, as JSON.
    fn settings_json(&self) -> Value;

    /// Credentials resolved at construction.
    fn env(&self) -> &EvaluatorEnv;

    /// Evaluate one entry. Errors are converted to `Error` results by `evaluate_one`.
    async fn evaluate(&self, entry: &Entry) -> Result<EvaluationResult, EvaluatorError>;

    fn name(&self) -> &str {
        self.definition().name
    }

    /// Evaluate one entry, converting every failure into a result value.
    async fn evaluate_one(&self, entry: &Entry) -> EvaluationResult {
        let missing: Vec<&str> = self
            .definition()
            .required_fields
            .iter()
            .copied()
            .filter(|field| !entry.has_field(field))
            .collect();
        if !missing.is_empty() {
            return EvaluationResult::skipped(format!(
                "Missing required field(s): {}",
                missing.join(", ")
            ));
        }

        match self.evaluate(entry).await {
            Ok(result) => result,
            Err(err) => {
                tracing::debug!(evaluator = self.name(), error = %err, "entry evaluation failed");
                err.into()
            }
        }
    }

    /// Evaluate every entry with at most `max_parallel` evaluations in flight.
    ///
    /// The output has one result per entry, in input order.
    async fn evaluate_batch(
        self: Arc<Self>,
        entries: Arc<[Entry]>,
        max_parallel: usize,
        cancel: CancellationToken,
    ) -> BatchEvaluationResult {
        run_batch(self, entries, max_parallel, cancel).await
    }
}

/// Default batch runner behind [`Evaluator::evaluate_batch`].
///
/// Entries are fanned out onto a `JoinSet` gated by a semaphore of
/// `max_parallel` permits (0 is treated as 1). Each task owns a result slot
/// chosen by entry index before it is spawned. A panicking entry only fails
/// its own slot. When `cancel` fires no further entries are launched, in-flight
/// tasks are aborted, and unfinished slots resolve to `Cancelled` errors.
pub async fn run_batch<E>(
    evaluator: Arc<E>,
    entries: Arc<[Entry]>,
    max_parallel: usize,
    cancel: CancellationToken,
) -> BatchEvaluationResult
where
    E: Evaluator + ?Sized,
{
    let total = entries.len();
    let name = evaluator.name().to_string();

    if let Err(err) = evaluator.env().check() {
        tracing::warn!(evaluator = %name, error = %err, "evaluator unavailable");
        return vec![EvaluationResult::from(err); total];
    }

    let sem = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut join_set: JoinSet<EvaluationResult> = JoinSet::new();
    let mut task_slots: HashMap<tokio::task::Id, usize> = HashMap::new();
    let mut slots: Vec<Option<EvaluationResult>> = vec![None; total];
    let mut next = 0;

    loop {
        if next == total && join_set.is_empty() {
            break;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(
                    evaluator = %name,
                    launched = next,
                    total,
                    "batch cancelled; aborting in-flight entries"
                );
                join_set.abort_all();
                break;
            }
            Some(joined) = join_set.join_next_with_id(), if !join_set.is_empty() => {
                match joined {
                    Ok((id, result)) => {
                        if let Some(idx) = task_slots.remove(&id) {
                            tracing::debug!(evaluator = %name, entry = idx, status = result.status(), "entry evaluated");
                            slots[idx] = Some(result);
                        }
                    }
                    Err(err) => {
                        if let Some(idx) = task_slots.remove(&err.id()) {
                            tracing::warn!(evaluator = %name, entry = idx, error = %err, "entry task failed");
                            slots[idx] = Some(EvaluationResult::error(
                                "Panic",
                                format!("Evaluation task failed: {err}"),
                            ));
                        }
                    }
                }
            }
            permit = Arc::clone(&sem).acquire_owned(), if next < total => {
                let Ok(permit) = permit else { break };
                let idx = next;
                let evaluator = Arc::clone(&evaluator);
                let entries = Arc::clone(&entries);
                let handle = join_set.spawn(async move {
                    let _permit = permit;
                    evaluator.evaluate_one(&entries[idx]).await
                });
                task_slots.insert(handle.id(), idx);
                next += 1;
            }
            else => break,
        }
    }

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| EvaluationResult::error("Cancelled", "Evaluation was cancelled"))
        })
        .collect()
}
