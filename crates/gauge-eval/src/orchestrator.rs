use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use gauge_core::entry::Entry;
use gauge_core::error::{GaugeError, OrchestrationError, PartialResults};
use gauge_core::evaluator::Evaluator;
use gauge_core::result::{BatchEvaluationResult, EvaluationResult};
use gauge_evaluators::registry::EvaluatorRegistry;

use crate::config::EvaluationConfig;
use crate::result_set::ResultSet;

/// A configured set of evaluators ready to run against entries.
pub struct Orchestrator {
    evaluators: Vec<Arc<dyn Evaluator>>,
    config: EvaluationConfig,
}

impl Orchestrator {
    /// Run `evaluators` with the default ceilings.
    pub fn new(evaluators: Vec<Arc<dyn Evaluator>>) -> Self {
        Self {
            evaluators,
            config: EvaluationConfig::default(),
        }
    }

    pub fn with_max_evaluators_in_parallel(mut self, n: usize) -> Self {
        self.config.max_evaluators_in_parallel = n;
        self
    }

    pub fn with_max_evaluations_in_parallel(mut self, n: usize) -> Self {
        self.config.max_evaluations_in_parallel = n;
        self
    }

    /// Build every configured evaluator up front; any unknown id or invalid
    /// settings fails here, before anything runs.
    pub fn from_config(
        config: &EvaluationConfig,
        registry: &EvaluatorRegistry,
    ) -> Result<Self, GaugeError> {
        config.validate()?;
        let evaluators = config
            .evaluators
            .iter()
            .map(|spec| registry.create(&spec.id, &spec.settings))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            evaluators,
            config: config.clone(),
        })
    }

    pub fn evaluators(&self) -> &[Arc<dyn Evaluator>] {
        &self.evaluators
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub async fn run(
        &self,
        entries: Vec<Entry>,
        cancel: CancellationToken,
    ) -> Result<ResultSet, OrchestrationError> {
        evaluate(entries, self.evaluators.clone(), &self.config, cancel).await
    }
}

/// Run every evaluator against every entry.
///
/// At most `config.max_evaluators_in_parallel` evaluator batches run at once,
/// and each batch evaluates at most `config.max_evaluations_in_parallel`
/// entries at once. `config.evaluators` is not read. Result slots are fixed by
/// evaluator index before anything is scheduled.
///
/// A batch task that panics fills its evaluator's slot with `Panic` errors
/// without disturbing the others. A batch of the wrong length is replaced
/// with `InvalidBatch` errors the same way.
///
/// Cancelling `cancel` stops scheduling, signals running batches through
/// child tokens, aborts them, and returns [`OrchestrationError::Interrupted`]
/// with whatever batches had completed.
pub async fn evaluate(
    entries: Vec<Entry>,
    evaluators: Vec<Arc<dyn Evaluator>>,
    config: &EvaluationConfig,
    cancel: CancellationToken,
) -> Result<ResultSet, OrchestrationError> {
    config
        .validate()
        .map_err(|e| OrchestrationError::InvalidConfig(e.to_string()))?;

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "evaluate",
        %run_id,
        evaluators = evaluators.len(),
        entries = entries.len()
    );
    run(run_id, entries.into(), evaluators, config, cancel)
        .instrument(span)
        .await
}

async fn run(
    run_id: Uuid,
    entries: Arc<[Entry]>,
    evaluators: Vec<Arc<dyn Evaluator>>,
    config: &EvaluationConfig,
    cancel: CancellationToken,
) -> Result<ResultSet, OrchestrationError> {
    let started_at = Utc::now();
    let total = evaluators.len();
    let max_parallel = config.max_evaluations_in_parallel;

    let sem = Arc::new(Semaphore::new(config.max_evaluators_in_parallel));
    let mut join_set: JoinSet<BatchEvaluationResult> = JoinSet::new();
    let mut task_slots: HashMap<tokio::task::Id, usize> = HashMap::new();
    let mut slots: Vec<Option<BatchEvaluationResult>> = vec![None; total];
    let mut next = 0;

    tracing::info!(
        max_evaluators_in_parallel = config.max_evaluators_in_parallel,
        max_evaluations_in_parallel = max_parallel,
        "starting evaluation"
    );

    loop {
        if next == total && join_set.is_empty() {
            break;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                join_set.abort_all();
                let partial = PartialResults { results: slots };
                tracing::warn!(
                    completed = partial.completed(),
                    total,
                    "evaluation interrupted"
                );
                return Err(OrchestrationError::Interrupted { partial });
            }
            Some(joined) = join_set.join_next_with_id(), if !join_set.is_empty() => {
                match joined {
                    Ok((id, batch)) => {
                        if let Some(idx) = task_slots.remove(&id) {
                            let name = evaluators[idx].name();
                            if batch.len() == entries.len() {
                                tracing::info!(evaluator = name, "evaluator finished");
                                slots[idx] = Some(batch);
                            } else {
                                tracing::warn!(
                                    evaluator = name,
                                    returned = batch.len(),
                                    expected = entries.len(),
                                    "evaluator returned a batch of the wrong length"
                                );
                                let invalid = EvaluationResult::error(
                                    "InvalidBatch",
                                    format!(
                                        "Evaluator {name} returned {} results for {} entries",
                                        batch.len(),
                                        entries.len()
                                    ),
                                );
                                slots[idx] = Some(vec![invalid; entries.len()]);
                            }
                        }
                    }
                    Err(err) => {
                        if let Some(idx) = task_slots.remove(&err.id()) {
                            tracing::warn!(
                                evaluator = evaluators[idx].name(),
                                error = %err,
                                "evaluator batch failed"
                            );
                            let failed = EvaluationResult::error(
                                "Panic",
                                format!("Evaluator {} failed: {err}", evaluators[idx].name()),
                            );
                            slots[idx] = Some(vec![failed; entries.len()]);
                        }
                    }
                }
            }
            permit = Arc::clone(&sem).acquire_owned(), if next < total => {
                let Ok(permit) = permit else { break };
                let idx = next;
                let evaluator = Arc::clone(&evaluators[idx]);
                let entries = Arc::clone(&entries);
                let child = cancel.child_token();
                tracing::info!(evaluator = evaluator.name(), "evaluator started");
                let handle = join_set.spawn(
                    async move {
                        let _permit = permit;
                        evaluator.evaluate_batch(entries, max_parallel, child).await
                    }
                    .in_current_span(),
                );
                task_slots.insert(handle.id(), idx);
                next += 1;
            }
            else => break,
        }
    }

    let results: Vec<BatchEvaluationResult> = slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                vec![
                    EvaluationResult::error("Cancelled", "Evaluation was cancelled");
                    entries.len()
                ]
            })
        })
        .collect();

    tracing::info!("evaluation finished");
    Ok(ResultSet::new(run_id, started_at, entries, evaluators, results))
}
