use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Number, Value};
use uuid::Uuid;

use gauge_core::entry::Entry;
use gauge_core::evaluator::Evaluator;
use gauge_core::result::{BatchEvaluationResult, EvaluationResult};

use crate::table::Table;

/// Entries × evaluators × results of one run.
///
/// `results[i]` belongs to `evaluators[i]`, and `results[i][j]` to `entries[j]`.
/// Built once by the orchestrator and read-only afterwards.
pub struct ResultSet {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    entries: Arc<[Entry]>,
    evaluators: Vec<Arc<dyn Evaluator>>,
    results: Vec<BatchEvaluationResult>,
}

impl ResultSet {
    pub(crate) fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        entries: Arc<[Entry]>,
        evaluators: Vec<Arc<dyn Evaluator>>,
        results: Vec<BatchEvaluationResult>,
    ) -> Self {
        debug_assert_eq!(results.len(), evaluators.len());
        debug_assert!(results.iter().all(|r| r.len() == entries.len()));
        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            entries,
            evaluators,
            results,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn evaluators(&self) -> &[Arc<dyn Evaluator>] {
        &self.evaluators
    }

    pub fn results(&self) -> &[BatchEvaluationResult] {
        &self.results
    }

    /// Display names in evaluator order, with repeats suffixed ` (2)`, ` (3)`, ...
    pub fn evaluator_names(&self) -> Vec<String> {
        unique_names(self.evaluators.iter().map(|e| e.name()))
    }

    /// Raw results keyed by evaluator display name.
    pub fn to_list(&self) -> BTreeMap<String, BatchEvaluationResult> {
        self.evaluator_names()
            .into_iter()
            .zip(self.results.iter().cloned())
            .collect()
    }

    /// One row per entry: the entry fields, then a summary column per
    /// evaluator and a `<name>_details` column for evaluators that produced
    /// any details. Columns that are null in every row are dropped.
    pub fn to_table(&self) -> Table {
        let mut field_names: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let entry_fields: Vec<HashMap<String, Value>> = self
            .entries
            .iter()
            .map(|entry| {
                let fields = entry.fields();
                for (name, _) in &fields {
                    if seen.insert(name.clone()) {
                        field_names.push(name.clone());
                    }
                }
                fields.into_iter().collect()
            })
            .collect();

        let mut columns = field_names.clone();
        let mut evaluator_columns: Vec<(usize, bool)> = Vec::new();
        for (idx, name) in self.evaluator_names().into_iter().enumerate() {
            let has_details = self.results[idx].iter().any(|r| r.details().is_some());
            if has_details {
                columns.push(name.clone());
                columns.push(format!("{name}_details"));
            } else {
                columns.push(name);
            }
            evaluator_columns.push((idx, has_details));
        }

        let mut table = Table::new(columns);
        for (row_idx, fields) in entry_fields.iter().enumerate() {
            let mut row: Vec<Value> = field_names
                .iter()
                .map(|name| fields.get(name).cloned().unwrap_or(Value::Null))
                .collect();
            for &(idx, has_details) in &evaluator_columns {
                let result = &self.results[idx][row_idx];
                row.push(summary_cell(result));
                if has_details {
                    row.push(
                        result
                            .details()
                            .map(|d| Value::String(d.to_string()))
                            .unwrap_or(Value::Null),
                    );
                }
            }
            table.rows.push(row);
        }

        table.drop_empty_columns();
        table
    }
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("run_id", &self.run_id)
            .field("entries", &self.entries.len())
            .field("evaluators", &self.evaluator_names())
            .field("results", &self.results)
            .finish()
    }
}

/// Status string unless processed; then `passed`, else `score`.
fn summary_cell(result: &EvaluationResult) -> Value {
    if !result.is_processed() {
        return Value::String(result.status().to_string());
    }
    if let Some(passed) = result.passed() {
        return Value::Bool(passed);
    }
    result
        .score()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn unique_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    names
        .map(|name| {
            let count = counts.entry(name).or_insert(0);
            *count += 1;
            if *count == 1 {
                name.to_string()
            } else {
                format!("{name} ({count})")
            }
        })
        .collect()
}
