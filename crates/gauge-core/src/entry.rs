use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Names of the fields every entry carries, in display order.
pub const ENTRY_FIELDS: [&str; 4] = ["input", "output", "contexts", "expected_output"];

/// One record submitted for evaluation.
///
/// Entries are shared read-only between every evaluator of a run and are
/// identified by their position in the submitted sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub contexts: Option<Vec<String>>,
    #[serde(default)]
    pub expected_output: Option<String>,
    /// Evaluator-specific extension fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Entry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_contexts(mut self, contexts: Vec<String>) -> Self {
        self.contexts = Some(contexts);
        self
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Look up any field by name, named or extension. Absent fields yield `None`.
    pub fn get(&self, field: &str) -> Option<Value> {
        match field {
            "input" => self.input.clone().map(Value::String),
            "output" => self.output.clone().map(Value::String),
            "contexts" => self
                .contexts
                .as_ref()
                .map(|c| Value::Array(c.iter().cloned().map(Value::String).collect())),
            "expected_output" => self.expected_output.clone().map(Value::String),
            other => self.extra.get(other).cloned(),
        }
    }

    /// Whether the field is present and not null.
    pub fn has_field(&self, field: &str) -> bool {
        !matches!(self.get(field), None | Some(Value::Null))
    }

    /// Every field as an ordered `(name, value)` listing: the named fields first
    /// (null when absent) followed by extension fields in key order.
    pub fn fields(&self) -> Vec<(String, Value)> {
        let mut out: Vec<(String, Value)> = ENTRY_FIELDS
            .iter()
            .map(|name| (name.to_string(), self.get(name).unwrap_or(Value::Null)))
            .collect();
        out.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }
}
