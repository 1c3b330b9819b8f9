use std::path::Path;

use serde_json::Value;

use gauge_core::entry::Entry;

use crate::config::{extension, read_file};
use crate::error::ConfigError;

/// A named collection of entries loaded from tabular input.
///
/// Each row is an object whose `input`, `output`, `contexts` and
/// `expected_output` keys map onto the entry fields; any other key becomes an
/// extension field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub entries: Vec<Entry>,
}

impl Dataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn with_entries(mut self, entries: Vec<Entry>) -> Self {
        self.entries = entries;
        self
    }

    pub fn add_entry(&mut self, entry: Entry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    /// Load from a JSON array of row objects.
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self, ConfigError> {
        let rows: Vec<Value> = serde_json::from_str(json)?;
        Self::from_rows(name, rows)
    }

    /// Load from JSON Lines: one row object per non-blank line.
    pub fn from_jsonl(name: impl Into<String>, jsonl: &str) -> Result<Self, ConfigError> {
        let rows = jsonl
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| ConfigError::InvalidRow {
                    row: i + 1,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<Value>, _>>()?;
        Self::from_rows(name, rows)
    }

    /// Load from a YAML sequence of row mappings.
    pub fn from_yaml(name: impl Into<String>, yaml: &str) -> Result<Self, ConfigError> {
        let rows: Vec<Value> = serde_yaml::from_str(yaml)?;
        Self::from_rows(name, rows)
    }

    /// Load from `.json`, `.jsonl`/`.ndjson` or `.yaml`/`.yml`; the dataset is
    /// named after the file stem.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("dataset")
            .to_string();
        let text = read_file(path)?;
        match extension(path).as_deref() {
            Some("json") => Self::from_json(name, &text),
            Some("jsonl" | "ndjson") => Self::from_jsonl(name, &text),
            Some("yaml" | "yml") => Self::from_yaml(name, &text),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    fn from_rows(name: impl Into<String>, rows: Vec<Value>) -> Result<Self, ConfigError> {
        let entries = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| entry_from_row(i + 1, row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(name).with_entries(entries))
    }
}

fn entry_from_row(row: usize, value: Value) -> Result<Entry, ConfigError> {
    if !value.is_object() {
        return Err(ConfigError::InvalidRow {
            row,
            reason: "expected an object".into(),
        });
    }
    serde_json::from_value(value).map_err(|e| ConfigError::InvalidRow {
        row,
        reason: e.to_string(),
    })
}
