use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

pub const DEFAULT_MAX_EVALUATORS_IN_PARALLEL: usize = 5;
pub const DEFAULT_MAX_EVALUATIONS_IN_PARALLEL: usize = 50;

/// One evaluator to run: registry id plus its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluatorSpec {
    pub id: String,
    /// Missing or `null` means the evaluator's defaults.
    #[serde(default)]
    pub settings: Value,
}

impl EvaluatorSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            settings: Value::Null,
        }
    }

    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }
}

/// Configuration for one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluationConfig {
    /// Evaluators running at once.
    pub max_evaluators_in_parallel: usize,

    /// Entries one evaluator processes at once.
    pub max_evaluations_in_parallel: usize,

    pub evaluators: Vec<EvaluatorSpec>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_evaluators_in_parallel: DEFAULT_MAX_EVALUATORS_IN_PARALLEL,
            max_evaluations_in_parallel: DEFAULT_MAX_EVALUATIONS_IN_PARALLEL,
            evaluators: Vec::new(),
        }
    }
}

impl EvaluationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_evaluators_in_parallel(mut self, n: usize) -> Self {
        self.max_evaluators_in_parallel = n;
        self
    }

    pub fn with_max_evaluations_in_parallel(mut self, n: usize) -> Self {
        self.max_evaluations_in_parallel = n;
        self
    }

    pub fn with_evaluator(mut self, spec: EvaluatorSpec) -> Self {
        self.evaluators.push(spec);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_evaluators_in_parallel == 0 {
            return Err(ConfigError::Invalid(
                "max_evaluators_in_parallel must be at least 1".into(),
            ));
        }
        if self.max_evaluations_in_parallel == 0 {
            return Err(ConfigError::Invalid(
                "max_evaluations_in_parallel must be at least 1".into(),
            ));
        }
        if let Some(spec) = self.evaluators.iter().find(|s| s.id.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "evaluator id must not be empty (settings: {})",
                spec.settings
            )));
        }
        Ok(())
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = read_file(path)?;
        match extension(path).as_deref() {
            Some("json") => Self::from_json(&text),
            Some("yaml" | "yml") => Self::from_yaml(&text),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

pub(crate) fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_config() {
        let config = EvaluationConfig::default();
        assert_eq!(config.max_evaluators_in_parallel, 5);
        assert_eq!(config.max_evaluations_in_parallel, 50);
        assert!(config.evaluators.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_methods() {
        let config = EvaluationConfig::new()
            .with_max_evaluators_in_parallel(2)
            .with_max_evaluations_in_parallel(10)
            .with_evaluator(
                EvaluatorSpec::new("langevals/competitor_blocklist")
                    .with_settings(json!({"competitors": ["OpenAI"]})),
            );
        assert_eq!(config.max_evaluators_in_parallel, 2);
        assert_eq!(config.max_evaluations_in_parallel, 10);
        assert_eq!(config.evaluators.len(), 1);
        assert_eq!(config.evaluators[0].settings["competitors"][0], "OpenAI");
    }

    #[test]
    fn zero_ceilings_are_rejected() {
        let err = EvaluationConfig::new()
            .with_max_evaluators_in_parallel(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("max_evaluators_in_parallel"));

        let err = EvaluationConfig::new()
            .with_max_evaluations_in_parallel(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("max_evaluations_in_parallel"));
    }

    #[test]
    fn parse_yaml_with_defaults() {
        let yaml = r#"
max_evaluators_in_parallel: 3
evaluators:
  - id: example/word_count
  - id: custom/basic
    settings:
      rules:
        - field: output
          rule: contains
          value: thanks
"#;
        let config = EvaluationConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.max_evaluators_in_parallel, 3);
        assert_eq!(config.max_evaluations_in_parallel, 50);
        assert_eq!(config.evaluators[0].settings, Value::Null);
        assert_eq!(config.evaluators[1].settings["rules"][0]["value"], "thanks");
    }

    #[test]
    fn parse_json_rejects_unknown_keys() {
        assert!(EvaluationConfig::from_json(r#"{"max_parallel": 3}"#).is_err());
        assert!(EvaluationConfig::from_json(r#"{"max_evaluations_in_parallel": 0}"#).is_err());
    }

    #[test]
    fn from_path_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml_path = dir.path().join("run.yml");
        std::fs::write(&yaml_path, "evaluators:\n  - id: example/word_count\n").unwrap();
        let config = EvaluationConfig::from_path(&yaml_path).unwrap();
        assert_eq!(config.evaluators[0].id, "example/word_count");

        let txt_path = dir.path().join("run.txt");
        std::fs::write(&txt_path, "{}").unwrap();
        assert!(matches!(
            EvaluationConfig::from_path(&txt_path),
            Err(ConfigError::UnsupportedFormat { .. })
        ));

        assert!(matches!(
            EvaluationConfig::from_path(dir.path().join("missing.yaml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
