use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use gauge_core::entry::Entry;
use gauge_core::env::EvaluatorEnv;
use gauge_core::error::{EvaluatorError, SettingsError};
use gauge_core::evaluator::{Category, Evaluator, EvaluatorDefinition};
use gauge_core::result::EvaluationResult;

use crate::settings::{EvaluatorSettings, parse_settings, settings_to_json};

pub static DEFINITION: EvaluatorDefinition = EvaluatorDefinition {
    id: "example/word_count",
    name: "Example Evaluator",
    description: "Counts the words in the output",
    category: Category::Other,
    env_vars: &[],
    required_fields: &["output"],
    is_guardrail: false,
    docs_url: None,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WordCountSettings {}

impl EvaluatorSettings for WordCountSettings {}

pub struct WordCountEvaluator {
    settings: WordCountSettings,
    env: EvaluatorEnv,
}

impl WordCountEvaluator {
    pub fn new() -> Self {
        Self {
            settings: WordCountSettings::default(),
            env: EvaluatorEnv::empty(),
        }
    }

    pub fn from_json(settings: &Value) -> Result<Self, SettingsError> {
        let settings: WordCountSettings = parse_settings(settings)?;
        Ok(Self {
            settings,
            env: EvaluatorEnv::empty(),
        })
    }
}

impl Default for WordCountEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Evaluator for WordCountEvaluator {
    fn definition(&self) -> &EvaluatorDefinition {
        &DEFINITION
    }

    fn settings_json(&self) -> Value {
        settings_to_json(&self.settings)
    }

    fn env(&self) -> &EvaluatorEnv {
        &self.env
    }

    async fn evaluate(&self, entry: &Entry) -> Result<EvaluationResult, EvaluatorError> {
        let words = entry
            .output
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .count();
        Ok(EvaluationResult::processed()
            .with_score(words as f64)
            .with_details(Some(format!("Words found: {words}"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn counts_words() {
        let eval = WordCountEvaluator::new();
        let result = eval
            .evaluate(&Entry::new().with_output("  the quick\nbrown   fox "))
            .await
            .unwrap();
        assert_eq!(result.score(), Some(4.0));
        assert_eq!(result.passed(), None);
        assert_eq!(result.details(), Some("Words found: 4"));
    }

    #[tokio::test]
    async fn missing_output_is_skipped_by_default_runner() {
        let eval = WordCountEvaluator::new();
        let result = eval.evaluate_one(&Entry::new().with_input("hi")).await;
        assert_eq!(result.status(), "skipped");
    }

    #[test]
    fn rejects_any_settings() {
        assert!(WordCountEvaluator::from_json(&json!({})).is_ok());
        assert!(WordCountEvaluator::from_json(&json!({"max": 1})).is_err());
    }
}
