use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use gauge_core::entry::Entry;
use gauge_core::env::EvaluatorEnv;
use gauge_core::error::{EvaluatorError, SettingsError};
use gauge_core::evaluator::{Category, Evaluator, EvaluatorDefinition};
use gauge_core::result::EvaluationResult;

use crate::basic::TextField;
use crate::http::{check_response, decode_error, request_error};
use crate::settings::{EvaluatorSettings, parse_settings, settings_to_json};

const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const MAX_TOKENS: usize = 8192;
const CHARS_PER_TOKEN: usize = 4;

pub static DEFINITION: EvaluatorDefinition = EvaluatorDefinition {
    id: "custom/similarity",
    name: "Semantic Similarity Evaluator",
    description: "Checks whether the input or output is semantically similar to a reference text",
    category: Category::Custom,
    env_vars: &[OPENAI_API_KEY],
    required_fields: &[],
    is_guardrail: true,
    docs_url: None,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityRule {
    IsSimilarTo,
    #[default]
    IsNotSimilarTo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimilaritySettings {
    pub field: TextField,
    pub rule: SimilarityRule,
    pub value: String,
    pub threshold: f64,
    /// `provider/model`; only `openai/` models are supported.
    pub embeddings_model: String,
}

impl Default for SimilaritySettings {
    fn default() -> Self {
        Self {
            field: TextField::Output,
            rule: SimilarityRule::IsNotSimilarTo,
            value: "example".into(),
            threshold: 0.3,
            embeddings_model: "openai/text-embedding-3-small".into(),
        }
    }
}

impl SimilaritySettings {
    fn model_name(&self) -> Option<&str> {
        self.embeddings_model
            .strip_prefix("openai/")
            .filter(|m| !m.is_empty())
    }
}

impl EvaluatorSettings for SimilaritySettings {
    fn validate(&self) -> Result<(), SettingsError> {
        if !(-1.0..=1.0).contains(&self.threshold) {
            return Err(SettingsError::invalid(
                "threshold",
                "must be between -1.0 and 1.0",
            ));
        }
        if self.value.trim().is_empty() {
            return Err(SettingsError::invalid("value", "must not be empty"));
        }
        if self.model_name().is_none() {
            return Err(SettingsError::invalid(
                "embeddings_model",
                format!(
                    "unsupported model {:?}, expected openai/<model>",
                    self.embeddings_model
                ),
            ));
        }
        Ok(())
    }
}

/// Rough token count: four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Compares one entry field against a reference text using embedding cosine similarity.
pub struct SimilarityEvaluator {
    settings: SimilaritySettings,
    env: EvaluatorEnv,
    client: Client,
    base_url: String,
}

impl SimilarityEvaluator {
    pub fn new(settings: SimilaritySettings) -> Result<Self, SettingsError> {
        Self::with_env(settings, EvaluatorEnv::from_process(DEFINITION.env_vars))
    }

    pub fn with_env(settings: SimilaritySettings, env: EvaluatorEnv) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            settings,
            env,
            client: Client::new(),
            base_url: "https://api.openai.com".into(),
        })
    }

    pub fn from_json(settings: &Value, env: EvaluatorEnv) -> Result<Self, SettingsError> {
        Self::with_env(parse_settings(settings)?, env)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn embed(&self, texts: [&str; 2]) -> Result<(Vec<f32>, Vec<f32>), EvaluatorError> {
        let api_key = self.env.require(OPENAI_API_KEY)?;
        let request = EmbeddingRequest {
            input: texts,
            model: self.settings.model_name().unwrap_or_default(),
        };

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;
        let response = check_response("OpenAI", response).await?;

        let mut body: EmbeddingResponse = response.json().await.map_err(decode_error)?;
        body.data.sort_by_key(|d| d.index);
        let mut vectors = body.data.into_iter().map(|d| d.embedding);
        match (vectors.next(), vectors.next()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(EvaluatorError::InvalidResponse(
                "Expected two embeddings in response".into(),
            )),
        }
    }
}

#[async_trait]
impl Evaluator for SimilarityEvaluator {
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
        let field = self.settings.field;
        let text = field.read(entry);
        if text.trim().is_empty() {
            return Ok(EvaluationResult::skipped(format!(
                "No {} to compare",
                field.as_str()
            )));
        }

        let tokens = estimate_tokens(text) + estimate_tokens(&self.settings.value);
        if tokens > MAX_TOKENS {
            return Ok(EvaluationResult::skipped(format!(
                "Total tokens exceed the maximum of {MAX_TOKENS} tokens: {tokens} tokens used"
            )));
        }

        let (a, b) = self.embed([text, &self.settings.value]).await?;
        let score = cosine_similarity(&a, &b);
        let passed = match self.settings.rule {
            SimilarityRule::IsSimilarTo => score >= self.settings.threshold,
            SimilarityRule::IsNotSimilarTo => score < self.settings.threshold,
        };
        Ok(EvaluationResult::processed()
            .with_score(score)
            .with_passed(passed))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: [&'a str; 2],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use serde_json::json;

    fn env_with_key() -> EvaluatorEnv {
        EvaluatorEnv::from_map(
            DEFINITION.env_vars,
            &HashMap::from([(OPENAI_API_KEY.to_string(), "test-key".to_string())]),
        )
    }

    fn settings(rule: SimilarityRule) -> SimilaritySettings {
        SimilaritySettings {
            rule,
            value: "We value you a lot!".into(),
            ..Default::default()
        }
    }

    // Returned out of order to exercise the index sort.
    fn embeddings_body(first: [f32; 2], second: [f32; 2]) -> String {
        json!({
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": second},
                {"object": "embedding", "index": 0, "embedding": first}
            ],
            "model": "text-embedding-3-small"
        })
        .to_string()
    }

    async fn evaluator_against(
        server: &mut mockito::ServerGuard,
        body: String,
        rule: SimilarityRule,
    ) -> SimilarityEvaluator {
        server
            .mock("POST", "/v1/embeddings")
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "text-embedding-3-small"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;
        SimilarityEvaluator::with_env(settings(rule), env_with_key())
            .unwrap()
            .with_base_url(server.url())
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn settings_validation() {
        assert!(SimilaritySettings::default().validate().is_ok());
        let bad_model = SimilaritySettings {
            embeddings_model: "azure/text-embedding-ada-002".into(),
            ..Default::default()
        };
        assert!(bad_model.validate().is_err());
        let bad_threshold = SimilaritySettings {
            threshold: 1.5,
            ..Default::default()
        };
        assert!(bad_threshold.validate().is_err());
    }

    #[tokio::test]
    async fn similar_text_passes_is_similar_to() {
        let mut server = mockito::Server::new_async().await;
        let eval = evaluator_against(
            &mut server,
            embeddings_body([1.0, 0.1], [0.9, 0.2]),
            SimilarityRule::IsSimilarTo,
        )
        .await;

        let result = eval
            .evaluate(&Entry::new().with_output("Your effort is really appreciated!"))
            .await
            .unwrap();
        assert!(result.score().unwrap() > 0.3);
        assert_eq!(result.passed(), Some(true));
    }

    #[tokio::test]
    async fn dissimilar_text_passes_is_not_similar_to() {
        let mut server = mockito::Server::new_async().await;
        let eval = evaluator_against(
            &mut server,
            embeddings_body([1.0, 0.0], [0.0, 1.0]),
            SimilarityRule::IsNotSimilarTo,
        )
        .await;

        let result = eval
            .evaluate(&Entry::new().with_output("You suck"))
            .await
            .unwrap();
        assert!(result.score().unwrap() < 0.3);
        assert_eq!(result.passed(), Some(true));
    }

    #[tokio::test]
    async fn long_text_is_skipped_before_calling_api() {
        let eval = SimilarityEvaluator::with_env(settings(SimilarityRule::IsSimilarTo), env_with_key())
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let output = "lorem ipsum dolor ".repeat(10_000);
        let result = eval
            .evaluate(&Entry::new().with_output(output))
            .await
            .unwrap();

        // 180000 / 4 + 19 / 4
        assert_eq!(
            result,
            EvaluationResult::skipped(
                "Total tokens exceed the maximum of 8192 tokens: 45004 tokens used"
            )
        );
    }

    #[tokio::test]
    async fn empty_field_is_skipped() {
        let eval = SimilarityEvaluator::with_env(SimilaritySettings::default(), env_with_key()).unwrap();
        let result = eval.evaluate(&Entry::new().with_input("hi")).await.unwrap();
        assert_eq!(result, EvaluationResult::skipped("No output to compare"));
    }

    #[tokio::test]
    #[ignore]
    async fn live_similarity() {
        let eval = SimilarityEvaluator::new(SimilaritySettings {
            rule: SimilarityRule::IsSimilarTo,
            value: "We value you a lot!".into(),
            ..Default::default()
        })
        .unwrap();
        let result = eval
            .evaluate(&Entry::new().with_output("Your effort is really appreciated!"))
            .await
            .unwrap();
        assert_eq!(result.passed(), Some(true));
    }
}
