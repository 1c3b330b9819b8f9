use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use gauge_core::entry::Entry;
use gauge_core::env::EvaluatorEnv;
use gauge_core::error::{EvaluatorError, SettingsError};
use gauge_core::evaluator::{Category, Evaluator, EvaluatorDefinition};
use gauge_core::result::EvaluationResult;

use crate::http::{check_response, decode_error, request_error, truncate_chars};
use crate::settings::{EvaluatorSettings, parse_settings, settings_to_json};

const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const MAX_CONTENT_CHARS: usize = 10_000;

pub static DEFINITION: EvaluatorDefinition = EvaluatorDefinition {
    id: "openai/moderation",
    name: "OpenAI Moderation",
    description: "Flags harmful content with the OpenAI moderation API",
    category: Category::Safety,
    env_vars: &[OPENAI_API_KEY],
    required_fields: &[],
    is_guardrail: true,
    docs_url: Some("https://platform.openai.com/docs/guides/moderation/overview"),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModerationModel {
    #[default]
    #[serde(rename = "text-moderation-stable")]
    Stable,
    #[serde(rename = "text-moderation-latest")]
    Latest,
}

impl ModerationModel {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "text-moderation-stable",
            Self::Latest => "text-moderation-latest",
        }
    }
}

/// Which moderation categories count as a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModerationCategories {
    pub harassment: bool,
    pub harassment_threatening: bool,
    pub hate: bool,
    pub hate_threatening: bool,
    pub self_harm: bool,
    pub self_harm_instructions: bool,
    pub self_harm_intent: bool,
    pub sexual: bool,
    pub sexual_minors: bool,
    pub violence: bool,
    pub violence_graphic: bool,
}

impl Default for ModerationCategories {
    fn default() -> Self {
        Self {
            harassment: true,
            harassment_threatening: true,
            hate: true,
            hate_threatening: true,
            self_harm: true,
            self_harm_instructions: true,
            self_harm_intent: true,
            sexual: true,
            sexual_minors: true,
            violence: true,
            violence_graphic: true,
        }
    }
}

impl ModerationCategories {
    /// Enabled categories as `(api_key, display_name)` pairs.
    fn enabled(&self) -> Vec<(&'static str, &'static str)> {
        [
            (self.harassment, "harassment", "harassment"),
            (
                self.harassment_threatening,
                "harassment/threatening",
                "harassment_threatening",
            ),
            (self.hate, "hate", "hate"),
            (self.hate_threatening, "hate/threatening", "hate_threatening"),
            (self.self_harm, "self-harm", "self_harm"),
            (
                self.self_harm_instructions,
                "self-harm/instructions",
                "self_harm_instructions",
            ),
            (self.self_harm_intent, "self-harm/intent", "self_harm_intent"),
            (self.sexual, "sexual", "sexual"),
            (self.sexual_minors, "sexual/minors", "sexual_minors"),
            (self.violence, "violence", "violence"),
            (self.violence_graphic, "violence/graphic", "violence_graphic"),
        ]
        .into_iter()
        .filter(|(on, _, _)| *on)
        .map(|(_, key, name)| (key, name))
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModerationSettings {
    pub model: ModerationModel,
    pub categories: ModerationCategories,
}

impl EvaluatorSettings for ModerationSettings {}

/// Classifies input and output with the OpenAI moderation endpoint.
///
/// Score is the highest probability among the enabled categories; the entry
/// fails when any enabled category is flagged.
pub struct ModerationEvaluator {
    settings: ModerationSettings,
    env: EvaluatorEnv,
    client: Client,
    base_url: String,
}

impl ModerationEvaluator {
    /// Create an evaluator reading `OPENAI_API_KEY` from the process environment.
    pub fn new(settings: ModerationSettings) -> Result<Self, SettingsError> {
        Self::with_env(settings, EvaluatorEnv::from_process(DEFINITION.env_vars))
    }

    pub fn with_env(settings: ModerationSettings, env: EvaluatorEnv) -> Result<Self, SettingsError> {
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

    /// Set a custom base URL (for testing or proxied endpoints).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call_api(&self, content: &str) -> Result<ModerationResult, EvaluatorError> {
        let api_key = self.env.require(OPENAI_API_KEY)?;
        let request = ModerationRequest {
            input: content,
            model: self.settings.model.as_str(),
        };

        let response = self
            .client
            .post(format!("{}/v1/moderations", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;
        let response = check_response("OpenAI", response).await?;

        let body: ModerationResponse = response.json().await.map_err(decode_error)?;
        body.results
            .into_iter()
            .next()
            .ok_or_else(|| EvaluatorError::InvalidResponse("Empty moderation results".into()))
    }
}

#[async_trait]
impl Evaluator for ModerationEvaluator {
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
        let joined = format!(
            "{}\n\n{}",
            entry.input.as_deref().unwrap_or_default(),
            entry.output.as_deref().unwrap_or_default()
        );
        let content = truncate_chars(joined.trim(), MAX_CONTENT_CHARS);
        if content.is_empty() {
            return Ok(EvaluationResult::skipped("Input and output are both empty"));
        }

        let moderation = self.call_api(content).await?;
        Ok(moderation.to_result(&self.settings.categories))
    }
}

#[derive(Serialize)]
struct ModerationRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    #[serde(default)]
    categories: HashMap<String, bool>,
    #[serde(default)]
    category_scores: HashMap<String, f64>,
}

impl ModerationResult {
    fn to_result(&self, enabled: &ModerationCategories) -> EvaluationResult {
        let enabled = enabled.enabled();
        let detected: Vec<&str> = enabled
            .iter()
            .filter(|(key, _)| self.categories.get(*key).copied().unwrap_or(false))
            .map(|(_, name)| *name)
            .collect();
        let highest = enabled
            .iter()
            .filter_map(|(key, _)| self.category_scores.get(*key).copied())
            .fold(0.0_f64, f64::max);

        let passed = detected.is_empty();
        let details = (!passed).then(|| format!("Detected {}", detected.join(", ")));
        EvaluationResult::processed()
            .with_score(highest)
            .with_passed(passed)
            .with_details(details)
    }
}
