use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use gauge_core::entry::Entry;
use gauge_core::env::EvaluatorEnv;
use gauge_core::error::{EvaluatorError, SettingsError};
use gauge_core::evaluator::{Category, Evaluator, EvaluatorDefinition};
use gauge_core::result::EvaluationResult;

use crate::http::{check_response, decode_error, request_error};
use crate::settings::{EvaluatorSettings, parse_settings, settings_to_json};

const ENDPOINT_VAR: &str = "AZURE_CONTENT_SAFETY_ENDPOINT";
const KEY_VAR: &str = "AZURE_CONTENT_SAFETY_KEY";
const API_VERSION: &str = "2023-10-15-preview";

pub static DEFINITION: EvaluatorDefinition = EvaluatorDefinition {
    id: "azure/jailbreak",
    name: "Azure Jailbreak Detection",
    description: "Detects jailbreak attempts in the input with Azure AI Content Safety",
    category: Category::Safety,
    env_vars: &[ENDPOINT_VAR, KEY_VAR],
    required_fields: &["input"],
    is_guardrail: true,
    docs_url: Some(
        "https://learn.microsoft.com/en-us/azure/ai-services/content-safety/concepts/jailbreak-detection",
    ),
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JailbreakSettings {}

impl EvaluatorSettings for JailbreakSettings {}

pub struct JailbreakEvaluator {
    settings: JailbreakSettings,
    env: EvaluatorEnv,
    client: Client,
}

impl JailbreakEvaluator {
    pub fn new() -> Self {
        Self::with_env(EvaluatorEnv::from_process(DEFINITION.env_vars))
    }

    pub fn with_env(env: EvaluatorEnv) -> Self {
        Self {
            settings: JailbreakSettings::default(),
            env,
            client: Client::new(),
        }
    }

    pub fn from_json(settings: &Value, env: EvaluatorEnv) -> Result<Self, SettingsError> {
        let settings: JailbreakSettings = parse_settings(settings)?;
        Ok(Self {
            settings,
            ..Self::with_env(env)
        })
    }

    async fn detect(&self, text: &str) -> Result<bool, EvaluatorError> {
        let endpoint = self.env.require(ENDPOINT_VAR)?.trim_end_matches('/');
        let key = self.env.require(KEY_VAR)?;

        let response = self
            .client
            .post(format!("{endpoint}/contentsafety/text:detectJailbreak"))
            .query(&[("api-version", API_VERSION)])
            .header("Ocp-Apim-Subscription-Key", key)
            .json(&DetectRequest { text })
            .send()
            .await
            .map_err(request_error)?;
        let response = check_response("Azure Content Safety", response).await?;

        let body: DetectResponse = response.json().await.map_err(decode_error)?;
        Ok(body.jailbreak_analysis.detected)
    }
}

impl Default for JailbreakEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Evaluator for JailbreakEvaluator {
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
        let input = entry.input.as_deref().unwrap_or_default();
        if input.is_empty() {
            return Ok(EvaluationResult::skipped("Input is empty"));
        }

        let detected = self.detect(input).await?;
        let result = EvaluationResult::processed()
            .with_score(if detected { 1.0 } else { 0.0 })
            .with_passed(!detected)
            .with_details(detected.then(|| "Jailbreak content detected".to_string()));
        Ok(result)
    }
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectResponse {
    jailbreak_analysis: JailbreakAnalysis,
}

#[derive(Deserialize)]
struct JailbreakAnalysis {
    detected: bool,
}
