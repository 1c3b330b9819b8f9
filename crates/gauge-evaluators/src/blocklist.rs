use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use gauge_core::entry::Entry;
use gauge_core::env::EvaluatorEnv;
use gauge_core::error::{EvaluatorError, SettingsError};
use gauge_core::evaluator::{Category, Evaluator, EvaluatorDefinition};
use gauge_core::result::EvaluationResult;

use crate::settings::{EvaluatorSettings, parse_settings, settings_to_json};

pub static DEFINITION: EvaluatorDefinition = EvaluatorDefinition {
    id: "langevals/competitor_blocklist",
    name: "Competitor Blocklist",
    description: "Checks whether any of the listed competitors is mentioned in the input or output",
    category: Category::Policy,
    env_vars: &[],
    required_fields: &[],
    is_guardrail: true,
    docs_url: None,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlocklistSettings {
    /// Names that must not be mentioned. Matching is literal and case-insensitive.
    pub competitors: Vec<String>,
}

impl Default for BlocklistSettings {
    fn default() -> Self {
        Self {
            competitors: vec!["OpenAI".into(), "Google".into(), "Microsoft".into()],
        }
    }
}

impl EvaluatorSettings for BlocklistSettings {
    fn validate(&self) -> Result<(), SettingsError> {
        if self.competitors.iter().any(|c| c.trim().is_empty()) {
            return Err(SettingsError::invalid(
                "competitors",
                "names must not be empty",
            ));
        }
        Ok(())
    }
}

/// Flags entries that mention a competitor.
///
/// Score is the number of mentions across input and output; the entry passes
/// when there are none.
pub struct BlocklistEvaluator {
    settings: BlocklistSettings,
    pattern: Option<Regex>,
    env: EvaluatorEnv,
}

impl BlocklistEvaluator {
    pub fn new(settings: BlocklistSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        let pattern = if settings.competitors.is_empty() {
            None
        } else {
            let alternation = settings
                .competitors
                .iter()
                .map(|c| regex::escape(c))
                .collect::<Vec<_>>()
                .join("|");
            let re = RegexBuilder::new(&alternation)
                .case_insensitive(true)
                .build()
                .map_err(|e| SettingsError::invalid("competitors", e.to_string()))?;
            Some(re)
        };
        Ok(Self {
            settings,
            pattern,
            env: EvaluatorEnv::empty(),
        })
    }

    pub fn from_json(settings: &Value) -> Result<Self, SettingsError> {
        Self::new(parse_settings(settings)?)
    }

    fn mentions<'a>(&self, text: Option<&'a str>) -> Vec<&'a str> {
        match (&self.pattern, text) {
            (Some(re), Some(text)) => re.find_iter(text).map(|m| m.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl Evaluator for BlocklistEvaluator {
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
        let mut mentioned = self.mentions(entry.input.as_deref());
        mentioned.extend(self.mentions(entry.output.as_deref()));

        let passed = mentioned.is_empty();
        let details = (!passed).then(|| format!("Competitors mentioned: {}", mentioned.join(", ")));

        Ok(EvaluationResult::processed()
            .with_score(mentioned.len() as f64)
            .with_passed(passed)
            .with_details(details))
    }
}
