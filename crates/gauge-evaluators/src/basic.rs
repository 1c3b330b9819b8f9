use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use gauge_core::entry::Entry;
use gauge_core::env::EvaluatorEnv;
use gauge_core::error::{EvaluatorError, SettingsError};
use gauge_core::evaluator::{Category, Evaluator, EvaluatorDefinition};
use gauge_core::result::EvaluationResult;

use crate::settings::{EvaluatorSettings, parse_settings, settings_to_json};

pub static DEFINITION: EvaluatorDefinition = EvaluatorDefinition {
    id: "custom/basic",
    name: "Custom Basic Evaluator",
    description: "Checks the input or output against simple contains / regex rules",
    category: Category::Custom,
    env_vars: &[],
    required_fields: &[],
    is_guardrail: true,
    docs_url: None,
};

/// Entry field a rule or check applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    Input,
    #[default]
    Output,
}

impl TextField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }

    pub fn read<'a>(&self, entry: &'a Entry) -> &'a str {
        let text = match self {
            Self::Input => entry.input.as_deref(),
            Self::Output => entry.output.as_deref(),
        };
        text.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Contains,
    NotContains,
    MatchesRegex,
    NotMatchesRegex,
}

impl RuleKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::NotContains => "does not contain",
            Self::MatchesRegex => "matches regex",
            Self::NotMatchesRegex => "does not match regex",
        }
    }

    fn is_regex(&self) -> bool {
        matches!(self, Self::MatchesRegex | Self::NotMatchesRegex)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomBasicRule {
    pub field: TextField,
    pub rule: RuleKind,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CustomBasicSettings {
    pub rules: Vec<CustomBasicRule>,
}

impl EvaluatorSettings for CustomBasicSettings {
    fn validate(&self) -> Result<(), SettingsError> {
        for (i, rule) in self.rules.iter().enumerate() {
            if rule.rule.is_regex() {
                Regex::new(&rule.value).map_err(|e| {
                    SettingsError::invalid(format!("rules[{i}].value"), e.to_string())
                })?;
            }
        }
        Ok(())
    }
}

/// Passes when every configured rule holds. `contains` rules ignore case.
pub struct CustomBasicEvaluator {
    settings: CustomBasicSettings,
    compiled: Vec<Option<Regex>>,
    env: EvaluatorEnv,
}

impl CustomBasicEvaluator {
    pub fn new(settings: CustomBasicSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        let compiled = settings
            .rules
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                if rule.rule.is_regex() {
                    Regex::new(&rule.value).map(Some).map_err(|e| {
                        SettingsError::invalid(format!("rules[{i}].value"), e.to_string())
                    })
                } else {
                    Ok(None)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            settings,
            compiled,
            env: EvaluatorEnv::empty(),
        })
    }

    pub fn from_json(settings: &Value) -> Result<Self, SettingsError> {
        Self::new(parse_settings(settings)?)
    }

    fn holds(&self, idx: usize, rule: &CustomBasicRule, entry: &Entry) -> bool {
        let text = rule.field.read(entry);
        match (rule.rule, &self.compiled[idx]) {
            (RuleKind::Contains, _) => text.to_lowercase().contains(&rule.value.to_lowercase()),
            (RuleKind::NotContains, _) => {
                !text.to_lowercase().contains(&rule.value.to_lowercase())
            }
            (RuleKind::MatchesRegex, Some(re)) => re.is_match(text),
            (RuleKind::NotMatchesRegex, Some(re)) => !re.is_match(text),
            // Regex rules always carry a compiled pattern.
            (_, None) => false,
        }
    }
}

#[async_trait]
impl Evaluator for CustomBasicEvaluator {
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
        let failed: Vec<String> = self
            .settings
            .rules
            .iter()
            .enumerate()
            .filter(|(i, rule)| !self.holds(*i, rule, entry))
            .map(|(_, rule)| {
                format!(
                    "- {} {} {:?}",
                    rule.field.as_str(),
                    rule.rule.as_str(),
                    rule.value
                )
            })
            .collect();

        let passed = failed.is_empty();
        let details = (!passed).then(|| format!("Failed rules:\n{}", failed.join("\n")));

        Ok(EvaluationResult::processed()
            .with_score(if passed { 1.0 } else { 0.0 })
            .with_passed(passed)
            .with_details(details))
    }
}
