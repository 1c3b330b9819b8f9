use thiserror::Error;

use crate::result::BatchEvaluationResult;

/// Top-level error type for the Gauge library.
#[derive(Debug, Error)]
pub enum GaugeError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    #[error("Orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),

    #[error("Unknown evaluator: '{id}'")]
    UnknownEvaluator { id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Invalid evaluator settings. Raised at construction, never during evaluation.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Malformed settings: {0}")]
    Malformed(String),
}

impl SettingsError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Failure while evaluating a single entry.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("API request failed: {0}")]
    ApiRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error(
        "Rate limited{}",
        .retry_after_secs.map(|secs| format!(": retry after {secs}s")).unwrap_or_default()
    )]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing environment variables: {}", keys.join(", "))]
    MissingEnv { keys: Vec<String> },
}

impl EvaluatorError {
    /// Short machine-readable tag stored in `EvaluationResult::Error::error_type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiRequest(_) => "ApiRequest",
            Self::InvalidResponse(_) => "InvalidResponse",
            Self::Auth(_) => "Auth",
            Self::RateLimited { .. } => "RateLimited",
            Self::InvalidInput(_) => "InvalidInput",
            Self::MissingEnv { .. } => "MissingEnv",
        }
    }
}

/// Results gathered before an orchestration stopped, indexed by evaluator.
#[derive(Debug, Clone, Default)]
pub struct PartialResults {
    pub results: Vec<Option<BatchEvaluationResult>>,
}

impl PartialResults {
    pub fn completed(&self) -> usize {
        self.results.iter().filter(|r| r.is_some()).count()
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Evaluation interrupted ({} of {} evaluators completed)", partial.completed(), partial.total())]
    Interrupted { partial: PartialResults },
}

pub type Result<T> = std::result::Result<T, GaugeError>;
