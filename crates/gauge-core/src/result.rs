use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EvaluatorError;

/// Cost incurred while evaluating an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

impl Money {
    pub fn usd(amount: f64) -> Self {
        Self {
            amount,
            currency: "USD".into(),
        }
    }
}

/// Outcome of evaluating one entry with one evaluator.
///
/// Serialised with a `status` tag of `processed`, `skipped` or `error`.
/// `score` and `passed` only exist on `Processed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EvaluationResult {
    Processed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        score: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        passed: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cost: Option<Money>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_result: Option<Value>,
    },
    Skipped {
        reason: String,
    },
    Error {
        error_type: String,
        message: String,
    },
}

/// Ordered per-entry results of one evaluator; index `i` always belongs to entry `i`.
pub type BatchEvaluationResult = Vec<EvaluationResult>;

impl EvaluationResult {
    pub fn processed() -> Self {
        Self::Processed {
            score: None,
            passed: None,
            details: None,
            cost: None,
            raw_result: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn error(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Set the score on a processed result; no-op otherwise.
    pub fn with_score(mut self, value: f64) -> Self {
        if let Self::Processed { score, .. } = &mut self {
            *score = Some(value);
        }
        self
    }

    /// Set the pass/fail verdict on a processed result; no-op otherwise.
    pub fn with_passed(mut self, value: bool) -> Self {
        if let Self::Processed { passed, .. } = &mut self {
            *passed = Some(value);
        }
        self
    }

    /// Set (or clear) the details of a processed result; no-op otherwise.
    pub fn with_details(mut self, value: Option<String>) -> Self {
        if let Self::Processed { details, .. } = &mut self {
            *details = value;
        }
        self
    }

    pub fn with_cost(mut self, value: Money) -> Self {
        if let Self::Processed { cost, .. } = &mut self {
            *cost = Some(value);
        }
        self
    }

    pub fn with_raw_result(mut self, value: Value) -> Self {
        if let Self::Processed { raw_result, .. } = &mut self {
            *raw_result = Some(value);
        }
        self
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Processed { .. } => "processed",
            Self::Skipped { .. } => "skipped",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed { .. })
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Processed { score, .. } => *score,
            _ => None,
        }
    }

    pub fn passed(&self) -> Option<bool> {
        match self {
            Self::Processed { passed, .. } => *passed,
            _ => None,
        }
    }

    /// Human-readable text for this result: processed details, the skip
    /// reason, or the error message.
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::Processed { details, .. } => details.as_deref(),
            Self::Skipped { reason } => Some(reason),
            Self::Error { message, .. } => Some(message),
        }
    }
}

impl From<EvaluatorError> for EvaluationResult {
    fn from(err: EvaluatorError) -> Self {
        Self::error(err.kind(), err.to_string())
    }
}
