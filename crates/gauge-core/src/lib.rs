pub mod entry;
pub mod env;
pub mod error;
pub mod evaluator;
pub mod result;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::entry::Entry;
    pub use crate::env::EvaluatorEnv;
    pub use crate::error::{
        EvaluatorError, GaugeError, OrchestrationError, PartialResults, Result, SettingsError,
    };
    pub use crate::evaluator::{Category, Evaluator, EvaluatorDefinition, run_batch};
    pub use crate::result::{BatchEvaluationResult, EvaluationResult, Money};
    pub use tokio_util::sync::CancellationToken;
}
