pub mod config;
pub mod dataset;
pub mod error;
pub mod orchestrator;
pub mod result_set;
pub mod table;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{EvaluationConfig, EvaluatorSpec};
    pub use crate::dataset::Dataset;
    pub use crate::error::ConfigError;
    pub use crate::orchestrator::{Orchestrator, evaluate};
    pub use crate::result_set::ResultSet;
    pub use crate::table::Table;
}
