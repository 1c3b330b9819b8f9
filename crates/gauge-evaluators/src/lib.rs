pub mod basic;
pub mod blocklist;
mod http;
pub mod jailbreak;
pub mod moderation;
pub mod registry;
pub mod settings;
pub mod similarity;
pub mod word_count;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::basic::{CustomBasicEvaluator, CustomBasicRule, CustomBasicSettings, RuleKind, TextField};
    pub use crate::blocklist::{BlocklistEvaluator, BlocklistSettings};
    pub use crate::jailbreak::JailbreakEvaluator;
    pub use crate::moderation::{ModerationCategories, ModerationEvaluator, ModerationModel, ModerationSettings};
    pub use crate::registry::{EvaluatorFactory, EvaluatorRegistry};
    pub use crate::settings::{EvaluatorSettings, parse_settings};
    pub use crate::similarity::{SimilarityEvaluator, SimilarityRule, SimilaritySettings};
    pub use crate::word_count::WordCountEvaluator;
}
