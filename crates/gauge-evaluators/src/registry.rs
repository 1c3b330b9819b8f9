use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;

use gauge_core::env::EvaluatorEnv;
use gauge_core::error::{GaugeError, SettingsError};
use gauge_core::evaluator::{Evaluator, EvaluatorDefinition};

use crate::settings::{EvaluatorSettings, settings_to_json};
use crate::{basic, blocklist, jailbreak, moderation, similarity, word_count};

/// Factory signature: (settings, resolved env) -> evaluator.
pub type EvaluatorFactory =
    Arc<dyn Fn(&Value, EvaluatorEnv) -> Result<Arc<dyn Evaluator>, SettingsError> + Send + Sync>;

struct Registration {
    definition: &'static EvaluatorDefinition,
    default_settings: Value,
    factory: EvaluatorFactory,
}

/// Static table mapping evaluator ids to their definition and constructor.
pub struct EvaluatorRegistry {
    evaluators: BTreeMap<&'static str, Registration>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self {
            evaluators: BTreeMap::new(),
        }
    }

    /// Registry pre-loaded with every built-in evaluator.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_typed::<blocklist::BlocklistSettings>(
            &blocklist::DEFINITION,
            factory(|settings: &Value, _env: EvaluatorEnv| {
                blocklist::BlocklistEvaluator::from_json(settings)
            }),
        );
        registry.register_typed::<basic::CustomBasicSettings>(
            &basic::DEFINITION,
            factory(|settings: &Value, _env: EvaluatorEnv| {
                basic::CustomBasicEvaluator::from_json(settings)
            }),
        );
        registry.register_typed::<word_count::WordCountSettings>(
            &word_count::DEFINITION,
            factory(|settings: &Value, _env: EvaluatorEnv| {
                word_count::WordCountEvaluator::from_json(settings)
            }),
        );
        registry.register_typed::<moderation::ModerationSettings>(
            &moderation::DEFINITION,
            factory(moderation::ModerationEvaluator::from_json),
        );
        registry.register_typed::<jailbreak::JailbreakSettings>(
            &jailbreak::DEFINITION,
            factory(jailbreak::JailbreakEvaluator::from_json),
        );
        registry.register_typed::<similarity::SimilaritySettings>(
            &similarity::DEFINITION,
            factory(similarity::SimilarityEvaluator::from_json),
        );
        registry
    }

    /// Register an evaluator. A later registration with the same id replaces the earlier one.
    pub fn register(
        &mut self,
        definition: &'static EvaluatorDefinition,
        default_settings: Value,
        factory: EvaluatorFactory,
    ) {
        self.evaluators.insert(
            definition.id,
            Registration {
                definition,
                default_settings,
                factory,
            },
        );
    }

    fn register_typed<S: EvaluatorSettings>(
        &mut self,
        definition: &'static EvaluatorDefinition,
        factory: EvaluatorFactory,
    ) {
        self.register(definition, settings_to_json(&S::default()), factory);
    }

    pub fn has_evaluator(&self, id: &str) -> bool {
        self.evaluators.contains_key(id)
    }

    pub fn definition(&self, id: &str) -> Option<&'static EvaluatorDefinition> {
        self.evaluators.get(id).map(|r| r.definition)
    }

    /// Definitions of all registered evaluators, ordered by id.
    pub fn definitions(&self) -> Vec<&'static EvaluatorDefinition> {
        self.evaluators.values().map(|r| r.definition).collect()
    }

    /// Settings an evaluator is created with when none are given.
    pub fn default_settings(&self, id: &str) -> Option<&Value> {
        self.evaluators.get(id).map(|r| &r.default_settings)
    }

    /// Create an evaluator, resolving its environment from the process.
    pub fn create(&self, id: &str, settings: &Value) -> Result<Arc<dyn Evaluator>, GaugeError> {
        self.create_with_env(id, settings, &HashMap::new())
    }

    /// Create an evaluator with explicit environment values, falling back to
    /// the process environment for anything not in `env`.
    pub fn create_with_env(
        &self,
        id: &str,
        settings: &Value,
        env: &HashMap<String, String>,
    ) -> Result<Arc<dyn Evaluator>, GaugeError> {
        let registration = self
            .evaluators
            .get(id)
            .ok_or_else(|| GaugeError::UnknownEvaluator { id: id.to_string() })?;
        let env = EvaluatorEnv::from_map(registration.definition.env_vars, env);
        let evaluator = (registration.factory)(settings, env)?;
        tracing::debug!(evaluator = id, "created evaluator");
        Ok(evaluator)
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap a concrete constructor as a type-erased factory.
fn factory<E, F>(build: F) -> EvaluatorFactory
where
    E: Evaluator,
    F: Fn(&Value, EvaluatorEnv) -> Result<E, SettingsError> + Send + Sync + 'static,
{
    Arc::new(
        move |settings: &Value, env: EvaluatorEnv| -> Result<Arc<dyn Evaluator>, SettingsError> {
            Ok(Arc::new(build(settings, env)?))
        },
    )
}
