use std::collections::HashMap;

use crate::error::EvaluatorError;

/// Credentials and environment values an evaluator needs, resolved when the
/// evaluator is constructed and checked when it runs.
#[derive(Debug, Clone, Default)]
pub struct EvaluatorEnv {
    values: HashMap<String, String>,
    missing: Vec<String>,
}

impl EvaluatorEnv {
    /// An environment with no requirements.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve `keys` from the process environment. Unset or empty variables
    /// are recorded as missing rather than failing here.
    pub fn from_process(keys: &[&str]) -> Self {
        Self::resolve(keys, |key| std::env::var(key).ok())
    }

    /// Resolve `keys` from an explicit map, falling back to the process environment.
    pub fn from_map(keys: &[&str], overrides: &HashMap<String, String>) -> Self {
        Self::resolve(keys, |key| {
            overrides
                .get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
        })
    }

    fn resolve(keys: &[&str], lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut values = HashMap::new();
        let mut missing = Vec::new();
        for key in keys {
            match lookup(key) {
                Some(value) if !value.is_empty() => {
                    values.insert(key.to_string(), value);
                }
                _ => missing.push(key.to_string()),
            }
        }
        Self { values, missing }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Fetch a required value, failing the same way for every entry when absent.
    pub fn require(&self, key: &str) -> Result<&str, EvaluatorError> {
        self.get(key).ok_or_else(|| EvaluatorError::MissingEnv {
            keys: vec![key.to_string()],
        })
    }

    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    /// Fails when any declared variable could not be resolved.
    pub fn check(&self) -> Result<(), EvaluatorError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(EvaluatorError::MissingEnv {
                keys: self.missing.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_env_passes_check() {
        assert!(EvaluatorEnv::empty().check().is_ok());
    }

    #[test]
    fn from_map_resolves_overrides() {
        let overrides = HashMap::from([("GAUGE_TEST_KEY_A".to_string(), "secret".to_string())]);
        let env = EvaluatorEnv::from_map(&["GAUGE_TEST_KEY_A"], &overrides);
        assert!(env.check().is_ok());
        assert_eq!(env.get("GAUGE_TEST_KEY_A"), Some("secret"));
        assert_eq!(env.require("GAUGE_TEST_KEY_A").unwrap(), "secret");
    }

    #[test]
    fn missing_keys_are_reported_together() {
        let overrides = HashMap::from([("GAUGE_TEST_KEY_B".to_string(), String::new())]);
        let env = EvaluatorEnv::from_map(
            &["GAUGE_TEST_KEY_B", "GAUGE_TEST_KEY_THAT_IS_NEVER_SET"],
            &overrides,
        );
        assert_eq!(env.missing().len(), 2);
        let err = env.check().unwrap_err();
        assert!(matches!(err, EvaluatorError::MissingEnv { ref keys } if keys.len() == 2));
    }

    #[test]
    fn require_unknown_key_errors() {
        let env = EvaluatorEnv::empty();
        assert!(env.require("ANYTHING").is_err());
    }
}
