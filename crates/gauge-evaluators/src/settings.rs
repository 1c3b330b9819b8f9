use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use gauge_core::error::SettingsError;

/// Typed, defaulted evaluator settings.
///
/// Settings are validated once, at construction; an invalid value fails the
/// construction instead of surfacing during evaluation.
pub trait EvaluatorSettings:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    fn validate(&self) -> Result<(), SettingsError> {
        Ok(())
    }
}

/// Deserialize and validate settings from JSON. `null` means all defaults;
/// missing keys take their default values.
pub fn parse_settings<S: EvaluatorSettings>(value: &Value) -> Result<S, SettingsError> {
    let settings: S = match value {
        Value::Null => S::default(),
        other => serde_json::from_value(other.clone())
            .map_err(|e| SettingsError::Malformed(e.to_string()))?,
    };
    settings.validate()?;
    Ok(settings)
}

/// Settings as JSON, for display and registry listings.
pub fn settings_to_json<S: EvaluatorSettings>(settings: &S) -> Value {
    serde_json::to_value(settings).unwrap_or(Value::Null)
}
