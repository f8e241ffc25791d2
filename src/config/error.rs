//! Configuration error types.

use thiserror::Error;

/// Failure to load configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Semantic problem with a loaded configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("configuration field '{field}' is invalid: {reason}")]
pub struct ConfigValidationError {
    pub field: String,
    pub reason: String,
}

impl ConfigValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_displays_field_and_reason() {
        let err = ConfigValidationError::new("dialogue.idle_timeout_secs", "must be positive");
        assert_eq!(
            err.to_string(),
            "configuration field 'dialogue.idle_timeout_secs' is invalid: must be positive"
        );
    }
}
