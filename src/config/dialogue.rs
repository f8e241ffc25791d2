//! Dialogue engine configuration.

use serde::Deserialize;

use super::error::ConfigValidationError;

fn default_max_dispatch_retries() -> u32 {
    2
}

fn default_idle_timeout_secs() -> u64 {
    1800
}

/// Tunables for turn processing and session lifecycle.
#[derive(Debug, Clone, Deserialize)]
pub struct DialogueConfig {
    /// Automatic dispatch retries beyond the first attempt.
    #[serde(default = "default_max_dispatch_retries")]
    pub max_dispatch_retries: u32,

    /// Idle window after which the sweeper abandons a session.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl DialogueConfig {
    /// Validates semantic constraints.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.idle_timeout_secs == 0 {
            return Err(ConfigValidationError::new(
                "dialogue.idle_timeout_secs",
                "must be positive",
            ));
        }
        if self.max_dispatch_retries > 10 {
            return Err(ConfigValidationError::new(
                "dialogue.max_dispatch_retries",
                "more than 10 automatic retries is almost certainly a mistake",
            ));
        }
        Ok(())
    }
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            max_dispatch_retries: default_max_dispatch_retries(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}
