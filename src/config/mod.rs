//! Application configuration module
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Values are read with the
//! `DESK_CONCIERGE` prefix and nested sections use double underscores:
//!
//! - `DESK_CONCIERGE__DIALOGUE__IDLE_TIMEOUT_SECS=900`
//! - `DESK_CONCIERGE__AUDIT__BUFFER_CAPACITY=512`

mod audit;
mod dialogue;
mod error;

pub use audit::AuditConfig;
pub use dialogue::DialogueConfig;
pub use error::{ConfigError, ConfigValidationError};

use serde::Deserialize;

/// Root application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Turn processing and session lifecycle tunables.
    #[serde(default)]
    pub dialogue: DialogueConfig,

    /// Audit buffer tunables.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl AppConfig {
    /// Loads configuration from the environment.
    ///
    /// Reads a `.env` file first when present (development), then
    /// environment variables with the `DESK_CONCIERGE` prefix. Every
    /// field has a default, so an empty environment is valid.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("DESK_CONCIERGE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validates all configuration sections.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.dialogue.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global; serialize these tests.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var("DESK_CONCIERGE__DIALOGUE__MAX_DISPATCH_RETRIES");
        env::remove_var("DESK_CONCIERGE__DIALOGUE__IDLE_TIMEOUT_SECS");
        env::remove_var("DESK_CONCIERGE__AUDIT__BUFFER_CAPACITY");
    }

    #[test]
    fn loads_defaults_from_empty_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let config = AppConfig::load().unwrap();
        assert_eq!(config.dialogue.max_dispatch_retries, 2);
        assert_eq!(config.dialogue.idle_timeout_secs, 1800);
        assert_eq!(config.audit.buffer_capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn environment_overrides_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("DESK_CONCIERGE__DIALOGUE__IDLE_TIMEOUT_SECS", "900");
        env::set_var("DESK_CONCIERGE__AUDIT__BUFFER_CAPACITY", "512");

        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.dialogue.idle_timeout_secs, 900);
        assert_eq!(config.audit.buffer_capacity, 512);
    }

    #[test]
    fn validate_surfaces_section_errors() {
        let mut config = AppConfig::default();
        config.dialogue.idle_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
