//! Audit sink configuration.

use serde::Deserialize;

use super::error::ConfigValidationError;

fn default_buffer_capacity() -> usize {
    256
}

/// Tunables for the audit buffer.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Records retained in the in-memory ring.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

impl AuditConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.buffer_capacity == 0 {
            return Err(ConfigValidationError::new(
                "audit.buffer_capacity",
                "must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AuditConfig::default();
        assert_eq!(config.buffer_capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = AuditConfig { buffer_capacity: 0 };
        assert!(config.validate().is_err());
    }
}
