//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::validation::ValidationError;

/// Unique identifier for a dialogue session.
///
/// Session ids are supplied by the transport layer (channel id, call sid,
/// thread id) rather than generated here, so this wraps an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new SessionId, returning error if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::wrong_format("session_id", "cannot be empty"));
        }
        Ok(Self(id))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier attached to a dispatch call so retries are
/// idempotent-safe on the dispatcher side.
///
/// Derived from the session id and the turn on which the payload became
/// complete; automatic retries of the same dispatch reuse the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Derives the request id for a session's dispatch attempt.
    pub fn derive(session_id: &SessionId, turn_count: u32) -> Self {
        Self(format!("{}:{}", session_id, turn_count))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_accepts_non_empty_string() {
        let id = SessionId::new("slack-C123:U456").unwrap();
        assert_eq!(id.as_str(), "slack-C123:U456");
    }

    #[test]
    fn session_id_rejects_empty_string() {
        assert!(SessionId::new("").is_err());
        assert!(SessionId::new("   ").is_err());
    }

    #[test]
    fn session_id_serializes_transparently() {
        let id = SessionId::new("abc").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn request_id_is_stable_for_same_inputs() {
        let session = SessionId::new("s-1").unwrap();
        let a = RequestId::derive(&session, 4);
        let b = RequestId::derive(&session, 4);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "s-1:4");
    }

    #[test]
    fn request_id_differs_across_turns() {
        let session = SessionId::new("s-1").unwrap();
        assert_ne!(RequestId::derive(&session, 1), RequestId::derive(&session, 2));
    }
}
