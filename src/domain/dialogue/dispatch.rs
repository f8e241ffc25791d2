//! Dispatch request and outcome types.
//!
//! Built by the dialogue machine once a payload is complete; consumed by
//! the action dispatcher port. Defined in the domain so ports depend on
//! the domain and not the other way around.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::RequestId;
use crate::domain::intent::Intent;
use crate::domain::validation::NormalizedValue;

/// A finalized, fully validated workflow payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    /// Stable across automatic retries of the same dispatch, so the
    /// dispatcher can deduplicate.
    pub request_id: RequestId,
    pub intent: Intent,
    /// Validated slot values, keyed by slot name.
    pub payload: BTreeMap<String, NormalizedValue>,
}

impl DispatchRequest {
    /// Payload rendered as a JSON object for transport adapters.
    pub fn payload_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.payload
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

/// Dispatcher-reported failure, classified for retry handling.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DispatchFailure {
    /// Transient upstream trouble; the machine may retry automatically.
    #[error("recoverable dispatch failure: {0}")]
    Recoverable(String),
    /// Permanent rejection; retrying cannot help.
    #[error("non-recoverable dispatch failure: {0}")]
    NonRecoverable(String),
}

/// Result of one dispatcher execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub success: bool,
    /// Upstream reference for the created artifact, when available.
    pub reference_id: Option<String>,
    pub error: Option<DispatchFailure>,
}

impl DispatchOutcome {
    /// Successful dispatch with an upstream reference.
    pub fn ok(reference_id: impl Into<String>) -> Self {
        Self {
            success: true,
            reference_id: Some(reference_id.into()),
            error: None,
        }
    }

    /// Transient failure the machine may retry.
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self {
            success: false,
            reference_id: None,
            error: Some(DispatchFailure::Recoverable(message.into())),
        }
    }

    /// Permanent failure.
    pub fn non_recoverable(message: impl Into<String>) -> Self {
        Self {
            success: false,
            reference_id: None,
            error: Some(DispatchFailure::NonRecoverable(message.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::SessionId;

    #[test]
    fn payload_json_preserves_types() {
        let session = SessionId::new("s-1").unwrap();
        let request = DispatchRequest {
            request_id: RequestId::derive(&session, 2),
            intent: Intent::ScheduleMeeting,
            payload: BTreeMap::from([
                ("duration_minutes".to_string(), NormalizedValue::Integer(30)),
                ("title".to_string(), NormalizedValue::Text("standup".into())),
            ]),
        };

        let json = request.payload_json();
        assert_eq!(json["duration_minutes"], serde_json::json!(30));
        assert_eq!(json["title"], serde_json::json!("standup"));
    }

    #[test]
    fn outcome_constructors_classify_failures() {
        assert!(DispatchOutcome::ok("REF-1").success);
        let transient = DispatchOutcome::recoverable("network timeout");
        assert!(matches!(transient.error, Some(DispatchFailure::Recoverable(_))));
        let fatal = DispatchOutcome::non_recoverable("unknown destination");
        assert!(matches!(fatal.error, Some(DispatchFailure::NonRecoverable(_))));
    }
}
