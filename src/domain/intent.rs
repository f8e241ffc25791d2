//! Workflow intents.
//!
//! The closed allow-list of workflows the concierge can complete, plus the
//! reserved values classifiers fall back to. Locked into a session on the
//! first classified turn and immutable afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A workflow the user wants to complete, from a closed set.
///
/// `Unknown` and `GeneralChat` are reserved values: they never lock into a
/// session and never reach the action dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    RequestTimeOff,
    ScheduleMeeting,
    SubmitItTicket,
    FileMedicalClaim,
    Unknown,
    GeneralChat,
}

impl Intent {
    /// All intents that drive a slot-filling workflow.
    pub const WORKFLOWS: [Intent; 4] = [
        Intent::RequestTimeOff,
        Intent::ScheduleMeeting,
        Intent::SubmitItTicket,
        Intent::FileMedicalClaim,
    ];

    /// Returns true for intents that drive a slot-filling workflow.
    ///
    /// Reserved values (`Unknown`, `GeneralChat`) return false.
    pub fn is_workflow(&self) -> bool {
        Self::WORKFLOWS.contains(self)
    }

    /// The wire identifier used by classifiers and audit records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::RequestTimeOff => "request_time_off",
            Intent::ScheduleMeeting => "schedule_meeting",
            Intent::SubmitItTicket => "submit_it_ticket",
            Intent::FileMedicalClaim => "file_medical_claim",
            Intent::Unknown => "unknown",
            Intent::GeneralChat => "general_chat",
        }
    }

    /// Short human label for prompts and hand-off messages.
    pub fn label(&self) -> &'static str {
        match self {
            Intent::RequestTimeOff => "time off request",
            Intent::ScheduleMeeting => "meeting",
            Intent::SubmitItTicket => "IT ticket",
            Intent::FileMedicalClaim => "medical claim",
            Intent::Unknown => "request",
            Intent::GeneralChat => "conversation",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Intent {
    type Err = std::convert::Infallible;

    /// Parses a classifier-produced identifier.
    ///
    /// Fails open: anything outside the allow-list becomes `Unknown`, so a
    /// misbehaving classifier can never inject an unregistered workflow.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "request_time_off" => Intent::RequestTimeOff,
            "schedule_meeting" => Intent::ScheduleMeeting,
            "submit_it_ticket" => Intent::SubmitItTicket,
            "file_medical_claim" => Intent::FileMedicalClaim,
            "general_chat" => Intent::GeneralChat,
            _ => Intent::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_intents_are_flagged() {
        for intent in Intent::WORKFLOWS {
            assert!(intent.is_workflow());
        }
        assert!(!Intent::Unknown.is_workflow());
        assert!(!Intent::GeneralChat.is_workflow());
    }

    #[test]
    fn serializes_to_snake_case() {
        let json = serde_json::to_string(&Intent::RequestTimeOff).unwrap();
        assert_eq!(json, "\"request_time_off\"");
    }

    #[test]
    fn deserializes_from_snake_case() {
        let intent: Intent = serde_json::from_str("\"submit_it_ticket\"").unwrap();
        assert_eq!(intent, Intent::SubmitItTicket);
    }

    #[test]
    fn from_str_parses_allow_listed_values() {
        assert_eq!("schedule_meeting".parse::<Intent>().unwrap(), Intent::ScheduleMeeting);
        assert_eq!("general_chat".parse::<Intent>().unwrap(), Intent::GeneralChat);
    }

    #[test]
    fn from_str_fails_open_to_unknown() {
        assert_eq!("launch_rocket".parse::<Intent>().unwrap(), Intent::Unknown);
        assert_eq!("".parse::<Intent>().unwrap(), Intent::Unknown);
        assert_eq!("REQUEST_TIME_OFF".parse::<Intent>().unwrap(), Intent::Unknown);
    }

    #[test]
    fn display_matches_wire_identifier() {
        assert_eq!(Intent::FileMedicalClaim.to_string(), "file_medical_claim");
    }

    #[test]
    fn all_intents_have_labels() {
        for intent in [
            Intent::RequestTimeOff,
            Intent::ScheduleMeeting,
            Intent::SubmitItTicket,
            Intent::FileMedicalClaim,
            Intent::Unknown,
            Intent::GeneralChat,
        ] {
            assert!(!intent.label().is_empty());
        }
    }
}
