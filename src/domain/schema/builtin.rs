//! Built-in workflow schemas.
//!
//! One schema per workflow intent. Declared required order is the order
//! the concierge will ask in.

use super::{SlotSchema, SlotSpec};
use crate::domain::intent::Intent;
use crate::domain::validation::SlotType;

pub(super) fn all() -> Vec<SlotSchema> {
    vec![
        request_time_off(),
        schedule_meeting(),
        submit_it_ticket(),
        file_medical_claim(),
    ]
}

fn choice(options: &[&str]) -> SlotType {
    SlotType::Choice {
        options: options.iter().map(|s| s.to_string()).collect(),
    }
}

fn request_time_off() -> SlotSchema {
    SlotSchema::new(
        Intent::RequestTimeOff,
        vec![
            SlotSpec::required(
                "start_date",
                SlotType::Date,
                "What is the exact start date?",
            ),
            SlotSpec::required("end_date", SlotType::Date, "What is the last day off?"),
            SlotSpec::required(
                "reason",
                choice(&["vacation", "sick", "personal", "bereavement"]),
                "What kind of leave is this (vacation, sick, personal, or bereavement)?",
            ),
            SlotSpec::optional(
                "notes",
                SlotType::Text { min_len: 0, max_len: 500 },
                "Anything your manager should know?",
            ),
        ],
    )
    .expect("request_time_off schema is well-formed")
}

fn schedule_meeting() -> SlotSchema {
    SlotSchema::new(
        Intent::ScheduleMeeting,
        vec![
            SlotSpec::required(
                "title",
                SlotType::Text { min_len: 1, max_len: 120 },
                "What should the meeting be called?",
            ),
            SlotSpec::required("date", SlotType::Date, "What date is the meeting?"),
            SlotSpec::required("time", SlotType::TimeOfDay, "What time should it start?"),
            SlotSpec::required(
                "duration_minutes",
                SlotType::Integer { min: 15, max: 480 },
                "How long should it run, in minutes?",
            ),
            SlotSpec::optional(
                "attendees",
                SlotType::Text { min_len: 0, max_len: 500 },
                "Who should be invited?",
            ),
        ],
    )
    .expect("schedule_meeting schema is well-formed")
}

fn submit_it_ticket() -> SlotSchema {
    SlotSchema::new(
        Intent::SubmitItTicket,
        vec![
            SlotSpec::required(
                "category",
                choice(&["hardware", "software", "access", "network"]),
                "Is this a hardware, software, access, or network issue?",
            ),
            SlotSpec::required(
                "summary",
                SlotType::Text { min_len: 5, max_len: 200 },
                "Briefly, what is going wrong?",
            ),
            SlotSpec::required(
                "urgency",
                choice(&["low", "medium", "high"]),
                "How urgent is this (low, medium, or high)?",
            ),
            SlotSpec::optional(
                "contact_phone",
                SlotType::Phone,
                "What number can IT reach you at?",
            ),
        ],
    )
    .expect("submit_it_ticket schema is well-formed")
}

fn file_medical_claim() -> SlotSchema {
    SlotSchema::new(
        Intent::FileMedicalClaim,
        vec![
            SlotSpec::required(
                "provider_name",
                SlotType::Text { min_len: 1, max_len: 120 },
                "Which provider or clinic is the claim for?",
            ),
            SlotSpec::required("service_date", SlotType::Date, "What date was the service?"),
            SlotSpec::required(
                "amount_cents",
                SlotType::Integer { min: 1, max: 5_000_000 },
                "What is the claim amount, in cents?",
            ),
            SlotSpec::optional(
                "claim_notes",
                SlotType::Text { min_len: 0, max_len: 500 },
                "Anything else the reviewer should know?",
            ),
        ],
    )
    .expect("file_medical_claim schema is well-formed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_off_asks_dates_before_reason() {
        let schema = request_time_off();
        let order: Vec<&str> = schema.required_slots().map(|s| s.name()).collect();
        assert_eq!(order, vec!["start_date", "end_date", "reason"]);
    }

    #[test]
    fn meeting_duration_is_bounded() {
        let schema = schedule_meeting();
        let spec = schema.spec("duration_minutes").unwrap();
        assert_eq!(spec.slot_type(), &SlotType::Integer { min: 15, max: 480 });
    }

    #[test]
    fn ticket_contact_phone_is_optional() {
        let schema = submit_it_ticket();
        assert!(!schema.spec("contact_phone").unwrap().is_required());
    }

    #[test]
    fn claim_amount_rejects_zero() {
        let schema = file_medical_claim();
        match schema.spec("amount_cents").unwrap().slot_type() {
            SlotType::Integer { min, .. } => assert_eq!(*min, 1),
            other => panic!("unexpected type {:?}", other),
        }
    }
}
