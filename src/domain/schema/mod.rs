//! Slot schemas: the per-intent contract for what must be collected.
//!
//! A schema is build-time configuration. The registry is frozen at first
//! use and nothing at runtime can register or mutate a schema, which is
//! what lets every session share it without synchronization.

mod builtin;
mod registry;

pub use registry::{SchemaError, SchemaRegistry};

use crate::domain::intent::Intent;
use crate::domain::validation::SlotType;
use serde::{Deserialize, Serialize};

/// Default retry budget for a slot unless its schema says otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// A single slot's contract: type, requiredness, prompt, retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSpec {
    name: String,
    slot_type: SlotType,
    required: bool,
    prompt: String,
    max_retries: u32,
}

impl SlotSpec {
    /// Creates a required slot.
    pub fn required(name: impl Into<String>, slot_type: SlotType, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot_type,
            required: true,
            prompt: prompt.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Creates an optional slot.
    pub fn optional(name: impl Into<String>, slot_type: SlotType, prompt: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, slot_type, prompt)
        }
    }

    /// Overrides the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slot_type(&self) -> &SlotType {
        &self.slot_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// Ordered slot contract for one workflow intent.
///
/// The declared order of required slots doubles as the selector's default
/// asking priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSchema {
    intent: Intent,
    slots: Vec<SlotSpec>,
}

impl SlotSchema {
    /// Builds a schema, enforcing the registry guarantees: a workflow
    /// intent, unique slot names, and a non-empty prompt on every slot.
    pub fn new(intent: Intent, slots: Vec<SlotSpec>) -> Result<Self, SchemaError> {
        if !intent.is_workflow() {
            return Err(SchemaError::ReservedIntent(intent));
        }
        for (i, spec) in slots.iter().enumerate() {
            if spec.prompt.trim().is_empty() {
                return Err(SchemaError::EmptyPrompt {
                    intent,
                    slot: spec.name.clone(),
                });
            }
            if slots[..i].iter().any(|other| other.name == spec.name) {
                return Err(SchemaError::DuplicateSlot {
                    intent,
                    slot: spec.name.clone(),
                });
            }
        }
        Ok(Self { intent, slots })
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    /// All slots in declared order.
    pub fn slots(&self) -> &[SlotSpec] {
        &self.slots
    }

    /// Required slots in declared order.
    pub fn required_slots(&self) -> impl Iterator<Item = &SlotSpec> {
        self.slots.iter().filter(|s| s.required)
    }

    /// Looks up a slot by name.
    pub fn spec(&self, name: &str) -> Option<&SlotSpec> {
        self.slots.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date_slot(name: &str) -> SlotSpec {
        SlotSpec::required(name, SlotType::Date, format!("What is the {}?", name))
    }

    #[test]
    fn schema_preserves_declared_order() {
        let schema = SlotSchema::new(
            Intent::RequestTimeOff,
            vec![date_slot("start_date"), date_slot("end_date")],
        )
        .unwrap();

        let names: Vec<&str> = schema.required_slots().map(|s| s.name()).collect();
        assert_eq!(names, vec!["start_date", "end_date"]);
    }

    #[test]
    fn schema_rejects_reserved_intent() {
        let err = SlotSchema::new(Intent::Unknown, vec![date_slot("d")]).unwrap_err();
        assert!(matches!(err, SchemaError::ReservedIntent(Intent::Unknown)));
    }

    #[test]
    fn schema_rejects_empty_prompt() {
        let bad = SlotSpec::required("start_date", SlotType::Date, "  ");
        let err = SlotSchema::new(Intent::RequestTimeOff, vec![bad]).unwrap_err();
        assert!(matches!(err, SchemaError::EmptyPrompt { .. }));
    }

    #[test]
    fn schema_rejects_duplicate_slot_names() {
        let err = SlotSchema::new(
            Intent::RequestTimeOff,
            vec![date_slot("start_date"), date_slot("start_date")],
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateSlot { .. }));
    }

    #[test]
    fn optional_slots_are_excluded_from_required_order() {
        let schema = SlotSchema::new(
            Intent::RequestTimeOff,
            vec![
                date_slot("start_date"),
                SlotSpec::optional("notes", SlotType::Text { min_len: 0, max_len: 500 }, "Any notes?"),
            ],
        )
        .unwrap();

        assert_eq!(schema.required_slots().count(), 1);
        assert!(schema.spec("notes").is_some());
        assert!(!schema.spec("notes").unwrap().is_required());
    }

    #[test]
    fn max_retries_defaults_and_overrides() {
        assert_eq!(date_slot("d").max_retries(), DEFAULT_MAX_RETRIES);
        assert_eq!(date_slot("d").with_max_retries(5).max_retries(), 5);
    }
}
