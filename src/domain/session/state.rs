//! Conversation state: everything a session knows between turns.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{SessionId, StateMachine, Timestamp, TransitionError};
use crate::domain::intent::Intent;
use crate::domain::schema::SlotSchema;
use crate::domain::validation::NormalizedValue;

use super::phase::DialoguePhase;

/// Trust status of a collected slot value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Candidate present but not yet trusted (awaiting confirmation).
    Pending,
    /// Passed its validator; safe to dispatch.
    Valid,
    /// Last candidate was rejected by the validator.
    Invalid,
}

/// A collected value for one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotValue {
    /// The raw text the value came from.
    pub raw: String,
    /// Normalized form, present once the gate produced a candidate.
    pub normalized: Option<NormalizedValue>,
    pub status: SlotStatus,
    /// Turn on which this value was produced.
    pub source_turn: u32,
}

/// Why a session was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    /// A slot exhausted its retry budget without becoming valid.
    SlotUnresolvable,
    /// No turn arrived within the idle window.
    IdleTimeout,
    /// The user explicitly cancelled.
    UserCancelled,
}

/// Terminal annotation recorded when a session closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed { reference_id: Option<String> },
    Abandoned { reason: AbandonReason },
    Failed { reference_id: String, error: String },
}

/// One processed turn, kept for audit and correction handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn: u32,
    pub raw_text: String,
    /// Intent the classifier reported on this turn, if it ran.
    pub detected_intent: Option<Intent>,
    /// Raw candidates the extractor produced on this turn.
    pub extracted: BTreeMap<String, String>,
    /// Phase the session ended the turn in.
    pub resulting_phase: DialoguePhase,
    pub recorded_at: Timestamp,
}

/// Complete per-session dialogue state.
///
/// Owned by exactly one in-flight turn at a time; the application layer
/// serializes access per session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub session_id: SessionId,
    /// Locked workflow intent. At most one per session, immutable once set.
    pub intent: Option<Intent>,
    /// Collected values, only for slots of the locked intent.
    pub slots: HashMap<String, SlotValue>,
    pub last_asked_slot: Option<String>,
    /// Times each slot has been asked about.
    pub retry_counts: HashMap<String, u32>,
    pub phase: DialoguePhase,
    pub turn_count: u32,
    /// Append-only turn log. Never rewritten.
    pub history: Vec<TurnRecord>,
    /// Slot awaiting a yes/no reply while phase is `Confirming`.
    pub pending_confirmation: Option<String>,
    /// Automatic dispatch retries consumed so far.
    pub dispatch_attempts: u32,
    /// Terminal annotation, set exactly once when the session closes.
    pub outcome: Option<SessionOutcome>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ConversationState {
    /// Creates a fresh session.
    pub fn new(session_id: SessionId) -> Self {
        let now = Timestamp::now();
        Self {
            session_id,
            intent: None,
            slots: HashMap::new(),
            last_asked_slot: None,
            retry_counts: HashMap::new(),
            phase: DialoguePhase::Init,
            turn_count: 0,
            history: Vec::new(),
            pending_confirmation: None,
            dispatch_attempts: 0,
            outcome: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves to a new phase, enforcing the transition table.
    pub fn transition_phase(&mut self, to: DialoguePhase) -> Result<(), TransitionError> {
        self.phase = self.phase.transition_to(to)?;
        self.touch();
        Ok(())
    }

    /// Locks the workflow intent. Only valid once.
    pub fn lock_intent(&mut self, intent: Intent) {
        debug_assert!(self.intent.is_none(), "intent is immutable once locked");
        self.intent = Some(intent);
        self.touch();
    }

    /// Writes a slot value, replacing any prior value for that slot.
    pub fn write_slot(&mut self, name: impl Into<String>, value: SlotValue) {
        self.slots.insert(name.into(), value);
        self.touch();
    }

    /// Looks up a collected slot value.
    pub fn slot(&self, name: &str) -> Option<&SlotValue> {
        self.slots.get(name)
    }

    /// True when a slot has been validated.
    pub fn slot_is_valid(&self, name: &str) -> bool {
        matches!(self.slot(name), Some(v) if v.status == SlotStatus::Valid)
    }

    /// How many times a slot has been asked about.
    pub fn retry_count(&self, name: &str) -> u32 {
        self.retry_counts.get(name).copied().unwrap_or(0)
    }

    /// Records that a slot is being asked about (again).
    pub fn note_asked(&mut self, name: &str) {
        *self.retry_counts.entry(name.to_string()).or_insert(0) += 1;
        self.last_asked_slot = Some(name.to_string());
        self.touch();
    }

    /// True when every required slot of `schema` is valid.
    pub fn required_slots_valid(&self, schema: &SlotSchema) -> bool {
        schema.required_slots().all(|s| self.slot_is_valid(s.name()))
    }

    /// Appends a turn to the history log.
    pub fn record_turn(&mut self, record: TurnRecord) {
        self.history.push(record);
        self.touch();
    }

    /// True when no turn has touched the session within `window_secs`.
    pub fn idle_longer_than(&self, window_secs: u64, now: Timestamp) -> bool {
        now.is_after(&self.updated_at.plus_secs(window_secs))
    }

    /// Builds the dispatch payload from validated slots.
    ///
    /// Callers must have checked `required_slots_valid` first; optional
    /// slots are included only when valid. Keys sort by name, so equal
    /// states always serialize identically.
    pub fn validated_payload(&self, schema: &SlotSchema) -> BTreeMap<String, NormalizedValue> {
        schema
            .slots()
            .iter()
            .filter_map(|spec| {
                let value = self.slot(spec.name())?;
                if value.status != SlotStatus::Valid {
                    return None;
                }
                let normalized = value.normalized.clone()?;
                Some((spec.name().to_string(), normalized))
            })
            .collect()
    }

    fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }
}
