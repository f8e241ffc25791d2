//! Audit events emitted by the dialogue machine.
//!
//! Every phase transition, slot write, and dispatcher interaction produces
//! a record. Records are handed to the audit sink fire-and-forget; they are
//! never load-bearing for dialogue behavior.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::foundation::{RequestId, SessionId, Timestamp};
use crate::domain::intent::Intent;

use super::phase::DialoguePhase;
use super::state::{SessionOutcome, SlotStatus};

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditDetail {
    IntentLocked {
        intent: Intent,
        confidence: f32,
    },
    PhaseChanged {
        from: DialoguePhase,
        to: DialoguePhase,
    },
    SlotWritten {
        slot: String,
        status: SlotStatus,
    },
    DispatchAttempted {
        request_id: RequestId,
        attempt: u32,
    },
    DispatchResolved {
        request_id: RequestId,
        success: bool,
        reference_id: Option<String>,
    },
    SessionClosed {
        outcome: SessionOutcome,
    },
}

impl AuditDetail {
    /// Event type string for routing and filtering.
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditDetail::IntentLocked { .. } => "dialogue.intent_locked",
            AuditDetail::PhaseChanged { .. } => "dialogue.phase_changed",
            AuditDetail::SlotWritten { .. } => "dialogue.slot_written",
            AuditDetail::DispatchAttempted { .. } => "dialogue.dispatch_attempted",
            AuditDetail::DispatchResolved { .. } => "dialogue.dispatch_resolved",
            AuditDetail::SessionClosed { .. } => "dialogue.session_closed",
        }
    }
}

/// An audit record: detail plus identity and correlation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique id for deduplication downstream.
    pub event_id: Uuid,
    pub session_id: SessionId,
    /// Turn during which the event occurred.
    pub turn: u32,
    pub occurred_at: Timestamp,
    pub detail: AuditDetail,
}

impl AuditRecord {
    /// Creates a record stamped with a fresh id and the current time.
    pub fn new(session_id: SessionId, turn: u32, detail: AuditDetail) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            session_id,
            turn,
            occurred_at: Timestamp::now(),
            detail,
        }
    }

    /// Event type string of the wrapped detail.
    pub fn event_type(&self) -> &'static str {
        self.detail.event_type()
    }
}
