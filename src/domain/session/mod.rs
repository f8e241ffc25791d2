//! Session state: phases, slot values, history, and audit events.

mod events;
mod phase;
mod state;

pub use events::{AuditDetail, AuditRecord};
pub use phase::DialoguePhase;
pub use state::{
    AbandonReason, ConversationState, SessionOutcome, SlotStatus, SlotValue, TurnRecord,
};
