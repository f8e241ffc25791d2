//! Dialogue control: state machine, slot selection, dispatch gating.

mod dispatch;
mod machine;
mod selector;

pub use dispatch::{DispatchFailure, DispatchOutcome, DispatchRequest};
pub use machine::{
    ConfirmationOutcome, DialogueMachine, DialoguePolicy, DispatchDecision, EngineReply,
    IntentDecision, MachineError, NextAction, ReplyKind, SlotCandidate,
};
pub use selector::select_next;
