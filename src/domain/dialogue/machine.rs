//! The dialogue state machine.
//!
//! Owns one session's state for the duration of a turn and applies the
//! transition rules: intent lock-in, extraction merge, validation,
//! next-question selection, and the execute/complete gate. Pure domain
//! logic: classifier, extractor, and dispatcher results are passed in by
//! the application layer, never called from here.
//!
//! The single path to a side effect is `advance()` returning
//! [`NextAction::Dispatch`], which can only happen once every required
//! slot of the locked schema is valid.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::foundation::{RequestId, SessionId, StateMachine, TransitionError};
use crate::domain::intent::Intent;
use crate::domain::schema::{SchemaError, SchemaRegistry, SlotSchema};
use crate::domain::session::{
    AbandonReason, AuditDetail, AuditRecord, ConversationState, DialoguePhase, SessionOutcome,
    SlotStatus, SlotValue, TurnRecord,
};
use crate::domain::validation::validate;

use super::dispatch::{DispatchFailure, DispatchOutcome, DispatchRequest};
use super::selector::select_next;

/// Tunables the machine needs per turn.
#[derive(Debug, Clone, Copy)]
pub struct DialoguePolicy {
    /// Automatic dispatch retries beyond the first attempt.
    pub max_dispatch_retries: u32,
    /// Anchor for relative date resolution ("tomorrow", weekday names).
    pub reference_date: NaiveDate,
}

impl DialoguePolicy {
    pub fn new(max_dispatch_retries: u32, reference_date: NaiveDate) -> Self {
        Self {
            max_dispatch_retries,
            reference_date,
        }
    }
}

/// Machine-level failures. Validation rejections never appear here; they
/// become re-prompts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    /// The session reached a terminal phase; only archival remains.
    #[error("session '{0}' is closed")]
    SessionClosed(SessionId),

    /// A bug-level inconsistency: broken transition table or state.
    #[error("dialogue state is inconsistent: {0}")]
    Internal(String),
}

impl From<TransitionError> for MachineError {
    fn from(err: TransitionError) -> Self {
        MachineError::Internal(err.to_string())
    }
}

impl From<SchemaError> for MachineError {
    fn from(err: SchemaError) -> Self {
        MachineError::Internal(err.to_string())
    }
}

/// What kind of message the machine is sending back to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Prompt,
    Confirmation,
    NonWorkflow,
    Completed,
    Abandoned,
    Failed,
}

/// User-facing reply produced by a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReply {
    pub text: String,
    pub kind: ReplyKind,
}

impl EngineReply {
    fn new(kind: ReplyKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// A raw slot assignment proposed by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCandidate {
    pub slot: String,
    pub value: String,
    /// True when the user's phrasing explicitly targets the slot
    /// ("change the start date to..."). Only explicit candidates may
    /// overwrite an already-valid slot.
    pub explicit: bool,
}

impl SlotCandidate {
    pub fn new(slot: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            value: value.into(),
            explicit: false,
        }
    }

    pub fn explicit(slot: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            explicit: true,
            ..Self::new(slot, value)
        }
    }
}

/// Result of intent lock-in on the first turn.
#[derive(Debug, Clone, PartialEq)]
pub enum IntentDecision {
    /// A workflow intent locked; the turn continues into collection.
    Workflow(Intent),
    /// Reserved intent: the session closes harmlessly with this reply.
    NonWorkflow(EngineReply),
}

/// How a confirmation reply was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Affirmed,
    Denied,
    /// Neither yes nor no; treat the turn as fresh corrective input.
    Corrective,
}

/// What the turn should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum NextAction {
    /// Ask the user for a slot.
    Ask { slot: String, reply: EngineReply },
    /// Ask the user to confirm an ambiguous normalization.
    Confirm { slot: String, reply: EngineReply },
    /// All required slots valid: the payload may be dispatched.
    Dispatch(DispatchRequest),
    /// The session closed during selection (retry budget exhausted).
    Closed(EngineReply),
}

/// Resolution of a dispatch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchDecision {
    Completed(EngineReply),
    /// Recoverable failure with retry budget remaining.
    Retry,
    Failed(EngineReply),
}

/// Per-turn scratch that becomes the history record.
#[derive(Debug, Clone)]
struct TurnDraft {
    raw_text: String,
    detected_intent: Option<Intent>,
    extracted: BTreeMap<String, String>,
}

/// Dialogue state machine for one session.
///
/// Construct per turn via [`DialogueMachine::start`] or
/// [`DialogueMachine::resume`], drive the turn, then take the mutated
/// state and audit events back out with [`DialogueMachine::into_parts`].
#[derive(Debug)]
pub struct DialogueMachine<'a> {
    registry: &'a SchemaRegistry,
    policy: DialoguePolicy,
    state: ConversationState,
    events: Vec<AuditRecord>,
    draft: Option<TurnDraft>,
}

impl<'a> DialogueMachine<'a> {
    /// Starts a machine for a brand-new session.
    pub fn start(
        registry: &'a SchemaRegistry,
        policy: DialoguePolicy,
        session_id: SessionId,
    ) -> Self {
        Self {
            registry,
            policy,
            state: ConversationState::new(session_id),
            events: Vec::new(),
            draft: None,
        }
    }

    /// Resumes a machine from persisted state.
    pub fn resume(
        registry: &'a SchemaRegistry,
        policy: DialoguePolicy,
        state: ConversationState,
    ) -> Self {
        Self {
            registry,
            policy,
            state,
            events: Vec::new(),
            draft: None,
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Consumes the machine, yielding the mutated state and the audit
    /// events the turn produced.
    pub fn into_parts(self) -> (ConversationState, Vec<AuditRecord>) {
        (self.state, self.events)
    }

    /// The locked intent's schema.
    pub fn schema(&self) -> Result<&'a SlotSchema, MachineError> {
        let intent = self
            .state
            .intent
            .ok_or_else(|| MachineError::Internal("no intent locked".into()))?;
        Ok(self.registry.get_schema(intent)?)
    }

    /// Opens a user turn. Fails if the session already closed.
    pub fn begin_turn(&mut self, raw_text: &str) -> Result<(), MachineError> {
        if self.state.phase.is_terminal() {
            return Err(MachineError::SessionClosed(self.state.session_id.clone()));
        }
        self.state.turn_count += 1;
        self.draft = Some(TurnDraft {
            raw_text: raw_text.to_string(),
            detected_intent: None,
            extracted: BTreeMap::new(),
        });
        Ok(())
    }

    /// True when this turn must classify intent first.
    pub fn needs_intent(&self) -> bool {
        self.state.phase == DialoguePhase::Init
    }

    /// True when the session is waiting on a yes/no confirmation.
    pub fn awaiting_confirmation(&self) -> bool {
        self.state.phase == DialoguePhase::Confirming
    }

    /// True when the turn should run slot extraction.
    pub fn is_collecting(&self) -> bool {
        self.state.phase == DialoguePhase::Collecting
    }

    /// Applies the classifier's verdict to an `Init` session.
    ///
    /// Workflow intents lock in and open collection; reserved intents
    /// close the session with a harmless reply and never dispatch.
    pub fn lock_intent(
        &mut self,
        intent: Intent,
        confidence: f32,
    ) -> Result<IntentDecision, MachineError> {
        self.set_phase(DialoguePhase::DetectingIntent)?;
        if let Some(draft) = self.draft.as_mut() {
            draft.detected_intent = Some(intent);
        }

        // An intent outside the registry is treated exactly like an
        // unknown classification: fail open, never fail the turn.
        if intent.is_workflow() && self.registry.get_schema(intent).is_ok() {
            self.state.lock_intent(intent);
            self.push_event(AuditDetail::IntentLocked { intent, confidence });
            self.set_phase(DialoguePhase::Collecting)?;
            return Ok(IntentDecision::Workflow(intent));
        }

        self.set_phase(DialoguePhase::Completed)?;
        self.state.outcome = Some(SessionOutcome::Completed { reference_id: None });
        self.push_event(AuditDetail::SessionClosed {
            outcome: SessionOutcome::Completed { reference_id: None },
        });
        Ok(IntentDecision::NonWorkflow(EngineReply::new(
            ReplyKind::NonWorkflow,
            "I can help you request time off, schedule a meeting, submit an IT ticket, \
             or file a medical claim. Which of those can I do for you?",
        )))
    }

    /// Reads a reply to a pending confirmation question.
    pub fn resolve_confirmation(
        &mut self,
        raw_text: &str,
    ) -> Result<ConfirmationOutcome, MachineError> {
        let slot = self
            .state
            .pending_confirmation
            .clone()
            .ok_or_else(|| MachineError::Internal("confirming with no pending slot".into()))?;

        let outcome = match parse_affirmation(raw_text) {
            Some(true) => {
                let value = self
                    .state
                    .slots
                    .get_mut(&slot)
                    .ok_or_else(|| MachineError::Internal("pending slot has no value".into()))?;
                value.status = SlotStatus::Valid;
                let status = value.status;
                self.push_event(AuditDetail::SlotWritten { slot: slot.clone(), status });
                ConfirmationOutcome::Affirmed
            }
            Some(false) => {
                let turn = self.state.turn_count;
                if let Some(value) = self.state.slots.get_mut(&slot) {
                    value.normalized = None;
                    value.status = SlotStatus::Pending;
                    value.source_turn = turn;
                }
                self.push_event(AuditDetail::SlotWritten {
                    slot: slot.clone(),
                    status: SlotStatus::Pending,
                });
                ConfirmationOutcome::Denied
            }
            // Not a yes/no: the user volunteered something else. Leave
            // the slot pending and let the normal extraction pass read
            // the turn.
            None => ConfirmationOutcome::Corrective,
        };

        self.state.pending_confirmation = None;
        self.set_phase(DialoguePhase::Collecting)?;
        Ok(outcome)
    }

    /// Merges extractor candidates into the session's slots.
    ///
    /// Every candidate runs through the validation gate before it is
    /// trusted. A valid slot is only overwritten by an explicit
    /// correction; anything else leaves it untouched.
    pub fn merge_candidates(
        &mut self,
        mut candidates: Vec<SlotCandidate>,
    ) -> Result<(), MachineError> {
        let schema = self.schema()?;

        // A direct reply to a question may not look like anything the
        // extractor recognizes. Treat the whole utterance as an answer
        // to the slot that was just asked.
        if candidates.is_empty() {
            if let Some(asked) = self.state.last_asked_slot.clone() {
                if !self.state.slot_is_valid(&asked) {
                    if let Some(draft) = self.draft.as_ref() {
                        candidates.push(SlotCandidate::new(asked, draft.raw_text.clone()));
                    }
                }
            }
        }

        // The extractor is stateless, so a bare "March 11" replying to
        // "what is the end date?" comes back keyed to the first date
        // slot. When the asked slot got nothing and a same-typed
        // candidate landed on a slot that is already valid, read it as
        // the answer to the question.
        if let Some(asked) = self.state.last_asked_slot.clone() {
            if !self.state.slot_is_valid(&asked) && !candidates.iter().any(|c| c.slot == asked) {
                if let Some(asked_spec) = schema.spec(&asked) {
                    let retarget = candidates.iter_mut().find(|c| {
                        !c.explicit
                            && self.state.slots.get(&c.slot).map(|v| v.status)
                                == Some(SlotStatus::Valid)
                            && schema
                                .spec(&c.slot)
                                .map(|s| s.slot_type() == asked_spec.slot_type())
                                .unwrap_or(false)
                    });
                    if let Some(candidate) = retarget {
                        candidate.slot = asked;
                    }
                }
            }
        }

        for candidate in candidates {
            let Some(spec) = schema.spec(&candidate.slot) else {
                continue;
            };
            if self.state.slot_is_valid(spec.name()) && !candidate.explicit {
                continue;
            }

            if let Some(draft) = self.draft.as_mut() {
                draft
                    .extracted
                    .insert(candidate.slot.clone(), candidate.value.clone());
            }

            let turn = self.state.turn_count;
            let written = match validate(
                spec.slot_type(),
                spec.name(),
                &candidate.value,
                self.policy.reference_date,
            ) {
                Ok(validated) => {
                    let status = if validated.needs_confirmation {
                        self.state.pending_confirmation = Some(spec.name().to_string());
                        SlotStatus::Pending
                    } else {
                        SlotStatus::Valid
                    };
                    SlotValue {
                        raw: candidate.value,
                        normalized: Some(validated.value),
                        status,
                        source_turn: turn,
                    }
                }
                Err(_) => SlotValue {
                    raw: candidate.value,
                    normalized: None,
                    status: SlotStatus::Invalid,
                    source_turn: turn,
                },
            };

            let status = written.status;
            self.state.write_slot(spec.name(), written);
            self.push_event(AuditDetail::SlotWritten {
                slot: spec.name().to_string(),
                status,
            });
        }

        Ok(())
    }

    /// Decides what happens after the merge: confirm, ask, or dispatch.
    pub fn advance(&mut self) -> Result<NextAction, MachineError> {
        // Resumed mid-dispatch state goes straight back to the gate.
        if self.state.phase == DialoguePhase::ReadyToExecute {
            return Ok(NextAction::Dispatch(self.build_request()?));
        }

        let schema = self.schema()?;

        if let Some(slot) = self.state.pending_confirmation.clone() {
            let value = self
                .state
                .slot(&slot)
                .and_then(|v| v.normalized.clone())
                .ok_or_else(|| MachineError::Internal("pending slot has no candidate".into()))?;
            self.set_phase(DialoguePhase::Confirming)?;
            // Not a retry ask: the user answered, we are double-checking.
            self.state.last_asked_slot = Some(slot.clone());
            let text = format!(
                "Just to confirm: {} is {}?",
                humanize(&slot),
                value
            );
            return Ok(NextAction::Confirm {
                slot,
                reply: EngineReply::new(ReplyKind::Confirmation, text),
            });
        }

        let picked = select_next(
            schema,
            &self.state.slots,
            self.state.last_asked_slot.as_deref(),
            &self.state.retry_counts,
        );

        match picked {
            Some(spec) => {
                if self.state.retry_count(spec.name()) > spec.max_retries() {
                    let reply = self.abandon(AbandonReason::SlotUnresolvable)?;
                    return Ok(NextAction::Closed(reply));
                }
                let slot = spec.name().to_string();
                let reply = EngineReply::new(ReplyKind::Prompt, spec.prompt());
                self.state.note_asked(&slot);
                Ok(NextAction::Ask { slot, reply })
            }
            None => {
                self.set_phase(DialoguePhase::ReadyToExecute)?;
                Ok(NextAction::Dispatch(self.build_request()?))
            }
        }
    }

    /// Marks the start of a dispatcher call. The only transition into
    /// `Executing`.
    pub fn note_dispatch_attempt(&mut self, request: &DispatchRequest) -> Result<(), MachineError> {
        self.set_phase(DialoguePhase::Executing)?;
        self.state.dispatch_attempts += 1;
        let attempt = self.state.dispatch_attempts;
        self.push_event(AuditDetail::DispatchAttempted {
            request_id: request.request_id.clone(),
            attempt,
        });
        Ok(())
    }

    /// Applies the dispatcher's verdict.
    pub fn apply_dispatch_outcome(
        &mut self,
        request: &DispatchRequest,
        outcome: DispatchOutcome,
    ) -> Result<DispatchDecision, MachineError> {
        self.push_event(AuditDetail::DispatchResolved {
            request_id: request.request_id.clone(),
            success: outcome.success,
            reference_id: outcome.reference_id.clone(),
        });

        if outcome.success {
            self.set_phase(DialoguePhase::Completed)?;
            let session_outcome = SessionOutcome::Completed {
                reference_id: outcome.reference_id.clone(),
            };
            self.state.outcome = Some(session_outcome.clone());
            self.push_event(AuditDetail::SessionClosed {
                outcome: session_outcome,
            });
            let text = match outcome.reference_id {
                Some(reference) => format!(
                    "Done! Your {} has been submitted. Your reference number is {}.",
                    self.intent_label(),
                    reference
                ),
                None => format!("Done! Your {} has been submitted.", self.intent_label()),
            };
            return Ok(DispatchDecision::Completed(EngineReply::new(
                ReplyKind::Completed,
                text,
            )));
        }

        let failure = outcome
            .error
            .unwrap_or_else(|| DispatchFailure::NonRecoverable("dispatcher gave no reason".into()));

        match failure {
            DispatchFailure::Recoverable(_)
                if self.state.dispatch_attempts <= self.policy.max_dispatch_retries =>
            {
                self.set_phase(DialoguePhase::ReadyToExecute)?;
                Ok(DispatchDecision::Retry)
            }
            DispatchFailure::Recoverable(message) | DispatchFailure::NonRecoverable(message) => {
                self.set_phase(DialoguePhase::Failed)?;
                let session_outcome = SessionOutcome::Failed {
                    reference_id: request.request_id.to_string(),
                    error: message,
                };
                self.state.outcome = Some(session_outcome.clone());
                self.push_event(AuditDetail::SessionClosed {
                    outcome: session_outcome,
                });
                let text = format!(
                    "Sorry - I wasn't able to submit your {}. Please contact support \
                     and mention reference {}.",
                    self.intent_label(),
                    request.request_id
                );
                Ok(DispatchDecision::Failed(EngineReply::new(
                    ReplyKind::Failed,
                    text,
                )))
            }
        }
    }

    /// Closes the session as abandoned. Used for retry exhaustion,
    /// explicit cancel, and idle timeout.
    pub fn abandon(&mut self, reason: AbandonReason) -> Result<EngineReply, MachineError> {
        self.set_phase(DialoguePhase::Abandoned)?;
        let session_outcome = SessionOutcome::Abandoned { reason };
        self.state.outcome = Some(session_outcome.clone());
        self.push_event(AuditDetail::SessionClosed {
            outcome: session_outcome,
        });

        let text = match reason {
            AbandonReason::SlotUnresolvable => format!(
                "I couldn't get the details I need for your {}. I've flagged this \
                 for a teammate to pick up with you directly.",
                self.intent_label()
            ),
            AbandonReason::UserCancelled => format!(
                "No problem, I've cancelled this {}. Message me again any time.",
                self.intent_label()
            ),
            AbandonReason::IdleTimeout => format!(
                "This {} went quiet, so I've closed it out. Message me again to start over.",
                self.intent_label()
            ),
        };
        Ok(EngineReply::new(ReplyKind::Abandoned, text))
    }

    /// Appends this turn to the history log. No-op outside a turn.
    pub fn finish_turn(&mut self) {
        if let Some(draft) = self.draft.take() {
            let record = TurnRecord {
                turn: self.state.turn_count,
                raw_text: draft.raw_text,
                detected_intent: draft.detected_intent,
                extracted: draft.extracted,
                resulting_phase: self.state.phase,
                recorded_at: crate::domain::foundation::Timestamp::now(),
            };
            self.state.record_turn(record);
        }
    }

    fn build_request(&self) -> Result<DispatchRequest, MachineError> {
        let schema = self.schema()?;
        if !self.state.required_slots_valid(schema) {
            return Err(MachineError::Internal(
                "dispatch requested with required slots missing".into(),
            ));
        }
        Ok(DispatchRequest {
            request_id: RequestId::derive(&self.state.session_id, self.state.turn_count),
            intent: schema.intent(),
            payload: self.state.validated_payload(schema),
        })
    }

    fn set_phase(&mut self, to: DialoguePhase) -> Result<(), MachineError> {
        let from = self.state.phase;
        self.state.transition_phase(to)?;
        self.push_event(AuditDetail::PhaseChanged { from, to });
        Ok(())
    }

    fn push_event(&mut self, detail: AuditDetail) {
        self.events.push(AuditRecord::new(
            self.state.session_id.clone(),
            self.state.turn_count,
            detail,
        ));
    }

    fn intent_label(&self) -> &'static str {
        self.state.intent.map(|i| i.label()).unwrap_or("request")
    }
}

/// Reads a short reply as yes or no. Whole-phrase matching only, so
/// ordinary answers ("november", "no later than 3") are not swallowed.
fn parse_affirmation(text: &str) -> Option<bool> {
    let cleaned = text
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .to_lowercase();
    match cleaned.as_str() {
        "yes" | "y" | "yep" | "yeah" | "correct" | "right" | "sure" | "ok" | "okay"
        | "confirmed" | "that's right" | "exactly" => Some(true),
        "no" | "n" | "nope" | "nah" | "wrong" | "incorrect" | "not right" | "negative" => {
            Some(false)
        }
        _ => None,
    }
}

/// Human-readable form of a slot name for confirmation questions.
fn humanize(slot: &str) -> String {
    slot.replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::SchemaRegistry;

    fn policy() -> DialoguePolicy {
        // Reference date is a Wednesday.
        DialoguePolicy::new(1, NaiveDate::from_ymd_opt(2026, 3, 4).unwrap())
    }

    fn session_id() -> SessionId {
        SessionId::new("test-session").unwrap()
    }

    fn new_machine() -> DialogueMachine<'static> {
        DialogueMachine::start(SchemaRegistry::builtin(), policy(), session_id())
    }

    /// Drives a machine to a locked time-off intent.
    fn locked_machine() -> DialogueMachine<'static> {
        let mut machine = new_machine();
        machine.begin_turn("I need some time off").unwrap();
        let decision = machine.lock_intent(Intent::RequestTimeOff, 0.92).unwrap();
        assert!(matches!(decision, IntentDecision::Workflow(_)));
        machine
    }

    mod intent_lock_in {
        use super::*;

        #[test]
        fn workflow_intent_locks_and_opens_collection() {
            let machine = locked_machine();
            assert_eq!(machine.state().intent, Some(Intent::RequestTimeOff));
            assert_eq!(machine.state().phase, DialoguePhase::Collecting);
        }

        #[test]
        fn reserved_intent_closes_harmlessly() {
            let mut machine = new_machine();
            machine.begin_turn("how was your weekend?").unwrap();
            let decision = machine.lock_intent(Intent::GeneralChat, 0.8).unwrap();

            let IntentDecision::NonWorkflow(reply) = decision else {
                panic!("expected non-workflow exit");
            };
            assert_eq!(reply.kind, ReplyKind::NonWorkflow);
            assert_eq!(machine.state().phase, DialoguePhase::Completed);
            assert!(machine.state().intent.is_none());
        }

        #[test]
        fn closed_session_rejects_further_turns() {
            let mut machine = new_machine();
            machine.begin_turn("hello").unwrap();
            machine.lock_intent(Intent::Unknown, 0.1).unwrap();

            let err = machine.begin_turn("hello again").unwrap_err();
            assert!(matches!(err, MachineError::SessionClosed(_)));
        }

        #[test]
        fn lock_in_emits_intent_and_phase_events() {
            let machine = locked_machine();
            let (_, events) = machine.into_parts();
            assert!(events
                .iter()
                .any(|e| e.event_type() == "dialogue.intent_locked"));
            assert!(events
                .iter()
                .any(|e| e.event_type() == "dialogue.phase_changed"));
        }
    }

    mod merge {
        use super::*;

        #[test]
        fn valid_candidate_becomes_a_valid_slot() {
            let mut machine = locked_machine();
            machine
                .merge_candidates(vec![SlotCandidate::new("start_date", "2026-03-09")])
                .unwrap();
            assert!(machine.state().slot_is_valid("start_date"));
        }

        #[test]
        fn rejected_candidate_is_recorded_as_invalid() {
            let mut machine = locked_machine();
            machine
                .merge_candidates(vec![SlotCandidate::new("start_date", "whenever")])
                .unwrap();
            let slot = machine.state().slot("start_date").unwrap();
            assert_eq!(slot.status, SlotStatus::Invalid);
            assert!(slot.normalized.is_none());
        }

        #[test]
        fn ambiguous_candidate_parks_for_confirmation() {
            let mut machine = locked_machine();
            machine
                .merge_candidates(vec![SlotCandidate::new("start_date", "friday")])
                .unwrap();
            let slot = machine.state().slot("start_date").unwrap();
            assert_eq!(slot.status, SlotStatus::Pending);
            assert!(slot.normalized.is_some());
            assert_eq!(
                machine.state().pending_confirmation.as_deref(),
                Some("start_date")
            );
        }

        #[test]
        fn unknown_slot_names_are_ignored() {
            let mut machine = locked_machine();
            machine
                .merge_candidates(vec![SlotCandidate::new("favorite_color", "blue")])
                .unwrap();
            assert!(machine.state().slots.is_empty());
        }

        #[test]
        fn valid_slot_survives_a_non_corrective_candidate() {
            let mut machine = locked_machine();
            machine
                .merge_candidates(vec![SlotCandidate::new("start_date", "2026-03-09")])
                .unwrap();
            machine
                .merge_candidates(vec![SlotCandidate::new("start_date", "2026-03-20")])
                .unwrap();

            let slot = machine.state().slot("start_date").unwrap();
            assert_eq!(slot.raw, "2026-03-09");
        }

        #[test]
        fn explicit_correction_overwrites_a_valid_slot() {
            let mut machine = locked_machine();
            machine
                .merge_candidates(vec![SlotCandidate::new("start_date", "2026-03-09")])
                .unwrap();
            machine
                .merge_candidates(vec![SlotCandidate::explicit("start_date", "2026-03-20")])
                .unwrap();

            let slot = machine.state().slot("start_date").unwrap();
            assert_eq!(slot.raw, "2026-03-20");
            assert_eq!(slot.status, SlotStatus::Valid);
        }

        #[test]
        fn answer_to_a_question_is_retargeted_to_the_asked_slot() {
            let mut machine = locked_machine();
            machine
                .merge_candidates(vec![SlotCandidate::new("start_date", "2026-03-09")])
                .unwrap();
            let action = machine.advance().unwrap();
            assert!(matches!(action, NextAction::Ask { ref slot, .. } if slot == "end_date"));
            machine.finish_turn();

            // A stateless extractor keys the bare date to start_date.
            machine.begin_turn("March 11").unwrap();
            machine
                .merge_candidates(vec![SlotCandidate::new("start_date", "March 11")])
                .unwrap();

            assert!(machine.state().slot_is_valid("end_date"));
            // The original answer survives untouched.
            assert_eq!(machine.state().slot("start_date").unwrap().raw, "2026-03-09");
        }

        #[test]
        fn empty_extraction_falls_back_to_the_asked_slot() {
            let mut machine = locked_machine();
            let action = machine.advance().unwrap();
            assert!(matches!(action, NextAction::Ask { ref slot, .. } if slot == "start_date"));
            machine.finish_turn();

            machine.begin_turn("2026-03-09").unwrap();
            machine.merge_candidates(vec![]).unwrap();
            assert!(machine.state().slot_is_valid("start_date"));
        }
    }

    mod advancing {
        use super::*;

        #[test]
        fn asks_first_missing_slot_in_schema_order() {
            let mut machine = locked_machine();
            let action = machine.advance().unwrap();
            let NextAction::Ask { slot, reply } = action else {
                panic!("expected an ask");
            };
            assert_eq!(slot, "start_date");
            assert_eq!(reply.text, "What is the exact start date?");
            assert_eq!(reply.kind, ReplyKind::Prompt);
            assert_eq!(machine.state().retry_count("start_date"), 1);
        }

        #[test]
        fn pending_confirmation_takes_priority_over_asking() {
            let mut machine = locked_machine();
            machine
                .merge_candidates(vec![SlotCandidate::new("start_date", "friday")])
                .unwrap();
            let action = machine.advance().unwrap();
            let NextAction::Confirm { slot, reply } = action else {
                panic!("expected a confirmation");
            };
            assert_eq!(slot, "start_date");
            assert!(reply.text.contains("2026-03-06"));
            assert_eq!(machine.state().phase, DialoguePhase::Confirming);
        }

        #[test]
        fn complete_payload_opens_the_execute_gate() {
            let mut machine = locked_machine();
            machine
                .merge_candidates(vec![
                    SlotCandidate::new("start_date", "2026-03-09"),
                    SlotCandidate::new("end_date", "2026-03-11"),
                    SlotCandidate::new("reason", "personal"),
                ])
                .unwrap();

            let action = machine.advance().unwrap();
            let NextAction::Dispatch(request) = action else {
                panic!("expected dispatch");
            };
            assert_eq!(machine.state().phase, DialoguePhase::ReadyToExecute);
            assert_eq!(request.intent, Intent::RequestTimeOff);
            assert_eq!(request.payload.len(), 3);
            assert_eq!(request.request_id.as_str(), "test-session:1");
        }

        #[test]
        fn retry_budget_exhaustion_abandons_the_session() {
            let mut machine = locked_machine();

            // The schema allows an initial ask plus two retries.
            for _ in 0..3 {
                let action = machine.advance().unwrap();
                assert!(matches!(action, NextAction::Ask { ref slot, .. } if slot == "start_date"));
                machine.finish_turn();
                machine.begin_turn("no idea").unwrap();
                machine.merge_candidates(vec![]).unwrap();
            }

            let action = machine.advance().unwrap();
            let NextAction::Closed(reply) = action else {
                panic!("expected the session to close");
            };
            assert_eq!(reply.kind, ReplyKind::Abandoned);
            assert_eq!(machine.state().phase, DialoguePhase::Abandoned);
            assert_eq!(
                machine.state().outcome,
                Some(SessionOutcome::Abandoned {
                    reason: AbandonReason::SlotUnresolvable
                })
            );
        }
    }

    mod confirmation {
        use super::*;

        fn confirming_machine() -> DialogueMachine<'static> {
            let mut machine = locked_machine();
            machine
                .merge_candidates(vec![SlotCandidate::new("start_date", "friday")])
                .unwrap();
            let action = machine.advance().unwrap();
            assert!(matches!(action, NextAction::Confirm { .. }));
            machine.finish_turn();
            machine
        }

        #[test]
        fn affirmative_reply_validates_the_slot() {
            let mut machine = confirming_machine();
            machine.begin_turn("yes").unwrap();
            let outcome = machine.resolve_confirmation("yes").unwrap();
            assert_eq!(outcome, ConfirmationOutcome::Affirmed);
            assert!(machine.state().slot_is_valid("start_date"));
            assert_eq!(machine.state().phase, DialoguePhase::Collecting);
        }

        #[test]
        fn negative_reply_resets_the_slot() {
            let mut machine = confirming_machine();
            machine.begin_turn("no").unwrap();
            let outcome = machine.resolve_confirmation("no").unwrap();
            assert_eq!(outcome, ConfirmationOutcome::Denied);

            let slot = machine.state().slot("start_date").unwrap();
            assert_eq!(slot.status, SlotStatus::Pending);
            assert!(slot.normalized.is_none());

            // The slot is re-asked on the next advance.
            let action = machine.advance().unwrap();
            assert!(matches!(action, NextAction::Ask { ref slot, .. } if slot == "start_date"));
        }

        #[test]
        fn other_replies_fall_through_to_extraction() {
            let mut machine = confirming_machine();
            machine.begin_turn("make it March 9").unwrap();
            let outcome = machine.resolve_confirmation("make it March 9").unwrap();
            assert_eq!(outcome, ConfirmationOutcome::Corrective);
            assert_eq!(machine.state().phase, DialoguePhase::Collecting);
            assert!(machine.state().pending_confirmation.is_none());
        }

        #[test]
        fn affirmation_parser_only_matches_whole_phrases() {
            assert_eq!(parse_affirmation("Yes."), Some(true));
            assert_eq!(parse_affirmation("nope"), Some(false));
            assert_eq!(parse_affirmation("november"), None);
            assert_eq!(parse_affirmation("no later than 3"), None);
        }
    }

    mod dispatch {
        use super::*;

        fn ready_machine() -> (DialogueMachine<'static>, DispatchRequest) {
            let mut machine = locked_machine();
            machine
                .merge_candidates(vec![
                    SlotCandidate::new("start_date", "2026-03-09"),
                    SlotCandidate::new("end_date", "2026-03-11"),
                    SlotCandidate::new("reason", "personal"),
                ])
                .unwrap();
            let NextAction::Dispatch(request) = machine.advance().unwrap() else {
                panic!("expected dispatch");
            };
            (machine, request)
        }

        #[test]
        fn success_completes_the_session() {
            let (mut machine, request) = ready_machine();
            machine.note_dispatch_attempt(&request).unwrap();
            assert_eq!(machine.state().phase, DialoguePhase::Executing);

            let decision = machine
                .apply_dispatch_outcome(&request, DispatchOutcome::ok("PTO-778"))
                .unwrap();
            let DispatchDecision::Completed(reply) = decision else {
                panic!("expected completion");
            };
            assert!(reply.text.contains("PTO-778"));
            assert_eq!(machine.state().phase, DialoguePhase::Completed);
            assert_eq!(
                machine.state().outcome,
                Some(SessionOutcome::Completed {
                    reference_id: Some("PTO-778".into())
                })
            );
        }

        #[test]
        fn recoverable_failure_retries_within_budget() {
            let (mut machine, request) = ready_machine();
            machine.note_dispatch_attempt(&request).unwrap();

            let decision = machine
                .apply_dispatch_outcome(&request, DispatchOutcome::recoverable("network timeout"))
                .unwrap();
            assert_eq!(decision, DispatchDecision::Retry);
            assert_eq!(machine.state().phase, DialoguePhase::ReadyToExecute);

            // Second attempt succeeds.
            machine.note_dispatch_attempt(&request).unwrap();
            let decision = machine
                .apply_dispatch_outcome(&request, DispatchOutcome::ok("PTO-779"))
                .unwrap();
            assert!(matches!(decision, DispatchDecision::Completed(_)));
        }

        #[test]
        fn recoverable_failures_exhaust_into_failed() {
            let (mut machine, request) = ready_machine();

            // Policy allows one retry beyond the first attempt.
            machine.note_dispatch_attempt(&request).unwrap();
            let decision = machine
                .apply_dispatch_outcome(&request, DispatchOutcome::recoverable("timeout"))
                .unwrap();
            assert_eq!(decision, DispatchDecision::Retry);

            machine.note_dispatch_attempt(&request).unwrap();
            let decision = machine
                .apply_dispatch_outcome(&request, DispatchOutcome::recoverable("timeout"))
                .unwrap();
            let DispatchDecision::Failed(reply) = decision else {
                panic!("expected failure");
            };
            assert!(reply.text.contains(request.request_id.as_str()));
            assert_eq!(machine.state().phase, DialoguePhase::Failed);
        }

        #[test]
        fn non_recoverable_failure_fails_immediately() {
            let (mut machine, request) = ready_machine();
            machine.note_dispatch_attempt(&request).unwrap();

            let decision = machine
                .apply_dispatch_outcome(
                    &request,
                    DispatchOutcome::non_recoverable("invalid destination"),
                )
                .unwrap();
            assert!(matches!(decision, DispatchDecision::Failed(_)));
            assert_eq!(machine.state().phase, DialoguePhase::Failed);
            assert!(matches!(
                machine.state().outcome,
                Some(SessionOutcome::Failed { .. })
            ));
        }

        #[test]
        fn request_id_is_stable_across_retries() {
            let (mut machine, request) = ready_machine();
            machine.note_dispatch_attempt(&request).unwrap();
            machine
                .apply_dispatch_outcome(&request, DispatchOutcome::recoverable("timeout"))
                .unwrap();

            let NextAction::Dispatch(second) = machine.advance().unwrap() else {
                panic!("expected dispatch");
            };
            assert_eq!(second.request_id, request.request_id);
        }
    }

    mod history {
        use super::*;

        #[test]
        fn finish_turn_appends_an_audit_record() {
            let mut machine = locked_machine();
            machine
                .merge_candidates(vec![SlotCandidate::new("start_date", "2026-03-09")])
                .unwrap();
            machine.advance().unwrap();
            machine.finish_turn();

            let history = &machine.state().history;
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].turn, 1);
            assert_eq!(history[0].detected_intent, Some(Intent::RequestTimeOff));
            assert_eq!(history[0].extracted.get("start_date").unwrap(), "2026-03-09");
            assert_eq!(history[0].resulting_phase, DialoguePhase::Collecting);
        }

        #[test]
        fn history_grows_append_only_across_turns() {
            let mut machine = locked_machine();
            machine.advance().unwrap();
            machine.finish_turn();

            machine.begin_turn("2026-03-09").unwrap();
            machine.merge_candidates(vec![]).unwrap();
            machine.advance().unwrap();
            machine.finish_turn();

            let history = &machine.state().history;
            assert_eq!(history.len(), 2);
            assert_eq!(history[0].turn, 1);
            assert_eq!(history[1].turn, 2);
        }
    }

    mod cancellation {
        use super::*;

        #[test]
        fn explicit_cancel_abandons_with_reason() {
            let mut machine = locked_machine();
            let reply = machine.abandon(AbandonReason::UserCancelled).unwrap();
            assert_eq!(reply.kind, ReplyKind::Abandoned);
            assert_eq!(
                machine.state().outcome,
                Some(SessionOutcome::Abandoned {
                    reason: AbandonReason::UserCancelled
                })
            );
        }

        #[test]
        fn cancel_is_valid_from_confirming() {
            let mut machine = locked_machine();
            machine
                .merge_candidates(vec![SlotCandidate::new("start_date", "friday")])
                .unwrap();
            machine.advance().unwrap();
            assert_eq!(machine.state().phase, DialoguePhase::Confirming);

            assert!(machine.abandon(AbandonReason::IdleTimeout).is_ok());
            assert_eq!(machine.state().phase, DialoguePhase::Abandoned);
        }
    }
}
