//! ProcessTurnHandler - run one user turn through the dialogue machine.
//!
//! Owns the full turn pipeline: acquire the session lock, load state,
//! classify (first turn only), extract, merge and validate, pick the
//! next action, dispatch when the gate opens, and commit. State reaches
//! the store only after the whole transition completes; a failed save
//! leaves the previously persisted state untouched.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::application::session_locks::SessionLockRegistry;
use crate::config::DialogueConfig;
use crate::domain::dialogue::{
    ConfirmationOutcome, DialogueMachine, DialoguePolicy, DispatchDecision, DispatchRequest,
    EngineReply, IntentDecision, MachineError, NextAction,
};
use crate::domain::foundation::SessionId;
use crate::domain::schema::SchemaRegistry;
use crate::domain::session::DialoguePhase;
use crate::ports::{ActionDispatcher, AuditSink, IntentClassifier, SessionStore, SlotExtractor};

/// Command to process one user turn.
#[derive(Debug, Clone)]
pub struct ProcessTurnCommand {
    pub session_id: SessionId,
    pub text: String,
}

/// Result of a processed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: SessionId,
    pub phase: DialoguePhase,
    pub reply: EngineReply,
}

/// Errors a turn can fail with.
///
/// Validation rejections never appear here; they become re-prompts
/// inside the reply. A `Store` error means nothing was committed and
/// the caller may retry the turn wholesale.
#[derive(Debug, Error)]
pub enum ProcessTurnError {
    #[error(transparent)]
    Store(#[from] crate::ports::StoreError),

    #[error(transparent)]
    Machine(#[from] MachineError),
}

/// Handler wiring the dialogue machine to its ports.
pub struct ProcessTurnHandler {
    registry: &'static SchemaRegistry,
    config: DialogueConfig,
    classifier: Arc<dyn IntentClassifier>,
    extractor: Arc<dyn SlotExtractor>,
    dispatcher: Arc<dyn ActionDispatcher>,
    store: Arc<dyn SessionStore>,
    audit: Arc<dyn AuditSink>,
    locks: Arc<SessionLockRegistry>,
}

impl ProcessTurnHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: DialogueConfig,
        classifier: Arc<dyn IntentClassifier>,
        extractor: Arc<dyn SlotExtractor>,
        dispatcher: Arc<dyn ActionDispatcher>,
        store: Arc<dyn SessionStore>,
        audit: Arc<dyn AuditSink>,
        locks: Arc<SessionLockRegistry>,
    ) -> Self {
        Self {
            registry: SchemaRegistry::builtin(),
            config,
            classifier,
            extractor,
            dispatcher,
            store,
            audit,
            locks,
        }
    }

    pub async fn handle(&self, cmd: ProcessTurnCommand) -> Result<TurnOutcome, ProcessTurnError> {
        // One in-flight turn per session; distinct sessions run in
        // parallel.
        let _guard = self.locks.acquire(&cmd.session_id).await;

        let policy = DialoguePolicy::new(
            self.config.max_dispatch_retries,
            Utc::now().date_naive(),
        );
        let mut machine = match self.store.load(&cmd.session_id).await? {
            Some(state) => DialogueMachine::resume(self.registry, policy, state),
            None => DialogueMachine::start(self.registry, policy, cmd.session_id.clone()),
        };

        machine.begin_turn(&cmd.text)?;
        tracing::debug!(
            session = %cmd.session_id,
            turn = machine.state().turn_count,
            phase = ?machine.state().phase,
            "processing turn"
        );

        if machine.needs_intent() {
            let classification = self.classifier.classify(&cmd.text).await;
            let decision =
                machine.lock_intent(classification.intent, classification.confidence)?;
            if let IntentDecision::NonWorkflow(reply) = decision {
                return self.commit(machine, reply).await;
            }
        }

        // Recognized yes/no answers resolve the confirmation directly;
        // anything else is treated as fresh input for extraction.
        let mut run_extraction = true;
        if machine.awaiting_confirmation() {
            let outcome = machine.resolve_confirmation(&cmd.text)?;
            run_extraction = outcome == ConfirmationOutcome::Corrective;
        }

        if machine.is_collecting() && run_extraction {
            let schema = machine.schema()?;
            let candidates = self.extractor.extract(&cmd.text, schema).await;
            machine.merge_candidates(candidates)?;
        }

        let reply = match machine.advance()? {
            NextAction::Ask { reply, .. } => reply,
            NextAction::Confirm { reply, .. } => reply,
            NextAction::Closed(reply) => reply,
            NextAction::Dispatch(request) => self.dispatch(&mut machine, request).await?,
        };

        self.commit(machine, reply).await
    }

    /// Drives the execute gate: attempt, classify the outcome, retry
    /// recoverable failures until the machine decides.
    async fn dispatch(
        &self,
        machine: &mut DialogueMachine<'static>,
        request: DispatchRequest,
    ) -> Result<EngineReply, ProcessTurnError> {
        loop {
            machine.note_dispatch_attempt(&request)?;
            let outcome = self.dispatcher.execute(&request).await;
            match machine.apply_dispatch_outcome(&request, outcome)? {
                DispatchDecision::Completed(reply) | DispatchDecision::Failed(reply) => {
                    return Ok(reply)
                }
                DispatchDecision::Retry => {
                    tracing::debug!(request_id = %request.request_id, "retrying dispatch");
                }
            }
        }
    }

    /// The turn's single commit point. Audit flushes only after the
    /// save succeeds, so audit never describes uncommitted state.
    async fn commit(
        &self,
        mut machine: DialogueMachine<'static>,
        reply: EngineReply,
    ) -> Result<TurnOutcome, ProcessTurnError> {
        machine.finish_turn();
        let (state, events) = machine.into_parts();
        let phase = state.phase;
        self.store.save(&state).await?;
        self.audit.record_all(events);
        tracing::info!(session = %state.session_id, phase = ?phase, "turn committed");
        Ok(TurnOutcome {
            session_id: state.session_id,
            phase,
            reply,
        })
    }
}
