//! CancelSessionHandler - explicit user cancellation.
//!
//! Cancellation is a turn-like mutation: it runs under the same
//! per-session lock and the same single commit point as a user turn,
//! so it can never corrupt an in-flight turn's state.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::application::session_locks::SessionLockRegistry;
use crate::config::DialogueConfig;
use crate::domain::dialogue::{DialogueMachine, DialoguePolicy, EngineReply, MachineError};
use crate::domain::foundation::{SessionId, StateMachine};
use crate::domain::schema::SchemaRegistry;
use crate::domain::session::{AbandonReason, DialoguePhase};
use crate::ports::{AuditSink, SessionStore};

/// Command to cancel a session.
#[derive(Debug, Clone)]
pub struct CancelSessionCommand {
    pub session_id: SessionId,
}

/// Result of a cancellation.
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub session_id: SessionId,
    pub phase: DialoguePhase,
    pub reply: EngineReply,
}

/// Errors cancellation can fail with.
#[derive(Debug, Error)]
pub enum CancelSessionError {
    #[error("session '{0}' not found")]
    NotFound(SessionId),

    #[error(transparent)]
    Store(#[from] crate::ports::StoreError),

    #[error(transparent)]
    Machine(#[from] MachineError),
}

/// Handler for explicit session cancellation.
pub struct CancelSessionHandler {
    registry: &'static SchemaRegistry,
    config: DialogueConfig,
    store: Arc<dyn SessionStore>,
    audit: Arc<dyn AuditSink>,
    locks: Arc<SessionLockRegistry>,
}

impl CancelSessionHandler {
    pub fn new(
        config: DialogueConfig,
        store: Arc<dyn SessionStore>,
        audit: Arc<dyn AuditSink>,
        locks: Arc<SessionLockRegistry>,
    ) -> Self {
        Self {
            registry: SchemaRegistry::builtin(),
            config,
            store,
            audit,
            locks,
        }
    }

    pub async fn handle(
        &self,
        cmd: CancelSessionCommand,
    ) -> Result<CancelOutcome, CancelSessionError> {
        let _guard = self.locks.acquire(&cmd.session_id).await;

        let state = self
            .store
            .load(&cmd.session_id)
            .await?
            .ok_or_else(|| CancelSessionError::NotFound(cmd.session_id.clone()))?;

        if state.phase.is_terminal() {
            return Err(MachineError::SessionClosed(cmd.session_id).into());
        }

        let policy = DialoguePolicy::new(
            self.config.max_dispatch_retries,
            Utc::now().date_naive(),
        );
        let mut machine = DialogueMachine::resume(self.registry, policy, state);
        let reply = machine.abandon(AbandonReason::UserCancelled)?;

        let (state, events) = machine.into_parts();
        let phase = state.phase;
        self.store.save(&state).await?;
        self.audit.record_all(events);
        tracing::info!(session = %state.session_id, "session cancelled");

        Ok(CancelOutcome {
            session_id: state.session_id,
            phase,
            reply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemorySessionStore, TracingAuditSink};
    use crate::domain::dialogue::ReplyKind;
    use crate::domain::session::{ConversationState, SessionOutcome};
    use crate::ports::SessionStore as _;

    fn handler(store: Arc<InMemorySessionStore>) -> CancelSessionHandler {
        CancelSessionHandler::new(
            DialogueConfig::default(),
            store,
            Arc::new(TracingAuditSink::new()),
            Arc::new(SessionLockRegistry::new()),
        )
    }

    fn id(s: &str) -> SessionId {
        SessionId::new(s).unwrap()
    }

    #[tokio::test]
    async fn cancels_an_open_session() {
        let store = Arc::new(InMemorySessionStore::new());
        store.save(&ConversationState::new(id("s-1"))).await.unwrap();

        let outcome = handler(store.clone())
            .handle(CancelSessionCommand { session_id: id("s-1") })
            .await
            .unwrap();

        assert_eq!(outcome.phase, DialoguePhase::Abandoned);
        assert_eq!(outcome.reply.kind, ReplyKind::Abandoned);

        let saved = store.load(&id("s-1")).await.unwrap().unwrap();
        assert_eq!(
            saved.outcome,
            Some(SessionOutcome::Abandoned {
                reason: AbandonReason::UserCancelled
            })
        );
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let store = Arc::new(InMemorySessionStore::new());
        let result = handler(store)
            .handle(CancelSessionCommand { session_id: id("ghost") })
            .await;
        assert!(matches!(result, Err(CancelSessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn cancelling_twice_reports_the_session_closed() {
        let store = Arc::new(InMemorySessionStore::new());
        store.save(&ConversationState::new(id("s-1"))).await.unwrap();
        let handler = handler(store);

        handler
            .handle(CancelSessionCommand { session_id: id("s-1") })
            .await
            .unwrap();
        let result = handler
            .handle(CancelSessionCommand { session_id: id("s-1") })
            .await;
        assert!(matches!(
            result,
            Err(CancelSessionError::Machine(MachineError::SessionClosed(_)))
        ));
    }
}
