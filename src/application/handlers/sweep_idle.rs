//! SweepIdleSessionsHandler - out-of-band idle timeout.
//!
//! Periodically invoked by the owning process, not in response to a
//! user turn. Each abandonment runs under the session's lock like any
//! other mutation, so a sweep can never race a live turn.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::application::session_locks::SessionLockRegistry;
use crate::config::DialogueConfig;
use crate::domain::dialogue::{DialogueMachine, DialoguePolicy};
use crate::domain::foundation::{SessionId, StateMachine, Timestamp};
use crate::domain::schema::SchemaRegistry;
use crate::domain::session::AbandonReason;
use crate::ports::{AuditSink, SessionStore};

/// Result of one sweep pass.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Sessions abandoned by this pass.
    pub swept: Vec<SessionId>,
}

/// Errors a sweep pass can fail with.
///
/// Per-session save failures are logged and skipped rather than failing
/// the pass; only enumeration failure aborts it.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Store(#[from] crate::ports::StoreError),
}

/// Handler that abandons sessions idle past the configured window.
pub struct SweepIdleSessionsHandler {
    registry: &'static SchemaRegistry,
    config: DialogueConfig,
    store: Arc<dyn SessionStore>,
    audit: Arc<dyn AuditSink>,
    locks: Arc<SessionLockRegistry>,
}

impl SweepIdleSessionsHandler {
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

    pub async fn handle(&self) -> Result<SweepReport, SweepError> {
        let mut report = SweepReport::default();
        let now = Timestamp::now();

        for session_id in self.store.active_sessions().await? {
            let _guard = self.locks.acquire(&session_id).await;

            // Re-check under the lock: a turn may have just landed.
            let Some(state) = self.store.load(&session_id).await? else {
                continue;
            };
            if state.phase.is_terminal()
                || !state.idle_longer_than(self.config.idle_timeout_secs, now)
            {
                continue;
            }

            let policy = DialoguePolicy::new(
                self.config.max_dispatch_retries,
                Utc::now().date_naive(),
            );
            let mut machine = DialogueMachine::resume(self.registry, policy, state);
            if let Err(err) = machine.abandon(AbandonReason::IdleTimeout) {
                tracing::warn!(session = %session_id, error = %err, "sweep skipped session");
                continue;
            }

            let (state, events) = machine.into_parts();
            match self.store.save(&state).await {
                Ok(()) => {
                    self.audit.record_all(events);
                    tracing::info!(session = %session_id, "idle session abandoned");
                    report.swept.push(session_id);
                }
                Err(err) => {
                    tracing::warn!(session = %session_id, error = %err, "sweep save failed");
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemorySessionStore, TracingAuditSink};
    use crate::domain::session::{ConversationState, DialoguePhase, SessionOutcome};
    use crate::ports::SessionStore as _;

    fn id(s: &str) -> SessionId {
        SessionId::new(s).unwrap()
    }

    fn handler(store: Arc<InMemorySessionStore>) -> SweepIdleSessionsHandler {
        SweepIdleSessionsHandler::new(
            DialogueConfig {
                idle_timeout_secs: 600,
                ..Default::default()
            },
            store,
            Arc::new(TracingAuditSink::new()),
            Arc::new(SessionLockRegistry::new()),
        )
    }

    fn idle_state(session: &str, idle_secs: u64) -> ConversationState {
        let mut state = ConversationState::new(id(session));
        state.updated_at = Timestamp::now().minus_secs(idle_secs);
        state
    }

    #[tokio::test]
    async fn sweeps_only_sessions_past_the_window() {
        let store = Arc::new(InMemorySessionStore::new());
        store.save(&idle_state("old", 3600)).await.unwrap();
        store.save(&idle_state("fresh", 10)).await.unwrap();

        let report = handler(store.clone()).handle().await.unwrap();

        assert_eq!(report.swept, vec![id("old")]);
        let swept = store.load(&id("old")).await.unwrap().unwrap();
        assert_eq!(swept.phase, DialoguePhase::Abandoned);
        assert_eq!(
            swept.outcome,
            Some(SessionOutcome::Abandoned {
                reason: AbandonReason::IdleTimeout
            })
        );

        let fresh = store.load(&id("fresh")).await.unwrap().unwrap();
        assert_eq!(fresh.phase, DialoguePhase::Init);
    }

    #[tokio::test]
    async fn empty_store_sweeps_nothing() {
        let store = Arc::new(InMemorySessionStore::new());
        let report = handler(store).handle().await.unwrap();
        assert!(report.swept.is_empty());
    }

    #[tokio::test]
    async fn sweep_is_idempotent() {
        let store = Arc::new(InMemorySessionStore::new());
        store.save(&idle_state("old", 3600)).await.unwrap();
        let handler = handler(store);

        let first = handler.handle().await.unwrap();
        assert_eq!(first.swept.len(), 1);

        // Already terminal: the second pass leaves it alone.
        let second = handler.handle().await.unwrap();
        assert!(second.swept.is_empty());
    }
}
