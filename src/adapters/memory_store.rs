//! In-memory session store adapter.
//!
//! Stores conversation state in a process-local map. Useful for testing
//! and development; production deployments swap in a durable store
//! behind the same port.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{SessionId, StateMachine};
use crate::domain::session::ConversationState;
use crate::ports::{SessionStore, StoreError};

/// In-memory storage for conversation state.
///
/// Saves clone the whole state, so a failed save can never leave a
/// half-written session behind. Supports injected save failures for
/// exercising the atomic-commit contract in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    states: Arc<RwLock<HashMap<SessionId, ConversationState>>>,
    failing_saves: Arc<RwLock<u32>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` saves fail with `StoreError::Unavailable`.
    pub async fn fail_next_saves(&self, count: u32) {
        *self.failing_saves.write().await = count;
    }

    /// Number of stored sessions.
    pub async fn session_count(&self) -> usize {
        self.states.read().await.len()
    }

    /// Clears all stored data (for test isolation).
    pub async fn clear(&self) {
        self.states.write().await.clear();
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<ConversationState>, StoreError> {
        Ok(self.states.read().await.get(id).cloned())
    }

    async fn save(&self, state: &ConversationState) -> Result<(), StoreError> {
        {
            let mut failing = self.failing_saves.write().await;
            if *failing > 0 {
                *failing -= 1;
                return Err(StoreError::Unavailable("injected save failure".into()));
            }
        }
        self.states
            .write()
            .await
            .insert(state.session_id.clone(), state.clone());
        Ok(())
    }

    async fn active_sessions(&self) -> Result<Vec<SessionId>, StoreError> {
        let states = self.states.read().await;
        let mut ids: Vec<SessionId> = states
            .values()
            .filter(|s| !s.phase.is_terminal())
            .map(|s| s.session_id.clone())
            .collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }
}
