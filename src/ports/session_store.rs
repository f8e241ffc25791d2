//! Session store port.
//!
//! Defines the contract for persisting and retrieving conversation
//! state by session id. Saving is the turn's single commit point: a
//! failed save must leave the previously persisted state untouched.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::SessionId;
use crate::domain::session::ConversationState;

/// Errors raised by session persistence.
///
/// Fatal for the turn that hits them: no partial state is written and
/// the caller may retry the whole turn.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("failed to serialize session state: {0}")]
    Serialization(String),
}

/// Port for session state persistence.
///
/// Implementations must round-trip [`ConversationState`] with full
/// fidelity and make `save` atomic: either the whole new state becomes
/// visible to the next `load`, or the prior state survives unchanged.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads a session's state. `None` means the id is unknown and a
    /// fresh session should be created.
    async fn load(&self, id: &SessionId) -> Result<Option<ConversationState>, StoreError>;

    /// Persists a session's state, replacing any prior version.
    async fn save(&self, state: &ConversationState) -> Result<(), StoreError>;

    /// Ids of sessions not yet in a terminal phase, for the idle sweeper.
    async fn active_sessions(&self) -> Result<Vec<SessionId>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn SessionStore) {}
    }
}
