//! Per-session mutual exclusion.
//!
//! Turn processing mutates state through a load-transform-save sequence
//! that is not safe under interleaving: a racing second turn could see
//! stale slots, re-ask an answered question, or double-fire the execute
//! gate. One async mutex per session id serializes turns for a session
//! while leaving distinct sessions fully parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::foundation::SessionId;

/// Registry of per-session locks.
#[derive(Debug, Default)]
pub struct SessionLockRegistry {
    locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SessionLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for a session, creating it on first use.
    ///
    /// The guard owns the lock for the whole turn, including cancel and
    /// sweep mutations, which are turn-like by contract.
    pub async fn acquire(&self, id: &SessionId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of sessions with a registered lock.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// True when no session has ever been locked.
    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}
