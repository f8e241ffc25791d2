//! Mock action dispatcher for testing.
//!
//! Configurable to return scripted outcomes in order, with full call
//! tracking so tests can assert exactly when and with what payload the
//! execute gate fired.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::dialogue::{DispatchOutcome, DispatchRequest};
use crate::ports::ActionDispatcher;

/// Scriptable dispatcher.
///
/// Outcomes queue up and are consumed one per call; once the queue is
/// empty every call succeeds with a generated reference id.
#[derive(Debug, Clone, Default)]
pub struct MockDispatcher {
    outcomes: Arc<Mutex<VecDeque<DispatchOutcome>>>,
    calls: Arc<Mutex<Vec<DispatchRequest>>>,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an outcome for a future call.
    pub fn with_outcome(self, outcome: DispatchOutcome) -> Self {
        self.outcomes
            .lock()
            .expect("MockDispatcher: outcomes lock poisoned")
            .push_back(outcome);
        self
    }

    /// All requests received so far.
    pub fn calls(&self) -> Vec<DispatchRequest> {
        self.calls
            .lock()
            .expect("MockDispatcher: calls lock poisoned")
            .clone()
    }

    /// Number of execute calls received.
    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .expect("MockDispatcher: calls lock poisoned")
            .len()
    }
}

#[async_trait]
impl ActionDispatcher for MockDispatcher {
    async fn execute(&self, request: &DispatchRequest) -> DispatchOutcome {
        let call_number = {
            let mut calls = self
                .calls
                .lock()
                .expect("MockDispatcher: calls lock poisoned");
            calls.push(request.clone());
            calls.len()
        };

        self.outcomes
            .lock()
            .expect("MockDispatcher: outcomes lock poisoned")
            .pop_front()
            .unwrap_or_else(|| DispatchOutcome::ok(format!("REF-{}", call_number)))
    }
}
