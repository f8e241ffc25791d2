//! Action dispatcher port.
//!
//! The single external surface that causes a real-world side effect.
//! Only the dialogue machine's execute gate ever builds a
//! [`DispatchRequest`], so an implementation can trust that the payload
//! passed validation in full.

use async_trait::async_trait;

use crate::domain::dialogue::{DispatchOutcome, DispatchRequest};

/// Port for executing a finalized workflow payload.
///
/// Implementations must be idempotent-safe per `request.request_id`: the
/// machine retries recoverable failures with the same id, and replays
/// must not create duplicate artifacts. Failures are reported inside the
/// outcome, classified recoverable or not; the method itself is
/// infallible.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn execute(&self, request: &DispatchRequest) -> DispatchOutcome;
}
