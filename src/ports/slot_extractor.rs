//! Slot extractor port.
//!
//! Abstracts the backend that scans an utterance for candidate slot
//! values. Candidates are raw text; every one of them passes the
//! validation gate before the session trusts it.

use async_trait::async_trait;

use crate::domain::dialogue::SlotCandidate;
use crate::domain::schema::SlotSchema;

/// Port for slot extraction backends.
///
/// Implementations must never error on unparseable text; an empty vec is
/// the correct answer for an utterance with nothing extractable. A
/// candidate is marked `explicit` only when the phrasing clearly targets
/// the slot by name, which is what permits overwriting an already-valid
/// value.
#[async_trait]
pub trait SlotExtractor: Send + Sync {
    async fn extract(&self, text: &str, schema: &SlotSchema) -> Vec<SlotCandidate>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_extractor_is_object_safe() {
        fn _accepts_dyn(_extractor: &dyn SlotExtractor) {}
    }
}
