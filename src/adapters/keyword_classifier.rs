//! Keyword-scoring intent classifier.
//!
//! The built-in fallback backend: deterministic phrase scoring with no
//! model calls. Hosted-model backends implement the same port and can be
//! swapped in without touching the dialogue machine.

use async_trait::async_trait;

use crate::domain::intent::Intent;
use crate::ports::{Classification, IntentClassifier};

/// Phrase table for one intent. Multi-word phrases score double because
/// they are far stronger signals than single words.
const PHRASES: [(Intent, &[&str]); 4] = [
    (
        Intent::RequestTimeOff,
        &[
            "time off", "day off", "days off", "out of office", "sick day", "take leave",
            "vacation", "leave", "pto",
        ],
    ),
    (
        Intent::ScheduleMeeting,
        &[
            "schedule a meeting", "set up a meeting", "book a room", "calendar invite",
            "meeting", "schedule", "invite", "sync",
        ],
    ),
    (
        Intent::SubmitItTicket,
        &[
            "it ticket", "not working", "help desk", "reset my password", "laptop", "computer",
            "vpn", "wifi", "printer", "password", "broken", "ticket",
        ],
    ),
    (
        Intent::FileMedicalClaim,
        &[
            "medical claim", "file a claim", "doctor", "clinic", "insurance", "reimburse",
            "reimbursement", "claim", "medical",
        ],
    ),
];

const CHAT_MARKERS: [&str; 7] = [
    "hello", "hi there", "hey", "thanks", "thank you", "good morning", "how are you",
];

/// Deterministic keyword classifier.
///
/// Never errors: text that matches nothing classifies as `Unknown`, or
/// `GeneralChat` when it only carries small talk.
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn score(text: &str, phrases: &[&str]) -> u32 {
        phrases
            .iter()
            .filter(|phrase| text.contains(*phrase))
            .map(|phrase| if phrase.contains(' ') { 2 } else { 1 })
            .sum()
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Classification {
        let lowered = text.to_lowercase();

        let mut best: Option<(Intent, u32)> = None;
        // Iteration order is fixed, so ties resolve deterministically to
        // the earlier intent in the table.
        for (intent, phrases) in PHRASES {
            let score = Self::score(&lowered, phrases);
            if score > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((intent, score));
            }
        }

        if let Some((intent, score)) = best {
            let confidence = (0.5 + 0.1 * score as f32).min(0.95);
            return Classification::new(intent, confidence);
        }

        if CHAT_MARKERS.iter().any(|m| lowered.contains(m)) {
            return Classification::new(Intent::GeneralChat, 0.6);
        }

        Classification::unknown()
    }
}
