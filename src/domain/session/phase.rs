//! Dialogue lifecycle phases.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

/// Phase of a dialogue session.
///
/// `Init` exists only at session creation and is never re-entered.
/// `Completed`, `Abandoned`, and `Failed` are terminal: nothing but
/// archival happens after them. The single path to a side effect is
/// `ReadyToExecute -> Executing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialoguePhase {
    Init,
    DetectingIntent,
    Collecting,
    Confirming,
    ReadyToExecute,
    Executing,
    Completed,
    Abandoned,
    Failed,
}

impl DialoguePhase {
    /// Short label for logs and hand-off messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Init => "new",
            Self::DetectingIntent => "detecting intent",
            Self::Collecting => "collecting details",
            Self::Confirming => "confirming a detail",
            Self::ReadyToExecute => "ready to submit",
            Self::Executing => "submitting",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
            Self::Failed => "failed",
        }
    }

    /// True for phases a user turn can still advance.
    pub fn accepts_turns(&self) -> bool {
        !self.is_terminal()
    }
}

impl Default for DialoguePhase {
    fn default() -> Self {
        Self::Init
    }
}

impl StateMachine for DialoguePhase {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use DialoguePhase::*;
        match self {
            Init => vec![DetectingIntent, Abandoned, Failed],
            DetectingIntent => vec![Collecting, Completed, Abandoned, Failed],
            Collecting => vec![Confirming, ReadyToExecute, Abandoned, Failed],
            Confirming => vec![Collecting, Abandoned, Failed],
            ReadyToExecute => vec![Executing, Abandoned, Failed],
            Executing => vec![Completed, ReadyToExecute, Failed, Abandoned],
            Completed | Abandoned | Failed => vec![],
        }
    }
}
