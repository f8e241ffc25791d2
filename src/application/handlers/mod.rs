//! Application handlers: one per engine operation.

mod cancel_session;
mod process_turn;
mod sweep_idle;

pub use cancel_session::{CancelOutcome, CancelSessionCommand, CancelSessionError, CancelSessionHandler};
pub use process_turn::{ProcessTurnCommand, ProcessTurnError, ProcessTurnHandler, TurnOutcome};
pub use sweep_idle::{SweepError, SweepIdleSessionsHandler, SweepReport};
