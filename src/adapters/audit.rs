//! Tracing-backed audit sink.
//!
//! Emits every record as a structured tracing event and keeps a bounded
//! in-memory ring for inspection. Recording never blocks and never fails
//! the turn that produced the record.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::session::AuditRecord;
use crate::ports::AuditSink;

/// Default ring capacity when none is configured.
pub const DEFAULT_AUDIT_CAPACITY: usize = 256;

/// Audit sink that logs via `tracing` and buffers recent records.
///
/// The ring drops the oldest record when full; audit is best-effort by
/// contract.
#[derive(Debug)]
pub struct TracingAuditSink {
    capacity: usize,
    buffer: Mutex<VecDeque<AuditRecord>>,
}

impl TracingAuditSink {
    /// Creates a sink with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    /// Creates a sink retaining at most `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            buffer: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Creates a sink sized by configuration.
    pub fn from_config(config: &crate::config::AuditConfig) -> Self {
        Self::with_capacity(config.buffer_capacity)
    }

    /// Snapshot of buffered records, oldest first.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.buffer
            .lock()
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Buffered records of one event type.
    pub fn records_of_type(&self, event_type: &str) -> Vec<AuditRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.event_type() == event_type)
            .collect()
    }

    /// Number of buffered records.
    pub fn len(&self) -> usize {
        self.buffer.lock().map(|buffer| buffer.len()).unwrap_or(0)
    }

    /// True when nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TracingAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        tracing::info!(
            event = record.event_type(),
            session = %record.session_id,
            turn = record.turn,
            "audit"
        );

        // A poisoned buffer loses the record rather than the turn.
        if let Ok(mut buffer) = self.buffer.lock() {
            if buffer.len() == self.capacity {
                buffer.pop_front();
            }
            buffer.push_back(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::SessionId;
    use crate::domain::session::{AuditDetail, DialoguePhase};

    fn record(turn: u32) -> AuditRecord {
        AuditRecord::new(
            SessionId::new("s-1").unwrap(),
            turn,
            AuditDetail::PhaseChanged {
                from: DialoguePhase::Init,
                to: DialoguePhase::DetectingIntent,
            },
        )
    }

    #[test]
    fn records_are_buffered_in_order() {
        let sink = TracingAuditSink::new();
        sink.record(record(1));
        sink.record(record(2));

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].turn, 1);
        assert_eq!(records[1].turn, 2);
    }

    #[test]
    fn ring_drops_oldest_when_full() {
        let sink = TracingAuditSink::with_capacity(2);
        sink.record(record(1));
        sink.record(record(2));
        sink.record(record(3));

        let turns: Vec<u32> = sink.records().iter().map(|r| r.turn).collect();
        assert_eq!(turns, vec![2, 3]);
    }

    #[test]
    fn filters_by_event_type() {
        let sink = TracingAuditSink::new();
        sink.record(record(1));
        assert_eq!(sink.records_of_type("dialogue.phase_changed").len(), 1);
        assert!(sink.records_of_type("dialogue.slot_written").is_empty());
    }

    #[test]
    fn record_all_flushes_a_batch() {
        let sink = TracingAuditSink::new();
        sink.record_all(vec![record(1), record(2), record(3)]);
        assert_eq!(sink.len(), 3);
    }
}
