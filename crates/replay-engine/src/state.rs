//! Serializable replay position.
//!
//! [`ReplayState`] is everything needed to resume a session from a VM
//! snapshot: where the log cursor is, what it has peeked, and the counters
//! that tie the log to guest execution.

use replay_log::{ClockKind, Record, RecordKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayState {
    /// Guest instructions accounted so far.
    pub current_icount: u64,
    /// PLAY: instructions left before the next non-instruction record.
    pub instruction_count: u32,
    /// PLAY: the record fetched from the log but not yet consumed.
    pub pending: Option<Record>,
    /// Number of `INSTRUCTION` records fetched.
    pub current_event: u64,
    /// Last value replayed for each clock kind.
    pub cached_clock: [i64; ClockKind::COUNT as usize],
    /// Log offset captured when the state was saved.
    pub file_offset: u64,
    /// Next block-request correlation id.
    pub block_request_id: u64,
    /// Host clock at the last save, kept for the icount warp logic.
    pub host_clock_last: u64,
    /// PLAY: id of the id-matched async record waiting for its event.
    pub read_event_id: Option<u64>,
}

impl ReplayState {
    /// Kind of the pending record, if any.
    pub fn data_kind(&self) -> Option<RecordKind> {
        self.pending.as_ref().map(Record::kind)
    }

    pub fn has_unread_data(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cached_clock(&self, kind: ClockKind) -> i64 {
        self.cached_clock[kind.index() as usize]
    }
}
