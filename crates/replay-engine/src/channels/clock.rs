//! Host clock reads.
//!
//! A replayed clock only changes where the recording read it. Between
//! those points readers see the last replayed value.

use crate::context::Session;
use crate::error::fatal;
use replay_log::{ClockKind, Record, RecordKind};

impl Session<'_> {
    /// RECORD: log `value` as the reading of `kind` at `raw_icount`.
    pub fn save_clock(&mut self, kind: ClockKind, value: i64, raw_icount: u64) -> i64 {
        self.advance_current_icount(raw_icount);
        self.put(&Record::Clock { kind, value });
        value
    }

    /// PLAY: the clock reading of `kind` at `raw_icount`.
    pub fn read_clock(&mut self, kind: ClockKind, raw_icount: u64) -> i64 {
        self.advance_current_icount(raw_icount);
        if self.next_event_is(RecordKind::Clock(kind)) {
            match self.finish_event() {
                Record::Clock { kind: read, value } if read == kind => {
                    self.core.state.cached_clock[kind.index() as usize] = value;
                }
                other => fatal(format_args!("Replay: expected {kind} clock, got {}", other.kind())),
            }
        }
        self.core.state.cached_clock(kind)
    }

    /// Read clock `kind` through the log: `live` supplies the host value
    /// when it is needed.
    pub fn clock<F>(&mut self, kind: ClockKind, live: F) -> i64
    where
        F: FnOnce() -> i64,
    {
        if self.is_playing() {
            let raw = self.ctx.icount_raw();
            self.read_clock(kind, raw)
        } else if self.is_recording() {
            let raw = self.ctx.icount_raw();
            self.save_clock(kind, live(), raw)
        } else {
            live()
        }
    }
}
