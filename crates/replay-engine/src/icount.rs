//! Instruction-count accounting.
//!
//! The instruction count is the log's timeline. Recording turns the gap
//! between two nondeterministic events into an `INSTRUCTION(delta)` record;
//! replay turns that record back into a budget the vCPU may execute before
//! the next event is due.

use crate::context::Session;
use crate::error::fatal;
use crate::verified::{clip_to_break, icount_delta};
use log::debug;
use replay_log::{Record, RecordKind};

impl Session<'_> {
    pub fn current_icount(&self) -> u64 {
        self.core.state.current_icount
    }

    /// Move the accounted instruction count to `target`.
    ///
    /// RECORD logs the delta. PLAY spends it from the current budget; when
    /// the budget reaches zero the `INSTRUCTION` record is consumed and the
    /// I/O thread is woken.
    pub fn advance_current_icount(&mut self, target: u64) {
        let current = self.core.state.current_icount;
        let Some(delta) = icount_delta(current, target) else {
            fatal(format_args!(
                "Replay: instruction count moved backwards ({current} -> {target})"
            ));
        };
        if delta == 0 {
            return;
        }

        if self.is_recording() {
            // Gaps wider than one record carries are split; replay fetches
            // each piece as a fresh budget.
            let mut remaining = delta;
            while remaining > 0 {
                let piece = u32::try_from(remaining).unwrap_or(u32::MAX);
                self.put(&Record::Instruction(piece));
                remaining -= u64::from(piece);
            }
            self.core.state.current_icount = target;
        } else if self.is_playing() {
            let budget = u64::from(self.core.state.instruction_count);
            if delta > budget {
                fatal(format_args!(
                    "Replay: executed {delta} instructions with a budget of {budget}"
                ));
            }
            self.core.state.instruction_count -= delta as u32;
            self.core.state.current_icount = target;
            if self.core.state.instruction_count == 0 {
                if self.core.state.data_kind() != Some(RecordKind::Instruction) {
                    fatal("Replay: instruction budget spent without an instruction record");
                }
                self.finish_event();
                self.ctx.hooks.notify_io_thread();
            }
        } else {
            self.core.state.current_icount = target;
        }

        if self.core.break_icount == Some(target) {
            debug!("replay: break at icount {target}");
            self.ctx.hooks.break_reached(target);
        }
    }

    /// RECORD: log the instructions executed since the last record.
    pub fn save_instructions(&mut self) {
        if self.is_recording() {
            let raw = self.ctx.icount_raw();
            self.advance_current_icount(raw);
        }
    }

    /// PLAY: account instructions executed against the pending budget.
    pub fn account_executed_instructions(&mut self) {
        if self.is_playing() && self.core.state.instruction_count > 0 {
            let raw = self.ctx.icount_raw();
            self.advance_current_icount(raw);
        }
    }

    /// PLAY: how many instructions may run before the next event, clipped
    /// to a pending breakpoint. Zero when an event is due now.
    pub fn get_instructions(&mut self) -> u32 {
        if !self.next_event_is(RecordKind::Instruction) {
            return 0;
        }
        clip_to_break(
            self.core.state.current_icount,
            self.core.state.instruction_count,
            self.core.break_icount,
        )
    }

    /// Stop execution when the instruction count reaches `icount`.
    ///
    /// # Panics
    ///
    /// If `icount` is behind the current instruction count.
    pub fn set_break(&mut self, icount: u64) {
        assert!(
            icount >= self.core.state.current_icount,
            "replay: break at {icount} is behind icount {}",
            self.core.state.current_icount
        );
        debug!("replay: break set at icount {icount}");
        self.core.break_icount = Some(icount);
    }

    pub fn delete_break(&mut self) {
        self.core.break_icount = None;
    }

    pub fn break_icount(&self) -> Option<u64> {
        self.core.break_icount
    }
}
