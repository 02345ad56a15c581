//! Synchronous rendezvous: exceptions, interrupts, shutdown requests and
//! named checkpoints.
//!
//! Each returns whether the caller may proceed. Recording always proceeds
//! (after logging); replay proceeds only when the log says this event
//! happens now.

use crate::config::ReplayMode;
use crate::context::Session;
use log::debug;
use replay_log::{CheckpointId, Record, RecordKind, ShutdownCause};

impl Session<'_> {
    /// Whether a pending exception may be delivered.
    pub fn exception(&mut self) -> bool {
        self.rendezvous(Record::Exception)
    }

    /// PLAY: whether an exception is due, without consuming it.
    pub fn has_exception(&mut self) -> bool {
        self.peek_due(RecordKind::Exception)
    }

    /// Whether a pending interrupt may be delivered.
    pub fn interrupt(&mut self) -> bool {
        self.rendezvous(Record::Interrupt)
    }

    pub fn has_interrupt(&mut self) -> bool {
        self.peek_due(RecordKind::Interrupt)
    }

    /// RECORD: log a shutdown request so replay raises it at the same
    /// point.
    pub fn shutdown_request(&mut self, cause: ShutdownCause) {
        if self.is_recording() {
            debug!("replay: record shutdown ({cause})");
            self.put(&Record::Shutdown(cause));
        }
    }

    /// Pass checkpoint `id`.
    ///
    /// PLAY returns `false` without consuming anything when the log's
    /// next event is something else; the caller retries later.
    pub fn checkpoint(&mut self, id: CheckpointId) -> bool {
        self.save_instructions();
        match self.core.mode {
            ReplayMode::Play if self.core.tape.is_some() => {
                if self.next_event_is(RecordKind::Checkpoint(id)) {
                    self.finish_event();
                    true
                } else {
                    false
                }
            }
            ReplayMode::Record if self.core.tape.is_some() => {
                self.put(&Record::Checkpoint(id));
                true
            }
            _ => true,
        }
    }

    /// PLAY: whether some checkpoint is due once the instructions already
    /// executed are accounted. Always false outside PLAY.
    pub fn has_checkpoint(&mut self) -> bool {
        if !self.is_playing() {
            return false;
        }
        self.account_executed_instructions();
        matches!(
            self.core.state.data_kind(),
            Some(RecordKind::Checkpoint(_))
        )
    }

    fn rendezvous(&mut self, record: Record) -> bool {
        if self.is_recording() {
            self.save_instructions();
            self.put(&record);
            true
        } else if self.is_playing() {
            let due = self.peek_due(record.kind());
            if due {
                self.finish_event();
            }
            due
        } else {
            true
        }
    }

    fn peek_due(&mut self, kind: RecordKind) -> bool {
        if !self.is_playing() {
            return false;
        }
        self.account_executed_instructions();
        self.next_event_is(kind)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_util::{passthrough, player, player_with, recorder, Icount, Probe, SharedLog};
    use replay_log::{CheckpointId, RecordKind, ShutdownCause};
    use std::sync::Arc;

    #[test]
    fn mismatched_checkpoint_consumes_nothing() {
        let icount = Icount::default();
        let log = SharedLog::default();
        let ctx = recorder(&icount, &log);
        assert!(ctx.lock().checkpoint(CheckpointId::ClockVirtual));
        ctx.finish();

        let ctx = player(&icount, log.bytes());
        let mut s = ctx.lock();
        let offset = s.snapshot().state.file_offset;
        assert!(s.has_checkpoint());

        assert!(!s.checkpoint(CheckpointId::ClockHost));
        assert_eq!(
            s.state().data_kind(),
            Some(RecordKind::Checkpoint(CheckpointId::ClockVirtual))
        );
        assert_eq!(s.snapshot().state.file_offset, offset);

        assert!(s.checkpoint(CheckpointId::ClockVirtual));
        assert!(!s.has_checkpoint());
    }

    #[test]
    fn checkpoint_is_seen_once_the_budget_is_spent() {
        let icount = Icount::default();
        let log = SharedLog::default();
        let ctx = recorder(&icount, &log);
        icount.set(100);
        assert!(ctx.lock().checkpoint(CheckpointId::ClockVirtual));
        ctx.finish();

        icount.set(0);
        let ctx = player(&icount, log.bytes());
        let mut s = ctx.lock();
        assert_eq!(s.get_instructions(), 100);
        assert!(!s.has_checkpoint());

        // The vCPU ran the whole budget but nothing accounted it yet.
        icount.set(100);
        assert!(s.has_checkpoint());
        assert_eq!(s.current_icount(), 100);
        assert!(s.checkpoint(CheckpointId::ClockVirtual));
    }

    #[test]
    fn exception_is_peeked_then_consumed() {
        let icount = Icount::default();
        let log = SharedLog::default();
        let ctx = recorder(&icount, &log);
        icount.set(10);
        assert!(ctx.lock().exception());
        ctx.finish();

        icount.set(0);
        let ctx = player(&icount, log.bytes());
        let mut s = ctx.lock();
        assert!(!s.has_exception());
        icount.set(10);
        assert!(s.has_exception());
        assert!(s.has_exception(), "peeking does not consume");
        assert!(s.exception());
        assert!(!s.exception());
    }

    #[test]
    fn shutdowns_are_replayed_wherever_they_appear() {
        let icount = Icount::default();
        let log = SharedLog::default();
        let ctx = recorder(&icount, &log);
        ctx.lock().shutdown_request(ShutdownCause::GuestPanic);
        ctx.finish();

        let probe = Arc::new(Probe::default());
        let hooks = Arc::clone(&probe);
        let ctx = player_with(&icount, log.bytes(), move |b| {
            b.hooks(hooks);
        });
        assert!(!ctx.lock().interrupt());
        assert_eq!(
            *probe.shutdowns.lock().unwrap(),
            vec![ShutdownCause::GuestPanic, ShutdownCause::HostSignal]
        );
        assert_eq!(ctx.lock().state().data_kind(), Some(RecordKind::End));
    }

    #[test]
    fn passthrough_always_proceeds() {
        let icount = Icount::default();
        let ctx = passthrough(&icount);
        let mut s = ctx.lock();
        assert!(s.checkpoint(CheckpointId::Init));
        assert!(!s.has_checkpoint());
        assert!(s.interrupt());
        assert!(s.exception());
        assert!(!s.has_exception());
        assert!(!s.has_interrupt());
    }
}
