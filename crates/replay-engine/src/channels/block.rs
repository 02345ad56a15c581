//! Block-layer request completions.
//!
//! Completions can finish in any order on the host, so each request gets a
//! session-unique id that the log uses to pin its completion to an
//! instruction count.

use crate::context::Session;
use crate::events::{EventCallback, EventPayload};

impl Session<'_> {
    /// Id for the next block request, or 0 when events are not captured.
    pub fn block_next_id(&mut self) -> u64 {
        if !self.events_enabled() {
            return 0;
        }
        let id = self.core.state.block_request_id;
        self.core.state.block_request_id += 1;
        id
    }

    /// Completion of request `id`.
    pub fn block_event(&mut self, callback: EventCallback, id: u64) {
        self.add_event(EventPayload::Block(callback), id);
    }
}

#[cfg(test)]
mod tests {
    use crate::test_util::{passthrough, player, recorder, Icount, SharedLog};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn ids_are_sequential_while_capturing() {
        let icount = Icount::default();
        let log = SharedLog::default();
        let ctx = recorder(&icount, &log);
        let mut s = ctx.lock();
        assert_eq!(s.block_next_id(), 0);
        assert_eq!(s.block_next_id(), 1);
        assert_eq!(s.block_next_id(), 2);

        let ctx = passthrough(&icount);
        let mut s = ctx.lock();
        assert_eq!(s.block_next_id(), 0);
        assert_eq!(s.block_next_id(), 0);
    }

    #[test]
    fn completion_is_replayed_by_id() {
        let icount = Icount::default();
        let log = SharedLog::default();
        let ctx = recorder(&icount, &log);
        {
            let mut s = ctx.lock();
            let first = s.block_next_id();
            let second = s.block_next_id();
            // The host finished the second request first.
            s.block_event(Box::new(|_| {}), second);
            s.block_event(Box::new(|_| {}), first);
            s.async_events();
        }
        ctx.finish();

        let ctx = player(&icount, log.bytes());
        let mut s = ctx.lock();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for id in [s.block_next_id(), s.block_next_id()] {
            let order = Arc::clone(&order);
            s.block_event(Box::new(move |_| order.lock().unwrap().push(id)), id);
        }
        s.async_events();
        assert_eq!(*order.lock().unwrap(), vec![1, 0]);

        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        drop(s);
        drop(ctx);
        let ctx = passthrough(&icount);
        ctx.lock()
            .block_event(Box::new(move |_| flag.store(true, Ordering::SeqCst)), 0);
        assert!(done.load(Ordering::SeqCst));
    }
}
