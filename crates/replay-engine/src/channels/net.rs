//! Network packets passing a replay filter.

use crate::context::Session;
use crate::events::EventPayload;
use serde::{Deserialize, Serialize};

/// Index of a registered network filter, as stored in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetFilterId(pub u8);

/// The rest of the filter chain after the replay filter.
pub trait NetFilter: Send + Sync {
    fn pass_to_next(&self, flags: u32, data: &[u8]);
}

impl Session<'_> {
    /// A packet reached the replay filter.
    ///
    /// Returns how many bytes the filter consumed: RECORD queues the packet
    /// and PLAY drops it (both consume it all); `None` mode consumes
    /// nothing so the packet continues down the chain untouched.
    pub fn net_packet_event(&mut self, filter: NetFilterId, flags: u32, data: &[u8]) -> usize {
        if self.is_playing() {
            return data.len();
        }
        if !self.is_recording() {
            return 0;
        }
        self.add_event(
            EventPayload::Net {
                filter,
                flags,
                data: data.to_vec(),
            },
            0,
        );
        data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{passthrough, player_with, recorder_with, Icount, SharedLog};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Wire {
        frames: Mutex<Vec<(u32, Vec<u8>)>>,
    }

    impl NetFilter for Wire {
        fn pass_to_next(&self, flags: u32, data: &[u8]) {
            self.frames.lock().unwrap().push((flags, data.to_vec()));
        }
    }

    #[test]
    fn filter_consumes_packets_only_under_record_or_play() {
        let icount = Icount::default();
        let log = SharedLog::default();
        let wire = Arc::new(Wire::default());
        let next = Arc::clone(&wire);
        let ctx = recorder_with(&icount, &log, move |b| {
            b.register_net_filter(next).unwrap();
        });
        {
            let mut s = ctx.lock();
            assert_eq!(s.net_packet_event(NetFilterId(0), 3, b"ping"), 4);
            s.async_events();
        }
        ctx.finish();
        assert_eq!(*wire.frames.lock().unwrap(), vec![(3, b"ping".to_vec())]);

        let replayed = Arc::new(Wire::default());
        let next = Arc::clone(&replayed);
        let ctx = player_with(&icount, log.bytes(), move |b| {
            b.register_net_filter(next).unwrap();
        });
        {
            let mut s = ctx.lock();
            assert_eq!(s.net_packet_event(NetFilterId(0), 0, b"live"), 4);
            s.async_events();
        }
        assert_eq!(*replayed.frames.lock().unwrap(), vec![(3, b"ping".to_vec())]);

        let ctx = passthrough(&icount);
        assert_eq!(ctx.lock().net_packet_event(NetFilterId(0), 0, b"x"), 0);
    }
}
