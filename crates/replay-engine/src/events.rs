//! Asynchronous event queue.
//!
//! Device work that would normally run whenever the host gets to it is
//! instead pinned to an instruction count:
//!
//! ```text
//!   RECORD                                PLAY
//!   ──────                                ────
//!   add_event ─▶ queue                    add_event ─▶ queue (id kinds)
//!                  │                                     │
//!   async_events: save ─▶ log ─▶ run      async_events: log ASYNC+k ─▶ match id ─▶ run
//!                                                         └─ data kinds built from log
//! ```
//!
//! Bottom halves and block completions are matched by id between the log
//! and the queue. Input, character reads and network packets carry their
//! payload in the log, so replay rebuilds them and live ones are dropped.

use crate::channels::chardev::CharDriverId;
use crate::channels::net::NetFilterId;
use crate::config::ReplayMode;
use crate::context::Session;
use crate::error::fatal;
use log::trace;
use replay_log::{AsyncEventKind, AsyncRecord, InputEvent, Record};
use std::fmt;

/// Deferred work run with the replay lock held.
pub type EventCallback = Box<dyn FnOnce(&mut Session<'_>) + Send>;

/// What a queued event carries.
pub enum EventPayload {
    Bh(EventCallback),
    BhOneshot(EventCallback),
    Input(InputEvent),
    InputSync,
    CharRead { driver: CharDriverId, data: Vec<u8> },
    Block(EventCallback),
    Net {
        filter: NetFilterId,
        flags: u32,
        data: Vec<u8>,
    },
}

impl fmt::Debug for EventPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bh(_) => f.write_str("Bh"),
            Self::BhOneshot(_) => f.write_str("BhOneshot"),
            Self::Input(ev) => f.debug_tuple("Input").field(ev).finish(),
            Self::InputSync => f.write_str("InputSync"),
            Self::CharRead { driver, data } => f
                .debug_struct("CharRead")
                .field("driver", driver)
                .field("len", &data.len())
                .finish(),
            Self::Block(_) => f.write_str("Block"),
            Self::Net {
                filter,
                flags,
                data,
            } => f
                .debug_struct("Net")
                .field("filter", filter)
                .field("flags", flags)
                .field("len", &data.len())
                .finish(),
        }
    }
}

/// A queued asynchronous event.
#[derive(Debug)]
pub struct Event {
    pub payload: EventPayload,
    /// Correlation id for bottom halves and block requests; zero otherwise.
    pub id: u64,
}

impl Event {
    pub fn kind(&self) -> AsyncEventKind {
        match self.payload {
            EventPayload::Bh(_) => AsyncEventKind::Bh,
            EventPayload::BhOneshot(_) => AsyncEventKind::BhOneshot,
            EventPayload::Input(_) => AsyncEventKind::Input,
            EventPayload::InputSync => AsyncEventKind::InputSync,
            EventPayload::CharRead { .. } => AsyncEventKind::CharRead,
            EventPayload::Block(_) => AsyncEventKind::Block,
            EventPayload::Net { .. } => AsyncEventKind::Net,
        }
    }

    fn to_record(&self) -> AsyncRecord {
        let id = self.id;
        match &self.payload {
            EventPayload::Bh(_) => AsyncRecord::Bh { id },
            EventPayload::BhOneshot(_) => AsyncRecord::BhOneshot { id },
            EventPayload::Input(ev) => AsyncRecord::Input(ev.clone()),
            EventPayload::InputSync => AsyncRecord::InputSync,
            EventPayload::CharRead { driver, data } => AsyncRecord::CharRead {
                driver: driver.0,
                data: data.clone(),
            },
            EventPayload::Block(_) => AsyncRecord::Block { id },
            EventPayload::Net {
                filter,
                flags,
                data,
            } => AsyncRecord::Net {
                filter: filter.0,
                flags: *flags,
                data: data.clone(),
            },
        }
    }

    /// Rebuild a data-carrying event from its log record.
    fn from_record(record: AsyncRecord) -> Option<Self> {
        let payload = match record {
            AsyncRecord::Input(ev) => EventPayload::Input(ev),
            AsyncRecord::InputSync => EventPayload::InputSync,
            AsyncRecord::CharRead { driver, data } => EventPayload::CharRead {
                driver: CharDriverId(driver),
                data,
            },
            AsyncRecord::Net {
                filter,
                flags,
                data,
            } => EventPayload::Net {
                filter: NetFilterId(filter),
                flags,
                data,
            },
            AsyncRecord::Bh { .. } | AsyncRecord::BhOneshot { .. } | AsyncRecord::Block { .. } => {
                return None
            }
        };
        Some(Self { payload, id: 0 })
    }
}

impl Session<'_> {
    // ─── Queue control ──────────────────────────────────────────────

    pub fn enable_events(&mut self) {
        if self.core.mode != ReplayMode::None {
            self.core.events_enabled = true;
        }
    }

    /// Stop queuing and run whatever is still queued.
    pub fn disable_events(&mut self) {
        if self.core.mode != ReplayMode::None {
            self.core.events_enabled = false;
            self.flush_events();
        }
    }

    pub fn events_enabled(&self) -> bool {
        self.core.events_enabled && self.core.mode != ReplayMode::None
    }

    pub fn has_events(&self) -> bool {
        !self.core.events.is_empty()
    }

    pub fn queued_events(&self) -> usize {
        self.core.events.len()
    }

    /// Run every queued event in order without logging it.
    pub fn flush_events(&mut self) {
        if self.core.mode == ReplayMode::None {
            return;
        }
        while let Some(event) = self.core.events.pop_front() {
            self.run_event(event);
        }
    }

    // ─── Adding ─────────────────────────────────────────────────────

    /// Queue an event, or run it now if events are not being captured.
    pub fn add_event(&mut self, payload: EventPayload, id: u64) {
        let event = Event { payload, id };
        if self.core.tape.is_none() || !self.events_enabled() {
            self.run_event(event);
            return;
        }
        trace!("replay: queue {} id {}", event.kind(), event.id);
        self.core.events.push_back(event);
        self.ctx.hooks.kick_vcpu();
    }

    /// Schedule a bottom half; its id is the raw instruction count.
    pub fn bh_schedule_event(&mut self, callback: EventCallback) {
        let id = self.ctx.icount_raw();
        self.add_event(EventPayload::Bh(callback), id);
    }

    pub fn bh_schedule_oneshot_event(&mut self, callback: EventCallback) {
        let id = self.ctx.icount_raw();
        self.add_event(EventPayload::BhOneshot(callback), id);
    }

    // ─── Processing ─────────────────────────────────────────────────

    /// Process async events at an instruction boundary: save and run the
    /// queue when recording, run what the log says is due when replaying.
    ///
    /// # Panics
    ///
    /// If called again from inside an event it is running.
    pub fn async_events(&mut self) {
        assert!(
            !self.core.processing_async,
            "replay: async event processing re-entered"
        );
        self.core.processing_async = true;
        self.save_instructions();
        match self.core.mode {
            ReplayMode::Record => self.save_events(),
            ReplayMode::Play => self.read_events(),
            ReplayMode::None => {}
        }
        self.core.processing_async = false;
    }

    /// RECORD: log then run every queued event, oldest first.
    pub fn save_events(&mut self) {
        while let Some(event) = self.core.events.pop_front() {
            self.put(&Record::Async(event.to_record()));
            self.run_event(event);
        }
    }

    /// PLAY: run events while the log's pending record is an async event
    /// that can be satisfied.
    ///
    /// An id-matched record whose event has not been scheduled yet stops
    /// the loop; its id stays cached until the event shows up.
    pub fn read_events(&mut self) {
        loop {
            let record = match &self.core.state.pending {
                Some(Record::Async(record)) => record.clone(),
                _ => break,
            };
            let event = if record.kind().matched_by_id() {
                let kind = record.kind();
                let id = record.id().unwrap_or_default();
                self.core.state.read_event_id = Some(id);
                let Some(pos) = self
                    .core
                    .events
                    .iter()
                    .position(|e| e.kind() == kind && e.id == id)
                else {
                    trace!("replay: {kind} id {id} not scheduled yet");
                    break;
                };
                self.core.events.remove(pos)
            } else {
                Event::from_record(record)
            };
            let Some(event) = event else {
                fatal("Replay: async event could not be rebuilt from the log");
            };

            self.finish_event();
            self.core.state.read_event_id = None;
            self.run_event(event);
        }
    }

    pub(crate) fn run_event(&mut self, event: Event) {
        let ctx = self.ctx;
        match event.payload {
            EventPayload::Bh(cb) | EventPayload::BhOneshot(cb) | EventPayload::Block(cb) => {
                cb(self)
            }
            EventPayload::Input(ev) => {
                if let Some(sink) = &ctx.input {
                    sink.send(&ev);
                }
            }
            EventPayload::InputSync => {
                if let Some(sink) = &ctx.input {
                    sink.sync();
                }
            }
            EventPayload::CharRead { driver, data } => match ctx.chars.get(driver.0) {
                Some(backend) => backend.be_write(&data),
                None => fatal(format_args!("Replay: unknown character driver {}", driver.0)),
            },
            EventPayload::Net {
                filter,
                flags,
                data,
            } => match ctx.nets.get(filter.0) {
                Some(next) => next.pass_to_next(flags, &data),
                None => fatal(format_args!("Replay: unknown network filter {}", filter.0)),
            },
        }
    }
}
