//! Deterministic record/replay engine.
//!
//! Records every source of nondeterminism a virtual machine meets while it
//! runs (instruction-count gaps, interrupts, exceptions, shutdown requests,
//! async device callbacks, clock reads, random draws, character, network
//! and audio traffic) into an ordered log, and replays that log against the
//! same initial machine state to reproduce the run exactly.
//!
//! # Architecture
//!
//! ```text
//!    vCPU thread                              I/O thread
//!    ───────────                              ──────────
//!    get_instructions() ──▶ run N insns       timers, chardev, net, audio
//!    advance_current_icount()                 add_event() ──▶ queue
//!    interrupt() / exception()                clock() / guest_getrandom()
//!    async_events() ◀── kicked ─────────────────┘
//!              │                                  │
//!              └────────── Session (ticket lock) ─┘
//!                               │
//!                       ReplayCore: ReplayState + queue + tape
//!                               │
//!                       replay-log: Record ⇄ bytes
//! ```
//!
//! Every operation runs on a [`Session`], obtained from
//! [`ReplayContext::lock`]. The ticket lock serves threads in arrival order
//! and the log decides what happens when.
//!
//! # Failure model
//!
//! Setup errors are returned as [`ReplayError`]. Once running, any mismatch
//! between the log and live execution is fatal: it is logged and the
//! process panics (and aborts in release builds). Write failures while
//! recording only degrade the recording and are reported once.
//!
//! # Example
//!
//! ```
//! use replay_engine::{ReplayConfig, ReplayContext};
//! use replay_log::CheckpointId;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("vm.rr");
//! let icount = Arc::new(AtomicU64::new(0));
//!
//! let source = Arc::clone(&icount);
//! let ctx = ReplayContext::builder(
//!     ReplayConfig::record(&path),
//!     Arc::new(move || source.load(Ordering::SeqCst)),
//! )
//! .build()
//! .unwrap();
//! ctx.start().unwrap();
//! icount.store(500, Ordering::SeqCst);
//! assert!(ctx.lock().checkpoint(CheckpointId::ClockVirtual));
//! ctx.finish();
//!
//! icount.store(0, Ordering::SeqCst);
//! let source = Arc::clone(&icount);
//! let ctx = ReplayContext::builder(
//!     ReplayConfig::play(&path),
//!     Arc::new(move || source.load(Ordering::SeqCst)),
//! )
//! .build()
//! .unwrap();
//! ctx.start().unwrap();
//! let mut session = ctx.lock();
//! assert_eq!(session.get_instructions(), 500);
//! assert!(!session.checkpoint(CheckpointId::ClockVirtual));
//! ```

pub mod channels;
pub mod checkpoint;
pub mod config;
pub mod context;
pub mod debugger;
pub mod error;
pub mod events;
pub mod icount;
pub mod mutex;
pub mod snapshot;
pub mod state;
pub mod tape;
pub mod verified;

mod registry;
#[cfg(test)]
mod test_util;

pub use channels::chardev::{CharBackend, CharDriverId};
pub use channels::input::InputSink;
pub use channels::net::{NetFilter, NetFilterId};
pub use config::{ConfigError, ReplayConfig, ReplayMode};
pub use context::{IcountSource, MachineHooks, ReplayContext, ReplayContextBuilder, Session};
pub use debugger::{GuestRunner, ReplayDebugger};
pub use error::ReplayError;
pub use events::{Event, EventCallback, EventPayload};
pub use snapshot::{ReplaySnapshot, SnapshotInfo, SnapshotStore};
pub use state::ReplayState;
pub use tape::{LogSink, LogSource};
