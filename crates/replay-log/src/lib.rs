//! Wire format for deterministic record/replay logs.
//!
//! A replay log is a single sequential file: a 12-byte header followed by a
//! stream of tagged records. The recorder appends records as it meets
//! nondeterministic inputs (instruction-count deltas, interrupts, async
//! device events, clock reads, random draws, character and network I/O,
//! audio timing); the player reads them back in the same order.
//!
//! # Layout
//!
//! ```text
//! ┌──────────────┬─────────────────────────────────────────────┐
//! │ u32 version  │ u64 reserved                                │  header
//! ├──────┬───────┴─────────────────────────────────────────────┤
//! │ tag  │ payload (shape depends on tag)                      │  record
//! ├──────┼─────────────────────────────────────────────────────┤
//! │ tag  │ ...                                                 │
//! └──────┴─────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are big-endian. Arrays are a dword length followed by bytes.
//!
//! # Example
//!
//! ```
//! use replay_log::{LogReader, LogWriter, Record};
//! use std::io::Cursor;
//!
//! let mut w = LogWriter::create(Cursor::new(Vec::new()));
//! Record::Instruction(100).encode(&mut w);
//! Record::End.encode(&mut w);
//! w.finalize();
//!
//! let mut r = LogReader::open(Cursor::new(w.into_inner().into_inner())).unwrap();
//! assert_eq!(Record::decode(&mut r).unwrap(), Record::Instruction(100));
//! assert_eq!(Record::decode(&mut r).unwrap(), Record::End);
//! ```

pub mod codec;
pub mod error;
pub mod input;
pub mod kind;
pub mod record;

pub use codec::{LogReader, LogWriter};
pub use error::LogError;
pub use input::{InputEvent, KeyValue};
pub use kind::{AsyncEventKind, CheckpointId, ClockKind, RecordKind, ShutdownCause};
pub use record::{AsyncRecord, AudioFrame, Record};

/// Log format version. Bumped whenever the tag space or a payload changes.
pub const REPLAY_VERSION: u32 = 0x00e0_200c;

/// Bytes before the first record: version dword plus reserved qword.
pub const HEADER_SIZE: u64 = 4 + 8;
