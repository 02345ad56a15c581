//! The open log behind a session: a writer while recording, a reader while
//! replaying.

use replay_log::{LogReader, LogWriter};
use std::io::{Read, Seek, Write};

/// Storage a recording is written to.
pub trait LogSink: Write + Seek + Send {}
impl<T: Write + Seek + Send> LogSink for T {}

/// Storage a replay is read from.
pub trait LogSource: Read + Seek + Send {}
impl<T: Read + Seek + Send> LogSource for T {}

pub(crate) enum Tape {
    Record(LogWriter<Box<dyn LogSink>>),
    Play(LogReader<Box<dyn LogSource>>),
}

impl Tape {
    pub(crate) fn position(&self) -> u64 {
        match self {
            Self::Record(w) => w.position(),
            Self::Play(r) => r.position(),
        }
    }
}
