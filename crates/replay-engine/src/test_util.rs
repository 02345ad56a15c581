//! In-memory logs and a hand-driven instruction counter for unit tests.

use crate::config::{ReplayConfig, ReplayMode};
use crate::context::{IcountSource, MachineHooks, ReplayContext, ReplayContextBuilder};
use replay_log::{LogReader, Record, ShutdownCause};
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A log buffer that stays readable after the recorder is done with it.
#[derive(Clone, Default)]
pub(crate) struct SharedLog(Arc<Mutex<Cursor<Vec<u8>>>>);

impl SharedLog {
    pub(crate) fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().get_ref().clone()
    }
}

impl Write for SharedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for SharedLog {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.lock().unwrap().seek(pos)
    }
}

/// Instruction counter the test advances by hand.
#[derive(Clone, Default)]
pub(crate) struct Icount(Arc<AtomicU64>);

impl Icount {
    pub(crate) fn set(&self, value: u64) {
        self.0.store(value, Ordering::SeqCst);
    }

    pub(crate) fn source(&self) -> Arc<dyn IcountSource> {
        let counter = Arc::clone(&self.0);
        Arc::new(move || counter.load(Ordering::SeqCst))
    }
}

fn config(mode: ReplayMode) -> ReplayConfig {
    ReplayConfig {
        mode,
        ..ReplayConfig::default()
    }
}

pub(crate) fn recorder_with(
    icount: &Icount,
    log: &SharedLog,
    setup: impl FnOnce(&mut ReplayContextBuilder),
) -> ReplayContext {
    let mut builder = ReplayContext::builder(config(ReplayMode::Record), icount.source());
    builder.log_sink(Box::new(log.clone()));
    setup(&mut builder);
    let ctx = builder.build().unwrap();
    ctx.start().unwrap();
    ctx
}

pub(crate) fn recorder(icount: &Icount, log: &SharedLog) -> ReplayContext {
    recorder_with(icount, log, |_| {})
}

pub(crate) fn player_with(
    icount: &Icount,
    bytes: Vec<u8>,
    setup: impl FnOnce(&mut ReplayContextBuilder),
) -> ReplayContext {
    let mut builder = ReplayContext::builder(config(ReplayMode::Play), icount.source());
    builder.log_source(Box::new(Cursor::new(bytes)));
    setup(&mut builder);
    let ctx = builder.build().unwrap();
    ctx.start().unwrap();
    ctx
}

pub(crate) fn player(icount: &Icount, bytes: Vec<u8>) -> ReplayContext {
    player_with(icount, bytes, |_| {})
}

/// Pass-through context: no log at all.
pub(crate) fn passthrough(icount: &Icount) -> ReplayContext {
    let ctx = ReplayContext::builder(ReplayConfig::default(), icount.source())
        .build()
        .unwrap();
    ctx.start().unwrap();
    ctx
}

/// Every record up to and including END.
pub(crate) fn decode_all(bytes: Vec<u8>) -> Vec<Record> {
    let mut reader = LogReader::open(Cursor::new(bytes)).unwrap();
    let mut records = Vec::new();
    loop {
        let record = Record::decode(&mut reader).unwrap();
        let end = record == Record::End;
        records.push(record);
        if end {
            return records;
        }
    }
}

/// Machine hooks that remember what they were told.
#[derive(Default)]
pub(crate) struct Probe {
    pub(crate) io_wakeups: AtomicUsize,
    pub(crate) kicks: AtomicUsize,
    pub(crate) shutdowns: Mutex<Vec<ShutdownCause>>,
    pub(crate) breaks: Mutex<Vec<u64>>,
}

impl MachineHooks for Probe {
    fn notify_io_thread(&self) {
        self.io_wakeups.fetch_add(1, Ordering::SeqCst);
    }

    fn kick_vcpu(&self) {
        self.kicks.fetch_add(1, Ordering::SeqCst);
    }

    fn shutdown_request(&self, cause: ShutdownCause) {
        self.shutdowns.lock().unwrap().push(cause);
    }

    fn break_reached(&self, icount: u64) {
        self.breaks.lock().unwrap().push(icount);
    }
}
