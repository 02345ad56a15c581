//! Session ownership: the replay context, its builder, and the locked
//! [`Session`] through which every replay operation runs.
//!
//! ```text
//!   ReplayContext ──lock()──▶ Session ──▶ icount / events / checkpoints
//!        │                      │         channels / snapshots
//!        │                      └─ TicketGuard<ReplayCore>
//!        ├─ IcountSource   (machine's raw instruction counter)
//!        ├─ MachineHooks   (kick vCPU, wake I/O thread, shutdown, break)
//!        └─ registries     (char drivers, net filters, input sink)
//! ```
//!
//! There is one context per machine. It replaces process-wide globals: the
//! machine owns it and hands `&ReplayContext` to every thread that needs
//! the log.

use crate::channels::chardev::{CharBackend, CharDriverId};
use crate::channels::input::InputSink;
use crate::channels::net::{NetFilter, NetFilterId};
use crate::config::{ConfigError, ReplayConfig, ReplayMode};
use crate::error::{fatal, ReplayError};
use crate::events::Event;
use crate::mutex::{TicketGuard, TicketMutex};
use crate::registry::Registry;
use crate::state::ReplayState;
use crate::tape::{LogSink, LogSource, Tape};
use log::{debug, info, trace, warn};
use replay_log::{LogError, LogReader, LogWriter, Record, RecordKind, ShutdownCause};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════
//  Machine seams
// ═══════════════════════════════════════════════════════════════════════

/// The machine's raw instruction counter.
pub trait IcountSource: Send + Sync {
    fn icount_raw(&self) -> u64;
}

impl<F> IcountSource for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn icount_raw(&self) -> u64 {
        self()
    }
}

/// Callbacks into the machine. Called with the replay lock held, so they
/// must not lock the context again.
pub trait MachineHooks: Send + Sync {
    /// The instruction budget ran out: the next record is due on the I/O
    /// thread.
    fn notify_io_thread(&self) {}

    /// An async event was queued: make the vCPU leave its execution loop.
    fn kick_vcpu(&self) {}

    /// A recorded shutdown request was replayed.
    fn shutdown_request(&self, _cause: ShutdownCause) {}

    /// Execution reached the instruction count set by `set_break`.
    fn break_reached(&self, _icount: u64) {}
}

struct NoHooks;
impl MachineHooks for NoHooks {}

// ═══════════════════════════════════════════════════════════════════════
//  Locked state
// ═══════════════════════════════════════════════════════════════════════

pub(crate) struct ReplayCore {
    pub(crate) mode: ReplayMode,
    pub(crate) state: ReplayState,
    pub(crate) tape: Option<Tape>,
    pub(crate) events: VecDeque<Event>,
    pub(crate) events_enabled: bool,
    pub(crate) processing_async: bool,
    pub(crate) break_icount: Option<u64>,
    /// A debugger-driven run is in progress; guest breakpoints are noted
    /// instead of stopping the machine.
    pub(crate) debugging: bool,
    pub(crate) last_breakpoint: Option<u64>,
}

impl ReplayCore {
    fn new(mode: ReplayMode, tape: Option<Tape>) -> Self {
        Self {
            mode,
            state: ReplayState::default(),
            tape,
            events: VecDeque::new(),
            events_enabled: false,
            processing_async: false,
            break_icount: None,
            debugging: false,
            last_breakpoint: None,
        }
    }

    /// Read the next record into `pending` unless one is already there.
    pub(crate) fn try_fetch(&mut self) -> Result<(), LogError> {
        if self.state.pending.is_some() {
            return Ok(());
        }
        let Some(Tape::Play(reader)) = self.tape.as_mut() else {
            return Ok(());
        };
        let record = Record::decode(reader)?;
        if let Record::Instruction(count) = record {
            self.state.instruction_count = count;
            self.state.current_event += 1;
        }
        trace!("replay: fetched {}", record.kind());
        self.state.pending = Some(record);
        Ok(())
    }

    pub(crate) fn fetch(&mut self) {
        if let Err(err) = self.try_fetch() {
            fatal(format_args!("Replay: {err}"));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Builder
// ═══════════════════════════════════════════════════════════════════════

/// Collects the machine seams and channel endpoints, then opens the log.
pub struct ReplayContextBuilder {
    config: ReplayConfig,
    icount: Arc<dyn IcountSource>,
    hooks: Arc<dyn MachineHooks>,
    input: Option<Arc<dyn InputSink>>,
    chars: Registry<dyn CharBackend>,
    nets: Registry<dyn NetFilter>,
    blockers: Vec<String>,
    sink: Option<Box<dyn LogSink>>,
    source: Option<Box<dyn LogSource>>,
}

impl ReplayContextBuilder {
    pub fn hooks(&mut self, hooks: Arc<dyn MachineHooks>) -> &mut Self {
        self.hooks = hooks;
        self
    }

    pub fn input_sink(&mut self, sink: Arc<dyn InputSink>) -> &mut Self {
        self.input = Some(sink);
        self
    }

    /// Register a character backend. Drivers must register in the same
    /// order when recording and replaying.
    pub fn register_char_driver(
        &mut self,
        backend: Arc<dyn CharBackend>,
    ) -> Result<CharDriverId, ReplayError> {
        self.chars.register(backend).map(CharDriverId)
    }

    /// Register a network filter. Same ordering rule as char drivers.
    pub fn register_net_filter(
        &mut self,
        filter: Arc<dyn NetFilter>,
    ) -> Result<NetFilterId, ReplayError> {
        self.nets.register(filter).map(NetFilterId)
    }

    /// Mark a configured feature as incompatible with record/replay.
    /// Ignored when the mode is `None`.
    pub fn add_blocker(&mut self, feature: impl Into<String>) -> &mut Self {
        if self.config.mode != ReplayMode::None {
            self.blockers.push(feature.into());
        }
        self
    }

    /// Record into `sink` instead of creating the configured file.
    pub fn log_sink(&mut self, sink: Box<dyn LogSink>) -> &mut Self {
        self.sink = Some(sink);
        self
    }

    /// Replay from `source` instead of opening the configured file.
    pub fn log_source(&mut self, source: Box<dyn LogSource>) -> &mut Self {
        self.source = Some(source);
        self
    }

    /// Open the log and produce the context.
    ///
    /// In PLAY mode the header is validated and the first record fetched
    /// here, so a bad log fails before the machine starts.
    pub fn build(self) -> Result<ReplayContext, ReplayError> {
        let Self {
            config,
            icount,
            hooks,
            input,
            chars,
            nets,
            blockers,
            sink,
            source,
        } = self;

        let tape = match config.mode {
            ReplayMode::None => None,
            ReplayMode::Record => {
                let sink = match sink {
                    Some(sink) => sink,
                    None => {
                        let path = log_path(&config)?;
                        let file = File::create(path).map_err(|source| ReplayError::OpenLog {
                            path: path.to_path_buf(),
                            source,
                        })?;
                        Box::new(BufWriter::new(file)) as Box<dyn LogSink>
                    }
                };
                Some(Tape::Record(LogWriter::create(sink)))
            }
            ReplayMode::Play => {
                let source = match source {
                    Some(source) => source,
                    None => {
                        let path = log_path(&config)?;
                        let file = File::open(path).map_err(|source| ReplayError::OpenLog {
                            path: path.to_path_buf(),
                            source,
                        })?;
                        Box::new(BufReader::new(file)) as Box<dyn LogSource>
                    }
                };
                Some(Tape::Play(LogReader::open(source)?))
            }
        };

        let mut core = ReplayCore::new(config.mode, tape);
        core.try_fetch()?;

        if config.mode != ReplayMode::None {
            info!(
                "replay: {} session on {} ({} char drivers, {} net filters)",
                config.mode,
                config
                    .path
                    .as_deref()
                    .map_or_else(|| "<custom storage>".into(), Path::to_string_lossy),
                chars.len(),
                nets.len()
            );
        }

        Ok(ReplayContext {
            core: TicketMutex::new(core),
            config,
            icount,
            hooks,
            input,
            chars,
            nets,
            blockers,
        })
    }
}

fn log_path(config: &ReplayConfig) -> Result<&Path, ReplayError> {
    config
        .path
        .as_deref()
        .ok_or(ReplayError::Config(ConfigError::MissingFile))
}

// ═══════════════════════════════════════════════════════════════════════
//  Context
// ═══════════════════════════════════════════════════════════════════════

/// One machine's record/replay session.
pub struct ReplayContext {
    core: TicketMutex<ReplayCore>,
    config: ReplayConfig,
    icount: Arc<dyn IcountSource>,
    pub(crate) hooks: Arc<dyn MachineHooks>,
    pub(crate) input: Option<Arc<dyn InputSink>>,
    pub(crate) chars: Registry<dyn CharBackend>,
    pub(crate) nets: Registry<dyn NetFilter>,
    blockers: Vec<String>,
}

impl ReplayContext {
    pub fn builder(config: ReplayConfig, icount: Arc<dyn IcountSource>) -> ReplayContextBuilder {
        ReplayContextBuilder {
            config,
            icount,
            hooks: Arc::new(NoHooks),
            input: None,
            chars: Registry::new("character drivers"),
            nets: Registry::new("network filters"),
            blockers: Vec::new(),
            sink: None,
            source: None,
        }
    }

    /// Take the replay lock. Blocks until every earlier caller is done.
    ///
    /// # Panics
    ///
    /// If the calling thread already holds a session.
    pub fn lock(&self) -> Session<'_> {
        Session {
            ctx: self,
            core: self.core.lock(),
        }
    }

    pub fn is_locked_by_current_thread(&self) -> bool {
        self.core.is_locked_by_current_thread()
    }

    /// Current mode. `finish` switches it to `None`.
    pub fn mode(&self) -> ReplayMode {
        self.lock().mode()
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn filename(&self) -> Option<&Path> {
        self.config.path.as_deref()
    }

    pub fn snapshot_name(&self) -> Option<&str> {
        self.config.snapshot.as_deref()
    }

    pub fn icount_raw(&self) -> u64 {
        self.icount.icount_raw()
    }

    /// Begin execution under record/replay: fails if any blocker was
    /// registered, otherwise enables event queuing.
    pub fn start(&self) -> Result<(), ReplayError> {
        let mut session = self.lock();
        if session.mode() == ReplayMode::None {
            return Ok(());
        }
        if let Some(feature) = self.blockers.first() {
            warn!("replay: cannot start, '{feature}' is not deterministic");
            return Err(ReplayError::Blocked {
                feature: feature.clone(),
            });
        }
        session.enable_events();
        info!("replay: started");
        Ok(())
    }

    /// End the session. A recording gets its trailing shutdown and end
    /// records and its version stamp; queued events are flushed and the
    /// mode drops to `None`.
    pub fn finish(&self) {
        let mut session = self.lock();
        if session.mode() == ReplayMode::None {
            return;
        }
        session.save_instructions();
        if let Some(Tape::Record(writer)) = session.core.tape.as_mut() {
            Record::Shutdown(ShutdownCause::HostSignal).encode(writer);
            Record::End.encode(writer);
            writer.finalize();
            if writer.has_write_error() {
                info!("replay: recording finished, but the log is incomplete");
            } else {
                info!("replay: recording finished at offset {}", writer.position());
            }
        }
        session.core.tape = None;
        session.disable_events();
        session.core.mode = ReplayMode::None;
        debug!("replay: session closed");
    }

    /// Nothing the log needs is queued, so a snapshot taken now resumes
    /// cleanly.
    pub fn can_snapshot(&self) -> bool {
        self.lock().can_snapshot()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Session
// ═══════════════════════════════════════════════════════════════════════

/// Exclusive access to the replay state. All replay operations are methods
/// on this type; the lock is released when it drops.
pub struct Session<'a> {
    pub(crate) ctx: &'a ReplayContext,
    pub(crate) core: TicketGuard<'a, ReplayCore>,
}

impl<'a> Session<'a> {
    pub fn mode(&self) -> ReplayMode {
        self.core.mode
    }

    pub fn state(&self) -> &ReplayState {
        &self.core.state
    }

    pub fn context(&self) -> &'a ReplayContext {
        self.ctx
    }

    /// RECORD: a write to the log has failed and the recording is unusable.
    pub fn has_write_error(&self) -> bool {
        match &self.core.tape {
            Some(Tape::Record(writer)) => writer.has_write_error(),
            _ => false,
        }
    }

    /// Append a record when recording. No-op otherwise.
    pub(crate) fn put(&mut self, record: &Record) {
        if let Some(Tape::Record(writer)) = self.core.tape.as_mut() {
            record.encode(writer);
        }
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.core.mode == ReplayMode::Record && self.core.tape.is_some()
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.core.mode == ReplayMode::Play && self.core.tape.is_some()
    }

    /// Consume the pending record and fetch the next one.
    pub(crate) fn finish_event(&mut self) -> Record {
        let Some(record) = self.core.state.pending.take() else {
            fatal("Replay: no pending event to finish");
        };
        self.core.fetch();
        record
    }

    /// Whether the pending record is of `kind`.
    ///
    /// Shutdown records met along the way are consumed and forwarded to
    /// the machine. While an instruction budget is outstanding only the
    /// `INSTRUCTION` record can be next.
    pub fn next_event_is(&mut self, kind: RecordKind) -> bool {
        if self.core.state.instruction_count != 0 {
            if self.core.state.data_kind() != Some(RecordKind::Instruction) {
                fatal(format_args!(
                    "Replay: instruction budget {} without a pending instruction record",
                    self.core.state.instruction_count
                ));
            }
            return kind == RecordKind::Instruction;
        }

        let mut res = false;
        loop {
            let pending = self.core.state.data_kind();
            if pending == Some(kind) {
                res = true;
            }
            match pending {
                Some(RecordKind::Shutdown(cause)) => {
                    self.finish_event();
                    debug!("replay: shutdown request ({cause})");
                    self.ctx.hooks.shutdown_request(cause);
                }
                _ => return res,
            }
        }
    }

    /// Consume the pending record if it is of `kind`, else stop replay.
    pub(crate) fn expect_event(&mut self, kind: RecordKind, what: &str) -> Record {
        if !self.next_event_is(kind) {
            fatal(format_args!(
                "Missing {what} event (log has {})",
                self.core
                    .state
                    .data_kind()
                    .map_or_else(|| "nothing".to_string(), |k| k.to_string())
            ));
        }
        self.finish_event()
    }
}
