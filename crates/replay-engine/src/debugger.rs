//! Reverse debugging: moving a replay backwards through snapshots.
//!
//! A replay can only run forward. Going back means loading the nearest
//! earlier VM snapshot and running forward again to the wanted instruction
//! count, with a replay break stopping the guest there.
//!
//! ```text
//!   seek(t):             load nearest snapshot ≤ t ──▶ run to break t
//!   reverse_step():      seek(icount - 1)
//!   reverse_continue():  scan [snapshot, origin) noting guest breakpoints
//!                        ├─ hit found   ──▶ seek(last hit)
//!                        └─ none        ──▶ scan the previous snapshot's span
//! ```

use crate::config::ReplayMode;
use crate::context::{ReplayContext, Session};
use crate::error::ReplayError;
use crate::snapshot::{SnapshotInfo, SnapshotStore};
use crate::verified::nearest_at_or_before;
use log::{debug, info};
use std::error::Error;

/// Runs the guest forward.
pub trait GuestRunner {
    /// Execute the guest until the replay break set on `ctx` is reached,
    /// a guest breakpoint stops it, or the log runs out.
    ///
    /// Guest breakpoints must be reported through
    /// [`Session::breakpoint_hit`], which decides whether to stop.
    fn run_to_break(&mut self, ctx: &ReplayContext) -> Result<(), Box<dyn Error + Send + Sync>>;
}

impl Session<'_> {
    /// Whether a debugger-driven run is in progress.
    pub fn running_debug(&self) -> bool {
        self.core.debugging && self.core.break_icount.is_some()
    }

    /// The guest hit one of its breakpoints. Returns whether the machine
    /// should stop there.
    ///
    /// While the debugger drives execution the hit is only remembered, so
    /// a reverse continue can find the last one before its origin.
    pub fn breakpoint_hit(&mut self) -> bool {
        if !self.running_debug() {
            return true;
        }
        let at = self.core.state.current_icount;
        if self.core.break_icount.map_or(false, |brk| at < brk) {
            debug!("replay: guest breakpoint noted at icount {at}");
            self.core.last_breakpoint = Some(at);
        }
        false
    }
}

/// Navigates a PLAY session in both directions.
pub struct ReplayDebugger<'a, R> {
    ctx: &'a ReplayContext,
    store: &'a dyn SnapshotStore,
    runner: R,
}

impl<'a, R: GuestRunner> ReplayDebugger<'a, R> {
    pub fn new(ctx: &'a ReplayContext, store: &'a dyn SnapshotStore, runner: R) -> Self {
        Self { ctx, store, runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut R {
        &mut self.runner
    }

    /// Instruction count the replay is at.
    pub fn position(&self) -> u64 {
        self.ctx.lock().current_icount()
    }

    /// Move the replay to `icount`.
    ///
    /// Loads a snapshot when the target lies behind the current position,
    /// or when a snapshot gets closer to it than the current position.
    /// Returns where execution stopped, which falls short of `icount` only
    /// if the log ends first.
    pub fn seek(&mut self, icount: u64) -> Result<u64, ReplayError> {
        self.ensure_playing()?;
        let current = self.position();
        match self.nearest_snapshot(icount)? {
            Some(snapshot) if icount < current || current < snapshot.icount => {
                self.load(&snapshot)?;
            }
            None if icount < current => return Err(ReplayError::NoSnapshotBefore { icount }),
            _ => {}
        }
        self.run_forward(icount)
    }

    /// Step back one instruction. `None` at the start of the recording.
    pub fn reverse_step(&mut self) -> Result<Option<u64>, ReplayError> {
        self.ensure_playing()?;
        match self.position() {
            0 => Ok(None),
            current => self.seek(current - 1).map(Some),
        }
    }

    /// Run backwards to the last guest breakpoint before the current
    /// position, or to the oldest reachable point when there is none.
    /// `None` at the start of the recording.
    pub fn reverse_continue(&mut self) -> Result<Option<u64>, ReplayError> {
        self.ensure_playing()?;
        let origin = self.position();
        if origin == 0 {
            return Ok(None);
        }

        let mut end = origin;
        loop {
            let Some(snapshot) = self.nearest_snapshot(end - 1)? else {
                return Err(ReplayError::NoSnapshotBefore { icount: end - 1 });
            };
            self.load(&snapshot)?;
            self.run_forward(end)?;

            if let Some(hit) = self.ctx.lock().core.last_breakpoint.take() {
                info!("replay: reverse continue from {origin} stops at breakpoint {hit}");
                return self.seek(hit).map(Some);
            }

            let earlier = match snapshot.icount {
                0 => None,
                at => self.nearest_snapshot(at - 1)?,
            };
            if earlier.is_none() {
                info!(
                    "replay: no breakpoint before {origin}, stopping at icount {}",
                    snapshot.icount
                );
                return self.seek(snapshot.icount).map(Some);
            }
            end = snapshot.icount;
        }
    }

    // ─── Internals ──────────────────────────────────────────────────

    fn ensure_playing(&self) -> Result<(), ReplayError> {
        match self.ctx.mode() {
            ReplayMode::Play => Ok(()),
            _ => Err(ReplayError::NotReplaying),
        }
    }

    fn nearest_snapshot(&self, icount: u64) -> Result<Option<SnapshotInfo>, ReplayError> {
        let mut snapshots = self
            .store
            .snapshots()
            .map_err(|source| ReplayError::ListSnapshots { source })?;
        let points: Vec<u64> = snapshots.iter().map(|s| s.icount).collect();
        Ok(nearest_at_or_before(&points, icount).map(|i| snapshots.swap_remove(i)))
    }

    fn load(&self, snapshot: &SnapshotInfo) -> Result<(), ReplayError> {
        self.store
            .load_snapshot(&snapshot.name)
            .map_err(|source| ReplayError::SnapshotStore {
                action: "load",
                name: snapshot.name.clone(),
                source,
            })?;
        debug!(
            "replay: loaded snapshot '{}' at icount {}",
            snapshot.name, snapshot.icount
        );
        Ok(())
    }

    fn run_forward(&mut self, target: u64) -> Result<u64, ReplayError> {
        {
            let mut s = self.ctx.lock();
            let current = s.current_icount();
            if current >= target {
                return Ok(current);
            }
            s.set_break(target);
            s.core.debugging = true;
            s.core.last_breakpoint = None;
        }

        let result = self.runner.run_to_break(self.ctx);

        let mut s = self.ctx.lock();
        s.delete_break();
        s.core.debugging = false;
        result.map_err(|source| ReplayError::Runner { target, source })?;
        Ok(s.current_icount())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ReplaySnapshot;
    use crate::test_util::{player, recorder, Icount, SharedLog};
    use replay_log::RecordKind;
    use std::sync::Mutex;

    /// A log with an interrupt every 100 instructions up to 900.
    fn interrupts_every_100() -> Vec<u8> {
        let icount = Icount::default();
        let log = SharedLog::default();
        let ctx = recorder(&icount, &log);
        for at in (100..=900).step_by(100) {
            icount.set(at);
            assert!(ctx.lock().interrupt());
        }
        ctx.finish();
        log.bytes()
    }

    /// Snapshots held in memory; loading one also rewinds the machine's
    /// instruction counter.
    struct Store<'a> {
        ctx: &'a ReplayContext,
        icount: Icount,
        saved: Mutex<Vec<(SnapshotInfo, Vec<u8>)>>,
        loads: Mutex<Vec<String>>,
    }

    impl<'a> Store<'a> {
        fn new(ctx: &'a ReplayContext, icount: &Icount) -> Self {
            Self {
                ctx,
                icount: icount.clone(),
                saved: Mutex::new(Vec::new()),
                loads: Mutex::new(Vec::new()),
            }
        }
    }

    impl SnapshotStore for Store<'_> {
        fn save_snapshot(&self, name: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
            let snapshot = self.ctx.lock().snapshot();
            let info = SnapshotInfo {
                name: name.to_string(),
                icount: snapshot.state.current_icount,
            };
            self.saved.lock().unwrap().push((info, snapshot.to_bytes()?));
            Ok(())
        }

        fn load_snapshot(&self, name: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
            let saved = self.saved.lock().unwrap();
            let (info, blob) = saved
                .iter()
                .find(|(info, _)| info.name == name)
                .ok_or_else(|| format!("no snapshot named {name}"))?;
            self.icount.set(info.icount);
            self.ctx.lock().restore(&ReplaySnapshot::from_bytes(blob)?);
            self.loads.lock().unwrap().push(name.to_string());
            Ok(())
        }

        fn snapshots(&self) -> Result<Vec<SnapshotInfo>, Box<dyn Error + Send + Sync>> {
            Ok(self.saved.lock().unwrap().iter().map(|(info, _)| info.clone()).collect())
        }
    }

    /// A vCPU loop that stops at the replay break and reports guest
    /// breakpoints.
    struct Vcpu {
        icount: Icount,
        breakpoints: Vec<u64>,
        stops: Vec<u64>,
    }

    impl Vcpu {
        fn new(icount: &Icount) -> Self {
            Self {
                icount: icount.clone(),
                breakpoints: Vec::new(),
                stops: Vec::new(),
            }
        }
    }

    impl GuestRunner for Vcpu {
        fn run_to_break(&mut self, ctx: &ReplayContext) -> Result<(), Box<dyn Error + Send + Sync>> {
            for _ in 0..10_000 {
                let mut s = ctx.lock();
                let here = s.current_icount();
                if s.break_icount() == Some(here) || s.state().data_kind() == Some(RecordKind::End) {
                    return Ok(());
                }
                let budget = u64::from(s.get_instructions());
                if budget == 0 {
                    if !s.interrupt() {
                        s.async_events();
                    }
                    continue;
                }
                let next = self.breakpoints.iter().copied().filter(|&bp| bp > here).min();
                let target = next.map_or(here + budget, |bp| bp.min(here + budget));
                self.icount.set(target);
                s.advance_current_icount(target);
                if self.breakpoints.contains(&target) && s.breakpoint_hit() {
                    self.stops.push(target);
                    return Ok(());
                }
            }
            Err("guest never reached the break".into())
        }
    }

    #[test]
    fn seek_loads_the_closest_earlier_snapshot() {
        let icount = Icount::default();
        let ctx = player(&icount, interrupts_every_100());
        let store = Store::new(&ctx, &icount);
        let mut debugger = ReplayDebugger::new(&ctx, &store, Vcpu::new(&icount));

        store.save_snapshot("start").unwrap();
        assert_eq!(debugger.seek(500).unwrap(), 500);
        store.save_snapshot("mid").unwrap();
        assert_eq!(debugger.seek(900).unwrap(), 900);
        assert!(store.loads.lock().unwrap().is_empty(), "forward seeks just run");

        assert_eq!(debugger.seek(300).unwrap(), 300);
        assert_eq!(debugger.seek(700).unwrap(), 700);
        assert_eq!(*store.loads.lock().unwrap(), vec!["start", "mid"]);
        assert_eq!(debugger.position(), 700);
        assert_eq!(ctx.lock().break_icount(), None);
    }

    #[test]
    fn reverse_step_goes_back_one_instruction() {
        let icount = Icount::default();
        let ctx = player(&icount, interrupts_every_100());
        let store = Store::new(&ctx, &icount);
        let mut debugger = ReplayDebugger::new(&ctx, &store, Vcpu::new(&icount));

        assert_eq!(debugger.reverse_step().unwrap(), None);
        store.save_snapshot("start").unwrap();
        debugger.seek(600).unwrap();

        assert_eq!(debugger.reverse_step().unwrap(), Some(599));
        assert_eq!(debugger.reverse_step().unwrap(), Some(598));
        assert_eq!(ctx.lock().current_icount(), 598);
    }

    #[test]
    fn reverse_continue_finds_the_last_breakpoint_before_origin() {
        let icount = Icount::default();
        let ctx = player(&icount, interrupts_every_100());
        let store = Store::new(&ctx, &icount);
        let mut debugger = ReplayDebugger::new(&ctx, &store, Vcpu::new(&icount));

        store.save_snapshot("start").unwrap();
        debugger.seek(500).unwrap();
        store.save_snapshot("mid").unwrap();
        debugger.seek(700).unwrap();

        debugger.runner_mut().breakpoints = vec![250, 420];
        // Nothing between 500 and 700: the scan falls back to the span
        // before the "mid" snapshot.
        assert_eq!(debugger.reverse_continue().unwrap(), Some(420));
        assert_eq!(debugger.reverse_continue().unwrap(), Some(250));
        assert_eq!(debugger.reverse_continue().unwrap(), Some(0));
        assert_eq!(debugger.reverse_continue().unwrap(), None);
        assert!(debugger.runner().stops.is_empty(), "debugger runs never stop early");
    }

    #[test]
    fn guest_breakpoints_stop_ordinary_execution() {
        let icount = Icount::default();
        let ctx = player(&icount, interrupts_every_100());
        let mut s = ctx.lock();
        assert!(!s.running_debug());
        assert!(s.breakpoint_hit());
        s.set_break(50);
        assert!(!s.running_debug(), "a plain break is not a debugger run");
    }

    #[test]
    fn rewinding_without_snapshots_fails() {
        let icount = Icount::default();
        let ctx = player(&icount, interrupts_every_100());
        let store = Store::new(&ctx, &icount);
        let mut debugger = ReplayDebugger::new(&ctx, &store, Vcpu::new(&icount));

        assert_eq!(debugger.seek(300).unwrap(), 300);
        let err = debugger.seek(100).unwrap_err();
        assert!(matches!(err, ReplayError::NoSnapshotBefore { icount: 100 }));
        assert!(matches!(
            debugger.reverse_continue().unwrap_err(),
            ReplayError::NoSnapshotBefore { icount: 299 }
        ));
    }

    #[test]
    fn debugging_needs_play_mode() {
        let icount = Icount::default();
        let log = SharedLog::default();
        let ctx = recorder(&icount, &log);
        let store = Store::new(&ctx, &icount);
        let mut debugger = ReplayDebugger::new(&ctx, &store, Vcpu::new(&icount));
        assert!(matches!(debugger.seek(10), Err(ReplayError::NotReplaying)));
        assert!(matches!(debugger.reverse_step(), Err(ReplayError::NotReplaying)));
    }

    #[test]
    fn seek_past_the_log_stops_at_its_end() {
        let icount = Icount::default();
        let ctx = player(&icount, interrupts_every_100());
        let store = Store::new(&ctx, &icount);
        let mut debugger = ReplayDebugger::new(&ctx, &store, Vcpu::new(&icount));
        assert_eq!(debugger.seek(5_000).unwrap(), 900);
        assert_eq!(ctx.lock().break_icount(), None);
    }
}
