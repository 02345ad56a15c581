//! Snapshot glue: carrying the replay position inside VM snapshots.
//!
//! The VM snapshot framework owns the machine state; replay only adds one
//! blob to it. Restoring that blob moves the log cursor back to where the
//! snapshot was taken, so a replay can resume from any snapshot of the
//! recorded run.
//!
//! ```text
//!   snapshot():  state.file_offset = tape position ──▶ ReplaySnapshot ──▶ JSON blob
//!   restore():   PLAY   seek(file_offset), adopt state, read ahead
//!                RECORD adopt state, reset instruction budget and block ids
//! ```

use crate::config::ReplayMode;
use crate::context::{ReplayContext, Session};
use crate::error::{fatal, ReplayError};
use crate::state::ReplayState;
use crate::tape::Tape;
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;

/// Replay state as stored in a VM snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySnapshot {
    pub state: ReplayState,
}

impl ReplaySnapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ReplayError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReplayError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A VM snapshot and the instruction count it was taken at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub name: String,
    pub icount: u64,
}

/// The machine's named VM snapshots.
pub trait SnapshotStore {
    fn save_snapshot(&self, name: &str) -> Result<(), Box<dyn Error + Send + Sync>>;
    fn load_snapshot(&self, name: &str) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Every snapshot of the current recording. Used to travel backwards.
    fn snapshots(&self) -> Result<Vec<SnapshotInfo>, Box<dyn Error + Send + Sync>>;
}

impl Session<'_> {
    /// Capture the replay state, stamping the current log offset.
    pub fn snapshot(&mut self) -> ReplaySnapshot {
        if let Some(tape) = &self.core.tape {
            self.core.state.file_offset = tape.position();
        }
        ReplaySnapshot {
            state: self.core.state.clone(),
        }
    }

    /// Adopt a captured replay state.
    pub fn restore(&mut self, snapshot: &ReplaySnapshot) {
        self.core.state = snapshot.state.clone();
        match self.core.mode {
            ReplayMode::Play => {
                if let Some(Tape::Play(reader)) = self.core.tape.as_mut() {
                    if let Err(err) = reader.seek_to(snapshot.state.file_offset) {
                        fatal(format_args!("Replay: cannot seek to snapshot position: {err}"));
                    }
                }
                self.core.fetch();
            }
            ReplayMode::Record => {
                self.core.state.instruction_count = 0;
                self.core.state.block_request_id = 0;
            }
            ReplayMode::None => {}
        }
        info!(
            "replay: restored at icount {} (log offset {})",
            self.core.state.current_icount, self.core.state.file_offset
        );
    }

    /// Whether a snapshot taken now would resume cleanly: nothing may sit
    /// in the async queue.
    pub fn can_snapshot(&self) -> bool {
        self.core.mode == ReplayMode::None || self.core.events.is_empty()
    }
}

impl ReplayContext {
    /// Take (RECORD) or load (PLAY) the configured initial snapshot.
    ///
    /// Must be called without holding a session: the store is expected to
    /// lock the context to capture or restore the replay blob.
    pub fn vmstate_init(&self, store: &dyn SnapshotStore) -> Result<(), ReplayError> {
        let Some(name) = self.snapshot_name() else {
            return Ok(());
        };
        let (action, result) = match self.mode() {
            ReplayMode::Record => ("save", store.save_snapshot(name)),
            ReplayMode::Play => ("load", store.load_snapshot(name)),
            ReplayMode::None => return Ok(()),
        };
        result.map_err(|source| ReplayError::SnapshotStore {
            action,
            name: name.to_string(),
            source,
        })?;
        info!("replay: initial snapshot '{name}': {action} done");
        Ok(())
    }
}
