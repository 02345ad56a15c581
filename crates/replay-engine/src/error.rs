//! Engine errors and the single fatal path.
//!
//! Only setup and debugger navigation can fail recoverably (opening the
//! log, blockers, snapshot plumbing). Once a session runs, a divergence
//! between the log and live execution goes through [`fatal`]: replay
//! cannot resume after that.

use crate::config::ConfigError;
use log::error;
use replay_log::LogError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned while configuring, opening, or snapshotting a session.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Replay: open {}: {source}", path.display())]
    OpenLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Replay log: {0}")]
    Log(#[from] LogError),

    #[error("Replay configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Record/replay feature is not supported for '{feature}'")]
    Blocked { feature: String },

    #[error("Too many {what} registered for record/replay (limit {limit})")]
    TooManyChannels { what: &'static str, limit: usize },

    #[error("Replay state blob: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Replay debugging needs a session in play mode")]
    NotReplaying,

    #[error("No snapshot to rewind to before icount {icount}")]
    NoSnapshotBefore { icount: u64 },

    #[error("Could not list snapshots for replay debugging: {source}")]
    ListSnapshots {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Guest execution failed while seeking to icount {target}: {source}")]
    Runner {
        target: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Could not {action} snapshot '{name}' for icount record/replay: {source}")]
    SnapshotStore {
        action: &'static str,
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Report an unrecoverable replay divergence and stop.
///
/// Release builds abort on panic, which terminates the process.
#[track_caller]
pub(crate) fn fatal(message: impl fmt::Display) -> ! {
    error!("{message}");
    panic!("replay: {message}");
}
