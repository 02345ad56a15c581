//! Decode and header errors.

use thiserror::Error;

/// Errors raised while reading a replay log.
///
/// The write side never produces these: write failures are absorbed by the
/// sticky flag in [`crate::LogWriter`].
#[derive(Debug, Error)]
pub enum LogError {
    #[error("error reading the replay data: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of replay log at byte {offset}")]
    UnexpectedEof { offset: u64 },

    #[error("unknown event kind {tag} at byte {offset}")]
    UnknownTag { tag: u8, offset: u64 },

    #[error("unknown input event type {0}")]
    UnknownInputType(u32),

    #[error("unknown key value type {0}")]
    UnknownKeyType(u32),

    #[error("invalid input log file version {found:#x} (expected {expected:#x})")]
    VersionMismatch { found: u32, expected: u32 },
}
