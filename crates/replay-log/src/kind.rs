//! The closed tag space of the replay log.
//!
//! Every record starts with one tag byte. Some tags are ranges: the async,
//! shutdown, clock and checkpoint families reserve one ordinal per sub-kind.
//! [`RecordKind`] folds the range arithmetic into a sum type so callers never
//! compute `tag - base` themselves.

use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════
//  Tag ordinals
// ═══════════════════════════════════════════════════════════════════════

pub const TAG_INSTRUCTION: u8 = 0;
pub const TAG_INTERRUPT: u8 = 1;
pub const TAG_EXCEPTION: u8 = 2;
pub const TAG_ASYNC: u8 = 3;
pub const TAG_SHUTDOWN: u8 = TAG_ASYNC + AsyncEventKind::COUNT;
pub const TAG_CHAR_WRITE: u8 = TAG_SHUTDOWN + ShutdownCause::COUNT;
pub const TAG_CHAR_READ_ALL: u8 = TAG_CHAR_WRITE + 1;
pub const TAG_CHAR_READ_ALL_ERROR: u8 = TAG_CHAR_READ_ALL + 1;
pub const TAG_AUDIO_OUT: u8 = TAG_CHAR_READ_ALL_ERROR + 1;
pub const TAG_AUDIO_IN: u8 = TAG_AUDIO_OUT + 1;
pub const TAG_RANDOM: u8 = TAG_AUDIO_IN + 1;
pub const TAG_CLOCK: u8 = TAG_RANDOM + 1;
pub const TAG_CHECKPOINT: u8 = TAG_CLOCK + ClockKind::COUNT;
pub const TAG_END: u8 = TAG_CHECKPOINT + CheckpointId::COUNT;

/// Number of valid tags. Anything at or above this is corruption.
pub const TAG_COUNT: u8 = TAG_END + 1;

const _: () = assert!(TAG_SHUTDOWN == 10);
const _: () = assert!(TAG_CHAR_WRITE == 21);
const _: () = assert!(TAG_CLOCK == 27);
const _: () = assert!(TAG_CHECKPOINT == 30);
const _: () = assert!(TAG_END == 39);

/// Generates a fieldless enum whose discriminants are dense ordinals, plus
/// `ALL`, `COUNT`, `index()` and `from_index()`.
macro_rules! ordinal_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($(#[$vmeta:meta])* $variant:ident => $label:literal,)+ }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];
            pub const COUNT: u8 = Self::ALL.len() as u8;

            /// Dense ordinal of this variant.
            pub fn index(self) -> u8 {
                self as u8
            }

            pub fn from_index(index: u8) -> Option<Self> {
                Self::ALL.get(index as usize).copied()
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

ordinal_enum! {
    /// Kinds of deferred events carried through the async queue.
    pub enum AsyncEventKind {
        Bh => "bh",
        BhOneshot => "bh-oneshot",
        Input => "input",
        InputSync => "input-sync",
        CharRead => "char-read",
        Block => "block",
        Net => "net",
    }
}

impl AsyncEventKind {
    /// Whether replay correlates this kind with a live queue entry by id.
    ///
    /// The other kinds are synthesized straight from the log.
    pub fn matched_by_id(self) -> bool {
        matches!(self, Self::Bh | Self::BhOneshot | Self::Block)
    }
}

ordinal_enum! {
    /// Why the machine was asked to shut down.
    pub enum ShutdownCause {
        None => "none",
        HostError => "host-error",
        HostQmpQuit => "host-qmp-quit",
        HostQmpSystemReset => "host-qmp-system-reset",
        HostSignal => "host-signal",
        HostUi => "host-ui",
        GuestShutdown => "guest-shutdown",
        GuestReset => "guest-reset",
        GuestPanic => "guest-panic",
        SubsystemReset => "subsystem-reset",
        SnapshotLoad => "snapshot-load",
    }
}

ordinal_enum! {
    /// Host clocks whose reads are recorded.
    pub enum ClockKind {
        RealTicks => "real-ticks",
        Realtime => "realtime",
        VirtualRt => "virtual-rt",
    }
}

ordinal_enum! {
    /// Named rendezvous points.
    pub enum CheckpointId {
        ClockWarpStart => "clock-warp-start",
        ClockWarpAccount => "clock-warp-account",
        ResetRequested => "reset-requested",
        SuspendRequested => "suspend-requested",
        ClockVirtual => "clock-virtual",
        ClockHost => "clock-host",
        ClockVirtualRt => "clock-virtual-rt",
        Init => "init",
        Reset => "reset",
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  RecordKind
// ═══════════════════════════════════════════════════════════════════════

/// A record's tag without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Instruction,
    Interrupt,
    Exception,
    Async(AsyncEventKind),
    Shutdown(ShutdownCause),
    CharWrite,
    CharReadAll,
    CharReadAllError,
    AudioOut,
    AudioIn,
    Random,
    Clock(ClockKind),
    Checkpoint(CheckpointId),
    End,
}

impl RecordKind {
    /// Wire tag byte.
    pub fn tag(self) -> u8 {
        match self {
            Self::Instruction => TAG_INSTRUCTION,
            Self::Interrupt => TAG_INTERRUPT,
            Self::Exception => TAG_EXCEPTION,
            Self::Async(k) => TAG_ASYNC + k.index(),
            Self::Shutdown(c) => TAG_SHUTDOWN + c.index(),
            Self::CharWrite => TAG_CHAR_WRITE,
            Self::CharReadAll => TAG_CHAR_READ_ALL,
            Self::CharReadAllError => TAG_CHAR_READ_ALL_ERROR,
            Self::AudioOut => TAG_AUDIO_OUT,
            Self::AudioIn => TAG_AUDIO_IN,
            Self::Random => TAG_RANDOM,
            Self::Clock(k) => TAG_CLOCK + k.index(),
            Self::Checkpoint(c) => TAG_CHECKPOINT + c.index(),
            Self::End => TAG_END,
        }
    }

    /// Decode a tag byte. `None` means the tag is outside the closed space.
    pub fn from_tag(tag: u8) -> Option<Self> {
        let kind = match tag {
            TAG_INSTRUCTION => Self::Instruction,
            TAG_INTERRUPT => Self::Interrupt,
            TAG_EXCEPTION => Self::Exception,
            t if (TAG_ASYNC..TAG_SHUTDOWN).contains(&t) => {
                Self::Async(AsyncEventKind::from_index(t - TAG_ASYNC)?)
            }
            t if (TAG_SHUTDOWN..TAG_CHAR_WRITE).contains(&t) => {
                Self::Shutdown(ShutdownCause::from_index(t - TAG_SHUTDOWN)?)
            }
            TAG_CHAR_WRITE => Self::CharWrite,
            TAG_CHAR_READ_ALL => Self::CharReadAll,
            TAG_CHAR_READ_ALL_ERROR => Self::CharReadAllError,
            TAG_AUDIO_OUT => Self::AudioOut,
            TAG_AUDIO_IN => Self::AudioIn,
            TAG_RANDOM => Self::Random,
            t if (TAG_CLOCK..TAG_CHECKPOINT).contains(&t) => {
                Self::Clock(ClockKind::from_index(t - TAG_CLOCK)?)
            }
            t if (TAG_CHECKPOINT..TAG_END).contains(&t) => {
                Self::Checkpoint(CheckpointId::from_index(t - TAG_CHECKPOINT)?)
            }
            TAG_END => Self::End,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_async(self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instruction => f.write_str("instruction"),
            Self::Interrupt => f.write_str("interrupt"),
            Self::Exception => f.write_str("exception"),
            Self::Async(k) => write!(f, "async:{k}"),
            Self::Shutdown(c) => write!(f, "shutdown:{c}"),
            Self::CharWrite => f.write_str("char-write"),
            Self::CharReadAll => f.write_str("char-read-all"),
            Self::CharReadAllError => f.write_str("char-read-all-error"),
            Self::AudioOut => f.write_str("audio-out"),
            Self::AudioIn => f.write_str("audio-in"),
            Self::Random => f.write_str("random"),
            Self::Clock(k) => write!(f, "clock:{k}"),
            Self::Checkpoint(c) => write!(f, "checkpoint:{c}"),
            Self::End => f.write_str("end"),
        }
    }
}
