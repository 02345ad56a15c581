//! Decoded log records.
//!
//! A [`Record`] is one tag plus its payload. Decoding reads the whole record
//! at once, so the engine can peek a fully typed value instead of a bare tag.

use crate::codec::{LogReader, LogWriter};
use crate::error::LogError;
use crate::input::InputEvent;
use crate::kind::{AsyncEventKind, CheckpointId, ClockKind, RecordKind, ShutdownCause};
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, Write};

/// One left/right sample pair as stored by `AUDIO_IN`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFrame {
    pub left: u64,
    pub right: u64,
}

/// Payload of an `ASYNC+k` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsyncRecord {
    Bh { id: u64 },
    BhOneshot { id: u64 },
    Input(InputEvent),
    InputSync,
    CharRead { driver: u8, data: Vec<u8> },
    Block { id: u64 },
    Net { filter: u8, flags: u32, data: Vec<u8> },
}

impl AsyncRecord {
    pub fn kind(&self) -> AsyncEventKind {
        match self {
            Self::Bh { .. } => AsyncEventKind::Bh,
            Self::BhOneshot { .. } => AsyncEventKind::BhOneshot,
            Self::Input(_) => AsyncEventKind::Input,
            Self::InputSync => AsyncEventKind::InputSync,
            Self::CharRead { .. } => AsyncEventKind::CharRead,
            Self::Block { .. } => AsyncEventKind::Block,
            Self::Net { .. } => AsyncEventKind::Net,
        }
    }

    /// Correlation id for the kinds matched by id.
    pub fn id(&self) -> Option<u64> {
        match self {
            Self::Bh { id } | Self::BhOneshot { id } | Self::Block { id } => Some(*id),
            _ => None,
        }
    }

    fn encode<W: Write + Seek>(&self, w: &mut LogWriter<W>) {
        match self {
            Self::Bh { id } | Self::BhOneshot { id } | Self::Block { id } => w.put_qword(*id),
            Self::Input(event) => event.encode(w),
            Self::InputSync => {}
            Self::CharRead { driver, data } => {
                w.put_byte(*driver);
                w.put_array(data);
            }
            Self::Net {
                filter,
                flags,
                data,
            } => {
                w.put_byte(*filter);
                w.put_dword(*flags);
                w.put_array(data);
            }
        }
    }

    fn decode<R: Read + Seek>(
        kind: AsyncEventKind,
        r: &mut LogReader<R>,
    ) -> Result<Self, LogError> {
        let record = match kind {
            AsyncEventKind::Bh => Self::Bh { id: r.get_qword()? },
            AsyncEventKind::BhOneshot => Self::BhOneshot { id: r.get_qword()? },
            AsyncEventKind::Input => Self::Input(InputEvent::decode(r)?),
            AsyncEventKind::InputSync => Self::InputSync,
            AsyncEventKind::CharRead => Self::CharRead {
                driver: r.get_byte()?,
                data: r.get_array()?,
            },
            AsyncEventKind::Block => Self::Block { id: r.get_qword()? },
            AsyncEventKind::Net => Self::Net {
                filter: r.get_byte()?,
                flags: r.get_dword()?,
                data: r.get_array()?,
            },
        };
        Ok(record)
    }
}

/// A complete log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    /// Instructions executed since the previous record.
    Instruction(u32),
    Interrupt,
    Exception,
    Async(AsyncRecord),
    Shutdown(ShutdownCause),
    CharWrite { result: i32, offset: i32 },
    CharReadAll(Vec<u8>),
    CharReadAllError(i32),
    AudioOut { played: u64 },
    AudioIn {
        recorded: u64,
        wpos: u64,
        frames: Vec<AudioFrame>,
    },
    Random { ret: i32, data: Vec<u8> },
    Clock { kind: ClockKind, value: i64 },
    Checkpoint(CheckpointId),
    End,
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Instruction(_) => RecordKind::Instruction,
            Self::Interrupt => RecordKind::Interrupt,
            Self::Exception => RecordKind::Exception,
            Self::Async(a) => RecordKind::Async(a.kind()),
            Self::Shutdown(cause) => RecordKind::Shutdown(*cause),
            Self::CharWrite { .. } => RecordKind::CharWrite,
            Self::CharReadAll(_) => RecordKind::CharReadAll,
            Self::CharReadAllError(_) => RecordKind::CharReadAllError,
            Self::AudioOut { .. } => RecordKind::AudioOut,
            Self::AudioIn { .. } => RecordKind::AudioIn,
            Self::Random { .. } => RecordKind::Random,
            Self::Clock { kind, .. } => RecordKind::Clock(*kind),
            Self::Checkpoint(id) => RecordKind::Checkpoint(*id),
            Self::End => RecordKind::End,
        }
    }

    pub fn encode<W: Write + Seek>(&self, w: &mut LogWriter<W>) {
        w.put_byte(self.kind().tag());
        match self {
            Self::Instruction(delta) => w.put_dword(*delta),
            Self::Async(a) => a.encode(w),
            Self::CharWrite { result, offset } => {
                w.put_i32(*result);
                w.put_i32(*offset);
            }
            Self::CharReadAll(data) => w.put_array(data),
            Self::CharReadAllError(result) => w.put_i32(*result),
            Self::AudioOut { played } => w.put_qword(*played),
            Self::AudioIn {
                recorded,
                wpos,
                frames,
            } => {
                debug_assert_eq!(*recorded, frames.len() as u64);
                w.put_qword(*recorded);
                w.put_qword(*wpos);
                for frame in frames {
                    w.put_qword(frame.left);
                    w.put_qword(frame.right);
                }
            }
            Self::Random { ret, data } => {
                w.put_i32(*ret);
                w.put_array(data);
            }
            Self::Clock { value, .. } => w.put_i64(*value),
            Self::Interrupt
            | Self::Exception
            | Self::Shutdown(_)
            | Self::Checkpoint(_)
            | Self::End => {}
        }
    }

    /// Read one complete record from the current position.
    pub fn decode<R: Read + Seek>(r: &mut LogReader<R>) -> Result<Self, LogError> {
        let offset = r.position();
        let tag = r.get_byte()?;
        let kind = RecordKind::from_tag(tag).ok_or(LogError::UnknownTag { tag, offset })?;
        let record = match kind {
            RecordKind::Instruction => Self::Instruction(r.get_dword()?),
            RecordKind::Interrupt => Self::Interrupt,
            RecordKind::Exception => Self::Exception,
            RecordKind::Async(k) => Self::Async(AsyncRecord::decode(k, r)?),
            RecordKind::Shutdown(cause) => Self::Shutdown(cause),
            RecordKind::CharWrite => Self::CharWrite {
                result: r.get_i32()?,
                offset: r.get_i32()?,
            },
            RecordKind::CharReadAll => Self::CharReadAll(r.get_array()?),
            RecordKind::CharReadAllError => Self::CharReadAllError(r.get_i32()?),
            RecordKind::AudioOut => Self::AudioOut {
                played: r.get_qword()?,
            },
            RecordKind::AudioIn => {
                let recorded = r.get_qword()?;
                let wpos = r.get_qword()?;
                let mut frames = Vec::new();
                for _ in 0..recorded {
                    frames.push(AudioFrame {
                        left: r.get_qword()?,
                        right: r.get_qword()?,
                    });
                }
                Self::AudioIn {
                    recorded,
                    wpos,
                    frames,
                }
            }
            RecordKind::Random => Self::Random {
                ret: r.get_i32()?,
                data: r.get_array()?,
            },
            RecordKind::Clock(kind) => Self::Clock {
                kind,
                value: r.get_i64()?,
            },
            RecordKind::Checkpoint(id) => Self::Checkpoint(id),
            RecordKind::End => Self::End,
        };
        Ok(record)
    }
}
