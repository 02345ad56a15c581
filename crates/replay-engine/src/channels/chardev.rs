//! Character devices: backend input, write results, and blocking reads.

use crate::context::Session;
use crate::error::fatal;
use crate::events::EventPayload;
use log::debug;
use replay_log::{Record, RecordKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Index of a registered character driver, as stored in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharDriverId(pub u8);

/// The frontend side of a character backend: receives bytes the host
/// produced for the guest.
pub trait CharBackend: Send + Sync {
    fn be_write(&self, data: &[u8]);
}

impl Session<'_> {
    /// Host bytes arrived for `driver`.
    ///
    /// RECORD queues them as an async event; PLAY drops them because the
    /// log is their only source.
    pub fn chr_be_write(&mut self, driver: CharDriverId, data: &[u8]) {
        if self.is_playing() {
            debug!("replay: dropping {} live bytes for char driver {}", data.len(), driver.0);
            return;
        }
        self.add_event(
            EventPayload::CharRead {
                driver,
                data: data.to_vec(),
            },
            0,
        );
    }

    /// Backend input for a driver known only by its backend object.
    pub fn chr_be_write_backend(
        &mut self,
        backend: &Arc<dyn CharBackend>,
        data: &[u8],
    ) {
        match self.ctx.chars.find(backend) {
            Some(index) => self.chr_be_write(CharDriverId(index), data),
            None => fatal("Replay: character driver is not registered"),
        }
    }

    // ─── Write path ─────────────────────────────────────────────────

    pub fn char_write_event_save(&mut self, result: i32, offset: i32) {
        self.save_instructions();
        self.put(&Record::CharWrite { result, offset });
    }

    /// PLAY: the recorded `(result, offset)` of the next backend write.
    pub fn char_write_event_load(&mut self) -> (i32, i32) {
        self.account_executed_instructions();
        match self.expect_event(RecordKind::CharWrite, "character write") {
            Record::CharWrite { result, offset } => (result, offset),
            other => fatal(format_args!("Replay: expected character write, got {}", other.kind())),
        }
    }

    /// Write `data` through `write`, which returns the backend's result and
    /// the number of bytes it accepted.
    ///
    /// PLAY hands `write` exactly the prefix the recorded run managed to
    /// write and returns the recorded result.
    pub fn chr_write<F>(&mut self, data: &[u8], mut write: F) -> i32
    where
        F: FnMut(&[u8]) -> (i32, usize),
    {
        if self.is_playing() {
            let (result, offset) = self.char_write_event_load();
            let accepted = usize::try_from(offset).unwrap_or(0);
            if accepted > data.len() {
                fatal(format_args!(
                    "Replay: recorded write of {accepted} bytes exceeds {} available",
                    data.len()
                ));
            }
            write(&data[..accepted]);
            return result;
        }
        let (result, accepted) = write(data);
        if self.is_recording() {
            self.char_write_event_save(result, i32::try_from(accepted).unwrap_or(i32::MAX));
        }
        result
    }

    // ─── Read-all path ──────────────────────────────────────────────

    pub fn char_read_all_save_buf(&mut self, data: &[u8]) {
        self.save_instructions();
        self.put(&Record::CharReadAll(data.to_vec()));
    }

    pub fn char_read_all_save_error(&mut self, result: i32) {
        assert!(result < 0, "replay: read-all error must be negative");
        self.save_instructions();
        self.put(&Record::CharReadAllError(result));
    }

    /// PLAY: the recorded data, or the recorded negative result.
    pub fn char_read_all_load(&mut self) -> Result<Vec<u8>, i32> {
        if self.next_event_is(RecordKind::CharReadAll) {
            match self.finish_event() {
                Record::CharReadAll(data) => Ok(data),
                other => fatal(format_args!("Replay: expected read-all data, got {}", other.kind())),
            }
        } else if self.next_event_is(RecordKind::CharReadAllError) {
            match self.finish_event() {
                Record::CharReadAllError(result) => Err(result),
                other => fatal(format_args!("Replay: expected read-all error, got {}", other.kind())),
            }
        } else {
            fatal("Missing character read all event in the replay log");
        }
    }

    /// Blocking read of up to `buf.len()` bytes through `read`, which
    /// returns a byte count or a negative error.
    pub fn chr_read_all<F>(&mut self, buf: &mut [u8], read: F) -> i32
    where
        F: FnOnce(&mut [u8]) -> i32,
    {
        if self.is_playing() {
            return match self.char_read_all_load() {
                Ok(data) => {
                    if data.len() > buf.len() {
                        fatal(format_args!(
                            "Replay: recorded read of {} bytes exceeds buffer of {}",
                            data.len(),
                            buf.len()
                        ));
                    }
                    buf[..data.len()].copy_from_slice(&data);
                    i32::try_from(data.len()).unwrap_or(i32::MAX)
                }
                Err(result) => result,
            };
        }
        let result = read(buf);
        if self.is_recording() {
            match usize::try_from(result) {
                Ok(len) => self.char_read_all_save_buf(&buf[..len.min(buf.len())]),
                Err(_) => self.char_read_all_save_error(result),
            }
        }
        result
    }
}
