//! Random bytes handed to the guest.

use crate::context::Session;
use crate::error::fatal;
use rand::RngCore;
use replay_log::{Record, RecordKind};

impl Session<'_> {
    pub fn save_random(&mut self, ret: i32, data: &[u8]) {
        self.save_instructions();
        self.put(&Record::Random {
            ret,
            data: data.to_vec(),
        });
    }

    /// PLAY: fill `buf` with the recorded bytes and return the recorded
    /// result.
    pub fn read_random(&mut self, buf: &mut [u8]) -> i32 {
        self.account_executed_instructions();
        match self.expect_event(RecordKind::Random, "random") {
            Record::Random { ret, data } => {
                if data.len() != buf.len() {
                    fatal(format_args!(
                        "Replay: recorded {} random bytes, guest asked for {}",
                        data.len(),
                        buf.len()
                    ));
                }
                buf.copy_from_slice(&data);
                ret
            }
            other => fatal(format_args!("Replay: expected random, got {}", other.kind())),
        }
    }

    /// Fill `buf` for the guest: from `rng` (and the log, when recording),
    /// or from the log when replaying. Returns 0 on success, -1 on failure.
    pub fn guest_getrandom<R: RngCore + ?Sized>(&mut self, rng: &mut R, buf: &mut [u8]) -> i32 {
        if self.is_playing() {
            return self.read_random(buf);
        }
        let ret = match rng.try_fill_bytes(buf) {
            Ok(()) => 0,
            Err(_) => -1,
        };
        if self.is_recording() {
            self.save_random(ret, buf);
        }
        ret
    }
}
