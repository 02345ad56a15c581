//! Audio timing: how many samples the card played and captured.
//!
//! Output samples are produced by the guest and need no logging, only the
//! played count. Captured samples come from the host and are logged whole.

use crate::context::Session;
use crate::error::fatal;
use crate::verified::ring_positions;
use replay_log::{AudioFrame, Record, RecordKind};

impl Session<'_> {
    /// Samples played by the host backend. PLAY overwrites `played` with
    /// the recorded count.
    pub fn audio_out(&mut self, played: &mut u64) {
        if self.is_recording() {
            self.save_instructions();
            self.put(&Record::AudioOut { played: *played });
        } else if self.is_playing() {
            self.account_executed_instructions();
            match self.expect_event(RecordKind::AudioOut, "audio out") {
                Record::AudioOut { played: recorded } => *played = recorded,
                other => fatal(format_args!("Replay: expected audio out, got {}", other.kind())),
            }
        }
    }

    /// Samples captured into the ring buffer `ring`, ending just before
    /// `wpos`. PLAY overwrites the count, the write position and those
    /// ring slots with the recorded capture.
    pub fn audio_in(&mut self, recorded: &mut u64, ring: &mut [AudioFrame], wpos: &mut u64) {
        if self.is_recording() {
            let Some(positions) = ring_positions(*wpos, *recorded, ring.len()) else {
                fatal(format_args!(
                    "Replay: bad capture geometry (recorded {}, wpos {}, ring {})",
                    recorded,
                    wpos,
                    ring.len()
                ));
            };
            self.save_instructions();
            self.put(&Record::AudioIn {
                recorded: *recorded,
                wpos: *wpos,
                frames: positions.iter().map(|&p| ring[p]).collect(),
            });
        } else if self.is_playing() {
            self.account_executed_instructions();
            let Record::AudioIn {
                recorded: count,
                wpos: pos,
                frames,
            } = self.expect_event(RecordKind::AudioIn, "audio in")
            else {
                fatal("Replay: expected audio in");
            };
            let Some(positions) = ring_positions(pos, count, ring.len()) else {
                fatal(format_args!(
                    "Replay: recorded capture (recorded {count}, wpos {pos}) does not fit ring of {}",
                    ring.len()
                ));
            };
            for (&p, frame) in positions.iter().zip(frames) {
                ring[p] = frame;
            }
            *recorded = count;
            *wpos = pos;
        }
    }
}
