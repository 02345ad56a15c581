//! Human input (keyboard, mouse, touch).

use crate::context::Session;
use crate::events::EventPayload;
use replay_log::InputEvent;

/// Delivers input to the guest's input devices.
pub trait InputSink: Send + Sync {
    fn send(&self, event: &InputEvent);
    /// End of a batch of events.
    fn sync(&self);
}

impl Session<'_> {
    /// A live input event. Dropped during PLAY.
    pub fn add_input_event(&mut self, event: InputEvent) {
        if !self.is_playing() {
            self.add_event(EventPayload::Input(event), 0);
        }
    }

    pub fn add_input_sync_event(&mut self) {
        if !self.is_playing() {
            self.add_event(EventPayload::InputSync, 0);
        }
    }
}
