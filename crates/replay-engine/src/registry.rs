//! Index registries for channel endpoints.
//!
//! Character drivers and network filters are referenced in the log by a
//! one-byte index into the registration order. Registration happens while
//! the session is built, so recording and replay see the same indices as
//! long as devices attach in the same order.

use crate::error::ReplayError;
use std::sync::Arc;

pub(crate) struct Registry<T: ?Sized> {
    what: &'static str,
    entries: Vec<Arc<T>>,
}

impl<T: ?Sized> Registry<T> {
    pub(crate) const LIMIT: usize = u8::MAX as usize + 1;

    pub(crate) fn new(what: &'static str) -> Self {
        Self {
            what,
            entries: Vec::new(),
        }
    }

    pub(crate) fn register(&mut self, entry: Arc<T>) -> Result<u8, ReplayError> {
        let index = u8::try_from(self.entries.len()).map_err(|_| ReplayError::TooManyChannels {
            what: self.what,
            limit: Self::LIMIT,
        })?;
        self.entries.push(entry);
        Ok(index)
    }

    pub(crate) fn get(&self, index: u8) -> Option<&Arc<T>> {
        self.entries.get(index as usize)
    }

    /// Index of an already registered entry, by identity.
    pub(crate) fn find(&self, entry: &Arc<T>) -> Option<u8> {
        let wanted = Arc::as_ptr(entry) as *const ();
        self.entries
            .iter()
            .position(|e| Arc::as_ptr(e) as *const () == wanted)
            .map(|i| i as u8)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
