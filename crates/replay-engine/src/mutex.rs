//! FIFO ticket lock guarding the replay state.
//!
//! vCPU threads and the I/O thread all touch the log. A plain mutex lets a
//! thread that just released the lock grab it again ahead of waiters; the
//! ticket lock serves callers strictly in arrival order instead.
//!
//! ```text
//!   lock():   ticket = tail++ ; wait until head == ticket
//!   unlock(): head++ ; wake all waiters
//! ```
//!
//! Locking is not re-entrant. A thread that already holds the lock and asks
//! for it again is a programming error and panics instead of deadlocking.

use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
struct Tickets {
    /// Ticket currently being served.
    head: u64,
    /// Next ticket to hand out.
    tail: u64,
    owner: Option<ThreadId>,
}

/// A fair, non-reentrant lock.
pub struct TicketMutex<T> {
    tickets: Mutex<Tickets>,
    served: Condvar,
    /// Only ever taken by the ticket holder, so it is never contended.
    data: Mutex<T>,
}

impl<T> TicketMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            tickets: Mutex::new(Tickets::default()),
            served: Condvar::new(),
            data: Mutex::new(value),
        }
    }

    /// Wait for this thread's turn and take the lock.
    ///
    /// # Panics
    ///
    /// If the calling thread already holds the lock.
    pub fn lock(&self) -> TicketGuard<'_, T> {
        let me = thread::current().id();
        let mut tickets = self.tickets();
        assert!(
            tickets.owner != Some(me),
            "replay mutex locked twice by the same thread"
        );
        let ticket = tickets.tail;
        tickets.tail += 1;
        while tickets.head != ticket {
            tickets = self
                .served
                .wait(tickets)
                .unwrap_or_else(PoisonError::into_inner);
        }
        tickets.owner = Some(me);
        drop(tickets);

        TicketGuard {
            mutex: self,
            data: Some(self.data.lock().unwrap_or_else(PoisonError::into_inner)),
        }
    }

    /// Whether the calling thread holds the lock.
    pub fn is_locked_by_current_thread(&self) -> bool {
        self.tickets().owner == Some(thread::current().id())
    }

    /// Tickets handed out but not yet released: the holder plus waiters.
    pub fn queued(&self) -> u64 {
        let tickets = self.tickets();
        tickets.tail - tickets.head
    }

    fn tickets(&self) -> MutexGuard<'_, Tickets> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unlock(&self) {
        let mut tickets = self.tickets();
        debug_assert_eq!(tickets.owner, Some(thread::current().id()));
        tickets.owner = None;
        tickets.head += 1;
        drop(tickets);
        self.served.notify_all();
    }
}

/// Proof of holding a [`TicketMutex`]. Releases on drop.
pub struct TicketGuard<'a, T> {
    mutex: &'a TicketMutex<T>,
    data: Option<MutexGuard<'a, T>>,
}

impl<T> Deref for TicketGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.data.as_deref().unwrap_or_else(|| unreachable!())
    }
}

impl<T> DerefMut for TicketGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.data.as_deref_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T> Drop for TicketGuard<'_, T> {
    fn drop(&mut self) {
        // Release the data before passing the turn on.
        self.data.take();
        self.mutex.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn guards_data() {
        let m = TicketMutex::new(1u32);
        {
            let mut g = m.lock();
            *g += 1;
            assert!(m.is_locked_by_current_thread());
        }
        assert!(!m.is_locked_by_current_thread());
        assert_eq!(*m.lock(), 2);
    }

    #[test]
    #[should_panic(expected = "locked twice")]
    fn reentrant_lock_panics() {
        let m = TicketMutex::new(());
        let _outer = m.lock();
        let _inner = m.lock();
    }

    #[test]
    fn waiters_are_served_in_arrival_order() {
        const WAITERS: usize = 6;
        let m = Arc::new(TicketMutex::new(Vec::new()));
        let holder = m.lock();

        let mut handles = Vec::new();
        for i in 0..WAITERS {
            let m2 = Arc::clone(&m);
            handles.push(thread::spawn(move || {
                m2.lock().push(i);
            }));
            // Wait until thread i has its ticket before starting i + 1.
            while m.queued() < (i as u64) + 2 {
                thread::sleep(Duration::from_millis(1));
            }
        }

        drop(holder);
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*m.lock(), (0..WAITERS).collect::<Vec<_>>());
        assert_eq!(m.queued(), 0);
    }

    #[test]
    fn other_thread_does_not_see_ownership() {
        let m = Arc::new(TicketMutex::new(()));
        let _g = m.lock();
        let m2 = Arc::clone(&m);
        let seen = thread::spawn(move || m2.is_locked_by_current_thread())
            .join()
            .unwrap();
        assert!(!seen);
    }
}
