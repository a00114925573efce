use std::sync::{Condvar, Mutex};

/// Latch signalled when bring-up reaches READY.
///
/// Callers block on [`wait`](ReadySignal::wait) instead of polling; the
/// receive thread sets the latch exactly once per connection attempt. The
/// latch stays set, so a waiter arriving after the fact returns at once.
#[derive(Debug, Default)]
pub struct ReadySignal {
    ready: Mutex<bool>,
    cond: Condvar,
}

impl ReadySignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the latch for a fresh connection attempt.
    pub fn reset(&self) {
        *self.ready.lock().expect("poisoned lock") = false;
    }

    /// Set the latch and wake all waiters.
    pub fn notify(&self) {
        let mut ready = self.ready.lock().expect("poisoned lock");
        *ready = true;
        self.cond.notify_all();
    }

    /// Block until the latch is set.
    ///
    /// There is no internal timeout; closing the transport is the way to
    /// abort a bring-up that will never complete.
    pub fn wait(&self) {
        let mut ready = self.ready.lock().expect("poisoned lock");
        while !*ready {
            ready = self.cond.wait(ready).expect("poisoned lock");
        }
    }

    pub fn is_set(&self) -> bool {
        *self.ready.lock().expect("poisoned lock")
    }
}

/// Lifecycle notifications that cross from the receive thread to the
/// embedding application.
///
/// Observers are invoked in registration order, on whichever thread the
/// event originates.
pub trait EngineObserver: Send + Sync {
    /// The TCP connection to the server is up; bring-up has started.
    fn server_connected(&self) {}

    /// Bring-up reached READY; the engine is usable.
    fn engine_ready(&self) {}

    /// The server connection ended, by request or by failure.
    fn server_disconnected(&self) {}
}
