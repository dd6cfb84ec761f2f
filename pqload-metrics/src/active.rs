use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    current: u64,
    entered: u64,
}

/// Number of requests currently in flight.
///
/// Shared by every request executor (which enter and leave it) and the
/// resource sampler (which only reads it). All read-modify-write happens
/// under a single lock. Reads are a snapshot and may be stale by the time
/// the caller acts on them.
#[derive(Debug, Clone, Default)]
pub struct ActiveRequests {
    inner: Arc<Mutex<Inner>>,
}

impl ActiveRequests {
    pub fn new() -> ActiveRequests {
        ActiveRequests::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the counter torn,
        // so a poisoned lock is still safe to use.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Increment the counter. The returned guard decrements it exactly once
    /// when dropped, including during unwinding.
    pub fn enter(&self) -> InFlight {
        let mut inner = self.lock();
        inner.current += 1;
        inner.entered += 1;
        InFlight {
            active: self.clone(),
        }
    }

    /// Current number of in-flight requests.
    pub fn current(&self) -> u64 {
        self.lock().current
    }

    /// Total number of increments since creation.
    pub fn entered(&self) -> u64 {
        self.lock().entered
    }

    fn leave(&self) {
        let mut inner = self.lock();
        debug_assert!(inner.current > 0, "active request counter underflow");
        inner.current = inner.current.saturating_sub(1);
    }
}

/// Guard for one in-flight request, see [`ActiveRequests::enter`].
#[must_use = "dropping the guard immediately marks the request as finished"]
#[derive(Debug)]
pub struct InFlight {
    active: ActiveRequests,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.active.leave();
    }
}
