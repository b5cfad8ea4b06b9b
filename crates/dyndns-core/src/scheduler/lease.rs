//! Single-slot attempt lease
//!
//! Held while a cycle waits for its connection. Triggers that find the
//! lease taken are dropped, and the debounce gate refuses to admit an
//! update while any cycle holds it.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct AttemptLease {
    held: AtomicBool,
}

impl AttemptLease {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease, or `None` if another cycle holds it
    pub fn try_acquire(&self) -> Option<LeaseGuard<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LeaseGuard { lease: self })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Ownership of the attempt lease; released on drop
#[derive(Debug)]
#[must_use = "the lease is released as soon as the guard is dropped"]
pub struct LeaseGuard<'a> {
    lease: &'a AttemptLease,
}

impl LeaseGuard<'_> {
    /// Release the lease explicitly
    pub fn release(self) {}
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        self.lease.held.store(false, Ordering::Release);
    }
}
