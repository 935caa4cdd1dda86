//! Concurrency gate bounding in-flight fetches
//!
//! Every network attempt holds one permit for its duration. The permit is
//! an RAII guard, so it is returned on success, failure, timeout and when
//! the owning future is dropped.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting permit pool shared by all fetches of a run
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// A held permit; released on drop
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    /// Creates a gate admitting at most `capacity` holders at once
    ///
    /// A capacity of zero is raised to one so the gate can never deadlock.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a permit
    ///
    /// Waiters are not served in any guaranteed order. Returns `None` only
    /// if the gate has been closed.
    pub async fn acquire(&self) -> Option<GatePermit> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        Some(GatePermit { _permit: permit })
    }

    /// Closes the gate; pending and future acquisitions return `None`
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of permits currently held
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }
}
