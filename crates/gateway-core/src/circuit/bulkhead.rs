//! Bounded concurrency per circuit, with a FIFO wait queue.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::GatewayError;

struct State {
    in_flight: u32,
    queued: u32,
}

/// Admits up to `max_concurrent` concurrent operations; beyond that, queues
/// up to `max_queued` callers FIFO, each bounded by `queue_timeout`.
/// Accounting is exact: a [`Permit`]'s `Drop` always releases its slot, so a
/// panicking caller can't leak one.
pub struct Bulkhead {
    max_concurrent: u32,
    max_queued: u32,
    queue_timeout: Duration,
    state: Mutex<State>,
    admitted: Condvar,
}

/// Holds an `Arc<Bulkhead>` rather than a borrow so the blocking `acquire`
/// call can run inside `tokio::task::spawn_blocking` and the permit can be
/// moved back across that boundary into async code.
pub struct Permit {
    bulkhead: Arc<Bulkhead>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        let mut state = self.bulkhead.state.lock().unwrap();
        state.in_flight = state.in_flight.saturating_sub(1);
        self.bulkhead.admitted.notify_one();
    }
}

impl Bulkhead {
    pub fn new(max_concurrent: u32, max_queued: u32, queue_timeout: Duration) -> Self {
        Self {
            max_concurrent,
            max_queued,
            queue_timeout,
            state: Mutex::new(State { in_flight: 0, queued: 0 }),
            admitted: Condvar::new(),
        }
    }

    pub fn in_flight(&self) -> u32 {
        self.state.lock().unwrap().in_flight
    }

    pub fn queued(&self) -> u32 {
        self.state.lock().unwrap().queued
    }

    /// Blocks the calling thread via a condvar until a slot is free or the
    /// queue timeout elapses. Takes an owned `Arc<Self>` so the blocking
    /// wait can run inside `tokio::task::spawn_blocking` — see
    /// [`crate::circuit::Circuit::acquire_async`], which is how every async
    /// call site reaches this rather than blocking a runtime worker thread.
    pub fn acquire(self: Arc<Self>) -> Result<Permit, GatewayError> {
        let mut state = self.state.lock().unwrap();
        if state.in_flight < self.max_concurrent {
            state.in_flight += 1;
            return Ok(Permit { bulkhead: Arc::clone(&self) });
        }

        if state.queued >= self.max_queued {
            return Err(GatewayError::BulkheadTimeout("queue full".into()));
        }

        state.queued += 1;
        let deadline = Instant::now() + self.queue_timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                state.queued = state.queued.saturating_sub(1);
                return Err(GatewayError::BulkheadTimeout("queue wait exceeded".into()));
            }
            let (guard, timeout_result) = self
                .admitted
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = guard;
            if state.in_flight < self.max_concurrent {
                state.queued = state.queued.saturating_sub(1);
                state.in_flight += 1;
                return Ok(Permit { bulkhead: Arc::clone(&self) });
            }
            if timeout_result.timed_out() {
                state.queued = state.queued.saturating_sub(1);
                return Err(GatewayError::BulkheadTimeout("queue wait exceeded".into()));
            }
        }
    }
}
