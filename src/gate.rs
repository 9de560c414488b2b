//! Readiness gate.
//!
//! Buffers callbacks until the gate turns ready, then runs them. Once ready,
//! newly registered callbacks run immediately at registration.
//!
//! # Drain Order
//!
//! Buffered callbacks drain last-registered-first by default
//! ([`DrainOrder::Lifo`]). Callers that issue several calls before a bridge
//! is bound will therefore see them reach the bridge in reverse order.
//! [`DrainOrder::Fifo`] drains in registration order instead.

// ============================================================================
// Imports
// ============================================================================

use std::mem;

use parking_lot::Mutex;
use tracing::trace;

// ============================================================================
// Types
// ============================================================================

/// Zero-argument callback buffered by the gate.
pub type ReadyCallback = Box<dyn FnOnce() + Send>;

/// Order in which buffered callbacks run when the gate opens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DrainOrder {
    /// Last registered runs first.
    #[default]
    Lifo,
    /// Registration order.
    Fifo,
}

struct GateState {
    ready: bool,
    callbacks: Vec<ReadyCallback>,
}

// ============================================================================
// ReadyGate
// ============================================================================

/// Boolean readiness with a buffer of pending callbacks.
///
/// Callbacks always run outside the internal lock, so they may register
/// further callbacks or flip the gate.
pub struct ReadyGate {
    state: Mutex<GateState>,
    order: DrainOrder,
}

impl ReadyGate {
    /// Creates a closed gate with the default drain order.
    #[must_use]
    pub fn new() -> Self {
        Self::with_order(DrainOrder::default())
    }

    /// Creates a closed gate with the given drain order.
    #[must_use]
    pub fn with_order(order: DrainOrder) -> Self {
        Self {
            state: Mutex::new(GateState {
                ready: false,
                callbacks: Vec::new(),
            }),
            order,
        }
    }

    /// Returns `true` if the gate is open.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    /// Returns the number of buffered callbacks.
    #[inline]
    #[must_use]
    pub fn pending_callbacks(&self) -> usize {
        self.state.lock().callbacks.len()
    }

    /// Opens or closes the gate.
    ///
    /// Opening drains the buffer, running each callback exactly once.
    /// Closing leaves the buffer as it is.
    pub fn set_ready(&self, ready: bool) {
        if !ready {
            self.state.lock().ready = false;
            return;
        }

        for callback in self.open() {
            callback();
        }
    }

    /// Opens the gate and hands back the buffered callbacks in drain order.
    ///
    /// The callbacks are not run; the caller runs them once its own locks
    /// are released.
    #[must_use]
    pub fn open(&self) -> Vec<ReadyCallback> {
        let mut drained = {
            let mut state = self.state.lock();
            state.ready = true;
            mem::take(&mut state.callbacks)
        };

        if !drained.is_empty() {
            trace!(count = drained.len(), order = ?self.order, "Draining ready callbacks");
        }
        if self.order == DrainOrder::Lifo {
            drained.reverse();
        }
        drained
    }

    /// Runs `callback` now if the gate is open, otherwise buffers it.
    pub fn on_ready(&self, callback: impl FnOnce() + Send + 'static) {
        {
            let mut state = self.state.lock();
            if !state.ready {
                state.callbacks.push(Box::new(callback));
                return;
            }
        }
        callback();
    }

    /// Drops every buffered callback without running it and closes the gate.
    pub fn destroy(&self) {
        // Dropped outside the lock: a callback may own a responder whose
        // drop wakes another task.
        drop(self.clear());
    }

    /// Closes the gate and hands back the buffered callbacks unrun.
    #[must_use]
    pub fn clear(&self) -> Vec<ReadyCallback> {
        let mut state = self.state.lock();
        state.ready = false;
        mem::take(&mut state.callbacks)
    }
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
