//! Bridge trait and adapters.
//!
//! A bridge is an opaque sink for serialized messages. Delivery semantics
//! (sync or async, reliable or not) belong to the bridge, not to this crate.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

// ============================================================================
// Bridge
// ============================================================================

/// Native sink accepting serialized messages.
///
/// # Message Format
///
/// ```json
/// { "id": "li1700000000000123", "method": "ProjectService@delete", "params": { "id": 1 } }
/// ```
pub trait Bridge: Send + Sync {
    /// Hands one message to the native side.
    fn post_message(&self, message: &str);
}

/// Shared, type-erased bridge.
pub type SharedBridge = Arc<dyn Bridge>;

// ============================================================================
// FnBridge
// ============================================================================

/// Bridge backed by a closure.
///
/// # Example
///
/// ```ignore
/// let bridge = FnBridge::new(|message| println!("to native: {message}"));
/// link.bind_bridge(Arc::new(bridge))?;
/// ```
pub struct FnBridge<F> {
    post: F,
}

impl<F> FnBridge<F>
where
    F: Fn(&str) + Send + Sync,
{
    /// Wraps a closure as a bridge.
    #[inline]
    #[must_use]
    pub fn new(post: F) -> Self {
        Self { post }
    }
}

impl<F> Bridge for FnBridge<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn post_message(&self, message: &str) {
        (self.post)(message);
    }
}

impl<F> fmt::Debug for FnBridge<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnBridge").finish_non_exhaustive()
    }
}

// ============================================================================
// ChannelBridge
// ============================================================================

/// Bridge forwarding messages into a tokio channel.
///
/// The receiving half is typically drained by a host task that executes
/// calls and answers through
/// [`Correlator::dequeue`](crate::Correlator::dequeue).
#[derive(Debug, Clone)]
pub struct ChannelBridge {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelBridge {
    /// Creates a bridge and the receiver its messages arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns `true` if the receiving half has been dropped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Bridge for ChannelBridge {
    fn post_message(&self, message: &str) {
        if self.tx.send(message.to_string()).is_err() {
            warn!("Bridge receiver dropped, message discarded");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
