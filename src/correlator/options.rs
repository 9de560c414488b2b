//! Correlator configuration.
//!
//! Plain data describing how a [`Correlator`](super::Correlator) discovers
//! bridges, generates ids and flushes buffered calls.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use hostlink::{CorrelatorOptions, DrainOrder};
//!
//! let options = CorrelatorOptions::new()
//!     .with_discovery_targets(["iOSBridge", "browserBridge"])
//!     .with_discovery_interval(Duration::from_millis(100))
//!     .with_drain_order(DrainOrder::Fifo);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::gate::DrainOrder;
use crate::identifiers::DEFAULT_ID_PREFIX;
use crate::transport::DEFAULT_DISCOVERY_TARGETS;

// ============================================================================
// Constants
// ============================================================================

/// Default delay between discovery scans.
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_millis(50);

/// Default delay of [`Correlator::lazy_bind_bridge`](super::Correlator::lazy_bind_bridge).
pub const DEFAULT_LAZY_BIND_DELAY: Duration = Duration::from_millis(500);

// ============================================================================
// CorrelatorOptions
// ============================================================================

/// Correlator configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatorOptions {
    /// Binding-point names scanned during discovery, in order.
    pub discovery_targets: Vec<String>,

    /// Delay between discovery scans.
    pub discovery_interval: Duration,

    /// Default delay for lazy binds.
    pub lazy_bind_delay: Duration,

    /// Prefix of generated job ids.
    pub id_prefix: String,

    /// Flush order of calls buffered before a bridge is bound.
    pub drain_order: DrainOrder,
}

// ============================================================================
// Constructors
// ============================================================================

impl CorrelatorOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            discovery_targets: DEFAULT_DISCOVERY_TARGETS
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            discovery_interval: DEFAULT_DISCOVERY_INTERVAL,
            lazy_bind_delay: DEFAULT_LAZY_BIND_DELAY,
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
            drain_order: DrainOrder::default(),
        }
    }
}

impl Default for CorrelatorOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl CorrelatorOptions {
    /// Replaces the discovery target list.
    #[inline]
    #[must_use]
    pub fn with_discovery_targets(
        mut self,
        targets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.discovery_targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Appends one discovery target.
    #[inline]
    #[must_use]
    pub fn with_discovery_target(mut self, target: impl Into<String>) -> Self {
        self.discovery_targets.push(target.into());
        self
    }

    /// Sets the delay between discovery scans.
    #[inline]
    #[must_use]
    pub fn with_discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval;
        self
    }

    /// Sets the default lazy bind delay.
    #[inline]
    #[must_use]
    pub fn with_lazy_bind_delay(mut self, delay: Duration) -> Self {
        self.lazy_bind_delay = delay;
        self
    }

    /// Sets the job id prefix.
    #[inline]
    #[must_use]
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    /// Sets the flush order of buffered calls.
    #[inline]
    #[must_use]
    pub fn with_drain_order(mut self, order: DrainOrder) -> Self {
        self.drain_order = order;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl CorrelatorOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.discovery_interval.is_zero() {
            return Err("Discovery interval must be greater than zero".to_string());
        }
        if self.id_prefix.is_empty() {
            return Err("Job id prefix must not be empty".to_string());
        }
        if self.discovery_targets.iter().any(String::is_empty) {
            return Err("Discovery target names must not be empty".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
