//! Builder pattern for correlator configuration.
//!
//! Provides a fluent API for configuring and creating [`Correlator`] instances.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hostlink::{BridgeRegistry, Correlator, DrainOrder};
//!
//! let registry = Arc::new(BridgeRegistry::new());
//! let link = Correlator::builder()
//!     .locator(registry.clone())
//!     .discovery_targets(["desktopBridge"])
//!     .drain_order(DrainOrder::Fifo)
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::gate::DrainOrder;
use crate::identifiers::{Clock, IdGenerator};
use crate::transport::BridgeLocator;

use super::core::Correlator;
use super::options::CorrelatorOptions;

// ============================================================================
// CorrelatorBuilder
// ============================================================================

/// Builder for configuring a [`Correlator`] instance.
///
/// Use [`Correlator::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct CorrelatorBuilder {
    /// Correlator options.
    options: CorrelatorOptions,
    /// Resolves discovery targets. Discovery is off without one.
    locator: Option<Arc<dyn BridgeLocator>>,
    /// Clock for job ids.
    clock: Option<Clock>,
}

impl fmt::Debug for CorrelatorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelatorBuilder")
            .field("options", &self.options)
            .field("locator", &self.locator.is_some())
            .field("clock", &self.clock.is_some())
            .finish()
    }
}

// ============================================================================
// CorrelatorBuilder Implementation
// ============================================================================

impl CorrelatorBuilder {
    /// Creates a new builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: CorrelatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the locator used for bridge discovery.
    #[inline]
    #[must_use]
    pub fn locator(mut self, locator: Arc<dyn BridgeLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Replaces the discovery target list.
    #[inline]
    #[must_use]
    pub fn discovery_targets(
        mut self,
        targets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.options = self.options.with_discovery_targets(targets);
        self
    }

    /// Sets the flush order of calls buffered before binding.
    #[inline]
    #[must_use]
    pub fn drain_order(mut self, order: DrainOrder) -> Self {
        self.options = self.options.with_drain_order(order);
        self
    }

    /// Sets the millisecond clock used for job ids.
    #[inline]
    #[must_use]
    pub fn id_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the correlator with validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the options are invalid.
    pub fn build(self) -> Result<Correlator> {
        self.options.validate().map_err(Error::config)?;

        let prefix = self.options.id_prefix.clone();
        let ids = match self.clock {
            Some(clock) => IdGenerator::with_clock(prefix, clock),
            None => IdGenerator::new(prefix),
        };

        Ok(Correlator::from_parts(self.options, self.locator, ids))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::transport::BridgeRegistry;

    #[test]
    fn test_new_creates_default_builder() {
        let builder = CorrelatorBuilder::new();
        assert_eq!(builder.options, CorrelatorOptions::default());
        assert!(builder.locator.is_none());
        assert!(builder.clock.is_none());
    }

    #[test]
    fn test_discovery_targets_replaces_list() {
        let builder = CorrelatorBuilder::new().discovery_targets(["macBridge"]);
        assert_eq!(builder.options.discovery_targets, vec!["macBridge"]);
    }

    #[test]
    fn test_locator_sets_locator() {
        let builder = CorrelatorBuilder::new().locator(Arc::new(BridgeRegistry::new()));
        assert!(builder.locator.is_some());
    }

    #[test]
    fn test_build_default() {
        let link = CorrelatorBuilder::new().build().expect("valid defaults");
        assert!(!link.is_bound());
        assert_eq!(link.options().id_prefix, "li");
    }

    #[test]
    fn test_build_uses_prefix() {
        let link = CorrelatorBuilder::new()
            .options(CorrelatorOptions::new().with_id_prefix("job"))
            .build()
            .expect("valid options");

        let id = link.live("Svc@stream", serde_json::Value::Null, |_| {});
        assert!(id.as_str().starts_with("job"));
    }

    #[test]
    fn test_build_fails_with_invalid_options() {
        let result = CorrelatorBuilder::new()
            .options(CorrelatorOptions::new().with_discovery_interval(Duration::ZERO))
            .build();

        let err = result.unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("Discovery interval"));
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = CorrelatorBuilder::new().drain_order(DrainOrder::Fifo);
        let cloned = builder.clone();
        assert_eq!(builder.options, cloned.options);
    }
}
