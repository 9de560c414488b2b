//! Discovery of bridges by well-known name.
//!
//! Hosts publish their bridge under a platform name (`androidBridge`,
//! `iOSBridge`, ...). A [`BridgeLocator`] resolves such names; the
//! correlator scans its configured target list through it until one
//! resolves.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::bridge::{Bridge, SharedBridge};

// ============================================================================
// Constants
// ============================================================================

/// Default discovery targets, scanned in this order.
pub const DEFAULT_DISCOVERY_TARGETS: &[&str] = &[
    "androidBridge",
    "browserBridge",
    "desktopBridge",
    "macBridge",
    "iOSBridge",
];

// ============================================================================
// BridgeLocator
// ============================================================================

/// Resolves binding-point names to bridges.
pub trait BridgeLocator: Send + Sync {
    /// Returns the bridge published under `name`, if any.
    fn locate(&self, name: &str) -> Option<SharedBridge>;
}

// ============================================================================
// BridgeRegistry
// ============================================================================

/// In-process table of published bridges.
///
/// The host side publishes its bridge here; correlators configured with the
/// registry pick it up on their next discovery scan.
///
/// # Example
///
/// ```ignore
/// let registry = Arc::new(BridgeRegistry::new());
/// let link = Correlator::builder().locator(registry.clone()).build()?;
///
/// // Later, from host start-up code:
/// registry.publish("androidBridge", Arc::new(android_bridge));
/// ```
#[derive(Default)]
pub struct BridgeRegistry {
    bridges: RwLock<FxHashMap<String, SharedBridge>>,
}

impl BridgeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `bridge` under `name`, replacing any previous entry.
    pub fn publish(&self, name: impl Into<String>, bridge: Arc<dyn Bridge>) {
        let name = name.into();
        debug!(name = %name, "Bridge published");
        self.bridges.write().insert(name, bridge);
    }

    /// Removes the bridge published under `name`.
    pub fn withdraw(&self, name: &str) -> Option<SharedBridge> {
        self.bridges.write().remove(name)
    }

    /// Returns `true` if a bridge is published under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bridges.read().contains_key(name)
    }
}

impl BridgeLocator for BridgeRegistry {
    fn locate(&self, name: &str) -> Option<SharedBridge> {
        self.bridges.read().get(name).cloned()
    }
}

// ============================================================================
// Tests
// ============================================================================
