//! Bridge transport layer.
//!
//! The native host exposes one primitive: accept a string. This module
//! models that primitive and the places a bridge can be discovered.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Correlator     │      post_message(&str)      │  Native host    │
//! │                 │─────────────────────────────►│  (Android, iOS, │
//! │  jobs, gate     │                              │   desktop, web) │
//! │                 │◄─────────────────────────────│                 │
//! └─────────────────┘      dequeue(id, result)     └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bridge` | The [`Bridge`] trait and ready-made adapters |
//! | `locator` | Named binding points scanned during discovery |

// ============================================================================
// Submodules
// ============================================================================

/// Bridge trait and adapters.
pub mod bridge;

/// Discovery of bridges by well-known name.
pub mod locator;

// ============================================================================
// Re-exports
// ============================================================================

pub use bridge::{Bridge, ChannelBridge, FnBridge, SharedBridge};
pub use locator::{BridgeLocator, BridgeRegistry, DEFAULT_DISCOVERY_TARGETS};
