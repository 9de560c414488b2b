//! Call correlation.
//!
//! This module turns a one-way string bridge into request/response calls
//! and result streams.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Correlator`] | Bridge binding, outbound calls, inbound results |
//! | [`CorrelatorBuilder`] | Fluent configuration builder |
//! | [`CorrelatorOptions`] | Discovery, id and flush settings |
//! | [`Reply`] | Future of a single correlated result |
//!
//! # Call Kinds
//!
//! | Method | Envelope id | Results | Decoding |
//! |--------|-------------|---------|----------|
//! | [`Correlator::run`] | none | none | - |
//! | [`Correlator::call`] | yes | one | raw text |
//! | [`Correlator::call_json`] | yes | one | JSON |
//! | [`Correlator::live`] | yes | many | raw text |
//! | [`Correlator::live_json`] | yes | many | JSON |
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hostlink::{ChannelBridge, Correlator};
//! use serde_json::json;
//!
//! let link = Correlator::new();
//! let (bridge, mut outbound) = ChannelBridge::new();
//! link.bind_bridge(Arc::new(bridge))?;
//!
//! let reply = link.call_json("ProjectService@get", json!({ "id": 1 }));
//! // The host reads `outbound`, executes the call and answers:
//! link.dequeue(reply.id().as_str(), r#"{"name":"x"}"#);
//! let project = reply.await?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for correlator configuration.
pub mod builder;

/// Core correlator implementation.
pub mod core;

/// Pending-job table.
pub(crate) mod jobs;

/// Correlator configuration options.
pub mod options;

/// Pending result of a correlated call.
pub mod reply;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::CorrelatorBuilder;
pub use self::core::{
    BRIDGE_BOUND_EVENT, BRIDGE_UNBOUND_EVENT, CloseCallback, Correlator, DESTROYED_EVENT,
};
pub use jobs::{Decoding, JobKind, StreamHandler};
pub use options::{CorrelatorOptions, DEFAULT_DISCOVERY_INTERVAL, DEFAULT_LAZY_BIND_DELAY};
pub use reply::Reply;
