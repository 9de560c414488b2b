//! Hostlink - Call correlation for script-to-native bridges.
//!
//! Embedded runtimes (mobile web views, desktop shells, browser extensions)
//! usually give script code a single primitive: post a string to the native
//! host. This library builds calls, replies and subscriptions on top of it.
//!
//! # Architecture
//!
//! - **Outbound**: calls are serialized into `{ id, method, params }`
//!   envelopes and posted through the bound [`Bridge`]
//! - **Inbound**: the host answers by calling [`Correlator::dequeue`] with
//!   the job id and the raw result
//! - **Readiness**: calls made before a bridge is bound wait in a
//!   [`ReadyGate`] and are flushed on binding
//! - **Discovery**: a [`BridgeLocator`] is polled for well-known binding
//!   points until one resolves
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use hostlink::{ChannelBridge, Correlator, Result};
//! use serde_json::{Value, json};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let link = Correlator::new();
//!     let (bridge, mut outbound) = ChannelBridge::new();
//!     link.bind_bridge(Arc::new(bridge))?;
//!
//!     // Fire and forget
//!     link.run("AppService@test", Value::Null);
//!
//!     // Request and response
//!     let reply = link.call_json("ProjectService@get", json!({ "id": 1 }));
//!     link.dequeue(reply.id().as_str(), r#"{"name":"x"}"#);
//!     println!("{:?}", reply.await?);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`codec`] | Lenient JSON decoding of payloads |
//! | [`correlator`] | [`Correlator`], its builder, options and [`Reply`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`events`] | Named-event emitter |
//! | [`gate`] | Readiness gate buffering callbacks |
//! | [`identifiers`] | Job ids and id generation |
//! | [`protocol`] | Envelope and inbound request types |
//! | [`transport`] | Bridge trait, adapters and discovery |

// ============================================================================
// Modules
// ============================================================================

/// Lenient JSON decoding.
///
/// Malformed input yields `None` instead of an error.
pub mod codec;

/// Call correlation.
///
/// Use [`Correlator::new()`] or [`Correlator::builder()`] to create one.
pub mod correlator;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Named-event emitter.
pub mod events;

/// Readiness gate.
pub mod gate;

/// Job ids and id generation.
pub mod identifiers;

/// Wire message types.
pub mod protocol;

/// Bridge transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Codec
pub use codec::{Payload, parse_json, parse_json_str};

// Correlator types
pub use correlator::{
    Correlator, CorrelatorBuilder, CorrelatorOptions, Decoding, JobKind, Reply, StreamHandler,
};

// Error types
pub use error::{Error, Result};

// Events
pub use events::{EventEmitter, ListenerId};

// Gate
pub use gate::{DrainOrder, ReadyGate};

// Identifier types
pub use identifiers::{IdGenerator, JobId};

// Protocol types
pub use protocol::{Envelope, InboundRequest};

// Transport types
pub use transport::{Bridge, BridgeLocator, BridgeRegistry, ChannelBridge, FnBridge, SharedBridge};
