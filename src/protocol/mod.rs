//! Wire message types.
//!
//! This module defines the messages exchanged with the native host.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`Envelope`] | Script → Native | Correlated or fire-and-forget call |
//! | [`InboundRequest`] | Native → Script | Native-originated call |
//!
//! Results travel back out of band, through
//! [`Correlator::dequeue`](crate::Correlator::dequeue).
//!
//! # Method Naming
//!
//! Methods follow `Target@method` format:
//!
//! - `ProjectService@get`
//! - `AppService@test`
//! - `Sensor@stream`

// ============================================================================
// Submodules
// ============================================================================

/// Outbound call envelope.
pub mod envelope;

/// Native-originated request decoding.
pub mod inbound;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::Envelope;
pub use inbound::InboundRequest;

// ============================================================================
// Constants
// ============================================================================

/// Separator between target name and method name.
pub const METHOD_SEPARATOR: char = '@';

// ============================================================================
// Helpers
// ============================================================================

/// Splits `Target@method` into its target and method parts.
///
/// Without a separator the whole string is the target. The method part
/// ends at the next separator, so `A@b@c` splits into `A` and `b`.
#[inline]
#[must_use]
pub fn split_method(method: &str) -> (&str, Option<&str>) {
    let mut parts = method.split(METHOD_SEPARATOR);
    let target = parts.next().unwrap_or_default();
    (target, parts.next())
}

// ============================================================================
// Tests
// ============================================================================
