//! Outbound call envelope.
//!
//! Every call leaves as a single JSON string handed to the bridge.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::JobId;

use super::split_method;

// ============================================================================
// Envelope
// ============================================================================

/// A call from script side to native side.
///
/// # Format
///
/// Correlated call:
/// ```json
/// { "id": "li1700000000000123", "method": "ProjectService@get", "params": { "id": 1 } }
/// ```
///
/// Fire-and-forget (no `id`):
/// ```json
/// { "method": "AppService@test" }
/// ```
///
/// `params` is omitted when `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation id, absent for fire-and-forget calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JobId>,

    /// Method in `Target@method` format.
    pub method: String,

    /// Call arguments: any JSON value, including a string.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl Envelope {
    /// Creates a correlated call envelope.
    #[inline]
    #[must_use]
    pub fn call(id: JobId, method: impl Into<String>, params: Value) -> Self {
        Self {
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    /// Creates a fire-and-forget envelope.
    #[inline]
    #[must_use]
    pub fn fire(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: None,
            method: method.into(),
            params,
        }
    }

    /// Returns `true` if a result is expected for this envelope.
    #[inline]
    #[must_use]
    pub fn is_correlated(&self) -> bool {
        self.id.is_some()
    }

    /// Returns the target name part of the method.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &str {
        split_method(&self.method).0
    }

    /// Returns the method name part, if the method has one.
    #[inline]
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        split_method(&self.method).1
    }

    /// Serializes to the wire string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a wire string, as a host would.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if `text` is not an envelope.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
