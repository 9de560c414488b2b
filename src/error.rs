//! Error types for hostlink.
//!
//! Most failure modes of the bridge are deliberately *not* errors: malformed
//! payloads degrade to `None`, unknown job ids are ignored. The variants here
//! cover what a caller can still act on.
//!
//! # Usage
//!
//! ```ignore
//! use hostlink::{Correlator, Result};
//!
//! async fn example(link: &Correlator) -> Result<()> {
//!     let project = link.call_json("ProjectService@get", json!({ "id": 1 })).await?;
//!     println!("{project:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Binding | [`Error::BridgeAlreadyBound`], [`Error::NoRuntime`] |
//! | Calls | [`Error::Abandoned`], [`Error::Timeout`] |
//! | External | [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;
use std::time::Duration;

use thiserror::Error;

use crate::identifiers::JobId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned by [`CorrelatorBuilder::build`](crate::CorrelatorBuilder::build)
    /// when options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Binding Errors
    // ========================================================================
    /// A bridge is already bound.
    ///
    /// The existing binding is kept. Unbind first to switch bridges.
    #[error("Bridge already bound, unbind first to bind another bridge")]
    BridgeAlreadyBound,

    /// No tokio runtime is available for a timer-based operation.
    #[error("No async runtime available for {operation}")]
    NoRuntime {
        /// The operation that needed a runtime.
        operation: String,
    },

    // ========================================================================
    // Call Errors
    // ========================================================================
    /// The job was dropped before a result arrived.
    ///
    /// Happens when the correlator is destroyed, or the call is cancelled
    /// with [`Correlator::die`](crate::Correlator::die).
    #[error("Job {job_id} abandoned before a result arrived")]
    Abandoned {
        /// The abandoned job.
        job_id: JobId,
    },

    /// No result arrived within the caller's timeout.
    #[error("Job {job_id} timed out after {timeout_ms}ms")]
    Timeout {
        /// The job that timed out.
        job_id: JobId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a missing runtime error.
    #[inline]
    pub fn no_runtime(operation: impl Into<String>) -> Self {
        Self::NoRuntime {
            operation: operation.into(),
        }
    }

    /// Creates an abandoned job error.
    #[inline]
    pub fn abandoned(job_id: JobId) -> Self {
        Self::Abandoned { job_id }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(job_id: JobId, timeout_ms: u64) -> Self {
        Self::Timeout { job_id, timeout_ms }
    }

    /// Creates a timeout error from the elapsed duration.
    ///
    /// Milliseconds saturate at `u64::MAX`.
    #[inline]
    pub fn timeout_after(job_id: JobId, elapsed: Duration) -> Self {
        let timeout_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        Self::timeout(job_id, timeout_ms)
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if this error concerns the bridge binding.
    #[inline]
    #[must_use]
    pub fn is_binding_error(&self) -> bool {
        matches!(self, Self::BridgeAlreadyBound | Self::NoRuntime { .. })
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors leave the correlator fully usable; the call may
    /// simply be retried.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::BridgeAlreadyBound)
    }
}

// ============================================================================
// Tests
// ============================================================================
