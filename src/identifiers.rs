//! Type-safe identifiers.
//!
//! Correlation ids are plain strings on the wire. [`JobId`] wraps them so a
//! job id cannot be confused with a method name or an event name.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Borrow;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Default prefix of generated job ids.
pub const DEFAULT_ID_PREFIX: &str = "li";

/// Exclusive upper bound of the random id suffix.
const RANDOM_SUFFIX_BOUND: u32 = 1000;

// ============================================================================
// JobId
// ============================================================================

/// Correlation id tying an outbound call to its inbound results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Creates a job id from any string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id, returning the inner string.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// IdGenerator
// ============================================================================

/// Millisecond clock used for id generation.
pub type Clock = fn() -> u64;

/// Generates `prefix + unix millis + random[0, 1000)` job ids.
///
/// Uniqueness is enforced by the caller-supplied `taken` check, not by the
/// randomness: [`IdGenerator::next_unique`] keeps drawing until it finds a
/// free id.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    clock: Clock,
}

impl IdGenerator {
    /// Creates a generator using the system clock.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_clock(prefix, system_millis)
    }

    /// Creates a generator with a custom clock.
    #[must_use]
    pub fn with_clock(prefix: impl Into<String>, clock: Clock) -> Self {
        Self {
            prefix: prefix.into(),
            clock,
        }
    }

    /// Draws one candidate id, unique or not.
    #[must_use]
    pub fn candidate(&self) -> JobId {
        let suffix = rand::thread_rng().gen_range(0..RANDOM_SUFFIX_BOUND);
        JobId(format!("{}{}{}", self.prefix, (self.clock)(), suffix))
    }

    /// Draws candidates until one is not `taken`.
    pub fn next_unique(&self, taken: impl Fn(&str) -> bool) -> JobId {
        loop {
            let id = self.candidate();
            if !taken(id.as_str()) {
                return id;
            }
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_PREFIX)
    }
}

fn system_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================
