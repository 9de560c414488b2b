//! Best-effort JSON decoding.
//!
//! Results from the native side arrive either as text or as an already
//! structured value. [`Payload`] keeps that distinction, and [`parse_json`]
//! turns either form into a JSON value without ever failing: malformed text
//! is logged and yields `None`.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::error;

// ============================================================================
// Payload
// ============================================================================

/// A result delivered by the host: text or structured JSON.
///
/// A JSON string value converts into [`Payload::Text`], so `json!("1")` and
/// `"1"` are the same payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw text, possibly JSON-encoded.
    Text(String),
    /// Already structured value (never a JSON string).
    Json(Value),
}

impl Payload {
    /// Returns the text if this payload is text.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(_) => None,
        }
    }

    /// Raw decoding policy: text passes through, structured values are
    /// serialized to JSON text.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Json(value) => value.to_string(),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            other => Self::Json(other),
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses a payload into a JSON value.
///
/// Structured values are returned unchanged. Text is parsed as JSON; on
/// failure the error is logged and `None` returned.
#[must_use]
pub fn parse_json(payload: impl Into<Payload>) -> Option<Value> {
    match payload.into() {
        Payload::Json(value) => Some(value),
        Payload::Text(text) => parse_json_str(&text),
    }
}

/// Parses JSON text, logging and swallowing failures.
#[must_use]
pub fn parse_json_str(text: &str) -> Option<Value> {
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(e) => {
            error!(error = %e, len = text.len(), "Failed to parse JSON payload");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_parse_object_text() {
        assert_eq!(parse_json("{\"a\":1}"), Some(json!({ "a": 1 })));
    }

    #[test]
    fn test_parse_malformed_text() {
        assert_eq!(parse_json("not json"), None);
    }

    #[test]
    fn test_structured_passthrough() {
        let value = json!({ "a": 1 });
        assert_eq!(parse_json(value.clone()), Some(value));
    }

    #[test]
    fn test_json_string_is_text() {
        assert_eq!(Payload::from(json!("1")), Payload::Text("1".to_string()));
        assert_eq!(parse_json(json!("[1,2]")), Some(json!([1, 2])));
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(parse_json("1"), Some(json!(1)));
        assert_eq!(parse_json("null"), Some(Value::Null));
    }

    #[test]
    fn test_into_text() {
        assert_eq!(Payload::from("raw").into_text(), "raw");
        assert_eq!(Payload::from(json!({ "a": 1 })).into_text(), "{\"a\":1}");
    }

    #[test]
    fn test_as_text() {
        assert_eq!(Payload::from("x").as_text(), Some("x"));
        assert_eq!(Payload::from(json!(3)).as_text(), None);
    }
}
