//! Native-originated request decoding.
//!
//! When native code calls into the script side it sends a string of the
//! same shape as an outbound [`Envelope`](super::Envelope). Decoding never
//! fails: malformed input produces a request with every field unset.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::codec::parse_json_str;

use super::split_method;

// ============================================================================
// InboundRequest
// ============================================================================

/// A decoded request from the native side.
///
/// # Format
///
/// ```json
/// { "id": "n42", "method": "Player@seek", "params": { "position": 12.5 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundRequest {
    /// Request id, if the native side expects a reply.
    pub id: Option<String>,
    /// Target part of the method (`Player`).
    pub target_name: Option<String>,
    /// Method part of the method (`seek`).
    pub target_method: Option<String>,
    /// Raw parameters.
    pub params: Option<Value>,
}

impl InboundRequest {
    /// Decodes a raw request string.
    #[must_use]
    pub fn parse(body: &str) -> Self {
        parse_json_str(body)
            .map(Self::from_value)
            .unwrap_or_default()
    }

    /// Decodes an already parsed request value.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self::default();
        };

        let id = match fields.remove("id") {
            Some(Value::String(id)) => Some(id),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };

        let (target_name, target_method) = match fields.get("method").and_then(Value::as_str) {
            Some(method) => {
                let (target, name) = split_method(method);
                (Some(target.to_string()), name.map(str::to_string))
            }
            None => (None, None),
        };

        Self {
            id,
            target_name,
            target_method,
            params: fields.remove("params"),
        }
    }

    /// Returns `true` if target, method and id are all present.
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.id.is_some() && self.target_name.is_some() && self.target_method.is_some()
    }

    /// Returns a raw parameter.
    #[inline]
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.as_ref().and_then(|params| params.get(key))
    }

    /// Returns a string parameter.
    #[inline]
    #[must_use]
    pub fn string_param(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(Value::as_str)
    }

    /// Returns a numeric parameter.
    #[inline]
    #[must_use]
    pub fn number_param(&self, key: &str) -> Option<f64> {
        self.param(key).and_then(Value::as_f64)
    }

    /// Returns an integer parameter.
    ///
    /// Floats with no fractional part are accepted.
    #[must_use]
    pub fn int_param(&self, key: &str) -> Option<i64> {
        let value = self.param(key)?;
        value.as_i64().or_else(|| {
            value
                .as_f64()
                .filter(|number| number.fract() == 0.0)
                .map(|number| number as i64)
        })
    }

    /// Returns a JSON parameter, decoding it if it was sent as a JSON string.
    #[must_use]
    pub fn json_param(&self, key: &str) -> Option<Value> {
        match self.param(key)? {
            Value::String(encoded) => parse_json_str(encoded),
            value => Some(value.clone()),
        }
    }
}

impl From<&str> for InboundRequest {
    fn from(body: &str) -> Self {
        Self::parse(body)
    }
}

// ============================================================================
// Tests
// ============================================================================
