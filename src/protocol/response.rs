//! Response decoding.
//!
//! Both dialects share one envelope:
//!
//! ```json
//! { "sessionId": "...", "status": 0, "value": { ... } }
//! ```
//!
//! W3C endpoints omit `status` and report failures as
//! `{"value": {"error": "...", "message": "..."}}`; legacy endpoints report a
//! non-zero `status`.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

// ============================================================================
// WebDriverResponse
// ============================================================================

/// A decoded, successful command response.
#[derive(Debug, Clone, PartialEq)]
pub struct WebDriverResponse {
    /// Session the response belongs to.
    pub session_id: Option<SessionId>,

    /// Legacy status code (`0` on success).
    pub status: i64,

    /// Command result.
    pub value: Value,
}

impl WebDriverResponse {
    /// Returns the value as a string, if it is one.
    #[inline]
    #[must_use]
    pub fn value_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    /// Returns a field of an object value.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value.get(key)
    }

    /// Consumes the response, returning the value.
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes a response body.
///
/// The session id is read from `value.sessionId`, then the top-level
/// `sessionId`, then `fallback`.
///
/// # Errors
///
/// - [`Error::MalformedResponse`] if the body is not JSON
/// - [`Error::WebDriver`] if `value.error` is set or `status` is non-zero
pub fn decode_response(body: &[u8], fallback: Option<&SessionId>) -> Result<WebDriverResponse> {
    let results: Value =
        serde_json::from_slice(body).map_err(|e| Error::malformed_response(&e, body))?;

    let value = results.get("value").cloned().unwrap_or(Value::Null);
    let status = status_code(&results);

    let message = value
        .get("message")
        .or_else(|| results.get("message"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let code = error.as_str().map_or_else(|| error.to_string(), str::to_string);
        return Err(Error::webdriver(code, message, results));
    }

    if status != 0 {
        return Err(Error::webdriver(status.to_string(), message, results));
    }

    let session_id = value
        .get("sessionId")
        .or_else(|| results.get("sessionId"))
        .and_then(Value::as_str)
        .map(SessionId::new)
        .or_else(|| fallback.cloned());

    trace!(session_id = ?session_id, "Response decoded");

    Ok(WebDriverResponse {
        session_id,
        status,
        value,
    })
}

fn status_code(results: &Value) -> i64 {
    match results.get("status") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(-1),
        Some(Value::String(s)) => s.parse().unwrap_or(-1),
        _ => 0,
    }
}

// ============================================================================
// Tests
// ============================================================================
