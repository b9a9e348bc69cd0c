//! Request and Response envelopes of the WebSocket relay.
//!
//! The relay speaks JSON text frames; requests are correlated with
//! responses by `id`, and frames without an `id` are notifications.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// Constants
// ============================================================================

/// Marker used by the remote end when a method is not implemented.
const METHOD_NOT_FOUND_MARKER: &str = "was not found";

// ============================================================================
// Request
// ============================================================================

/// A request from the local end to the relay.
///
/// # Format
///
/// ```json
/// {
///   "id": "uuid",
///   "method": "Runtime.evaluate",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Unique identifier for request/response correlation.
    pub id: RequestId,

    /// Method name.
    pub method: String,

    /// Method params.
    pub params: Value,
}

impl Request {
    /// Creates a new request with auto-generated ID.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: RequestId::generate(),
            method: method.into(),
            params,
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from the relay.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": "uuid", "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": "uuid", "error": { "code": -32601, "message": "'Runtime.awaitPromise' was not found" } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error details (if error).
    #[serde(default)]
    pub error: Option<ResponseError>,
}

/// Error body of a failed response.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseError {
    /// Numeric error code.
    #[serde(default)]
    pub code: Option<i64>,

    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

impl Response {
    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownCommand`] if the remote end does not know `method`
    /// - [`Error::Protocol`] for any other error response
    pub fn into_result(self, method: &str) -> Result<Value> {
        match self.error {
            None => Ok(self.result.unwrap_or(Value::Null)),
            Some(error) if error.message.contains(METHOD_NOT_FOUND_MARKER) => {
                Err(Error::unknown_command(method))
            }
            Some(error) => Err(Error::protocol(error.message)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
