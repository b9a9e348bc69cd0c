//! Remote evaluation results.
//!
//! `Runtime.evaluate` and friends answer with a remote object plus a
//! `wasThrown` flag:
//!
//! ```json
//! {
//!   "result": { "type": "string", "value": "complete" },
//!   "wasThrown": false
//! }
//! ```
//!
//! Atoms additionally wrap their outcome as a JSON string of the form
//! `{"status": 0, "value": ...}`; [`convert_result`] unwraps both layers.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// RemoteObject
// ============================================================================

/// Mirror of a JavaScript value living in the page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteObject {
    /// JavaScript type (`object`, `string`, `undefined`, ...).
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Object subtype (`array`, `null`, `error`, ...).
    #[serde(default)]
    pub subtype: Option<String>,

    /// Value, present when returned by value.
    #[serde(default)]
    pub value: Option<Value>,

    /// Remote reference for non-primitive values.
    #[serde(rename = "objectId", default)]
    pub object_id: Option<String>,

    /// String representation.
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// EvaluationResponse
// ============================================================================

/// Response body of an evaluation command.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EvaluationResponse {
    /// The evaluated value.
    #[serde(default)]
    pub result: RemoteObject,

    /// The script threw.
    #[serde(rename = "wasThrown", default)]
    pub was_thrown: bool,
}

impl EvaluationResponse {
    /// Parses a raw transport response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the response does not have the
    /// evaluation shape.
    pub fn from_value(raw: Value) -> Result<Self> {
        Ok(serde_json::from_value(raw)?)
    }

    /// Returns the remote object, failing if the script threw.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScriptError`] carrying the thrown message.
    pub fn into_remote_object(self) -> Result<RemoteObject> {
        if self.was_thrown {
            let message = self
                .result
                .description
                .clone()
                .or_else(|| {
                    self.result.value.as_ref().map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                })
                .unwrap_or_else(|| "Remote script threw without a message".to_string());
            return Err(Error::script_error(message));
        }
        Ok(self.result)
    }

    /// Returns the by-value result, `Null` for `undefined`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScriptError`] if the script threw.
    pub fn into_value(self) -> Result<Value> {
        Ok(self.into_remote_object()?.value.unwrap_or(Value::Null))
    }
}

// ============================================================================
// Result Conversion
// ============================================================================

/// Converts a by-value evaluation result into the caller-facing value.
///
/// - JSON strings are parsed; plain strings are kept as they are
/// - `{"status": n}` with `n != 0` is an evaluation error
/// - `{"value": v}` unwraps to `v`
///
/// # Errors
///
/// Returns [`Error::ScriptError`] for a non-zero status.
pub fn convert_result(raw: Value) -> Result<Value> {
    let parsed = match raw {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(value @ Value::Object(_)) => value,
            _ => return Ok(Value::String(text)),
        },
        other => other,
    };

    let Value::Object(mut object) = parsed else {
        return Ok(parsed);
    };

    let status = object.get("status").and_then(Value::as_i64).unwrap_or(0);
    if status != 0 {
        let message = match object.get("value") {
            Some(Value::Object(value)) => value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(value.clone()).to_string()),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "no error message".to_string(),
        };
        return Err(Error::script_error(format!("(status {status}) {message}")));
    }

    match object.remove("value") {
        Some(value) => Ok(value),
        None => Ok(Value::Object(object)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_plain_string_is_kept() {
        assert_eq!(convert_result(json!("complete")).unwrap(), json!("complete"));
    }

    #[test]
    fn test_atom_envelope_is_unwrapped() {
        let raw = json!(r#"{"status":0,"value":{"ELEMENT":":wdc:1"}}"#);
        assert_eq!(convert_result(raw).unwrap(), json!({"ELEMENT": ":wdc:1"}));
    }

    #[test]
    fn test_non_zero_status_is_script_error() {
        let raw = json!({"status": 7, "value": {"message": "no such element"}});
        let err = convert_result(raw).unwrap_err();
        assert!(matches!(err, Error::ScriptError { ref message } if message.contains("no such element")));
    }

    #[test]
    fn test_object_without_value_is_returned_whole() {
        let raw = json!({"width": 10, "height": 20});
        assert_eq!(convert_result(raw.clone()).unwrap(), raw);
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(convert_result(json!(true)).unwrap(), json!(true));
        assert_eq!(convert_result(Value::Null).unwrap(), Value::Null);
        assert_eq!(convert_result(json!("42")).unwrap(), json!("42"));
    }

    #[test]
    fn test_thrown_evaluation() {
        let response = EvaluationResponse::from_value(json!({
            "result": {"type": "object", "subtype": "error", "description": "ReferenceError: foo is not defined"},
            "wasThrown": true
        }))
        .unwrap();

        let err = response.into_value().unwrap_err();
        assert_eq!(err.to_string(), "Script error: ReferenceError: foo is not defined");
    }

    #[test]
    fn test_undefined_result_is_null() {
        let response = EvaluationResponse::from_value(json!({"result": {"type": "undefined"}})).unwrap();
        assert_eq!(response.into_value().unwrap(), Value::Null);
    }
}
