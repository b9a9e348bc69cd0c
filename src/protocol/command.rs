//! Inspector commands sent to the selected page.
//!
//! Commands follow the `Domain.method` naming of the remote inspector.
//!
//! | Domain | Commands |
//! |--------|----------|
//! | `Page` | `navigate` |
//! | `Runtime` | `evaluate`, `awaitPromise`, `callFunctionOn` |
//! | `Heap` | `gc` |
//! | `Console` | `enable` |

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::{AppIdKey, PageIdKey};

// ============================================================================
// Command
// ============================================================================

/// A page-scoped inspector command.
///
/// Serializes as `{"method": "...", "params": {...}}`; the transport
/// receives the two halves separately via [`Command::into_parts`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum Command {
    /// Navigate the page to a URL.
    #[serde(rename = "Page.navigate")]
    Navigate {
        /// Target URL.
        url: String,
    },

    /// Evaluate an expression.
    #[serde(rename = "Runtime.evaluate")]
    Evaluate {
        /// JavaScript source.
        expression: String,
        /// Return the value itself instead of a remote object reference.
        #[serde(rename = "returnByValue")]
        return_by_value: bool,
    },

    /// Wait for a remote promise to settle.
    #[serde(rename = "Runtime.awaitPromise")]
    AwaitPromise {
        /// Remote object id of the promise.
        #[serde(rename = "promiseObjectId")]
        promise_object_id: String,
        /// Return the settled value by value.
        #[serde(rename = "returnByValue")]
        return_by_value: bool,
        /// Ask for an object preview.
        #[serde(rename = "generatePreview")]
        generate_preview: bool,
        /// Keep the result in the console history.
        #[serde(rename = "saveResult")]
        save_result: bool,
    },

    /// Call a function with a remote object as `this`.
    #[serde(rename = "Runtime.callFunctionOn")]
    CallFunctionOn {
        /// Remote object id used as receiver.
        #[serde(rename = "objectId")]
        object_id: String,
        /// Function declaration source.
        #[serde(rename = "functionDeclaration")]
        function_declaration: String,
        /// Call arguments as `CallArgument` objects.
        arguments: Vec<Value>,
        /// Return the value by value.
        #[serde(rename = "returnByValue")]
        return_by_value: bool,
    },

    /// Force a garbage collection pass.
    #[serde(rename = "Heap.gc")]
    GarbageCollect,

    /// Start forwarding console messages.
    #[serde(rename = "Console.enable")]
    ConsoleEnable,
}

impl Command {
    /// Creates an evaluation returning by value.
    #[inline]
    #[must_use]
    pub fn evaluate(expression: impl Into<String>) -> Self {
        Self::Evaluate {
            expression: expression.into(),
            return_by_value: true,
        }
    }

    /// Creates an evaluation returning a remote object reference.
    #[inline]
    #[must_use]
    pub fn evaluate_by_reference(expression: impl Into<String>) -> Self {
        Self::Evaluate {
            expression: expression.into(),
            return_by_value: false,
        }
    }

    /// Returns the method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "Page.navigate",
            Self::Evaluate { .. } => "Runtime.evaluate",
            Self::AwaitPromise { .. } => "Runtime.awaitPromise",
            Self::CallFunctionOn { .. } => "Runtime.callFunctionOn",
            Self::GarbageCollect => "Heap.gc",
            Self::ConsoleEnable => "Console.enable",
        }
    }

    /// Splits the command into method name and params, addressing the
    /// given page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn into_parts(
        self,
        app_id_key: &AppIdKey,
        page_id_key: &PageIdKey,
    ) -> Result<(&'static str, Value)> {
        let method = self.method();
        let mut params = match serde_json::to_value(&self)? {
            Value::Object(mut envelope) => match envelope.remove("params") {
                Some(Value::Object(params)) => params,
                Some(other) => {
                    return Err(Error::protocol(format!(
                        "Unexpected params shape for {method}: {other}"
                    )));
                }
                None => Map::new(),
            },
            other => {
                return Err(Error::protocol(format!(
                    "Unexpected command shape for {method}: {other}"
                )));
            }
        };

        params.insert(
            "appIdKey".to_string(),
            Value::String(app_id_key.as_str().to_string()),
        );
        params.insert("pageIdKey".to_string(), page_id_key.to_value());

        Ok((method, Value::Object(params)))
    }
}

// ============================================================================
// Tests
// ============================================================================
