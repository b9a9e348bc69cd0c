//! Notification types.
//!
//! Notifications are pushed by the transport at arbitrary times, not
//! necessarily in response to a request.
//!
//! # Notification Types
//!
//! | Method | Meaning |
//! |--------|---------|
//! | `_rpc_applicationConnected:` | An application process appeared |
//! | `_rpc_applicationUpdated:` | Application metadata changed |
//! | `_rpc_applicationDisconnected:` | An application process went away |
//! | `_rpc_applicationSentListing:` | Page listing of an application changed |
//! | `_rpc_reportConnectedApplicationList:` | Snapshot of all applications |
//! | `_rpc_reportConnectedDriverList:` | Automation drivers attached to the device |
//! | `_rpc_reportCurrentState:` | Remote automation availability |
//! | `Page.frameDetached` | A frame left the page |
//! | `Page.loadEventFired` | The page finished loading |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::identifiers::AppIdKey;

// ============================================================================
// Method Names
// ============================================================================

/// Application connected.
pub const APPLICATION_CONNECTED: &str = "_rpc_applicationConnected:";
/// Application metadata updated.
pub const APPLICATION_UPDATED: &str = "_rpc_applicationUpdated:";
/// Application disconnected.
pub const APPLICATION_DISCONNECTED: &str = "_rpc_applicationDisconnected:";
/// Page listing changed.
pub const APPLICATION_SENT_LISTING: &str = "_rpc_applicationSentListing:";
/// Connected-application snapshot.
pub const CONNECTED_APPLICATION_LIST: &str = "_rpc_reportConnectedApplicationList:";
/// Connected driver list.
pub const CONNECTED_DRIVER_LIST: &str = "_rpc_reportConnectedDriverList:";
/// Automation availability report.
pub const CURRENT_STATE: &str = "_rpc_reportCurrentState:";
/// Frame detached.
pub const FRAME_DETACHED: &str = "Page.frameDetached";
/// Page load completed.
pub const LOAD_EVENT_FIRED: &str = "Page.loadEventFired";

// ============================================================================
// Notification
// ============================================================================

/// A raw notification from the transport.
///
/// # Format
///
/// ```json
/// {
///   "method": "_rpc_applicationConnected:",
///   "params": { "WIRApplicationIdentifierKey": "PID:42", ... }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Notification {
    /// Notification name.
    pub method: String,

    /// Notification payload.
    #[serde(default)]
    pub params: Value,
}

impl Notification {
    /// Creates a notification.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Parses the notification into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedNotification {
        match self.method.as_str() {
            APPLICATION_CONNECTED => ParsedNotification::ApplicationConnected {
                dict: self.params.clone(),
            },

            APPLICATION_UPDATED => ParsedNotification::ApplicationUpdated {
                dict: self.params.clone(),
            },

            APPLICATION_DISCONNECTED => ParsedNotification::ApplicationDisconnected {
                app_id_key: self.get_app_id_key(),
            },

            APPLICATION_SENT_LISTING => ParsedNotification::PageListingChanged {
                app_id_key: self.get_app_id_key(),
                page_dict: self.get_value("WIRListingKey"),
            },

            CONNECTED_APPLICATION_LIST => ParsedNotification::ConnectedApplicationList {
                apps: self.get_value("WIRApplicationDictionaryKey"),
            },

            CONNECTED_DRIVER_LIST => ParsedNotification::ConnectedDriverList {
                drivers: self.get_value("WIRDriverDictionaryKey"),
            },

            CURRENT_STATE => ParsedNotification::AutomationAvailability {
                availability: self.get_value("WIRAutomationAvailabilityKey"),
            },

            FRAME_DETACHED => ParsedNotification::FrameDetached {
                frame_id: self
                    .params
                    .get("frameId")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
            },

            LOAD_EVENT_FIRED => ParsedNotification::PageLoadCompleted,

            _ => ParsedNotification::Unknown {
                method: self.method.clone(),
                params: self.params.clone(),
            },
        }
    }

    /// Gets the application key from params.
    #[inline]
    fn get_app_id_key(&self) -> Option<AppIdKey> {
        self.params
            .get("WIRApplicationIdentifierKey")
            .and_then(|v| v.as_str())
            .map(AppIdKey::new)
    }

    /// Gets a nested value from params, `Null` when absent.
    #[inline]
    fn get_value(&self, key: &str) -> Value {
        self.params.get(key).cloned().unwrap_or(Value::Null)
    }
}

// ============================================================================
// ParsedNotification
// ============================================================================

/// Parsed notification for type-safe handling.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedNotification {
    /// Application connected.
    ApplicationConnected {
        /// Raw application dictionary.
        dict: Value,
    },

    /// Application metadata updated.
    ApplicationUpdated {
        /// Raw application dictionary.
        dict: Value,
    },

    /// Application disconnected.
    ApplicationDisconnected {
        /// Key of the departed application.
        app_id_key: Option<AppIdKey>,
    },

    /// Page listing changed.
    PageListingChanged {
        /// Owning application.
        app_id_key: Option<AppIdKey>,
        /// Raw page dictionary.
        page_dict: Value,
    },

    /// Snapshot of connected applications.
    ConnectedApplicationList {
        /// Raw applications keyed by arbitrary key.
        apps: Value,
    },

    /// Connected automation drivers.
    ConnectedDriverList {
        /// Raw driver list.
        drivers: Value,
    },

    /// Remote automation availability.
    AutomationAvailability {
        /// Raw availability value.
        availability: Value,
    },

    /// Frame detached from the page.
    FrameDetached {
        /// Frame ID when reported.
        frame_id: Option<String>,
    },

    /// Page load completed.
    PageLoadCompleted,

    /// Unknown notification.
    Unknown {
        /// Notification method.
        method: String,
        /// Notification params.
        params: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_notification_deserialization() {
        let json_str = r#"{
            "method": "_rpc_applicationSentListing:",
            "params": {
                "WIRApplicationIdentifierKey": "PID:42",
                "WIRListingKey": {"1": {"WIRPageIdentifierKey": 1, "WIRURLKey": "https://example.com"}}
            }
        }"#;

        let notification: Notification = serde_json::from_str(json_str).expect("parse");
        match notification.parse() {
            ParsedNotification::PageListingChanged {
                app_id_key,
                page_dict,
            } => {
                assert_eq!(app_id_key, Some(AppIdKey::new("PID:42")));
                assert!(page_dict.get("1").is_some());
            }
            other => panic!("unexpected parsed notification: {other:?}"),
        }
    }

    #[test]
    fn test_disconnect_without_key() {
        let notification = Notification::new(APPLICATION_DISCONNECTED, json!({}));
        assert_eq!(
            notification.parse(),
            ParsedNotification::ApplicationDisconnected { app_id_key: None }
        );
    }

    #[test]
    fn test_load_event() {
        let notification = Notification::new(LOAD_EVENT_FIRED, Value::Null);
        assert_eq!(notification.parse(), ParsedNotification::PageLoadCompleted);
    }

    #[test]
    fn test_missing_params_default_to_null() {
        let notification: Notification =
            serde_json::from_str(r#"{"method": "Page.loadEventFired"}"#).expect("parse");
        assert_eq!(notification.params, Value::Null);
    }

    #[test]
    fn test_unknown_notification() {
        let notification = Notification::new("Network.requestWillBeSent", json!({"foo": "bar"}));
        match notification.parse() {
            ParsedNotification::Unknown { method, .. } => {
                assert_eq!(method, "Network.requestWillBeSent");
            }
            other => panic!("expected Unknown variant, got {other:?}"),
        }
    }
}
