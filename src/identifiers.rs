//! Type-safe identifiers for remote inspector entities.
//!
//! Newtype wrappers prevent mixing application keys, page keys and
//! request correlation IDs at compile time.
//!
//! | Type | Wire form | Example |
//! |------|-----------|---------|
//! | [`AppIdKey`] | string | `"PID:4242"` |
//! | [`PageIdKey`] | number or string | `1` |
//! | [`RequestId`] | UUID string | `"550e8400-..."` |
//! | [`ListenerId`] | local only | `3` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Prefix carried by process-backed application keys.
pub const PID_PREFIX: &str = "PID:";

// ============================================================================
// AppIdKey
// ============================================================================

/// Opaque application key, the primary key of the directory.
///
/// Usually `"PID:<n>"`, but proxies may report other formats.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppIdKey(String);

impl AppIdKey {
    /// Creates a key from its raw form.
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Creates a key from a caller-facing id, adding the `PID:` prefix
    /// when it is missing.
    #[must_use]
    pub fn from_app_id(app_id: &str) -> Self {
        if app_id.starts_with(PID_PREFIX) {
            Self(app_id.to_string())
        } else {
            Self(format!("{PID_PREFIX}{app_id}"))
        }
    }

    /// Returns the raw key.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the key with the `PID:` prefix stripped.
    #[inline]
    #[must_use]
    pub fn numeric_id(&self) -> &str {
        self.0.strip_prefix(PID_PREFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for AppIdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppIdKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// PageIdKey
// ============================================================================

/// Page identifier scoped to its application.
///
/// The device reports page ids as numbers, but proxies and denormalized
/// listings use strings, so both are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageIdKey(String);

impl PageIdKey {
    /// Creates a page key.
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the raw key.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts a raw protocol value into a page key.
    ///
    /// Returns `None` for values that cannot identify a page.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self(n.to_string())),
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            _ => None,
        }
    }

    /// Returns the wire representation (number when numeric).
    #[must_use]
    pub fn to_value(&self) -> Value {
        self.0
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(self.0.clone()))
    }
}

impl fmt::Display for PageIdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for PageIdKey {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for PageIdKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for PageIdKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PageIdKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom("page id must be a number or string"))
    }
}

// ============================================================================
// RequestId
// ============================================================================

/// Correlation ID for transport requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a fresh random ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// ============================================================================
// ListenerId
// ============================================================================

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned when registering a session event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocates a process-unique listener ID.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
