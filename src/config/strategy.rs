//! Page load strategies.
//!
//! A strategy decides when a `document.readyState` value counts as
//! "finished loading":
//!
//! | Strategy | `loading` | `interactive` | `complete` |
//! |----------|-----------|---------------|------------|
//! | `normal` | no | no | yes |
//! | `eager` | no | yes | yes |
//! | `none` | yes | yes | yes |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// `document.readyState` while the document is still parsing.
pub const READY_STATE_LOADING: &str = "loading";

/// `document.readyState` once all subresources have loaded.
pub const READY_STATE_COMPLETE: &str = "complete";

// ============================================================================
// PageLoadStrategy
// ============================================================================

/// Policy for how "finished loading" is defined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PageLoadStrategy {
    /// Wait for `complete`.
    #[default]
    Normal,
    /// Accept anything past `loading`.
    Eager,
    /// Never wait.
    None,
}

impl PageLoadStrategy {
    /// Returns the canonical lowercase name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Eager => "eager",
            Self::None => "none",
        }
    }

    /// Returns `true` if `ready_state` is final under this strategy.
    #[must_use]
    pub fn is_complete(&self, ready_state: &str) -> bool {
        match self {
            Self::Normal => ready_state == READY_STATE_COMPLETE,
            Self::Eager => ready_state != READY_STATE_LOADING,
            Self::None => true,
        }
    }
}

impl fmt::Display for PageLoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageLoadStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "eager" => Ok(Self::Eager),
            "none" => Ok(Self::None),
            other => Err(Error::config(format!(
                "Unknown page load strategy '{other}'. Expected one of: normal, eager, none"
            ))),
        }
    }
}

impl Serialize for PageLoadStrategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PageLoadStrategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Tests
// ============================================================================
