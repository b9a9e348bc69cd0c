//! Application and page records.
//!
//! Records are built from the raw dictionaries the device reports. The
//! device is loose about encodings (flags arrive as booleans, numbers or
//! strings), so parsing is tolerant and never fails on a single field.

// ============================================================================
// Imports
// ============================================================================

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::{AppIdKey, PageIdKey};

// ============================================================================
// Constants
// ============================================================================

/// Page types that represent debuggable web content.
pub const ACCEPTED_PAGE_TYPES: &[&str] = &["WIRTypeWeb", "WIRTypeWebPage", "WIRTypePage"];

const KEY_APP_ID: &str = "WIRApplicationIdentifierKey";
const KEY_APP_BUNDLE: &str = "WIRApplicationBundleIdentifierKey";
const KEY_APP_NAME: &str = "WIRApplicationNameKey";
const KEY_IS_PROXY: &str = "WIRIsApplicationProxyKey";
const KEY_HOST_ID: &str = "WIRHostApplicationIdentifierKey";
const KEY_IS_ACTIVE: &str = "WIRIsApplicationActiveKey";
const KEY_AUTOMATION_ENABLED: &str = "WIRRemoteAutomationEnabledKey";
const KEY_AUTOMATION_AVAILABILITY: &str = "WIRAutomationAvailabilityKey";
const KEY_PAGE_ID: &str = "WIRPageIdentifierKey";
const KEY_PAGE_TITLE: &str = "WIRTitleKey";
const KEY_PAGE_URL: &str = "WIRURLKey";
const KEY_PAGE_TYPE: &str = "WIRTypeKey";
const KEY_CONNECTION_ID: &str = "WIRConnectionIdentifierKey";

// ============================================================================
// AutomationState
// ============================================================================

/// Device-wide "allow remote automation" setting as seen by an app.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomationState {
    /// Remote automation is allowed.
    Enabled,
    /// Remote automation is switched off.
    Disabled,
    /// Not reported.
    #[default]
    Unknown,
}

impl AutomationState {
    fn from_dict(dict: &Value) -> Self {
        if let Some(availability) = dict.get(KEY_AUTOMATION_AVAILABILITY).and_then(Value::as_str) {
            return match availability {
                "WIRAutomationAvailabilityAvailable" => Self::Enabled,
                "WIRAutomationAvailabilityNotAvailable" => Self::Disabled,
                _ => Self::Unknown,
            };
        }
        match dict.get(KEY_AUTOMATION_ENABLED) {
            Some(value) if flag(value) => Self::Enabled,
            Some(_) => Self::Disabled,
            None => Self::Unknown,
        }
    }
}

// ============================================================================
// PageRecord
// ============================================================================

/// One open page or tab of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    /// Page identifier scoped to its application.
    pub id: PageIdKey,
    /// Current URL.
    pub url: String,
    /// Document title.
    pub title: String,
    /// Page carries the active debugging connection.
    pub is_key: bool,
}

impl PageRecord {
    /// Builds a record from a raw page dictionary.
    ///
    /// Returns `None` when the dictionary has no usable page id.
    #[must_use]
    pub fn from_dict(dict: &Value) -> Option<Self> {
        let id = dict.get(KEY_PAGE_ID).and_then(PageIdKey::from_value)?;
        Some(Self {
            id,
            url: string_field(dict, KEY_PAGE_URL),
            title: string_field(dict, KEY_PAGE_TITLE),
            is_key: dict.get(KEY_CONNECTION_ID).is_some_and(|v| !v.is_null()),
        })
    }
}

/// Converts a raw page dictionary into an ordered page array.
///
/// Accepts a single page dictionary, an array of page dictionaries, or a
/// map of page dictionaries keyed by page id. Entries whose type is not a
/// web page type are dropped.
#[must_use]
pub fn page_array_from_dict(page_dict: &Value) -> Vec<PageRecord> {
    if page_dict.get(KEY_PAGE_ID).is_some() {
        return accepted_page(page_dict).into_iter().collect();
    }

    let entries: Vec<&Value> = match page_dict {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    };

    let mut pages: Vec<PageRecord> = entries.into_iter().filter_map(accepted_page).collect();
    pages.sort_by(|a, b| compare_page_ids(&a.id, &b.id));
    pages
}

fn accepted_page(dict: &Value) -> Option<PageRecord> {
    let accepted = match dict.get(KEY_PAGE_TYPE) {
        None | Some(Value::Null) => true,
        Some(kind) => kind
            .as_str()
            .is_some_and(|kind| ACCEPTED_PAGE_TYPES.contains(&kind)),
    };
    if accepted { PageRecord::from_dict(dict) } else { None }
}

fn compare_page_ids(a: &PageIdKey, b: &PageIdKey) -> Ordering {
    match (a.as_str().parse::<u64>(), b.as_str().parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.as_str().cmp(b.as_str()),
    }
}

// ============================================================================
// ApplicationRecord
// ============================================================================

/// One live application process on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    /// Opaque application key.
    pub id: AppIdKey,
    /// Bundle identifier.
    pub bundle_id: String,
    /// Display name.
    pub name: String,
    /// Record stands in for another application.
    pub is_proxy: bool,
    /// Application this proxy represents.
    pub host_id: Option<AppIdKey>,
    /// Process is foregrounded.
    pub is_active: bool,
    /// Remote automation setting.
    pub automation: AutomationState,
    /// Known pages; `None` while waiting for the first listing.
    pub pages: Option<Vec<PageRecord>>,
}

impl ApplicationRecord {
    /// Builds a record from a raw application dictionary.
    ///
    /// Returns `None` when the dictionary has no application id.
    #[must_use]
    pub fn from_dict(dict: &Value) -> Option<Self> {
        let id = dict
            .get(KEY_APP_ID)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(AppIdKey::new)?;

        Some(Self {
            id,
            bundle_id: string_field(dict, KEY_APP_BUNDLE),
            name: string_field(dict, KEY_APP_NAME),
            is_proxy: dict.get(KEY_IS_PROXY).is_some_and(flag),
            host_id: dict
                .get(KEY_HOST_ID)
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(AppIdKey::new),
            is_active: dict.get(KEY_IS_ACTIVE).is_some_and(flag),
            automation: AutomationState::from_dict(dict),
            pages: None,
        })
    }

    /// Returns `true` if at least one page is known.
    #[inline]
    #[must_use]
    pub fn has_pages(&self) -> bool {
        self.pages.as_ref().is_some_and(|pages| !pages.is_empty())
    }
}

// ============================================================================
// Field Helpers
// ============================================================================

/// Interprets the device's loose boolean encodings.
fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

fn string_field(dict: &Value, key: &str) -> String {
    dict.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================
