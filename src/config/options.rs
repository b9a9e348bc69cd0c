//! Session configuration options.
//!
//! Provides a type-safe description of which application the session should
//! target and how it paces selection, navigation and script execution.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use webkit_remote_session::{PageLoadStrategy, SessionOptions};
//!
//! let options = SessionOptions::new()
//!     .with_bundle_id("com.example.app")
//!     .with_additional_bundle_id("com.example.app.extension")
//!     .with_page_load_strategy(PageLoadStrategy::Eager)
//!     .with_page_load_timeout(Duration::from_secs(10));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use super::strategy::PageLoadStrategy;

// ============================================================================
// Constants
// ============================================================================

/// Bundle id of the system browser.
pub const SAFARI_BUNDLE_ID: &str = "com.apple.mobilesafari";

/// Default page load timeout.
pub const DEFAULT_PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(20);

/// Default timeout for a single `document.readyState` probe.
pub const DEFAULT_READINESS_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of application selection attempts.
pub const DEFAULT_SELECT_APP_MAX_TRIES: u32 = 20;

/// Default pause between application selection attempts.
pub const DEFAULT_SELECT_APP_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Default bound for emulated asynchronous script execution.
pub const DEFAULT_ASYNC_SCRIPT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default bound for the best-effort garbage collection pass.
pub const DEFAULT_GARBAGE_COLLECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound for re-enabling console events after navigation.
pub const DEFAULT_CONSOLE_ENABLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Application names dropped from connected-application snapshots.
pub const DEFAULT_SKIPPED_APP_NAMES: &[&str] = &["lockdownd"];

// ============================================================================
// SessionOptions
// ============================================================================

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Primary target bundle id.
    pub bundle_id: Option<String>,

    /// Extra bundle ids considered during selection.
    pub additional_bundle_ids: Vec<String>,

    /// Also consider the system browser during selection.
    pub include_safari: bool,

    /// The primary target is the system browser itself.
    pub is_safari: bool,

    /// Application names ignored in connected-application snapshots.
    pub skipped_app_names: Vec<String>,

    /// Overall page load / readiness budget.
    pub page_load_timeout: Duration,

    /// Readiness policy.
    pub page_load_strategy: PageLoadStrategy,

    /// Timeout of one readiness probe.
    pub readiness_probe_timeout: Duration,

    /// Run `Heap.gc` before each evaluation.
    pub garbage_collect_on_execute: bool,

    /// Timeout for the garbage collection pass.
    pub garbage_collect_timeout: Duration,

    /// Application selection attempts.
    pub select_app_max_tries: u32,

    /// Pause between selection attempts.
    pub select_app_retry_interval: Duration,

    /// Default bound for emulated async execution.
    pub async_script_timeout: Duration,

    /// Timeout for re-enabling console events.
    pub console_enable_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl SessionOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bundle_id: None,
            additional_bundle_ids: Vec::new(),
            include_safari: false,
            is_safari: false,
            skipped_app_names: DEFAULT_SKIPPED_APP_NAMES
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            page_load_timeout: DEFAULT_PAGE_LOAD_TIMEOUT,
            page_load_strategy: PageLoadStrategy::default(),
            readiness_probe_timeout: DEFAULT_READINESS_PROBE_TIMEOUT,
            garbage_collect_on_execute: false,
            garbage_collect_timeout: DEFAULT_GARBAGE_COLLECT_TIMEOUT,
            select_app_max_tries: DEFAULT_SELECT_APP_MAX_TRIES,
            select_app_retry_interval: DEFAULT_SELECT_APP_RETRY_INTERVAL,
            async_script_timeout: DEFAULT_ASYNC_SCRIPT_TIMEOUT,
            console_enable_timeout: DEFAULT_CONSOLE_ENABLE_TIMEOUT,
        }
    }

    /// Creates options targeting the system browser.
    #[must_use]
    pub fn safari() -> Self {
        Self {
            bundle_id: Some(SAFARI_BUNDLE_ID.to_string()),
            is_safari: true,
            ..Self::new()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SessionOptions {
    /// Sets the primary bundle id.
    #[inline]
    #[must_use]
    pub fn with_bundle_id(mut self, bundle_id: impl Into<String>) -> Self {
        self.bundle_id = Some(bundle_id.into());
        self
    }

    /// Adds an extra candidate bundle id.
    #[inline]
    #[must_use]
    pub fn with_additional_bundle_id(mut self, bundle_id: impl Into<String>) -> Self {
        self.additional_bundle_ids.push(bundle_id.into());
        self
    }

    /// Also considers the system browser during selection.
    #[inline]
    #[must_use]
    pub fn with_include_safari(mut self, include: bool) -> Self {
        self.include_safari = include;
        self
    }

    /// Replaces the skip-list of application names.
    #[inline]
    #[must_use]
    pub fn with_skipped_app_names(
        mut self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.skipped_app_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the page load timeout.
    #[inline]
    #[must_use]
    pub fn with_page_load_timeout(mut self, timeout: Duration) -> Self {
        self.page_load_timeout = timeout;
        self
    }

    /// Sets the page load strategy.
    #[inline]
    #[must_use]
    pub fn with_page_load_strategy(mut self, strategy: PageLoadStrategy) -> Self {
        self.page_load_strategy = strategy;
        self
    }

    /// Sets the readiness probe timeout.
    #[inline]
    #[must_use]
    pub fn with_readiness_probe_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_probe_timeout = timeout;
        self
    }

    /// Enables a garbage collection pass before each evaluation.
    #[inline]
    #[must_use]
    pub fn with_garbage_collect_on_execute(mut self, enabled: bool) -> Self {
        self.garbage_collect_on_execute = enabled;
        self
    }

    /// Sets the selection retry policy.
    #[inline]
    #[must_use]
    pub fn with_select_app_retries(mut self, max_tries: u32, interval: Duration) -> Self {
        self.select_app_max_tries = max_tries;
        self.select_app_retry_interval = interval;
        self
    }

    /// Sets the default async script timeout.
    #[inline]
    #[must_use]
    pub fn with_async_script_timeout(mut self, timeout: Duration) -> Self {
        self.async_script_timeout = timeout;
        self
    }
}

// ============================================================================
// Derived Values
// ============================================================================

impl SessionOptions {
    /// Returns the candidate bundle ids used by application selection.
    ///
    /// The system browser is appended when requested and not already the
    /// primary target.
    #[must_use]
    pub fn candidate_bundle_ids(&self) -> Vec<String> {
        let mut ids = Vec::with_capacity(2 + self.additional_bundle_ids.len());
        if let Some(bundle_id) = &self.bundle_id {
            ids.push(bundle_id.clone());
        }
        ids.extend(self.additional_bundle_ids.iter().cloned());
        if self.include_safari && !self.is_safari {
            ids.push(SAFARI_BUNDLE_ID.to_string());
        }
        ids
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.page_load_timeout.is_zero() {
            return Err("Page load timeout must be greater than zero".to_string());
        }
        if self.readiness_probe_timeout.is_zero() {
            return Err("Readiness probe timeout must be greater than zero".to_string());
        }
        if self.select_app_max_tries == 0 {
            return Err("Application selection needs at least one attempt".to_string());
        }
        if self.async_script_timeout.is_zero() {
            return Err("Async script timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_default() {
        let options = SessionOptions::new();
        assert!(options.bundle_id.is_none());
        assert_eq!(options.page_load_timeout, DEFAULT_PAGE_LOAD_TIMEOUT);
        assert_eq!(options.page_load_strategy, PageLoadStrategy::Normal);
        assert_eq!(options.select_app_max_tries, 20);
        assert_eq!(options.select_app_retry_interval, Duration::from_millis(500));
        assert_eq!(options.skipped_app_names, vec!["lockdownd".to_string()]);
        assert!(!options.garbage_collect_on_execute);
    }

    #[test]
    fn test_candidates_include_safari_when_requested() {
        let options = SessionOptions::new()
            .with_bundle_id("com.example.app")
            .with_additional_bundle_id("com.example.widget")
            .with_include_safari(true);

        assert_eq!(
            options.candidate_bundle_ids(),
            vec!["com.example.app", "com.example.widget", SAFARI_BUNDLE_ID]
        );
    }

    #[test]
    fn test_candidates_skip_safari_for_safari_session() {
        let options = SessionOptions::safari().with_include_safari(true);
        assert_eq!(options.candidate_bundle_ids(), vec![SAFARI_BUNDLE_ID]);
    }

    #[test]
    fn test_validate_rejects_zero_tries() {
        let options = SessionOptions::new().with_select_app_retries(0, Duration::from_millis(1));
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_page_load_timeout() {
        let options = SessionOptions::new().with_page_load_timeout(Duration::ZERO);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_defaults() {
        assert!(SessionOptions::new().validate().is_ok());
    }
}
