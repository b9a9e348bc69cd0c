//! Session configuration.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SessionOptions`] | Target application and pacing |
//! | [`PageLoadStrategy`] | When a page counts as loaded |
//! | [`SessionBuilder`] | Validating session factory |

// ============================================================================
// Submodules
// ============================================================================

/// Session builder.
pub mod builder;

/// Session options.
pub mod options;

/// Page load strategies.
pub mod strategy;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use options::{
    DEFAULT_ASYNC_SCRIPT_TIMEOUT, DEFAULT_CONSOLE_ENABLE_TIMEOUT, DEFAULT_GARBAGE_COLLECT_TIMEOUT,
    DEFAULT_PAGE_LOAD_TIMEOUT, DEFAULT_READINESS_PROBE_TIMEOUT, DEFAULT_SELECT_APP_MAX_TRIES,
    DEFAULT_SELECT_APP_RETRY_INTERVAL, DEFAULT_SKIPPED_APP_NAMES, SAFARI_BUNDLE_ID, SessionOptions,
};
pub use strategy::{PageLoadStrategy, READY_STATE_COMPLETE, READY_STATE_LOADING};
