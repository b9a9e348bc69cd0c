//! Remote inspector session.
//!
//! A [`Session`] tracks the applications and pages reported by the device,
//! picks the page to automate, drives its navigation and evaluates scripts
//! on it. All of it is built on a single [`Transport`](crate::transport::Transport).
//!
//! | Area | File | Operations |
//! |------|------|------------|
//! | Lifecycle | `core` | `connect`, `disconnect`, accessors |
//! | Directory upkeep | `notifications` | inbound notification handling |
//! | Target resolution | `resolver` | `select_app`, `select_page`, `wait_for_page` |
//! | Navigation | `navigation` | `navigate`, `wait_until_ready`, `cancel_page_load` |
//! | Script bridge | `script` | `execute`, `execute_atom`, `execute_atom_async`, `call_function` |
//! | Events | `events` | `on`, `once`, `off` |
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use webkit_remote_session::{Result, Session, SessionOptions, WebSocketTransport};
//!
//! # async fn example() -> Result<()> {
//! let transport = Arc::new(WebSocketTransport::new("ws://127.0.0.1:27753")?);
//! let session = Session::builder()
//!     .options(SessionOptions::safari())
//!     .build(transport)?;
//!
//! session.connect(None).await?;
//! let pages = session.select_app(Some("https://example.com"), None, true).await?;
//! if let Some(page) = pages.first() {
//!     let (app_id, page_id) = page.id.split_once('.').unwrap_or((page.id.as_str(), "1"));
//!     session.select_page(app_id, page_id.into(), false).await?;
//! }
//! session.navigate("https://example.com/login").await?;
//! let title = session.execute("document.title").await?;
//! # let _ = title;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

mod core;
mod delay;
mod events;
mod navigation;
mod notifications;
mod resolver;
mod script;

#[cfg(test)]
pub(crate) mod fixtures;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{Selection, Session};
pub use delay::{CancellableDelay, DelayOutcome};
pub use events::{EventKind, Listener, SessionEvent};
