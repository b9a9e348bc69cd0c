//! WebKit remote session - Orchestration layer for the WebKit remote inspector.
//!
//! This library keeps track of the web applications and pages a device
//! exposes through its remote inspector, picks the page to automate, and
//! drives navigation and script execution on it.
//!
//! # Architecture
//!
//! The session sits between a caller and a transport to the device:
//!
//! - **Directory**: authoritative map of applications and their pages,
//!   updated from device notifications
//! - **Resolver**: retries until an application with a matching page shows up
//! - **Navigation**: navigates and waits for load and readiness
//! - **Script bridge**: evaluates expressions and atoms on the selected page
//!
//! Key design principles:
//!
//! - One [`Session`] per device connection, cheap to clone
//! - The wire format belongs to the [`Transport`]; the session speaks
//!   `Domain.method` commands
//! - Page changes are reported through explicit listeners
//! - Timeouts on readiness are soft, on asynchronous scripts hard
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use webkit_remote_session::{Result, Session, SessionOptions, WebSocketTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let transport = Arc::new(WebSocketTransport::new("ws://127.0.0.1:27753")?);
//!     let session = Session::builder()
//!         .options(SessionOptions::safari())
//!         .build(transport)?;
//!
//!     session.connect(Some(std::time::Duration::from_secs(5))).await?;
//!     let pages = session.select_app(None, None, true).await?;
//!     println!("Found {} page(s)", pages.len());
//!
//!     session.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`atoms`] | Atom catalog trait and in-memory registry |
//! | [`config`] | Session options, builder and page load strategy |
//! | [`directory`] | Application and page records, matching |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Inspector message types |
//! | [`session`] | The [`Session`] itself |
//! | [`transport`] | Transport trait and WebSocket implementation |

// ============================================================================
// Modules
// ============================================================================

/// Atom catalog.
pub mod atoms;

/// Session configuration.
///
/// Use [`Session::builder()`] to create a configured session.
pub mod config;

/// Application and page directory.
pub mod directory;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing application and page keys.
pub mod identifiers;

/// Inspector protocol message types.
pub mod protocol;

/// Remote inspector session.
pub mod session;

/// Transport to the device.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Atom types
pub use atoms::{AtomCatalog, AtomRegistry};

// Configuration types
pub use config::{PageLoadStrategy, SessionBuilder, SessionOptions};

// Directory types
pub use directory::{
    ApplicationRecord, AutomationState, Directory, ListedPage, PageMatch, PageRecord,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{AppIdKey, ListenerId, PageIdKey, RequestId};

// Session types
pub use session::{EventKind, Selection, Session, SessionEvent};

// Transport types
pub use transport::{SelectedApp, Transport, TransportOptions, WebSocketTransport};
