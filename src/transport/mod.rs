//! Transport layer to the on-device remote inspector.
//!
//! The session never talks to the device directly. Everything goes through
//! a [`Transport`]: an asynchronous channel that sends commands and
//! delivers notifications at arbitrary times.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │ Session (Rust)  │                              │  Inspector      │
//! │                 │        Transport             │  relay          │
//! │  Directory      │◄────────────────────────────►│                 │
//! │  Resolver       │   send / notifications       │  (device side)  │
//! │  Navigation     │                              │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket transport and event loop |
//! | `mock` | Scripted transport for tests |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket transport and event loop.
pub mod connection;

/// Scripted transport for tests.
#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::identifiers::{AppIdKey, PageIdKey};
use crate::protocol::Notification;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{TransportOptions, WebSocketTransport};

// ============================================================================
// Types
// ============================================================================

/// Notification handler callback type.
///
/// Called for each notification received from the device. Handlers run on
/// the transport's receive path and must not block.
pub type EventHandler = Box<dyn Fn(Notification) + Send + Sync>;

/// Outcome of selecting an application on the device.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedApp {
    /// Key the device actually selected (may differ for proxies).
    pub app_id_key: AppIdKey,
    /// Raw page dictionary of the selected application.
    pub page_dict: Value,
}

// ============================================================================
// Transport
// ============================================================================

/// Asynchronous, event-emitting channel to the device.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens the channel.
    async fn connect(&self) -> Result<()>;

    /// Closes the channel. Closing an unconnected transport is a no-op.
    async fn disconnect(&self) -> Result<()>;

    /// Returns `true` while the channel is usable.
    fn is_connected(&self) -> bool;

    /// Returns a token cancelled when the current connection ends, for
    /// whatever reason. Already cancelled while not connected.
    fn connection_closed(&self) -> CancellationToken;

    /// Sends a command.
    ///
    /// With `wait_for_response` the call resolves with the command's
    /// result; otherwise it resolves as soon as the command is written.
    async fn send(&self, method: &str, params: Value, wait_for_response: bool) -> Result<Value>;

    /// Installs the notification handler, replacing any previous one.
    fn set_event_handler(&self, handler: EventHandler);

    /// Removes the notification handler.
    fn clear_event_handler(&self);

    /// Selects an application for debugging.
    async fn select_app(&self, app_id_key: &AppIdKey) -> Result<SelectedApp>;

    /// Attaches to a page of the selected application.
    async fn select_page(&self, app_id_key: &AppIdKey, page_id_key: &PageIdKey) -> Result<()>;

    /// Waits until a page can be attached to.
    async fn wait_for_page(&self, app_id_key: &AppIdKey, page_id_key: &PageIdKey) -> Result<()>;
}

/// A token that is already cancelled, for transports without a connection.
pub(crate) fn closed_token() -> CancellationToken {
    let token = CancellationToken::new();
    token.cancel();
    token
}
