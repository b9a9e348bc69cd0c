//! Remote inspector message types.
//!
//! This module defines what the session sends to and receives from the
//! transport. The on-device wire format stays the transport's business;
//! these types describe the logical messages.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Command` | Local → Remote | Page-scoped inspector command |
//! | `Notification` | Remote → Local | Directory and page lifecycle updates |
//! | `EvaluationResponse` | Remote → Local | Result of script evaluation |
//! | `Request` / `Response` | Both | WebSocket relay envelope |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Inspector commands |
//! | `event` | Notification types |
//! | `remote` | Remote objects and result conversion |
//! | `request` | Relay request/response envelope |

// ============================================================================
// Submodules
// ============================================================================

/// Inspector commands.
pub mod command;

/// Notification message types.
pub mod event;

/// Remote objects and evaluation results.
pub mod remote;

/// Request and Response envelopes.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::Command;
pub use event::{Notification, ParsedNotification};
pub use remote::{EvaluationResponse, RemoteObject, convert_result};
pub use request::{Request, Response, ResponseError};
