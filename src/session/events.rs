//! Session events and listener registry.
//!
//! Events are delivered synchronously to registered listeners after the
//! directory and state locks have been released, so listeners may call
//! back into the session's read accessors.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::trace;

use crate::directory::PageRecord;
use crate::identifiers::ListenerId;

use super::Session;

// ============================================================================
// SessionEvent
// ============================================================================

/// Event emitted by a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The page listing of an application changed.
    PageChanged {
        /// Application id with the `PID:` prefix stripped.
        app_id: String,
        /// New page array.
        pages: Vec<PageRecord>,
    },

    /// A frame was detached from the selected page.
    FramesDetached,

    /// No application is left, or the session disconnected.
    Disconnected,
}

impl SessionEvent {
    /// Returns the event kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PageChanged { .. } => EventKind::PageChanged,
            Self::FramesDetached => EventKind::FramesDetached,
            Self::Disconnected => EventKind::Disconnected,
        }
    }
}

/// Discriminant of [`SessionEvent`] used to subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`SessionEvent::PageChanged`].
    PageChanged,
    /// See [`SessionEvent::FramesDetached`].
    FramesDetached,
    /// See [`SessionEvent::Disconnected`].
    Disconnected,
}

/// Listener callback type.
pub type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

// ============================================================================
// ListenerList
// ============================================================================

struct ListenerEntry {
    id: ListenerId,
    kind: EventKind,
    once: bool,
    callback: Listener,
}

/// Registered listeners in registration order.
#[derive(Default)]
pub(crate) struct ListenerList {
    entries: Vec<ListenerEntry>,
}

impl ListenerList {
    fn add(&mut self, kind: EventKind, once: bool, callback: Listener) -> ListenerId {
        let id = ListenerId::next();
        self.entries.push(ListenerEntry {
            id,
            kind,
            once,
            callback,
        });
        id
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Returns the callbacks for `kind`, dropping one-shot entries.
    fn take_matching(&mut self, kind: EventKind) -> Vec<Listener> {
        let callbacks = self
            .entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| Arc::clone(&entry.callback))
            .collect();
        self.entries.retain(|entry| !(entry.once && entry.kind == kind));
        callbacks
    }
}

// ============================================================================
// Session - Listeners
// ============================================================================

impl Session {
    /// Registers a listener for every event of `kind`.
    pub fn on(
        &self,
        kind: EventKind,
        listener: impl Fn(&SessionEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.listeners.lock().add(kind, false, Arc::new(listener))
    }

    /// Registers a listener for the next event of `kind` only.
    pub fn once(
        &self,
        kind: EventKind,
        listener: impl Fn(&SessionEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.listeners.lock().add(kind, true, Arc::new(listener))
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.listeners.lock().remove(id)
    }

    /// Delivers `event` to its listeners.
    ///
    /// Must not be called while holding the directory or state lock.
    pub(crate) fn emit(&self, event: SessionEvent) {
        let callbacks = self.inner.listeners.lock().take_matching(event.kind());
        trace!(kind = ?event.kind(), listeners = callbacks.len(), "Emitting session event");
        for callback in callbacks {
            callback(&event);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
