//! Core Session struct, lifecycle and accessors.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::atoms::AtomCatalog;
use crate::config::{PageLoadStrategy, SessionBuilder, SessionOptions};
use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::identifiers::{AppIdKey, PageIdKey};
use crate::transport::Transport;

use super::events::{ListenerList, SessionEvent};

// ============================================================================
// Constants
// ============================================================================

/// Poll interval while waiting for the first application report.
const APP_REPORT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Types
// ============================================================================

/// Currently selected application and page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Selected application.
    pub app_id_key: Option<AppIdKey>,
    /// Selected page.
    pub page_id_key: Option<PageIdKey>,
}

/// Mutable session state besides the directory.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    /// Selected application.
    pub app_id_key: Option<AppIdKey>,
    /// Selected page.
    pub page_id_key: Option<PageIdKey>,
    /// A navigation is in flight; page change events are suppressed.
    pub is_navigating: bool,
    /// A page load wait is in flight.
    pub is_page_loading: bool,
    /// Cancellation shared by the in-flight page load waits.
    pub page_load_cancel: Option<CancellationToken>,
    /// Number of in-flight page load waits.
    pub page_loads: usize,
    /// Raw automation availability as last reported.
    pub automation_availability: Value,
    /// Raw connected driver list as last reported.
    pub connected_drivers: Value,
    /// Page the transport was last attached to for evaluation.
    pub synced_page: Option<(AppIdKey, PageIdKey)>,
}

/// Internal shared state for a session.
pub(crate) struct SessionInner {
    /// Channel to the device.
    pub transport: Arc<dyn Transport>,
    /// Atom scripts.
    pub atoms: Arc<dyn AtomCatalog>,
    /// Configuration.
    pub options: SessionOptions,
    /// Applications and pages. Locked before `state`.
    pub directory: Mutex<Directory>,
    /// Selection and navigation state.
    pub state: Mutex<SessionState>,
    /// Event listeners.
    pub listeners: Mutex<ListenerList>,
    /// One-shot waiter for the next page load event.
    pub load_waiter: Mutex<Option<oneshot::Sender<()>>>,
    /// Stops the task watching for connection loss.
    pub connection_watch: Mutex<Option<CancellationToken>>,
}

// ============================================================================
// Session
// ============================================================================

/// A remote inspector session.
///
/// Keeps the directory of applications and pages current, selects a
/// target, drives navigation and evaluates scripts on the selected page.
/// Cloning is cheap; clones share the same session.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Session")
            .field("app_id_key", &state.app_id_key)
            .field("page_id_key", &state.page_id_key)
            .field("is_navigating", &state.is_navigating)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a configured session builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Creates a new session.
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        atoms: Arc<dyn AtomCatalog>,
        options: SessionOptions,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                transport,
                atoms,
                options,
                directory: Mutex::new(Directory::new()),
                state: Mutex::new(SessionState::default()),
                listeners: Mutex::new(ListenerList::default()),
                load_waiter: Mutex::new(None),
                connection_watch: Mutex::new(None),
            }),
        }
    }
}

// ============================================================================
// Session - Lifecycle
// ============================================================================

impl Session {
    /// Connects to the device and starts tracking applications.
    ///
    /// With a non-zero `timeout`, waits for the first application to be
    /// reported. If none shows up in time, the session disconnects again
    /// and returns an empty directory.
    ///
    /// # Errors
    ///
    /// Returns the transport's connect error after cleaning up.
    pub async fn connect(&self, timeout: Option<Duration>) -> Result<Directory> {
        self.stop_connection_watch();
        self.reset_state();
        self.install_event_handler();

        if let Err(e) = self.inner.transport.connect().await {
            error!(error = %e, "Failed to connect to the remote inspector");
            if let Err(cleanup) = self.disconnect().await {
                debug!(error = %cleanup, "Cleanup after failed connect failed");
            }
            return Err(e);
        }
        info!("Connected to the remote inspector");
        self.watch_connection();

        let Some(timeout) = timeout.filter(|timeout| !timeout.is_zero()) else {
            return Ok(self.directory());
        };

        let timeout_ms = timeout.as_millis() as u64;
        debug!(timeout_ms, "Waiting for applications to be reported");

        let started = Instant::now();
        while !self.has_applications() {
            if started.elapsed() >= timeout {
                warn!(timeout_ms, "No applications reported, disconnecting");
                self.disconnect().await?;
                return Ok(Directory::new());
            }
            tokio::time::sleep(APP_REPORT_POLL_INTERVAL).await;
        }

        Ok(self.directory())
    }

    /// Disconnects from the device and clears all state.
    ///
    /// Safe to call at any time, including after a failed connect.
    ///
    /// # Errors
    ///
    /// Returns the transport's disconnect error; local state is cleared
    /// regardless.
    pub async fn disconnect(&self) -> Result<()> {
        self.stop_connection_watch();
        self.inner.transport.clear_event_handler();
        let result = self.inner.transport.disconnect().await;

        self.reset_state();
        info!("Disconnected from the remote inspector");
        self.emit(SessionEvent::Disconnected);

        result
    }

    /// Clears the directory and state, cancelling any page load wait.
    fn reset_state(&self) {
        let previous = {
            let mut directory = self.inner.directory.lock();
            let mut state = self.inner.state.lock();
            directory.clear();
            std::mem::take(&mut *state)
        };

        if let Some(token) = previous.page_load_cancel {
            token.cancel();
        }
        self.inner.load_waiter.lock().take();
    }

    /// Routes transport notifications into this session.
    ///
    /// The handler holds a weak reference so the transport does not keep
    /// the session alive.
    fn install_event_handler(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner
            .transport
            .set_event_handler(Box::new(move |notification| {
                if let Some(inner) = weak.upgrade() {
                    Session { inner }.handle_notification(notification);
                }
            }));
    }

    /// Tears the session down when the transport loses its connection.
    ///
    /// The task holds a weak reference and ends on [`disconnect`](Self::disconnect).
    fn watch_connection(&self) {
        let closed = self.inner.transport.connection_closed();
        let stop = CancellationToken::new();
        *self.inner.connection_watch.lock() = Some(stop.clone());

        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = stop.cancelled() => {}
                () = closed.cancelled() => {
                    if let Some(inner) = weak.upgrade() {
                        Session { inner }.on_connection_lost();
                    }
                }
            }
        });
    }

    fn stop_connection_watch(&self) {
        if let Some(stop) = self.inner.connection_watch.lock().take() {
            stop.cancel();
        }
    }

    fn on_connection_lost(&self) {
        warn!("Connection to the remote inspector lost");
        self.inner.connection_watch.lock().take();
        self.inner.transport.clear_event_handler();
        self.reset_state();
        self.emit(SessionEvent::Disconnected);
    }

    fn has_applications(&self) -> bool {
        !self.inner.directory.lock().is_empty()
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl Session {
    /// Returns a snapshot of the directory.
    #[must_use]
    pub fn directory(&self) -> Directory {
        self.inner.directory.lock().clone()
    }

    /// Returns `true` while the transport is connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.transport.is_connected()
    }

    /// Returns the session options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    /// Returns the page load timeout.
    #[inline]
    #[must_use]
    pub fn page_load_timeout(&self) -> Duration {
        self.inner.options.page_load_timeout
    }

    /// Returns the page load strategy.
    #[inline]
    #[must_use]
    pub fn page_load_strategy(&self) -> PageLoadStrategy {
        self.inner.options.page_load_strategy
    }

    /// Returns the selected application and page.
    #[must_use]
    pub fn selection(&self) -> Selection {
        let state = self.inner.state.lock();
        Selection {
            app_id_key: state.app_id_key.clone(),
            page_id_key: state.page_id_key.clone(),
        }
    }

    /// Returns `true` while a navigation is in flight.
    #[must_use]
    pub fn is_navigating(&self) -> bool {
        self.inner.state.lock().is_navigating
    }

    /// Returns `true` while a page load wait is in flight.
    #[must_use]
    pub fn is_page_loading(&self) -> bool {
        self.inner.state.lock().is_page_loading
    }

    /// Returns the last reported automation availability.
    #[must_use]
    pub fn automation_availability(&self) -> Value {
        self.inner.state.lock().automation_availability.clone()
    }

    /// Returns the last reported connected driver list.
    #[must_use]
    pub fn connected_drivers(&self) -> Value {
        self.inner.state.lock().connected_drivers.clone()
    }
}

// ============================================================================
// Session - Internal
// ============================================================================

impl Session {
    /// Returns the selected application and page, or which one is missing.
    pub(crate) fn require_selection(&self) -> Result<(AppIdKey, PageIdKey)> {
        let state = self.inner.state.lock();
        let app_id_key = state
            .app_id_key
            .clone()
            .ok_or(Error::not_selected("appIdKey"))?;
        let page_id_key = state
            .page_id_key
            .clone()
            .ok_or(Error::not_selected("pageIdKey"))?;
        Ok((app_id_key, page_id_key))
    }

    /// Stores the selection.
    pub(crate) fn set_selection(&self, app_id_key: AppIdKey, page_id_key: PageIdKey) {
        let mut state = self.inner.state.lock();
        state.app_id_key = Some(app_id_key);
        state.page_id_key = Some(page_id_key);
    }
}

// ============================================================================
// Test Support
// ============================================================================

#[cfg(test)]
impl Session {
    /// Creates a session over a fresh mock transport.
    pub(crate) fn with_mock(
        options: SessionOptions,
    ) -> (Self, Arc<crate::transport::mock::MockTransport>) {
        let mock = Arc::new(crate::transport::mock::MockTransport::new());
        let session = Self::new(
            mock.clone(),
            Arc::new(crate::atoms::AtomRegistry::new()),
            options,
        );
        (session, mock)
    }

    /// Creates a session over a mock transport with default options.
    pub(crate) fn for_tests() -> Self {
        Self::with_mock(SessionOptions::new()).0
    }
}

// ============================================================================
// Tests
// ============================================================================
