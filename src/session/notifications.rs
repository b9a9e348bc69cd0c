//! Notification handlers maintaining the directory.
//!
//! Each handler runs on the transport's receive path: it takes the locks
//! it needs, updates the directory, releases the locks and only then emits
//! events. Handlers never block and never retry, and applying the same
//! notification twice leaves the directory unchanged.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::directory::{ApplicationRecord, page_array_from_dict};
use crate::identifiers::AppIdKey;
use crate::protocol::{Notification, ParsedNotification};

use super::{Session, SessionEvent};

// ============================================================================
// Session - Notifications
// ============================================================================

impl Session {
    /// Applies one transport notification.
    pub(crate) fn handle_notification(&self, notification: Notification) {
        match notification.parse() {
            ParsedNotification::ApplicationConnected { dict }
            | ParsedNotification::ApplicationUpdated { dict } => self.on_app_connected(&dict),

            ParsedNotification::ApplicationDisconnected { app_id_key } => {
                self.on_app_disconnected(app_id_key);
            }

            ParsedNotification::PageListingChanged {
                app_id_key,
                page_dict,
            } => self.on_page_listing(app_id_key, &page_dict),

            ParsedNotification::ConnectedApplicationList { apps } => {
                self.on_connected_application_list(&apps);
            }

            ParsedNotification::ConnectedDriverList { drivers } => {
                debug!("Received connected driver list");
                self.inner.state.lock().connected_drivers = drivers;
            }

            ParsedNotification::AutomationAvailability { availability } => {
                debug!(%availability, "Received automation availability");
                self.inner.state.lock().automation_availability = availability;
            }

            ParsedNotification::FrameDetached { frame_id } => {
                debug!(?frame_id, "Frame detached");
                self.emit(SessionEvent::FramesDetached);
            }

            ParsedNotification::PageLoadCompleted => {
                if let Some(waiter) = self.inner.load_waiter.lock().take() {
                    let _ = waiter.send(());
                }
                debug!("Page load event received");
            }

            ParsedNotification::Unknown { method, .. } => {
                trace!(%method, "Ignoring notification");
            }
        }
    }

    /// Stores a connected or updated application.
    fn on_app_connected(&self, dict: &Value) {
        let Some(record) = ApplicationRecord::from_dict(dict) else {
            warn!(%dict, "Application notification without identifier");
            return;
        };
        debug!(
            app_id_key = %record.id,
            bundle_id = %record.bundle_id,
            is_proxy = record.is_proxy,
            "Application connected"
        );

        let mut directory = self.inner.directory.lock();
        directory.upsert(record);

        let mut state = self.inner.state.lock();
        if state.app_id_key.is_none()
            && let Some(bundle_id) = self.inner.options.bundle_id.as_deref()
        {
            state.app_id_key = directory.debugger_app_key(bundle_id);
            if let Some(key) = &state.app_id_key {
                debug!(app_id_key = %key, "Selected debugger application");
            }
        }
    }

    /// Removes a departed application.
    fn on_app_disconnected(&self, app_id_key: Option<AppIdKey>) {
        let Some(app_id_key) = app_id_key else {
            warn!("Disconnect notification without identifier");
            return;
        };
        debug!(%app_id_key, "Application disconnected");

        let now_empty = {
            let mut directory = self.inner.directory.lock();
            directory.remove(&app_id_key);

            let mut state = self.inner.state.lock();
            if state.app_id_key.as_ref() == Some(&app_id_key) {
                let replacement = self
                    .inner
                    .options
                    .bundle_id
                    .as_deref()
                    .and_then(|bundle_id| directory.debugger_app_key(bundle_id));
                debug!(replacement = ?replacement, "Selected application went away");
                state.app_id_key = replacement;
                state.page_id_key = None;
                state.synced_page = None;
            }
            directory.is_empty()
        };

        if now_empty {
            debug!("Main app disconnected, no applications left");
            self.emit(SessionEvent::Disconnected);
        }
    }

    /// Replaces the page array of an application.
    fn on_page_listing(&self, app_id_key: Option<AppIdKey>, page_dict: &Value) {
        let Some(app_id_key) = app_id_key else {
            warn!("Page listing without application identifier");
            return;
        };
        let pages = page_array_from_dict(page_dict);

        let suppressed = {
            let mut directory = self.inner.directory.lock();
            if !directory.set_pages(&app_id_key, pages.clone()) {
                trace!(%app_id_key, "Page listing unchanged");
                return;
            }
            self.inner.state.lock().is_navigating
        };

        if suppressed {
            debug!(%app_id_key, "Page listing changed during navigation");
            return;
        }

        debug!(%app_id_key, pages = pages.len(), "Page listing changed");
        self.emit(SessionEvent::PageChanged {
            app_id: app_id_key.numeric_id().to_string(),
            pages,
        });
    }

    /// Merges a snapshot of connected applications.
    fn on_connected_application_list(&self, apps: &Value) {
        let entries: Vec<&Value> = match apps {
            Value::Object(map) => map.values().collect(),
            Value::Array(items) => items.iter().collect(),
            _ => Vec::new(),
        };

        let skipped = &self.inner.options.skipped_app_names;
        let records: Vec<ApplicationRecord> = entries
            .into_iter()
            .filter_map(ApplicationRecord::from_dict)
            .filter(|record| {
                let skip = skipped.iter().any(|name| name == &record.name);
                if skip {
                    trace!(app_id_key = %record.id, name = %record.name, "Skipping application");
                }
                !skip
            })
            .collect();

        let added = self.inner.directory.lock().merge_defaults(records);
        debug!(added, "Received connected application list");
    }
}

// ============================================================================
// Tests
// ============================================================================
