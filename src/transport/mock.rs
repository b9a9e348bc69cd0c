//! Scripted in-memory transport.
//!
//! Records every call and answers from per-method responders, so session
//! behavior can be exercised without a device.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::identifiers::{AppIdKey, PageIdKey};
use crate::protocol::Notification;

use super::{EventHandler, SelectedApp, Transport, closed_token};

// ============================================================================
// Types
// ============================================================================

/// Answers one method call from its params.
pub(crate) type Responder = Box<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Answers `select_app` for a key.
pub(crate) type AppSelector = Box<dyn Fn(&AppIdKey) -> Result<SelectedApp> + Send + Sync>;

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedCall {
    pub method: String,
    pub params: Value,
}

// ============================================================================
// MockTransport
// ============================================================================

#[derive(Default)]
pub(crate) struct MockTransport {
    connected: AtomicBool,
    closed: Mutex<Option<CancellationToken>>,
    fail_connect: AtomicBool,
    calls: Mutex<Vec<RecordedCall>>,
    handler: Mutex<Option<EventHandler>>,
    responders: Mutex<FxHashMap<String, Responder>>,
    delays: Mutex<FxHashMap<String, Duration>>,
    app_selector: Mutex<Option<AppSelector>>,
    on_connect: Mutex<Vec<Notification>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `method` with `responder`.
    pub fn respond(
        &self,
        method: &str,
        responder: impl Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    ) {
        self.responders
            .lock()
            .insert(method.to_string(), Box::new(responder));
    }

    /// Delays every answer to `method`.
    pub fn delay(&self, method: &str, delay: Duration) {
        self.delays.lock().insert(method.to_string(), delay);
    }

    /// Answers `select_app` with `selector`.
    pub fn on_select_app(
        &self,
        selector: impl Fn(&AppIdKey) -> Result<SelectedApp> + Send + Sync + 'static,
    ) {
        *self.app_selector.lock() = Some(Box::new(selector));
    }

    /// Emits `notifications` right after a successful connect.
    pub fn emit_on_connect(&self, notifications: Vec<Notification>) {
        *self.on_connect.lock() = notifications;
    }

    /// Makes the next connect attempts fail.
    pub fn fail_connect(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }

    /// Simulates the device dropping the channel.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(token) = self.closed.lock().take() {
            token.cancel();
        }
    }

    /// Delivers a notification to the installed handler.
    pub fn emit(&self, notification: Notification) {
        if let Some(handler) = self.handler.lock().as_ref() {
            handler(notification);
        }
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().is_some()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the recorded calls of `method`.
    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    fn record(&self, method: &str, params: Value) {
        self.calls.lock().push(RecordedCall {
            method: method.to_string(),
            params,
        });
    }

    async fn pause(&self, method: &str) {
        let delay = self.delays.lock().get(method).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<()> {
        self.record("connect", Value::Null);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::connection("connection refused"));
        }
        self.connected.store(true, Ordering::SeqCst);
        *self.closed.lock() = Some(CancellationToken::new());

        let notifications = std::mem::take(&mut *self.on_connect.lock());
        for notification in notifications {
            self.emit(notification);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.record("disconnect", Value::Null);
        self.connected.store(false, Ordering::SeqCst);
        if let Some(token) = self.closed.lock().take() {
            token.cancel();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connection_closed(&self) -> CancellationToken {
        self.closed.lock().clone().unwrap_or_else(closed_token)
    }

    async fn send(&self, method: &str, params: Value, wait_for_response: bool) -> Result<Value> {
        self.record(method, params.clone());
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.pause(method).await;
        if !wait_for_response {
            return Ok(Value::Null);
        }

        match self.responders.lock().get(method) {
            Some(responder) => responder(&params),
            None => Ok(json!({})),
        }
    }

    fn set_event_handler(&self, handler: EventHandler) {
        *self.handler.lock() = Some(handler);
    }

    fn clear_event_handler(&self) {
        *self.handler.lock() = None;
    }

    async fn select_app(&self, app_id_key: &AppIdKey) -> Result<SelectedApp> {
        self.record("Target.selectApp", json!({ "appIdKey": app_id_key }));
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.pause("Target.selectApp").await;

        match self.app_selector.lock().as_ref() {
            Some(selector) => selector(app_id_key),
            None => Ok(SelectedApp {
                app_id_key: app_id_key.clone(),
                page_dict: json!({}),
            }),
        }
    }

    async fn select_page(&self, app_id_key: &AppIdKey, page_id_key: &PageIdKey) -> Result<()> {
        self.record(
            "Target.selectPage",
            json!({ "appIdKey": app_id_key, "pageIdKey": page_id_key }),
        );
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    async fn wait_for_page(&self, app_id_key: &AppIdKey, page_id_key: &PageIdKey) -> Result<()> {
        self.record(
            "Target.waitForPage",
            json!({ "appIdKey": app_id_key, "pageIdKey": page_id_key }),
        );
        Ok(())
    }
}
