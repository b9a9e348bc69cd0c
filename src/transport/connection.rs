//! WebSocket transport and event loop.
//!
//! This module talks to a remote inspector relay over WebSocket, including
//! request/response correlation and notification routing.
//!
//! # Event Loop
//!
//! Connecting spawns a tokio task that handles:
//!
//! - Incoming frames from the relay (responses, notifications)
//! - Outgoing commands from the session
//! - Request/response correlation by UUID
//! - Notification handler callbacks
//!
//! # Relay Envelope
//!
//! | Frame | Shape |
//! |-------|-------|
//! | Request | `{"id", "method", "params"}` |
//! | Response | `{"id", "result"}` or `{"id", "error"}` |
//! | Notification | `{"method", "params"}` |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, from_str, json, to_string};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::identifiers::{AppIdKey, PageIdKey, RequestId};
use crate::protocol::{Notification, Request, Response};

use super::{EventHandler, SelectedApp, Transport, closed_token};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for establishing the WebSocket connection.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for command execution.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum pending requests before rejecting new ones.
const MAX_PENDING_REQUESTS: usize = 100;

const METHOD_SET_CONNECTION_KEY: &str = "Target.setConnectionKey";
const METHOD_SELECT_APP: &str = "Target.selectApp";
const METHOD_SELECT_PAGE: &str = "Target.selectPage";
const METHOD_WAIT_FOR_PAGE: &str = "Target.waitForPage";

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type WsSink = SplitSink<WsStream, Message>;

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<Response>>>;

/// Handler slot shared between the transport and its event loop.
type SharedHandler = Arc<Mutex<Option<EventHandler>>>;

// ============================================================================
// TransportOptions
// ============================================================================

/// Timeouts of the WebSocket transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    /// Maximum time to establish the WebSocket connection.
    pub connect_timeout: Duration,
    /// Maximum time to wait for a command response.
    pub request_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl TransportOptions {
    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-request timeout.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a request and wait for response.
    Send {
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
    },
    /// Send a request and only confirm the write.
    Post {
        request: Request,
        written_tx: oneshot::Sender<Result<()>>,
    },
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(RequestId),
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// ConnectionHandle
// ============================================================================

/// Handle to a running event loop.
#[derive(Clone)]
struct ConnectionHandle {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Cancelled when the event loop terminates.
    closed: CancellationToken,
}

// ============================================================================
// CorrelationGuard
// ============================================================================

/// Removes a correlation entry when its request is abandoned.
///
/// Dropped unanswered on the request timeout or when the caller stops
/// waiting, e.g. under an outer timeout.
struct CorrelationGuard {
    request_id: RequestId,
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    answered: bool,
}

impl Drop for CorrelationGuard {
    fn drop(&mut self) {
        if !self.answered {
            let _ = self
                .command_tx
                .send(ConnectionCommand::RemoveCorrelation(self.request_id));
        }
    }
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// WebSocket connection to a remote inspector relay.
///
/// # Thread Safety
///
/// `WebSocketTransport` is `Send + Sync` and can be shared across tasks.
pub struct WebSocketTransport {
    /// Relay endpoint.
    url: Url,
    /// Timeouts.
    options: TransportOptions,
    /// Key identifying this client to the relay.
    connection_key: String,
    /// Running event loop, if connected.
    handle: Mutex<Option<ConnectionHandle>>,
    /// Notification handler (shared with event loop).
    event_handler: SharedHandler,
}

impl WebSocketTransport {
    /// Creates an unconnected transport for a relay endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] unless `url` is a `ws://` or `wss://` URL.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_options(url, TransportOptions::default())
    }

    /// Creates an unconnected transport with custom timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] unless `url` is a `ws://` or `wss://` URL.
    pub fn with_options(url: &str, options: TransportOptions) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| Error::invalid_url(url, e))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(Error::invalid_url(url, "scheme must be ws or wss"));
        }

        Ok(Self {
            url: parsed,
            options,
            connection_key: Uuid::new_v4().to_string().to_uppercase(),
            handle: Mutex::new(None),
            event_handler: Arc::new(Mutex::new(None)),
        })
    }

    /// Returns the relay endpoint.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the number of pending requests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.handle
            .lock()
            .as_ref()
            .map_or(0, |handle| handle.correlation.lock().len())
    }

    /// Returns the live connection handle.
    fn live_handle(&self) -> Result<ConnectionHandle> {
        self.handle
            .lock()
            .as_ref()
            .filter(|handle| !handle.closed.is_cancelled())
            .cloned()
            .ok_or(Error::NotConnected)
    }

    /// Sends a request and waits for response with the request timeout.
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let handle = self.live_handle()?;
        let request = Request::new(method, params);
        let request_id = request.id;
        let request_timeout = self.options.request_timeout;

        // Check pending request limit
        {
            let correlation = handle.correlation.lock();
            if correlation.len() >= MAX_PENDING_REQUESTS {
                warn!(
                    pending = correlation.len(),
                    max = MAX_PENDING_REQUESTS,
                    "Too many pending requests"
                );
                return Err(Error::protocol(format!(
                    "Too many pending requests: {}/{}",
                    correlation.len(),
                    MAX_PENDING_REQUESTS
                )));
            }
        }

        let (response_tx, response_rx) = oneshot::channel();
        handle
            .command_tx
            .send(ConnectionCommand::Send {
                request,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        let mut guard = CorrelationGuard {
            request_id,
            command_tx: handle.command_tx.clone(),
            answered: false,
        };

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => {
                guard.answered = true;
                result?.into_result(method)
            }
            Ok(Err(_)) => {
                guard.answered = true;
                Err(Error::ConnectionClosed)
            }
            Err(_) => Err(Error::request_timeout(
                request_id,
                request_timeout.as_millis() as u64,
            )),
        }
    }

    /// Sends a request without waiting for its response.
    async fn post(&self, method: &str, params: Value) -> Result<()> {
        let handle = self.live_handle()?;
        let (written_tx, written_rx) = oneshot::channel();

        handle
            .command_tx
            .send(ConnectionCommand::Post {
                request: Request::new(method, params),
                written_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        written_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: WsStream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
        event_handler: SharedHandler,
        closed: CancellationToken,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming frames from the relay
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_message(&text, &correlation, &event_handler);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the session
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { request, response_tx }) => {
                            Self::handle_send_command(
                                request,
                                response_tx,
                                &mut ws_write,
                                &correlation,
                            ).await;
                        }

                        Some(ConnectionCommand::Post { request, written_tx }) => {
                            let method = request.method.clone();
                            let result = Self::write_request(&request, &mut ws_write).await;
                            trace!(%method, ok = result.is_ok(), "Request posted");
                            let _ = written_tx.send(result);
                        }

                        Some(ConnectionCommand::RemoveCorrelation(request_id)) => {
                            if correlation.lock().remove(&request_id).is_some() {
                                debug!(%request_id, "Removed abandoned correlation");
                            }
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        Self::fail_pending_requests(&correlation);
        closed.cancel();

        debug!("Event loop terminated");
    }

    /// Handles an incoming text frame from the relay.
    fn handle_incoming_message(
        text: &str,
        correlation: &Arc<Mutex<CorrelationMap>>,
        event_handler: &SharedHandler,
    ) {
        if let Ok(response) = from_str::<Response>(text) {
            let tx = correlation.lock().remove(&response.id);

            if let Some(tx) = tx {
                let _ = tx.send(Ok(response));
            } else {
                warn!(id = %response.id, "Response for unknown request");
            }
            return;
        }

        if let Ok(notification) = from_str::<Notification>(text) {
            trace!(method = %notification.method, "Notification received");
            let handler = event_handler.lock();
            if let Some(ref handler) = *handler {
                handler(notification);
            }
            return;
        }

        warn!(text = %text, "Failed to parse incoming message");
    }

    /// Handles a send command from the session.
    async fn handle_send_command(
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
        ws_write: &mut WsSink,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) {
        let request_id = request.id;

        // Store correlation before sending
        correlation.lock().insert(request_id, response_tx);

        if let Err(e) = Self::write_request(&request, ws_write).await
            && let Some(tx) = correlation.lock().remove(&request_id)
        {
            let _ = tx.send(Err(e));
        }

        trace!(%request_id, method = %request.method, "Request sent");
    }

    /// Serializes and writes one request frame.
    async fn write_request(request: &Request, ws_write: &mut WsSink) -> Result<()> {
        let json = to_string(request)?;
        ws_write
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| Error::connection(e.to_string()))
    }

    /// Fails all pending requests with ConnectionClosed error.
    fn fail_pending_requests(correlation: &Arc<Mutex<CorrelationMap>>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on shutdown");
        }
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let connect_timeout = self.options.connect_timeout;
        let (ws_stream, _) = timeout(connect_timeout, tokio_tungstenite::connect_async(self.url.as_str()))
            .await
            .map_err(|_| Error::connection_timeout(connect_timeout.as_millis() as u64))??;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let closed = CancellationToken::new();

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&correlation),
            Arc::clone(&self.event_handler),
            closed.clone(),
        ));

        *self.handle.lock() = Some(ConnectionHandle {
            command_tx,
            correlation,
            closed,
        });

        info!(url = %self.url, "Connected to inspector relay");

        let params = json!({ "connectionKey": self.connection_key });
        if let Err(e) = self.request(METHOD_SET_CONNECTION_KEY, params).await {
            error!(error = %e, "Error setting connection key");
            self.disconnect().await?;
            return Err(e);
        }

        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let Some(handle) = self.handle.lock().take() else {
            return Ok(());
        };

        let _ = handle.command_tx.send(ConnectionCommand::Shutdown);
        debug!(url = %self.url, "Disconnected from inspector relay");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.closed.is_cancelled())
    }

    fn connection_closed(&self) -> CancellationToken {
        match self.handle.lock().as_ref() {
            Some(handle) => handle.closed.clone(),
            None => closed_token(),
        }
    }

    async fn send(&self, method: &str, params: Value, wait_for_response: bool) -> Result<Value> {
        if wait_for_response {
            self.request(method, params).await
        } else {
            self.post(method, params).await.map(|()| Value::Null)
        }
    }

    fn set_event_handler(&self, handler: EventHandler) {
        *self.event_handler.lock() = Some(handler);
    }

    fn clear_event_handler(&self) {
        *self.event_handler.lock() = None;
    }

    async fn select_app(&self, app_id_key: &AppIdKey) -> Result<SelectedApp> {
        let result = self
            .request(METHOD_SELECT_APP, json!({ "appIdKey": app_id_key }))
            .await?;

        let selected = result
            .get("appIdKey")
            .and_then(Value::as_str)
            .map_or_else(|| app_id_key.clone(), AppIdKey::new);
        let page_dict = result.get("pageDict").cloned().unwrap_or(Value::Null);

        Ok(SelectedApp {
            app_id_key: selected,
            page_dict,
        })
    }

    async fn select_page(&self, app_id_key: &AppIdKey, page_id_key: &PageIdKey) -> Result<()> {
        let params = json!({ "appIdKey": app_id_key, "pageIdKey": page_id_key });
        self.request(METHOD_SELECT_PAGE, params).await.map(drop)
    }

    async fn wait_for_page(&self, app_id_key: &AppIdKey, page_id_key: &PageIdKey) -> Result<()> {
        let params = json!({ "appIdKey": app_id_key, "pageIdKey": page_id_key });
        self.request(METHOD_WAIT_FOR_PAGE, params).await.map(drop)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            let _ = handle.command_tx.send(ConnectionCommand::Shutdown);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
