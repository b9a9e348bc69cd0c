//! Navigation and page readiness.
//!
//! A navigation runs through three states:
//!
//! ```text
//! Idle ──navigate──► Navigating ──load event / timeout──► AwaitingReadiness ──► Idle
//!                        │                                       │
//!                        └────────── cancel_page_load ───────────┘
//! ```
//!
//! While navigating, page listing changes update the directory silently.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::PageLoadStrategy;
use crate::error::{Error, Result};
use crate::protocol::Command;

use super::Session;
use super::delay::{CancellableDelay, DelayOutcome};

// ============================================================================
// Constants
// ============================================================================

/// First interval between readiness probes; doubles after each probe.
const READINESS_BASE_INTERVAL: Duration = Duration::from_millis(100);

/// Lower bound of the interval between readiness probes.
const MIN_READINESS_INTERVAL: Duration = Duration::from_millis(10);

/// Expression probing document readiness.
const READY_STATE_EXPRESSION: &str = "document.readyState";

// ============================================================================
// PageLoadScope
// ============================================================================

/// Registration of one in-flight page load wait.
///
/// Dropping it releases the registration on every exit path.
struct PageLoadScope<'a> {
    session: &'a Session,
    token: CancellationToken,
    navigating: bool,
}

impl Drop for PageLoadScope<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.session.inner.state.lock();
            state.page_loads = state.page_loads.saturating_sub(1);
            if state.page_loads == 0 {
                state.page_load_cancel = None;
                state.is_page_loading = false;
            }
            if self.navigating {
                state.is_navigating = false;
            }
        }
        if self.navigating {
            self.session.inner.load_waiter.lock().take();
        }
    }
}

// ============================================================================
// Session - Navigation
// ============================================================================

impl Session {
    /// Navigates the selected page and waits for it to be ready.
    ///
    /// Waits for the page load event or the page load timeout, whichever
    /// comes first, then polls readiness with the remaining budget. A
    /// timeout is logged, not raised.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if `url` does not parse
    /// - [`Error::NotSelected`] if no page is selected
    /// - [`Error::ConsoleForwarding`] if console events cannot be re-enabled
    /// - [`Error::ConnectionClosed`] if the connection drops meanwhile
    /// - Transport errors from sending the navigation
    pub async fn navigate(&self, url: &str) -> Result<()> {
        Url::parse(url).map_err(|e| Error::invalid_url(url, e))?;
        let (app_id_key, page_id_key) = self.require_selection()?;

        let timeout = self.inner.options.page_load_timeout;
        let timeout_ms = timeout.as_millis() as u64;
        info!(%url, %app_id_key, %page_id_key, timeout_ms, "Navigating");

        let closed = self.inner.transport.connection_closed();
        let started = Instant::now();
        {
            let scope = self.begin_page_load(true);
            let load_rx = self.register_load_waiter();
            let delay = CancellableDelay::new(timeout, scope.token.child_token());

            let load = async {
                self.send_page_command(
                    Command::Navigate {
                        url: url.to_string(),
                    },
                    true,
                )
                .await?;
                // A dropped sender means the session was reset; stop waiting.
                let _ = load_rx.await;
                Ok::<(), Error>(())
            };

            let proceed = tokio::select! {
                biased;
                () = closed.cancelled() => {
                    warn!("Connection lost while waiting for page load");
                    return Err(Error::ConnectionClosed);
                }
                outcome = delay.wait() => match outcome {
                    DelayOutcome::Elapsed => {
                        warn!(timeout_ms, "Timed out waiting for page load event, continuing anyway");
                        true
                    }
                    DelayOutcome::Cancelled => {
                        debug!("Page load cancelled");
                        false
                    }
                },
                result = load => {
                    result?;
                    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Page load event received");
                    true
                }
            };

            if proceed {
                let remaining = timeout.saturating_sub(started.elapsed());
                self.poll_until_ready(remaining, &scope.token).await?;
            }
        }

        if closed.is_cancelled() {
            return Err(Error::ConnectionClosed);
        }

        self.enable_console().await?;
        debug!(%url, elapsed_ms = started.elapsed().as_millis() as u64, "Navigation finished");
        Ok(())
    }

    /// Waits until the selected page is ready under the page load strategy.
    ///
    /// Gives up silently when the page load timeout elapses, the selected
    /// application goes away or [`cancel_page_load`](Self::cancel_page_load)
    /// is called.
    ///
    /// # Errors
    ///
    /// Returns connection errors from the readiness probe.
    pub async fn wait_until_ready(&self) -> Result<()> {
        let scope = self.begin_page_load(false);
        self.poll_until_ready(self.inner.options.page_load_timeout, &scope.token)
            .await
    }

    /// Cancels every in-flight page load wait.
    pub fn cancel_page_load(&self) {
        let token = {
            let mut state = self.inner.state.lock();
            state.is_page_loading = false;
            state.page_load_cancel.take()
        };

        if let Some(token) = token {
            debug!("Cancelling page load");
            token.cancel();
        }
    }

    /// Probes the selected page once.
    ///
    /// A probe that does not answer within the readiness probe timeout
    /// counts as "not ready yet".
    ///
    /// # Errors
    ///
    /// Returns connection and selection errors; other probe failures count
    /// as "not ready yet".
    pub async fn check_page_is_ready(&self) -> Result<bool> {
        let strategy = self.inner.options.page_load_strategy;
        if strategy == PageLoadStrategy::None {
            return Ok(true);
        }

        let probe_timeout = self.inner.options.readiness_probe_timeout;
        match tokio::time::timeout(probe_timeout, self.evaluate_value(READY_STATE_EXPRESSION)).await
        {
            Err(_) => {
                debug!(
                    timeout_ms = probe_timeout.as_millis() as u64,
                    "Page readiness probe timed out"
                );
                Ok(false)
            }
            Ok(Ok(ready_state)) => {
                let ready = ready_state
                    .as_str()
                    .is_some_and(|state| strategy.is_complete(state));
                trace!(%ready_state, %strategy, ready, "Page readiness probed");
                Ok(ready)
            }
            Ok(Err(e)) if e.is_connection_error() || e.is_configuration_error() => Err(e),
            Ok(Err(e)) => {
                debug!(error = %e, "Page readiness probe failed");
                Ok(false)
            }
        }
    }

    /// Polls readiness with exponential back-off until `budget` elapses.
    async fn poll_until_ready(&self, budget: Duration, token: &CancellationToken) -> Result<()> {
        let started = Instant::now();
        let mut interval = READINESS_BASE_INTERVAL;
        let mut probes: u32 = 0;

        loop {
            if self.inner.state.lock().app_id_key.is_none() {
                debug!("No application selected, stop waiting for page readiness");
                return Ok(());
            }
            if token.is_cancelled() {
                debug!("Page readiness wait cancelled");
                return Ok(());
            }

            probes += 1;
            if self.check_page_is_ready().await? {
                debug!(
                    probes,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Page is ready"
                );
                return Ok(());
            }

            let elapsed = started.elapsed();
            if elapsed >= budget {
                warn!(
                    probes,
                    timeout_ms = budget.as_millis() as u64,
                    "Page did not become ready in time, continuing anyway"
                );
                return Ok(());
            }

            let wait = interval.min(budget - elapsed).max(MIN_READINESS_INTERVAL);
            if CancellableDelay::new(wait, token.child_token()).wait().await
                == DelayOutcome::Cancelled
            {
                debug!("Page readiness wait cancelled");
                return Ok(());
            }
            interval = interval.saturating_mul(2);
        }
    }

    /// Registers a page load wait.
    fn begin_page_load(&self, navigating: bool) -> PageLoadScope<'_> {
        let mut state = self.inner.state.lock();
        let token = state
            .page_load_cancel
            .get_or_insert_with(CancellationToken::new)
            .clone();
        state.page_loads += 1;
        state.is_page_loading = true;
        if navigating {
            state.is_navigating = true;
        }

        PageLoadScope {
            session: self,
            token,
            navigating,
        }
    }

    /// Arms the one-shot waiter for the next page load event.
    fn register_load_waiter(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        *self.inner.load_waiter.lock() = Some(tx);
        rx
    }

    /// Re-enables console forwarding after a navigation.
    async fn enable_console(&self) -> Result<()> {
        let timeout = self.inner.options.console_enable_timeout;
        match tokio::time::timeout(timeout, self.send_page_command(Command::ConsoleEnable, true))
            .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(Error::console_forwarding(e.to_string())),
            Err(_) => Err(Error::console_forwarding(format!(
                "no response within {}ms",
                timeout.as_millis()
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use super::*;
    use crate::config::SessionOptions;
    use crate::identifiers::{AppIdKey, PageIdKey};
    use crate::protocol::Notification;
    use crate::protocol::event::LOAD_EVENT_FIRED;
    use crate::session::fixtures::{app_connected, connected, listing};
    use crate::session::{EventKind, SessionEvent};
    use crate::transport::mock::MockTransport;

    fn ready_state(state: &str) -> Value {
        json!({"result": {"type": "string", "value": state}})
    }

    /// Answers readiness probes with `state` and counts them.
    fn probe_counter(mock: &MockTransport, state: &'static str) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        mock.respond("Runtime.evaluate", move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(ready_state(state))
        });
        count
    }

    async fn selected(options: SessionOptions) -> (Session, Arc<MockTransport>) {
        let (session, mock) = connected(options).await;
        mock.emit(app_connected("PID:1", "com.app", true));
        session.set_selection(AppIdKey::new("PID:1"), PageIdKey::from(1));
        (session, mock)
    }

    fn fire_load_event_after(mock: &Arc<MockTransport>, after: Duration) {
        let mock = Arc::clone(mock);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            mock.emit(Notification::new(LOAD_EVENT_FIRED, json!({})));
        });
    }

    #[tokio::test]
    async fn test_invalid_url_records_no_calls() {
        let (session, mock) = selected(SessionOptions::new()).await;
        let before = mock.calls().len();

        let err = session.navigate("://missing-scheme").await.unwrap_err();

        assert!(matches!(err, Error::InvalidUrl { .. }));
        assert_eq!(mock.calls().len(), before);
        assert!(!session.is_navigating());
    }

    #[tokio::test]
    async fn test_navigate_requires_selection() {
        let (session, mock) = connected(SessionOptions::new()).await;
        let err = session.navigate("https://example.com").await.unwrap_err();

        assert!(matches!(err, Error::NotSelected { what: "appIdKey" }));
        assert!(mock.calls_to("Page.navigate").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_completes_on_load_event() {
        let (session, mock) = selected(SessionOptions::new()).await;
        let probes = probe_counter(&mock, "complete");
        fire_load_event_after(&mock, Duration::from_millis(200));

        let started = Instant::now();
        session.navigate("https://example.com/login").await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        let calls = mock.calls_to("Page.navigate");
        assert_eq!(
            calls[0].params,
            json!({"url": "https://example.com/login", "appIdKey": "PID:1", "pageIdKey": 1})
        );
        assert_eq!(probes.load(Ordering::SeqCst), 1);
        assert_eq!(mock.calls_to("Console.enable").len(), 1);
        assert!(!session.is_navigating());
        assert!(!session.is_page_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_continues_after_timeout() {
        let options = SessionOptions::new().with_page_load_timeout(Duration::from_secs(2));
        let (session, mock) = selected(options).await;
        probe_counter(&mock, "complete");

        let started = Instant::now();
        session.navigate("https://example.com").await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(mock.calls_to("Console.enable").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_page_load_ends_navigation() {
        let (session, mock) = selected(SessionOptions::new()).await;
        let probes = probe_counter(&mock, "loading");

        let canceller = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel_page_load();
        });

        let started = Instant::now();
        session.navigate("https://example.com").await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(probes.load(Ordering::SeqCst), 0);
        assert!(!session.is_navigating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_loss_fails_navigation_fast() {
        let (session, mock) = selected(SessionOptions::new()).await;
        probe_counter(&mock, "loading");

        let disconnects = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&disconnects);
        session.on(EventKind::Disconnected, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let dropper = Arc::clone(&mock);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            dropper.drop_connection();
        });

        let started = Instant::now();
        let err = session.navigate("https://example.com").await.unwrap_err();

        assert!(matches!(err, Error::ConnectionClosed));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!session.is_navigating());
        assert!(mock.calls_to("Console.enable").is_empty());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert!(session.directory().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_changes_suppressed_during_navigation() {
        let (session, mock) = selected(SessionOptions::new()).await;
        probe_counter(&mock, "complete");

        let events = Arc::new(Mutex::new(Vec::<SessionEvent>::new()));
        let sink = Arc::clone(&events);
        session.on(EventKind::PageChanged, move |event| sink.lock().push(event.clone()));

        let emitter = Arc::clone(&mock);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            emitter.emit(listing("PID:1", &[(1, "https://example.com/")]));
            emitter.emit(Notification::new(LOAD_EVENT_FIRED, json!({})));
        });

        session.navigate("https://example.com").await.unwrap();

        assert!(events.lock().is_empty());
        let directory = session.directory();
        let pages = directory.get(&AppIdKey::new("PID:1")).unwrap().pages.clone();
        assert_eq!(pages.map(|pages| pages.len()), Some(1));

        // Outside a navigation the same kind of change is reported.
        mock.emit(listing("PID:1", &[(1, "https://example.com/next")]));
        assert_eq!(events.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_console_failure_is_reported() {
        let (session, mock) = selected(SessionOptions::new()).await;
        probe_counter(&mock, "complete");
        mock.respond("Console.enable", |_| Err(Error::protocol("Console domain disabled")));
        fire_load_event_after(&mock, Duration::from_millis(10));

        let err = session.navigate("https://example.com").await.unwrap_err();

        assert!(matches!(err, Error::ConsoleForwarding { .. }));
        assert!(!session.is_navigating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_backs_off_until_timeout() {
        let options = SessionOptions::new().with_page_load_timeout(Duration::from_secs(1));
        let (session, mock) = selected(options).await;
        let probes = probe_counter(&mock, "loading");

        let started = Instant::now();
        session.wait_until_ready().await.unwrap();

        // Probes at 0, 100, 300, 700 and 1000ms.
        assert_eq!(probes.load(Ordering::SeqCst), 5);
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(!session.is_page_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_stops_when_app_goes_away() {
        let (session, mock) = selected(SessionOptions::new()).await;
        probe_counter(&mock, "loading");

        let clearer = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            clearer.inner.state.lock().app_id_key = None;
        });

        let started = Instant::now();
        session.wait_until_ready().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_is_not_ready() {
        let (session, mock) = selected(SessionOptions::new()).await;
        probe_counter(&mock, "complete");
        mock.delay("Runtime.evaluate", Duration::from_secs(5));

        let started = Instant::now();
        assert!(!session.check_page_is_ready().await.unwrap());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_readiness_truth_table() {
        let cases = [
            (PageLoadStrategy::Normal, "loading", false),
            (PageLoadStrategy::Normal, "interactive", false),
            (PageLoadStrategy::Normal, "complete", true),
            (PageLoadStrategy::Eager, "loading", false),
            (PageLoadStrategy::Eager, "interactive", true),
            (PageLoadStrategy::Eager, "complete", true),
            (PageLoadStrategy::None, "loading", true),
            (PageLoadStrategy::None, "interactive", true),
            (PageLoadStrategy::None, "complete", true),
        ];

        for (strategy, state, expected) in cases {
            let options = SessionOptions::new().with_page_load_strategy(strategy);
            let (session, mock) = selected(options).await;
            probe_counter(&mock, state);

            let ready = session.check_page_is_ready().await.unwrap();
            assert_eq!(ready, expected, "{strategy} / {state}");
        }
    }

    #[tokio::test]
    async fn test_probe_without_page_is_an_error() {
        let (session, _mock) = connected(SessionOptions::new()).await;
        session.inner.state.lock().app_id_key = Some(AppIdKey::new("PID:1"));

        let err = session.check_page_is_ready().await.unwrap_err();
        assert!(matches!(err, Error::NotSelected { what: "pageIdKey" }));
    }
}
