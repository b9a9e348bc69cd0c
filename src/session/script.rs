//! Script evaluation on the selected page.
//!
//! Synchronous scripts are evaluated by value. Asynchronous atoms report
//! through a page-side promise that is awaited with `Runtime.awaitPromise`,
//! or polled when the remote end lacks that command.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::identifiers::{AppIdKey, PageIdKey};
use crate::protocol::{Command, EvaluationResponse, convert_result};

use super::Session;

// ============================================================================
// Constants
// ============================================================================

/// Interval between result polls when promises cannot be awaited.
const ASYNC_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Prefix of the page globals used by one asynchronous execution.
const ASYNC_PROMISE_PREFIX: &str = "asyncExecutePromise";

// ============================================================================
// AsyncGlobals
// ============================================================================

/// Names of the page globals backing one asynchronous execution.
struct AsyncGlobals {
    name: String,
}

impl AsyncGlobals {
    fn generate() -> Self {
        Self {
            name: format!("{ASYNC_PROMISE_PREFIX}{}", Uuid::new_v4().simple()),
        }
    }

    /// Creates the promise and exposes its resolvers; evaluates to the promise.
    fn setup_script(&self) -> String {
        let name = &self.name;
        format!(
            "var res, rej;\
             window.{name} = new Promise(function (resolve, reject) {{ res = resolve; rej = reject; }});\
             window.{name}Resolve = res;\
             window.{name}Reject = rej;\
             window.{name};"
        )
    }

    /// Callback handed to the atom.
    fn callback(&self) -> String {
        let name = &self.name;
        format!("function (res) {{ window.{name}Value = res; window.{name}Resolve(res); }}")
    }

    fn has_value_script(&self) -> String {
        format!("window.hasOwnProperty('{}Value')", self.name)
    }

    fn value_script(&self) -> String {
        format!("window.{}Value", self.name)
    }

    fn cleanup_script(&self) -> String {
        let name = &self.name;
        format!(
            "delete window.{name}; delete window.{name}Resolve; \
             delete window.{name}Reject; delete window.{name}Value;"
        )
    }
}

// ============================================================================
// Session - Script Execution
// ============================================================================

impl Session {
    /// Evaluates `expression` on the selected page and returns its value.
    ///
    /// Runs a garbage collection pass first when configured.
    ///
    /// # Errors
    ///
    /// - [`Error::NotSelected`] if no page is selected
    /// - [`Error::ScriptError`] if the script threw or reported a failure
    pub async fn execute(&self, expression: &str) -> Result<Value> {
        self.require_selection()?;
        if self.inner.options.garbage_collect_on_execute {
            self.garbage_collect().await;
        }

        let value = self.evaluate_value(expression).await?;
        convert_result(value)
    }

    /// Executes atom `name` with `args` inside `frames`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an unknown atom, otherwise as
    /// [`execute`](Self::execute).
    pub async fn execute_atom(
        &self,
        name: &str,
        args: &[Value],
        frames: &[String],
    ) -> Result<Value> {
        let script = self.inner.atoms.get_script(name, args, frames, None)?;
        debug!(atom = name, frames = frames.len(), "Executing atom");
        self.execute(&script).await
    }

    /// Executes asynchronous atom `name` and waits for its callback.
    ///
    /// The wait is bounded by `timeout`, else by the third atom argument in
    /// milliseconds when it is numeric, else by the configured async script
    /// timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the atom does not report in time
    /// - [`Error::ScriptError`] if the atom reported a failure
    /// - As [`execute`](Self::execute)
    pub async fn execute_atom_async(
        &self,
        name: &str,
        args: &[Value],
        frames: &[String],
        timeout: Option<Duration>,
    ) -> Result<Value> {
        self.require_selection()?;

        let timeout = timeout
            .or_else(|| args.get(2).and_then(Value::as_u64).map(Duration::from_millis))
            .unwrap_or(self.inner.options.async_script_timeout);
        let globals = AsyncGlobals::generate();
        debug!(
            atom = name,
            promise = %globals.name,
            timeout_ms = timeout.as_millis() as u64,
            "Executing asynchronous atom"
        );

        let result = self.run_async_atom(&globals, name, args, frames, timeout).await;

        if let Err(e) = self
            .send_page_command(Command::evaluate(globals.cleanup_script()), true)
            .await
        {
            debug!(promise = %globals.name, error = %e, "Failed to clean up async globals");
        }

        result
    }

    /// Calls `function_declaration` with the remote object `object_id` as
    /// receiver.
    ///
    /// # Errors
    ///
    /// As [`execute`](Self::execute).
    pub async fn call_function(
        &self,
        object_id: &str,
        function_declaration: &str,
        arguments: &[Value],
    ) -> Result<Value> {
        self.require_selection()?;
        if self.inner.options.garbage_collect_on_execute {
            self.garbage_collect().await;
        }

        let raw = self
            .send_page_command(
                Command::CallFunctionOn {
                    object_id: object_id.to_string(),
                    function_declaration: function_declaration.to_string(),
                    arguments: arguments.to_vec(),
                    return_by_value: true,
                },
                true,
            )
            .await?;
        convert_result(EvaluationResponse::from_value(raw)?.into_value()?)
    }

    async fn run_async_atom(
        &self,
        globals: &AsyncGlobals,
        name: &str,
        args: &[Value],
        frames: &[String],
        timeout: Duration,
    ) -> Result<Value> {
        let deadline = Instant::now() + timeout;
        let timeout_ms = timeout.as_millis() as u64;

        let promise = self
            .evaluate(Command::evaluate_by_reference(globals.setup_script()))
            .await?
            .into_remote_object()?;
        let promise_object_id = promise
            .object_id
            .ok_or_else(|| Error::protocol("Async setup did not return a promise reference"))?;

        let callback = globals.callback();
        let script = self
            .inner
            .atoms
            .get_script(name, args, frames, Some(&callback))?;
        self.execute(&script).await?;

        let awaited = tokio::time::timeout_at(
            deadline,
            self.evaluate(Command::AwaitPromise {
                promise_object_id,
                return_by_value: true,
                generate_preview: false,
                save_result: false,
            }),
        )
        .await;

        match awaited {
            Ok(Ok(response)) => convert_result(response.into_value()?),
            Ok(Err(Error::UnknownCommand { command })) => {
                debug!(%command, "Promises cannot be awaited, polling for the result");
                self.poll_async_result(globals, deadline, timeout_ms).await
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::timeout("asynchronous script", timeout_ms)),
        }
    }

    /// Polls the page for the async result until `deadline`.
    async fn poll_async_result(
        &self,
        globals: &AsyncGlobals,
        deadline: Instant,
        timeout_ms: u64,
    ) -> Result<Value> {
        let started = Instant::now();
        let has_value = globals.has_value_script();

        loop {
            if self.evaluate_value(&has_value).await?.as_bool() == Some(true) {
                trace!(
                    promise = %globals.name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Async result available"
                );
                let value = self.evaluate_value(&globals.value_script()).await?;
                return convert_result(value);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(promise = %globals.name, timeout_ms, "Timed out waiting for async result");
                return Err(Error::timeout("asynchronous script", timeout_ms));
            }
            tokio::time::sleep(ASYNC_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

// ============================================================================
// Session - Evaluation Plumbing
// ============================================================================

impl Session {
    /// Sends `command` to the selected page.
    pub(crate) async fn send_page_command(
        &self,
        command: Command,
        wait_for_response: bool,
    ) -> Result<Value> {
        let (app_id_key, page_id_key) = self.require_selection()?;
        self.ensure_page_synced(&app_id_key, &page_id_key).await?;

        let (method, params) = command.into_parts(&app_id_key, &page_id_key)?;
        trace!(method, %app_id_key, %page_id_key, "Sending page command");
        self.inner
            .transport
            .send(method, params, wait_for_response)
            .await
    }

    /// Attaches the transport to the given page.
    pub(crate) async fn sync_page(
        &self,
        app_id_key: &AppIdKey,
        page_id_key: &PageIdKey,
    ) -> Result<()> {
        self.inner
            .transport
            .select_page(app_id_key, page_id_key)
            .await?;
        self.inner.state.lock().synced_page = Some((app_id_key.clone(), page_id_key.clone()));
        Ok(())
    }

    async fn ensure_page_synced(
        &self,
        app_id_key: &AppIdKey,
        page_id_key: &PageIdKey,
    ) -> Result<()> {
        let synced = {
            let state = self.inner.state.lock();
            state
                .synced_page
                .as_ref()
                .is_some_and(|(app, page)| app == app_id_key && page == page_id_key)
        };
        if synced {
            return Ok(());
        }
        self.sync_page(app_id_key, page_id_key).await
    }

    async fn evaluate(&self, command: Command) -> Result<EvaluationResponse> {
        let raw = self.send_page_command(command, true).await?;
        EvaluationResponse::from_value(raw)
    }

    /// Evaluates `expression` by value without result conversion.
    pub(crate) async fn evaluate_value(&self, expression: &str) -> Result<Value> {
        self.evaluate(Command::evaluate(expression))
            .await?
            .into_value()
    }

    /// Requests a garbage collection pass; failures are only logged.
    async fn garbage_collect(&self) {
        let timeout = self.inner.options.garbage_collect_timeout;
        match tokio::time::timeout(timeout, self.send_page_command(Command::GarbageCollect, true))
            .await
        {
            Ok(Ok(_)) => trace!("Garbage collected"),
            Ok(Err(e)) => warn!(error = %e, "Garbage collection failed"),
            Err(_) => warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Garbage collection timed out"
            ),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
