//! Target resolution: application and page selection.
//!
//! Selection retries against the live directory. Each attempt recomputes
//! the candidate keys, asks the device to select each candidate in turn
//! and looks for a matching page in the listing it answers with.
//!
//! | Failure | Policy |
//! |---------|--------|
//! | Connection lost | abort immediately |
//! | Candidate rejected, empty listing, no matching page | next candidate |
//! | All attempts exhausted | [`Error::AppNotFound`] |

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::{debug, info, trace};

use crate::config::SAFARI_BUNDLE_ID;
use crate::directory::{AutomationState, ListedPage, PageMatch, page_array_from_dict};
use crate::error::{Error, Result};
use crate::identifiers::{AppIdKey, PageIdKey};

use super::Session;

// ============================================================================
// Session - Resolution
// ============================================================================

impl Session {
    /// Selects an application and page, optionally matching `url`.
    ///
    /// Returns every page of every active application, with page ids
    /// prefixed by the application's numeric id, or an empty list when no
    /// application is known yet.
    ///
    /// # Arguments
    ///
    /// * `url` - Page URL to look for; `None` accepts any page
    /// * `max_tries` - Attempt bound; `None` uses the configured default
    /// * `ignore_about_blank` - Skip `about:blank` pages
    ///
    /// # Errors
    ///
    /// - [`Error::AppNotFound`] if every attempt failed
    /// - Connection errors from the transport
    pub async fn select_app(
        &self,
        url: Option<&str>,
        max_tries: Option<u32>,
        ignore_about_blank: bool,
    ) -> Result<Vec<ListedPage>> {
        if self.inner.directory.lock().is_empty() {
            debug!("No applications currently connected");
            return Ok(Vec::new());
        }

        let max_tries = max_tries.unwrap_or(self.inner.options.select_app_max_tries);
        let found = self.search_for_app(url, max_tries, ignore_about_blank).await?;
        info!(
            app_id_key = %found.app_id_key,
            page_id_key = %found.page.id,
            url = %found.page.url,
            "Selected app and page"
        );
        self.set_selection(found.app_id_key, found.page.id);

        let listing = self.inner.directory.lock().full_page_listing(ignore_about_blank);
        self.log_directory();
        Ok(listing)
    }

    /// Attaches to a specific page.
    ///
    /// `app_id` may be given with or without the `PID:` prefix. Unless
    /// `skip_ready_check` is set, waits for the page to become ready.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the selection or the readiness probe.
    pub async fn select_page(
        &self,
        app_id: &str,
        page_id_key: PageIdKey,
        skip_ready_check: bool,
    ) -> Result<()> {
        let app_id_key = AppIdKey::from_app_id(app_id);
        debug!(%app_id_key, %page_id_key, "Selecting page");

        self.set_selection(app_id_key.clone(), page_id_key.clone());
        self.sync_page(&app_id_key, &page_id_key).await?;

        if !skip_ready_check && !self.check_page_is_ready().await? {
            self.wait_until_ready().await?;
        }
        debug!(%app_id_key, %page_id_key, "Selected page");
        Ok(())
    }

    /// Waits until the device can attach to a page.
    ///
    /// # Errors
    ///
    /// Returns transport errors.
    pub async fn wait_for_page(&self, app_id: &str, page_id_key: PageIdKey) -> Result<()> {
        let app_id_key = AppIdKey::from_app_id(app_id);
        self.inner
            .transport
            .wait_for_page(&app_id_key, &page_id_key)
            .await
    }

    /// Retries application selection until a matching page is found.
    pub(crate) async fn search_for_app(
        &self,
        url: Option<&str>,
        max_tries: u32,
        ignore_about_blank: bool,
    ) -> Result<PageMatch> {
        let bundle_ids = self.inner.options.candidate_bundle_ids();
        let interval = self.inner.options.select_app_retry_interval;

        for attempt in 1..=max_tries {
            if !self.is_connected() {
                return Err(Error::NotConnected);
            }

            let candidates = self.inner.directory.lock().possible_app_keys(&bundle_ids);
            debug!(
                attempt,
                max_tries,
                candidates = candidates.len(),
                "Searching for app"
            );

            for app_id_key in candidates {
                match self
                    .try_select_app(&app_id_key, url, ignore_about_blank)
                    .await
                {
                    Ok(Some(found)) => return Ok(found),
                    Ok(None) => {}
                    Err(e) if e.is_connection_error() => return Err(e),
                    Err(e) => {
                        debug!(%app_id_key, error = %e, "Error checking application");
                    }
                }
            }

            if attempt < max_tries {
                tokio::time::sleep(interval).await;
            }
        }

        Err(Error::app_not_found(max_tries))
    }

    /// Tries one candidate application.
    ///
    /// Returns `Ok(None)` when the candidate is unusable or has no
    /// matching page.
    async fn try_select_app(
        &self,
        app_id_key: &AppIdKey,
        url: Option<&str>,
        ignore_about_blank: bool,
    ) -> Result<Option<PageMatch>> {
        let record = self.inner.directory.lock().get(app_id_key).cloned();
        let Some(record) = record else {
            trace!(%app_id_key, "Skipping application that went away");
            return Ok(None);
        };
        if !record.is_active {
            trace!(%app_id_key, "Skipping inactive application");
            return Ok(None);
        }
        if record.bundle_id == SAFARI_BUNDLE_ID && record.automation == AutomationState::Disabled {
            debug!(%app_id_key, "Skipping Safari, remote automation is disabled");
            return Ok(None);
        }

        let selected = self.inner.transport.select_app(app_id_key).await?;
        if is_empty_listing(&selected.page_dict) {
            return Err(Error::protocol("Empty page dictionary received"));
        }

        let pages = page_array_from_dict(&selected.page_dict);
        let mut directory = self.inner.directory.lock();
        directory.set_pages(&selected.app_id_key, pages);

        let found =
            directory.search_for_page(Some(&selected.app_id_key), url, ignore_about_blank);
        if found.is_none() {
            debug!(%app_id_key, url = ?url, "No matching page");
        }
        Ok(found)
    }

    /// Logs every application and its pages.
    fn log_directory(&self) {
        let directory = self.inner.directory.lock();
        for record in directory.records() {
            debug!(
                app_id_key = %record.id,
                bundle_id = %record.bundle_id,
                is_active = record.is_active,
                is_proxy = record.is_proxy,
                "Application"
            );
            for page in record.pages.iter().flatten() {
                debug!(page_id_key = %page.id, url = %page.url, title = %page.title, "  Page");
            }
        }
    }
}

fn is_empty_listing(page_dict: &Value) -> bool {
    match page_dict {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
