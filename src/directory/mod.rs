//! In-memory directory of applications and their pages.
//!
//! The [`Directory`] is the single source of truth for which applications
//! and pages exist on the device. Only the session's notification handlers
//! mutate it; everyone else works on cloned snapshots.
//!
//! # Bundle Matching
//!
//! The debuggable process is frequently not the one the caller names (an
//! embedded web view renders in a separate content process), so matching
//! widens the candidate list:
//!
//! 1. A wildcard candidate matches every application
//! 2. Well-known web content and view-service bundles are always added
//! 3. Proxies hosted by a matching application match as well
//! 4. A bundle without matches falls back to the web content bundle

// ============================================================================
// Submodules
// ============================================================================

/// Application and page records.
pub mod records;

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::identifiers::AppIdKey;

pub use records::{ApplicationRecord, AutomationState, PageRecord, page_array_from_dict};

// ============================================================================
// Constants
// ============================================================================

/// Candidate token matching every application.
pub const WILDCARD: &str = "*";

/// Bundle id of the process hosting web content.
pub const WEB_CONTENT_BUNDLE_ID: &str = "com.apple.WebKit.WebContent";

/// Bundle id of the Safari view service process.
pub const SAFARI_VIEW_PROCESS_BUNDLE_ID: &str = "com.apple.SafariViewService";

/// Bundle id of the Safari view service extension.
pub const SAFARI_VIEW_BUNDLE_ID: &str = "com.apple.mobilesafari.SafariViewService";

/// URL of the blank placeholder page.
pub const BLANK_PAGE_URL: &str = "about:blank";

// ============================================================================
// Types
// ============================================================================

/// A page found by [`Directory::search_for_page`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMatch {
    /// Owning application.
    pub app_id_key: AppIdKey,
    /// The matching page.
    pub page: PageRecord,
}

/// A page as presented to the caller after application selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedPage {
    /// `<numeric app id>.<page id>`.
    pub id: String,
    /// Page title.
    pub title: String,
    /// Page URL.
    pub url: String,
    /// Page carries the active debugging connection.
    pub is_key: bool,
    /// Bundle id of the owning application.
    pub bundle_id: String,
}

// ============================================================================
// Directory
// ============================================================================

/// Map from application key to application record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    apps: FxHashMap<AppIdKey, ApplicationRecord>,
}

impl Directory {
    /// Creates an empty directory.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of applications.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    /// Returns `true` if no application is known.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Returns the record for `key`.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &AppIdKey) -> Option<&ApplicationRecord> {
        self.apps.get(key)
    }

    /// Returns `true` if `key` is known.
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &AppIdKey) -> bool {
        self.apps.contains_key(key)
    }

    /// Returns all keys in a stable order.
    #[must_use]
    pub fn keys(&self) -> Vec<AppIdKey> {
        let mut keys: Vec<AppIdKey> = self.apps.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Iterates over records in a stable order.
    pub fn records(&self) -> impl Iterator<Item = &ApplicationRecord> {
        let mut records: Vec<&ApplicationRecord> = self.apps.values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records.into_iter()
    }
}

// ============================================================================
// Directory - Mutation
// ============================================================================

impl Directory {
    /// Inserts or replaces a record, keeping previously learned pages.
    ///
    /// A metadata-only update must not discard the page listing, so the
    /// incoming record's pages are only used when it actually carries some
    /// and the stored record has none.
    pub fn upsert(&mut self, mut record: ApplicationRecord) {
        if let Some(existing) = self.apps.get_mut(&record.id) {
            if existing.pages.is_some() {
                record.pages = existing.pages.take();
            }
            *existing = record;
        } else {
            self.apps.insert(record.id.clone(), record);
        }
    }

    /// Merges records without overwriting known entries.
    ///
    /// Returns the number of newly added records.
    pub fn merge_defaults(&mut self, records: impl IntoIterator<Item = ApplicationRecord>) -> usize {
        let mut added = 0;
        for record in records {
            if !self.apps.contains_key(&record.id) {
                self.apps.insert(record.id.clone(), record);
                added += 1;
            }
        }
        added
    }

    /// Removes a record.
    pub fn remove(&mut self, key: &AppIdKey) -> Option<ApplicationRecord> {
        self.apps.remove(key)
    }

    /// Replaces the page array of an application.
    ///
    /// Creates a placeholder record when the application is not known yet.
    /// Returns `false` if the stored array is already equal.
    pub fn set_pages(&mut self, key: &AppIdKey, pages: Vec<PageRecord>) -> bool {
        let record = self
            .apps
            .entry(key.clone())
            .or_insert_with(|| ApplicationRecord {
                id: key.clone(),
                bundle_id: String::new(),
                name: String::new(),
                is_proxy: false,
                host_id: None,
                is_active: false,
                automation: AutomationState::Unknown,
                pages: None,
            });

        if record.pages.as_ref() == Some(&pages) {
            return false;
        }
        record.pages = Some(pages);
        true
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.apps.clear();
    }
}

// ============================================================================
// Directory - Matching
// ============================================================================

impl Directory {
    /// Returns applications with `bundle_id`, each followed by the proxies
    /// it hosts.
    #[must_use]
    pub fn apps_for_bundle(&self, bundle_id: &str) -> Vec<AppIdKey> {
        let mut matches = Vec::new();
        for record in self.records().filter(|r| r.bundle_id == bundle_id) {
            push_unique(&mut matches, record.id.clone());
            for proxy in self
                .records()
                .filter(|r| r.is_proxy && r.host_id.as_ref() == Some(&record.id))
            {
                push_unique(&mut matches, proxy.id.clone());
            }
        }
        matches
    }

    /// Returns every application key that may host content for
    /// `bundle_ids`, in first-seen order.
    #[must_use]
    pub fn possible_app_keys(&self, bundle_ids: &[String]) -> Vec<AppIdKey> {
        if bundle_ids.iter().any(|id| id == WILDCARD) {
            return self.keys();
        }

        let mut candidates: Vec<&str> = Vec::with_capacity(bundle_ids.len() + 3);
        for id in bundle_ids
            .iter()
            .map(String::as_str)
            .chain([WEB_CONTENT_BUNDLE_ID, SAFARI_VIEW_PROCESS_BUNDLE_ID, SAFARI_VIEW_BUNDLE_ID])
        {
            if !candidates.contains(&id) {
                candidates.push(id);
            }
        }

        let mut keys = Vec::new();
        let mut seen = FxHashSet::default();
        for bundle_id in candidates {
            let mut matches = self.apps_for_bundle(bundle_id);
            if matches.is_empty() && bundle_id != WEB_CONTENT_BUNDLE_ID {
                matches = self.apps_for_bundle(WEB_CONTENT_BUNDLE_ID);
            }
            for key in matches {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Returns the key that should be debugged for `bundle_id`.
    ///
    /// The first matching application, replaced by a proxy it hosts when
    /// there is one.
    #[must_use]
    pub fn debugger_app_key(&self, bundle_id: &str) -> Option<AppIdKey> {
        let app = self.records().find(|r| r.bundle_id == bundle_id)?;
        let proxy = self
            .records()
            .find(|r| r.is_proxy && r.host_id.as_ref() == Some(&app.id));
        Some(proxy.map_or_else(|| app.id.clone(), |proxy| proxy.id.clone()))
    }

    /// Finds a page matching `url` among active applications with pages.
    ///
    /// `preferred` is searched first. A URL matches exactly or with one
    /// trailing slash appended; `None` accepts any page.
    #[must_use]
    pub fn search_for_page(
        &self,
        preferred: Option<&AppIdKey>,
        url: Option<&str>,
        ignore_blank: bool,
    ) -> Option<PageMatch> {
        let preferred_record = preferred.and_then(|key| self.apps.get(key));
        let others = self
            .records()
            .filter(|r| preferred.is_none_or(|key| &r.id != key));

        for record in preferred_record.into_iter().chain(others) {
            if !record.is_active {
                continue;
            }
            let Some(pages) = record.pages.as_ref() else {
                continue;
            };
            for page in pages {
                if ignore_blank && page.url == BLANK_PAGE_URL {
                    continue;
                }
                if url.is_none_or(|url| url_matches(&page.url, url)) {
                    return Some(PageMatch {
                        app_id_key: record.id.clone(),
                        page: page.clone(),
                    });
                }
            }
        }
        None
    }

    /// Lists every page of every active application, with page ids
    /// prefixed by the owning application's numeric id.
    #[must_use]
    pub fn full_page_listing(&self, ignore_blank: bool) -> Vec<ListedPage> {
        let mut listing = Vec::new();
        for record in self.records().filter(|r| r.is_active) {
            let Some(pages) = record.pages.as_ref() else {
                continue;
            };
            for page in pages {
                if ignore_blank && page.url == BLANK_PAGE_URL {
                    continue;
                }
                listing.push(ListedPage {
                    id: format!("{}.{}", record.id.numeric_id(), page.id),
                    title: page.title.clone(),
                    url: page.url.clone(),
                    is_key: page.is_key,
                    bundle_id: record.bundle_id.clone(),
                });
            }
        }
        listing
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn push_unique(keys: &mut Vec<AppIdKey>, key: AppIdKey) {
    if !keys.contains(&key) {
        keys.push(key);
    }
}

fn url_matches(page_url: &str, wanted: &str) -> bool {
    page_url == wanted || page_url.strip_suffix('/') == Some(wanted)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::identifiers::PageIdKey;

    fn app(id: &str, bundle: &str) -> ApplicationRecord {
        ApplicationRecord {
            id: AppIdKey::new(id),
            bundle_id: bundle.to_string(),
            name: String::new(),
            is_proxy: false,
            host_id: None,
            is_active: true,
            automation: AutomationState::Unknown,
            pages: None,
        }
    }

    fn proxy(id: &str, bundle: &str, host: &str) -> ApplicationRecord {
        ApplicationRecord {
            is_proxy: true,
            host_id: Some(AppIdKey::new(host)),
            ..app(id, bundle)
        }
    }

    fn page(id: u64, url: &str) -> PageRecord {
        PageRecord {
            id: PageIdKey::from(id),
            url: url.to_string(),
            title: String::new(),
            is_key: false,
        }
    }

    fn bundles(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| (*id).to_string()).collect()
    }

    #[test]
    fn test_upsert_preserves_pages() {
        let mut directory = Directory::new();
        let mut first = app("PID:1", "com.app");
        first.pages = Some(vec![page(1, "http://x")]);
        directory.upsert(first);

        let mut update = app("PID:1", "com.app");
        update.name = "Renamed".into();
        directory.upsert(update);

        let record = directory.get(&AppIdKey::new("PID:1")).unwrap();
        assert_eq!(directory.len(), 1);
        assert_eq!(record.name, "Renamed");
        assert_eq!(record.pages, Some(vec![page(1, "http://x")]));
    }

    #[test]
    fn test_merge_defaults_does_not_overwrite() {
        let mut directory = Directory::new();
        let mut known = app("PID:1", "com.app");
        known.name = "Known".into();
        directory.upsert(known);

        let added = directory.merge_defaults([app("PID:1", "other"), app("PID:2", "com.two")]);

        assert_eq!(added, 1);
        assert_eq!(directory.get(&AppIdKey::new("PID:1")).unwrap().name, "Known");
        assert!(directory.contains(&AppIdKey::new("PID:2")));
    }

    #[test]
    fn test_set_pages_detects_equal_arrays() {
        let mut directory = Directory::new();
        let key = AppIdKey::new("PID:1");
        assert!(directory.set_pages(&key, vec![page(1, "http://x")]));
        assert!(!directory.set_pages(&key, vec![page(1, "http://x")]));
        assert!(directory.set_pages(&key, vec![page(1, "http://y")]));
    }

    #[test]
    fn test_proxy_resolution_order() {
        let mut directory = Directory::new();
        directory.upsert(app("A", "X"));
        directory.upsert(proxy("B", "Y", "A"));

        assert_eq!(
            directory.possible_app_keys(&bundles(&["X"])),
            vec![AppIdKey::new("A"), AppIdKey::new("B")]
        );
    }

    #[test]
    fn test_wildcard_returns_every_key() {
        let mut directory = Directory::new();
        directory.upsert(app("PID:1", "com.one"));
        directory.upsert(app("PID:2", "com.two"));
        directory.upsert(app("PID:3", "com.three"));

        let keys = directory.possible_app_keys(&bundles(&["com.nothing", WILDCARD]));
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_web_content_fallback() {
        let mut directory = Directory::new();
        directory.upsert(app("PID:9", WEB_CONTENT_BUNDLE_ID));
        directory.upsert(app("PID:5", "com.unrelated"));

        assert_eq!(
            directory.possible_app_keys(&bundles(&["com.missing"])),
            vec![AppIdKey::new("PID:9")]
        );
    }

    #[test]
    fn test_direct_match_comes_before_well_known_bundles() {
        let mut directory = Directory::new();
        directory.upsert(app("PID:9", WEB_CONTENT_BUNDLE_ID));
        directory.upsert(app("PID:1", "com.app"));

        assert_eq!(
            directory.possible_app_keys(&bundles(&["com.app"])),
            vec![AppIdKey::new("PID:1"), AppIdKey::new("PID:9")]
        );
    }

    #[test]
    fn test_debugger_app_key_prefers_proxy() {
        let mut directory = Directory::new();
        directory.upsert(app("PID:1", "com.app"));
        assert_eq!(directory.debugger_app_key("com.app"), Some(AppIdKey::new("PID:1")));

        directory.upsert(proxy("PID:2", "com.proxy", "PID:1"));
        assert_eq!(directory.debugger_app_key("com.app"), Some(AppIdKey::new("PID:2")));
        assert_eq!(directory.debugger_app_key("com.none"), None);
    }

    #[test]
    fn test_search_for_page_tolerates_trailing_slash() {
        let mut directory = Directory::new();
        let mut record = app("PID:1", "com.app");
        record.pages = Some(vec![page(1, "about:blank"), page(2, "http://x/")]);
        directory.upsert(record);

        let found = directory.search_for_page(None, Some("http://x"), true).unwrap();
        assert_eq!(found.page.id, PageIdKey::from(2));

        assert!(directory.search_for_page(None, Some("http://x//"), true).is_none());
    }

    #[test]
    fn test_search_for_page_skips_blank_when_asked() {
        let mut directory = Directory::new();
        let mut record = app("PID:1", "com.app");
        record.pages = Some(vec![page(1, "about:blank")]);
        directory.upsert(record);

        assert!(directory.search_for_page(None, None, true).is_none());
        assert!(directory.search_for_page(None, None, false).is_some());
    }

    #[test]
    fn test_search_for_page_skips_inactive_apps() {
        let mut directory = Directory::new();
        let mut record = app("PID:1", "com.app");
        record.is_active = false;
        record.pages = Some(vec![page(1, "http://x")]);
        directory.upsert(record);

        assert!(directory.search_for_page(None, None, false).is_none());
    }

    #[test]
    fn test_search_for_page_prefers_selected_app() {
        let mut directory = Directory::new();
        let mut first = app("PID:1", "com.one");
        first.pages = Some(vec![page(1, "http://one")]);
        let mut second = app("PID:2", "com.two");
        second.pages = Some(vec![page(1, "http://two")]);
        directory.upsert(first);
        directory.upsert(second);

        let found = directory
            .search_for_page(Some(&AppIdKey::new("PID:2")), None, false)
            .unwrap();
        assert_eq!(found.app_id_key, AppIdKey::new("PID:2"));
    }

    #[test]
    fn test_full_page_listing_prefixes_ids() {
        let mut directory = Directory::new();
        let mut record = app("PID:42", "com.app");
        record.pages = Some(vec![page(1, "http://x"), page(2, "about:blank")]);
        directory.upsert(record);

        let listing = directory.full_page_listing(true);
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].id, "42.1");
        assert_eq!(listing[0].bundle_id, "com.app");
    }

    proptest! {
        #[test]
        fn prop_upsert_is_idempotent(
            name in "[a-z]{0,8}",
            active in any::<bool>(),
            urls in proptest::collection::vec("http://[a-z]{1,6}", 0..4),
        ) {
            let mut once = Directory::new();
            let mut twice = Directory::new();
            let pages: Vec<PageRecord> = urls
                .iter()
                .enumerate()
                .map(|(i, url)| page(i as u64, url))
                .collect();

            let mut record = app("PID:7", "com.app");
            record.name = name;
            record.is_active = active;

            for directory in [&mut once, &mut twice] {
                directory.upsert(record.clone());
                directory.set_pages(&record.id, pages.clone());
            }
            twice.upsert(record.clone());

            prop_assert_eq!(twice.len(), 1);
            prop_assert_eq!(&once, &twice);
        }
    }
}
