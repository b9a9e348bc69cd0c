//! Shared notification builders for session tests.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

use crate::config::SessionOptions;
use crate::protocol::Notification;
use crate::protocol::event::{APPLICATION_CONNECTED, APPLICATION_SENT_LISTING};
use crate::transport::mock::MockTransport;

use super::Session;

/// Raw application dictionary.
pub(crate) fn app_dict(id: &str, bundle: &str, active: bool) -> Value {
    json!({
        "WIRApplicationIdentifierKey": id,
        "WIRApplicationBundleIdentifierKey": bundle,
        "WIRApplicationNameKey": bundle,
        "WIRIsApplicationActiveKey": active,
        "WIRIsApplicationProxyKey": false
    })
}

/// Raw proxy application dictionary.
pub(crate) fn proxy_dict(id: &str, bundle: &str, host: &str) -> Value {
    json!({
        "WIRApplicationIdentifierKey": id,
        "WIRApplicationBundleIdentifierKey": bundle,
        "WIRIsApplicationActiveKey": true,
        "WIRIsApplicationProxyKey": true,
        "WIRHostApplicationIdentifierKey": host
    })
}

/// Raw page dictionary keyed by page id.
pub(crate) fn page_dict(pages: &[(u64, &str)]) -> Value {
    let mut dict = Map::new();
    for (id, url) in pages {
        dict.insert(
            id.to_string(),
            json!({
                "WIRPageIdentifierKey": id,
                "WIRURLKey": url,
                "WIRTitleKey": format!("Page {id}"),
                "WIRTypeKey": "WIRTypeWebPage"
            }),
        );
    }
    Value::Object(dict)
}

pub(crate) fn app_connected(id: &str, bundle: &str, active: bool) -> Notification {
    Notification::new(APPLICATION_CONNECTED, app_dict(id, bundle, active))
}

pub(crate) fn listing(app: &str, pages: &[(u64, &str)]) -> Notification {
    Notification::new(
        APPLICATION_SENT_LISTING,
        json!({
            "WIRApplicationIdentifierKey": app,
            "WIRListingKey": page_dict(pages)
        }),
    )
}

/// Routes session logs to the test output, filtered by `RUST_LOG`.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Connected session with no applications yet.
pub(crate) async fn connected(options: SessionOptions) -> (Session, Arc<MockTransport>) {
    init_tracing();
    let (session, mock) = Session::with_mock(options);
    if let Err(e) = session.connect(None).await {
        panic!("mock connect failed: {e}");
    }
    (session, mock)
}
