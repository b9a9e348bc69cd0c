//! Builder for configured sessions.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use webkit_remote_session::{Session, SessionOptions, WebSocketTransport};
//!
//! # fn example() -> webkit_remote_session::Result<()> {
//! let transport = Arc::new(WebSocketTransport::new("ws://127.0.0.1:27753")?);
//! let session = Session::builder()
//!     .options(SessionOptions::new().with_bundle_id("com.example.app"))
//!     .build(transport)?;
//! # let _ = session;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::atoms::{AtomCatalog, AtomRegistry};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::Transport;

use super::options::SessionOptions;

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for configuring a [`Session`].
///
/// Use [`Session::builder()`] to create a new builder.
#[derive(Clone, Default)]
pub struct SessionBuilder {
    /// Session options.
    options: SessionOptions,
    /// Atom catalog; an empty registry when unset.
    atoms: Option<Arc<dyn AtomCatalog>>,
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("options", &self.options)
            .field("atoms", &self.atoms.is_some())
            .finish()
    }
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the atom catalog used by the script bridge.
    #[inline]
    #[must_use]
    pub fn atoms(mut self, atoms: Arc<dyn AtomCatalog>) -> Self {
        self.atoms = Some(atoms);
        self
    }

    /// Builds the session over `transport`.
    ///
    /// The transport is not connected yet; call [`Session::connect`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the options are invalid.
    pub fn build(self, transport: Arc<dyn Transport>) -> Result<Session> {
        self.options.validate().map_err(Error::config)?;

        let atoms = self
            .atoms
            .unwrap_or_else(|| Arc::new(AtomRegistry::new()));
        Ok(Session::new(transport, atoms, self.options))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::config::PageLoadStrategy;
    use crate::identifiers::{AppIdKey, PageIdKey};
    use crate::transport::mock::MockTransport;

    #[test]
    fn test_build_with_defaults() {
        let session = SessionBuilder::new()
            .build(Arc::new(MockTransport::new()))
            .unwrap();

        assert_eq!(session.options(), &SessionOptions::new());
        assert!(!session.is_connected());
    }

    #[test]
    fn test_build_keeps_options() {
        let options = SessionOptions::new()
            .with_page_load_timeout(Duration::from_secs(3))
            .with_page_load_strategy(PageLoadStrategy::Eager);
        let session = Session::builder()
            .options(options)
            .build(Arc::new(MockTransport::new()))
            .unwrap();

        assert_eq!(session.page_load_timeout(), Duration::from_secs(3));
        assert_eq!(session.page_load_strategy(), PageLoadStrategy::Eager);
    }

    #[test]
    fn test_build_rejects_invalid_options() {
        let options = SessionOptions::new().with_page_load_timeout(Duration::ZERO);
        let err = Session::builder()
            .options(options)
            .build(Arc::new(MockTransport::new()))
            .unwrap_err();

        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_build_uses_custom_atoms() {
        let mut atoms = AtomRegistry::new();
        atoms.register("answer", "function () { return 42; }");
        let mock = Arc::new(MockTransport::new());
        mock.respond("Runtime.evaluate", |_| {
            Ok(json!({"result": {"type": "number", "value": 42}}))
        });

        let session = Session::builder()
            .atoms(Arc::new(atoms))
            .build(mock.clone())
            .unwrap();
        mock.connect().await.unwrap();
        session.set_selection(AppIdKey::new("PID:1"), PageIdKey::from(1));

        assert_eq!(session.execute_atom("answer", &[], &[]).await.unwrap(), json!(42));
    }
}
