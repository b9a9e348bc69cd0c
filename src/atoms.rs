//! Atom catalog.
//!
//! Atoms are self-contained JavaScript functions that implement automation
//! primitives inside the page. The session asks an [`AtomCatalog`] for the
//! final, invocable script and evaluates it.
//!
//! # Script Shape
//!
//! ```text
//! (<atom source>)(<arg 1>,<arg 2>,...)
//! (<atom source>)(<arg 1>,..., <async callback>, true)
//! ```
//!
//! With frames, the atom source is first resolved inside the frame's
//! window, outermost frame first.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// AtomCatalog
// ============================================================================

/// Source of invocable atom scripts.
pub trait AtomCatalog: Send + Sync {
    /// Builds the script invoking atom `name`.
    ///
    /// # Arguments
    ///
    /// * `name` - Atom name
    /// * `args` - Atom arguments, serialized as JSON
    /// * `frames` - Frame path, outermost first
    /// * `async_callback` - Callback source for asynchronous atoms
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the atom is unknown.
    fn get_script(
        &self,
        name: &str,
        args: &[Value],
        frames: &[String],
        async_callback: Option<&str>,
    ) -> Result<String>;
}

// ============================================================================
// AtomRegistry
// ============================================================================

/// In-memory atom catalog.
///
/// # Example
///
/// ```ignore
/// let mut atoms = AtomRegistry::new();
/// atoms.register("get_title", "function () { return document.title; }");
/// ```
#[derive(Debug, Clone, Default)]
pub struct AtomRegistry {
    atoms: FxHashMap<String, String>,
}

impl AtomRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces an atom's source.
    pub fn register(&mut self, name: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.atoms.insert(name.into(), source.into());
        self
    }

    /// Returns `true` if `name` is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.atoms.contains_key(name)
    }

    /// Returns the number of atoms.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Returns `true` if no atom is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

impl AtomCatalog for AtomRegistry {
    fn get_script(
        &self,
        name: &str,
        args: &[Value],
        frames: &[String],
        async_callback: Option<&str>,
    ) -> Result<String> {
        let source = self
            .atoms
            .get(name)
            .ok_or_else(|| Error::invalid_argument(format!("Unknown atom: {name}")))?;

        let mut script = format!("({source})");
        for frame in frames.iter().rev() {
            script = wrap_for_frame(&script, frame)?;
        }

        let mut rendered = Vec::with_capacity(args.len());
        for arg in args {
            rendered.push(serde_json::to_string(arg)?);
        }
        let args = rendered.join(",");

        match async_callback {
            Some(callback) if args.is_empty() => Ok(format!("{script}({callback}, true)")),
            Some(callback) => Ok(format!("{script}({args}, {callback}, true)")),
            None => Ok(format!("{script}({args})")),
        }
    }
}

/// Resolves `script` inside the window of `frame`.
fn wrap_for_frame(script: &str, frame: &str) -> Result<String> {
    let frame = serde_json::to_string(frame)?;
    Ok(format!(
        "(function (window) {{ var document = window.document; return {script}; }})(window.frames[{frame}])"
    ))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn registry() -> AtomRegistry {
        let mut atoms = AtomRegistry::new();
        atoms.register("title", "function () { return document.title; }");
        atoms
    }

    #[test]
    fn test_plain_invocation() {
        let script = registry()
            .get_script("title", &[json!("a"), json!(1)], &[], None)
            .unwrap();
        assert_eq!(script, r#"(function () { return document.title; })("a",1)"#);
    }

    #[test]
    fn test_async_invocation_appends_callback() {
        let script = registry()
            .get_script("title", &[json!(5)], &[], Some("function (r) {}"))
            .unwrap();
        assert!(script.ends_with("(5, function (r) {}, true)"));
    }

    #[test]
    fn test_frames_resolve_outermost_first() {
        let frames = vec!["outer".to_string(), "inner".to_string()];
        let script = registry().get_script("title", &[], &frames, None).unwrap();

        let outer = script.find(r#"window.frames["outer"]"#).unwrap();
        let inner = script.find(r#"window.frames["inner"]"#).unwrap();
        // The outer frame is resolved by the outermost wrapper, which closes last.
        assert!(inner < outer);
        assert!(script.ends_with("()"));
    }

    #[test]
    fn test_unknown_atom() {
        let err = registry().get_script("missing", &[], &[], None).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }
}
