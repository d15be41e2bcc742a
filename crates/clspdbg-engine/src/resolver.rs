//! File resolution for the engine's include lookups.
//!
//! The engine discovers include files as a side effect of compiling: every
//! time it needs a file it calls back into the resolver supplied at session
//! creation. [`IncludeTracker`] wraps any resolver and records which source
//! files were pulled in, which is the only way the client ever learns the
//! include set of an entry file.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Extensions the debugger treats as debuggable source files.
pub const SOURCE_EXTENSIONS: [&str; 3] = [".clsp", ".clib", ".cl"];

/// Whether a path names a source-language file.
pub fn is_source_path(path: &str) -> bool {
    SOURCE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Resolves a path to source text, or `None` when the file is unknown.
pub trait FileResolver: Send + Sync {
    /// Look up the contents of `path`.
    fn resolve(&self, path: &str) -> Option<String>;
}

/// A resolver over a fixed in-memory file set.
#[derive(Debug, Default)]
pub struct StaticResolver {
    files: HashMap<String, String>,
}

impl StaticResolver {
    /// Build a resolver from `(path, contents)` pairs.
    pub fn new<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        Self {
            files: files
                .into_iter()
                .map(|(p, c)| (p.into(), c.into()))
                .collect(),
        }
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into());
    }
}

impl FileResolver for StaticResolver {
    fn resolve(&self, path: &str) -> Option<String> {
        self.files.get(path).cloned()
    }
}

/// Wraps a resolver and records every resolved include file.
///
/// A path is recorded when it resolves successfully, differs from the entry
/// file, and carries a source-language extension. Recorded paths keep their
/// first-seen order and are deduplicated.
pub struct IncludeTracker {
    entry: String,
    inner: Arc<dyn FileResolver>,
    seen: Mutex<Vec<String>>,
}

impl IncludeTracker {
    /// Wrap `inner`, excluding `entry` from tracking.
    pub fn new(entry: impl Into<String>, inner: Arc<dyn FileResolver>) -> Self {
        Self {
            entry: entry.into(),
            inner,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// The include files resolved so far, in first-seen order.
    pub fn includes(&self) -> Vec<String> {
        self.seen.lock().expect("include tracker poisoned").clone()
    }

    fn should_track(&self, path: &str) -> bool {
        path != self.entry && is_source_path(path)
    }
}

impl FileResolver for IncludeTracker {
    fn resolve(&self, path: &str) -> Option<String> {
        let contents = self.inner.resolve(path)?;
        if self.should_track(path) {
            let mut seen = self.seen.lock().expect("include tracker poisoned");
            if !seen.iter().any(|p| p == path) {
                tracing::debug!("include discovered: {}", path);
                seen.push(path.to_string());
            }
        }
        Some(contents)
    }
}

impl std::fmt::Debug for IncludeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncludeTracker")
            .field("entry", &self.entry)
            .field("seen", &self.includes())
            .finish()
    }
}
