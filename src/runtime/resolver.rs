//! Reference grammar and resolution against instance stores
//!
//! Whether an argument string names a store location or is a literal is a
//! syntactic decision made by a [`ReferenceGrammar`]. Resolution never
//! mutates the store: every handler in a dispatch sees the snapshot taken
//! before it ran.

use serde_json::Value;
use std::sync::Arc;

use super::path::ReferencePath;
use super::store::Store;

/// Decides which argument strings are store references
pub trait ReferenceGrammar: Send + Sync {
    /// Parse `token` as a reference, or `None` if it is a literal
    fn parse(&self, token: &str) -> Option<ReferencePath>;

    /// Whether `token` is a reference
    fn is_reference(&self, token: &str) -> bool {
        self.parse(token).is_some()
    }
}

fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '#' | '/' | '.')
}

/// Every well-formed dotted path is a reference.
///
/// Segments may contain alphanumerics, `_`, `-`, `#` and `/`. Anything with
/// whitespace or other punctuation is a literal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathGrammar;

impl ReferenceGrammar for PathGrammar {
    fn parse(&self, token: &str) -> Option<ReferencePath> {
        if !token.chars().all(is_path_char) {
            return None;
        }
        ReferencePath::parse(token)
    }
}

/// Only tokens starting with `sigil` are references; the remainder must
/// be a well-formed path.
#[derive(Debug, Clone, Copy)]
pub struct SigilGrammar {
    sigil: char,
}

impl SigilGrammar {
    /// Create a grammar keyed on `sigil`
    pub fn new(sigil: char) -> Self {
        Self { sigil }
    }
}

impl ReferenceGrammar for SigilGrammar {
    fn parse(&self, token: &str) -> Option<ReferencePath> {
        PathGrammar.parse(token.strip_prefix(self.sigil)?)
    }
}

/// Resolves argument tokens against a store using a grammar
#[derive(Clone)]
pub struct Resolver {
    grammar: Arc<dyn ReferenceGrammar>,
}

impl Resolver {
    /// Create a resolver with the given grammar
    pub fn new(grammar: Arc<dyn ReferenceGrammar>) -> Self {
        Self { grammar }
    }

    /// Resolver using [`PathGrammar`]
    pub fn path() -> Self {
        Self::new(Arc::new(PathGrammar))
    }

    /// Resolver using [`SigilGrammar`]
    pub fn sigil(sigil: char) -> Self {
        Self::new(Arc::new(SigilGrammar::new(sigil)))
    }

    /// The grammar in use
    pub fn grammar(&self) -> &dyn ReferenceGrammar {
        self.grammar.as_ref()
    }

    /// Resolve `token` to its current value.
    ///
    /// Literals come back as themselves without touching the store. A
    /// reference to a missing path resolves to `None`.
    pub fn resolve(&self, token: &str, store: &Store) -> Option<Value> {
        match self.grammar.parse(token) {
            Some(path) => lookup(&path, store),
            None => Some(Value::String(token.to_string())),
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::path()
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

/// Deep copy of the value at `path`
pub fn lookup(path: &ReferencePath, store: &Store) -> Option<Value> {
    store.lookup(path).cloned()
}
