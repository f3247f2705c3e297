//! Handler catalog and registry
//!
//! Handlers are registered by name in a mutable [`HandlerCatalog`]. Each
//! dispatcher works from an immutable [`HandlerRegistry`] snapshot, so a
//! handler set can be assembled and tested in isolation.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::action::FunctionArgument;
use super::error::{DescriptorError, HandlerResult};

/// A registered handler.
///
/// Handlers receive the resolved arguments positionally and signal state
/// changes by mutating them; the dispatcher persists every referenced
/// argument after the call.
pub type Handler = Arc<dyn Fn(&mut [FunctionArgument]) -> HandlerResult + Send + Sync>;

/// Mutable catalog of named handlers
#[derive(Default)]
pub struct HandlerCatalog {
    handlers: RwLock<HashMap<String, Handler>>,
}

impl HandlerCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one with the same name
    pub fn register<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&mut [FunctionArgument]) -> HandlerResult + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(handler = %name, "Registered handler");
        self.handlers.write().insert(name, Arc::new(handler));
    }

    /// Remove a handler
    pub fn unregister(&self, name: &str) -> bool {
        self.handlers.write().remove(name).is_some()
    }

    /// Whether a handler with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    /// Produce an immutable snapshot for a dispatcher
    pub fn snapshot(&self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: Arc::new(self.handlers.read().clone()),
        }
    }
}

/// Immutable view of the handler catalog
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<HashMap<String, Handler>>,
}

impl HandlerRegistry {
    /// Look up a handler by name
    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    /// Invoke `name` with `args`.
    pub fn call(&self, name: &str, args: &mut [FunctionArgument]) -> Result<(), DescriptorError> {
        let handler = self
            .get(name)
            .ok_or_else(|| DescriptorError::UnknownHandler(name.to_string()))?;
        handler(args).map_err(|source| DescriptorError::Handler {
            name: name.to_string(),
            source,
        })
    }

    /// All handler names in this snapshot, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}
