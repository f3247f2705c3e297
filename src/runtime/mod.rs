//! Runtime orchestrator and public API
//!
//! This module provides the main `Runtime` struct that owns the instance
//! stores, handler catalog and change sinks, and exposes the event entry
//! point used by the host page.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

// Submodules
pub mod action;
pub mod builtins;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod notifier;
pub mod path;
pub mod resolver;
pub mod storage;
pub mod store;

use action::FunctionArgument;
use dispatcher::{DispatchReport, Dispatcher, FailurePolicy};
use error::{HandlerResult, PayloadResult, RuntimeError, StoreResult};
use handler::HandlerCatalog;
use notifier::ChangeNotifier;
use resolver::Resolver;
use store::{DocumentSource, InstanceId, Store, StoreRegistry};

/// Configuration for the dispatch runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Character marking reference arguments. `None` treats every
    /// well-formed dotted path as a reference.
    pub reference_sigil: Option<char>,

    /// What to do with the rest of a payload after a descriptor fails
    pub failure_policy: FailurePolicy,

    /// Notify the change sink even when a handler fails
    pub notify_on_failure: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            reference_sigil: None,
            failure_policy: FailurePolicy::Continue,
            notify_on_failure: false,
        }
    }
}

impl RuntimeConfig {
    /// Check that the configuration is usable
    pub fn validate(&self) -> error::Result<()> {
        if let Some(sigil) = self.reference_sigil {
            if sigil.is_alphanumeric()
                || sigil.is_whitespace()
                || sigil == path::SEGMENT_SEPARATOR
            {
                return Err(RuntimeError::Config(format!(
                    "reference sigil {:?} would be ambiguous with path text",
                    sigil
                )));
            }
        }
        Ok(())
    }

    /// Resolver implementing the configured grammar
    pub fn resolver(&self) -> Resolver {
        match self.reference_sigil {
            Some(sigil) => Resolver::sigil(sigil),
            None => Resolver::path(),
        }
    }
}

/// A user-triggered UI event, as reported by the host page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiEvent {
    /// Event type, e.g. `click`
    pub kind: String,
}

impl UiEvent {
    /// Create an event of the given kind
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

/// The main runtime orchestrator
///
/// Coordinates the store registry, handler catalog and change notifier.
pub struct Runtime {
    config: RuntimeConfig,
    stores: Arc<StoreRegistry>,
    handlers: HandlerCatalog,
    notifier: Arc<ChangeNotifier>,
}

impl Runtime {
    /// Create a new runtime with the given configuration
    pub fn new(config: RuntimeConfig) -> error::Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stores: Arc::new(StoreRegistry::new()),
            handlers: HandlerCatalog::new(),
            notifier: Arc::new(ChangeNotifier::new()),
        })
    }

    /// Register the built-in handlers (`toggle`, `increment`, ...)
    pub fn register_builtins(&self) {
        builtins::register_all(&self.handlers);
    }

    /// Get the current configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get the store registry
    pub fn stores(&self) -> &Arc<StoreRegistry> {
        &self.stores
    }

    /// Get the handler catalog
    pub fn handlers(&self) -> &HandlerCatalog {
        &self.handlers
    }

    /// Get the change notifier
    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// Initialize an instance from the serialized store in `element_id`.
    ///
    /// A missing element is a silent no-op and returns `Ok(false)`.
    pub fn init_instance(
        &self,
        id: impl Into<InstanceId>,
        source: &dyn DocumentSource,
        element_id: &str,
    ) -> StoreResult<bool> {
        self.stores.init_from_source(id.into(), source, element_id)
    }

    /// Register a handler under `name`
    pub fn register_handler<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&mut [FunctionArgument]) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers.register(name, handler);
    }

    /// Subscribe the change sink for `instance`
    pub fn on_change<F>(&self, instance: impl Into<InstanceId>, sink: F)
    where
        F: Fn(&InstanceId, &serde_json::Value) + Send + Sync + 'static,
    {
        self.notifier.subscribe(instance.into(), sink);
    }

    /// Snapshot of an instance's store
    pub fn store(&self, instance: &InstanceId) -> Option<Store> {
        self.stores.get(instance)
    }

    /// Dispatcher over the current handler set
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.stores.clone(),
            self.handlers.snapshot(),
            self.notifier.clone(),
            self.config.resolver(),
        )
        .with_failure_policy(self.config.failure_policy)
        .with_notify_on_failure(self.config.notify_on_failure)
    }

    /// Run a serialized action list against `instance`
    pub fn dispatch(&self, payload: &str, instance: &InstanceId) -> PayloadResult<DispatchReport> {
        self.dispatcher().dispatch(payload, instance)
    }

    /// Event entry point: the host page calls this for every UI event
    /// bound to a list of actions.
    pub fn handle_event(
        &self,
        event: &UiEvent,
        instance: &InstanceId,
        payload: &str,
        origin: Option<&str>,
    ) -> PayloadResult<DispatchReport> {
        let span = tracing::info_span!(
            "event",
            kind = %event.kind,
            instance = %instance,
            origin = origin.unwrap_or("-")
        );
        let _enter = span.enter();
        tracing::debug!(payload, "Handling event");
        self.dispatch(payload, instance)
    }
}

// Re-export commonly used types
pub use action::{ActionDescriptor, ArgumentSpec, EventPayload};
pub use error::{DescriptorError, HandlerError, PayloadError, StoreError};
