//! Event dispatch: resolve, invoke, write back, notify
//!
//! A dispatch parses the payload once, then runs each descriptor to
//! completion before starting the next. Every descriptor resolves its
//! arguments against a fresh snapshot, so it sees the writes of the
//! descriptors before it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::action::{ActionDescriptor, EventPayload, FunctionArgument};
use super::error::{DescriptorError, PayloadResult, StoreError};
use super::handler::HandlerRegistry;
use super::notifier::ChangeNotifier;
use super::path::ReferencePath;
use super::resolver::Resolver;
use super::store::{InstanceId, Store, StoreRegistry};

/// What happens to the rest of a payload after a descriptor fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep running later descriptors
    #[default]
    Continue,
    /// Stop at the failing descriptor; earlier writes stay in place
    Abort,
}

/// Result of running one descriptor
#[derive(Debug)]
pub struct DescriptorOutcome {
    /// Position in the payload
    pub index: usize,
    /// Handler name
    pub name: String,
    /// References written back to the store
    pub written: Vec<String>,
    /// Whether the change sink was invoked
    pub notified: bool,
    /// Failure, if any
    pub error: Option<DescriptorError>,
}

impl DescriptorOutcome {
    fn new(index: usize, name: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            written: Vec::new(),
            notified: false,
            error: None,
        }
    }

    /// Whether the descriptor ran without error
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of a dispatch call
#[derive(Debug)]
pub struct DispatchReport {
    /// Unique id of this dispatch, also recorded on its tracing span
    pub id: Uuid,
    /// Target instance
    pub instance: InstanceId,
    /// When the dispatch started
    pub started_at: DateTime<Utc>,
    /// One entry per descriptor that ran, in order
    pub outcomes: Vec<DescriptorOutcome>,
    /// Index of the descriptor that stopped the payload under
    /// [`FailurePolicy::Abort`]
    pub aborted_at: Option<usize>,
}

impl DispatchReport {
    /// Whether every descriptor that ran succeeded
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(DescriptorOutcome::is_success)
    }

    /// Outcomes that carry an error
    pub fn failures(&self) -> impl Iterator<Item = &DescriptorOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }

    /// Number of change notifications delivered
    pub fn notifications(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.notified).count()
    }
}

/// Runs event payloads against the instance stores
pub struct Dispatcher {
    stores: Arc<StoreRegistry>,
    handlers: HandlerRegistry,
    notifier: Arc<ChangeNotifier>,
    resolver: Resolver,
    failure_policy: FailurePolicy,
    notify_on_failure: bool,
}

impl Dispatcher {
    /// Create a dispatcher over the given stores, handlers and sinks
    pub fn new(
        stores: Arc<StoreRegistry>,
        handlers: HandlerRegistry,
        notifier: Arc<ChangeNotifier>,
        resolver: Resolver,
    ) -> Self {
        Self {
            stores,
            handlers,
            notifier,
            resolver,
            failure_policy: FailurePolicy::default(),
            notify_on_failure: false,
        }
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Notify the sink even when a descriptor's handler fails
    pub fn with_notify_on_failure(mut self, notify: bool) -> Self {
        self.notify_on_failure = notify;
        self
    }

    /// Parse `payload` and run it against `instance`.
    ///
    /// A malformed payload is an error and nothing runs. Per-descriptor
    /// failures are recorded in the report.
    pub fn dispatch(&self, payload: &str, instance: &InstanceId) -> PayloadResult<DispatchReport> {
        let payload = EventPayload::parse(payload, &self.resolver).inspect_err(|err| {
            tracing::warn!(instance = %instance, error = %err, "Rejected event payload");
        })?;
        Ok(self.dispatch_payload(&payload, instance))
    }

    /// Run an already parsed payload against `instance`
    pub fn dispatch_payload(
        &self,
        payload: &EventPayload,
        instance: &InstanceId,
    ) -> DispatchReport {
        let mut report = DispatchReport {
            id: Uuid::new_v4(),
            instance: instance.clone(),
            started_at: Utc::now(),
            outcomes: Vec::with_capacity(payload.len()),
            aborted_at: None,
        };

        let span = tracing::info_span!("dispatch", id = %report.id, instance = %instance);
        let _enter = span.enter();

        if payload.is_empty() {
            tracing::debug!("Payload has no descriptors");
        }

        for (index, action) in payload.actions.iter().enumerate() {
            let outcome = self.run_descriptor(index, action, instance);
            let failed = !outcome.is_success();
            report.outcomes.push(outcome);

            if failed && self.failure_policy == FailurePolicy::Abort {
                tracing::warn!(index, "Aborting dispatch after failed descriptor");
                report.aborted_at = Some(index);
                break;
            }
        }

        tracing::info!(
            descriptors = report.outcomes.len(),
            failures = report.failures().count(),
            notifications = report.notifications(),
            "Dispatch complete"
        );
        report
    }

    fn run_descriptor(
        &self,
        index: usize,
        action: &ActionDescriptor,
        instance: &InstanceId,
    ) -> DescriptorOutcome {
        let mut outcome = DescriptorOutcome::new(index, &action.name);

        let snapshot = self.stores.get(instance);
        if snapshot.is_none() {
            tracing::warn!(
                action = %action.name,
                "Instance has no store; references resolve absent"
            );
        }
        let mut args = action.resolve_arguments(&snapshot.unwrap_or_default());

        if let Err(err) = self.handlers.call(&action.name, &mut args) {
            tracing::warn!(action = %action.name, error = %err, "Descriptor failed");
            if self.notify_on_failure && matches!(err, DescriptorError::Handler { .. }) {
                if let Some(current) = self.stores.get(instance) {
                    outcome.notified = self.notifier.notify(instance, &current.to_value());
                }
            }
            outcome.error = Some(err);
            return outcome;
        }

        let Some((written, error, updated)) = self
            .stores
            .update(instance, |store| write_back(store, &args))
        else {
            tracing::warn!(action = %action.name, "Instance has no store; skipping write-back");
            return outcome;
        };

        if let Some(err) = &error {
            tracing::warn!(action = %action.name, error = %err, "Write-back failed");
        }
        tracing::debug!(action = %action.name, written = ?written, "Descriptor applied");

        outcome.written = written;
        outcome.error = error;
        outcome.notified = self.notifier.notify(instance, &updated);
        outcome
    }
}

// Persist every referenced argument. All writes are attempted; the first
// failure is reported alongside the resulting store.
fn write_back(
    store: &mut Store,
    args: &[FunctionArgument],
) -> (Vec<String>, Option<DescriptorError>, Value) {
    let mut written = Vec::new();
    let mut first_error = None;

    for argument in args {
        let Some(reference) = &argument.reference else {
            continue;
        };
        let result = ReferencePath::parse(reference)
            .ok_or_else(|| StoreError::InvalidReference(reference.clone()))
            .and_then(|path| store.write(&path, argument.value.clone()));

        match result {
            Ok(()) => written.push(reference.clone()),
            Err(source) if first_error.is_none() => {
                first_error = Some(DescriptorError::WriteBack {
                    reference: reference.clone(),
                    source,
                });
            }
            Err(_) => {}
        }
    }

    (written, first_error, store.to_value())
}
