//! Per-instance change sinks
//!
//! After each descriptor's write-back the dispatcher hands the instance's
//! full store to the sink subscribed for that instance.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::store::InstanceId;

/// Callback receiving the updated store of an instance
pub type ChangeSink = Arc<dyn Fn(&InstanceId, &Value) + Send + Sync>;

/// Instance id to change sink mapping
#[derive(Default)]
pub struct ChangeNotifier {
    sinks: RwLock<HashMap<InstanceId, ChangeSink>>,
}

impl ChangeNotifier {
    /// Create a notifier with no sinks
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `sink` to changes of `instance`, replacing any previous sink
    pub fn subscribe<F>(&self, instance: InstanceId, sink: F)
    where
        F: Fn(&InstanceId, &Value) + Send + Sync + 'static,
    {
        self.sinks.write().insert(instance, Arc::new(sink));
    }

    /// Remove the sink for `instance`
    pub fn unsubscribe(&self, instance: &InstanceId) -> bool {
        self.sinks.write().remove(instance).is_some()
    }

    /// Whether `instance` has a sink
    pub fn has_sink(&self, instance: &InstanceId) -> bool {
        self.sinks.read().contains_key(instance)
    }

    /// Deliver `snapshot` to the sink of `instance`. Returns `false` when no
    /// sink is subscribed.
    pub fn notify(&self, instance: &InstanceId, snapshot: &Value) -> bool {
        // Clone out of the lock so a sink may subscribe or unsubscribe.
        let sink = self.sinks.read().get(instance).cloned();
        match sink {
            Some(sink) => {
                sink(instance, snapshot);
                true
            }
            None => {
                tracing::debug!(instance = %instance, "No change sink subscribed");
                false
            }
        }
    }
}
