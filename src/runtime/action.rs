//! Action descriptors and the event payload wire format
//!
//! An event payload is a JSON list of `{ "name": ..., "values": {...} }`
//! objects. Each argument is classified once, at parse time, into a
//! literal, a store reference, or an already-resolved value.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::error::{PayloadError, PayloadResult, json_kind};
use super::path::ReferencePath;
use super::resolver::{Resolver, lookup};
use super::store::Store;

/// An argument handed to a handler.
///
/// `value` is a mutable cell: whatever it holds when the handler returns is
/// written back to `reference`, if there is one. `None` means absent;
/// an explicit JSON `null` is `Some(Value::Null)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionArgument {
    /// Current value, `None` when the reference pointed nowhere
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
    /// Store path the value came from and is persisted to
    #[serde(default)]
    pub reference: Option<String>,
}

impl FunctionArgument {
    /// An argument with no backing reference
    pub fn literal(value: Value) -> Self {
        Self {
            value: Some(value),
            reference: None,
        }
    }

    /// An argument resolved from `reference`
    pub fn from_reference(reference: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            value,
            reference: Some(reference.into()),
        }
    }

    /// Current value, if any
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Replace the value
    pub fn set(&mut self, value: Value) {
        self.value = Some(value);
    }

    /// Make the value absent; write-back removes the store entry
    pub fn clear(&mut self) {
        self.value = None;
    }

    /// Whether the value is persisted after the handler returns
    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }
}

// Only a missing key is absent; a present `null` is a value.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// How an argument is obtained at dispatch time
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentSpec {
    /// A string passed as-is
    Literal(String),
    /// A store location resolved before the handler runs
    Reference(ReferencePath),
    /// A structured value passed through unresolved
    Resolved(FunctionArgument),
}

impl ArgumentSpec {
    /// Classify a raw wire value
    pub fn from_wire(raw: Value, resolver: &Resolver) -> Self {
        match raw {
            Value::String(token) => match resolver.grammar().parse(&token) {
                Some(path) => Self::Reference(path),
                None => Self::Literal(token),
            },
            Value::Object(map) if is_function_argument(&map) => {
                match serde_json::from_value(Value::Object(map.clone())) {
                    Ok(argument) => Self::Resolved(argument),
                    Err(_) => Self::Resolved(FunctionArgument::literal(Value::Object(map))),
                }
            }
            other => Self::Resolved(FunctionArgument::literal(other)),
        }
    }

    /// Produce the handler argument against a store snapshot
    pub fn resolve(&self, store: &Store) -> FunctionArgument {
        match self {
            Self::Literal(text) => FunctionArgument::literal(Value::String(text.clone())),
            Self::Reference(path) => {
                FunctionArgument::from_reference(path.as_str(), lookup(path, store))
            }
            Self::Resolved(argument) => argument.clone(),
        }
    }
}

// `{ "value": ..., "reference"?: string | null }` and nothing else
fn is_function_argument(map: &Map<String, Value>) -> bool {
    map.contains_key("value")
        && map.keys().all(|key| key == "value" || key == "reference")
        && map
            .get("reference")
            .is_none_or(|reference| reference.is_string() || reference.is_null())
}

/// A request to invoke a named handler
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDescriptor {
    /// Handler name
    pub name: String,
    /// Arguments in insertion order, keyed by argument name
    pub values: Vec<(String, ArgumentSpec)>,
}

impl ActionDescriptor {
    /// Resolve every argument against `store`, in order
    pub fn resolve_arguments(&self, store: &Store) -> Vec<FunctionArgument> {
        self.values
            .iter()
            .map(|(key, spec)| {
                let argument = spec.resolve(store);
                tracing::debug!(
                    action = %self.name,
                    argument = %key,
                    reference = argument.reference.as_deref().unwrap_or("-"),
                    "Resolved argument"
                );
                argument
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct WireDescriptor {
    name: String,
    #[serde(default)]
    values: Map<String, Value>,
}

/// A parsed event payload: descriptors in execution order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventPayload {
    /// Descriptors in the order they must run
    pub actions: Vec<ActionDescriptor>,
}

impl EventPayload {
    /// Parse the serialized action list. Any malformed descriptor fails the
    /// whole payload.
    pub fn parse(text: &str, resolver: &Resolver) -> PayloadResult<Self> {
        let raw: Value = serde_json::from_str(text)?;
        let Value::Array(items) = raw else {
            return Err(PayloadError::NotAList(json_kind(&raw)));
        };

        let mut actions = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let wire: WireDescriptor =
                serde_json::from_value(item).map_err(|err| PayloadError::InvalidDescriptor {
                    index,
                    detail: err.to_string(),
                })?;
            let values = wire
                .values
                .into_iter()
                .map(|(key, raw)| (key, ArgumentSpec::from_wire(raw, resolver)))
                .collect();
            actions.push(ActionDescriptor {
                name: wire.name,
                values,
            });
        }

        Ok(Self { actions })
    }

    /// Number of descriptors
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the payload has no descriptors
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
