//! Error types for the dispatch runtime
//!
//! Domain errors use thiserror; the CLI and config loading wrap them in
//! anyhow at the boundary.

use thiserror::Error;

/// Top-level runtime error
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Event payload could not be parsed
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    /// Instance store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Malformed event payloads. Fatal for the whole dispatch call.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload text is not valid JSON
    #[error("Malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload parsed but is not a list of descriptors
    #[error("Event payload must be a list of action descriptors, found {0}")]
    NotAList(&'static str),

    /// A descriptor in the list has the wrong shape
    #[error("Invalid action descriptor at index {index}: {detail}")]
    InvalidDescriptor {
        /// Position of the descriptor in the payload
        index: usize,
        /// What was wrong with it
        detail: String,
    },
}

/// Convenience result alias for payload parsing
pub type PayloadResult<T> = std::result::Result<T, PayloadError>;

/// Instance store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Initial store data must be a JSON object
    #[error("Store for instance '{instance}' must be an object, found {found}")]
    NotAnObject {
        /// Instance id
        instance: String,
        /// JSON kind that was supplied instead
        found: &'static str,
    },

    /// Element text could not be parsed as a store object
    #[error("Element '{element}' does not contain a valid store: {source}")]
    InvalidSource {
        /// Element id the text was read from
        element: String,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// A path segment runs through a value that is not a container
    #[error("Cannot write '{path}': no object or list holds segment '{segment}'")]
    PathConflict {
        /// Full reference path
        path: String,
        /// Segment whose parent is a scalar
        segment: String,
    },

    /// A numeric segment is outside the bounds of a list
    #[error("Cannot write '{path}': index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds {
        /// Full reference path
        path: String,
        /// Requested index
        index: usize,
        /// List length
        len: usize,
    },

    /// A list segment is not a valid index
    #[error("Cannot write '{path}': segment '{segment}' is not a list index")]
    InvalidIndex {
        /// Full reference path
        path: String,
        /// Offending segment
        segment: String,
    },

    /// The reference has no segments
    #[error("Empty reference path")]
    EmptyPath,

    /// A write-back target is not a well-formed path
    #[error("Invalid reference path '{0}'")]
    InvalidReference(String),
}

/// Convenience result alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors reported by handlers
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandlerError {
    /// Handler expected more arguments than it received
    #[error("Missing argument at position {index}")]
    MissingArgument {
        /// Position of the missing argument
        index: usize,
    },

    /// An argument has the wrong JSON type
    #[error("Argument {index} expected {expected}, found {found}")]
    TypeMismatch {
        /// Argument position
        index: usize,
        /// Expected JSON kind
        expected: &'static str,
        /// Actual JSON kind
        found: &'static str,
    },

    /// Any other handler failure
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    /// Create a free-form handler failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Convenience result alias for handler invocations
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Per-descriptor failures. Recorded in the dispatch report; later
/// descriptors still run under the default policy.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// No handler registered under this name
    #[error("Handler '{0}' is not registered")]
    UnknownHandler(String),

    /// The handler ran and reported a failure
    #[error("Handler '{name}' failed: {source}")]
    Handler {
        /// Handler name
        name: String,
        /// Error reported by the handler
        #[source]
        source: HandlerError,
    },

    /// Writing an argument back to the store failed
    #[error("Write-back to '{reference}' failed: {source}")]
    WriteBack {
        /// Reference being written
        reference: String,
        /// Underlying store error
        #[source]
        source: StoreError,
    },
}

/// Result type using RuntimeError
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Human-readable kind of a JSON value, used in error messages
pub fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "object",
    }
}
