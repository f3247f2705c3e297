//! Tether – reactive event dispatch for declarative UI instances
//!
//! Each rendered instance owns a private JSON data store. User events
//! arrive as serialized lists of actions; this crate:
//! - Resolves action arguments against the instance store (literal vs. reference)
//! - Invokes the named handler from an explicit handler registry
//! - Writes handler-mutated arguments back to the store paths they came from
//! - Notifies the instance's change sink with the updated store

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Runtime core modules implementing event dispatch
pub mod runtime;

// Re-export key types for convenience
pub use runtime::{Runtime, RuntimeConfig, UiEvent};
pub use runtime::action::FunctionArgument;
pub use runtime::store::InstanceId;

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
