//! Built-in handlers every UI runtime ships with
//!
//! Toggling flags, stepping counters, and assigning values. Register them
//! with [`register_all`]; application handlers may override any name.

use serde_json::{Value, json};

use super::action::FunctionArgument;
use super::error::{HandlerError, HandlerResult, json_kind};
use super::handler::HandlerCatalog;

/// Names of the built-in handlers
pub const BUILTIN_HANDLERS: &[&str] = &[
    "toggle",
    "increment",
    "decrement",
    "increment_by",
    "decrement_by",
    "set_value",
    "set_bool",
    "set_string",
    "set_integer",
    "clear",
];

/// Register every built-in handler in `catalog`
pub fn register_all(catalog: &HandlerCatalog) {
    catalog.register("toggle", toggle);
    catalog.register("increment", |args: &mut [FunctionArgument]| step(args, 1));
    catalog.register("decrement", |args: &mut [FunctionArgument]| step(args, -1));
    catalog.register("increment_by", |args: &mut [FunctionArgument]| step_by(args, 1));
    catalog.register("decrement_by", |args: &mut [FunctionArgument]| step_by(args, -1));
    catalog.register("set_value", set_value);
    catalog.register("set_bool", |args: &mut [FunctionArgument]| {
        set_typed(args, "boolean", Value::is_boolean)
    });
    catalog.register("set_string", |args: &mut [FunctionArgument]| {
        set_typed(args, "string", Value::is_string)
    });
    catalog.register("set_integer", |args: &mut [FunctionArgument]| {
        set_typed(args, "integer", Value::is_i64)
    });
    catalog.register("clear", clear);
}

fn arg(args: &[FunctionArgument], index: usize) -> Result<&FunctionArgument, HandlerError> {
    args.get(index).ok_or(HandlerError::MissingArgument { index })
}

fn kind_of(argument: &FunctionArgument) -> &'static str {
    argument.value().map(json_kind).unwrap_or("absent")
}

fn as_integer(args: &[FunctionArgument], index: usize) -> Result<i64, HandlerError> {
    let argument = arg(args, index)?;
    argument
        .value()
        .and_then(Value::as_i64)
        .ok_or(HandlerError::TypeMismatch {
            index,
            expected: "integer",
            found: kind_of(argument),
        })
}

fn toggle(args: &mut [FunctionArgument]) -> HandlerResult {
    let argument = arg(args, 0)?;
    let current = argument
        .value()
        .and_then(Value::as_bool)
        .ok_or(HandlerError::TypeMismatch {
            index: 0,
            expected: "boolean",
            found: kind_of(argument),
        })?;
    args[0].set(json!(!current));
    Ok(())
}

fn step(args: &mut [FunctionArgument], delta: i64) -> HandlerResult {
    let current = as_integer(args, 0)?;
    let next = current
        .checked_add(delta)
        .ok_or_else(|| HandlerError::failed("integer overflow"))?;
    args[0].set(json!(next));
    Ok(())
}

fn step_by(args: &mut [FunctionArgument], sign: i64) -> HandlerResult {
    let by = as_integer(args, 1)?;
    let delta = by
        .checked_mul(sign)
        .ok_or_else(|| HandlerError::failed("integer overflow"))?;
    step(args, delta)
}

// An absent source is an error: assigning it would delete the target.
// Removal goes through `clear`.
fn set_value(args: &mut [FunctionArgument]) -> HandlerResult {
    arg(args, 0)?;
    let value = arg(args, 1)?
        .value()
        .cloned()
        .ok_or(HandlerError::TypeMismatch {
            index: 1,
            expected: "value",
            found: "absent",
        })?;
    args[0].set(value);
    Ok(())
}

fn set_typed(
    args: &mut [FunctionArgument],
    expected: &'static str,
    check: fn(&Value) -> bool,
) -> HandlerResult {
    arg(args, 0)?;
    let source = arg(args, 1)?;
    let value = source
        .value()
        .filter(|value| check(value))
        .cloned()
        .ok_or(HandlerError::TypeMismatch {
            index: 1,
            expected,
            found: kind_of(source),
        })?;
    args[0].set(value);
    Ok(())
}

fn clear(args: &mut [FunctionArgument]) -> HandlerResult {
    arg(args, 0)?;
    args[0].clear();
    Ok(())
}
