//! Integration tests for the dispatch cycle
//!
//! Tests the complete flow from event payload through argument resolution,
//! handler invocation, write-back and change notification.

use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tether::runtime::PayloadError;
use tether::runtime::error::DescriptorError;
use tether::{FunctionArgument, InstanceId, Runtime, RuntimeConfig, UiEvent};

fn runtime_with(instance: &str, data: Value) -> Runtime {
    let runtime = Runtime::new(RuntimeConfig::default()).unwrap();
    runtime.stores().register(instance.into(), data).unwrap();
    runtime
}

fn record_changes(runtime: &Runtime, instance: &str) -> Arc<Mutex<Vec<Value>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = seen.clone();
    runtime.on_change(instance, move |_, store| sink_seen.lock().push(store.clone()));
    seen
}

#[test]
fn test_rename_scenario() {
    let runtime = runtime_with("main", json!({"name": "A"}));
    runtime.register_handler("rename", |args: &mut [FunctionArgument]| {
        args[0].set(json!("B"));
        Ok(())
    });
    let seen = record_changes(&runtime, "main");

    let report = runtime
        .handle_event(
            &UiEvent::new("click"),
            &"main".into(),
            r#"[{"name":"rename","values":{"who":"name"}}]"#,
            Some("rename-button"),
        )
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.outcomes[0].written, vec!["name".to_string()]);
    assert_eq!(
        runtime.store(&"main".into()).unwrap().to_value(),
        json!({"name": "B"})
    );
    assert_eq!(*seen.lock(), vec![json!({"name": "B"})]);
}

#[test]
fn test_nested_reference_resolution() {
    let runtime = runtime_with("main", json!({"a": {"b": 5}}));
    let captured = Arc::new(Mutex::new(None));
    let handler_captured = captured.clone();
    runtime.register_handler("peek", move |args: &mut [FunctionArgument]| {
        *handler_captured.lock() = args[0].value().cloned();
        Ok(())
    });

    runtime
        .dispatch(r#"[{"name":"peek","values":{"x":"a.b"}}]"#, &"main".into())
        .unwrap();

    assert_eq!(*captured.lock(), Some(json!(5)));
}

#[test]
fn test_descriptors_run_in_order_with_write_back_between() {
    let runtime = runtime_with("main", json!({"log": []}));
    let events = Arc::new(Mutex::new(Vec::new()));

    for name in ["first", "second"] {
        let handler_events = events.clone();
        runtime.register_handler(name, move |args: &mut [FunctionArgument]| {
            let mut log = args[0].value().cloned().unwrap_or_else(|| json!([]));
            if let Some(items) = log.as_array_mut() {
                items.push(json!(name));
            }
            let before = args[0].value().cloned().unwrap_or_default();
            handler_events.lock().push(format!("call {} saw {}", name, before));
            args[0].set(log);
            Ok(())
        });
    }

    let sink_events = events.clone();
    runtime.on_change("main", move |_, store| {
        sink_events.lock().push(format!("notify {}", store["log"]));
    });

    let report = runtime
        .dispatch(
            r#"[{"name":"first","values":{"l":"log"}},{"name":"second","values":{"l":"log"}}]"#,
            &"main".into(),
        )
        .unwrap();

    assert_eq!(report.notifications(), 2);
    assert_eq!(
        *events.lock(),
        vec![
            r#"call first saw []"#.to_string(),
            r#"notify ["first"]"#.to_string(),
            r#"call second saw ["first"]"#.to_string(),
            r#"notify ["first","second"]"#.to_string(),
        ]
    );
}

#[test]
fn test_independent_instances() {
    let runtime = runtime_with("one", json!({"count": 1}));
    runtime.stores().register("two".into(), json!({"count": 1})).unwrap();
    runtime.register_builtins();

    runtime
        .dispatch(r#"[{"name":"increment","values":{"c":"count"}}]"#, &"one".into())
        .unwrap();

    assert_eq!(runtime.store(&"one".into()).unwrap().to_value(), json!({"count": 2}));
    assert_eq!(runtime.store(&"two".into()).unwrap().to_value(), json!({"count": 1}));
}

#[test]
fn test_unknown_handler_does_not_stop_later_descriptors() {
    let runtime = runtime_with("main", json!({"flag": false}));
    runtime.register_builtins();
    let seen = record_changes(&runtime, "main");

    let report = runtime
        .dispatch(
            r#"[{"name":"nope","values":{}},{"name":"toggle","values":{"f":"flag"}}]"#,
            &"main".into(),
        )
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert!(matches!(
        report.outcomes[0].error,
        Some(DescriptorError::UnknownHandler(ref name)) if name == "nope"
    ));
    assert!(report.outcomes[1].is_success());
    assert_eq!(*seen.lock(), vec![json!({"flag": true})]);
}

#[test]
fn test_malformed_payload_runs_nothing() {
    let runtime = runtime_with("main", json!({"n": 0}));
    let calls = Arc::new(Mutex::new(0));
    let handler_calls = calls.clone();
    runtime.register_handler("count", move |_args: &mut [FunctionArgument]| {
        *handler_calls.lock() += 1;
        Ok(())
    });

    let err = runtime
        .dispatch(r#"[{"name":"count"}, {"values": 3}]"#, &"main".into())
        .unwrap_err();
    assert!(matches!(err, PayloadError::InvalidDescriptor { index: 1, .. }));

    let err = runtime.dispatch("not json", &"main".into()).unwrap_err();
    assert!(matches!(err, PayloadError::Malformed(_)));

    assert_eq!(*calls.lock(), 0);
}

#[test]
fn test_missing_instance_resolves_absent() {
    let runtime = Runtime::new(RuntimeConfig::default()).unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let handler_received = received.clone();
    runtime.register_handler("inspect", move |args: &mut [FunctionArgument]| {
        handler_received.lock().extend(args.iter().cloned());
        args[0].set(json!("ignored"));
        Ok(())
    });
    let seen = record_changes(&runtime, "ghost");

    let report = runtime
        .dispatch(
            r#"[{"name":"inspect","values":{"a":"name","b":"plain text"}}]"#,
            &"ghost".into(),
        )
        .unwrap();

    assert!(report.is_success());
    assert!(!report.outcomes[0].notified);
    assert_eq!(
        *received.lock(),
        vec![
            FunctionArgument::from_reference("name", None),
            FunctionArgument::literal(json!("plain text")),
        ]
    );
    assert!(runtime.store(&"ghost".into()).is_none());
    assert!(seen.lock().is_empty());
}

#[test]
fn test_literals_are_never_written_back() {
    let runtime = runtime_with("main", json!({"hello world": "untouched"}));
    runtime.register_handler("scribble", |args: &mut [FunctionArgument]| {
        args[0].set(json!("changed"));
        Ok(())
    });

    let report = runtime
        .dispatch(
            r#"[{"name":"scribble","values":{"x":"hello world"}}]"#,
            &"main".into(),
        )
        .unwrap();

    assert!(report.outcomes[0].written.is_empty());
    assert_eq!(
        runtime.store(&"main".into()).unwrap().to_value(),
        json!({"hello world": "untouched"})
    );
}

#[test]
fn test_init_instance_from_document() {
    let runtime = Runtime::new(RuntimeConfig::default()).unwrap();
    let mut page = HashMap::new();
    page.insert("main-data".to_string(), r#"{"todo": {"done": false}}"#.to_string());

    assert!(runtime.init_instance("main", &page, "main-data").unwrap());
    assert!(!runtime.init_instance("other", &page, "other-data").unwrap());

    assert_eq!(runtime.stores().instances(), vec![InstanceId::new("main")]);
}
