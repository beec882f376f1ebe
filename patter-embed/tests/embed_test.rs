// patter-embed - Embedding API tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Tests of the host-facing engine: registration, execution, the core
//! library, and conversions.

use std::sync::{Arc, Mutex};

use patter_core::RuntimeError;
use patter_embed::{
    Engine, ExecutionStatus, FromVariant, IntoVariant, RuntimeParams, ValueType, Variant,
    Visibility,
};

/// An engine plus a `host` library with a `record {x}` collector.
fn engine_with_recorder() -> (Engine, Arc<Mutex<Vec<Variant>>>) {
    let engine = Engine::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    engine
        .register_function("host", Visibility::Public, "record {x}", move |args| {
            sink.lock().unwrap().push(args[0].clone());
            Ok(Variant::Null)
        })
        .unwrap();
    (engine, log)
}

fn recorded(log: &Arc<Mutex<Vec<Variant>>>) -> Vec<Variant> {
    log.lock().unwrap().clone()
}

#[test]
fn test_execute_script_runs_to_completion() {
    let engine = Engine::new();
    let script = engine
        .execute_script("set x to 40 + 2", "simple", &[])
        .unwrap();
    assert!(script.is_finished());
}

#[test]
fn test_compile_error_surfaces() {
    let engine = Engine::new();
    let result = engine.execute_script("set x to", "broken", &[]);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Parse error"));
}

#[test]
fn test_runtime_error_surfaces() {
    let engine = Engine::new();
    let result = engine.execute_script("set x to 1 / 0", "div", &[]);
    assert!(result.unwrap_err().to_string().contains("Division by zero"));
}

#[test]
fn test_registered_function_receives_arguments() {
    let (engine, log) = engine_with_recorder();
    engine
        .execute_script("import host\nrecord 1 + 2", "args", &[])
        .unwrap();
    assert_eq!(recorded(&log), vec![Variant::Integer(3)]);
}

#[test]
fn test_returning_function() {
    let (engine, log) = engine_with_recorder();
    engine
        .register_function("host", Visibility::Public, "return {x} doubled", |args| {
            match args.first() {
                Some(Variant::Integer(n)) => Ok(Variant::Integer(n * 2)),
                other => Err(RuntimeError::native(format!(
                    "expected an integer, got {:?}",
                    other
                ))),
            }
        })
        .unwrap();
    engine
        .execute_script("import host\nset y to 21 doubled\nrecord y", "doubled", &[])
        .unwrap();
    assert_eq!(recorded(&log), vec![Variant::Integer(42)]);
}

#[test]
fn test_core_write_compiles_without_import() {
    // `core` is implicitly importable when registered.
    let engine = Engine::new();
    let script = engine
        .execute_script("write line \"hello from patter\"", "write", &[])
        .unwrap();
    assert!(script.is_finished());
}

#[test]
fn test_bare_engine_has_no_core() {
    let engine = Engine::new_bare();
    assert!(engine.execute_script("write line \"hi\"", "write", &[]).is_err());
}

#[test]
fn test_core_size() {
    let (engine, log) = engine_with_recorder();
    let source = r#"
import host
set c to [1, "a"], [2, "b"]
record (c size)
record ("hello" size)
"#;
    engine.execute_script(source, "size", &[]).unwrap();
    assert_eq!(
        recorded(&log),
        vec![Variant::Integer(2), Variant::Integer(5)]
    );
}

#[test]
fn test_loop_iterator_key_and_value() {
    let (engine, log) = engine_with_recorder();
    let source = r#"
import host
set c to [1, "a"], [2, "b"]
loop x over c
    record (x key)
    record (x value)
end
"#;
    engine.execute_script(source, "iterate", &[]).unwrap();
    assert_eq!(
        recorded(&log),
        vec![
            Variant::Integer(1),
            Variant::from("a"),
            Variant::Integer(2),
            Variant::from("b"),
        ]
    );
}

#[test]
fn test_new_guid_is_unique() {
    let (engine, log) = engine_with_recorder();
    let source = r#"
import host
record (new guid)
record (new guid)
"#;
    engine.execute_script(source, "guids", &[]).unwrap();
    let values = recorded(&log);
    assert_eq!(values.len(), 2);
    assert!(matches!(values[0], Variant::Guid(_)));
    assert_ne!(values[0], values[1]);
}

#[test]
fn test_property_round_trip_through_engine() {
    let engine = Engine::new();
    engine
        .register_property("game", Visibility::Public, false, "score", Variant::Integer(0))
        .unwrap();

    engine
        .execute_script("import game\nset score to score + 10", "bump", &[])
        .unwrap();
    assert_eq!(
        engine.get_property("game", "score").unwrap(),
        Some(Variant::Integer(10))
    );

    engine
        .set_property("game", "score", Variant::Integer(99))
        .unwrap();
    assert_eq!(
        engine.get_property("game", "score").unwrap(),
        Some(Variant::Integer(99))
    );
}

#[test]
fn test_unknown_property_is_reported() {
    let engine = Engine::new();
    assert!(engine.get_property("game", "missing").is_err());
}

#[test]
fn test_wait_drives_through_engine() {
    let engine = Engine::new();
    let id = engine
        .register_property("host", Visibility::Public, false, "go", Variant::Boolean(false))
        .unwrap();

    let bytecode = engine
        .compile("import host\nwait until go\nset done to 1", "waiting", &[])
        .unwrap();
    let mut script = engine.create_script(bytecode).unwrap();
    assert_eq!(script.execute(), ExecutionStatus::Waiting);

    engine.runtime().set_property(id, Variant::Boolean(true)).unwrap();
    assert_eq!(script.execute(), ExecutionStatus::Finished);
}

#[test]
fn test_stats_accumulate() {
    let engine = Engine::new();
    engine.execute_script("set x to 1", "one", &[]).unwrap();
    engine.execute_script("set y to 2", "two", &[]).unwrap();

    let stats = engine.stats(false);
    assert_eq!(stats.script_compilation_count, 2);
    assert_eq!(stats.script_execution_count, 2);
    assert!(stats.instruction_count > 0);

    engine.stats(true);
    assert_eq!(engine.stats(false).script_compilation_count, 0);
}

#[test]
fn test_conversions_in_callbacks() {
    let (engine, log) = engine_with_recorder();
    engine
        .register_function(
            "host",
            Visibility::Public,
            "return sum of {values}",
            |args| {
                let values: Vec<i64> = Vec::from_variant(&args[0])?;
                Ok(values.iter().sum::<i64>().into_variant())
            },
        )
        .unwrap();

    engine
        .execute_script(
            "import host\nset s to sum of (1, 2, 3)\nrecord s",
            "sum",
            &[],
        )
        .unwrap();
    assert_eq!(recorded(&log), vec![Variant::Integer(6)]);
}

#[test]
fn test_engine_params() {
    let mut params = RuntimeParams::default();
    params.max_operand_stack = 0;
    assert!(Engine::with_params(params).is_err());

    let mut params = RuntimeParams::default();
    params.max_instructions = 5;
    let engine = Engine::with_params(params).unwrap();
    // The tiny slice means the first execute call cannot finish.
    let script = engine
        .execute_script("set a to 1\nset b to 2\nset c to 3\nset d to 4", "sliced", &[])
        .unwrap();
    assert!(!script.is_finished());
}

#[test]
fn test_value_type_round_trip_via_script() {
    let (engine, log) = engine_with_recorder();
    engine
        .execute_script("import host\nset x to 2.5\nrecord (x type)", "types", &[])
        .unwrap();
    assert_eq!(recorded(&log), vec![Variant::ValType(ValueType::Number)]);
}
