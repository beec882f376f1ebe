// patter-vm - Compiler tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Compiler-level tests: emitted bytecode shape, determinism, scope
//! balance, and the diagnostics a careful author leans on.

use std::sync::Arc;

use patter_core::{Runtime, Visibility};
use patter_lang::Variant;
use patter_vm::{Bytecode, CompileError, HEADER_SIZE, Opcode, compile, decode};

fn compile_on(runtime: &Arc<Runtime>, source: &str) -> Result<Bytecode, CompileError> {
    compile(runtime, source, "compiler-test", &[])
}

fn compile_ok(source: &str) -> Bytecode {
    let runtime = Runtime::new();
    compile_on(&runtime, source).expect("script should compile")
}

fn compile_err(source: &str) -> String {
    let runtime = Runtime::new();
    match compile_on(&runtime, source) {
        Ok(_) => panic!("script should not compile: {}", source),
        Err(e) => e.to_string(),
    }
}

#[test]
fn test_empty_script_emits_header_and_exit() {
    let bytecode = compile_ok("");
    let instructions = decode(&bytecode).unwrap();
    // Library declaration and the terminating Exit.
    assert_eq!(instructions[0].opcode, Opcode::Library);
    assert_eq!(instructions.last().unwrap().opcode, Opcode::Exit);
}

#[test]
fn test_compile_determinism() {
    let source = "set x to 1 + 2\nset words to \"a\", \"b\", \"c\"\nif x > 2\nset x to 0\nend";
    let a = compile(&Runtime::new(), source, "same", &[]).unwrap();
    let b = compile(&Runtime::new(), source, "same", &[]).unwrap();
    assert_eq!(a.as_slice(), b.as_slice());
}

#[test]
fn test_no_unfilled_jump_targets() {
    let source = r#"
set x to 3
if x > 1
    set x to x - 1
else if x > 0
    set x to 0
else
    set x to 100
end
loop i from 1 to 3
    if i = 2
        break
    end
end
"#;
    let bytecode = compile_ok(source);
    for instruction in decode(&bytecode).unwrap() {
        if matches!(
            instruction.opcode,
            Opcode::Jump | Opcode::JumpTrue | Opcode::JumpFalse
        ) {
            let target: usize = instruction.operands.parse().unwrap();
            assert!(
                target >= HEADER_SIZE && target <= bytecode.len(),
                "jump at {} targets {} outside the instruction stream",
                instruction.offset,
                target
            );
        }
    }
}

#[test]
fn test_scope_begin_end_balance() {
    // Break-free control flow emits statically balanced scope opcodes.
    let source = r#"
begin
    set a to 1
end
if true
    set b to 2
else
    set c to 3
end
loop i from 1 to 2
    set d to i
end
loop while false
    set e to 1
end
"#;
    let bytecode = compile_ok(source);
    let instructions = decode(&bytecode).unwrap();
    let begins = instructions
        .iter()
        .filter(|i| i.opcode == Opcode::ScopeBegin)
        .count();
    let ends = instructions
        .iter()
        .filter(|i| i.opcode == Opcode::ScopeEnd)
        .count();
    assert_eq!(begins, ends);
    assert!(begins >= 4);
}

#[test]
fn test_break_unwinds_nested_scopes() {
    let source = r#"
loop i from 1 to 10
    if i = 2
        break
    end
end
"#;
    let bytecode = compile_ok(source);
    let instructions = decode(&bytecode).unwrap();
    // The break path carries its own ScopeEnd unwinds, so the static
    // count has more ends than begins.
    let begins = instructions
        .iter()
        .filter(|i| i.opcode == Opcode::ScopeBegin)
        .count();
    let ends = instructions
        .iter()
        .filter(|i| i.opcode == Opcode::ScopeEnd)
        .count();
    assert!(ends > begins);
    // And the loop cleanup pops the counter, limit, and step.
    assert!(
        instructions
            .iter()
            .any(|i| i.opcode == Opcode::PopCount && i.operands == "3")
    );
}

#[test]
fn test_left_to_right_emission_order() {
    let bytecode = compile_ok("set x to 2 + 3 * 4");
    let opcodes: Vec<Opcode> = decode(&bytecode)
        .unwrap()
        .into_iter()
        .map(|i| i.opcode)
        .collect();
    // Push 2, push 3, add, push 4, multiply: strictly left to right.
    let add = opcodes.iter().position(|o| *o == Opcode::Add).unwrap();
    let multiply = opcodes.iter().position(|o| *o == Opcode::Multiply).unwrap();
    assert!(add < multiply);
}

#[test]
fn test_collection_literal_emission() {
    let bytecode = compile_ok("set c to [1, \"a\"], [2, \"b\"]");
    let instructions = decode(&bytecode).unwrap();
    assert!(
        instructions
            .iter()
            .any(|i| i.opcode == Opcode::PushColl && i.operands == "2")
    );

    let bytecode = compile_ok("set l to 1, 2, 3");
    let instructions = decode(&bytecode).unwrap();
    assert!(
        instructions
            .iter()
            .any(|i| i.opcode == Opcode::PushList && i.operands == "3")
    );
}

#[test]
fn test_function_definition_emission() {
    let bytecode = compile_ok("function return {x} doubled\nreturn x * 2\nend");
    let instructions = decode(&bytecode).unwrap();
    let function = instructions
        .iter()
        .position(|i| i.opcode == Opcode::Function)
        .unwrap();
    // The record is followed by a jump over the body and the parameter
    // binding at a negative stack index.
    assert_eq!(instructions[function + 1].opcode, Opcode::Jump);
    assert_eq!(instructions[function + 2].opcode, Opcode::SetIndex);
    assert!(instructions[function + 2].operands.starts_with("x -1"));
    assert!(instructions.iter().any(|i| i.opcode == Opcode::ReturnValue));
}

#[test]
fn test_multi_word_names_resolve_longest_match() {
    let bytecode = compile_ok("set high score to 10\nset high to 1\nset x to high score");
    let instructions = decode(&bytecode).unwrap();
    // The last statement reads the two-word variable, not `high`.
    let last_push = instructions
        .iter()
        .rev()
        .find(|i| i.opcode == Opcode::PushVar)
        .unwrap();
    assert_eq!(last_push.operands, "high score");
}

#[test]
fn test_readonly_property_violations() {
    let runtime = Runtime::new();
    compile_on(&runtime, "set public readonly limit to 5")
        .expect("declaration should compile");

    let reassign = compile(&runtime, "set limit to 6", "reassign", &[]).unwrap_err();
    assert!(reassign.to_string().contains("readonly"));

    let erase = compile(&runtime, "erase limit", "erase", &[]).unwrap_err();
    assert!(erase.to_string().contains("readonly"));

    let bump = compile(&runtime, "increment limit", "bump", &[]).unwrap_err();
    assert!(bump.to_string().contains("readonly"));
}

#[test]
fn test_readonly_requires_initial_value() {
    let err = compile_err("set public readonly limit");
    assert!(err.contains("initial value"));
}

#[test]
fn test_readonly_requires_visibility() {
    let err = compile_err("set readonly limit to 5");
    assert!(err.contains("private or public"));
}

#[test]
fn test_ambiguous_function_call() {
    let runtime = Runtime::new();
    runtime
        .library("liba")
        .register_function(Visibility::Public, "frob {x}", |_| Ok(Variant::Null))
        .unwrap();
    runtime
        .library("libb")
        .register_function(Visibility::Public, "frob {x}", |_| Ok(Variant::Null))
        .unwrap();

    let err = compile(&runtime, "frob 1", "ambiguous", &["liba", "libb"]).unwrap_err();
    assert!(err.to_string().contains("Ambiguous"));

    // A library prefix disambiguates.
    compile(&runtime, "liba frob 1", "qualified", &["liba", "libb"])
        .expect("qualified call should compile");
}

#[test]
fn test_private_function_not_callable_across_libraries() {
    let runtime = Runtime::new();
    runtime
        .library("liba")
        .register_function(Visibility::Private, "hidden {x}", |_| Ok(Variant::Null))
        .unwrap();

    assert!(compile(&runtime, "hidden 1", "unqualified", &["liba"]).is_err());
    assert!(compile(&runtime, "liba hidden 1", "qualified", &["liba"]).is_err());
}

#[test]
fn test_function_must_be_root_scope() {
    let err = compile_err("begin\nfunction return {x} doubled\nreturn x\nend\nend");
    assert!(err.contains("scoped execution block"));
}

#[test]
fn test_function_requires_return_on_all_paths() {
    let err = compile_err(
        "function return {x} classified\nif x > 0\nreturn \"positive\"\nend\nend",
    );
    assert!(err.contains("return"));

    compile_ok(
        "function return {x} classified\nif x > 0\nreturn \"positive\"\nelse\nreturn \"other\"\nend\nend",
    );
}

#[test]
fn test_return_value_outside_function() {
    let err = compile_err("return 5");
    assert!(err.contains("Unexpected return value"));
}

#[test]
fn test_signature_cannot_be_bare_keyword() {
    let err = compile_err("function while\nend");
    assert!(err.contains("keyword"));
}

#[test]
fn test_signature_needs_required_name() {
    let err = compile_err("function (maybe) {x}\nend");
    assert!(err.contains("non-optional"));
}

#[test]
fn test_break_outside_loop() {
    let err = compile_err("break");
    assert!(err.contains("loop"));
}

#[test]
fn test_duplicate_function_in_library() {
    let runtime = Runtime::new();
    compile_on(&runtime, "public function return {x} doubled\nreturn x * 2\nend")
        .expect("first definition compiles");
    let err = compile(
        &runtime,
        "public function return {y} doubled\nreturn y + y\nend",
        "dup",
        &[],
    )
    .unwrap_err();
    assert!(err.to_string().contains("already defined"));
}

#[test]
fn test_error_position_reported() {
    let runtime = Runtime::new();
    let err = match compile_on(&runtime, "set x to 1\nset y to +\n") {
        Err(CompileError::Parse(e)) => e,
        other => panic!("expected parse error, got {:?}", other.map(|_| ())),
    };
    assert_eq!(err.line, 2);
}

#[test]
fn test_error_is_sticky_and_first_wins() {
    // Both lines are bad; only the first is reported.
    let runtime = Runtime::new();
    let err = match compile_on(&runtime, "set x to\nset y to\n") {
        Err(CompileError::Parse(e)) => e,
        other => panic!("expected parse error, got {:?}", other.map(|_| ())),
    };
    assert_eq!(err.line, 1);
}

#[test]
fn test_library_declaration_binds_names() {
    let runtime = Runtime::new();
    compile_on(
        &runtime,
        "library game\nset public score to 0\npublic function return {x} doubled\nreturn x * 2\nend",
    )
    .expect("library script compiles");

    assert!(runtime.library_exists("game"));
    assert!(runtime.library("game").property_exists("score"));
}

#[test]
fn test_import_of_unknown_library_is_not_fatal() {
    // The warning is logged; compilation proceeds until a call is
    // attempted.
    let runtime = Runtime::new();
    compile_on(&runtime, "import missing\nset x to 1").expect("import alone compiles");
    assert!(compile(&runtime, "import missing\npoke 1", "call", &[]).is_err());
}

#[test]
fn test_wait_forms_compile() {
    let bytecode = compile_ok("wait");
    assert!(
        decode(&bytecode)
            .unwrap()
            .iter()
            .any(|i| i.opcode == Opcode::Wait)
    );

    let runtime = Runtime::new();
    runtime
        .library("host")
        .register_property(Visibility::Public, false, "ready", Variant::Boolean(false))
        .unwrap();
    let bytecode = compile(&runtime, "wait until ready", "wait", &["host"]).unwrap();
    let opcodes: Vec<Opcode> = decode(&bytecode)
        .unwrap()
        .into_iter()
        .map(|i| i.opcode)
        .collect();
    assert!(opcodes.contains(&Opcode::Wait));
    assert!(opcodes.contains(&Opcode::JumpTrue));
}
