// patter-vm - Property-based compiler tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Property-based tests: compiling identical source yields byte-identical
//! bytecode, and everything the compiler emits decodes cleanly.

use proptest::prelude::*;

use patter_core::Runtime;
use patter_lang::SymbolKind;
use patter_vm::{Opcode, compile, decode};

/// Lowercase words that lex as plain names.
fn word() -> impl Strategy<Value = String> {
    "[a-z]{1,8}".prop_filter("not a reserved word", |w| {
        SymbolKind::keyword(w).is_none() && w != "true" && w != "false"
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn arithmetic_compiles_deterministically(
        a in 0i64..1_000_000_000,
        b in 0i64..1_000_000_000,
        name in word(),
    ) {
        let source = format!("set {} to {} + {} * 2\nset {} to {} - 1", name, a, b, name, name);
        let first = compile(&Runtime::new(), &source, "prop", &[]).expect("compiles");
        let second = compile(&Runtime::new(), &source, "prop", &[]).expect("compiles");
        prop_assert_eq!(first.as_slice(), second.as_slice());
    }

    #[test]
    fn emitted_bytecode_always_decodes(
        n in any::<i64>().prop_map(|n| n.saturating_abs()),
        f in 0.0f64..1e9,
        name in word(),
        text in "[a-zA-Z0-9 ]{0,16}",
    ) {
        let source = format!(
            "set {} to {}\nset other to {}\nset words to \"{}\"",
            name, n, f, text
        );
        let bytecode = compile(&Runtime::new(), &source, "prop", &[]).expect("compiles");
        let instructions = decode(&bytecode).expect("decodes");
        prop_assert_eq!(instructions.last().map(|i| i.opcode), Some(Opcode::Exit));
    }

    #[test]
    fn conditionals_balance_scopes(n in 0i64..100) {
        let source = format!(
            "set x to {}\nif x > 50\nset y to 1\nelse\nset y to 2\nend",
            n
        );
        let bytecode = compile(&Runtime::new(), &source, "prop", &[]).expect("compiles");
        let instructions = decode(&bytecode).expect("decodes");
        let begins = instructions.iter().filter(|i| i.opcode == Opcode::ScopeBegin).count();
        let ends = instructions.iter().filter(|i| i.opcode == Opcode::ScopeEnd).count();
        prop_assert_eq!(begins, ends);
    }
}
