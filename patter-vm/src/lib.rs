// patter-vm - Bytecode compiler and cooperative virtual machine for the Patter scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # patter-vm
//!
//! The bytecode layer of the Patter scripting language: the instruction
//! set, the single-pass compiler that emits it, a disassembler, and the
//! cooperative [`Script`] virtual machine that executes it.
//!
//! ```
//! use patter_core::Runtime;
//! use patter_vm::{ExecutionStatus, Script, compile};
//!
//! let runtime = Runtime::new();
//! let bytecode = compile(&runtime, "set x to 1 + 2", "example", &[]).unwrap();
//! let mut script = Script::new(runtime, bytecode).unwrap();
//! assert_eq!(script.execute(), ExecutionStatus::Finished);
//! ```

pub mod bytecode;
pub mod compiler;
pub mod disasm;
pub mod opcode;
pub mod script;

pub use bytecode::{BYTECODE_MAGIC, BYTECODE_VERSION, Bytecode, BytecodeHeader, HEADER_SIZE};
pub use compiler::{CompileError, Compiler, ParseError};
pub use disasm::{Instruction, decode, disassemble};
pub use opcode::Opcode;
pub use script::{ExecutionStatus, Script};

use std::sync::Arc;
use std::time::Instant;

use patter_core::Runtime;
use patter_lang::Lexer;

/// Compile source text into bytecode against a runtime's registries.
///
/// `unique_name` identifies the script in logs and diagnostics; `imports`
/// seeds the import list in addition to any `import` statements in the
/// source. Compilation time is folded into the runtime's statistics, and
/// the `log_symbols` / `log_bytecode` parameters emit debug dumps.
pub fn compile(
    runtime: &Arc<Runtime>,
    source: &str,
    unique_name: &str,
    imports: &[&str],
) -> Result<Bytecode, CompileError> {
    let started = Instant::now();

    let symbols = Lexer::new(source).tokenize()?;
    if runtime.params().log_symbols {
        let dump: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
        tracing::debug!(script = %unique_name, "symbols: {}", dump.join(" "));
    }

    let bytecode = Compiler::new(runtime, &symbols, unique_name, imports).execute()?;

    runtime.add_compile_perf(started.elapsed().as_nanos() as u64);
    if runtime.params().log_bytecode {
        match disassemble(&bytecode) {
            Ok(listing) => {
                tracing::debug!(script = %unique_name, "bytecode:\n{}", listing);
            }
            Err(e) => {
                tracing::debug!(script = %unique_name, "bytecode dump failed: {}", e);
            }
        }
    }
    Ok(bytecode)
}
