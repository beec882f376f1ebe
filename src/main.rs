// patter - An embeddable cooperative scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process;
use std::thread;
use std::time::Duration;

use patter_embed::{Engine, ExecutionStatus, Script};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() == 2 && (args[1] == "--version" || args[1] == "-v") {
        println!("Patter v{}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let engine = Engine::new();

    if args.len() > 1 {
        run_files(&engine, &args[1..]);
    } else {
        run_repl(&engine);
    }
}

/// Compile and run each source file to completion, ticking across waits.
fn run_files(engine: &Engine, paths: &[String]) {
    for path in paths {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("{}: {}", path, e);
                process::exit(1);
            }
        };
        let bytecode = match engine.compile(&source, path, &[]) {
            Ok(bytecode) => bytecode,
            Err(e) => {
                eprintln!("{}: {}", path, e);
                process::exit(1);
            }
        };
        let mut script = match engine.create_script(bytecode) {
            Ok(script) => script,
            Err(e) => {
                eprintln!("{}: {}", path, e);
                process::exit(1);
            }
        };
        if !drive(&mut script) {
            process::exit(1);
        }
    }
}

/// Tick a script until it finishes or errors. Waits yield the thread
/// briefly, since another thread (or nothing) may flip the awaited state.
fn drive(script: &mut Script) -> bool {
    loop {
        match script.execute() {
            ExecutionStatus::Finished => return true,
            ExecutionStatus::Errored => {
                if let Some(error) = script.error() {
                    eprintln!("{}", error);
                }
                return false;
            }
            ExecutionStatus::Waiting => thread::sleep(Duration::from_millis(1)),
            ExecutionStatus::Running => {}
        }
    }
}

/// Read chunks of lines (terminated by a blank line) and run each as its
/// own script. State shared across chunks lives in properties.
fn run_repl(engine: &Engine) {
    println!("Patter v{}", env!("CARGO_PKG_VERSION"));
    println!("Enter a script followed by a blank line; ctrl-d exits.");

    let stdin = io::stdin();
    let mut chunk = String::new();
    let mut count = 0u32;

    print!("> ");
    let _ = io::stdout().flush();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        if !line.trim().is_empty() {
            chunk.push_str(&line);
            chunk.push('\n');
            print!("| ");
            let _ = io::stdout().flush();
            continue;
        }
        if !chunk.is_empty() {
            count += 1;
            let name = format!("repl-{}", count);
            match engine.execute_script(&chunk, &name, &[]) {
                Ok(mut script) => {
                    drive(&mut script);
                }
                Err(e) => eprintln!("{}", e),
            }
            chunk.clear();
        }
        print!("> ");
        let _ = io::stdout().flush();
    }
}
