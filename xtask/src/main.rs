// xtask - Build automation for patter
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, exit};

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("install") => install(),
        Some("uninstall") => uninstall(),
        Some("help") | Some("-h") | Some("--help") | None => help(),
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            help();
            exit(1);
        }
    }
}

fn help() {
    println!(
        r#"patter xtask - Build automation

USAGE:
    cargo xtask <COMMAND>

COMMANDS:
    install      Build a release binary and copy it to ~/.local/bin
    uninstall    Remove the installed binary
    help         Show this message
"#
    );
}

fn bin_dir() -> PathBuf {
    let home = env::var("HOME").unwrap_or_else(|_| {
        eprintln!("HOME is not set");
        exit(1);
    });
    PathBuf::from(home).join(".local").join("bin")
}

fn install() {
    let status = Command::new("cargo")
        .args(["build", "--release", "--bin", "patter"])
        .status()
        .unwrap_or_else(|e| {
            eprintln!("Failed to run cargo: {}", e);
            exit(1);
        });
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }

    let target = bin_dir();
    if let Err(e) = fs::create_dir_all(&target) {
        eprintln!("Failed to create {}: {}", target.display(), e);
        exit(1);
    }
    let destination = target.join("patter");
    if let Err(e) = fs::copy("target/release/patter", &destination) {
        eprintln!("Failed to copy binary: {}", e);
        exit(1);
    }
    println!("Installed {}", destination.display());
}

fn uninstall() {
    let destination = bin_dir().join("patter");
    match fs::remove_file(&destination) {
        Ok(()) => println!("Removed {}", destination.display()),
        Err(e) => {
            eprintln!("Failed to remove {}: {}", destination.display(), e);
            exit(1);
        }
    }
}
