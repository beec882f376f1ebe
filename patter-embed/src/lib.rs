// patter-embed - Embedding API for the Patter scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # patter-embed
//!
//! A high-level embedding API for the Patter scripting language.
//!
//! This crate wires the lower layers together for host applications: one
//! [`Engine`] owns a shared runtime, compiles source to bytecode, creates
//! cooperative scripts, and registers native functions and properties.
//!
//! ## Quick start
//!
//! ```rust
//! use patter_embed::Engine;
//!
//! let engine = Engine::new();
//! let mut script = engine.execute_script("set x to 1 + 2", "demo", &[]).unwrap();
//! assert!(script.is_finished());
//! ```
//!
//! ## Registering native functions
//!
//! ```rust
//! use patter_embed::{Engine, Variant, Visibility};
//! use patter_core::RuntimeError;
//!
//! let engine = Engine::new();
//! engine
//!     .register_function("math", Visibility::Public, "return {x} doubled", |args| {
//!         match args.first() {
//!             Some(Variant::Integer(n)) => Ok(Variant::Integer(n * 2)),
//!             _ => Err(RuntimeError::native("expected an integer")),
//!         }
//!     })
//!     .unwrap();
//!
//! let script = engine
//!     .execute_script("import math\nset y to 21 doubled", "demo", &[])
//!     .unwrap();
//! assert!(script.is_finished());
//! ```

mod convert;
mod corelib;
mod engine;
mod error;

pub use convert::{FromVariant, IntoVariant};
pub use engine::Engine;
pub use error::{Error, Result};

// Re-export the types hosts touch most, so a single dependency suffices.
pub use patter_core::{
    PerfStats, RegistrationError, Runtime, RuntimeId, RuntimeParams, Visibility,
};
pub use patter_lang::{Collection, Uuid, ValueType, Variant};
pub use patter_vm::{Bytecode, CompileError, ExecutionStatus, Script};
