// patter-core - Runtime registry for the Patter scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # patter-core
//!
//! The shared runtime layer of the Patter scripting language: stable
//! runtime identifiers, function signatures, property names, libraries,
//! and the [`Runtime`] that owns the tables every script compiled or
//! executed against it shares.
//!
//! A `Runtime` is process-wide shareable: scripts created from one runtime
//! may execute on different host threads. Every mutable table is guarded
//! by its own lock, held only for the duration of a single lookup or
//! update, never across script instruction execution.
//!
//! ```
//! use patter_core::{Runtime, Visibility};
//! use patter_lang::Variant;
//!
//! let runtime = Runtime::new();
//! let library = runtime.library("demo");
//! let id = library
//!     .register_property(Visibility::Public, false, "score", Variant::Integer(0))
//!     .unwrap();
//! runtime.set_property(id, Variant::Integer(10)).unwrap();
//! assert_eq!(runtime.get_property(id), Some(Variant::Integer(10)));
//! ```

pub mod error;
pub mod function;
pub mod id;
pub mod library;
pub mod params;
pub mod property;
pub mod runtime;
pub mod signature;

pub use error::{ConfigError, RegistrationError, Result, RuntimeError};
pub use function::{FunctionBody, FunctionDefinition, NativeFunction};
pub use id::{RuntimeId, fnv1a};
pub use library::Library;
pub use params::RuntimeParams;
pub use property::PropertyName;
pub use runtime::{PerfStats, Runtime};
pub use signature::{CallPart, FunctionSignature, PartKind, SignaturePart, Visibility};
