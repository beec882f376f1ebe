// patter-lang - Value model, lexer, and binary buffers for the Patter scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # patter-lang
//!
//! The foundation layer of the Patter scripting language: the universal
//! tagged value [`Variant`], reference-shared insertion-ordered
//! [`Collection`]s, the little-endian [`BinaryWriter`]/[`BinaryReader`]
//! pair used for bytecode and value serialization, and the [`Lexer`] that
//! turns source text into a stream of [`Symbol`]s.
//!
//! Higher layers (the runtime registry, the compiler, and the virtual
//! machine) are built on top of this crate and never reach around it.
//!
//! ```
//! use patter_lang::{Lexer, SymbolKind, Variant};
//!
//! let symbols = Lexer::new("set x to 42").tokenize().unwrap();
//! assert_eq!(symbols[0].kind, SymbolKind::Set);
//! assert_eq!(symbols[2].kind, SymbolKind::To);
//!
//! let v = Variant::Integer(42);
//! assert!(v.is_true());
//! ```

pub mod buffer;
pub mod collection;
pub mod lexer;
pub mod symbol;
pub mod variant;

pub use buffer::{BinaryReader, BinaryWriter, ReadError, ReadResult};
pub use collection::{Collection, CollectionIter};
pub use lexer::{LexError, Lexer};
pub use symbol::{Literal, Symbol, SymbolKind};
pub use variant::{ValueType, Variant, VariantError};

// Re-exported so downstream crates name guids through this crate.
pub use uuid::Uuid;
