// patter-embed - Error type for the embedding API
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The embedding API's error type, folding the layer-specific errors into
//! one enum so hosts handle a single `Result`.

use std::fmt;

use patter_core::{ConfigError, RegistrationError, RuntimeError};
use patter_vm::CompileError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure surfaced through the embedding API.
#[derive(Debug)]
pub enum Error {
    /// The source failed to lex or parse.
    Compile(CompileError),
    /// Script execution or a runtime table operation failed.
    Runtime(RuntimeError),
    /// Invalid runtime parameters.
    Config(ConfigError),
    /// A host registration was rejected.
    Registration(RegistrationError),
    /// A referenced property does not exist.
    UnknownProperty { library: String, name: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Compile(e) => write!(f, "{}", e),
            Error::Runtime(e) => write!(f, "{}", e),
            Error::Config(e) => write!(f, "{}", e),
            Error::Registration(e) => write!(f, "{}", e),
            Error::UnknownProperty { library, name } => {
                write!(f, "No property '{}' in library '{}'", name, library)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Self {
        Error::Compile(e)
    }
}

impl From<RuntimeError> for Error {
    fn from(e: RuntimeError) -> Self {
        Error::Runtime(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<RegistrationError> for Error {
    fn from(e: RegistrationError) -> Self {
        Error::Registration(e)
    }
}
