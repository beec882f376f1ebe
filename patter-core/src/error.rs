// patter-core - Error types for the Patter runtime
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Error types shared across the runtime, the virtual machine, and native
//! callbacks.
//!
//! # Examples
//!
//! ```
//! use patter_core::RuntimeError;
//!
//! let err = RuntimeError::UnknownVariable("score".into());
//! assert_eq!(err.to_string(), "Unknown variable: score");
//!
//! let err = RuntimeError::native("bad argument");
//! assert!(err.to_string().contains("bad argument"));
//! ```

use std::fmt;

use patter_lang::{ReadError, VariantError};

use crate::id::RuntimeId;

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors raised while executing a script or manipulating runtime state.
///
/// Once a script raises one of these, it transitions to the errored state
/// and executes no further instructions; the host retrieves the error from
/// the script.
#[derive(Debug, Clone)]
pub enum RuntimeError {
    /// Operand types do not fit the operation.
    TypeMismatch {
        operation: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    /// Integer division or modulo by zero.
    DivideByZero,
    /// The value cannot be converted to the requested type.
    InvalidCast {
        from: &'static str,
        to: &'static str,
    },
    /// The values cannot be ordered relative to each other.
    NotComparable {
        lhs: &'static str,
        rhs: &'static str,
    },
    /// A variable was read or erased that does not exist in scope.
    UnknownVariable(String),
    /// No function is registered under this id.
    UnknownFunction(RuntimeId),
    /// No property is registered under this id.
    UnknownProperty(RuntimeId),
    /// A subscript or iteration was applied to a non-collection.
    NotACollection {
        context: &'static str,
        got: &'static str,
    },
    /// A write, erase, increment, or decrement hit a readonly property.
    ReadOnlyProperty(String),
    /// The operand stack was popped while empty.
    StackUnderflow,
    /// The operand stack exceeded the configured limit.
    StackOverflow(usize),
    /// The call stack exceeded the configured limit.
    CallDepthExceeded(usize),
    /// An undecodable opcode byte was encountered.
    InvalidOpcode { byte: u8, offset: usize },
    /// The bytecode stream was truncated or inconsistent.
    MalformedBytecode(String),
    /// The value's type has no serialized form.
    NotSerializable(&'static str),
    /// An error reported by a native (host) function.
    Native(String),
    /// Invariant violation inside the virtual machine.
    Internal(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::TypeMismatch {
                operation,
                lhs,
                rhs,
            } => write!(f, "Cannot {} {} and {}", operation, lhs, rhs),
            RuntimeError::DivideByZero => write!(f, "Division by zero"),
            RuntimeError::InvalidCast { from, to } => {
                write!(f, "Cannot cast {} to {}", from, to)
            }
            RuntimeError::NotComparable { lhs, rhs } => {
                write!(f, "Cannot order {} against {}", lhs, rhs)
            }
            RuntimeError::UnknownVariable(name) => write!(f, "Unknown variable: {}", name),
            RuntimeError::UnknownFunction(id) => {
                write!(f, "No function registered with id {:#018x}", id)
            }
            RuntimeError::UnknownProperty(id) => {
                write!(f, "No property registered with id {:#018x}", id)
            }
            RuntimeError::NotACollection { context, got } => {
                write!(f, "{} requires a collection, got {}", context, got)
            }
            RuntimeError::ReadOnlyProperty(name) => {
                write!(f, "Property '{}' is readonly", name)
            }
            RuntimeError::StackUnderflow => write!(f, "Operand stack underflow"),
            RuntimeError::StackOverflow(limit) => {
                write!(f, "Operand stack exceeded {} values", limit)
            }
            RuntimeError::CallDepthExceeded(limit) => {
                write!(f, "Call depth exceeded {} frames", limit)
            }
            RuntimeError::InvalidOpcode { byte, offset } => {
                write!(f, "Invalid opcode {:#04x} at offset {}", byte, offset)
            }
            RuntimeError::MalformedBytecode(msg) => write!(f, "Malformed bytecode: {}", msg),
            RuntimeError::NotSerializable(t) => {
                write!(f, "Values of type {} cannot be serialized", t)
            }
            RuntimeError::Native(msg) => write!(f, "Native function error: {}", msg),
            RuntimeError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl RuntimeError {
    /// Create an error for a native callback to report back to the script.
    pub fn native(message: impl Into<String>) -> Self {
        RuntimeError::Native(message.into())
    }

    /// Create an internal invariant-violation error.
    pub fn internal(message: impl Into<String>) -> Self {
        RuntimeError::Internal(message.into())
    }
}

impl From<VariantError> for RuntimeError {
    fn from(e: VariantError) -> Self {
        match e {
            VariantError::TypeMismatch {
                operation,
                lhs,
                rhs,
            } => RuntimeError::TypeMismatch {
                operation,
                lhs,
                rhs,
            },
            VariantError::DivideByZero => RuntimeError::DivideByZero,
            VariantError::InvalidCast { from, to } => RuntimeError::InvalidCast { from, to },
            VariantError::NotComparable { lhs, rhs } => RuntimeError::NotComparable { lhs, rhs },
            VariantError::NotSerializable(t) => RuntimeError::NotSerializable(t),
            VariantError::Malformed(msg) => RuntimeError::MalformedBytecode(msg),
        }
    }
}

impl From<ReadError> for RuntimeError {
    fn from(e: ReadError) -> Self {
        RuntimeError::MalformedBytecode(e.to_string())
    }
}

/// Errors raised while validating [`crate::RuntimeParams`].
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// The stack and call-depth limits must both be non-zero; supplying
    /// only part of the execution-limit pair is rejected.
    InvalidExecutionLimits,
    /// The allocator block-size hint must be non-zero.
    InvalidBlockSize,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidExecutionLimits => {
                write!(
                    f,
                    "max_operand_stack and max_call_depth must both be non-zero"
                )
            }
            ConfigError::InvalidBlockSize => {
                write!(f, "allocator_block_size must be non-zero")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors raised while registering host functions and properties.
#[derive(Debug, Clone)]
pub enum RegistrationError {
    /// The signature text did not parse or is not a valid signature.
    InvalidSignature(String),
    /// A function with the same canonical signature already exists.
    DuplicateFunction(String),
    /// A property with the same name already exists in the library.
    DuplicateProperty(String),
    /// The owning runtime has been dropped.
    RuntimeUnavailable,
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::InvalidSignature(msg) => {
                write!(f, "Invalid function signature: {}", msg)
            }
            RegistrationError::DuplicateFunction(sig) => {
                write!(f, "Function already registered: {}", sig)
            }
            RegistrationError::DuplicateProperty(name) => {
                write!(f, "Property already registered: {}", name)
            }
            RegistrationError::RuntimeUnavailable => {
                write!(f, "The owning runtime no longer exists")
            }
        }
    }
}

impl std::error::Error for RegistrationError {}
