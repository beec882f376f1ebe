// patter-core - Function definitions
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Function definitions: what a [`crate::RuntimeId`] resolves to at call
//! time.
//!
//! A definition pairs a signature with a body, which is either an offset
//! into a shared bytecode buffer (script-defined functions) or a native
//! host callback.

use std::fmt;
use std::sync::Arc;

use patter_lang::Variant;

use crate::error::Result;
use crate::signature::FunctionSignature;

/// A host-supplied function. Parameters arrive in declaration order; the
/// returned variant is pushed only when the signature declares a return.
pub type NativeFunction = Arc<dyn Fn(&[Variant]) -> Result<Variant> + Send + Sync>;

/// The body of a registered function.
#[derive(Clone)]
pub enum FunctionBody {
    /// Bytecode at an offset into a shared buffer.
    Bytecode {
        buffer: Arc<Vec<u8>>,
        offset: usize,
    },
    /// A native host callback.
    Native(NativeFunction),
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionBody::Bytecode { offset, .. } => {
                write!(f, "Bytecode {{ offset: {} }}", offset)
            }
            FunctionBody::Native(_) => write!(f, "Native"),
        }
    }
}

/// A registered function: signature plus body.
#[derive(Debug, Clone)]
pub struct FunctionDefinition {
    signature: FunctionSignature,
    body: FunctionBody,
}

impl FunctionDefinition {
    /// A definition backed by bytecode.
    pub fn bytecode(
        signature: FunctionSignature,
        buffer: Arc<Vec<u8>>,
        offset: usize,
    ) -> Self {
        FunctionDefinition {
            signature,
            body: FunctionBody::Bytecode { buffer, offset },
        }
    }

    /// A definition backed by a native callback.
    pub fn native(signature: FunctionSignature, callback: NativeFunction) -> Self {
        FunctionDefinition {
            signature,
            body: FunctionBody::Native(callback),
        }
    }

    pub fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    pub fn body(&self) -> &FunctionBody {
        &self.body
    }
}
