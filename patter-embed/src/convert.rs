// patter-embed - Rust / Variant conversions
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Conversions between Rust values and [`Variant`]s.
//!
//! `IntoVariant` is infallible; `FromVariant` fails with a runtime type
//! error when the variant does not fit, which native functions can return
//! to the calling script directly.

use patter_core::RuntimeError;
use patter_lang::{Collection, Uuid, Variant};

/// Convert a Rust value into a [`Variant`].
pub trait IntoVariant {
    fn into_variant(self) -> Variant;
}

/// Convert a [`Variant`] into a Rust value.
pub trait FromVariant: Sized {
    fn from_variant(value: &Variant) -> Result<Self, RuntimeError>;
}

fn type_error(expected: &'static str, got: &Variant) -> RuntimeError {
    RuntimeError::TypeMismatch {
        operation: "convert",
        lhs: expected,
        rhs: got.type_name(),
    }
}

impl IntoVariant for Variant {
    fn into_variant(self) -> Variant {
        self
    }
}

impl FromVariant for Variant {
    fn from_variant(value: &Variant) -> Result<Self, RuntimeError> {
        Ok(value.clone())
    }
}

impl IntoVariant for i64 {
    fn into_variant(self) -> Variant {
        Variant::Integer(self)
    }
}

impl FromVariant for i64 {
    fn from_variant(value: &Variant) -> Result<Self, RuntimeError> {
        match value {
            Variant::Integer(n) => Ok(*n),
            _ => Err(type_error("integer", value)),
        }
    }
}

impl IntoVariant for i32 {
    fn into_variant(self) -> Variant {
        Variant::Integer(self as i64)
    }
}

impl IntoVariant for f64 {
    fn into_variant(self) -> Variant {
        Variant::Number(self)
    }
}

impl FromVariant for f64 {
    fn from_variant(value: &Variant) -> Result<Self, RuntimeError> {
        match value {
            Variant::Number(n) => Ok(*n),
            Variant::Integer(n) => Ok(*n as f64),
            _ => Err(type_error("number", value)),
        }
    }
}

impl IntoVariant for bool {
    fn into_variant(self) -> Variant {
        Variant::Boolean(self)
    }
}

impl FromVariant for bool {
    fn from_variant(value: &Variant) -> Result<Self, RuntimeError> {
        match value {
            Variant::Boolean(b) => Ok(*b),
            _ => Err(type_error("boolean", value)),
        }
    }
}

impl IntoVariant for String {
    fn into_variant(self) -> Variant {
        Variant::String(self)
    }
}

impl IntoVariant for &str {
    fn into_variant(self) -> Variant {
        Variant::String(self.to_string())
    }
}

impl FromVariant for String {
    fn from_variant(value: &Variant) -> Result<Self, RuntimeError> {
        match value {
            Variant::String(s) => Ok(s.clone()),
            _ => Err(type_error("string", value)),
        }
    }
}

impl IntoVariant for Uuid {
    fn into_variant(self) -> Variant {
        Variant::Guid(self)
    }
}

impl FromVariant for Uuid {
    fn from_variant(value: &Variant) -> Result<Self, RuntimeError> {
        match value {
            Variant::Guid(g) => Ok(*g),
            _ => Err(type_error("guid", value)),
        }
    }
}

impl<T: IntoVariant> IntoVariant for Option<T> {
    fn into_variant(self) -> Variant {
        match self {
            Some(v) => v.into_variant(),
            None => Variant::Null,
        }
    }
}

impl<T: FromVariant> FromVariant for Option<T> {
    fn from_variant(value: &Variant) -> Result<Self, RuntimeError> {
        match value {
            Variant::Null => Ok(None),
            other => T::from_variant(other).map(Some),
        }
    }
}

/// A `Vec` becomes a collection with integer keys counting from one, the
/// same shape a script list literal produces.
impl<T: IntoVariant> IntoVariant for Vec<T> {
    fn into_variant(self) -> Variant {
        let pairs = self
            .into_iter()
            .enumerate()
            .map(|(i, v)| (Variant::Integer(i as i64 + 1), v.into_variant()));
        Variant::Collection(Collection::from_pairs(pairs))
    }
}

impl<T: FromVariant> FromVariant for Vec<T> {
    fn from_variant(value: &Variant) -> Result<Self, RuntimeError> {
        match value.as_collection() {
            Some(collection) => collection
                .snapshot()
                .iter()
                .map(|(_, v)| T::from_variant(v))
                .collect(),
            None => Err(type_error("collection", value)),
        }
    }
}
