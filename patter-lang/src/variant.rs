// patter-lang - The Variant tagged value
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The universal tagged value for the Patter scripting language.
//!
//! `Variant` is the single value type flowing through the lexer, the
//! compiler, the operand stack, properties, and host callbacks. Scalars are
//! value-copied; collections are reference-shared (see
//! [`crate::collection`]).
//!
//! Numeric equality and ordering cross the `Integer`/`Number` boundary:
//! `Integer(2)` equals `Number(2.0)`, and the `Hash` implementation is kept
//! consistent with that.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use uuid::Uuid;

use crate::buffer::{BinaryReader, BinaryWriter, ReadError, ReadResult};
use crate::collection::{Collection, CollectionIter};

/// Serialization depth limit for nested collections, so that cyclic
/// collections fail instead of recursing forever.
const MAX_SERIALIZE_DEPTH: usize = 64;

// ============================================================================
// ValueType
// ============================================================================

/// First-class type tags. The byte values are part of the bytecode format.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    Null = 0,
    Number = 1,
    Integer = 2,
    Boolean = 3,
    String = 4,
    Collection = 5,
    Guid = 6,
    ValType = 7,
    Buffer = 8,
    Iterator = 9,
}

impl ValueType {
    /// Decode a serialized type tag.
    pub fn from_byte(byte: u8) -> Option<ValueType> {
        match byte {
            0 => Some(ValueType::Null),
            1 => Some(ValueType::Number),
            2 => Some(ValueType::Integer),
            3 => Some(ValueType::Boolean),
            4 => Some(ValueType::String),
            5 => Some(ValueType::Collection),
            6 => Some(ValueType::Guid),
            7 => Some(ValueType::ValType),
            8 => Some(ValueType::Buffer),
            9 => Some(ValueType::Iterator),
            _ => None,
        }
    }

    /// The serialized type tag.
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Human-readable type name, as used in scripts and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Number => "number",
            ValueType::Integer => "integer",
            ValueType::Boolean => "boolean",
            ValueType::String => "string",
            ValueType::Collection => "collection",
            ValueType::Guid => "guid",
            ValueType::ValType => "type",
            ValueType::Buffer => "buffer",
            ValueType::Iterator => "iterator",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// VariantError
// ============================================================================

/// Errors raised by value operations: arithmetic, comparison, casts, and
/// serialization.
#[derive(Debug, Clone)]
pub enum VariantError {
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
    /// The value's type has no serialized form.
    NotSerializable(&'static str),
    /// The values cannot be ordered relative to each other.
    NotComparable {
        lhs: &'static str,
        rhs: &'static str,
    },
    /// Malformed serialized data.
    Malformed(String),
}

impl fmt::Display for VariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantError::TypeMismatch {
                operation,
                lhs,
                rhs,
            } => write!(f, "Cannot {} {} and {}", operation, lhs, rhs),
            VariantError::DivideByZero => write!(f, "Division by zero"),
            VariantError::InvalidCast { from, to } => {
                write!(f, "Cannot cast {} to {}", from, to)
            }
            VariantError::NotSerializable(t) => {
                write!(f, "Values of type {} cannot be serialized", t)
            }
            VariantError::NotComparable { lhs, rhs } => {
                write!(f, "Cannot order {} against {}", lhs, rhs)
            }
            VariantError::Malformed(msg) => write!(f, "Malformed value data: {}", msg),
        }
    }
}

impl std::error::Error for VariantError {}

impl From<ReadError> for VariantError {
    fn from(e: ReadError) -> Self {
        VariantError::Malformed(e.to_string())
    }
}

/// Result type for value operations.
pub type VariantResult<T> = std::result::Result<T, VariantError>;

// ============================================================================
// Variant
// ============================================================================

/// The universal tagged value.
#[derive(Debug, Clone, Default)]
pub enum Variant {
    #[default]
    Null,
    Number(f64),
    Integer(i64),
    Boolean(bool),
    String(String),
    Collection(Collection),
    Guid(Uuid),
    ValType(ValueType),
    Buffer(Arc<Vec<u8>>),
    /// Collection cursor used by `loop … over`. Never serialized.
    Iterator(CollectionIter),
}

impl Variant {
    /// The type tag of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Variant::Null => ValueType::Null,
            Variant::Number(_) => ValueType::Number,
            Variant::Integer(_) => ValueType::Integer,
            Variant::Boolean(_) => ValueType::Boolean,
            Variant::String(_) => ValueType::String,
            Variant::Collection(_) => ValueType::Collection,
            Variant::Guid(_) => ValueType::Guid,
            Variant::ValType(_) => ValueType::ValType,
            Variant::Buffer(_) => ValueType::Buffer,
            Variant::Iterator(_) => ValueType::Iterator,
        }
    }

    /// Human-readable type name.
    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Variant::Collection(_))
    }

    /// The shared collection handle, if this is a collection.
    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Variant::Collection(c) => Some(c),
            _ => None,
        }
    }

    /// Truthiness: null, false, zero, the empty string, and the empty
    /// collection are false; everything else is true.
    pub fn is_true(&self) -> bool {
        match self {
            Variant::Null => false,
            Variant::Boolean(b) => *b,
            Variant::Integer(n) => *n != 0,
            Variant::Number(n) => *n != 0.0,
            Variant::String(s) => !s.is_empty(),
            Variant::Collection(c) => !c.is_empty(),
            _ => true,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Variant::Number(n) => Some(*n),
            Variant::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    // ------------------------------------------------------------------------
    // Arithmetic
    // ------------------------------------------------------------------------

    fn type_mismatch(&self, operation: &'static str, rhs: &Variant) -> VariantError {
        VariantError::TypeMismatch {
            operation,
            lhs: self.type_name(),
            rhs: rhs.type_name(),
        }
    }

    /// Addition, with Integer/Number promotion. If either operand is a
    /// string the other is rendered and the result is the concatenation,
    /// which is what string interpolation compiles down to.
    pub fn add(&self, rhs: &Variant) -> VariantResult<Variant> {
        match (self, rhs) {
            (Variant::Integer(a), Variant::Integer(b)) => {
                Ok(Variant::Integer(a.wrapping_add(*b)))
            }
            (Variant::String(a), b) => Ok(Variant::String(format!("{}{}", a, b))),
            (a, Variant::String(b)) => Ok(Variant::String(format!("{}{}", a, b))),
            _ => match (self.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => Ok(Variant::Number(a + b)),
                _ => Err(self.type_mismatch("add", rhs)),
            },
        }
    }

    pub fn subtract(&self, rhs: &Variant) -> VariantResult<Variant> {
        match (self, rhs) {
            (Variant::Integer(a), Variant::Integer(b)) => {
                Ok(Variant::Integer(a.wrapping_sub(*b)))
            }
            _ => match (self.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => Ok(Variant::Number(a - b)),
                _ => Err(self.type_mismatch("subtract", rhs)),
            },
        }
    }

    pub fn multiply(&self, rhs: &Variant) -> VariantResult<Variant> {
        match (self, rhs) {
            (Variant::Integer(a), Variant::Integer(b)) => {
                Ok(Variant::Integer(a.wrapping_mul(*b)))
            }
            _ => match (self.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => Ok(Variant::Number(a * b)),
                _ => Err(self.type_mismatch("multiply", rhs)),
            },
        }
    }

    pub fn divide(&self, rhs: &Variant) -> VariantResult<Variant> {
        match (self, rhs) {
            (Variant::Integer(_), Variant::Integer(0)) => Err(VariantError::DivideByZero),
            (Variant::Integer(a), Variant::Integer(b)) => Ok(Variant::Integer(a / b)),
            _ => match (self.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => Ok(Variant::Number(a / b)),
                _ => Err(self.type_mismatch("divide", rhs)),
            },
        }
    }

    pub fn modulo(&self, rhs: &Variant) -> VariantResult<Variant> {
        match (self, rhs) {
            (Variant::Integer(_), Variant::Integer(0)) => Err(VariantError::DivideByZero),
            (Variant::Integer(a), Variant::Integer(b)) => Ok(Variant::Integer(a % b)),
            _ => match (self.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => Ok(Variant::Number(a % b)),
                _ => Err(self.type_mismatch("modulo", rhs)),
            },
        }
    }

    // ------------------------------------------------------------------------
    // Comparison
    // ------------------------------------------------------------------------

    /// Relational comparison. Numbers compare across Integer/Number;
    /// strings compare lexicographically. Other combinations have no
    /// ordering.
    pub fn compare(&self, rhs: &Variant) -> VariantResult<std::cmp::Ordering> {
        if let (Some(a), Some(b)) = (self.as_f64(), rhs.as_f64()) {
            return a.partial_cmp(&b).ok_or(VariantError::NotComparable {
                lhs: self.type_name(),
                rhs: rhs.type_name(),
            });
        }
        match (self, rhs) {
            (Variant::String(a), Variant::String(b)) => Ok(a.cmp(b)),
            _ => Err(VariantError::NotComparable {
                lhs: self.type_name(),
                rhs: rhs.type_name(),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Casts
    // ------------------------------------------------------------------------

    fn invalid_cast(&self, to: ValueType) -> VariantError {
        VariantError::InvalidCast {
            from: self.type_name(),
            to: to.name(),
        }
    }

    /// Convert this value to the given type. Numeric casts truncate;
    /// string casts render or parse.
    pub fn cast(&self, target: ValueType) -> VariantResult<Variant> {
        if self.value_type() == target {
            return Ok(self.clone());
        }
        match target {
            ValueType::Number => match self {
                Variant::Integer(n) => Ok(Variant::Number(*n as f64)),
                Variant::Boolean(b) => Ok(Variant::Number(if *b { 1.0 } else { 0.0 })),
                Variant::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Variant::Number)
                    .map_err(|_| self.invalid_cast(target)),
                _ => Err(self.invalid_cast(target)),
            },
            ValueType::Integer => match self {
                Variant::Number(n) => Ok(Variant::Integer(*n as i64)),
                Variant::Boolean(b) => Ok(Variant::Integer(if *b { 1 } else { 0 })),
                Variant::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Variant::Integer)
                    .map_err(|_| self.invalid_cast(target)),
                _ => Err(self.invalid_cast(target)),
            },
            ValueType::Boolean => match self {
                Variant::Integer(n) => Ok(Variant::Boolean(*n != 0)),
                Variant::Number(n) => Ok(Variant::Boolean(*n != 0.0)),
                Variant::String(s) => match s.trim().to_lowercase().as_str() {
                    "true" => Ok(Variant::Boolean(true)),
                    "false" => Ok(Variant::Boolean(false)),
                    _ => Err(self.invalid_cast(target)),
                },
                _ => Err(self.invalid_cast(target)),
            },
            ValueType::String => match self {
                Variant::Buffer(_) | Variant::Iterator(_) => Err(self.invalid_cast(target)),
                _ => Ok(Variant::String(self.to_string())),
            },
            ValueType::Guid => match self {
                Variant::String(s) => Uuid::parse_str(s.trim())
                    .map(Variant::Guid)
                    .map_err(|_| self.invalid_cast(target)),
                _ => Err(self.invalid_cast(target)),
            },
            _ => Err(self.invalid_cast(target)),
        }
    }

    // ------------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------------

    /// Serialize this value: one type-tag byte followed by the payload.
    /// Buffers and iterators have no serialized form.
    pub fn write(&self, writer: &mut BinaryWriter) -> VariantResult<()> {
        self.write_depth(writer, 0)
    }

    fn write_depth(&self, writer: &mut BinaryWriter, depth: usize) -> VariantResult<()> {
        if depth > MAX_SERIALIZE_DEPTH {
            return Err(VariantError::Malformed(
                "collection nesting exceeds serialization depth".into(),
            ));
        }
        writer.write_u8(self.value_type().to_byte());
        match self {
            Variant::Null => {}
            Variant::Number(n) => writer.write_f64(*n),
            Variant::Integer(n) => writer.write_i64(*n),
            Variant::Boolean(b) => writer.write_u8(u8::from(*b)),
            Variant::String(s) => writer.write_str(s),
            Variant::Collection(c) => {
                let entries = c.snapshot();
                writer.write_u32(entries.len() as u32);
                for (key, value) in entries {
                    key.write_depth(writer, depth + 1)?;
                    value.write_depth(writer, depth + 1)?;
                }
            }
            Variant::Guid(g) => writer.write_bytes(g.as_bytes()),
            Variant::ValType(t) => writer.write_u8(t.to_byte()),
            Variant::Buffer(_) | Variant::Iterator(_) => {
                return Err(VariantError::NotSerializable(self.type_name()));
            }
        }
        Ok(())
    }

    /// Deserialize a value written by [`Variant::write`].
    pub fn read(reader: &mut BinaryReader<'_>) -> ReadResult<Variant> {
        let offset = reader.tell();
        let tag = reader.read_u8()?;
        let value_type = ValueType::from_byte(tag)
            .ok_or_else(|| ReadError::new(offset, format!("unknown value type tag {}", tag)))?;
        match value_type {
            ValueType::Null => Ok(Variant::Null),
            ValueType::Number => Ok(Variant::Number(reader.read_f64()?)),
            ValueType::Integer => Ok(Variant::Integer(reader.read_i64()?)),
            ValueType::Boolean => Ok(Variant::Boolean(reader.read_u8()? != 0)),
            ValueType::String => Ok(Variant::String(reader.read_str()?)),
            ValueType::Collection => {
                let count = reader.read_u32()? as usize;
                let mut pairs = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = Variant::read(reader)?;
                    let value = Variant::read(reader)?;
                    pairs.push((key, value));
                }
                Ok(Variant::Collection(Collection::from_pairs(pairs)))
            }
            ValueType::Guid => {
                let bytes = reader.read_bytes(16)?;
                let mut raw = [0u8; 16];
                raw.copy_from_slice(bytes);
                Ok(Variant::Guid(Uuid::from_bytes(raw)))
            }
            ValueType::ValType => {
                let b = reader.read_u8()?;
                let t = ValueType::from_byte(b).ok_or_else(|| {
                    ReadError::new(offset, format!("unknown value type tag {}", b))
                })?;
                Ok(Variant::ValType(t))
            }
            ValueType::Buffer | ValueType::Iterator => Err(ReadError::new(
                offset,
                format!("type {} has no serialized form", value_type.name()),
            )),
        }
    }
}

// ============================================================================
// Equality and hashing
// ============================================================================

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Variant::Null, Variant::Null) => true,
            (Variant::Boolean(a), Variant::Boolean(b)) => a == b,
            (Variant::String(a), Variant::String(b)) => a == b,
            (Variant::Collection(a), Variant::Collection(b)) => a == b,
            (Variant::Guid(a), Variant::Guid(b)) => a == b,
            (Variant::ValType(a), Variant::ValType(b)) => a == b,
            (Variant::Buffer(a), Variant::Buffer(b)) => Arc::ptr_eq(a, b),
            (Variant::Iterator(a), Variant::Iterator(b)) => a == b,
            // Numeric equality crosses the Integer/Number boundary. NaN is
            // equal to itself so that Eq stays reflexive for map keys.
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b || (a.is_nan() && b.is_nan()),
                _ => false,
            },
        }
    }
}

impl Eq for Variant {}

impl Hash for Variant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Variant::Null => state.write_u8(0),
            // Integers and integral floats must hash alike because they
            // compare equal.
            Variant::Integer(n) => {
                state.write_u8(1);
                state.write_i64(*n);
            }
            Variant::Number(n) => {
                state.write_u8(1);
                if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n < i64::MAX as f64 {
                    state.write_i64(*n as i64);
                } else if n.is_nan() {
                    state.write_u64(f64::NAN.to_bits());
                } else {
                    state.write_u64(n.to_bits());
                }
            }
            Variant::Boolean(b) => {
                state.write_u8(2);
                b.hash(state);
            }
            Variant::String(s) => {
                state.write_u8(3);
                s.hash(state);
            }
            Variant::Collection(c) => {
                state.write_u8(4);
                c.hash(state);
            }
            Variant::Guid(g) => {
                state.write_u8(5);
                g.hash(state);
            }
            Variant::ValType(t) => {
                state.write_u8(6);
                t.hash(state);
            }
            Variant::Buffer(b) => {
                state.write_u8(7);
                (Arc::as_ptr(b) as usize).hash(state);
            }
            Variant::Iterator(i) => {
                state.write_u8(8);
                i.hash(state);
            }
        }
    }
}

// ============================================================================
// Display and conversions
// ============================================================================

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Null => write!(f, "null"),
            Variant::Number(n) => write!(f, "{}", n),
            Variant::Integer(n) => write!(f, "{}", n),
            Variant::Boolean(b) => write!(f, "{}", b),
            Variant::String(s) => write!(f, "{}", s),
            Variant::Collection(c) => {
                write!(f, "[")?;
                for (i, (key, value)) in c.snapshot().into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "]")
            }
            Variant::Guid(g) => write!(f, "{}", g),
            Variant::ValType(t) => write!(f, "{}", t),
            Variant::Buffer(b) => write!(f, "#<buffer {} bytes>", b.len()),
            Variant::Iterator(_) => write!(f, "#<iterator>"),
        }
    }
}

impl From<f64> for Variant {
    fn from(n: f64) -> Self {
        Variant::Number(n)
    }
}

impl From<i64> for Variant {
    fn from(n: i64) -> Self {
        Variant::Integer(n)
    }
}

impl From<i32> for Variant {
    fn from(n: i32) -> Self {
        Variant::Integer(n as i64)
    }
}

impl From<bool> for Variant {
    fn from(b: bool) -> Self {
        Variant::Boolean(b)
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Variant::String(s.to_string())
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Self {
        Variant::String(s)
    }
}

impl From<Collection> for Variant {
    fn from(c: Collection) -> Self {
        Variant::Collection(c)
    }
}

impl From<Uuid> for Variant {
    fn from(g: Uuid) -> Self {
        Variant::Guid(g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(v: &Variant) -> u64 {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    }

    fn round_trip(v: &Variant) -> Variant {
        let mut w = BinaryWriter::new();
        v.write(&mut w).unwrap();
        let data = w.into_inner();
        Variant::read(&mut BinaryReader::new(&data)).unwrap()
    }

    #[test]
    fn test_numeric_equality_crosses_types() {
        assert_eq!(Variant::Integer(2), Variant::Number(2.0));
        assert_ne!(Variant::Integer(2), Variant::Number(2.5));
        assert_eq!(hash_of(&Variant::Integer(2)), hash_of(&Variant::Number(2.0)));
    }

    #[test]
    fn test_add_promotion() {
        assert_eq!(
            Variant::Integer(2).add(&Variant::Integer(3)).unwrap(),
            Variant::Integer(5)
        );
        assert_eq!(
            Variant::Integer(2).add(&Variant::Number(0.5)).unwrap(),
            Variant::Number(2.5)
        );
    }

    #[test]
    fn test_string_concat() {
        assert_eq!(
            Variant::from("x = ").add(&Variant::Integer(5)).unwrap(),
            Variant::from("x = 5")
        );
        assert_eq!(
            Variant::Integer(5).add(&Variant::from(" apples")).unwrap(),
            Variant::from("5 apples")
        );
    }

    #[test]
    fn test_integer_divide_by_zero() {
        assert!(matches!(
            Variant::Integer(1).divide(&Variant::Integer(0)),
            Err(VariantError::DivideByZero)
        ));
        assert!(matches!(
            Variant::Integer(1).modulo(&Variant::Integer(0)),
            Err(VariantError::DivideByZero)
        ));
    }

    #[test]
    fn test_add_type_mismatch() {
        assert!(Variant::Boolean(true).add(&Variant::Integer(1)).is_err());
        assert!(Variant::Null.add(&Variant::Integer(1)).is_err());
    }

    #[test]
    fn test_compare() {
        assert_eq!(
            Variant::Integer(1).compare(&Variant::Number(1.5)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            Variant::from("abc").compare(&Variant::from("abd")).unwrap(),
            Ordering::Less
        );
        assert!(Variant::Boolean(true).compare(&Variant::Boolean(false)).is_err());
        assert!(Variant::Null.compare(&Variant::Integer(1)).is_err());
    }

    #[test]
    fn test_truthiness() {
        assert!(!Variant::Null.is_true());
        assert!(!Variant::Integer(0).is_true());
        assert!(!Variant::from("").is_true());
        assert!(!Variant::Collection(Collection::new()).is_true());
        assert!(Variant::Integer(-1).is_true());
        assert!(Variant::from("x").is_true());
    }

    #[test]
    fn test_casts() {
        assert_eq!(
            Variant::Number(3.9).cast(ValueType::Integer).unwrap(),
            Variant::Integer(3)
        );
        assert_eq!(
            Variant::from("42").cast(ValueType::Integer).unwrap(),
            Variant::Integer(42)
        );
        assert_eq!(
            Variant::Integer(42).cast(ValueType::String).unwrap(),
            Variant::from("42")
        );
        assert_eq!(
            Variant::from("true").cast(ValueType::Boolean).unwrap(),
            Variant::Boolean(true)
        );
        assert!(Variant::from("not a number").cast(ValueType::Integer).is_err());
        assert!(Variant::Null.cast(ValueType::Collection).is_err());
    }

    #[test]
    fn test_round_trip_scalars() {
        for v in [
            Variant::Null,
            Variant::Number(-12.75),
            Variant::Integer(i64::MIN),
            Variant::Boolean(true),
            Variant::from("héllo"),
            Variant::Guid(Uuid::from_u128(0x0123_4567_89AB_CDEF_0123_4567_89AB_CDEF)),
            Variant::ValType(ValueType::Collection),
        ] {
            assert_eq!(round_trip(&v), v);
        }
    }

    #[test]
    fn test_round_trip_collection_preserves_order() {
        let coll = Collection::from_pairs(vec![
            (Variant::Integer(2), Variant::from("b")),
            (Variant::Integer(1), Variant::from("a")),
        ]);
        let restored = round_trip(&Variant::Collection(coll));
        let inner = restored.as_collection().unwrap();
        let keys: Vec<Variant> = inner.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![Variant::Integer(2), Variant::Integer(1)]);
    }

    #[test]
    fn test_buffer_not_serializable() {
        let mut w = BinaryWriter::new();
        let v = Variant::Buffer(Arc::new(vec![1, 2, 3]));
        assert!(matches!(
            v.write(&mut w),
            Err(VariantError::NotSerializable(_))
        ));
    }

    #[test]
    fn test_cyclic_collection_serialization_fails() {
        let coll = Collection::new();
        coll.insert(Variant::from("me"), Variant::Collection(coll.clone()));
        let mut w = BinaryWriter::new();
        assert!(Variant::Collection(coll).write(&mut w).is_err());
    }
}
