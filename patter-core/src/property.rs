// patter-core - Property names
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Property names: runtime-addressable, library-owned value slots.
//!
//! A property is a named `Variant` owned by the runtime and shared across
//! scripts, unlike a variable, which is local to a script's frame. The
//! name record carries visibility and the readonly flag; the id is hashed
//! from the owning library and the name, so it is stable across runs.

use std::fmt;

use patter_lang::{BinaryReader, BinaryWriter, ReadError, ReadResult};

use crate::id::{RuntimeId, fnv1a};
use crate::signature::Visibility;

/// A registered property name.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyName {
    visibility: Visibility,
    read_only: bool,
    library: String,
    name: String,
    id: RuntimeId,
}

impl PropertyName {
    /// Create a property name; the id is derived from `(library, name)`.
    pub fn new(
        visibility: Visibility,
        read_only: bool,
        library: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let library = library.into();
        let name = name.into();
        let id = Self::compute_id(&library, &name);
        PropertyName {
            visibility,
            read_only,
            library,
            name,
            id,
        }
    }

    fn compute_id(library: &str, name: &str) -> RuntimeId {
        let canonical = format!("{};{}", library, name);
        fnv1a(canonical.as_bytes())
    }

    pub fn id(&self) -> RuntimeId {
        self.id
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of whitespace-separated words in the name. Libraries track
    /// the maximum across their properties to bound multi-word lookups.
    pub fn word_count(&self) -> usize {
        self.name.split(' ').filter(|w| !w.is_empty()).count()
    }

    /// Serialize into a bytecode stream.
    pub fn write(&self, writer: &mut BinaryWriter) {
        writer.write_u8(self.visibility.to_byte());
        writer.write_u8(u8::from(self.read_only));
        writer.write_str(&self.library);
        writer.write_str(&self.name);
    }

    /// Deserialize from a bytecode stream.
    pub fn read(reader: &mut BinaryReader<'_>) -> ReadResult<PropertyName> {
        let offset = reader.tell();
        let visibility = Visibility::from_byte(reader.read_u8()?)
            .ok_or_else(|| ReadError::new(offset, "invalid visibility byte"))?;
        let read_only = reader.read_u8()? != 0;
        let library = reader.read_str()?;
        let name = reader.read_str()?;
        Ok(PropertyName::new(visibility, read_only, library, name))
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.library.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} {}", self.library, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_stability() {
        let a = PropertyName::new(Visibility::Public, false, "game", "high score");
        let b = PropertyName::new(Visibility::Private, true, "game", "high score");
        // Only library and name contribute to the id.
        assert_eq!(a.id(), b.id());
        let c = PropertyName::new(Visibility::Public, false, "other", "high score");
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_word_count() {
        assert_eq!(
            PropertyName::new(Visibility::Public, false, "g", "x").word_count(),
            1
        );
        assert_eq!(
            PropertyName::new(Visibility::Public, false, "g", "time of day").word_count(),
            3
        );
    }

    #[test]
    fn test_serialization_round_trip() {
        let p = PropertyName::new(Visibility::Private, true, "game", "max players");
        let mut w = BinaryWriter::new();
        p.write(&mut w);
        let data = w.into_inner();
        let restored = PropertyName::read(&mut BinaryReader::new(&data)).unwrap();
        assert_eq!(restored, p);
        assert_eq!(restored.id(), p.id());
        assert!(restored.is_read_only());
    }
}
