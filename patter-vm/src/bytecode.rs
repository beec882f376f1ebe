// patter-vm - Bytecode container and header
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The compiled bytecode container and its file header.
//!
//! Layout (all little-endian):
//!
//! ```text
//! magic(4) | version(u16) | flags(u16) | reserved(8)
//! <opcode(u8)> <operands…> repeated until Exit
//! ```

use std::sync::Arc;

use patter_lang::{BinaryReader, BinaryWriter, ReadError, ReadResult};

/// Magic bytes identifying a Patter bytecode buffer.
pub const BYTECODE_MAGIC: [u8; 4] = *b"PTBC";

/// Current bytecode format version.
pub const BYTECODE_VERSION: u16 = 1;

/// Total header size in bytes.
pub const HEADER_SIZE: usize = 16;

/// The fixed-size header at the front of every bytecode buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BytecodeHeader {
    pub version: u16,
    pub flags: u16,
}

impl Default for BytecodeHeader {
    fn default() -> Self {
        BytecodeHeader {
            version: BYTECODE_VERSION,
            flags: 0,
        }
    }
}

impl BytecodeHeader {
    /// Write the header at the writer's current position.
    pub fn write(&self, writer: &mut BinaryWriter) {
        writer.write_bytes(&BYTECODE_MAGIC);
        writer.write_u16(self.version);
        writer.write_u16(self.flags);
        writer.write_bytes(&[0u8; 8]);
    }

    /// Read and validate a header.
    pub fn read(reader: &mut BinaryReader<'_>) -> ReadResult<BytecodeHeader> {
        let offset = reader.tell();
        let magic = reader.read_bytes(4)?;
        if magic != BYTECODE_MAGIC {
            return Err(ReadError::new(offset, "not a Patter bytecode buffer"));
        }
        let version = reader.read_u16()?;
        if version != BYTECODE_VERSION {
            return Err(ReadError::new(
                offset,
                format!("unsupported bytecode version {}", version),
            ));
        }
        let flags = reader.read_u16()?;
        reader.read_bytes(8)?;
        Ok(BytecodeHeader { version, flags })
    }
}

/// A compiled bytecode buffer, shared between scripts and the function
/// definitions registered out of it.
#[derive(Debug, Clone)]
pub struct Bytecode {
    buffer: Arc<Vec<u8>>,
}

impl Bytecode {
    /// Wrap a compiled buffer.
    pub fn new(data: Vec<u8>) -> Self {
        Bytecode {
            buffer: Arc::new(data),
        }
    }

    /// Wrap an already-shared buffer, as used when a call enters a
    /// function compiled in another script.
    pub fn from_shared(buffer: Arc<Vec<u8>>) -> Self {
        Bytecode { buffer }
    }

    /// The raw bytes, header included.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// The shared buffer handle.
    pub fn buffer(&self) -> &Arc<Vec<u8>> {
        &self.buffer
    }

    /// Total size in bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer is empty (never true for compiled output).
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Validate the header and return it.
    pub fn header(&self) -> ReadResult<BytecodeHeader> {
        BytecodeHeader::read(&mut BinaryReader::new(&self.buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let mut w = BinaryWriter::new();
        BytecodeHeader::default().write(&mut w);
        let data = w.into_inner();
        assert_eq!(data.len(), HEADER_SIZE);

        let header = BytecodeHeader::read(&mut BinaryReader::new(&data)).unwrap();
        assert_eq!(header, BytecodeHeader::default());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let data = b"NOPE\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00".to_vec();
        assert!(BytecodeHeader::read(&mut BinaryReader::new(&data)).is_err());
    }

    #[test]
    fn test_bad_version_rejected() {
        let mut w = BinaryWriter::new();
        let header = BytecodeHeader {
            version: 999,
            flags: 0,
        };
        header.write(&mut w);
        let data = w.into_inner();
        assert!(BytecodeHeader::read(&mut BinaryReader::new(&data)).is_err());
    }
}
