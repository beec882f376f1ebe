// patter-vm - Bytecode disassembler
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Renders a bytecode buffer opcode by opcode, driven by the per-opcode
//! operand layouts. Used by the `log_bytecode` runtime parameter and by
//! tests that assert on emitted instruction shapes.

use patter_core::{FunctionSignature, PropertyName};
use patter_lang::{BinaryReader, ReadError, ReadResult, ValueType, Variant};

use crate::bytecode::{Bytecode, BytecodeHeader};
use crate::opcode::Opcode;

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub offset: usize,
    pub opcode: Opcode,
    pub operands: String,
}

/// Decode a bytecode buffer into instructions.
pub fn decode(bytecode: &Bytecode) -> ReadResult<Vec<Instruction>> {
    let mut reader = BinaryReader::new(bytecode.as_slice());
    BytecodeHeader::read(&mut reader)?;

    let mut instructions = Vec::new();
    while !reader.at_end() {
        let offset = reader.tell();
        let byte = reader.read_u8()?;
        let opcode = Opcode::from_u8(byte)
            .ok_or_else(|| ReadError::new(offset, format!("invalid opcode {:#04x}", byte)))?;
        let operands = read_operands(opcode, &mut reader)?;
        instructions.push(Instruction {
            offset,
            opcode,
            operands,
        });
        if opcode == Opcode::Exit {
            break;
        }
    }
    Ok(instructions)
}

/// Render a bytecode buffer as a printable listing.
pub fn disassemble(bytecode: &Bytecode) -> ReadResult<String> {
    let mut listing = String::new();
    for instruction in decode(bytecode)? {
        listing.push_str(&format!(
            "{:06}  {:<16}{}\n",
            instruction.offset,
            instruction.opcode.name(),
            instruction.operands
        ));
    }
    Ok(listing)
}

fn read_operands(opcode: Opcode, reader: &mut BinaryReader<'_>) -> ReadResult<String> {
    let text = match opcode {
        Opcode::CallFunc
        | Opcode::EraseProp
        | Opcode::ErasePropElem
        | Opcode::PushProp
        | Opcode::PushPropKeyVal
        | Opcode::SetProp
        | Opcode::SetPropKeyVal => {
            format!("{:#018x}", reader.read_u64()?)
        }
        Opcode::Cast => {
            let byte = reader.read_u8()?;
            match ValueType::from_byte(byte) {
                Some(t) => t.name().to_string(),
                None => {
                    return Err(ReadError::new(
                        reader.tell(),
                        format!("invalid value type {}", byte),
                    ));
                }
            }
        }
        Opcode::EraseVar
        | Opcode::EraseVarElem
        | Opcode::Library
        | Opcode::PushVar
        | Opcode::PushVarKey
        | Opcode::SetVar
        | Opcode::SetVarKey => reader.read_str()?,
        Opcode::Function => {
            let signature = FunctionSignature::read(reader)?;
            signature.to_string()
        }
        Opcode::Property => {
            let property = PropertyName::read(reader)?;
            property.to_string()
        }
        Opcode::Jump
        | Opcode::JumpTrue
        | Opcode::JumpFalse
        | Opcode::PopCount
        | Opcode::PushColl
        | Opcode::PushList => {
            format!("{}", reader.read_u32()?)
        }
        Opcode::PushVal => {
            let value = Variant::read(reader)?;
            format!("{} ({})", value, value.type_name())
        }
        Opcode::SetIndex => {
            let name = reader.read_str()?;
            let index = reader.read_i32()?;
            let type_byte = reader.read_u8()?;
            let value_type = ValueType::from_byte(type_byte).ok_or_else(|| {
                ReadError::new(reader.tell(), format!("invalid value type {}", type_byte))
            })?;
            format!("{} {} {}", name, index, value_type.name())
        }
        _ => String::new(),
    };
    Ok(text)
}
