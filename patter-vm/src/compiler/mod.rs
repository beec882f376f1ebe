// patter-vm - Single-pass bytecode compiler
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The single-pass recursive-descent compiler.
//!
//! The compiler consumes the lexer's symbol stream and writes bytecode
//! directly; there is no AST. Jump targets that are not yet known are
//! written as placeholders and back-filled once parsing reaches them, so
//! no forward reference survives compilation.
//!
//! Error handling is sticky: the first error records its position and
//! message, and every subsequent `accept`/`expect`/`check` returns false,
//! letting the recursive descent unwind without cascading reports.

mod expressions;
mod frames;
mod functions;
mod statements;

pub use frames::VariableFrames;

use std::fmt;
use std::sync::Arc;

use patter_core::{FunctionSignature, Runtime, Visibility};
use patter_lang::{BinaryWriter, LexError, Literal, Symbol, SymbolKind, ValueType, Variant};

use crate::bytecode::{Bytecode, BytecodeHeader};
use crate::opcode::Opcode;

/// Compile-time error with source position.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at {}:{}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

/// A compilation failure: either the lexer or the parser rejected the
/// source.
#[derive(Debug, Clone)]
pub enum CompileError {
    Lex(LexError),
    Parse(ParseError),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lex(e) => write!(f, "{}", e),
            CompileError::Parse(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<LexError> for CompileError {
    fn from(e: LexError) -> Self {
        CompileError::Lex(e)
    }
}

impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        CompileError::Parse(e)
    }
}

/// Break bookkeeping for the innermost loop.
pub(crate) struct LoopContext {
    /// Placeholder address of a pending `break` jump.
    pub break_slot: Option<usize>,
    /// Scope depth at the loop body, so `break` can unwind nested blocks.
    pub base_depth: usize,
}

/// The single-pass compiler. One instance compiles one script.
pub struct Compiler<'a> {
    pub(crate) runtime: &'a Arc<Runtime>,
    pub(crate) symbols: &'a [Symbol],
    pub(crate) pos: usize,
    pub(crate) writer: BinaryWriter,
    pub(crate) frames: VariableFrames,
    /// Signatures with `Local` visibility, in declaration order.
    pub(crate) local_functions: Vec<FunctionSignature>,
    pub(crate) library: Arc<patter_core::Library>,
    pub(crate) library_declared: bool,
    pub(crate) imports: Vec<String>,
    pub(crate) error: Option<ParseError>,
    pub(crate) current_loop: Option<LoopContext>,
    pub(crate) require_return: bool,
    pub(crate) returned_value: bool,
    pub(crate) unique_name: String,
}

impl<'a> Compiler<'a> {
    /// Create a compiler over a symbol stream.
    pub fn new(
        runtime: &'a Arc<Runtime>,
        symbols: &'a [Symbol],
        unique_name: &str,
        imports: &[&str],
    ) -> Self {
        Compiler {
            runtime,
            symbols,
            pos: 0,
            writer: BinaryWriter::with_capacity(1024),
            frames: VariableFrames::new(),
            local_functions: Vec::new(),
            library: runtime.library(""),
            library_declared: false,
            imports: imports.iter().map(|s| s.to_string()).collect(),
            error: None,
            current_loop: None,
            require_return: false,
            returned_value: false,
            unique_name: unique_name.to_string(),
        }
    }

    /// Compile the symbol stream into bytecode.
    pub fn execute(mut self) -> Result<Bytecode, ParseError> {
        BytecodeHeader::default().write(&mut self.writer);
        self.parse_script();
        match self.error {
            Some(e) => Err(e),
            None => Ok(Bytecode::new(self.writer.into_inner())),
        }
    }

    // ========================================================================
    // Cursor
    // ========================================================================

    pub(crate) fn current(&self) -> Option<&'a Symbol> {
        if self.error.is_some() {
            return None;
        }
        self.symbols.get(self.pos)
    }

    pub(crate) fn current_kind(&self) -> Option<SymbolKind> {
        self.current().map(|s| s.kind)
    }

    /// A symbol position is valid if no error is pending, it is in range,
    /// and it is not a newline.
    pub(crate) fn symbol_valid(&self, pos: usize) -> bool {
        if self.error.is_some() {
            return false;
        }
        match self.symbols.get(pos) {
            Some(s) => s.kind != SymbolKind::NewLine,
            None => false,
        }
    }

    pub(crate) fn next_symbol(&mut self) {
        self.pos += 1;
    }

    /// Consume the current symbol if it has the given kind.
    pub(crate) fn accept(&mut self, kind: SymbolKind) -> bool {
        if self.error.is_some() {
            return false;
        }
        if self.symbols.get(self.pos).map(|s| s.kind) == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Like [`Compiler::accept`], but records an error on mismatch.
    pub(crate) fn expect(&mut self, kind: SymbolKind) -> bool {
        if self.accept(kind) {
            return true;
        }
        self.report(format!("Expected {}", kind.name()));
        false
    }

    pub(crate) fn check(&self, kind: SymbolKind) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.symbols.get(self.pos).map(|s| s.kind) == Some(kind)
    }

    /// Record the first error with the current symbol's position.
    pub(crate) fn report(&mut self, message: impl Into<String>) {
        if self.error.is_some() {
            return;
        }
        let (line, column) = self
            .symbols
            .get(self.pos)
            .or_else(|| self.symbols.last())
            .map(|s| (s.line, s.column))
            .unwrap_or((1, 1));
        let message = message.into();
        tracing::debug!(script = %self.unique_name, line, column, "parse error: {}", message);
        self.error = Some(ParseError {
            message,
            line,
            column,
        });
    }

    // ========================================================================
    // Emission
    // ========================================================================

    pub(crate) fn emit_opcode(&mut self, opcode: Opcode) {
        self.writer.write_u8(opcode as u8);
    }

    pub(crate) fn emit_name(&mut self, name: &str) {
        self.writer.write_str(name);
    }

    pub(crate) fn emit_id(&mut self, id: u64) {
        self.writer.write_u64(id);
    }

    pub(crate) fn emit_count(&mut self, count: u32) {
        self.writer.write_u32(count);
    }

    pub(crate) fn emit_index(&mut self, index: i32) {
        self.writer.write_i32(index);
    }

    pub(crate) fn emit_value_type(&mut self, value_type: ValueType) {
        self.writer.write_u8(value_type.to_byte());
    }

    pub(crate) fn emit_value(&mut self, value: &Variant) {
        if let Err(e) = value.write(&mut self.writer) {
            self.report(format!("Cannot embed value in bytecode: {}", e));
        }
    }

    pub(crate) fn emit_address(&mut self, address: usize) {
        self.writer.write_u32(address as u32);
    }

    /// Reserve a jump-target slot and return its position for back-filling.
    pub(crate) fn emit_address_placeholder(&mut self) -> usize {
        let offset = self.writer.tell();
        self.writer.write_u32(0);
        offset
    }

    /// Back-fill a reserved slot with the current write position.
    pub(crate) fn backfill_address(&mut self, slot: usize) {
        let current = self.writer.tell();
        self.patch_address(slot, current);
    }

    /// Back-fill a reserved slot with an explicit target.
    pub(crate) fn patch_address(&mut self, slot: usize, target: usize) {
        let current = self.writer.tell();
        self.writer.seek(slot);
        self.writer.write_u32(target as u32);
        self.writer.seek(current);
    }

    // ========================================================================
    // Scopes and frames
    // ========================================================================

    pub(crate) fn scope_begin(&mut self) {
        self.frames.scope_begin();
        self.emit_opcode(Opcode::ScopeBegin);
    }

    pub(crate) fn scope_end(&mut self) {
        if let Err(e) = self.frames.scope_end() {
            self.report(e);
        }
        self.emit_opcode(Opcode::ScopeEnd);
    }

    pub(crate) fn variable_assign(&mut self, name: &str) {
        if let Err(e) = self.frames.assign(name) {
            self.report(e);
        }
    }

    // ========================================================================
    // Symbol classification
    // ========================================================================

    pub(crate) fn check_binary_operator(&self) -> bool {
        matches!(
            self.current_kind(),
            Some(
                SymbolKind::Plus
                    | SymbolKind::Minus
                    | SymbolKind::Asterisk
                    | SymbolKind::ForwardSlash
                    | SymbolKind::Percent
                    | SymbolKind::Equals
                    | SymbolKind::NotEquals
                    | SymbolKind::LessThan
                    | SymbolKind::LessThanEquals
                    | SymbolKind::GreaterThan
                    | SymbolKind::GreaterThanEquals
            )
        )
    }

    pub(crate) fn parse_binary_operator(&mut self) -> Option<Opcode> {
        let opcode = match self.current_kind()? {
            SymbolKind::Plus => Opcode::Add,
            SymbolKind::Minus => Opcode::Subtract,
            SymbolKind::Asterisk => Opcode::Multiply,
            SymbolKind::ForwardSlash => Opcode::Divide,
            SymbolKind::Percent => Opcode::Mod,
            SymbolKind::Equals => Opcode::Equals,
            SymbolKind::NotEquals => Opcode::NotEquals,
            SymbolKind::LessThan => Opcode::Less,
            SymbolKind::LessThanEquals => Opcode::LessEq,
            SymbolKind::GreaterThan => Opcode::Greater,
            SymbolKind::GreaterThanEquals => Opcode::GreaterEq,
            _ => {
                self.report("Unknown binary operator");
                return None;
            }
        };
        self.next_symbol();
        Some(opcode)
    }

    pub(crate) fn check_value(&self) -> bool {
        self.current_kind().is_some_and(SymbolKind::is_value)
    }

    /// Build a `Variant` from the current literal symbol.
    pub(crate) fn parse_value(&mut self) -> Variant {
        let Some(symbol) = self.current() else {
            return Variant::Null;
        };
        let value = match (symbol.kind, symbol.literal) {
            (SymbolKind::NumberValue, Literal::Number(n)) => Variant::Number(n),
            (SymbolKind::IntegerValue, Literal::Integer(n)) => Variant::Integer(n),
            (SymbolKind::BooleanValue, Literal::Boolean(b)) => Variant::Boolean(b),
            (SymbolKind::StringValue, _) => Variant::String(symbol.text.clone()),
            (SymbolKind::Null, _) => Variant::Null,
            _ => {
                self.report("Unknown value");
                return Variant::Null;
            }
        };
        self.next_symbol();
        value
    }

    pub(crate) fn check_value_type(&self) -> bool {
        matches!(
            self.current_kind(),
            Some(
                SymbolKind::Number
                    | SymbolKind::Integer
                    | SymbolKind::Boolean
                    | SymbolKind::String
                    | SymbolKind::Collection
                    | SymbolKind::Guid
                    | SymbolKind::Null
            )
        )
    }

    pub(crate) fn parse_value_type(&mut self) -> ValueType {
        let value_type = match self.current_kind() {
            Some(SymbolKind::Number) => ValueType::Number,
            Some(SymbolKind::Integer) => ValueType::Integer,
            Some(SymbolKind::Boolean) => ValueType::Boolean,
            Some(SymbolKind::String) => ValueType::String,
            Some(SymbolKind::Collection) => ValueType::Collection,
            Some(SymbolKind::Guid) => ValueType::Guid,
            Some(SymbolKind::Null) => ValueType::Null,
            _ => {
                self.report("Unknown type");
                return ValueType::Null;
            }
        };
        self.next_symbol();
        value_type
    }

    pub(crate) fn check_name(&self) -> bool {
        self.current_kind() == Some(SymbolKind::NameValue)
    }

    /// Parse a single-symbol name.
    pub(crate) fn parse_name(&mut self) -> String {
        match self.current() {
            Some(s) if s.kind == SymbolKind::NameValue => {
                let name = s.text.clone();
                self.next_symbol();
                name
            }
            _ => {
                self.report("Expected a name");
                String::new()
            }
        }
    }

    /// Parse a possibly multi-word name. Consumes symbols until it reaches
    /// one of the terminator kinds, an operator (which has no text), or the
    /// end of the line.
    pub(crate) fn parse_multi_name(&mut self, terminators: &[SymbolKind]) -> String {
        match self.current() {
            Some(s) if s.kind == SymbolKind::NameValue => {}
            _ => {
                self.report("Expected a name");
                return String::new();
            }
        }
        let mut name = self.symbols[self.pos].text.clone();
        self.next_symbol();

        while self.symbol_valid(self.pos) && !self.symbols[self.pos].text.is_empty() {
            let symbol = &self.symbols[self.pos];
            if symbol.kind != SymbolKind::NameValue && terminators.contains(&symbol.kind) {
                return name;
            }
            name.push(' ');
            name.push_str(&symbol.text);
            self.next_symbol();
        }
        name
    }

    // ========================================================================
    // Library names
    // ========================================================================

    /// Whether a name is the current library's or an imported library's.
    pub(crate) fn is_library_name(&self, name: &str) -> bool {
        name == self.library.name() || self.imports.iter().any(|i| i == name)
    }

    /// If the symbol at `pos` names the current library or an import,
    /// return that library name.
    pub(crate) fn library_name_at(&self, pos: usize) -> Option<String> {
        let symbol = self.symbols.get(pos)?;
        if symbol.kind != SymbolKind::NameValue && !symbol.kind.is_keyword() {
            return None;
        }
        if self.is_library_name(&symbol.text) {
            Some(symbol.text.clone())
        } else {
            None
        }
    }

    /// Library-name check at the current position.
    pub(crate) fn check_library_name(&self) -> Option<String> {
        self.library_name_at(self.pos)
    }

    // ========================================================================
    // Variables
    // ========================================================================

    /// Longest-match variable lookup at a position. Returns the symbol
    /// count of the match. Word counts are tried from the frame's maximum
    /// down to one, so the longest registered name wins.
    pub(crate) fn check_variable_at(&self, pos: usize) -> Option<usize> {
        if self.error.is_some() {
            return None;
        }
        if self.symbols.get(pos).map(|s| s.kind) != Some(SymbolKind::NameValue) {
            return None;
        }
        let max_parts = self.frames.max_parts();
        for count in (1..=max_parts).rev() {
            if let Some(name) = self.multi_word_at(pos, count)
                && self.frames.exists(&name)
            {
                return Some(count);
            }
        }
        None
    }

    pub(crate) fn check_variable(&self) -> bool {
        self.check_variable_at(self.pos).is_some()
    }

    /// Consume and return the longest matching variable name.
    pub(crate) fn parse_variable(&mut self) -> String {
        match self.check_variable_at(self.pos) {
            Some(count) => {
                let name = self
                    .multi_word_at(self.pos, count)
                    .unwrap_or_default();
                for _ in 0..count {
                    self.next_symbol();
                }
                name
            }
            None => {
                self.report("Could not parse variable name");
                String::new()
            }
        }
    }

    /// Join `count` symbols starting at `pos` into a space-separated name.
    /// Fails if any needed symbol is invalid or has no text.
    pub(crate) fn multi_word_at(&self, pos: usize, count: usize) -> Option<String> {
        let mut name = String::new();
        for i in 0..count {
            if !self.symbol_valid(pos + i) {
                return None;
            }
            let symbol = &self.symbols[pos + i];
            if symbol.text.is_empty() {
                return None;
            }
            if i > 0 {
                name.push(' ');
            }
            name.push_str(&symbol.text);
        }
        Some(name)
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Longest-match property lookup within one library at a position.
    /// Non-consuming; returns the name record and its symbol count.
    pub(crate) fn check_property_parts(
        &self,
        library: &Arc<patter_core::Library>,
        pos: usize,
    ) -> Option<(patter_core::PropertyName, usize)> {
        if self.error.is_some() {
            return None;
        }
        if self.symbols.get(pos).map(|s| s.kind) != Some(SymbolKind::NameValue) {
            return None;
        }
        let max_parts = library.max_property_parts();
        for count in (1..=max_parts).rev() {
            if let Some(name) = self.multi_word_at(pos, count)
                && let Some(property) = library.property_name(&name)
            {
                return Some((property, count));
            }
        }
        None
    }

    /// Property lookup at a position across the current library and
    /// imports, honoring an explicit library prefix. Returns the number of
    /// prefix symbols (0 or 1) and the name's symbol count.
    pub(crate) fn check_property_at(&self, pos: usize) -> Option<(usize, usize)> {
        if self.symbols.get(pos).map(|s| s.kind) != Some(SymbolKind::NameValue) {
            return None;
        }
        if let Some(library_name) = self.library_name_at(pos)
            && self.runtime.library_exists(&library_name)
        {
            let library = self.runtime.library(&library_name);
            if let Some((_, count)) = self.check_property_parts(&library, pos + 1) {
                return Some((1, count));
            }
        }
        if let Some((_, count)) = self.check_property_parts(&self.library, pos) {
            return Some((0, count));
        }
        for import in &self.imports {
            if !self.runtime.library_exists(import) {
                continue;
            }
            let library = self.runtime.library(import);
            if Arc::ptr_eq(&library, &self.library) {
                continue;
            }
            if let Some((_, count)) = self.check_property_parts(&library, pos) {
                return Some((0, count));
            }
        }
        None
    }

    pub(crate) fn check_property(&self) -> bool {
        self.check_property_at(self.pos).is_some()
    }

    /// Consume a property reference and resolve its name record, honoring
    /// visibility and reporting ambiguity across imports.
    pub(crate) fn parse_property_name(&mut self) -> Option<patter_core::PropertyName> {
        // Explicit library prefix.
        if let Some(library_name) = self.check_library_name()
            && self.runtime.library_exists(&library_name)
        {
            let library = self.runtime.library(&library_name);
            if let Some((property, count)) = self.check_property_parts(&library, self.pos + 1) {
                if library_name != self.library.name()
                    && property.visibility() != Visibility::Public
                {
                    self.report("Unable to access private property");
                    return None;
                }
                for _ in 0..count + 1 {
                    self.next_symbol();
                }
                return Some(property);
            }
        }

        // Current library first.
        if let Some((property, count)) = self.check_property_parts(&self.library, self.pos) {
            for _ in 0..count {
                self.next_symbol();
            }
            return Some(property);
        }

        // Then imports; two public matches are ambiguous.
        let mut found: Option<(patter_core::PropertyName, usize)> = None;
        for import in self.imports.clone() {
            if !self.runtime.library_exists(&import) {
                continue;
            }
            let library = self.runtime.library(&import);
            if Arc::ptr_eq(&library, &self.library) {
                continue;
            }
            if let Some((property, count)) = self.check_property_parts(&library, self.pos) {
                if property.visibility() != Visibility::Public {
                    continue;
                }
                if found.is_some() {
                    self.report("Ambiguous property name; prefix it with its library name");
                    return None;
                }
                found = Some((property, count));
            }
        }
        match found {
            Some((property, count)) => {
                for _ in 0..count {
                    self.next_symbol();
                }
                Some(property)
            }
            None => {
                self.report("Unable to find property name in library");
                None
            }
        }
    }

    /// Parse an optional `[expr]` subscript; the key expression is left on
    /// the stack. Returns whether a subscript was present.
    pub(crate) fn parse_subscript(&mut self) -> bool {
        if self.error.is_some() {
            return false;
        }
        if !self.accept(SymbolKind::SquareOpen) {
            return false;
        }
        self.parse_expression(false);
        self.expect(SymbolKind::SquareClose);
        true
    }

    /// Parse an optional visibility prefix.
    pub(crate) fn parse_scope_visibility(&mut self) -> Visibility {
        if self.accept(SymbolKind::Private) {
            Visibility::Private
        } else if self.accept(SymbolKind::Public) {
            Visibility::Public
        } else {
            Visibility::Local
        }
    }
}
