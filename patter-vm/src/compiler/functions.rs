// patter-vm - Function signature parsing, matching, and call emission
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Function definitions and the speculative call matcher.
//!
//! Before interpreting a statement or operand, the compiler attempts to
//! classify the upcoming symbols into name/parameter parts and match them
//! against every reachable signature: the script's local functions, the
//! current library, the default library, then each import. A hit compiles
//! the symbols as a call; a miss falls through to ordinary parsing.

use std::sync::Arc;

use patter_core::{CallPart, FunctionSignature, PartKind, SignaturePart, Visibility};
use patter_lang::{SymbolKind, ValueType};

use super::Compiler;
use crate::opcode::Opcode;

impl<'a> Compiler<'a> {
    /// Whether the current symbol can be part of a function name.
    pub(crate) fn check_function_name_part(&self) -> bool {
        match self.current() {
            Some(s) => s.kind == SymbolKind::NameValue || s.kind.is_keyword(),
            None => false,
        }
    }

    /// Consume one function-name word.
    pub(crate) fn parse_function_name_part(&mut self) -> String {
        match self.current() {
            Some(s) if !s.text.is_empty() => {
                let text = s.text.clone();
                self.next_symbol();
                text
            }
            _ => {
                self.report("Unexpected symbol when parsing function name");
                String::new()
            }
        }
    }

    // ========================================================================
    // Speculative call detection
    // ========================================================================

    /// Try to match the upcoming symbols against a reachable function
    /// signature. Does not consume symbols. Ambiguity across imported
    /// libraries is a hard error directing the user to a library prefix.
    pub(crate) fn check_function_call(&mut self) -> Option<FunctionSignature> {
        if self.error.is_some() {
            return None;
        }
        let mut pos = self.pos;
        let first = self.symbols.get(pos)?;

        // Any operator other than an open parenthesis rules out a call.
        if first.kind.is_operator() && first.kind != SymbolKind::ParenOpen {
            return None;
        }

        // An explicit library prefix restricts the search.
        let library_name = self.library_name_at(pos);
        if library_name.is_some() {
            pos += 1;
            self.symbols.get(pos)?;
        }

        // Classify symbols into call parts until the line or an operator
        // ends the candidate.
        let mut parts: Vec<CallPart> = Vec::new();
        while self.symbol_valid(pos) {
            let symbol = &self.symbols[pos];
            if symbol.kind == SymbolKind::NameValue || symbol.kind.is_keyword() {
                if let Some(count) = self.check_variable_at(pos) {
                    pos = self.absorb_subscript(pos + count)?;
                    parts.push(CallPart::Parameter);
                    continue;
                }
                if let Some((prefix, count)) = self.check_property_at(pos) {
                    pos = self.absorb_subscript(pos + prefix + count)?;
                    parts.push(CallPart::Parameter);
                    continue;
                }
                parts.push(CallPart::Name(symbol.text.clone()));
            } else if symbol.kind.is_value() {
                parts.push(CallPart::Parameter);
            } else if symbol.kind == SymbolKind::ParenOpen {
                pos = self.skip_balanced(pos, SymbolKind::ParenOpen, SymbolKind::ParenClose)?;
                parts.push(CallPart::Parameter);
            } else if symbol.kind == SymbolKind::SquareOpen {
                pos = self.skip_balanced(pos, SymbolKind::SquareOpen, SymbolKind::SquareClose)?;
                parts.push(CallPart::Parameter);
            } else if symbol.kind.is_operator() {
                break;
            }
            pos += 1;
        }
        if parts.is_empty() {
            return None;
        }

        self.resolve_call(&parts, library_name)
    }

    /// A variable or property followed by a `[key]` subscript is one
    /// parameter, not two; fold the subscript into the classified part.
    fn absorb_subscript(&self, pos: usize) -> Option<usize> {
        if self.symbol_valid(pos) && self.symbols[pos].kind == SymbolKind::SquareOpen {
            let close = self.skip_balanced(pos, SymbolKind::SquareOpen, SymbolKind::SquareClose)?;
            Some(close + 1)
        } else {
            Some(pos)
        }
    }

    /// Skip from an opening bracket to its matching close. Returns the
    /// close position, or None if the line ends first.
    fn skip_balanced(&self, start: usize, open: SymbolKind, close: SymbolKind) -> Option<usize> {
        let mut pos = start;
        let mut depth = 1usize;
        while depth > 0 {
            pos += 1;
            if !self.symbol_valid(pos) {
                return None;
            }
            let kind = self.symbols[pos].kind;
            if kind == close {
                depth -= 1;
            } else if kind == open {
                depth += 1;
            }
        }
        Some(pos)
    }

    /// Resolve classified call parts against the reachable signatures.
    fn resolve_call(
        &mut self,
        parts: &[CallPart],
        library_name: Option<String>,
    ) -> Option<FunctionSignature> {
        // Explicit library prefix: only that library is searched.
        if let Some(library_name) = library_name {
            if !self.runtime.library_exists(&library_name) {
                return None;
            }
            let library = self.runtime.library(&library_name);
            let signature = library.find_function(parts)?;
            if signature.visibility() == Visibility::Private
                && library_name != self.library.name()
            {
                self.report("Cannot call a private function in another library");
                return None;
            }
            return Some(signature);
        }

        // Script-local functions first.
        if let Some(signature) = self.local_functions.iter().find(|s| s.matches(parts)) {
            return Some(signature.clone());
        }

        // Current library, then the default library.
        if let Some(signature) = self.library.find_function(parts) {
            return Some(signature);
        }
        let default_library = self.runtime.library("");
        if !Arc::ptr_eq(&default_library, &self.library)
            && let Some(signature) = default_library.find_function(parts)
        {
            return Some(signature);
        }

        // Imports, in declared order. Private functions of other libraries
        // are not callable; two reachable matches are ambiguous.
        let mut found: Option<FunctionSignature> = None;
        for import in self.imports.clone() {
            if !self.runtime.library_exists(&import) {
                tracing::warn!(
                    script = %self.unique_name,
                    library = %import,
                    "unable to find imported library"
                );
                continue;
            }
            let library = self.runtime.library(&import);
            if Arc::ptr_eq(&library, &self.library) {
                continue;
            }
            if let Some(signature) = library.find_function(parts) {
                if signature.visibility() == Visibility::Private {
                    continue;
                }
                if found.is_some() {
                    self.report(
                        "Ambiguous function call; prefix the call with its library name",
                    );
                    return None;
                }
                found = Some(signature);
            }
        }
        found
    }

    // ========================================================================
    // Call emission
    // ========================================================================

    /// Compile a call to a matched signature: validate each name part,
    /// push each parameter, then emit `CallFunc`.
    pub(crate) fn parse_function_call(&mut self, signature: &FunctionSignature) {
        if self.check_library_name().is_some() {
            self.next_symbol();
        }

        let parts: Vec<SignaturePart> = signature.parts().to_vec();
        let mut count = 0usize;
        let mut optional_count = 0usize;
        let mut index = 0usize;

        while index < parts.len() {
            let part = &parts[index];
            if part.optional {
                optional_count += 1;
            }

            match part.kind {
                PartKind::Name => {
                    if self.check_function_name_part() {
                        let name = self.parse_function_name_part();
                        // Skip optional parts the caller omitted until the
                        // word lands on a matching alternative.
                        loop {
                            if parts[index].names.iter().any(|n| n == &name) {
                                break;
                            }
                            if parts[index].optional {
                                index += 1;
                                if index >= parts.len() {
                                    break;
                                }
                                continue;
                            }
                            self.report("Mismatch in function name");
                            return;
                        }
                        if index >= parts.len() {
                            break;
                        }
                    } else if part.optional {
                        index += 1;
                        continue;
                    } else {
                        self.report("Expecting function name");
                        return;
                    }
                }
                PartKind::Parameter => {
                    if self.accept(SymbolKind::ParenOpen) {
                        self.parse_expression(false);
                        self.expect(SymbolKind::ParenClose);
                    } else {
                        // Suppress recursive call matching while the
                        // leading parameters are parsed, so a signature
                        // starting with a parameter cannot match itself
                        // forever.
                        self.parse_expression(count <= optional_count);
                    }
                }
            }
            count += 1;
            index += 1;
        }

        self.emit_opcode(Opcode::CallFunc);
        self.emit_id(signature.id());
    }

    // ========================================================================
    // Definitions
    // ========================================================================

    /// Parse a function signature declaration up to and including its end
    /// of line, emit the `Function` record, and return the signature.
    pub(crate) fn parse_function_signature(
        &mut self,
        visibility: Visibility,
    ) -> Option<FunctionSignature> {
        let returns = self.accept(SymbolKind::Return);
        if self.check(SymbolKind::NewLine) {
            self.report("Empty function signature");
            return None;
        }

        let mut parts: Vec<SignaturePart> = Vec::new();
        let mut parsed_parameter = false;
        let mut parsed_non_keyword_name = false;
        let mut name_count = 0usize;
        let mut optional_name_count = 0usize;

        while !self.check(SymbolKind::NewLine) {
            if self.error.is_some() {
                return None;
            }
            if self.accept(SymbolKind::CurlyOpen) {
                if parsed_parameter {
                    self.report(
                        "Function parameters must be separated by a name part",
                    );
                    return None;
                }
                let mut value_type = ValueType::Null;
                if self.check_value_type() {
                    value_type = self.parse_value_type();
                }
                if !self.check_name() {
                    self.report("Expected a variable name in function signature");
                    return None;
                }
                let parameter_name = self.parse_multi_name(&[SymbolKind::CurlyClose]);
                self.expect(SymbolKind::CurlyClose);
                parts.push(SignaturePart {
                    kind: PartKind::Parameter,
                    optional: false,
                    names: vec![parameter_name],
                    value_type,
                });
                parsed_parameter = true;
            } else {
                let optional = self.accept(SymbolKind::ParenOpen);
                if !self.check_function_name_part() {
                    self.report("Invalid name in function signature");
                    return None;
                }
                name_count += 1;
                if self.current().is_some_and(|s| !s.kind.is_keyword()) {
                    parsed_non_keyword_name = true;
                }
                let mut names = vec![self.parse_function_name_part()];
                while self.accept(SymbolKind::ForwardSlash) {
                    if !self.check_function_name_part() {
                        self.report("Invalid name in function signature");
                        return None;
                    }
                    let name = self.parse_function_name_part();
                    if names.contains(&name) {
                        self.report("Duplicate alternative name in function signature");
                        return None;
                    }
                    names.push(name);
                }
                if optional {
                    optional_name_count += 1;
                    if !self.expect(SymbolKind::ParenClose) {
                        return None;
                    }
                }
                parts.push(SignaturePart {
                    kind: PartKind::Name,
                    optional,
                    names,
                    value_type: ValueType::Null,
                });
                parsed_parameter = false;
            }
        }
        if !self.expect(SymbolKind::NewLine) {
            return None;
        }

        if !parsed_non_keyword_name && name_count == 1 && parts.len() == 1 {
            self.report("Function signature cannot match a keyword");
            return None;
        }
        if name_count == optional_name_count {
            self.report("Function signature must have at least one non-optional name part");
            return None;
        }

        self.emit_opcode(Opcode::Function);
        let signature = FunctionSignature::new(
            visibility,
            returns,
            self.library.name().to_string(),
            parts,
        );
        signature.write(&mut self.writer);
        Some(signature)
    }

    /// Parse a full function definition: signature, jump over the body,
    /// reverse-order parameter binding, body, and return.
    pub(crate) fn parse_function_definition(&mut self, visibility: Visibility) {
        if !self.frames.is_root_frame() {
            self.report("Cannot define a function inside another function");
            return;
        }
        if !self.frames.is_root_scope() {
            self.report("Cannot define a function inside a scoped execution block");
            return;
        }

        let Some(signature) = self.parse_function_signature(visibility) else {
            if self.error.is_none() {
                self.report("Invalid function definition");
            }
            return;
        };

        if signature.visibility() == Visibility::Local {
            if self.local_functions.iter().any(|s| s.id() == signature.id()) {
                self.report(format!(
                    "Function already defined in script {}",
                    self.unique_name
                ));
                return;
            }
            self.local_functions.push(signature.clone());
        } else if !self.library.register_signature(signature.clone(), true) {
            self.report(format!(
                "Function already defined in library {}",
                self.library.name()
            ));
            return;
        }

        // During straight-line execution the body is jumped over; only
        // CallFunc enters it.
        self.emit_opcode(Opcode::Jump);
        let jump_slot = self.emit_address_placeholder();

        self.frames.frame_begin();

        // Parameters were pushed left to right, so the last sits at the
        // top of the stack. Bind them in reverse at negative indices.
        let parameters: Vec<SignaturePart> = signature.parameters().cloned().collect();
        let mut stack_index: i32 = -1;
        for parameter in parameters.iter().rev() {
            let name = parameter.first_name().to_string();
            self.variable_assign(&name);
            self.emit_opcode(Opcode::SetIndex);
            self.emit_name(&name);
            self.emit_index(stack_index);
            self.emit_value_type(parameter.value_type);
            stack_index -= 1;
        }

        let outer_require = self.require_return;
        let outer_returned = self.returned_value;
        self.require_return = signature.returns();
        self.returned_value = false;

        while !self.check(SymbolKind::End) && self.error.is_none() {
            self.parse_statement();
        }
        self.expect(SymbolKind::End);
        self.expect(SymbolKind::NewLine);

        if self.require_return && !self.returned_value {
            self.report("Required return value not found");
        }

        self.require_return = outer_require;
        self.returned_value = outer_returned;

        self.emit_opcode(Opcode::Return);
        self.backfill_address(jump_slot);

        if let Err(e) = self.frames.frame_end() {
            self.report(e);
        }
    }
}
