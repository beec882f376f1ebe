// patter-vm - Expression parsing
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Expression parsing and emission.
//!
//! There is no operator precedence: binary operators are held on a small
//! operator stack and emitted one per operand, which evaluates strictly
//! left to right. `2 + 3 * 4` is 20, not 14. Parenthesization is the only
//! way to override the ordering, and `and`/`or` restart a full expression
//! parse on their right-hand side.

use patter_lang::{SymbolKind, Variant};

use super::Compiler;
use crate::opcode::Opcode;

impl<'a> Compiler<'a> {
    /// Parse a full expression: either a collection literal of `[k, v]`
    /// pairs, or a subexpression optionally extended into a comma list.
    pub(crate) fn parse_expression(&mut self, suppress_function_call: bool) {
        if self.accept(SymbolKind::SquareOpen) {
            if self.accept(SymbolKind::SquareClose) {
                // An immediate close bracket is an empty collection.
                self.emit_opcode(Opcode::PushColl);
                self.emit_count(0);
                return;
            }
            self.parse_subexpression(suppress_function_call);

            // A comma after an open bracket makes this a key-value pair.
            if self.accept(SymbolKind::Comma) {
                self.parse_expression(suppress_function_call);
                self.expect(SymbolKind::SquareClose);

                let mut count: u32 = 1;
                while self.accept(SymbolKind::Comma) {
                    self.expect(SymbolKind::SquareOpen);
                    self.parse_subexpression(false);
                    self.expect(SymbolKind::Comma);
                    self.parse_subexpression(false);
                    self.expect(SymbolKind::SquareClose);
                    count += 1;
                }

                self.emit_opcode(Opcode::PushColl);
                self.emit_count(count);
            } else {
                self.report("Expected comma separating key-value pair");
            }
        } else {
            self.parse_subexpression(suppress_function_call);

            // A comma after the first subexpression makes this a list,
            // compiled to a collection with integer keys from one.
            if self.accept(SymbolKind::Comma) {
                if self.check(SymbolKind::NewLine) {
                    self.report("Unexpected end of line in list");
                    return;
                }
                let mut count: u32 = 1;
                loop {
                    self.parse_subexpression(false);
                    count += 1;
                    if !self.accept(SymbolKind::Comma) {
                        break;
                    }
                }
                self.emit_opcode(Opcode::PushList);
                self.emit_count(count);
            }
        }
    }

    /// Parse one subexpression: a `not`, or an operand/operator chain.
    pub(crate) fn parse_subexpression(&mut self, suppress_function_call: bool) {
        if self.error.is_some() {
            return;
        }
        if self.check(SymbolKind::NewLine) {
            self.report("Expected valid expression");
            return;
        }

        let mut opcode_stack: Vec<Opcode> = Vec::new();

        if self.accept(SymbolKind::Not) {
            self.parse_expression(false);
            self.emit_opcode(Opcode::Not);
        } else {
            self.parse_subexpression_operation(&mut opcode_stack, suppress_function_call);
        }

        if !opcode_stack.is_empty() {
            self.report("Syntax error when parsing expression");
        }
    }

    /// The operand/operator loop: operand, optional cast, then either a
    /// binary operator pushed onto the operator stack or a logical
    /// operator that restarts a full expression parse.
    fn parse_subexpression_operation(
        &mut self,
        opcode_stack: &mut Vec<Opcode>,
        suppress_function_call: bool,
    ) {
        let mut suppress = suppress_function_call;
        while self.symbol_valid(self.pos) {
            self.parse_subexpression_operand(opcode_stack, suppress);
            suppress = false;

            if self.accept(SymbolKind::As) {
                self.emit_opcode(Opcode::Cast);
                let value_type = self.parse_value_type();
                if self.error.is_some() {
                    return;
                }
                self.emit_value_type(value_type);
            }

            if self.check_binary_operator() {
                if let Some(opcode) = self.parse_binary_operator() {
                    opcode_stack.push(opcode);
                }
            } else if self.check(SymbolKind::And) || self.check(SymbolKind::Or) {
                let is_and = self.check(SymbolKind::And);
                self.next_symbol();
                self.parse_expression(false);
                self.emit_opcode(if is_and { Opcode::And } else { Opcode::Or });
            } else {
                break;
            }
        }
    }

    /// Parse one operand and then emit the pending operator, if any.
    fn parse_subexpression_operand(
        &mut self,
        opcode_stack: &mut Vec<Opcode>,
        suppress_function_call: bool,
    ) {
        if self.error.is_some() {
            return;
        }

        // Contexts where an operand is legitimately absent; leave the
        // pending operator untouched.
        if self.check(SymbolKind::Comma)
            || self.check(SymbolKind::ParenClose)
            || self.check(SymbolKind::SquareClose)
            || self.check(SymbolKind::To)
            || self.check(SymbolKind::By)
        {
            return;
        }

        if self.accept(SymbolKind::Minus) {
            // Unary minus: no negate opcode exists, so compile `-x` as
            // `0 - x`.
            self.emit_opcode(Opcode::PushVal);
            self.emit_value(&Variant::Integer(0));
            self.parse_operand(false);
            self.emit_opcode(Opcode::Subtract);
        } else {
            self.parse_operand(suppress_function_call);
        }

        if let Some(opcode) = opcode_stack.pop() {
            self.emit_opcode(opcode);
        }
    }

    /// Parse a bare operand: a function call, property, variable,
    /// parenthesized expression, literal, or type keyword.
    fn parse_operand(&mut self, suppress_function_call: bool) {
        if self.error.is_some() {
            return;
        }

        let signature = if suppress_function_call {
            None
        } else {
            self.check_function_call()
        };

        if let Some(signature) = signature {
            if !signature.returns() {
                self.report("Function in an expression must return a value");
                return;
            }
            self.parse_function_call(&signature);
        } else if self.check_property() {
            let Some(property) = self.parse_property_name() else {
                return;
            };
            let subscript = self.parse_subscript();
            self.emit_opcode(if subscript {
                Opcode::PushPropKeyVal
            } else {
                Opcode::PushProp
            });
            self.emit_id(property.id());
            if self.accept(SymbolKind::Type) {
                self.emit_opcode(Opcode::Type);
            }
        } else if self.check_variable() {
            let name = self.parse_variable();
            let subscript = self.parse_subscript();
            self.emit_opcode(if subscript {
                Opcode::PushVarKey
            } else {
                Opcode::PushVar
            });
            self.emit_name(&name);
            if self.accept(SymbolKind::Type) {
                self.emit_opcode(Opcode::Type);
            }
        } else if self.accept(SymbolKind::ParenOpen) {
            self.parse_expression(false);
            self.expect(SymbolKind::ParenClose);
        } else if self.check_value() {
            let value = self.parse_value();
            self.emit_opcode(Opcode::PushVal);
            self.emit_value(&value);
        } else if self.check_value_type() {
            let value_type = self.parse_value_type();
            self.emit_opcode(Opcode::PushVal);
            self.emit_value(&Variant::ValType(value_type));
        } else {
            self.report("Expected operand");
        }
    }
}
