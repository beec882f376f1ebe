// patter-vm - Statement parsing
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Statement parsing and emission: assignments, declarations, control
//! flow, loops, waits, and the script prologue.

use patter_core::{PropertyName, Visibility};
use patter_lang::{SymbolKind, Variant};

use super::{Compiler, LoopContext};
use crate::opcode::Opcode;

impl<'a> Compiler<'a> {
    /// Parse the whole script: imports, the library declaration, then
    /// statements until the symbols run out.
    pub(crate) fn parse_script(&mut self) {
        self.parse_library_imports();
        self.parse_library_declaration();
        while self.pos < self.symbols.len() && self.error.is_none() {
            self.parse_statement();
        }
        self.emit_opcode(Opcode::Exit);
    }

    /// Parse the leading `import <name>` lines.
    fn parse_library_imports(&mut self) {
        loop {
            if !self.accept(SymbolKind::Import) {
                break;
            }
            let name = self.parse_name();
            if name.is_empty() {
                self.report("Expected a valid name after 'import'");
                return;
            }
            if !self.expect(SymbolKind::NewLine) {
                return;
            }
            if !self.runtime.library_exists(&name) {
                // Not fatal: the library may be registered before a call
                // into it is compiled.
                tracing::warn!(
                    script = %self.unique_name,
                    library = %name,
                    "imported library is not registered"
                );
            }
            if !self.imports.contains(&name) {
                self.imports.push(name);
            }
        }
    }

    /// Parse an optional `library <name>` line. The declaration is also
    /// recorded in bytecode so execution can bind the same library.
    fn parse_library_declaration(&mut self) {
        let mut library_name = String::new();
        if self.accept(SymbolKind::Library) {
            if self.library_declared {
                self.report("Library has already been declared for this script");
                return;
            }
            library_name = self.parse_name();
            if library_name.is_empty() {
                self.report("Expected a valid name after 'library'");
                return;
            }
            if !self.expect(SymbolKind::NewLine) {
                return;
            }
            self.library_declared = true;
        }

        self.emit_opcode(Opcode::Library);
        self.emit_name(&library_name);
        self.library = self.runtime.library(&library_name);
    }

    /// Parse one statement. Function signatures have precedence over
    /// everything, so a speculative call match is attempted first.
    pub(crate) fn parse_statement(&mut self) {
        if self.error.is_some() {
            return;
        }

        if let Some(signature) = self.check_function_call() {
            self.parse_function_call(&signature);
            // A returning function used as a statement discards its
            // result.
            if signature.returns() {
                self.emit_opcode(Opcode::Pop);
            }
            self.expect(SymbolKind::NewLine);
            return;
        }

        let set = self.accept(SymbolKind::Set);
        let visibility = self.parse_scope_visibility();
        let read_only = self.accept(SymbolKind::Readonly);
        if read_only && visibility == Visibility::Local {
            self.report("The 'readonly' keyword must follow a private or public keyword");
            return;
        }

        if self.accept(SymbolKind::Function) {
            self.parse_function_definition(visibility);
        } else if set && self.check_name() {
            if self
                .current()
                .is_some_and(|s| s.text == self.library.name())
            {
                self.report("Illegal use of library name in identifier");
                return;
            }
            if visibility != Visibility::Local {
                self.parse_property_declaration(visibility, read_only);
            } else if self.check_property() {
                self.parse_property_assignment();
            } else {
                self.parse_variable_assignment();
            }
        } else if visibility == Visibility::Local {
            if self.accept(SymbolKind::Begin) {
                self.expect(SymbolKind::NewLine);
                self.parse_block();
                self.expect(SymbolKind::End);
                self.expect(SymbolKind::NewLine);
            } else if self.accept(SymbolKind::If) {
                self.parse_if_else();
            } else if self.accept(SymbolKind::Loop) {
                self.parse_loop();
            } else if self.accept(SymbolKind::Erase) {
                self.parse_erase();
            } else if self.check(SymbolKind::Increment) || self.check(SymbolKind::Decrement) {
                self.parse_increment_decrement();
            } else if self.accept(SymbolKind::Return) {
                self.parse_return();
            } else if self.accept(SymbolKind::Break) {
                self.parse_break();
            } else if self.accept(SymbolKind::Wait) {
                self.parse_wait();
            } else if self.accept(SymbolKind::External) {
                self.parse_external();
            } else {
                self.report("Unknown symbol in statement");
            }
        } else {
            self.report(format!(
                "Invalid symbol after scope specifier '{}'",
                visibility.name()
            ));
        }
    }

    /// Parse a lexical block: statements bracketed by scope opcodes, ended
    /// by `end`, `else`, `until`, or `while`.
    pub(crate) fn parse_block(&mut self) {
        if self.error.is_some() {
            return;
        }
        self.scope_begin();
        while !(self.check(SymbolKind::End)
            || self.check(SymbolKind::Else)
            || self.check(SymbolKind::Until)
            || self.check(SymbolKind::While))
            && self.error.is_none()
        {
            self.parse_statement();
        }
        self.scope_end();
    }

    // ========================================================================
    // Assignments and declarations
    // ========================================================================

    /// `set public/private [readonly] <name> [to expr]`
    fn parse_property_declaration(&mut self, visibility: Visibility, read_only: bool) {
        if self.error.is_some() {
            return;
        }
        if !self.check_name() {
            self.report("Expected a property name");
            return;
        }

        // The name cannot begin with an imported library's name.
        if let Some(symbol) = self.current()
            && self.imports.iter().any(|i| *i == symbol.text)
        {
            self.report("Property name cannot start with an imported library name");
            return;
        }

        let property_library = self.library.clone();
        let name = self.parse_multi_name(&[SymbolKind::To]);

        if property_library.property_exists(&name) {
            self.report("Property is already defined");
            return;
        }

        let property = PropertyName::new(
            visibility,
            read_only,
            property_library.name().to_string(),
            name,
        );
        if !property_library.register_property_name(property.clone(), true) {
            self.report("Error registering property name; possible duplicate");
            return;
        }

        self.emit_opcode(Opcode::Property);
        property.write(&mut self.writer);

        if self.accept(SymbolKind::To) {
            self.parse_expression(false);
            self.emit_opcode(Opcode::SetProp);
            self.emit_id(property.id());
        } else if read_only {
            self.report("A readonly property must be assigned an initial value");
            return;
        }
        self.expect(SymbolKind::NewLine);
    }

    /// `set <existing property> [key] to expr`
    fn parse_property_assignment(&mut self) {
        let Some(property) = self.parse_property_name() else {
            return;
        };
        if property.is_read_only() {
            self.report("Cannot change a readonly property");
            return;
        }
        let subscript = self.parse_subscript();
        self.expect(SymbolKind::To);
        self.parse_expression(false);
        self.expect(SymbolKind::NewLine);
        self.emit_opcode(if subscript {
            Opcode::SetPropKeyVal
        } else {
            Opcode::SetProp
        });
        self.emit_id(property.id());
    }

    /// `set <variable> [key] to expr`
    fn parse_variable_assignment(&mut self) {
        let name = self.parse_multi_name(&[SymbolKind::To, SymbolKind::SquareOpen]);
        let subscript = self.parse_subscript();
        self.expect(SymbolKind::To);
        self.parse_expression(false);
        self.expect(SymbolKind::NewLine);
        self.emit_opcode(if subscript {
            Opcode::SetVarKey
        } else {
            Opcode::SetVar
        });
        self.emit_name(&name);
        self.variable_assign(&name);
    }

    /// `external <name>` declares a host-supplied root-scope variable.
    fn parse_external(&mut self) {
        let property_exists = self.check_property();
        let name = self.parse_multi_name(&[]);
        if name.is_empty() {
            return;
        }

        if !self.frames.is_root_frame() {
            self.report(format!(
                "External variable '{}' cannot be declared in a function",
                name
            ));
        } else if !self.frames.is_root_scope() {
            self.report(format!(
                "External variable '{}' must be declared at the root scope",
                name
            ));
        } else if property_exists {
            self.report(format!(
                "External variable '{}' is already a property name",
                name
            ));
        } else if self.frames.exists(&name) {
            self.report(format!("Variable '{}' already exists", name));
        } else {
            self.variable_assign(&name);
        }
        self.expect(SymbolKind::NewLine);
    }

    // ========================================================================
    // Control flow
    // ========================================================================

    /// `if expr … [else if expr …] [else …] end` with back-filled jumps.
    pub(crate) fn parse_if_else(&mut self) {
        self.parse_expression(false);
        self.expect(SymbolKind::NewLine);

        self.emit_opcode(Opcode::JumpFalse);
        let if_jump_slot = self.emit_address_placeholder();

        self.parse_block();

        let returned_in_if_block = self.returned_value;
        // A conditional branch alone cannot satisfy a required return.
        self.returned_value = false;

        if self.accept(SymbolKind::Else) {
            self.emit_opcode(Opcode::Jump);
            let else_jump_slot = self.emit_address_placeholder();
            self.backfill_address(if_jump_slot);

            if self.accept(SymbolKind::NewLine) {
                self.parse_block();
                self.expect(SymbolKind::End);
                self.expect(SymbolKind::NewLine);
                if self.require_return && !returned_in_if_block {
                    self.returned_value = false;
                }
            } else if self.accept(SymbolKind::If) {
                self.parse_if_else();
            } else {
                self.report("Unexpected symbol after else");
            }

            self.backfill_address(else_jump_slot);
        } else if self.accept(SymbolKind::End) {
            self.expect(SymbolKind::NewLine);
            self.backfill_address(if_jump_slot);
        } else {
            self.report("Missing block termination after if");
        }

        if !returned_in_if_block {
            self.returned_value = false;
        }
    }

    /// `return [expr]`
    fn parse_return(&mut self) {
        if !self.check(SymbolKind::NewLine) {
            if !self.require_return {
                self.report("Unexpected return value");
            } else {
                self.returned_value = true;
            }
            self.parse_expression(false);
            self.emit_opcode(Opcode::ReturnValue);
        } else {
            if self.require_return {
                self.report("Required return value not found");
            }
            self.emit_opcode(Opcode::Return);
        }
        self.accept(SymbolKind::NewLine);
    }

    /// `break`: unwind the scopes opened inside the loop, then jump to the
    /// loop's cleanup point, back-filled when the loop ends.
    fn parse_break(&mut self) {
        self.expect(SymbolKind::NewLine);
        let depth = self.frames.scope_depth();
        let Some(loop_context) = self.current_loop.as_ref() else {
            self.report("Break outside of a loop");
            return;
        };
        if loop_context.break_slot.is_some() {
            self.report("Only one break per loop is supported");
            return;
        }
        // Emit a ScopeEnd for each block between the break and the loop so
        // the scope balance holds on this exit path.
        for _ in loop_context.base_depth..depth {
            self.emit_opcode(Opcode::ScopeEnd);
        }
        self.emit_opcode(Opcode::Jump);
        let slot = self.emit_address_placeholder();
        if let Some(loop_context) = self.current_loop.as_mut() {
            loop_context.break_slot = Some(slot);
        }
    }

    /// `wait`, `wait while expr`, `wait until expr`
    fn parse_wait(&mut self) {
        if self.accept(SymbolKind::NewLine) {
            self.emit_opcode(Opcode::Wait);
        } else if self.check(SymbolKind::Until) || self.check(SymbolKind::While) {
            // The condition is re-evaluated on every resume.
            let expression_address = self.writer.tell();
            let jump_true = self.accept(SymbolKind::Until);
            if !jump_true {
                self.expect(SymbolKind::While);
            }
            self.parse_expression(false);
            if !self.expect(SymbolKind::NewLine) {
                return;
            }
            self.emit_opcode(if jump_true {
                Opcode::JumpTrue
            } else {
                Opcode::JumpFalse
            });
            let done_slot = self.emit_address_placeholder();
            self.emit_opcode(Opcode::Wait);
            self.emit_opcode(Opcode::Jump);
            self.emit_address(expression_address);
            self.backfill_address(done_slot);
        } else {
            self.report("Unexpected symbol after wait");
        }
    }

    // ========================================================================
    // Loops
    // ========================================================================

    /// The four loop forms: counted, over-collection, leading
    /// while/until, and trailing do-while/until.
    pub(crate) fn parse_loop(&mut self) {
        let outer_loop = self.current_loop.take();

        // Optional loop variable name.
        let mut name = String::new();
        if self.check_name() {
            name = self.parse_multi_name(&[
                SymbolKind::From,
                SymbolKind::Over,
                SymbolKind::Until,
                SymbolKind::While,
            ]);
        }

        if self.accept(SymbolKind::From) {
            self.parse_counted_loop(&name);
        } else if self.accept(SymbolKind::Over) {
            self.parse_over_loop(&name);
        } else if self.check(SymbolKind::Until) || self.check(SymbolKind::While) {
            self.parse_conditional_loop();
        } else if self.accept(SymbolKind::NewLine) {
            self.parse_do_while_loop();
        } else {
            self.report("Unknown syntax after loop keyword");
        }

        self.current_loop = outer_loop;
    }

    /// `loop [name] from a to b [by c] … end`
    ///
    /// The counter, limit, and step stay on the operand stack for the
    /// duration of the loop; `LoopCount` advances and tests them in place.
    /// A named counter is re-bound from stack index −3 at the top of every
    /// iteration. The body always runs at least once.
    fn parse_counted_loop(&mut self, name: &str) {
        self.scope_begin();

        self.parse_expression(false);
        if !name.is_empty() {
            self.variable_assign(name);
        }
        self.expect(SymbolKind::To);
        self.parse_expression(false);
        if self.accept(SymbolKind::By) {
            self.parse_expression(false);
        } else {
            self.emit_opcode(Opcode::PushVal);
            self.emit_value(&Variant::Null);
        }
        self.expect(SymbolKind::NewLine);

        self.current_loop = Some(LoopContext {
            break_slot: None,
            base_depth: self.frames.scope_depth(),
        });

        let loop_begin = self.writer.tell();
        if !name.is_empty() {
            self.emit_opcode(Opcode::SetIndex);
            self.emit_name(name);
            self.emit_index(-3);
            self.emit_value_type(patter_lang::ValueType::Null);
        }

        self.parse_block();
        self.expect(SymbolKind::End);
        self.expect(SymbolKind::NewLine);

        self.emit_opcode(Opcode::LoopCount);
        self.emit_opcode(Opcode::JumpTrue);
        self.emit_address(loop_begin);

        self.finish_loop_cleanup(3);
        self.scope_end();
    }

    /// `loop [name] over expr … end`
    ///
    /// An empty collection skips the loop entirely. The iterator stays on
    /// the operand stack; `LoopOver` advances it in place and pops it at
    /// the end. A named iterator is re-bound from stack index −1 each
    /// iteration.
    fn parse_over_loop(&mut self, name: &str) {
        self.scope_begin();

        self.parse_expression(false);
        if !self.expect(SymbolKind::NewLine) {
            self.scope_end();
            return;
        }

        self.emit_opcode(Opcode::PushTop);
        self.emit_opcode(Opcode::JumpFalse);
        let empty_slot = self.emit_address_placeholder();

        self.emit_opcode(Opcode::PushItr);
        if !name.is_empty() {
            self.variable_assign(name);
        }

        self.current_loop = Some(LoopContext {
            break_slot: None,
            base_depth: self.frames.scope_depth(),
        });

        let loop_begin = self.writer.tell();
        if !name.is_empty() {
            self.emit_opcode(Opcode::SetIndex);
            self.emit_name(name);
            self.emit_index(-1);
            self.emit_value_type(patter_lang::ValueType::Null);
        }

        self.parse_block();
        self.expect(SymbolKind::End);
        self.expect(SymbolKind::NewLine);

        self.emit_opcode(Opcode::LoopOver);
        self.emit_opcode(Opcode::JumpFalse);
        self.emit_address(loop_begin);

        // The empty-collection jump lands on the same cleanup that a break
        // uses: one stack value to discard either way.
        let cleanup = self.finish_loop_cleanup(1);
        self.patch_address(empty_slot, cleanup);
        self.scope_end();
    }

    /// `loop while/until expr … end`
    fn parse_conditional_loop(&mut self) {
        let loop_begin = self.writer.tell();
        let jump_true = self.accept(SymbolKind::Until);
        if !jump_true {
            self.expect(SymbolKind::While);
        }

        self.current_loop = Some(LoopContext {
            break_slot: None,
            base_depth: self.frames.scope_depth(),
        });

        self.parse_expression(false);
        if !self.expect(SymbolKind::NewLine) {
            return;
        }

        self.emit_opcode(if jump_true {
            Opcode::JumpTrue
        } else {
            Opcode::JumpFalse
        });
        let exit_slot = self.emit_address_placeholder();

        self.parse_block();
        self.expect(SymbolKind::End);
        self.expect(SymbolKind::NewLine);

        self.emit_opcode(Opcode::Jump);
        self.emit_address(loop_begin);

        self.backfill_address(exit_slot);
        if let Some(slot) = self.current_loop.as_mut().and_then(|l| l.break_slot.take()) {
            self.backfill_address(slot);
        }
    }

    /// `loop … while/until expr`: the body executes once before the
    /// condition is first evaluated.
    fn parse_do_while_loop(&mut self) {
        self.current_loop = Some(LoopContext {
            break_slot: None,
            base_depth: self.frames.scope_depth(),
        });

        let loop_begin = self.writer.tell();
        self.parse_block();

        let jump_true = self.accept(SymbolKind::While);
        if !jump_true {
            self.expect(SymbolKind::Until);
        }
        self.parse_expression(false);
        self.expect(SymbolKind::NewLine);

        self.emit_opcode(if jump_true {
            Opcode::JumpTrue
        } else {
            Opcode::JumpFalse
        });
        self.emit_address(loop_begin);

        if let Some(slot) = self.current_loop.as_mut().and_then(|l| l.break_slot.take()) {
            self.backfill_address(slot);
        }
    }

    /// Emit the shared exit sequence for loops that keep control values on
    /// the operand stack: the normal exit jumps over a `PopCount` cleanup
    /// that break (and the over-loop's empty-collection test) land on.
    /// Returns the cleanup address.
    fn finish_loop_cleanup(&mut self, stack_values: u32) -> usize {
        self.emit_opcode(Opcode::Jump);
        let join_slot = self.emit_address_placeholder();

        let cleanup = self.writer.tell();
        self.emit_opcode(Opcode::PopCount);
        self.emit_count(stack_values);

        self.backfill_address(join_slot);
        if let Some(slot) = self.current_loop.as_mut().and_then(|l| l.break_slot.take()) {
            self.patch_address(slot, cleanup);
        }
        cleanup
    }

    // ========================================================================
    // Erase, increment, decrement
    // ========================================================================

    /// `erase <property|variable>[key]`
    fn parse_erase(&mut self) {
        if self.check_property() {
            let Some(property) = self.parse_property_name() else {
                return;
            };
            if property.is_read_only() {
                self.report("Cannot erase a readonly property");
                return;
            }
            if self.accept(SymbolKind::SquareOpen) {
                self.parse_subexpression(false);
                self.expect(SymbolKind::SquareClose);
                self.expect(SymbolKind::NewLine);
                self.emit_opcode(Opcode::ErasePropElem);
            } else {
                self.expect(SymbolKind::NewLine);
                self.emit_opcode(Opcode::EraseProp);
            }
            self.emit_id(property.id());
        } else if self.check_variable() {
            let name = self.parse_variable();
            if self.accept(SymbolKind::SquareOpen) {
                self.parse_subexpression(false);
                self.expect(SymbolKind::SquareClose);
                self.expect(SymbolKind::NewLine);
                self.emit_opcode(Opcode::EraseVarElem);
            } else {
                self.expect(SymbolKind::NewLine);
                self.emit_opcode(Opcode::EraseVar);
            }
            self.emit_name(&name);
        } else {
            self.report("Expected a property or variable name after erase");
        }
    }

    /// `increment/decrement <property|variable> [by expr]`
    fn parse_increment_decrement(&mut self) {
        let increment = self.accept(SymbolKind::Increment);
        if !increment {
            self.expect(SymbolKind::Decrement);
        }

        enum Target {
            Property(PropertyName),
            Variable(String),
        }

        let target = if self.check_property() {
            let Some(property) = self.parse_property_name() else {
                return;
            };
            if property.is_read_only() {
                self.report(format!(
                    "Cannot {} a readonly property",
                    if increment { "increment" } else { "decrement" }
                ));
                return;
            }
            self.emit_opcode(Opcode::PushProp);
            self.emit_id(property.id());
            Target::Property(property)
        } else if self.check_variable() {
            let name = self.parse_variable();
            self.emit_opcode(Opcode::PushVar);
            self.emit_name(&name);
            Target::Variable(name)
        } else {
            self.report(format!(
                "Expected a property or variable name after {}",
                if increment { "increment" } else { "decrement" }
            ));
            return;
        };

        if self.accept(SymbolKind::By) {
            self.parse_expression(false);
        } else {
            self.emit_opcode(Opcode::PushVal);
            self.emit_value(&Variant::Integer(1));
        }
        self.emit_opcode(if increment {
            Opcode::Increment
        } else {
            Opcode::Decrement
        });

        match target {
            Target::Property(property) => {
                self.emit_opcode(Opcode::SetProp);
                self.emit_id(property.id());
            }
            Target::Variable(name) => {
                self.emit_opcode(Opcode::SetVar);
                self.emit_name(&name);
            }
        }
        self.expect(SymbolKind::NewLine);
    }
}
