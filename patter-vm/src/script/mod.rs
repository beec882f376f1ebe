// patter-vm - The cooperative script virtual machine
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Script execution.
//!
//! A [`Script`] is a single-threaded execution instance over a compiled
//! bytecode buffer, sharing a [`Runtime`] with any number of other
//! scripts. Execution is cooperative: [`Script::execute`] runs until the
//! script finishes, errors, hits a `wait`, or exhausts the configured
//! instruction slice, and the next call resumes where it left off. No
//! instruction blocks the host thread.
//!
//! Scripts must be driven by one host thread at a time; the runtime's
//! shared tables are individually locked, but a script's own stacks and
//! instruction pointer are not.

mod frame;
mod stack;

pub use frame::{CallFrame, VariableStack};
pub use stack::OperandStack;

use std::any::Any;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use patter_core::{
    FunctionBody, FunctionDefinition, FunctionSignature, PropertyName, Result, Runtime,
    RuntimeError, RuntimeId, Visibility,
};
use patter_lang::{BinaryReader, Collection, CollectionIter, ValueType, Variant};

use crate::bytecode::{Bytecode, HEADER_SIZE};
use crate::opcode::Opcode;

/// The script's execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// More instructions remain; call `execute` again to continue.
    Running,
    /// Suspended at a `wait`; call `execute` again to resume.
    Waiting,
    /// The script ran to completion.
    Finished,
    /// Execution failed; see [`Script::error`].
    Errored,
}

/// What one instruction asked the execute loop to do.
enum Step {
    Continue,
    Wait,
    Finish,
}

/// A single execution instance of a compiled script.
pub struct Script {
    // Manual `Debug` below: `user_context` is `Box<dyn Any + Send>`, which
    // doesn't implement `Debug`.
    runtime: Arc<Runtime>,
    /// The buffer currently executing; calls into functions compiled in
    /// other scripts switch buffers, and frames restore them.
    bytecode: Bytecode,
    ip: usize,
    stack: OperandStack,
    variables: VariableStack,
    frames: Vec<CallFrame>,
    /// Functions declared with `Local` visibility, resolved before the
    /// runtime's shared table so scripts never collide.
    local_functions: HashMap<RuntimeId, Arc<FunctionDefinition>>,
    status: ExecutionStatus,
    error: Option<RuntimeError>,
    user_context: Option<Box<dyn Any + Send>>,
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script")
            .field("ip", &self.ip)
            .field("status", &self.status)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl Script {
    /// Create a script over compiled bytecode. Fails if the buffer's
    /// header is missing or incompatible.
    pub fn new(runtime: Arc<Runtime>, bytecode: Bytecode) -> Result<Script> {
        bytecode.header()?;
        let stack = OperandStack::new(runtime.params().max_operand_stack);
        Ok(Script {
            runtime,
            bytecode,
            ip: HEADER_SIZE,
            stack,
            variables: VariableStack::new(),
            frames: Vec::new(),
            local_functions: HashMap::new(),
            status: ExecutionStatus::Running,
            error: None,
            user_context: None,
        })
    }

    /// Drive the script until it finishes, errors, suspends at a `wait`,
    /// or exhausts the configured instruction slice (in which case the
    /// status stays `Running` and the next call continues).
    pub fn execute(&mut self) -> ExecutionStatus {
        if matches!(
            self.status,
            ExecutionStatus::Finished | ExecutionStatus::Errored
        ) {
            return self.status;
        }
        self.status = ExecutionStatus::Running;

        let started = Instant::now();
        let limit = self.runtime.params().max_instructions;
        let mut executed: u64 = 0;

        loop {
            match self.step() {
                Ok(Step::Continue) => {
                    executed += 1;
                    if limit != 0 && executed >= limit {
                        break;
                    }
                }
                Ok(Step::Wait) => {
                    executed += 1;
                    self.status = ExecutionStatus::Waiting;
                    break;
                }
                Ok(Step::Finish) => {
                    executed += 1;
                    self.status = ExecutionStatus::Finished;
                    break;
                }
                Err(error) => {
                    tracing::debug!(%error, ip = self.ip, "script errored");
                    self.error = Some(error);
                    self.status = ExecutionStatus::Errored;
                    break;
                }
            }
        }

        self.runtime
            .add_execute_perf(started.elapsed().as_nanos() as u64, executed);
        self.status
    }

    /// The current status without executing anything.
    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Whether the script has run to completion.
    pub fn is_finished(&self) -> bool {
        self.status == ExecutionStatus::Finished
    }

    /// The error that stopped the script, if any.
    pub fn error(&self) -> Option<&RuntimeError> {
        self.error.as_ref()
    }

    /// The shared runtime.
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Set a root-frame variable, as supplied for `external` declarations.
    /// Must be called between execution slices, not during one.
    pub fn set_variable(&mut self, name: &str, value: Variant) {
        self.variables.set(0, name, value);
    }

    /// Read a root-frame variable.
    pub fn get_variable(&self, name: &str) -> Option<Variant> {
        self.variables.get(0, name)
    }

    /// Attach host-specific context to this script.
    pub fn set_user_context(&mut self, context: Box<dyn Any + Send>) {
        self.user_context = Some(context);
    }

    /// Borrow the host-specific context.
    pub fn user_context(&self) -> Option<&(dyn Any + Send)> {
        self.user_context.as_deref()
    }

    /// Remove and return the host-specific context.
    pub fn take_user_context(&mut self) -> Option<Box<dyn Any + Send>> {
        self.user_context.take()
    }

    // ========================================================================
    // Bytecode reading
    // ========================================================================

    fn read_u8(&mut self) -> Result<u8> {
        let byte = self
            .bytecode
            .as_slice()
            .get(self.ip)
            .copied()
            .ok_or_else(|| RuntimeError::MalformedBytecode("unexpected end of bytecode".into()))?;
        self.ip += 1;
        Ok(byte)
    }

    fn with_reader<T>(
        &mut self,
        read: impl FnOnce(&mut BinaryReader<'_>) -> std::result::Result<T, patter_lang::ReadError>,
    ) -> Result<T> {
        let buffer = Arc::clone(self.bytecode.buffer());
        let mut reader = BinaryReader::new(&buffer);
        reader.seek(self.ip);
        let value = read(&mut reader)?;
        self.ip = reader.tell();
        Ok(value)
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.with_reader(|r| r.read_u32())
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.with_reader(|r| r.read_i32())
    }

    fn read_id(&mut self) -> Result<RuntimeId> {
        self.with_reader(|r| r.read_u64())
    }

    fn read_name(&mut self) -> Result<String> {
        self.with_reader(|r| r.read_str())
    }

    fn read_variant(&mut self) -> Result<Variant> {
        self.with_reader(Variant::read)
    }

    fn read_value_type(&mut self) -> Result<ValueType> {
        let byte = self.read_u8()?;
        ValueType::from_byte(byte).ok_or_else(|| {
            RuntimeError::MalformedBytecode(format!("invalid value type byte {}", byte))
        })
    }

    fn frame_variable_base(&self) -> usize {
        self.frames.last().map(|f| f.variable_base).unwrap_or(0)
    }

    // ========================================================================
    // Instruction dispatch
    // ========================================================================

    fn step(&mut self) -> Result<Step> {
        let opcode_offset = self.ip;
        let byte = self.read_u8()?;
        let opcode = Opcode::from_u8(byte).ok_or(RuntimeError::InvalidOpcode {
            byte,
            offset: opcode_offset,
        })?;

        match opcode {
            // ----------------------------------------------------------------
            // Stack
            // ----------------------------------------------------------------
            Opcode::PushVal => {
                let value = self.read_variant()?;
                self.stack.push(value)?;
            }
            Opcode::PushVar => {
                let name = self.read_name()?;
                let value = self
                    .variables
                    .get(self.frame_variable_base(), &name)
                    .ok_or(RuntimeError::UnknownVariable(name))?;
                self.stack.push(value)?;
            }
            Opcode::PushVarKey => {
                let name = self.read_name()?;
                let key = self.stack.pop()?;
                let value = self
                    .variables
                    .get(self.frame_variable_base(), &name)
                    .ok_or(RuntimeError::UnknownVariable(name))?;
                match value.as_collection() {
                    Some(collection) => {
                        let element = collection.get(&key).unwrap_or(Variant::Null);
                        self.stack.push(element)?;
                    }
                    None => {
                        return Err(RuntimeError::NotACollection {
                            context: "variable subscript",
                            got: value.type_name(),
                        });
                    }
                }
            }
            Opcode::PushProp => {
                let id = self.read_id()?;
                let value = self
                    .runtime
                    .get_property(id)
                    .ok_or(RuntimeError::UnknownProperty(id))?;
                self.stack.push(value)?;
            }
            Opcode::PushPropKeyVal => {
                let id = self.read_id()?;
                let key = self.stack.pop()?;
                let value = self.runtime.get_property_key(id, &key)?;
                self.stack.push(value)?;
            }
            Opcode::PushTop => {
                let top = self.stack.peek()?;
                self.stack.push(top)?;
            }
            Opcode::PushItr => {
                let value = self.stack.pop()?;
                match value {
                    Variant::Collection(collection) => {
                        self.stack
                            .push(Variant::Iterator(CollectionIter::new(collection)))?;
                    }
                    other => {
                        return Err(RuntimeError::NotACollection {
                            context: "loop iteration",
                            got: other.type_name(),
                        });
                    }
                }
            }
            Opcode::PushList => {
                let count = self.read_u32()? as usize;
                let values = self.stack.pop_count(count)?;
                let collection = Collection::from_pairs(
                    values
                        .into_iter()
                        .enumerate()
                        .map(|(i, v)| (Variant::Integer(i as i64 + 1), v)),
                );
                self.stack.push(Variant::Collection(collection))?;
            }
            Opcode::PushColl => {
                let count = self.read_u32()? as usize;
                let values = self.stack.pop_count(count * 2)?;
                let mut pairs = Vec::with_capacity(count);
                let mut iter = values.into_iter();
                while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                    pairs.push((key, value));
                }
                self.stack
                    .push(Variant::Collection(Collection::from_pairs(pairs)))?;
            }
            Opcode::Pop => {
                self.stack.pop()?;
            }
            Opcode::PopCount => {
                let count = self.read_u32()? as usize;
                self.stack.pop_count(count)?;
            }

            // ----------------------------------------------------------------
            // Assignment
            // ----------------------------------------------------------------
            Opcode::SetVar => {
                let name = self.read_name()?;
                let value = self.stack.pop()?;
                let base = self.frame_variable_base();
                self.variables.set(base, &name, value);
            }
            Opcode::SetVarKey => {
                let name = self.read_name()?;
                let value = self.stack.pop()?;
                let key = self.stack.pop()?;
                let base = self.frame_variable_base();
                match self.variables.get(base, &name) {
                    Some(Variant::Collection(collection)) => {
                        collection.insert(key, value);
                    }
                    Some(Variant::Null) | None => {
                        // Subscript assignment into a fresh name creates
                        // the collection.
                        let collection = Collection::new();
                        collection.insert(key, value);
                        self.variables
                            .set(base, &name, Variant::Collection(collection));
                    }
                    Some(other) => {
                        return Err(RuntimeError::NotACollection {
                            context: "variable subscript",
                            got: other.type_name(),
                        });
                    }
                }
            }
            Opcode::SetProp => {
                let id = self.read_id()?;
                let value = self.stack.pop()?;
                self.runtime.set_property(id, value)?;
            }
            Opcode::SetPropKeyVal => {
                let id = self.read_id()?;
                let value = self.stack.pop()?;
                let key = self.stack.pop()?;
                self.runtime.set_property_key(id, key, value)?;
            }
            Opcode::SetIndex => {
                let name = self.read_name()?;
                let index = self.read_i32()?;
                let value_type = self.read_value_type()?;
                let mut value = self.stack.get_from_top(index)?;
                if value_type != ValueType::Null {
                    value = value.cast(value_type)?;
                }
                let base = self.frame_variable_base();
                self.variables.set(base, &name, value);
            }

            // ----------------------------------------------------------------
            // Arithmetic
            // ----------------------------------------------------------------
            Opcode::Add => self.binary_op(Variant::add)?,
            Opcode::Subtract => self.binary_op(Variant::subtract)?,
            Opcode::Multiply => self.binary_op(Variant::multiply)?,
            Opcode::Divide => self.binary_op(Variant::divide)?,
            Opcode::Mod => self.binary_op(Variant::modulo)?,

            // ----------------------------------------------------------------
            // Comparison
            // ----------------------------------------------------------------
            Opcode::Equals => {
                let rhs = self.stack.pop()?;
                let lhs = self.stack.pop()?;
                self.stack.push(Variant::Boolean(lhs == rhs))?;
            }
            Opcode::NotEquals => {
                let rhs = self.stack.pop()?;
                let lhs = self.stack.pop()?;
                self.stack.push(Variant::Boolean(lhs != rhs))?;
            }
            Opcode::Less => self.compare_op(|o| o == Ordering::Less)?,
            Opcode::LessEq => self.compare_op(|o| o != Ordering::Greater)?,
            Opcode::Greater => self.compare_op(|o| o == Ordering::Greater)?,
            Opcode::GreaterEq => self.compare_op(|o| o != Ordering::Less)?,

            // ----------------------------------------------------------------
            // Logical
            // ----------------------------------------------------------------
            Opcode::And => {
                let rhs = self.stack.pop()?;
                let lhs = self.stack.pop()?;
                self.stack
                    .push(Variant::Boolean(lhs.is_true() && rhs.is_true()))?;
            }
            Opcode::Or => {
                let rhs = self.stack.pop()?;
                let lhs = self.stack.pop()?;
                self.stack
                    .push(Variant::Boolean(lhs.is_true() || rhs.is_true()))?;
            }
            Opcode::Not => {
                let value = self.stack.pop()?;
                self.stack.push(Variant::Boolean(!value.is_true()))?;
            }

            // ----------------------------------------------------------------
            // Type
            // ----------------------------------------------------------------
            Opcode::Cast => {
                let value_type = self.read_value_type()?;
                let value = self.stack.pop()?;
                self.stack.push(value.cast(value_type)?)?;
            }
            Opcode::Type => {
                let value = self.stack.pop()?;
                self.stack.push(Variant::ValType(value.value_type()))?;
            }

            // ----------------------------------------------------------------
            // Control flow
            // ----------------------------------------------------------------
            Opcode::Jump => {
                let target = self.read_u32()? as usize;
                self.ip = target;
            }
            Opcode::JumpTrue => {
                let target = self.read_u32()? as usize;
                let value = self.stack.pop()?;
                if value.is_true() {
                    self.ip = target;
                }
            }
            Opcode::JumpFalse => {
                let target = self.read_u32()? as usize;
                let value = self.stack.pop()?;
                if !value.is_true() {
                    self.ip = target;
                }
            }
            Opcode::LoopCount => self.loop_count()?,
            Opcode::LoopOver => self.loop_over()?,
            Opcode::Return => {
                if let Some(step) = self.return_from_call(None)? {
                    return Ok(step);
                }
            }
            Opcode::ReturnValue => {
                let value = self.stack.pop()?;
                if let Some(step) = self.return_from_call(Some(value))? {
                    return Ok(step);
                }
            }
            Opcode::Wait => return Ok(Step::Wait),
            Opcode::Exit => return Ok(Step::Finish),

            // ----------------------------------------------------------------
            // Declarations
            // ----------------------------------------------------------------
            Opcode::Library => {
                // Binding the declared library creates it on first run.
                let name = self.read_name()?;
                self.runtime.library(&name);
            }
            Opcode::Function => self.declare_function()?,
            Opcode::Property => {
                let property = self.with_reader(PropertyName::read)?;
                let library = self.runtime.library(property.library());
                library.register_property_name(property.clone(), false);
                self.runtime.declare_property(&property);
            }

            // ----------------------------------------------------------------
            // Scopes
            // ----------------------------------------------------------------
            Opcode::ScopeBegin => self.variables.scope_begin(),
            Opcode::ScopeEnd => {
                if !self.variables.scope_end() {
                    return Err(RuntimeError::internal("scope marker underflow"));
                }
            }

            // ----------------------------------------------------------------
            // Calls
            // ----------------------------------------------------------------
            Opcode::CallFunc => self.call_function()?,

            // ----------------------------------------------------------------
            // Erase
            // ----------------------------------------------------------------
            Opcode::EraseVar => {
                let name = self.read_name()?;
                let base = self.frame_variable_base();
                if !self.variables.erase(base, &name) {
                    return Err(RuntimeError::UnknownVariable(name));
                }
            }
            Opcode::EraseVarElem => {
                let name = self.read_name()?;
                let key = self.stack.pop()?;
                let base = self.frame_variable_base();
                let value = self
                    .variables
                    .get(base, &name)
                    .ok_or(RuntimeError::UnknownVariable(name))?;
                match value.as_collection() {
                    Some(collection) => {
                        collection.remove(&key);
                    }
                    None => {
                        return Err(RuntimeError::NotACollection {
                            context: "variable subscript",
                            got: value.type_name(),
                        });
                    }
                }
            }
            Opcode::EraseProp => {
                let id = self.read_id()?;
                self.runtime.remove_property(id)?;
            }
            Opcode::ErasePropElem => {
                let id = self.read_id()?;
                let key = self.stack.pop()?;
                self.runtime.remove_property_key(id, &key)?;
            }

            // ----------------------------------------------------------------
            // Increment / decrement
            // ----------------------------------------------------------------
            Opcode::Increment => {
                let amount = self.stack.pop()?;
                let value = self.stack.pop()?;
                self.stack.push(value.add(&amount)?)?;
            }
            Opcode::Decrement => {
                let amount = self.stack.pop()?;
                let value = self.stack.pop()?;
                self.stack.push(value.subtract(&amount)?)?;
            }
        }
        Ok(Step::Continue)
    }

    // ========================================================================
    // Instruction helpers
    // ========================================================================

    fn binary_op(
        &mut self,
        op: impl FnOnce(&Variant, &Variant) -> patter_lang::variant::VariantResult<Variant>,
    ) -> Result<()> {
        let rhs = self.stack.pop()?;
        let lhs = self.stack.pop()?;
        self.stack.push(op(&lhs, &rhs)?)?;
        Ok(())
    }

    fn compare_op(&mut self, test: impl FnOnce(Ordering) -> bool) -> Result<()> {
        let rhs = self.stack.pop()?;
        let lhs = self.stack.pop()?;
        let ordering = lhs.compare(&rhs)?;
        self.stack.push(Variant::Boolean(test(ordering)))?;
        Ok(())
    }

    /// Advance the `[counter, to, by]` triple kept on the operand stack.
    /// While the loop continues, the counter is updated in place and true
    /// is pushed; at the end the triple is popped and false is pushed.
    fn loop_count(&mut self) -> Result<()> {
        let by = self.stack.get_from_top(-1)?;
        let to = self.stack.get_from_top(-2)?;
        let counter = self.stack.get_from_top(-3)?;

        let step = match by {
            Variant::Null => match counter {
                Variant::Number(_) => Variant::Number(1.0),
                _ => Variant::Integer(1),
            },
            other => other,
        };
        let next = counter.add(&step)?;
        let descending = step.compare(&Variant::Integer(0))? == Ordering::Less;
        let continues = if descending {
            next.compare(&to)? != Ordering::Less
        } else {
            next.compare(&to)? != Ordering::Greater
        };

        if continues {
            self.stack.set_from_top(-3, next)?;
            self.stack.push(Variant::Boolean(true))?;
        } else {
            self.stack.pop_count(3)?;
            self.stack.push(Variant::Boolean(false))?;
        }
        Ok(())
    }

    /// Advance the iterator kept on the operand stack. Pushes false while
    /// entries remain (the loop jumps back on false); at the end the
    /// iterator is popped and true is pushed.
    fn loop_over(&mut self) -> Result<()> {
        let top = self.stack.get_from_top(-1)?;
        match top {
            Variant::Iterator(mut iterator) => {
                if iterator.advance() {
                    self.stack.set_from_top(-1, Variant::Iterator(iterator))?;
                    self.stack.push(Variant::Boolean(false))?;
                } else {
                    self.stack.pop()?;
                    self.stack.push(Variant::Boolean(true))?;
                }
                Ok(())
            }
            other => Err(RuntimeError::NotACollection {
                context: "loop iteration",
                got: other.type_name(),
            }),
        }
    }

    /// Handle the `Function` declaration opcode: register the signature
    /// and the body location, then fall through to the jump that skips
    /// the body.
    fn declare_function(&mut self) -> Result<()> {
        let signature = self.with_reader(FunctionSignature::read)?;
        // The next instruction is the Jump over the body: one opcode byte
        // plus a four-byte address.
        let body_offset = self.ip + 5;
        let buffer = Arc::clone(self.bytecode.buffer());

        if signature.visibility() == Visibility::Local {
            self.local_functions.insert(
                signature.id(),
                Arc::new(FunctionDefinition::bytecode(
                    signature,
                    buffer,
                    body_offset,
                )),
            );
        } else {
            // Re-register in the declaring library so a runtime that did
            // not compile this script still resolves the signature.
            let library = self.runtime.library(signature.library());
            library.register_signature(signature.clone(), false);
            self.runtime
                .register_bytecode_function(signature, buffer, body_offset);
        }
        Ok(())
    }

    /// Handle `CallFunc`: dispatch to a native callback or push a frame
    /// into a bytecode body.
    fn call_function(&mut self) -> Result<()> {
        let id = self.read_id()?;
        let definition = self
            .local_functions
            .get(&id)
            .cloned()
            .or_else(|| self.runtime.find_function(id))
            .ok_or(RuntimeError::UnknownFunction(id))?;

        let parameter_count = definition.signature().parameter_count();
        match definition.body() {
            FunctionBody::Native(callback) => {
                let parameters = self.stack.pop_count(parameter_count)?;
                let result = callback(&parameters)?;
                if definition.signature().returns() {
                    self.stack.push(result)?;
                }
            }
            FunctionBody::Bytecode { buffer, offset } => {
                let limit = self.runtime.params().max_call_depth;
                if self.frames.len() >= limit {
                    return Err(RuntimeError::CallDepthExceeded(limit));
                }
                if self.stack.len() < parameter_count {
                    return Err(RuntimeError::StackUnderflow);
                }
                self.frames.push(CallFrame {
                    return_bytecode: self.bytecode.clone(),
                    return_ip: self.ip,
                    stack_base: self.stack.len(),
                    cleanup_base: self.stack.len() - parameter_count,
                    variable_base: self.variables.len(),
                    scope_base: self.variables.scope_count(),
                });
                self.bytecode = Bytecode::from_shared(Arc::clone(buffer));
                self.ip = *offset;
            }
        }
        Ok(())
    }

    /// Unwind one call frame. At the root, a bare `Return` finishes the
    /// script.
    fn return_from_call(&mut self, value: Option<Variant>) -> Result<Option<Step>> {
        match self.frames.pop() {
            Some(frame) => {
                self.stack.truncate(frame.cleanup_base);
                self.variables
                    .unwind_to(frame.variable_base, frame.scope_base);
                self.bytecode = frame.return_bytecode;
                self.ip = frame.return_ip;
                if let Some(value) = value {
                    self.stack.push(value)?;
                }
                Ok(None)
            }
            None => Ok(Some(Step::Finish)),
        }
    }
}
