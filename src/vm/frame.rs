use std::rc::Rc;

use crate::model::class_file::{ClassFile, ExceptionTableEntry, MethodInfo};
use crate::vm::class_hierarchy::ClassHierarchy;
use crate::vm::error::Error;
use crate::vm::sig::Signature;
use crate::vm::value::Value;

/// How strictly `Frame::find_handler` treats malformed exception handler metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerSearch {
    /// Report an invalid program counter or catch type as an error.
    Strict,
    /// Skip handlers with invalid metadata; a frame with an invalid program counter has no
    /// handler. Used once a `VerifyError` is already being thrown.
    Lenient,
}

/// A frame is used to store data and partial results, as well as to perform dynamic linking,
/// return values for methods, and dispatch exceptions.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// The method executing in this frame.
    signature: Signature,
    /// The class declaring the method, whose constant pool the bytecode refers to.
    class: Rc<ClassFile>,
    /// The bytecode. Owned by the frame because some instructions rewrite themselves.
    code: Vec<u8>,
    /// Order is significant.
    exception_table: Vec<ExceptionTableEntry>,
    /// The current program counter.
    pc: usize,
    /// Where execution resumes when the method this frame most recently called returns.
    return_pc: usize,
    /// The local variables of the current method.
    /// Values that occupy two indices (`long` and `double`) are stored in one slot followed by a
    /// `None` value in the subsequent index.
    locals: Vec<Option<Value>>,
    /// The operand stack manipulated by the instructions of the current method.
    operand_stack: Vec<Value>,
}

impl Frame {
    /// Creates a frame for `method`, declared by `class`, with `args` (receiver first, if any)
    /// stored from local variable 0.
    pub fn new(signature: Signature, class: Rc<ClassFile>, method: &MethodInfo, args: Vec<Value>)
               -> Result<Self, Error> {
        let code = match method.code {
            Some(ref code) => code,
            None if method.is_native() => return Err(Error::NativeMethod(signature.to_string())),
            None => return Err(Error::AbstractMethod(signature.to_string())),
        };
        let mut locals = vec![None; code.max_locals as usize];
        let mut slot = 0;
        for arg in args {
            let width = if arg.is_category_2() { 2 } else { 1 };
            if slot + width > locals.len() {
                return Err(Error::InvalidSlot { method: signature.to_string(), slot });
            }
            locals[slot] = Some(arg);
            slot += width;
        }
        Ok(Frame {
            signature,
            class,
            code: code.code.clone(),
            exception_table: code.exception_table.clone(),
            pc: 0,
            return_pc: 0,
            locals,
            operand_stack: vec![],
        })
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn class(&self) -> &Rc<ClassFile> {
        &self.class
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    fn invalid_pc(&self, pc: usize) -> Error {
        Error::InvalidProgramCounter { method: self.signature.to_string(), pc }
    }

    pub fn set_pc(&mut self, pc: usize) -> Result<(), Error> {
        if pc >= self.code.len() {
            return Err(self.invalid_pc(pc));
        }
        self.pc = pc;
        Ok(())
    }

    pub fn return_pc(&self) -> usize {
        self.return_pc
    }

    /// Records that the callee about to be pushed returns to `pc + offset`.
    pub fn set_return_pc_offset(&mut self, offset: usize) {
        self.return_pc = self.pc + offset;
    }

    pub fn opcode_at(&self, pc: usize) -> Result<u8, Error> {
        self.code.get(pc).cloned().ok_or_else(|| self.invalid_pc(pc))
    }

    pub fn current_opcode(&self) -> Result<u8, Error> {
        self.opcode_at(self.pc)
    }

    /// Reads a big-endian unsigned 16-bit operand.
    pub fn read_u16(&self, pc: usize) -> Result<u16, Error> {
        let high = self.opcode_at(pc)? as u16;
        let low = self.opcode_at(pc + 1)? as u16;
        Ok((high << 8) | low)
    }

    /// Rewrites the opcode at `pc` in place, leaving its operands alone.
    pub fn patch_code(&mut self, pc: usize, opcode: u8) -> Result<(), Error> {
        if pc >= self.code.len() {
            return Err(self.invalid_pc(pc));
        }
        self.code[pc] = opcode;
        Ok(())
    }

    pub fn local(&self, slot: usize) -> Result<Option<&Value>, Error> {
        self.locals.get(slot)
            .map(Option::as_ref)
            .ok_or_else(|| Error::InvalidSlot { method: self.signature.to_string(), slot })
    }

    pub fn operand_stack(&self) -> &[Value] {
        &self.operand_stack
    }

    pub fn push_operand(&mut self, value: Value) {
        self.operand_stack.push(value);
    }

    /// Pops the top `count` operands, returning them in the order they were pushed.
    pub fn pop_operands(&mut self, count: usize) -> Result<Vec<Value>, Error> {
        if count > self.operand_stack.len() {
            return Err(Error::OperandStackUnderflow(self.signature.to_string()));
        }
        let start = self.operand_stack.len() - count;
        Ok(self.operand_stack.split_off(start))
    }

    /// The operand `depth` entries below the top; 0 is the top.
    pub fn peek_operand(&self, depth: usize) -> Option<&Value> {
        self.operand_stack.iter().rev().nth(depth)
    }

    pub fn clear_operand_stack(&mut self) {
        self.operand_stack.clear();
    }

    /// Searches the exception table, in order, for a handler whose range covers the current
    /// program counter and whose catch type is `thrown_class` or one of its superclasses.
    /// Returns the handler's program counter.
    pub fn find_handler(&self, hierarchy: &ClassHierarchy, thrown_class: &str,
                        search: HandlerSearch) -> Result<Option<usize>, Error> {
        if self.pc >= self.code.len() {
            return match search {
                HandlerSearch::Strict => Err(self.invalid_pc(self.pc)),
                HandlerSearch::Lenient => Ok(None),
            };
        }
        for entry in self.exception_table.iter().filter(|entry| entry.covers(self.pc)) {
            if entry.catch_type != 0 {
                let catch_class = match self.class.constant_pool.class_name(entry.catch_type) {
                    Ok(name) => name,
                    Err(e) => match search {
                        HandlerSearch::Strict => return Err(Error::InvalidIndex(e)),
                        HandlerSearch::Lenient => continue,
                    },
                };
                if !hierarchy.is_subclass(thrown_class, catch_class) {
                    continue;
                }
            }
            // only the handler actually jumped to must be inside the code
            let handler_pc = entry.handler_pc as usize;
            if handler_pc < self.code.len() {
                return Ok(Some(handler_pc));
            }
            if let HandlerSearch::Strict = search {
                return Err(self.invalid_pc(handler_pc));
            }
        }
        Ok(None)
    }
}
