#![allow(dead_code)]

use std::rc::Rc;

use symbolic_jvm::model::class_file::access_flags::method_access_flags;
use symbolic_jvm::model::class_file::{ClassFile, ClassFileBuilder, Code, ExceptionTableEntry,
                                      MethodInfo};
use symbolic_jvm::vm::bytecode::opcode;
use symbolic_jvm::vm::{ClassHierarchy, Signature, State};

pub const DRIVER: &str = "test/Driver";

pub const PUBLIC_STATIC: u16 = method_access_flags::ACC_PUBLIC | method_access_flags::ACC_STATIC;

/// `static <clinit>()V` that just returns.
pub fn clinit() -> MethodInfo {
    MethodInfo::new(method_access_flags::ACC_STATIC, "<clinit>", "()V",
                    Some(Code::new(0, 0, vec![opcode::RETURN])))
}

pub fn static_method(name: &str, descriptor: &str, code: Vec<u8>) -> MethodInfo {
    MethodInfo::new(PUBLIC_STATIC, name, descriptor, Some(Code::new(4, 4, code)))
}

/// A handler at `handler_pc` for every exception thrown in `start_pc..end_pc`.
pub fn catch_all(start_pc: u16, end_pc: u16, handler_pc: u16) -> ExceptionTableEntry {
    ExceptionTableEntry { start_pc, end_pc, handler_pc, catch_type: 0 }
}

pub fn root_signature() -> Signature {
    Signature::new(DRIVER, "run", "()V")
}

/// A driver class whose `run()V` is a `nop` followed by a `return`, without handlers.
pub fn driver() -> ClassFile {
    driver_with(Code::new(2, 2, vec![opcode::NOP, opcode::RETURN]))
}

pub fn driver_with(code: Code) -> ClassFile {
    ClassFileBuilder::new(DRIVER)
        .method(MethodInfo::new(PUBLIC_STATIC, "run", "()V", Some(code)))
        .build()
}

/// A driver catching everything thrown at its first instruction.
pub fn catching_driver() -> ClassFile {
    driver_with(Code::new(2, 2, vec![opcode::NOP, opcode::POP, opcode::RETURN])
        .with_handler(catch_all(0, 1, 1)))
}

/// A state running the driver's `run()V`, which is the only frame on the thread stack.
pub fn running(mut hierarchy: ClassHierarchy, driver: ClassFile) -> State {
    hierarchy.add(driver);
    let mut state = State::new(Rc::new(hierarchy));
    state.push_frame(&root_signature(), true, 0, vec![]).unwrap();
    state
}

/// The signatures on the thread stack, top first.
pub fn stack_signatures(state: &State) -> Vec<String> {
    state.thread_stack().iter().rev().map(|frame| frame.signature().to_string()).collect()
}
