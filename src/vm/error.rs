use thiserror::Error;

use crate::model::class_file::InvalidIndex;
use crate::vm::class_hierarchy::LinkError;
use crate::vm::sig::DescriptorError;

/// Failures of the state primitives. Which of them a program can observe, and as which
/// `Throwable`, is decided by the engine at the point where they are caught.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("the thread stack is empty")]
    ThreadStackEmpty,
    #[error("program counter {pc} is outside the code of {method}")]
    InvalidProgramCounter { method: String, pc: usize },
    #[error(transparent)]
    InvalidIndex(#[from] InvalidIndex),
    #[error("local variable slot {slot} does not exist in {method}")]
    InvalidSlot { method: String, slot: usize },
    #[error("operand stack underflow in {0}")]
    OperandStackUnderflow(String),
    #[error("heap memory exhausted")]
    HeapMemoryExhausted,
    #[error("no object at heap position {0}")]
    InvalidHeapPosition(u64),
    #[error("symbolic reference {{R{0}}} is not resolved")]
    UnresolvedReference(u64),
    #[error("symbolic reference {{R{0}}} is already resolved")]
    AlreadyResolved(u64),
    #[error("null reference")]
    NullReference,
    #[error("array index {index} out of bounds for length {length}")]
    ArrayIndexOutOfBounds { index: i32, length: usize },
    #[error("negative array size {0}")]
    NegativeArraySize(i32),
    #[error("no field {field} in {class}")]
    NoSuchField { class: String, field: String },
    #[error("no Klass for {0} in the static store")]
    KlassNotFound(String),
    #[error("{0} must be executed natively")]
    NativeMethod(String),
    #[error("{0} has no code")]
    AbstractMethod(String),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}
