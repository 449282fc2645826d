//! The state model of the symbolic JVM: values and references, the heap and static store, the
//! thread stack, the path condition, and the class hierarchy they are all interpreted against.

pub mod bytecode;
pub mod class_hierarchy;
pub mod class_loader;
pub mod frame;
pub mod heap;
pub mod path_condition;
pub mod sig;
pub mod stack;
pub mod state;
pub mod value;

mod error;

pub use self::class_hierarchy::{ClassHierarchy, LinkError};
pub use self::class_loader::ClassLoader;
pub use self::error::Error;
pub use self::frame::{Frame, HandlerSearch};
pub use self::heap::{FieldContainer, HeapObject, Klass, KlassStatus};
pub use self::path_condition::{Clause, PathCondition, Resolution};
pub use self::sig::{Signature, Type};
pub use self::state::{State, Unwinding};
pub use self::value::{HeapPosition, Reference, SymbolicRef, Value};
