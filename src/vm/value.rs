//! Internal JVM representations of Java values, concrete and symbolic.

use std::fmt;

use crate::vm::sig::Type;

/// The position of an object in the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeapPosition(pub u64);

impl fmt::Display for HeapPosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A reference whose target is not known yet. It stays unresolved until the path condition
/// binds it either to `null` or to a heap position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolicRef {
    pub id: u64,
    /// Where the reference came from, e.g. `p/A.next` for a static field.
    pub origin: String,
    /// The static type of the reference, as a class name.
    pub static_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    Concrete(HeapPosition),
    Symbolic(SymbolicRef),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Reference::Concrete(position) => write!(f, "{}", position),
            Reference::Symbolic(ref symbolic) => write!(f, "{{R{}}}", symbolic.id),
        }
    }
}

/// A symbolic primitive value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub id: u64,
    pub ty: Type,
    pub origin: String,
}

/// A value in the Java virtual machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A 32-bit signed integral type, representing the Java types `byte`, `char`, `short`, `int`,
    /// and `boolean`.
    Int(i32),
    /// A 32-bit floating-point type, representing the Java type `float`.
    Float(f32),
    /// A 64-bit signed integral type, representing the Java type `long`.
    Long(i64),
    /// A 64-bit floating-point type, representing the Java type `double`.
    Double(f64),
    /// A reference to a Java object, possibly not resolved yet.
    Reference(Reference),
    /// The `null` reference. It is not a `Reference`.
    Null,
    /// A symbolic primitive.
    Symbol(Symbol),
}

impl Value {
    pub fn is_category_2(&self) -> bool {
        match *self {
            Value::Long(_) | Value::Double(_) => true,
            Value::Symbol(ref symbol) => symbol.ty.is_category_2(),
            _ => false,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match *self {
            Value::Reference(ref reference) => Some(reference),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}f", v),
            Value::Long(v) => write!(f, "{}L", v),
            Value::Double(v) => write!(f, "{}d", v),
            Value::Reference(ref reference) => write!(f, "{}", reference),
            Value::Null => write!(f, "null"),
            Value::Symbol(ref symbol) => write!(f, "{{V{}}}", symbol.id),
        }
    }
}
