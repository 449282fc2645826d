//! Structures for the [Java SE 8 JVM class file
//! format](https://docs.oracle.com/javase/specs/jvms/se8/html/jvms-4.html), reduced to what the
//! execution engine consumes. Names that the format stores as constant pool indices (this class,
//! superclass, interfaces, member names and descriptors) are dereferenced at parse time; indices
//! that the engine must validate lazily (exception handler catch types, `ConstantValue`
//! attributes, and bytecode operands) are kept raw.

pub mod builder;
pub mod constant_pool;

pub use self::builder::ClassFileBuilder;
pub use self::constant_pool::{constant_pool_index, ConstantPool, ConstantPoolInfo, InvalidIndex};

pub mod access_flags {
    pub mod class_access_flags {
        pub const ACC_PUBLIC: u16 = 0x0001;
        pub const ACC_FINAL: u16 = 0x0010;
        pub const ACC_SUPER: u16 = 0x0020;
        pub const ACC_INTERFACE: u16 = 0x0200;
        pub const ACC_ABSTRACT: u16 = 0x0400;
        pub const ACC_SYNTHETIC: u16 = 0x1000;
        pub const ACC_ANNOTATION: u16 = 0x2000;
        pub const ACC_ENUM: u16 = 0x4000;
    }

    pub mod field_access_flags {
        pub const ACC_PUBLIC: u16 = 0x0001;
        pub const ACC_PRIVATE: u16 = 0x0002;
        pub const ACC_PROTECTED: u16 = 0x0004;
        pub const ACC_STATIC: u16 = 0x0008;
        pub const ACC_FINAL: u16 = 0x0010;
        pub const ACC_VOLATILE: u16 = 0x0040;
        pub const ACC_TRANSIENT: u16 = 0x0080;
        pub const ACC_SYNTHETIC: u16 = 0x1000;
        pub const ACC_ENUM: u16 = 0x4000;
    }

    pub mod method_access_flags {
        pub const ACC_PUBLIC: u16 = 0x0001;
        pub const ACC_PRIVATE: u16 = 0x0002;
        pub const ACC_PROTECTED: u16 = 0x0004;
        pub const ACC_STATIC: u16 = 0x0008;
        pub const ACC_FINAL: u16 = 0x0010;
        pub const ACC_SYNCHRONIZED: u16 = 0x0020;
        pub const ACC_BRIDGE: u16 = 0x0040;
        pub const ACC_VARARGS: u16 = 0x0080;
        pub const ACC_NATIVE: u16 = 0x0100;
        pub const ACC_ABSTRACT: u16 = 0x0400;
        pub const ACC_STRICT: u16 = 0x0800;
        pub const ACC_SYNTHETIC: u16 = 0x1000;
    }
}

use self::access_flags::{class_access_flags, field_access_flags, method_access_flags};

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    /// Mask of flags used to denote access permissions to and properties of this field.
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    /// The constant pool index carried by a `ConstantValue` attribute, if the field has one.
    /// Only meaningful for `static` fields.
    pub constant_value: Option<constant_pool_index>,
}

impl FieldInfo {
    pub fn new(access_flags: u16, name: &str, descriptor: &str) -> Self {
        FieldInfo {
            access_flags,
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            constant_value: None,
        }
    }

    pub fn is_static(&self) -> bool {
        self.access_flags & field_access_flags::ACC_STATIC != 0
    }
}

/// Each `ExceptionTableEntry` describes one exception handler in the `code` array. The order of
/// the handlers in an `exception_table` array is significant (§2.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    /// The (inclusive) start of the range in the `code` array at which the handler is active.
    pub start_pc: u16,
    /// The (exclusive) end of the range at which the handler is active.
    pub end_pc: u16,
    /// The start of the exception handler.
    pub handler_pc: u16,
    /// If nonzero, a constant pool index of a `Class` entry naming the class of exceptions this
    /// handler catches. Zero catches everything (it is used to implement `finally`).
    pub catch_type: constant_pool_index,
}

impl ExceptionTableEntry {
    pub fn covers(&self, pc: usize) -> bool {
        (self.start_pc as usize) <= pc && pc < (self.end_pc as usize)
    }
}

/// The contents of a `Code` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
}

impl Code {
    pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> Self {
        Code { max_stack, max_locals, code, exception_table: vec![] }
    }

    pub fn with_handler(mut self, entry: ExceptionTableEntry) -> Self {
        self.exception_table.push(entry);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    /// Mask of flags used to denote access permissions to and properties of this method.
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    /// Not present for `abstract` and `native` methods.
    pub code: Option<Code>,
}

impl MethodInfo {
    pub fn new(access_flags: u16, name: &str, descriptor: &str, code: Option<Code>) -> Self {
        MethodInfo {
            access_flags,
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            code,
        }
    }

    pub fn is_public(&self) -> bool {
        self.access_flags & method_access_flags::ACC_PUBLIC != 0
    }

    pub fn is_private(&self) -> bool {
        self.access_flags & method_access_flags::ACC_PRIVATE != 0
    }

    pub fn is_protected(&self) -> bool {
        self.access_flags & method_access_flags::ACC_PROTECTED != 0
    }

    pub fn is_static(&self) -> bool {
        self.access_flags & method_access_flags::ACC_STATIC != 0
    }

    pub fn is_native(&self) -> bool {
        self.access_flags & method_access_flags::ACC_NATIVE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & method_access_flags::ACC_ABSTRACT != 0
    }

    pub fn is_varargs(&self) -> bool {
        self.access_flags & method_access_flags::ACC_VARARGS != 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    /// Table of structures representing various string constants, class and interface names,
    /// field names, and other constants. Indexed from 1.
    pub constant_pool: ConstantPool,
    /// Mask of flags used to denote access permissions to and properties of this class or
    /// interface.
    pub access_flags: u16,
    /// The binary name of the class, e.g. `java/lang/Object`.
    pub name: String,
    /// The direct superclass. `None` only for `java/lang/Object`.
    pub super_name: Option<String>,
    /// The direct superinterfaces, in declaration order.
    pub interfaces: Vec<String>,
    /// Only the fields declared by this class or interface.
    pub fields: Vec<FieldInfo>,
    /// Only the methods declared by this class or interface.
    pub methods: Vec<MethodInfo>,
}

impl ClassFile {
    pub fn is_interface(&self) -> bool {
        self.access_flags & class_access_flags::ACC_INTERFACE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & class_access_flags::ACC_ABSTRACT != 0
    }

    pub fn has_super_flag(&self) -> bool {
        self.access_flags & class_access_flags::ACC_SUPER != 0
    }

    /// The method declared in this class with the given name and descriptor.
    pub fn get_method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The run-time package of the class: its binary name up to the last `/`.
    pub fn package(&self) -> &str {
        package_of(&self.name)
    }
}

pub fn package_of(class_name: &str) -> &str {
    match class_name.rfind('/') {
        Some(i) => &class_name[..i],
        None => "",
    }
}
