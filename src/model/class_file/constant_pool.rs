use thiserror::Error;

use crate::util::one_indexed_vec::OneIndexedVec;

#[allow(non_camel_case_types)]
pub type constant_pool_index = u16;

pub mod tags {
    pub const UTF_8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELD_REF: u8 = 9;
    pub const METHOD_REF: u8 = 10;
    pub const INTERFACE_METHOD_REF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
}

/// A constant pool index that does not exist or does not hold the kind of entry the caller
/// required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid constant pool index {0}")]
pub struct InvalidIndex(pub constant_pool_index);

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantPoolInfo {
    Utf8 { value: String },
    Integer { value: i32 },
    Float { value: f32 },
    Long { value: i64 },
    Double { value: f64 },
    Class { name_index: constant_pool_index },
    String { string_index: constant_pool_index },
    FieldRef { class_index: constant_pool_index, name_and_type_index: constant_pool_index },
    MethodRef { class_index: constant_pool_index, name_and_type_index: constant_pool_index },
    InterfaceMethodRef {
        class_index: constant_pool_index,
        name_and_type_index: constant_pool_index,
    },
    NameAndType { name_index: constant_pool_index, descriptor_index: constant_pool_index },
    MethodHandle { reference_kind: u8, reference_index: constant_pool_index },
    MethodType { descriptor_index: constant_pool_index },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: constant_pool_index,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: constant_pool_index,
    },
    /// The slot following a `Long` or `Double` entry, which the format declares unusable.
    Unusable,
}

impl ConstantPoolInfo {
    /// `Long` and `Double` entries take up two slots in the constant pool.
    pub fn is_wide(&self) -> bool {
        matches!(*self, ConstantPoolInfo::Long { .. } | ConstantPoolInfo::Double { .. })
    }
}

/// The kind of a member reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Method,
    InterfaceMethod,
}

/// A fully dereferenced `FieldRef`, `MethodRef` or `InterfaceMethodRef` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef<'a> {
    pub kind: MemberKind,
    pub class: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
}

/// A loadable constant, as referenced by a `ConstantValue` attribute or an `ldc` instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal<'a> {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(&'a str),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstantPool {
    entries: OneIndexedVec<ConstantPoolInfo>,
}

impl ConstantPool {
    pub fn new() -> Self {
        ConstantPool { entries: OneIndexedVec::new() }
    }

    /// Appends an entry, followed by an unusable slot for wide entries, and returns its index.
    pub fn push(&mut self, info: ConstantPoolInfo) -> constant_pool_index {
        let wide = info.is_wide();
        let index = self.entries.push(info);
        if wide {
            self.entries.push(ConstantPoolInfo::Unusable);
        }
        index as constant_pool_index
    }

    /// The number of slots, counting the unusable slot after each wide entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: constant_pool_index) -> Option<&ConstantPoolInfo> {
        self.entries.get(index as usize)
    }

    pub fn utf8(&self, index: constant_pool_index) -> Result<&str, InvalidIndex> {
        match self.get(index) {
            Some(ConstantPoolInfo::Utf8 { value }) => Ok(value.as_str()),
            _ => Err(InvalidIndex(index)),
        }
    }

    /// The binary name of the class denoted by a `Class` entry.
    pub fn class_name(&self, index: constant_pool_index) -> Result<&str, InvalidIndex> {
        match self.get(index) {
            Some(&ConstantPoolInfo::Class { name_index }) =>
                self.utf8(name_index).map_err(|_| InvalidIndex(index)),
            _ => Err(InvalidIndex(index)),
        }
    }

    pub fn name_and_type(&self, index: constant_pool_index) -> Result<(&str, &str), InvalidIndex> {
        match self.get(index) {
            Some(&ConstantPoolInfo::NameAndType { name_index, descriptor_index }) => {
                let name = self.utf8(name_index).map_err(|_| InvalidIndex(index))?;
                let descriptor = self.utf8(descriptor_index).map_err(|_| InvalidIndex(index))?;
                Ok((name, descriptor))
            },
            _ => Err(InvalidIndex(index)),
        }
    }

    pub fn member_ref(&self, index: constant_pool_index) -> Result<MemberRef, InvalidIndex> {
        let (kind, class_index, name_and_type_index) = match self.get(index) {
            Some(&ConstantPoolInfo::FieldRef { class_index, name_and_type_index }) =>
                (MemberKind::Field, class_index, name_and_type_index),
            Some(&ConstantPoolInfo::MethodRef { class_index, name_and_type_index }) =>
                (MemberKind::Method, class_index, name_and_type_index),
            Some(&ConstantPoolInfo::InterfaceMethodRef { class_index, name_and_type_index }) =>
                (MemberKind::InterfaceMethod, class_index, name_and_type_index),
            _ => return Err(InvalidIndex(index)),
        };
        let class = self.class_name(class_index).map_err(|_| InvalidIndex(index))?;
        let (name, descriptor) = self.name_and_type(name_and_type_index)
            .map_err(|_| InvalidIndex(index))?;
        Ok(MemberRef { kind, class, name, descriptor })
    }

    pub fn literal(&self, index: constant_pool_index) -> Result<Literal, InvalidIndex> {
        match self.get(index) {
            Some(&ConstantPoolInfo::Integer { value }) => Ok(Literal::Int(value)),
            Some(&ConstantPoolInfo::Float { value }) => Ok(Literal::Float(value)),
            Some(&ConstantPoolInfo::Long { value }) => Ok(Literal::Long(value)),
            Some(&ConstantPoolInfo::Double { value }) => Ok(Literal::Double(value)),
            Some(&ConstantPoolInfo::String { string_index }) =>
                self.utf8(string_index).map(Literal::String).map_err(|_| InvalidIndex(index)),
            _ => Err(InvalidIndex(index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method_pool() -> (ConstantPool, constant_pool_index) {
        let mut pool = ConstantPool::new();
        let class_name = pool.push(ConstantPoolInfo::Utf8 { value: "p/A".to_owned() });
        let class_index = pool.push(ConstantPoolInfo::Class { name_index: class_name });
        let name_index = pool.push(ConstantPoolInfo::Utf8 { value: "run".to_owned() });
        let descriptor_index = pool.push(ConstantPoolInfo::Utf8 { value: "(I)V".to_owned() });
        let name_and_type_index =
            pool.push(ConstantPoolInfo::NameAndType { name_index, descriptor_index });
        let method_index =
            pool.push(ConstantPoolInfo::MethodRef { class_index, name_and_type_index });
        (pool, method_index)
    }

    #[test]
    fn dereferences_method_refs() {
        let (pool, index) = method_pool();
        let member = pool.member_ref(index).unwrap();
        assert_eq!(member.kind, MemberKind::Method);
        assert_eq!(member.class, "p/A");
        assert_eq!(member.name, "run");
        assert_eq!(member.descriptor, "(I)V");
    }

    #[test]
    fn wrong_kind_or_missing_entry_is_an_invalid_index() {
        let (pool, index) = method_pool();
        assert_eq!(pool.class_name(index), Err(InvalidIndex(index)));
        assert_eq!(pool.member_ref(0), Err(InvalidIndex(0)));
        assert_eq!(pool.literal(99), Err(InvalidIndex(99)));
    }

    #[test]
    fn wide_entries_take_two_slots() {
        let mut pool = ConstantPool::new();
        let long_index = pool.push(ConstantPoolInfo::Long { value: 7 });
        let next = pool.push(ConstantPoolInfo::Integer { value: 3 });
        assert_eq!(long_index, 1);
        assert_eq!(next, 3);
        assert_eq!(pool.get(2), Some(&ConstantPoolInfo::Unusable));
        assert_eq!(pool.literal(long_index), Ok(Literal::Long(7)));
    }

    #[test]
    fn default_pool_is_empty() {
        let pool = ConstantPool::default();
        assert!(pool.is_empty());
        assert_eq!(pool.get(1), None);
    }
}
