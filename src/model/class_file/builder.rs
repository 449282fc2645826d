//! Programmatic construction of class files, for the bootstrap classes that every hierarchy
//! carries and for synthesizing classes in tests and tools.

use std::collections::HashMap;

use super::access_flags::{class_access_flags, field_access_flags};
use super::constant_pool::{constant_pool_index, ConstantPool, ConstantPoolInfo};
use super::{ClassFile, FieldInfo, MethodInfo};

pub const JAVA_8_MAJOR_VERSION: u16 = 52;

/// Builds a `ClassFile`, interning constant pool entries as they are requested so that the
/// indices it hands out can be embedded in bytecode and exception tables.
#[derive(Debug)]
pub struct ClassFileBuilder {
    access_flags: u16,
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<FieldInfo>,
    methods: Vec<MethodInfo>,
    constant_pool: ConstantPool,
    utf8s: HashMap<String, constant_pool_index>,
    classes: HashMap<String, constant_pool_index>,
}

impl ClassFileBuilder {
    /// A public class extending `java/lang/Object`.
    pub fn new(name: &str) -> Self {
        ClassFileBuilder {
            access_flags: class_access_flags::ACC_PUBLIC | class_access_flags::ACC_SUPER,
            name: name.to_owned(),
            super_name: Some(String::from("java/lang/Object")),
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            constant_pool: ConstantPool::new(),
            utf8s: HashMap::new(),
            classes: HashMap::new(),
        }
    }

    /// A public interface. Interfaces still name `java/lang/Object` as their superclass.
    pub fn interface(name: &str) -> Self {
        let mut builder = ClassFileBuilder::new(name);
        builder.access_flags = class_access_flags::ACC_PUBLIC | class_access_flags::ACC_INTERFACE
            | class_access_flags::ACC_ABSTRACT;
        builder
    }

    pub fn access_flags(&mut self, access_flags: u16) -> &mut Self {
        self.access_flags = access_flags;
        self
    }

    pub fn super_class(&mut self, super_name: Option<&str>) -> &mut Self {
        self.super_name = super_name.map(str::to_owned);
        self
    }

    pub fn implements(&mut self, interface: &str) -> &mut Self {
        self.interfaces.push(interface.to_owned());
        self
    }

    pub fn field(&mut self, access_flags: u16, name: &str, descriptor: &str) -> &mut Self {
        self.fields.push(FieldInfo::new(access_flags, name, descriptor));
        self
    }

    /// Declares a `static final` field initialized by a `ConstantValue` attribute pointing at
    /// `constant_value`. The index is not validated.
    pub fn constant_field(&mut self, name: &str, descriptor: &str,
                          constant_value: constant_pool_index) -> &mut Self {
        let access_flags = field_access_flags::ACC_PUBLIC | field_access_flags::ACC_STATIC
            | field_access_flags::ACC_FINAL;
        let mut field = FieldInfo::new(access_flags, name, descriptor);
        field.constant_value = Some(constant_value);
        self.fields.push(field);
        self
    }

    pub fn method(&mut self, method: MethodInfo) -> &mut Self {
        self.methods.push(method);
        self
    }

    pub fn utf8(&mut self, value: &str) -> constant_pool_index {
        if let Some(&index) = self.utf8s.get(value) {
            return index;
        }
        let index = self.constant_pool.push(ConstantPoolInfo::Utf8 { value: value.to_owned() });
        self.utf8s.insert(value.to_owned(), index);
        index
    }

    pub fn class_ref(&mut self, name: &str) -> constant_pool_index {
        if let Some(&index) = self.classes.get(name) {
            return index;
        }
        let name_index = self.utf8(name);
        let index = self.constant_pool.push(ConstantPoolInfo::Class { name_index });
        self.classes.insert(name.to_owned(), index);
        index
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> constant_pool_index {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.constant_pool.push(ConstantPoolInfo::NameAndType { name_index, descriptor_index })
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> constant_pool_index {
        let class_index = self.class_ref(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.constant_pool.push(ConstantPoolInfo::MethodRef { class_index, name_and_type_index })
    }

    pub fn interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str)
            -> constant_pool_index {
        let class_index = self.class_ref(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.constant_pool.push(ConstantPoolInfo::InterfaceMethodRef {
            class_index,
            name_and_type_index,
        })
    }

    pub fn integer(&mut self, value: i32) -> constant_pool_index {
        self.constant_pool.push(ConstantPoolInfo::Integer { value })
    }

    pub fn long(&mut self, value: i64) -> constant_pool_index {
        self.constant_pool.push(ConstantPoolInfo::Long { value })
    }

    pub fn string(&mut self, value: &str) -> constant_pool_index {
        let string_index = self.utf8(value);
        self.constant_pool.push(ConstantPoolInfo::String { string_index })
    }

    pub fn build(&mut self) -> ClassFile {
        // make sure the class names appear in the pool, as they would in a compiled class
        let name = self.name.clone();
        self.class_ref(&name);
        if let Some(super_name) = self.super_name.clone() {
            self.class_ref(&super_name);
        }
        ClassFile {
            minor_version: 0,
            major_version: JAVA_8_MAJOR_VERSION,
            constant_pool: self.constant_pool.clone(),
            access_flags: self.access_flags,
            name,
            super_name: self.super_name.clone(),
            interfaces: self.interfaces.clone(),
            fields: self.fields.clone(),
            methods: self.methods.clone(),
        }
    }
}
