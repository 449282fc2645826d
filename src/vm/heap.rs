//! Heap objects and the static store entries (Klasses), all of which hold named slots.

use std::collections::BTreeMap;

use crate::vm::error::Error;
use crate::vm::sig::Type;
use crate::vm::value::{HeapPosition, Value};

/// Anything with named slots that instructions can read and write.
pub trait FieldContainer {
    /// The class of the container (for a Klass, the class whose statics it holds).
    fn class_name(&self) -> &str;

    fn get_field(&self, name: &str) -> Result<Value, Error>;

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), Error>;
}

fn no_such_field(class: &str, field: &str) -> Error {
    Error::NoSuchField { class: class.to_owned(), field: field.to_owned() }
}

fn get_named(fields: &BTreeMap<String, Value>, class: &str, name: &str) -> Result<Value, Error> {
    fields.get(name).cloned().ok_or_else(|| no_such_field(class, name))
}

fn set_named(fields: &mut BTreeMap<String, Value>, class: &str, name: &str, value: Value)
             -> Result<(), Error> {
    match fields.get_mut(name) {
        Some(slot) => {
            *slot = value;
            Ok(())
        },
        None => Err(no_such_field(class, name)),
    }
}

/// An instance of a non-array class.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    class_name: String,
    fields: BTreeMap<String, Value>,
}

impl Instance {
    /// Creates an instance with every field set to the default value of its type.
    pub fn new<I>(class_name: &str, fields: I) -> Self
            where I: IntoIterator<Item = (String, Type)> {
        Instance {
            class_name: class_name.to_owned(),
            fields: fields.into_iter().map(|(name, ty)| (name, ty.default_value())).collect(),
        }
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}

impl FieldContainer for Instance {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn get_field(&self, name: &str) -> Result<Value, Error> {
        get_named(&self.fields, &self.class_name, name)
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), Error> {
        set_named(&mut self.fields, &self.class_name, name, value)
    }
}

/// An instance of an array class. Its only field is `length`.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    class_name: String,
    component: Type,
    elements: Vec<Value>,
}

impl Array {
    pub fn new(component: Type, length: i32) -> Result<Self, Error> {
        if length < 0 {
            return Err(Error::NegativeArraySize(length));
        }
        let class_name = Type::Array(Box::new(component.clone())).to_string();
        let mut elements = Vec::new();
        elements.try_reserve_exact(length as usize).map_err(|_| Error::HeapMemoryExhausted)?;
        elements.resize(length as usize, component.default_value());
        Ok(Array { class_name, component, elements })
    }

    pub fn component(&self) -> &Type {
        &self.component
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn check_index(&self, index: i32) -> Result<usize, Error> {
        if index < 0 || index as usize >= self.elements.len() {
            Err(Error::ArrayIndexOutOfBounds { index, length: self.elements.len() })
        } else {
            Ok(index as usize)
        }
    }

    pub fn get(&self, index: i32) -> Result<Value, Error> {
        let index = self.check_index(index)?;
        Ok(self.elements[index].clone())
    }

    pub fn set(&mut self, index: i32, value: Value) -> Result<(), Error> {
        let index = self.check_index(index)?;
        self.elements[index] = value;
        Ok(())
    }
}

impl FieldContainer for Array {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn get_field(&self, name: &str) -> Result<Value, Error> {
        if name == "length" {
            Ok(Value::Int(self.elements.len() as i32))
        } else {
            Err(no_such_field(&self.class_name, name))
        }
    }

    /// Array lengths are immutable, so every store fails.
    fn set_field(&mut self, name: &str, _: Value) -> Result<(), Error> {
        Err(no_such_field(&self.class_name, name))
    }
}

/// The initialization status of a class (§5.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KlassStatus {
    NotInitialized,
    /// The class initialization method frame has been pushed and has not returned yet.
    Initializing,
    Initialized,
}

/// The static fields of a class, together with its initialization status.
#[derive(Debug, Clone, PartialEq)]
pub struct Klass {
    class_name: String,
    status: KlassStatus,
    fields: BTreeMap<String, Value>,
}

impl Klass {
    pub fn new(class_name: &str, status: KlassStatus, fields: BTreeMap<String, Value>) -> Self {
        Klass { class_name: class_name.to_owned(), status, fields }
    }

    pub fn status(&self) -> KlassStatus {
        self.status
    }

    pub fn set_status(&mut self, status: KlassStatus) {
        self.status = status;
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}

impl FieldContainer for Klass {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn get_field(&self, name: &str) -> Result<Value, Error> {
        get_named(&self.fields, &self.class_name, name)
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), Error> {
        set_named(&mut self.fields, &self.class_name, name, value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HeapObject {
    Instance(Instance),
    Array(Array),
}

impl HeapObject {
    pub fn as_container(&self) -> &dyn FieldContainer {
        match *self {
            HeapObject::Instance(ref instance) => instance,
            HeapObject::Array(ref array) => array,
        }
    }

    pub fn as_container_mut(&mut self) -> &mut dyn FieldContainer {
        match *self {
            HeapObject::Instance(ref mut instance) => instance,
            HeapObject::Array(ref mut array) => array,
        }
    }

    pub fn class_name(&self) -> &str {
        self.as_container().class_name()
    }
}

/// Maps heap positions to objects. Positions are never reused.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Heap {
    objects: BTreeMap<HeapPosition, HeapObject>,
    next: u64,
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    pub fn add(&mut self, object: HeapObject) -> HeapPosition {
        let position = HeapPosition(self.next);
        self.next += 1;
        self.objects.insert(position, object);
        position
    }

    pub fn get(&self, position: HeapPosition) -> Result<&HeapObject, Error> {
        self.objects.get(&position).ok_or(Error::InvalidHeapPosition(position.0))
    }

    pub fn get_mut(&mut self, position: HeapPosition) -> Result<&mut HeapObject, Error> {
        self.objects.get_mut(&position).ok_or(Error::InvalidHeapPosition(position.0))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeapPosition, &HeapObject)> {
        self.objects.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instances_start_with_default_values() {
        let mut instance = Instance::new("p/A", vec![
            (String::from("count"), Type::Int),
            (String::from("next"), Type::Reference(String::from("p/A"))),
        ]);
        assert_eq!(instance.get_field("count"), Ok(Value::Int(0)));
        assert_eq!(instance.get_field("next"), Ok(Value::Null));
        instance.set_field("count", Value::Int(3)).unwrap();
        assert_eq!(instance.get_field("count"), Ok(Value::Int(3)));
        assert_eq!(instance.set_field("missing", Value::Int(1)), Err(Error::NoSuchField {
            class: String::from("p/A"),
            field: String::from("missing"),
        }));
    }

    #[test]
    fn arrays_check_bounds_and_sizes() {
        assert_eq!(Array::new(Type::Int, -1), Err(Error::NegativeArraySize(-1)));
        let mut array = Array::new(Type::Long, 2).unwrap();
        assert_eq!(array.class_name(), "[J");
        assert_eq!(array.get_field("length"), Ok(Value::Int(2)));
        array.set(1, Value::Long(9)).unwrap();
        assert_eq!(array.get(1), Ok(Value::Long(9)));
        assert_eq!(array.get(2), Err(Error::ArrayIndexOutOfBounds { index: 2, length: 2 }));
        assert_eq!(array.get(-1), Err(Error::ArrayIndexOutOfBounds { index: -1, length: 2 }));
    }

    #[test]
    fn heap_positions_are_not_reused() {
        let mut heap = Heap::new();
        let first = heap.add(HeapObject::Instance(Instance::new("p/A", vec![])));
        let second = heap.add(HeapObject::Instance(Instance::new("p/B", vec![])));
        assert_ne!(first, second);
        assert_eq!(heap.get(second).map(HeapObject::class_name), Ok("p/B"));
        assert_eq!(heap.get(HeapPosition(7)).err(), Some(Error::InvalidHeapPosition(7)));
    }
}
