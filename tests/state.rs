use std::rc::Rc;

use pretty_assertions::assert_eq;

use symbolic_jvm::model::class_file::access_flags::field_access_flags;
use symbolic_jvm::model::class_file::ClassFileBuilder;
use symbolic_jvm::vm::{self, ClassHierarchy, Reference, State, Type, Value};

fn state() -> State {
    let mut hierarchy = ClassHierarchy::bootstrap();
    hierarchy.add(ClassFileBuilder::new("p/Counter")
        .field(field_access_flags::ACC_PRIVATE | field_access_flags::ACC_STATIC, "count", "I")
        .build());
    State::new(Rc::new(hierarchy))
}

#[test]
fn statics_live_in_the_klass() {
    let mut state = state();
    assert_eq!(state.get_static("p/Counter", "count"),
               Err(vm::Error::KlassNotFound(String::from("p/Counter"))));

    state.create_klass("p/Counter").unwrap();
    assert_eq!(state.get_static("p/Counter", "count"), Ok(Value::Int(0)));
    state.set_static("p/Counter", "count", Value::Int(3)).unwrap();
    assert_eq!(state.get_static("p/Counter", "count"), Ok(Value::Int(3)));
    assert!(state.get_static("p/Counter", "missing").is_err());
}

#[test]
fn arrays_are_bounds_checked() {
    let mut state = state();
    let array = state.create_array(Type::Int, 2).unwrap();
    state.set_array(&array, 1, Value::Int(9)).unwrap();
    assert_eq!(state.get_array(&array, 0), Ok(Value::Int(0)));
    assert_eq!(state.get_array(&array, 1), Ok(Value::Int(9)));
    assert_eq!(state.get_array(&array, 2),
               Err(vm::Error::ArrayIndexOutOfBounds { index: 2, length: 2 }));
    assert_eq!(state.create_array(Type::Int, -1), Err(vm::Error::NegativeArraySize(-1)));
}

#[test]
fn huge_arrays_exhaust_the_heap() {
    let mut state = state().with_heap_limit(Some(100));
    assert_eq!(state.create_array(Type::Int, i32::MAX), Err(vm::Error::HeapMemoryExhausted));
    assert_eq!(state.heap().len(), 0);
    assert!(state.create_array(Type::Int, 16).is_ok());
}

#[test]
fn instances_are_not_arrays() {
    let mut state = state();
    let string = state.create_instance("java/lang/String").unwrap();
    assert!(matches!(state.get_array(&string, 0), Err(vm::Error::NoSuchField { .. })));
}

#[test]
fn strings_are_interned() {
    let mut state = state();
    let first = state.intern_string("hi").unwrap();
    let second = state.intern_string("hi").unwrap();
    assert_eq!(first, second);
    assert_ne!(first, state.intern_string("ho").unwrap());

    let chars = state.get_field(&first, "value").unwrap();
    let chars = chars.as_reference().unwrap();
    assert_eq!(state.get_array(chars, 1), Ok(Value::Int('i' as i32)));
}

#[test]
fn cloned_states_are_independent_branches() {
    let mut state = state();
    state.create_klass("p/Counter").unwrap();
    let mut branch = state.clone();
    branch.set_static("p/Counter", "count", Value::Int(1)).unwrap();
    branch.create_instance("p/Counter").unwrap();

    assert_eq!(state.get_static("p/Counter", "count"), Ok(Value::Int(0)));
    assert_eq!(state.heap().len() + 1, branch.heap().len());
}

#[test]
fn heap_limit_counts_objects_and_klasses() {
    let mut state = state().with_heap_limit(Some(2));
    state.create_klass("p/Counter").unwrap();
    let reference = state.create_instance("p/Counter").unwrap();
    assert_eq!(state.create_instance("p/Counter"), Err(vm::Error::HeapMemoryExhausted));
    assert!(matches!(reference, Reference::Concrete(_)));

    let throwable = state.create_throwable("java/lang/OutOfMemoryError").unwrap();
    assert_eq!(state.class_of(&throwable), Ok(String::from("java/lang/OutOfMemoryError")));
}
