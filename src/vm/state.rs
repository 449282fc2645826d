use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use log::{debug, trace};

use crate::model::class_file::constant_pool::Literal;
use crate::model::class_file::{constant_pool_index, ClassFile};
use crate::vm::class_hierarchy::{ClassHierarchy, LinkError, JAVA_LANG_STRING};
use crate::vm::error::Error;
use crate::vm::frame::{Frame, HandlerSearch};
use crate::vm::heap::{Array, FieldContainer, Heap, HeapObject, Instance, Klass, KlassStatus};
use crate::vm::path_condition::{Clause, PathCondition, Resolution};
use crate::vm::sig::{Signature, Type};
use crate::vm::stack::ThreadStack;
use crate::vm::value::{HeapPosition, Reference, Symbol, SymbolicRef, Value};

/// How a `throw_it` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unwinding {
    /// A handler caught the exception; its frame is now the current one.
    Caught { handler_pc: usize },
    /// No frame had a handler: the thread stack is now empty and the thread has terminated.
    Uncaught,
}

/// The state of one branch of the symbolic execution: thread stack, heap, static store and
/// path condition. Cloning a `State` forks the branch.
#[derive(Debug, Clone)]
pub struct State {
    hierarchy: Rc<ClassHierarchy>,
    stack: ThreadStack,
    heap: Heap,
    static_store: BTreeMap<String, Klass>,
    path_condition: PathCondition,
    strings: HashMap<String, HeapPosition>,
    /// Maximum number of heap objects plus Klasses. Throwables the engine synthesizes are
    /// exempt.
    heap_limit: Option<usize>,
    next_symbol: u64,
    uncaught: Option<Reference>,
}

impl State {
    pub fn new(hierarchy: Rc<ClassHierarchy>) -> Self {
        State {
            hierarchy,
            stack: ThreadStack::new(),
            heap: Heap::new(),
            static_store: BTreeMap::new(),
            path_condition: PathCondition::new(),
            strings: HashMap::new(),
            heap_limit: None,
            next_symbol: 0,
            uncaught: None,
        }
    }

    pub fn with_heap_limit(mut self, heap_limit: Option<usize>) -> Self {
        self.heap_limit = heap_limit;
        self
    }

    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    pub fn thread_stack(&self) -> &ThreadStack {
        &self.stack
    }

    pub fn stack_height(&self) -> usize {
        self.stack.height()
    }

    pub fn current_frame(&self) -> Result<&Frame, Error> {
        self.stack.current()
    }

    pub fn current_frame_mut(&mut self) -> Result<&mut Frame, Error> {
        self.stack.current_mut()
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn static_store(&self) -> &BTreeMap<String, Klass> {
        &self.static_store
    }

    pub fn klass(&self, class: &str) -> Option<&Klass> {
        self.static_store.get(class)
    }

    pub fn path_condition(&self) -> &PathCondition {
        &self.path_condition
    }

    /// The exception that terminated the thread, if one did.
    pub fn uncaught(&self) -> Option<&Reference> {
        self.uncaught.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.uncaught.is_some()
    }

    fn check_capacity(&self) -> Result<(), Error> {
        match self.heap_limit {
            Some(limit) if self.heap.len() + self.static_store.len() >= limit =>
                Err(Error::HeapMemoryExhausted),
            _ => Ok(()),
        }
    }

    // Classes and the static store

    /// Whether the static store has a Klass for `class`, whatever its status.
    pub fn initialized(&self, class: &str) -> bool {
        self.static_store.contains_key(class)
    }

    fn literal_value(&mut self, class_file: &ClassFile, index: constant_pool_index)
                     -> Result<Value, Error> {
        Ok(match class_file.constant_pool.literal(index)? {
            Literal::Int(value) => Value::Int(value),
            Literal::Float(value) => Value::Float(value),
            Literal::Long(value) => Value::Long(value),
            Literal::Double(value) => Value::Double(value),
            Literal::String(value) => {
                let value = value.to_owned();
                Value::Reference(self.intern_string(&value)?)
            },
        })
    }

    fn fresh_value(&mut self, ty: &Type, origin: String) -> Value {
        match ty.class_name() {
            Some(class) => Value::Reference(Reference::Symbolic(self.new_symbolic_ref(&origin, &class))),
            None => Value::Symbol(self.new_symbol(&origin, ty.clone())),
        }
    }

    /// The initial values of the static fields of a class. Fields with a `ConstantValue`
    /// attribute get that value; the others get the default value of their type, or a fresh
    /// symbolic value if `symbolic` is set.
    fn static_values(&mut self, class_file: &ClassFile, symbolic: bool)
                     -> Result<BTreeMap<String, Value>, Error> {
        let mut fields = BTreeMap::new();
        for field in class_file.fields.iter().filter(|field| field.is_static()) {
            let ty = Type::parse(&field.descriptor)?;
            let value = match field.constant_value {
                Some(index) => self.literal_value(class_file, index)?,
                None if symbolic => self.fresh_value(&ty, format!("{}.{}", class_file.name, field.name)),
                None => ty.default_value(),
            };
            fields.insert(field.name.clone(), value);
        }
        Ok(fields)
    }

    /// Creates the Klass for `class` in status `NotInitialized`, with its static fields set to
    /// their default or constant values. Does nothing if the Klass exists already.
    pub fn create_klass(&mut self, class: &str) -> Result<(), Error> {
        if self.static_store.contains_key(class) {
            return Ok(());
        }
        let class_file = self.hierarchy.get_class_file(class)?;
        self.check_capacity()?;
        let fields = self.static_values(&class_file, false)?;
        trace!("created Klass for {}", class);
        self.static_store.insert(class.to_owned(), Klass::new(class, KlassStatus::NotInitialized, fields));
        Ok(())
    }

    pub fn remove_klass(&mut self, class: &str) -> Option<Klass> {
        self.static_store.remove(class)
    }

    pub fn set_klass_status(&mut self, class: &str, status: KlassStatus) -> Result<(), Error> {
        match self.static_store.get_mut(class) {
            Some(klass) => {
                klass.set_status(status);
                Ok(())
            },
            None => Err(Error::KlassNotFound(class.to_owned())),
        }
    }

    /// Assumes that `class` was initialized before the execution started. Its Klass, and those
    /// of any superclasses that have none yet, are created `Initialized`, with a fresh symbolic
    /// value in every static field that has no constant value.
    pub fn assume_class_initialized(&mut self, class: &str) -> Result<(), Error> {
        let chain = self.hierarchy.superclass_chain(class)?;
        // superclasses first
        for class_file in chain.iter().rev() {
            if self.static_store.contains_key(&class_file.name) {
                continue;
            }
            self.check_capacity()?;
            let fields = self.static_values(class_file, true)?;
            self.path_condition.push(Clause::AssumeClassInitialized(class_file.name.clone()));
            self.static_store.insert(class_file.name.clone(),
                                     Klass::new(&class_file.name, KlassStatus::Initialized, fields));
        }
        Ok(())
    }

    /// Assumes that `class` is initialized during the execution. Creating its Klass and
    /// running its initializer is up to the caller.
    pub fn assume_class_not_initialized(&mut self, class: &str) {
        self.path_condition.push(Clause::AssumeClassNotInitialized(class.to_owned()));
    }

    fn klass_mut(&mut self, class: &str) -> Result<&mut Klass, Error> {
        self.static_store.get_mut(class).ok_or_else(|| Error::KlassNotFound(class.to_owned()))
    }

    pub fn get_static(&self, class: &str, field: &str) -> Result<Value, Error> {
        self.static_store.get(class)
            .ok_or_else(|| Error::KlassNotFound(class.to_owned()))?
            .get_field(field)
    }

    pub fn set_static(&mut self, class: &str, field: &str, value: Value) -> Result<(), Error> {
        self.klass_mut(class)?.set_field(field, value)
    }

    // Heap

    fn allocate(&mut self, object: HeapObject, limited: bool) -> Result<Reference, Error> {
        if limited {
            self.check_capacity()?;
        }
        Ok(Reference::Concrete(self.heap.add(object)))
    }

    /// Creates an instance of `class` with every field set to its default value.
    pub fn create_instance(&mut self, class: &str) -> Result<Reference, Error> {
        let fields = self.hierarchy.instance_fields(class)?;
        self.allocate(HeapObject::Instance(Instance::new(class, fields)), true)
    }

    /// Like `create_instance`, but never exhausts the heap, so that the engine can always
    /// materialize the exceptions it throws (an `OutOfMemoryError` included).
    pub fn create_throwable(&mut self, class: &str) -> Result<Reference, Error> {
        let fields = self.hierarchy.instance_fields(class)?;
        self.allocate(HeapObject::Instance(Instance::new(class, fields)), false)
    }

    pub fn create_array(&mut self, component: Type, length: i32) -> Result<Reference, Error> {
        let array = Array::new(component, length)?;
        self.allocate(HeapObject::Array(array), true)
    }

    /// Returns the unique `java/lang/String` instance for a literal, creating it on first use.
    pub fn intern_string(&mut self, value: &str) -> Result<Reference, Error> {
        if let Some(&position) = self.strings.get(value) {
            return Ok(Reference::Concrete(position));
        }
        let chars = self.create_array(Type::Char, value.encode_utf16().count() as i32)?;
        for (i, unit) in value.encode_utf16().enumerate() {
            self.set_array(&chars, i as i32, Value::Int(unit as i32))?;
        }
        let string = self.create_instance(JAVA_LANG_STRING)?;
        self.set_field(&string, "value", Value::Reference(chars))?;
        if let Reference::Concrete(position) = string {
            self.strings.insert(value.to_owned(), position);
        }
        Ok(string)
    }

    /// What a reference points to, if that is known in this state.
    pub fn resolve(&self, reference: &Reference) -> Option<Resolution> {
        match *reference {
            Reference::Concrete(position) => Some(Resolution::Position(position)),
            Reference::Symbolic(ref symbolic) => self.path_condition.resolution(symbolic.id),
        }
    }

    /// The heap position a reference points to, if it is known and not `null`.
    pub fn position_of(&self, reference: &Reference) -> Option<HeapPosition> {
        match self.resolve(reference) {
            Some(Resolution::Position(position)) => Some(position),
            Some(Resolution::Null) | None => None,
        }
    }

    fn object_position(&self, reference: &Reference) -> Result<HeapPosition, Error> {
        match (self.resolve(reference), reference) {
            (Some(Resolution::Position(position)), _) => Ok(position),
            (Some(Resolution::Null), _) => Err(Error::NullReference),
            (None, &Reference::Symbolic(ref symbolic)) => Err(Error::UnresolvedReference(symbolic.id)),
            (None, &Reference::Concrete(position)) => Err(Error::InvalidHeapPosition(position.0)),
        }
    }

    pub fn object(&self, reference: &Reference) -> Result<&HeapObject, Error> {
        let position = self.object_position(reference)?;
        self.heap.get(position)
    }

    fn object_mut(&mut self, reference: &Reference) -> Result<&mut HeapObject, Error> {
        let position = self.object_position(reference)?;
        self.heap.get_mut(position)
    }

    pub fn class_of(&self, reference: &Reference) -> Result<String, Error> {
        self.object(reference).map(|object| object.class_name().to_owned())
    }

    pub fn get_field(&self, reference: &Reference, field: &str) -> Result<Value, Error> {
        self.object(reference)?.as_container().get_field(field)
    }

    pub fn set_field(&mut self, reference: &Reference, field: &str, value: Value)
                     -> Result<(), Error> {
        self.object_mut(reference)?.as_container_mut().set_field(field, value)
    }

    pub fn get_array(&self, reference: &Reference, index: i32) -> Result<Value, Error> {
        match *self.object(reference)? {
            HeapObject::Array(ref array) => array.get(index),
            HeapObject::Instance(ref instance) => Err(Error::NoSuchField {
                class: instance.class_name().to_owned(),
                field: format!("[{}]", index),
            }),
        }
    }

    pub fn set_array(&mut self, reference: &Reference, index: i32, value: Value)
                     -> Result<(), Error> {
        match *self.object_mut(reference)? {
            HeapObject::Array(ref mut array) => array.set(index, value),
            HeapObject::Instance(ref instance) => Err(Error::NoSuchField {
                class: instance.class_name().to_owned(),
                field: format!("[{}]", index),
            }),
        }
    }

    // Symbolic values

    pub fn new_symbolic_ref(&mut self, origin: &str, static_type: &str) -> SymbolicRef {
        self.next_symbol += 1;
        SymbolicRef {
            id: self.next_symbol,
            origin: origin.to_owned(),
            static_type: static_type.to_owned(),
        }
    }

    pub fn new_symbol(&mut self, origin: &str, ty: Type) -> Symbol {
        self.next_symbol += 1;
        Symbol { id: self.next_symbol, ty, origin: origin.to_owned() }
    }

    fn check_unresolved(&self, symbolic: &SymbolicRef) -> Result<(), Error> {
        match self.path_condition.resolution(symbolic.id) {
            Some(_) => Err(Error::AlreadyResolved(symbolic.id)),
            None => Ok(()),
        }
    }

    /// Resolves a symbolic reference to `null`.
    pub fn assume_null(&mut self, symbolic: &SymbolicRef) -> Result<(), Error> {
        self.check_unresolved(symbolic)?;
        self.path_condition.push(Clause::AssumeNull(symbolic.id));
        Ok(())
    }

    /// Resolves a symbolic reference to an object already in the heap.
    pub fn assume_aliases(&mut self, symbolic: &SymbolicRef, position: HeapPosition)
                          -> Result<(), Error> {
        self.check_unresolved(symbolic)?;
        self.heap.get(position)?;
        self.path_condition.push(Clause::AssumeAliases { id: symbolic.id, position });
        Ok(())
    }

    /// Resolves a symbolic reference to a fresh instance of `class`.
    pub fn assume_expands(&mut self, symbolic: &SymbolicRef, class: &str)
                          -> Result<HeapPosition, Error> {
        self.check_unresolved(symbolic)?;
        let position = match self.create_instance(class)? {
            Reference::Concrete(position) => position,
            Reference::Symbolic(ref fresh) => return Err(Error::UnresolvedReference(fresh.id)),
        };
        self.path_condition.push(Clause::AssumeExpands {
            id: symbolic.id,
            position,
            class: class.to_owned(),
        });
        Ok(position)
    }

    // Frames

    pub fn push_operand(&mut self, value: Value) -> Result<(), Error> {
        self.stack.current_mut()?.push_operand(value);
        Ok(())
    }

    pub fn pop_operands(&mut self, count: usize) -> Result<Vec<Value>, Error> {
        self.stack.current_mut()?.pop_operands(count)
    }

    /// A frame for the class initialization method of `class`, or `None` if it declares none.
    pub fn clinit_frame(&self, class: &str) -> Result<Option<Frame>, Error> {
        let class_file = self.hierarchy.get_class_file(class)?;
        let signature = Signature::clinit(class);
        let method = match class_file.get_method(&signature.name, &signature.descriptor) {
            Some(method) => method,
            None => return Ok(None),
        };
        if !method.is_static() {
            return Err(Error::Link(LinkError::IncompatibleClassFile(
                format!("{} is not static", signature))));
        }
        Frame::new(signature.clone(), class_file.clone(), method, vec![]).map(Some)
    }

    /// Pushes a frame. The current frame, if any, resumes at its program counter plus
    /// `return_pc_offset` once the new frame completes.
    pub fn push_prepared_frame(&mut self, frame: Frame, return_pc_offset: usize) {
        if let Ok(caller) = self.stack.current_mut() {
            caller.set_return_pc_offset(return_pc_offset);
        }
        trace!("pushed frame for {}", frame.signature());
        self.stack.push(frame);
    }

    /// Pushes a frame for the method `signature`, with `args` (receiver first) as its first
    /// local variables. A root frame has no caller to return to.
    pub fn push_frame(&mut self, signature: &Signature, is_root: bool, return_pc_offset: usize,
                      args: Vec<Value>) -> Result<(), Error> {
        let class_file = self.hierarchy.get_class_file(&signature.class)?;
        let method = class_file.get_method(&signature.name, &signature.descriptor)
            .ok_or_else(|| LinkError::MethodNotFound(signature.to_string()))?;
        let frame = Frame::new(signature.clone(), class_file.clone(), method, args)?;
        if is_root {
            self.stack.push(frame);
        } else {
            self.push_prepared_frame(frame, return_pc_offset);
        }
        Ok(())
    }

    pub fn pop_current_frame(&mut self) -> Result<Frame, Error> {
        self.stack.pop()
    }

    /// Pops the current frame after a normal return: the caller resumes at its return
    /// program counter with `return_value`, if any, pushed. Completing a class initialization
    /// method marks its class `Initialized`.
    pub fn complete_current_frame(&mut self, return_value: Option<Value>) -> Result<(), Error> {
        let frame = self.stack.pop()?;
        if frame.signature().is_clinit() {
            if let Some(klass) = self.static_store.get_mut(&frame.signature().class) {
                klass.set_status(KlassStatus::Initialized);
            }
        }
        if let Ok(caller) = self.stack.current_mut() {
            let return_pc = caller.return_pc();
            caller.set_pc(return_pc)?;
            if let Some(value) = return_value {
                caller.push_operand(value);
            }
        }
        Ok(())
    }

    /// Unwinds the thread stack looking for a handler for the object `reference` points to.
    /// Frames without a handler are popped; if none is left, the thread terminates.
    ///
    /// With `HandlerSearch::Strict`, a frame whose program counter or exception table is
    /// malformed stops the search with an error, leaving that frame current.
    pub fn throw_it(&mut self, reference: &Reference, search: HandlerSearch)
                    -> Result<Unwinding, Error> {
        let thrown_class = self.class_of(reference)?;
        if self.stack.is_empty() {
            return Err(Error::ThreadStackEmpty);
        }
        loop {
            let handler = match self.stack.current() {
                Ok(frame) => frame.find_handler(&self.hierarchy, &thrown_class, search)?,
                Err(_) => {
                    debug!("uncaught {} {}, thread terminated", thrown_class, reference);
                    self.uncaught = Some(reference.clone());
                    return Ok(Unwinding::Uncaught);
                },
            };
            match handler {
                Some(handler_pc) => {
                    let frame = self.stack.current_mut()?;
                    frame.clear_operand_stack();
                    frame.push_operand(Value::Reference(reference.clone()));
                    frame.set_pc(handler_pc)?;
                    debug!("{} caught in {} at {}", thrown_class, frame.signature(), handler_pc);
                    return Ok(Unwinding::Caught { handler_pc });
                },
                None => {
                    let frame = self.stack.pop()?;
                    trace!("{} not caught in {}", thrown_class, frame.signature());
                },
            }
        }
    }
}
