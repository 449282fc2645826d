//! The loaded classes, and the lookups over them that linking needs: subtyping, method
//! resolution (§5.4.3.3, §5.4.3.4) and method selection (§5.4.6).

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use thiserror::Error;

use crate::engine::throwable::Throwable;
use crate::model::class_file::access_flags::{class_access_flags, field_access_flags,
                                             method_access_flags};
use crate::model::class_file::{package_of, ClassFile, ClassFileBuilder, Code, MethodInfo};
use crate::vm::bytecode::opcode;
use crate::vm::sig::{Signature, Type};

pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";
pub const JAVA_LANG_STRING: &str = "java/lang/String";
pub const JAVA_LANG_ENUM: &str = "java/lang/Enum";
pub const JAVA_LANG_THROWABLE: &str = "java/lang/Throwable";
pub const JAVA_LANG_CLONEABLE: &str = "java/lang/Cloneable";
pub const JAVA_IO_SERIALIZABLE: &str = "java/io/Serializable";
pub const JAVA_METHODHANDLE: &str = "java/lang/invoke/MethodHandle";
pub const JAVA_VARHANDLE: &str = "java/lang/invoke/VarHandle";

/// The descriptor every signature polymorphic method is declared with.
const SIGNATURE_POLYMORPHIC_DESCRIPTOR: &str = "([Ljava/lang/Object;)Ljava/lang/Object;";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("no class file for {0}")]
    ClassFileNotFound(String),
    #[error("the class file for {0} is ill-formed")]
    ClassFileIllFormed(String),
    #[error("incompatible class change: {0}")]
    IncompatibleClassFile(String),
    #[error("method {0} not found")]
    MethodNotFound(String),
    #[error("method {0} is not accessible")]
    MethodNotAccessible(String),
    #[error("method {0} is abstract")]
    MethodAbstract(String),
}

/// The outcome of method resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMethod {
    /// Names the class that actually declares the method, which can be a superclass or a
    /// superinterface of the referenced one.
    pub signature: Signature,
    pub access_flags: u16,
    /// Resolved against a signature polymorphic method of `MethodHandle` or `VarHandle`.
    pub signature_polymorphic: bool,
}

impl ResolvedMethod {
    pub fn is_static(&self) -> bool {
        self.access_flags & method_access_flags::ACC_STATIC != 0
    }

    pub fn is_private(&self) -> bool {
        self.access_flags & method_access_flags::ACC_PRIVATE != 0
    }
}

/// A method selected for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Implementation {
    pub signature: Signature,
    pub access_flags: u16,
}

impl Implementation {
    pub fn new(class_file: &ClassFile, method: &MethodInfo) -> Self {
        Implementation {
            signature: Signature::new(&class_file.name, &method.name, &method.descriptor),
            access_flags: method.access_flags,
        }
    }

    pub fn is_native(&self) -> bool {
        self.access_flags & method_access_flags::ACC_NATIVE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & method_access_flags::ACC_ABSTRACT != 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassHierarchy {
    classes: HashMap<String, Rc<ClassFile>>,
}

impl ClassHierarchy {
    /// An empty hierarchy. Most callers want `bootstrap` instead.
    pub fn new() -> Self {
        ClassHierarchy::default()
    }

    /// A hierarchy holding the classes the engine itself relies on: `java/lang/Object`,
    /// `String`, `Enum`, the array superinterfaces, `MethodHandle`, and every `Throwable` the
    /// engine can synthesize together with its superclasses.
    pub fn bootstrap() -> Self {
        let mut hierarchy = ClassHierarchy::new();
        let public = method_access_flags::ACC_PUBLIC;
        let native = public | method_access_flags::ACC_NATIVE;

        hierarchy.add(ClassFileBuilder::new(JAVA_LANG_OBJECT)
            .super_class(None)
            .method(constructor())
            .method(MethodInfo::new(native, "hashCode", "()I", None))
            .method(MethodInfo::new(native | method_access_flags::ACC_FINAL, "getClass",
                                    "()Ljava/lang/Class;", None))
            .build());

        hierarchy.add(ClassFileBuilder::interface(JAVA_LANG_CLONEABLE).build());
        hierarchy.add(ClassFileBuilder::interface(JAVA_IO_SERIALIZABLE).build());

        let private_final = field_access_flags::ACC_PRIVATE | field_access_flags::ACC_FINAL;
        hierarchy.add(ClassFileBuilder::new(JAVA_LANG_STRING)
            .access_flags(class_access_flags::ACC_PUBLIC | class_access_flags::ACC_FINAL
                          | class_access_flags::ACC_SUPER)
            .implements(JAVA_IO_SERIALIZABLE)
            .field(private_final, "value", "[C")
            .field(field_access_flags::ACC_PRIVATE, "hash", "I")
            .method(constructor())
            .method(MethodInfo::new(native, "intern", "()Ljava/lang/String;", None))
            .build());

        hierarchy.add(ClassFileBuilder::new(JAVA_LANG_ENUM)
            .access_flags(class_access_flags::ACC_PUBLIC | class_access_flags::ACC_ABSTRACT
                          | class_access_flags::ACC_SUPER)
            .implements(JAVA_IO_SERIALIZABLE)
            .field(private_final, "name", "Ljava/lang/String;")
            .field(private_final, "ordinal", "I")
            .build());

        let polymorphic = native | method_access_flags::ACC_FINAL | method_access_flags::ACC_VARARGS;
        hierarchy.add(ClassFileBuilder::new(JAVA_METHODHANDLE)
            .access_flags(class_access_flags::ACC_PUBLIC | class_access_flags::ACC_ABSTRACT
                          | class_access_flags::ACC_SUPER)
            .method(MethodInfo::new(polymorphic, "invoke", SIGNATURE_POLYMORPHIC_DESCRIPTOR, None))
            .method(MethodInfo::new(polymorphic, "invokeExact", SIGNATURE_POLYMORPHIC_DESCRIPTOR,
                                    None))
            .build());

        let bases = [
            (JAVA_LANG_THROWABLE, JAVA_LANG_OBJECT),
            ("java/lang/Exception", JAVA_LANG_THROWABLE),
            ("java/lang/RuntimeException", "java/lang/Exception"),
            ("java/lang/Error", JAVA_LANG_THROWABLE),
            ("java/lang/LinkageError", "java/lang/Error"),
            ("java/lang/VirtualMachineError", "java/lang/Error"),
        ];
        let taxonomy = Throwable::ALL.iter().map(|t| (t.class_name(), t.superclass()));
        for (name, super_name) in bases.iter().cloned().chain(taxonomy) {
            let mut builder = ClassFileBuilder::new(name);
            builder.super_class(Some(super_name)).method(constructor());
            if name == JAVA_LANG_THROWABLE {
                builder.implements(JAVA_IO_SERIALIZABLE)
                    .field(field_access_flags::ACC_PRIVATE, "detailMessage", "Ljava/lang/String;")
                    .field(field_access_flags::ACC_PRIVATE, "cause", "Ljava/lang/Throwable;");
            }
            hierarchy.add(builder.build());
        }
        hierarchy
    }

    /// Adds a class, replacing any class of the same name.
    pub fn add(&mut self, class_file: ClassFile) -> Rc<ClassFile> {
        let class_file = Rc::new(class_file);
        self.classes.insert(class_file.name.clone(), class_file.clone());
        class_file
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn get_class_file(&self, name: &str) -> Result<Rc<ClassFile>, LinkError> {
        self.classes.get(name).cloned().ok_or_else(|| LinkError::ClassFileNotFound(name.to_owned()))
    }

    /// The class followed by its superclasses, up to `java/lang/Object`.
    pub fn superclass_chain(&self, name: &str) -> Result<Vec<Rc<ClassFile>>, LinkError> {
        let mut chain: Vec<Rc<ClassFile>> = vec![];
        let mut seen = HashSet::new();
        let mut next = Some(name.to_owned());
        while let Some(current) = next {
            if !seen.insert(current.clone()) {
                return Err(LinkError::ClassFileIllFormed(name.to_owned()));
            }
            let class_file = self.get_class_file(&current)?;
            next = class_file.super_name.clone();
            chain.push(class_file);
        }
        Ok(chain)
    }

    /// Every superinterface of the class, direct or not, including those of its superclasses.
    /// Interfaces whose class files are missing are skipped.
    fn superinterfaces(&self, name: &str) -> Vec<Rc<ClassFile>> {
        let mut result = vec![];
        let mut seen = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        seen.insert(name.to_owned());
        queue.push_back(name.to_owned());
        while let Some(current) = queue.pop_front() {
            let class_file = match self.classes.get(&current) {
                Some(class_file) => class_file,
                None => continue,
            };
            if current != name && class_file.is_interface() {
                result.push(class_file.clone());
            }
            let supertypes = class_file.super_name.iter().chain(class_file.interfaces.iter());
            for supertype in supertypes {
                if seen.insert(supertype.clone()) {
                    queue.push_back(supertype.clone());
                }
            }
        }
        result
    }

    /// True if `sub` is `sup` or one of its subclasses or subinterfaces, following the
    /// assignment rules for array types. Missing class files make the answer false.
    pub fn is_subclass(&self, sub: &str, sup: &str) -> bool {
        if sub == sup || sup == JAVA_LANG_OBJECT {
            return true;
        }
        if sub.starts_with('[') {
            if sup == JAVA_LANG_CLONEABLE || sup == JAVA_IO_SERIALIZABLE {
                return true;
            }
            if !sup.starts_with('[') {
                return false;
            }
            return match (Type::parse(&sub[1..]), Type::parse(&sup[1..])) {
                (Ok(sub_component), Ok(sup_component)) => {
                    match (sub_component.class_name(), sup_component.class_name()) {
                        (Some(sub_class), Some(sup_class)) => self.is_subclass(&sub_class, &sup_class),
                        _ => sub_component == sup_component,
                    }
                },
                _ => false,
            };
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(sub.to_owned());
        while let Some(current) = queue.pop_front() {
            if current == sup {
                return true;
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(class_file) = self.classes.get(&current) {
                queue.extend(class_file.super_name.iter().cloned());
                queue.extend(class_file.interfaces.iter().cloned());
            }
        }
        false
    }

    /// The instance fields of an object of class `name`, including inherited ones. A field
    /// shadows any superclass field of the same name.
    pub fn instance_fields(&self, name: &str) -> Result<Vec<(String, Type)>, LinkError> {
        let mut fields = BTreeMap::new();
        for class_file in self.superclass_chain(name)?.iter().rev() {
            for field in class_file.fields.iter().filter(|field| !field.is_static()) {
                let ty = Type::parse(&field.descriptor)
                    .map_err(|_| LinkError::ClassFileIllFormed(class_file.name.clone()))?;
                fields.insert(field.name.clone(), ty);
            }
        }
        Ok(fields.into_iter().collect())
    }

    /// Access control for methods (§5.4.4).
    fn is_accessible(&self, accessor: &str, declaring: &ClassFile, method: &MethodInfo) -> bool {
        if method.is_public() {
            true
        } else if method.is_private() {
            accessor == declaring.name
        } else if method.is_protected() && self.is_subclass(accessor, &declaring.name) {
            true
        } else {
            package_of(accessor) == declaring.package()
        }
    }

    /// Signature polymorphic methods are the `native` varargs methods of `MethodHandle` and
    /// `VarHandle` taking and returning `Object`, matched by name alone (§2.9.3).
    fn signature_polymorphic_method<'a>(&self, class_file: &'a ClassFile, name: &str)
                                         -> Option<&'a MethodInfo> {
        if class_file.name != JAVA_METHODHANDLE && class_file.name != JAVA_VARHANDLE {
            return None;
        }
        let mut candidates = class_file.methods.iter().filter(|m| m.name == name);
        match (candidates.next(), candidates.next()) {
            (Some(method), None) if method.is_native() && method.is_varargs()
                && method.descriptor == SIGNATURE_POLYMORPHIC_DESCRIPTOR => Some(method),
            _ => None,
        }
    }

    /// Finds the declaration of a method by searching a class and its superclasses.
    fn find_in_superclasses(&self, name: &str, method_name: &str, descriptor: &str)
                            -> Result<Option<(Rc<ClassFile>, MethodInfo)>, LinkError> {
        for class_file in self.superclass_chain(name)? {
            if let Some(method) = class_file.get_method(method_name, descriptor) {
                let method = method.clone();
                return Ok(Some((class_file, method)));
            }
        }
        Ok(None)
    }

    /// The maximally-specific superinterface methods of class `name` with the given name and
    /// descriptor (§5.4.3.3). Private and static interface methods never qualify.
    fn maximally_specific(&self, name: &str, method_name: &str, descriptor: &str)
                          -> Vec<(Rc<ClassFile>, MethodInfo)> {
        let candidates: Vec<(Rc<ClassFile>, MethodInfo)> = self.superinterfaces(name).into_iter()
            .filter_map(|interface| {
                let method = interface.get_method(method_name, descriptor)
                    .filter(|m| !m.is_private() && !m.is_static())
                    .cloned();
                method.map(|method| (interface, method))
            })
            .collect();
        candidates.iter()
            .filter(|&&(ref interface, _)| !candidates.iter().any(|&(ref other, _)| {
                other.name != interface.name && self.is_subclass(&other.name, &interface.name)
            }))
            .cloned()
            .collect()
    }

    /// Resolves a method reference appearing in class `accessor` (§5.4.3.3, §5.4.3.4).
    /// `is_interface` tells whether the reference was an `InterfaceMethodref`.
    pub fn resolve_method(&self, accessor: &str, signature: &Signature, is_interface: bool)
                          -> Result<ResolvedMethod, LinkError> {
        let referenced = self.get_class_file(&signature.class)?;
        if referenced.is_interface() != is_interface {
            return Err(LinkError::IncompatibleClassFile(format!(
                "{} is {}an interface", referenced.name, if is_interface { "not " } else { "" })));
        }

        if !is_interface {
            if let Some(method) = self.signature_polymorphic_method(&referenced, &signature.name) {
                return Ok(ResolvedMethod {
                    signature: signature.in_class(&referenced.name),
                    access_flags: method.access_flags,
                    signature_polymorphic: true,
                });
            }
        }

        let found = if is_interface {
            match referenced.get_method(&signature.name, &signature.descriptor) {
                Some(method) => Some((referenced.clone(), method.clone())),
                None => {
                    let object = self.get_class_file(JAVA_LANG_OBJECT)?;
                    match object.get_method(&signature.name, &signature.descriptor) {
                        Some(method) if method.is_public() && !method.is_static() =>
                            Some((object.clone(), method.clone())),
                        _ => None,
                    }
                },
            }
        } else {
            self.find_in_superclasses(&signature.class, &signature.name, &signature.descriptor)?
        };

        let (declaring, method) = match found {
            Some(found) => found,
            None => {
                let mut candidates =
                    self.maximally_specific(&signature.class, &signature.name, &signature.descriptor);
                // any maximally-specific method will do, but prefer one with a body
                candidates.sort_by_key(|&(_, ref method)| method.is_abstract());
                match candidates.into_iter().next() {
                    Some(found) => found,
                    None => return Err(LinkError::MethodNotFound(signature.to_string())),
                }
            },
        };

        let resolved = signature.in_class(&declaring.name);
        if !self.is_accessible(accessor, &declaring, &method) {
            return Err(LinkError::MethodNotAccessible(resolved.to_string()));
        }
        Ok(ResolvedMethod {
            signature: resolved,
            access_flags: method.access_flags,
            signature_polymorphic: false,
        })
    }

    /// Selects the method a `invokevirtual` or `invokeinterface` with receiver class
    /// `receiver` executes (§5.4.6).
    pub fn lookup_virtual(&self, receiver: &str, resolved: &ResolvedMethod, is_interface: bool)
                          -> Result<Implementation, LinkError> {
        let sig = &resolved.signature;
        if is_interface && !self.is_subclass(receiver, &sig.class) {
            return Err(LinkError::IncompatibleClassFile(format!(
                "{} does not implement {}", receiver, sig.class)));
        }
        // arrays inherit every method from java/lang/Object
        let receiver = if receiver.starts_with('[') { JAVA_LANG_OBJECT } else { receiver };
        if resolved.is_private() {
            let declaring = self.get_class_file(&sig.class)?;
            return match declaring.get_method(&sig.name, &sig.descriptor) {
                Some(method) => Ok(Implementation::new(&declaring, method)),
                None => Err(LinkError::MethodNotFound(sig.to_string())),
            };
        }

        for class_file in self.superclass_chain(receiver)? {
            let method = match class_file.get_method(&sig.name, &sig.descriptor) {
                Some(method) => method,
                None => continue,
            };
            if method.is_static() {
                return Err(LinkError::IncompatibleClassFile(format!(
                    "{} is static", Signature::new(&class_file.name, &sig.name, &sig.descriptor))));
            }
            if self.overrides(&class_file, method, resolved) {
                return self.selected(&class_file, method, is_interface);
            }
        }

        self.select_default(receiver, sig, is_interface)
    }

    /// Whether `method`, declared in `class_file`, overrides the resolved method (§5.4.5).
    fn overrides(&self, class_file: &ClassFile, method: &MethodInfo, resolved: &ResolvedMethod)
                 -> bool {
        if method.is_private() {
            return false;
        }
        let flags = resolved.access_flags;
        let package_private = flags & (method_access_flags::ACC_PUBLIC
            | method_access_flags::ACC_PROTECTED | method_access_flags::ACC_PRIVATE) == 0;
        !package_private || class_file.package() == package_of(&resolved.signature.class)
    }

    fn selected(&self, class_file: &ClassFile, method: &MethodInfo, is_interface: bool)
                -> Result<Implementation, LinkError> {
        let implementation = Implementation::new(class_file, method);
        if method.is_abstract() {
            Err(LinkError::MethodAbstract(implementation.signature.to_string()))
        } else if is_interface && !method.is_public() {
            Err(LinkError::MethodNotAccessible(implementation.signature.to_string()))
        } else {
            Ok(implementation)
        }
    }

    /// Selection among the maximally-specific superinterface methods: exactly one of them
    /// must have a body.
    fn select_default(&self, class: &str, sig: &Signature, is_interface: bool)
                      -> Result<Implementation, LinkError> {
        let candidates = self.maximally_specific(class, &sig.name, &sig.descriptor);
        let mut concrete = candidates.iter().filter(|&&(_, ref method)| !method.is_abstract());
        match (concrete.next(), concrete.next()) {
            (Some(&(ref interface, ref method)), None) => self.selected(interface, method, is_interface),
            (Some(_), Some(_)) => Err(LinkError::IncompatibleClassFile(format!(
                "conflicting default methods for {}", sig))),
            (None, _) => Err(LinkError::MethodAbstract(sig.in_class(class).to_string())),
        }
    }

    /// Selects the method an `invokespecial` appearing in class `accessor` executes.
    pub fn lookup_special(&self, accessor: &str, resolved: &ResolvedMethod)
                          -> Result<Implementation, LinkError> {
        let sig = &resolved.signature;
        let current = self.get_class_file(accessor)?;
        let resolved_class = self.get_class_file(&sig.class)?;
        // the ACC_SUPER rule: calls to superclass methods go through the direct superclass
        let start = match current.super_name {
            Some(ref super_name) if sig.name != "<init>" && !resolved_class.is_interface()
                    && current.has_super_flag() && sig.class != accessor
                    && self.is_subclass(accessor, &sig.class) => self.get_class_file(super_name)?,
            _ => resolved_class,
        };

        if start.is_interface() {
            if let Some(method) = start.get_method(&sig.name, &sig.descriptor) {
                return self.selected(&start, method, false);
            }
            let object = self.get_class_file(JAVA_LANG_OBJECT)?;
            if let Some(method) = object.get_method(&sig.name, &sig.descriptor) {
                if method.is_public() {
                    return self.selected(&object, method, false);
                }
            }
        } else if let Some((class_file, method)) =
                self.find_in_superclasses(&start.name, &sig.name, &sig.descriptor)? {
            return self.selected(&class_file, &method, false);
        }
        self.select_default(&start.name, sig, false)
    }

    /// The method an `invokestatic` executes: the resolved one, which must be `static`.
    pub fn lookup_static(&self, resolved: &ResolvedMethod) -> Result<Implementation, LinkError> {
        let sig = &resolved.signature;
        let declaring = self.get_class_file(&sig.class)?;
        match declaring.get_method(&sig.name, &sig.descriptor) {
            Some(method) if method.is_static() => Ok(Implementation::new(&declaring, method)),
            Some(_) => Err(LinkError::IncompatibleClassFile(format!("{} is not static", sig))),
            None => Err(LinkError::MethodNotFound(sig.to_string())),
        }
    }
}

/// `public <init>()V`, which just returns.
fn constructor() -> MethodInfo {
    MethodInfo::new(method_access_flags::ACC_PUBLIC, "<init>", "()V",
                    Some(Code::new(1, 1, vec![opcode::RETURN])))
}
