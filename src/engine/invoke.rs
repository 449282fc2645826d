//! `invokevirtual`, `invokespecial`, `invokestatic` and `invokeinterface`.

use std::fmt;
use std::rc::Rc;

use log::{debug, trace};

use crate::engine::clinit::ClassInit;
use crate::engine::pipeline::{throw, BytecodeAlgorithm, Completion, ExecutionContext, Interrupt,
                              Phase};
use crate::engine::throwable::Throwable;
use crate::engine::EngineError;
use crate::model::class_file::constant_pool::MemberKind;
use crate::vm::bytecode::{offset_invoke, opcode};
use crate::vm::class_hierarchy::{Implementation, ResolvedMethod};
use crate::vm::{self, LinkError, Reference, Resolution, Signature, State, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

impl InvokeKind {
    pub fn from_opcode(op: u8) -> Option<InvokeKind> {
        match op {
            opcode::INVOKEVIRTUAL => Some(InvokeKind::Virtual),
            opcode::INVOKESPECIAL => Some(InvokeKind::Special),
            opcode::INVOKESTATIC => Some(InvokeKind::Static),
            opcode::INVOKEINTERFACE => Some(InvokeKind::Interface),
            _ => None,
        }
    }

    pub fn opcode(self) -> u8 {
        match self {
            InvokeKind::Virtual => opcode::INVOKEVIRTUAL,
            InvokeKind::Special => opcode::INVOKESPECIAL,
            InvokeKind::Static => opcode::INVOKESTATIC,
            InvokeKind::Interface => opcode::INVOKEINTERFACE,
        }
    }

    /// Whether the arguments on the operand stack start with a receiver.
    pub fn has_receiver(self) -> bool {
        self != InvokeKind::Static
    }
}

/// An invocation instruction whose method reference has been resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInvoke {
    pub kind: InvokeKind,
    /// The class whose code contains the instruction.
    pub accessor: String,
    /// The method reference as written in the constant pool.
    pub reference: Signature,
    /// The reference is an `InterfaceMethodref`.
    pub interface_ref: bool,
    pub pc: usize,
    pub method: ResolvedMethod,
}

impl ResolvedInvoke {
    /// The number of operand stack entries the invocation consumes, receiver included.
    pub fn arity(&self) -> Result<usize, vm::Error> {
        let descriptor = self.method.signature.method_descriptor()?;
        Ok(descriptor.params.len() + if self.kind.has_receiver() { 1 } else { 0 })
    }
}

pub type CheckStrategy = dyn Fn(&State, &ResolvedInvoke) -> Result<(), Throwable>;
pub type OverrideStrategy =
    dyn Fn(&State, &ResolvedInvoke, Option<Implementation>) -> Option<Implementation>;
pub type ReturnPcOffsetStrategy = dyn Fn(&ResolvedInvoke) -> usize;

/// The policies the invocation pipeline leaves open.
#[derive(Clone)]
pub struct Strategies {
    pub check: Rc<CheckStrategy>,
    /// Can replace the implementation that method selection found.
    pub override_implementation: Rc<OverrideStrategy>,
    /// How far past the instruction the caller resumes once the callee returns.
    pub return_pc_offset: Rc<ReturnPcOffsetStrategy>,
}

impl Default for Strategies {
    fn default() -> Self {
        Strategies {
            check: Rc::new(check_operands),
            override_implementation: Rc::new(keep_implementation),
            return_pc_offset: Rc::new(instruction_length),
        }
    }
}

impl fmt::Debug for Strategies {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<invocation strategies>")
    }
}

/// The default check: the kind of the instruction agrees with the resolved method being
/// `static` or not, the operand stack holds every argument, and the receiver is not `null`.
pub fn check_operands(state: &State, resolved: &ResolvedInvoke) -> Result<(), Throwable> {
    let method = &resolved.method;
    if !method.signature_polymorphic && method.is_static() != (resolved.kind == InvokeKind::Static) {
        return Err(Throwable::IncompatibleClassChangeError);
    }
    let params = method.signature.method_descriptor()
        .map_err(|_| Throwable::VerifyError)?
        .params.len();
    let frame = state.current_frame().map_err(|_| Throwable::VerifyError)?;
    let arity = params + if resolved.kind.has_receiver() { 1 } else { 0 };
    if frame.operand_stack().len() < arity {
        return Err(Throwable::VerifyError);
    }
    if !resolved.kind.has_receiver() {
        return Ok(());
    }
    match frame.peek_operand(params) {
        Some(&Value::Null) => Err(Throwable::NullPointerException),
        Some(&Value::Reference(ref reference)) => match state.resolve(reference) {
            Some(Resolution::Null) => Err(Throwable::NullPointerException),
            _ => Ok(()),
        },
        _ => Err(Throwable::VerifyError),
    }
}

fn keep_implementation(_: &State, _: &ResolvedInvoke, found: Option<Implementation>)
                       -> Option<Implementation> {
    found
}

fn instruction_length(resolved: &ResolvedInvoke) -> usize {
    offset_invoke(resolved.kind == InvokeKind::Interface)
}

/// Failures resolving a method reference, as the program sees them.
fn resolution_failure(e: &LinkError) -> Throwable {
    match *e {
        LinkError::ClassFileNotFound(_) => Throwable::NoClassDefFoundError,
        LinkError::ClassFileIllFormed(_) => Throwable::VerifyError,
        LinkError::IncompatibleClassFile(_) => Throwable::IncompatibleClassChangeError,
        LinkError::MethodNotFound(_) => Throwable::NoSuchMethodError,
        LinkError::MethodNotAccessible(_) => Throwable::IllegalAccessError,
        LinkError::MethodAbstract(_) => Throwable::AbstractMethodError,
    }
}

/// Failures selecting the method to execute, as the program sees them. A method that is not
/// found at all is not a failure here; the commit phase reports it.
fn selection_failure(e: &LinkError) -> Throwable {
    match *e {
        LinkError::MethodAbstract(_) => Throwable::AbstractMethodError,
        LinkError::MethodNotAccessible(_) => Throwable::IllegalAccessError,
        LinkError::IncompatibleClassFile(_) => Throwable::IncompatibleClassChangeError,
        LinkError::MethodNotFound(_) => Throwable::NoSuchMethodError,
        LinkError::ClassFileNotFound(_) | LinkError::ClassFileIllFormed(_) => Throwable::VerifyError,
    }
}

/// One execution of an invocation instruction.
#[derive(Debug)]
pub struct Invoke<'a> {
    kind: InvokeKind,
    strategies: &'a Strategies,
}

impl<'a> Invoke<'a> {
    pub fn new(kind: InvokeKind, strategies: &'a Strategies) -> Self {
        Invoke { kind, strategies }
    }

    /// The class, program counter, and method reference of the current instruction.
    fn read_method_ref(&self, state: &State)
                       -> Result<(String, usize, Signature, MemberKind), vm::Error> {
        let frame = state.current_frame()?;
        let pc = frame.pc();
        let index = frame.read_u16(pc + 1)?;
        let member = frame.class().constant_pool.member_ref(index)?;
        let signature = Signature::new(member.class, member.name, member.descriptor);
        Ok((frame.class().name.clone(), pc, signature, member.kind))
    }

    /// The class dispatch starts from. An unresolved symbolic receiver dispatches on its static
    /// type.
    fn receiver_class(&self, state: &State, resolved: &ResolvedInvoke) -> Phase<String> {
        let params = resolved.arity()? - 1;
        let receiver = match state.current_frame()?.peek_operand(params) {
            Some(&Value::Reference(ref reference)) => reference.clone(),
            other => return Err(Interrupt::Fault(EngineError::Unexpected(
                format!("receiver of {} is {:?}", resolved.reference, other)))),
        };
        match (state.resolve(&receiver), receiver) {
            (None, Reference::Symbolic(symbolic)) => Ok(symbolic.static_type),
            (_, receiver) => Ok(state.class_of(&receiver)?),
        }
    }
}

impl<'a> BytecodeAlgorithm for Invoke<'a> {
    type Resolved = ResolvedInvoke;
    type Implementation = Implementation;

    fn resolve(&self, state: &mut State) -> Phase<ResolvedInvoke> {
        let (accessor, pc, reference, member_kind) = match self.read_method_ref(state) {
            Ok(found) => found,
            Err(e @ vm::Error::InvalidIndex(_)) | Err(e @ vm::Error::InvalidProgramCounter { .. }) => {
                debug!("malformed invocation: {}", e);
                return Err(throw(state, Throwable::VerifyError));
            },
            Err(e) => return Err(e.into()),
        };
        let interface_ref = match (self.kind, member_kind) {
            (_, MemberKind::Field)
                | (InvokeKind::Virtual, MemberKind::InterfaceMethod)
                | (InvokeKind::Interface, MemberKind::Method) => {
                debug!("{:?} of a {:?} reference to {}", self.kind, member_kind, reference);
                return Err(throw(state, Throwable::VerifyError));
            },
            (_, kind) => kind == MemberKind::InterfaceMethod,
        };
        if reference.method_descriptor().is_err() {
            return Err(throw(state, Throwable::VerifyError));
        }

        let method = match state.hierarchy().resolve_method(&accessor, &reference, interface_ref) {
            Ok(method) => method,
            Err(e) => {
                debug!("resolution of {} failed: {}", reference, e);
                let throwable = resolution_failure(&e);
                return Err(throw(state, throwable));
            },
        };
        trace!("{} resolved to {}", reference, method.signature);
        Ok(ResolvedInvoke { kind: self.kind, accessor, reference, interface_ref, pc, method })
    }

    fn check(&self, state: &mut State, resolved: &ResolvedInvoke) -> Phase<()> {
        match (self.strategies.check)(&*state, resolved) {
            Ok(()) => Ok(()),
            Err(throwable) => Err(throw(state, throwable)),
        }
    }

    fn prepare_class(&self, state: &mut State, resolved: &ResolvedInvoke,
                     context: &mut ExecutionContext) -> Phase<()> {
        if self.kind != InvokeKind::Static {
            return Ok(());
        }
        let class = &resolved.method.signature.class;
        match context.initializer.initialize_class(state, class, &mut *context.oracle) {
            Ok(ClassInit::Created { frames }) if frames > 0 => Err(Interrupt::Deferred { frames }),
            Ok(ClassInit::Failed { throwable, unwinding }) =>
                Err(Interrupt::Thrown { throwable, unwinding }),
            Ok(_) => Ok(()),
            Err(EngineError::State(vm::Error::HeapMemoryExhausted)) =>
                Err(throw(state, Throwable::OutOfMemoryError)),
            Err(e) => Err(Interrupt::Fault(e)),
        }
    }

    fn find_implementation(&self, state: &mut State, resolved: &ResolvedInvoke)
                           -> Phase<Option<Implementation>> {
        let method = &resolved.method;
        if method.signature_polymorphic {
            // linked through the method handle at run time, not selected here
            return Ok(Some(Implementation {
                signature: method.signature.clone(),
                access_flags: method.access_flags,
            }));
        }
        let found = match self.kind {
            InvokeKind::Static => state.hierarchy().lookup_static(method),
            InvokeKind::Special => state.hierarchy().lookup_special(&resolved.accessor, method),
            InvokeKind::Virtual | InvokeKind::Interface => {
                let receiver = self.receiver_class(state, resolved)?;
                state.hierarchy().lookup_virtual(&receiver, method, self.kind == InvokeKind::Interface)
            },
        };
        match found {
            Ok(implementation) => Ok(Some(implementation)),
            Err(LinkError::MethodNotFound(_)) => Ok(None),
            Err(e) => {
                debug!("selection for {} failed: {}", resolved.reference, e);
                let throwable = selection_failure(&e);
                Err(throw(state, throwable))
            },
        }
    }

    fn override_implementation(&self, state: &State, resolved: &ResolvedInvoke,
                               found: Option<Implementation>) -> Phase<Option<Implementation>> {
        let before = found.as_ref().map(|implementation| implementation.signature.clone());
        let implementation = (self.strategies.override_implementation)(state, resolved, found);
        let after = implementation.as_ref().map(|implementation| &implementation.signature);
        if before.as_ref() != after {
            debug!("implementation of {} overridden: {:?} -> {:?}", resolved.reference, before, after);
        }
        Ok(implementation)
    }

    fn commit(&self, state: &mut State, resolved: &ResolvedInvoke,
              implementation: Option<Implementation>) -> Phase<Completion> {
        let implementation = match implementation {
            Some(implementation) => implementation,
            None => return Err(throw(state, Throwable::NoSuchMethodError)),
        };
        if resolved.method.signature_polymorphic {
            state.current_frame_mut()?.patch_code(resolved.pc, opcode::INVOKEHANDLE)?;
            debug!("{} at {} rewritten to invokehandle", resolved.reference, resolved.pc);
            return Ok(Completion::Patched { opcode: opcode::INVOKEHANDLE });
        }
        if implementation.is_native() {
            return Err(Interrupt::Fault(EngineError::NativeMethod(
                implementation.signature.to_string())));
        }
        if implementation.is_abstract() {
            return Err(throw(state, Throwable::AbstractMethodError));
        }

        let args = state.pop_operands(resolved.arity()?)?;
        let offset = (self.strategies.return_pc_offset)(resolved);
        match state.push_frame(&implementation.signature, false, offset, args) {
            Ok(()) => {
                debug!("invoked {}", implementation.signature);
                Ok(Completion::Invoked { signature: implementation.signature })
            },
            Err(vm::Error::AbstractMethod(_)) => Err(throw(state, Throwable::AbstractMethodError)),
            Err(vm::Error::InvalidSlot { .. }) => Err(throw(state, Throwable::VerifyError)),
            Err(e) => Err(e.into()),
        }
    }
}
