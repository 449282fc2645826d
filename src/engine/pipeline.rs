//! The phases an instruction goes through when it needs resolution before it can run:
//! resolve, check, prepare the class, find the implementation, override it, commit.
//!
//! Any phase can end the instruction early by returning an `Interrupt`; the later phases are
//! then skipped.

use log::debug;

use crate::engine::clinit::ClassInitializer;
use crate::engine::decision::DecisionOracle;
use crate::engine::exceptions::create_and_throw;
use crate::engine::throwable::Throwable;
use crate::engine::EngineError;
use crate::vm::{self, Signature, State, Unwinding};

/// Why an instruction stopped before its commit phase.
#[derive(Debug, Clone, PartialEq)]
pub enum Interrupt {
    /// A `Throwable` was materialized and thrown.
    Thrown { throwable: Throwable, unwinding: Unwinding },
    /// Class initializer frames were pushed; the instruction runs again once they return.
    Deferred { frames: usize },
    /// Something that should never happen; the branch must be abandoned.
    Fault(EngineError),
}

impl From<EngineError> for Interrupt {
    fn from(e: EngineError) -> Self {
        Interrupt::Fault(e)
    }
}

impl From<vm::Error> for Interrupt {
    fn from(e: vm::Error) -> Self {
        Interrupt::Fault(EngineError::State(e))
    }
}

pub type Phase<T> = Result<T, Interrupt>;

/// Throws `throwable` in `state`, for a phase to return as its interrupt.
pub fn throw(state: &mut State, throwable: Throwable) -> Interrupt {
    match create_and_throw(state, throwable) {
        Ok(unwinding) => Interrupt::Thrown { throwable, unwinding },
        Err(e) => Interrupt::Fault(e),
    }
}

/// How an instruction ended, when it did not fault.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// A frame for `signature` was pushed.
    Invoked { signature: Signature },
    /// The instruction was rewritten in place to `opcode`, and nothing else happened.
    Patched { opcode: u8 },
    Deferred { frames: usize },
    Thrown { throwable: Throwable, unwinding: Unwinding },
}

/// What the prepare phase needs besides the state.
pub struct ExecutionContext<'a> {
    pub oracle: &'a mut dyn DecisionOracle,
    pub initializer: &'a ClassInitializer,
}

pub trait BytecodeAlgorithm {
    /// The symbolic metadata of the instruction, resolved.
    type Resolved;
    /// What the commit phase executes.
    type Implementation;

    fn resolve(&self, state: &mut State) -> Phase<Self::Resolved>;

    /// Validates the resolved metadata against the current operand stack.
    fn check(&self, state: &mut State, resolved: &Self::Resolved) -> Phase<()>;

    /// Makes sure the class the instruction acts on is initialized.
    fn prepare_class(&self, state: &mut State, resolved: &Self::Resolved,
                     context: &mut ExecutionContext) -> Phase<()>;

    fn find_implementation(&self, state: &mut State, resolved: &Self::Resolved)
                           -> Phase<Option<Self::Implementation>>;

    /// Gives an external policy the chance to replace what was found.
    fn override_implementation(&self, state: &State, resolved: &Self::Resolved,
                               found: Option<Self::Implementation>)
                               -> Phase<Option<Self::Implementation>>;

    fn commit(&self, state: &mut State, resolved: &Self::Resolved,
              implementation: Option<Self::Implementation>) -> Phase<Completion>;
}

fn run<A: BytecodeAlgorithm>(algorithm: &A, state: &mut State, context: &mut ExecutionContext)
                             -> Phase<Completion> {
    let resolved = algorithm.resolve(state)?;
    algorithm.check(state, &resolved)?;
    algorithm.prepare_class(state, &resolved, context)?;
    let found = algorithm.find_implementation(state, &resolved)?;
    let implementation = algorithm.override_implementation(state, &resolved, found)?;
    algorithm.commit(state, &resolved, implementation)
}

/// Runs every phase of `algorithm` in order. Thrown and deferred instructions complete
/// normally; only faults are errors.
pub fn execute<A: BytecodeAlgorithm>(algorithm: &A, state: &mut State,
                                     context: &mut ExecutionContext)
                                     -> Result<Completion, EngineError> {
    match run(algorithm, state, context) {
        Ok(completion) => Ok(completion),
        Err(Interrupt::Thrown { throwable, unwinding }) => {
            debug!("instruction interrupted by {} ({:?})", throwable, unwinding);
            Ok(Completion::Thrown { throwable, unwinding })
        },
        Err(Interrupt::Deferred { frames }) => {
            debug!("instruction deferred behind {} class initializers", frames);
            Ok(Completion::Deferred { frames })
        },
        Err(Interrupt::Fault(e)) => Err(e),
    }
}
