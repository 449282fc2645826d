//! The symbolic execution core: class initialization, exception materialization and
//! unwinding, aliasing, and the phase pipeline instructions run through.

pub mod alias;
pub mod clinit;
pub mod decision;
pub mod exceptions;
pub mod invoke;
pub mod pipeline;
pub mod throwable;

use std::rc::Rc;

use log::trace;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::vm::{self, ClassHierarchy, Signature, State, Value};

use self::clinit::ClassInitializer;
use self::decision::{DecisionError, DecisionOracle};
use self::invoke::{Invoke, InvokeKind, Strategies};
use self::pipeline::{Completion, ExecutionContext};

/// Faults that abandon the current branch. The executing program never sees these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Decision(#[from] DecisionError),
    #[error(transparent)]
    State(#[from] vm::Error),
    /// The method has no bytecode and must be executed by the host.
    #[error("native method {0} cannot be executed symbolically")]
    NativeMethod(String),
    #[error("opcode {opcode:#04x} at {pc} is not supported")]
    UnsupportedOpcode { opcode: u8, pc: usize },
    #[error("unexpected: {0}")]
    Unexpected(String),
}

/// Executes instructions on states, asking `oracle` which branch to follow.
#[derive(Debug)]
pub struct Engine<O: DecisionOracle> {
    config: EngineConfig,
    initializer: ClassInitializer,
    strategies: Strategies,
    oracle: O,
}

impl<O: DecisionOracle> Engine<O> {
    pub fn new(config: EngineConfig, oracle: O) -> Self {
        Engine {
            initializer: ClassInitializer::from_config(&config),
            config,
            strategies: Strategies::default(),
            oracle,
        }
    }

    pub fn with_strategies(mut self, strategies: Strategies) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// A state whose thread stack holds a single frame, for `root` called with `args`.
    pub fn initial_state(&self, hierarchy: Rc<ClassHierarchy>, root: &Signature, args: Vec<Value>)
                         -> Result<State, EngineError> {
        let mut state = State::new(hierarchy).with_heap_limit(self.config.heap_limit);
        state.push_frame(root, true, 0, args)?;
        Ok(state)
    }

    /// See `ClassInitializer::ensure_klass`.
    pub fn ensure_klass(&mut self, state: &mut State, class: &str) -> Result<bool, EngineError> {
        self.initializer.ensure_klass(state, class, &mut self.oracle)
    }

    /// Executes the instruction at the program counter of the current frame.
    pub fn step(&mut self, state: &mut State) -> Result<Completion, EngineError> {
        let (op, pc) = {
            let frame = state.current_frame()?;
            (frame.current_opcode()?, frame.pc())
        };
        trace!("{:#04x} at {}", op, pc);
        match InvokeKind::from_opcode(op) {
            Some(kind) => self.invoke(state, kind),
            None => Err(EngineError::UnsupportedOpcode { opcode: op, pc }),
        }
    }

    /// Executes the current instruction as an invocation of kind `kind`.
    pub fn invoke(&mut self, state: &mut State, kind: InvokeKind) -> Result<Completion, EngineError> {
        let algorithm = Invoke::new(kind, &self.strategies);
        let mut context = ExecutionContext {
            oracle: &mut self.oracle,
            initializer: &self.initializer,
        };
        pipeline::execute(&algorithm, state, &mut context)
    }
}
