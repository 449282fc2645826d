//! Class initialization (§5.5): creating the Klasses of a class and its superclasses, and
//! pushing frames for their class initialization methods.

use log::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::engine::decision::DecisionOracle;
use crate::engine::exceptions::create_and_throw;
use crate::engine::throwable::Throwable;
use crate::engine::EngineError;
use crate::vm::class_hierarchy::JAVA_LANG_ENUM;
use crate::vm::{self, Frame, KlassStatus, LinkError, State, Unwinding};

/// The outcome of initializing a class.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassInit {
    /// The class has a Klass already, or the branch assumes it was initialized before the
    /// execution started.
    AlreadyInitialized,
    /// Klasses were created for the class and its uninitialized superclasses, and `frames`
    /// class initialization method frames were pushed. The most ancestral one is on top.
    Created { frames: usize },
    /// A malformed class stopped the initialization. No frame is left pushed, and `throwable`
    /// has been thrown.
    Failed { throwable: Throwable, unwinding: Unwinding },
}

/// What the initialization of one call chain has done so far, to be undone on failure.
#[derive(Debug, Default)]
struct RollbackLog {
    created_klasses: Vec<String>,
    pushed_frames: usize,
}

enum Failure {
    Throw(Throwable),
    Fault(EngineError),
}

impl From<EngineError> for Failure {
    fn from(e: EngineError) -> Self {
        Failure::Fault(e)
    }
}

/// Failures creating a Klass that the program can observe.
fn creation_failure(e: vm::Error) -> Failure {
    match e {
        vm::Error::InvalidIndex(_)
            | vm::Error::Descriptor(_)
            | vm::Error::Link(LinkError::ClassFileIllFormed(_)) => Failure::Throw(Throwable::VerifyError),
        vm::Error::Link(LinkError::ClassFileNotFound(_)) => Failure::Throw(Throwable::NoClassDefFoundError),
        e => Failure::Fault(EngineError::State(e)),
    }
}

/// Failures preparing the frame of a class initialization method that the program can observe.
fn initializer_failure(e: vm::Error) -> Failure {
    match e {
        vm::Error::Link(LinkError::IncompatibleClassFile(_)) =>
            Failure::Throw(Throwable::IncompatibleClassChangeError),
        vm::Error::NativeMethod(_)
            | vm::Error::AbstractMethod(_)
            | vm::Error::InvalidIndex(_)
            | vm::Error::Descriptor(_)
            | vm::Error::Link(LinkError::MethodNotFound(_))
            | vm::Error::Link(LinkError::ClassFileIllFormed(_)) => Failure::Throw(Throwable::VerifyError),
        e => Failure::Fault(EngineError::State(e)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassInitializer {
    /// Always take the "not initialized" branch for enums, so that their initializers run.
    pub force_enum_initializers: bool,
    /// Also remove the Klasses created by a failed initialization, not just its frames.
    pub rollback_klasses: bool,
}

impl Default for ClassInitializer {
    fn default() -> Self {
        ClassInitializer { force_enum_initializers: true, rollback_klasses: false }
    }
}

impl ClassInitializer {
    pub fn from_config(config: &EngineConfig) -> Self {
        ClassInitializer {
            force_enum_initializers: config.force_enum_initializers,
            rollback_klasses: config.rollback_klasses_on_failure,
        }
    }

    /// Makes sure `class` has a Klass. Returns true iff class initialization method frames were
    /// pushed, which the caller must run before resuming.
    pub fn ensure_klass(&self, state: &mut State, class: &str, oracle: &mut dyn DecisionOracle)
                        -> Result<bool, EngineError> {
        Ok(match self.initialize_class(state, class, oracle)? {
            ClassInit::Created { frames } => frames > 0,
            ClassInit::AlreadyInitialized | ClassInit::Failed { .. } => false,
        })
    }

    fn decide_initialized(&self, state: &State, class: &str, oracle: &mut dyn DecisionOracle)
                          -> Result<bool, EngineError> {
        if self.force_enum_initializers && state.hierarchy().is_subclass(class, JAVA_LANG_ENUM) {
            debug!("{} is an enum, assuming it is not initialized", class);
            return Ok(false);
        }
        Ok(oracle.decide_initialized(state.path_condition(), class)?)
    }

    /// Initializes `class` unless it has a Klass already. Either the Klasses and initializer
    /// frames of the class and all of its uninitialized superclasses are installed, or a
    /// `Throwable` is thrown and no frame is left pushed.
    ///
    /// Exhausting the heap while creating Klasses is reported as
    /// `vm::Error::HeapMemoryExhausted`, after the same rollback.
    pub fn initialize_class(&self, state: &mut State, class: &str,
                            oracle: &mut dyn DecisionOracle) -> Result<ClassInit, EngineError> {
        if state.initialized(class) {
            return Ok(ClassInit::AlreadyInitialized);
        }
        if self.decide_initialized(state, class, oracle)? {
            debug!("assuming {} initialized", class);
            return match state.assume_class_initialized(class) {
                Ok(()) => Ok(ClassInit::AlreadyInitialized),
                Err(e) => match creation_failure(e) {
                    Failure::Throw(throwable) => self.fail(state, throwable),
                    Failure::Fault(e) => Err(e),
                },
            };
        }

        debug!("assuming {} not initialized", class);
        state.assume_class_not_initialized(class);
        let mut log = RollbackLog::default();
        let mut staged = vec![];
        let result = self.stage(state, class, oracle, &mut log, &mut staged)
            .and_then(|()| self.commit(state, staged, &mut log));
        match result {
            Ok(()) => Ok(ClassInit::Created { frames: log.pushed_frames }),
            Err(failure) => {
                self.roll_back(state, class, &log)?;
                match failure {
                    Failure::Throw(throwable) => self.fail(state, throwable),
                    Failure::Fault(e) => Err(e),
                }
            },
        }
    }

    fn fail(&self, state: &mut State, throwable: Throwable) -> Result<ClassInit, EngineError> {
        let unwinding = create_and_throw(state, throwable)?;
        Ok(ClassInit::Failed { throwable, unwinding })
    }

    /// Whether a superclass must be initialized along with its subclass. If the branch assumes
    /// it was initialized already, its Klass is created on the spot.
    fn needs_initialization(&self, state: &mut State, class: &str,
                            oracle: &mut dyn DecisionOracle) -> Result<bool, Failure> {
        if state.initialized(class) {
            return Ok(false);
        }
        if self.decide_initialized(state, class, oracle)? {
            debug!("assuming superclass {} initialized", class);
            state.assume_class_initialized(class).map_err(creation_failure)?;
            Ok(false)
        } else {
            debug!("assuming superclass {} not initialized", class);
            state.assume_class_not_initialized(class);
            Ok(true)
        }
    }

    /// Creates the Klass of `class` and, recursively, of its superclasses, and collects the
    /// frames of their class initialization methods, superclasses first. Nothing is pushed yet.
    fn stage(&self, state: &mut State, class: &str, oracle: &mut dyn DecisionOracle,
             log: &mut RollbackLog, staged: &mut Vec<(String, Option<Frame>)>)
             -> Result<(), Failure> {
        state.create_klass(class).map_err(creation_failure)?;
        log.created_klasses.push(class.to_owned());

        let class_file = state.hierarchy().get_class_file(class)
            .map_err(|e| Failure::Fault(EngineError::State(e.into())))?;
        if !class_file.is_interface() {
            if let Some(ref super_name) = class_file.super_name {
                if self.needs_initialization(state, super_name, oracle)? {
                    self.stage(state, super_name, oracle, log, staged)?;
                }
            }
        }

        let frame = state.clinit_frame(class).map_err(initializer_failure)?;
        trace!("staged {} ({} initializer)", class, if frame.is_some() { "with" } else { "no" });
        staged.push((class.to_owned(), frame));
        Ok(())
    }

    /// Pushes the staged frames, the derived class's first, so that the most ancestral
    /// initializer is on top and runs first. Every caller resumes at the instruction that
    /// triggered the initialization.
    fn commit(&self, state: &mut State, staged: Vec<(String, Option<Frame>)>,
              log: &mut RollbackLog) -> Result<(), Failure> {
        for (class, frame) in staged.into_iter().rev() {
            let status = match frame {
                Some(frame) => {
                    state.push_prepared_frame(frame, 0);
                    log.pushed_frames += 1;
                    KlassStatus::Initializing
                },
                None => KlassStatus::Initialized,
            };
            state.set_klass_status(&class, status)
                .map_err(|e| Failure::Fault(EngineError::State(e)))?;
        }
        Ok(())
    }

    fn roll_back(&self, state: &mut State, class: &str, log: &RollbackLog)
                 -> Result<(), EngineError> {
        for _ in 0..log.pushed_frames {
            state.pop_current_frame()?;
        }
        if self.rollback_klasses {
            for created in log.created_klasses.iter().rev() {
                state.remove_klass(created);
            }
        }
        warn!("initialization of {} failed: popped {} frames, {} {} Klasses", class,
              log.pushed_frames, if self.rollback_klasses { "removed" } else { "kept" },
              log.created_klasses.len());
        Ok(())
    }
}

/// `ClassInitializer::ensure_klass` with the default settings.
pub fn ensure_klass(state: &mut State, class: &str, oracle: &mut dyn DecisionOracle)
                    -> Result<bool, EngineError> {
    ClassInitializer::default().ensure_klass(state, class, oracle)
}
