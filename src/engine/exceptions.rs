//! Materialization of the engine's own exceptions, and stack unwinding that never fails on
//! malformed handler metadata.

use log::{debug, warn};

use crate::engine::throwable::Throwable;
use crate::engine::EngineError;
use crate::vm::{self, HandlerSearch, Reference, State, Unwinding, Value};

/// Creates an instance of `throwable` with default-valued fields, pushes it on the operand
/// stack of the current frame, and unwinds.
pub fn create_and_throw(state: &mut State, throwable: Throwable) -> Result<Unwinding, EngineError> {
    if throwable == Throwable::VerifyError {
        return throw_verify_error(state);
    }
    debug!("throwing {}", throwable);
    let reference = state.create_throwable(throwable.class_name())?;
    state.push_operand(Value::Reference(reference.clone()))?;
    throw_it(state, &reference)
}

/// Unwinds the thread stack for `reference`. If the exception table or program counter of a
/// frame turns out to be malformed on the way, a `VerifyError` is thrown from that frame
/// instead.
pub fn throw_it(state: &mut State, reference: &Reference) -> Result<Unwinding, EngineError> {
    match state.throw_it(reference, HandlerSearch::Strict) {
        Ok(unwinding) => Ok(unwinding),
        Err(e @ vm::Error::InvalidIndex(_)) | Err(e @ vm::Error::InvalidProgramCounter { .. }) => {
            warn!("malformed exception handler metadata ({}), throwing VerifyError", e);
            throw_verify_error(state)
        },
        Err(e) => Err(EngineError::State(e)),
    }
}

/// Throws a `VerifyError` from the current frame. The search for its handler skips malformed
/// handlers instead of failing on them, so it always terminates.
pub fn throw_verify_error(state: &mut State) -> Result<Unwinding, EngineError> {
    debug!("throwing {}", Throwable::VerifyError);
    let reference = state.create_throwable(Throwable::VerifyError.class_name())?;
    state.push_operand(Value::Reference(reference.clone()))?;
    Ok(state.throw_it(&reference, HandlerSearch::Lenient)?)
}
