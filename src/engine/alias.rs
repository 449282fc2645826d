use crate::vm::{Reference, State};

/// Whether two references point to the same object in `state`. A reference contributes a
/// position only if it is concrete or resolved to an object; an unresolved symbolic reference
/// (or one resolved to `null`) aliases nothing, not even itself.
pub fn aliases(state: &State, first: &Reference, second: &Reference) -> bool {
    match (state.position_of(first), state.position_of(second)) {
        (Some(first), Some(second)) => first == second,
        _ => false,
    }
}
