//! Lifecycle of a single chunk-update request
//!
//! `Requested -> Resolved -> Committed`, with `Failed` reachable from both
//! non-terminal states. A request that fails before `Committed` has written
//! nothing to the store.

use crate::error::StateMachineError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use upq_types::ChunkId;

/// State of a chunk-update request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// Accepted, plots not looked up yet
    Requested,
    /// Plots resolved from the index
    Resolved,
    /// Store commit succeeded
    Committed,
    /// Unknown chunk or store failure
    Failed,
}

impl DispatchState {
    /// No further transitions possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }
}

impl Display for DispatchState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Requested => "requested",
            Self::Resolved => "resolved",
            Self::Committed => "committed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Validates a state transition.
///
/// # Errors
/// Returns [`StateMachineError::IllegalTransition`] if `to` is not reachable
/// from `from` in one step
pub fn validate_transition(from: DispatchState, to: DispatchState) -> Result<(), StateMachineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StateMachineError::IllegalTransition { from, to })
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: DispatchState) -> Vec<DispatchState> {
    use DispatchState::*;
    match from {
        Requested => vec![Resolved, Failed],
        Resolved => vec![Committed, Failed],
        Committed | Failed => vec![],
    }
}

/// Tracks one request through its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    chunk: ChunkId,
    state: DispatchState,
}

impl DispatchRequest {
    /// New request in `Requested`
    #[inline]
    #[must_use]
    pub fn new(chunk: ChunkId) -> Self {
        Self {
            chunk,
            state: DispatchState::Requested,
        }
    }

    /// Chunk this request is for
    #[inline]
    #[must_use]
    pub fn chunk(&self) -> ChunkId {
        self.chunk
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Move to `to`
    ///
    /// # Errors
    /// Returns [`StateMachineError::IllegalTransition`] and leaves the state
    /// unchanged if the move is not allowed
    pub fn advance(&mut self, to: DispatchState) -> Result<(), StateMachineError> {
        validate_transition(self.state, to)?;
        tracing::trace!(chunk = %self.chunk, from = %self.state, %to, "request transition");
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_state() -> impl Strategy<Value = DispatchState> {
        prop_oneof![
            Just(DispatchState::Requested),
            Just(DispatchState::Resolved),
            Just(DispatchState::Committed),
            Just(DispatchState::Failed),
        ]
    }

    #[test]
    fn happy_path() {
        let mut request = DispatchRequest::new(ChunkId::new(0));
        request.advance(DispatchState::Resolved).unwrap();
        request.advance(DispatchState::Committed).unwrap();
        assert!(request.state().is_terminal());
    }

    #[test]
    fn cannot_skip_resolution() {
        let mut request = DispatchRequest::new(ChunkId::new(0));
        let err = request.advance(DispatchState::Committed).unwrap_err();
        assert_eq!(
            err,
            StateMachineError::IllegalTransition {
                from: DispatchState::Requested,
                to: DispatchState::Committed,
            }
        );
        assert_eq!(request.state(), DispatchState::Requested);
    }

    #[test]
    fn failure_reachable_before_commit_only() {
        assert!(validate_transition(DispatchState::Requested, DispatchState::Failed).is_ok());
        assert!(validate_transition(DispatchState::Resolved, DispatchState::Failed).is_ok());
        assert!(validate_transition(DispatchState::Committed, DispatchState::Failed).is_err());
    }

    proptest! {
        #[test]
        fn terminal_states_stay_terminal(to in any_state()) {
            prop_assert!(validate_transition(DispatchState::Committed, to).is_err());
            prop_assert!(validate_transition(DispatchState::Failed, to).is_err());
        }

        #[test]
        fn no_self_loops(state in any_state()) {
            prop_assert!(validate_transition(state, state).is_err());
        }
    }
}
