//! Work lifecycle state machine
//!
//! `SCHEDULED -> RUNNING -> {COMPLETED, FAILED}`, plus `SCHEDULED -> CANCELED`
//! for jobs withdrawn before they start.

use crate::error::WorkError;
use std::fmt::{self, Display, Formatter};

/// Generic unit-of-work state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkState {
    /// Accepted, waiting for a slot
    Scheduled,
    /// Executing
    Running,
    /// Finished without error
    Completed,
    /// Finished with an error
    Failed,
    /// Withdrawn before it ran
    Canceled,
}

impl WorkState {
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }

    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }
}

impl Display for WorkState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: WorkState) -> &'static [WorkState] {
    use WorkState::*;
    match from {
        Scheduled => &[Running, Canceled],
        Running => &[Completed, Failed],
        Completed | Failed | Canceled => &[],
    }
}

/// Validates a state transition
///
/// # Errors
/// - `WorkError::IllegalTransition` if `to` is not reachable from `from`
pub fn validate_transition(from: WorkState, to: WorkState) -> Result<(), WorkError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(WorkError::IllegalTransition { from, to })
    }
}
