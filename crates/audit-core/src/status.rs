//! Run outcome and processor state machine
//!
//! Every run ends in exactly one [`ProcessorStatus`], written as its literal
//! name into [`STATUS_CELL`] so readers of the raw artifact can recover it.

use crate::error::AuditError;
use audit_sheet::PhysicalCell;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Location of the status marker in every artifact
pub const STATUS_CELL: PhysicalCell = PhysicalCell::new(0, 0, 0);

/// Terminal outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessorStatus {
    /// Whole tree reported
    #[serde(rename = "OK")]
    Ok,
    /// Deadline reached before the tree was exhausted
    #[serde(rename = "ERROR_TOO_LONG_PROCESS")]
    ErrorTooLongProcess,
    /// Row ceiling reached before the tree was exhausted
    #[serde(rename = "ERROR_TOO_MANY_DOCUMENTS")]
    ErrorTooManyDocuments,
}

impl ProcessorStatus {
    /// Literal written into the status cell
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::ErrorTooLongProcess => "ERROR_TOO_LONG_PROCESS",
            Self::ErrorTooManyDocuments => "ERROR_TOO_MANY_DOCUMENTS",
        }
    }

    /// Whether the report covers the whole tree
    #[inline]
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl Display for ProcessorStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised status literal
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown processor status: '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for ProcessorStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(Self::Ok),
            "ERROR_TOO_LONG_PROCESS" => Ok(Self::ErrorTooLongProcess),
            "ERROR_TOO_MANY_DOCUMENTS" => Ok(Self::ErrorTooManyDocuments),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Processor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorState {
    /// Settings bound, deadline not started
    Init,
    /// Traversal in progress
    Running,
    /// Tree exhausted
    Completed,
    /// Deadline passed
    InterruptedTime,
    /// Row ceiling reached
    InterruptedCapacity,
}

impl ProcessorState {
    /// States reachable in one step
    #[must_use]
    pub fn allowed_transitions(self) -> &'static [ProcessorState] {
        use ProcessorState::*;
        match self {
            Init => &[Running],
            Running => &[Completed, InterruptedTime, InterruptedCapacity],
            Completed | InterruptedTime | InterruptedCapacity => &[],
        }
    }

    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Status for a terminal state
    #[must_use]
    pub fn status(self) -> Option<ProcessorStatus> {
        match self {
            Self::Completed => Some(ProcessorStatus::Ok),
            Self::InterruptedTime => Some(ProcessorStatus::ErrorTooLongProcess),
            Self::InterruptedCapacity => Some(ProcessorStatus::ErrorTooManyDocuments),
            Self::Init | Self::Running => None,
        }
    }
}

/// Validates a processor state transition
///
/// # Errors
/// - `AuditError::IllegalTransition` if `to` is not reachable from `from`
pub fn validate_transition(from: ProcessorState, to: ProcessorState) -> Result<(), AuditError> {
    if from.allowed_transitions().contains(&to) {
        Ok(())
    } else {
        Err(AuditError::IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ProcessorState; 5] = [
        ProcessorState::Init,
        ProcessorState::Running,
        ProcessorState::Completed,
        ProcessorState::InterruptedTime,
        ProcessorState::InterruptedCapacity,
    ];

    #[test]
    fn status_literals_round_trip() {
        for status in [
            ProcessorStatus::Ok,
            ProcessorStatus::ErrorTooLongProcess,
            ProcessorStatus::ErrorTooManyDocuments,
        ] {
            assert_eq!(status.as_str().parse::<ProcessorStatus>(), Ok(status));
            assert_eq!(status.to_string(), status.as_str());
        }
        assert!("ok".parse::<ProcessorStatus>().is_err());
    }

    #[test]
    fn terminal_states_map_to_status() {
        for state in ALL {
            assert_eq!(state.is_terminal(), state.status().is_some(), "{state:?}");
        }
        assert_eq!(
            ProcessorState::InterruptedCapacity.status(),
            Some(ProcessorStatus::ErrorTooManyDocuments)
        );
    }

    #[test]
    fn transitions() {
        assert!(validate_transition(ProcessorState::Init, ProcessorState::Running).is_ok());
        assert!(validate_transition(ProcessorState::Running, ProcessorState::InterruptedTime).is_ok());

        assert!(validate_transition(ProcessorState::Init, ProcessorState::Completed).is_err());
        assert!(validate_transition(ProcessorState::Completed, ProcessorState::Running).is_err());
        assert!(validate_transition(ProcessorState::Running, ProcessorState::Running).is_err());
    }

    #[test]
    fn status_cell_is_origin_of_first_sheet() {
        assert_eq!(STATUS_CELL, PhysicalCell::new(0, 0, 0));
    }
}
