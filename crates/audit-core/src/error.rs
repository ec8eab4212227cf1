//! Error types for the audit engine
//!
//! Provides error handling for:
//! - Tree/ACL capability failures
//! - Artifact storage failures
//! - Configuration and contract violations
//!
//! Degraded outcomes (deadline or row ceiling reached) are not errors; they
//! are reported through [`ProcessorStatus`](crate::ProcessorStatus).

use crate::repository::RepositoryError;
use crate::status::ProcessorState;
use audit_sheet::{GridError, SheetError, VirtualBookError};
use std::path::PathBuf;

/// Main audit engine error type
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Tree/ACL capability failed
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Artifact storage failed
    #[error("sheet error: {0}")]
    Sheet(#[from] SheetError),

    /// Coordinate could not be mapped
    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Processor state machine violated
    #[error("illegal processor transition: {from:?} -> {to:?}")]
    IllegalTransition {
        from: ProcessorState,
        to: ProcessorState,
    },

    /// Artifact has no readable status marker
    #[error("artifact {path} has no valid status marker: {reason}")]
    MissingStatus { path: PathBuf, reason: String },
}

impl AuditError {
    /// Check if error comes from an external collaborator that may recover
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Repository(RepositoryError::Unavailable(_)) | Self::Sheet(SheetError::Io { .. })
        )
    }
}

impl From<VirtualBookError> for AuditError {
    fn from(value: VirtualBookError) -> Self {
        match value {
            VirtualBookError::Grid(e) => Self::Grid(e),
            VirtualBookError::Sheet(e) => Self::Sheet(e),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Page size must be positive
    #[error("page size must be at least 1")]
    InvalidPageSize,

    /// Permission label is blank
    #[error("permission labels must not be empty")]
    EmptyPermission,

    /// Permission label listed twice
    #[error("duplicate permission label: {0}")]
    DuplicatePermission(String),

    /// Sheet limits rejected
    #[error("invalid sheet limits: {0}")]
    Limits(#[from] GridError),

    /// Sheet cannot hold the banner row
    #[error("sheets need at least {required} columns for the banner, got {max_cols}")]
    SheetTooNarrow { max_cols: usize, required: usize },

    /// Job safety margin must be positive
    #[error("job safety margin must be greater than zero")]
    ZeroSafetyMargin,

    /// Safety margin leaves no processing time in the scheduler window
    #[error("job safety margin of {margin_ms}ms does not fit the {window_ms}ms transaction window")]
    MarginExceedsWindow { margin_ms: u64, window_ms: u64 },

    /// Scheduler needs at least one slot
    #[error("scheduler max_concurrent must be at least 1")]
    NoConcurrency,

    /// Report row does not fit a single sheet
    #[error("report needs {columns} columns but single-sheet mode allows {max_cols}")]
    TooManyColumns { columns: usize, max_cols: usize },

    /// Group-only filtering needs a registry
    #[error("filter policy 'groups-only' requires a principal registry")]
    MissingRegistry,

    /// TOML could not be parsed
    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_error_display() {
        let err = AuditError::from(RepositoryError::Unavailable("db down".to_string()));
        assert!(err.to_string().contains("repository error"));
        assert!(err.to_string().contains("db down"));
    }

    #[test]
    fn transient_classification() {
        assert!(AuditError::from(RepositoryError::Unavailable("x".to_string())).is_transient());
        assert!(!AuditError::from(ConfigError::InvalidPageSize).is_transient());
        assert!(!AuditError::IllegalTransition {
            from: ProcessorState::Completed,
            to: ProcessorState::Running,
        }
        .is_transient());
    }
}
