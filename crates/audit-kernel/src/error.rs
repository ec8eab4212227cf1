//! Error types for job execution and result delivery
//!
//! Degraded report outcomes never appear here: a run that hit its deadline
//! or the row ceiling completes normally and carries its status in the
//! artifact.

use crate::state_machine::WorkState;
use audit_core::{AuditError, ConfigError};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Unit-of-work errors
#[derive(Debug, thiserror::Error)]
pub enum WorkError {
    /// Report engine failed
    #[error("audit failed: {0}")]
    Audit(#[from] AuditError),

    /// Artifact could not be delivered
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    /// Job outlived its transactional window
    #[error("transaction window of {}ms exceeded", window.as_millis())]
    TransactionTimeout { window: Duration },

    /// Work task panicked or was aborted
    #[error("work task aborted: {0}")]
    Aborted(String),

    /// Job state machine violated
    #[error("illegal work transition: {from} -> {to}")]
    IllegalTransition { from: WorkState, to: WorkState },

    /// A job with this id is already registered
    #[error("job {0} already submitted")]
    DuplicateJob(Uuid),

    /// Scheduler configuration rejected
    #[error("scheduler needs at least one concurrent slot")]
    NoConcurrency,

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl WorkError {
    /// Check if the failure came from a collaborator that may recover
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Audit(e) => e.is_transient(),
            Self::Publish(e) => e.is_transient(),
            Self::TransactionTimeout { .. } => true,
            Self::Aborted(_)
            | Self::IllegalTransition { .. }
            | Self::DuplicateJob(_)
            | Self::NoConcurrency
            | Self::Config(_) => false,
        }
    }
}

/// Result delivery errors
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Artifact or destination I/O failed
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Artifact path has no file name
    #[error("artifact path {0} has no file name")]
    InvalidArtifact(PathBuf),

    /// Email publisher configured without recipients
    #[error("email publisher needs at least one recipient")]
    NoRecipients,

    /// Mail transport refused the message
    #[error("mailer error: {0}")]
    Mailer(String),

    /// Receiving side of a channel publisher is gone
    #[error("result channel closed")]
    ChannelClosed,
}

impl PublishError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if a retry could succeed
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Mailer(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_core::RepositoryError;

    #[test]
    fn transient_classification() {
        let unavailable = WorkError::Audit(AuditError::Repository(RepositoryError::Unavailable(
            "down".to_string(),
        )));
        assert!(unavailable.is_transient());

        let missing = WorkError::Audit(AuditError::Repository(RepositoryError::NodeNotFound(
            audit_core::NodeId(3),
        )));
        assert!(!missing.is_transient());

        assert!(WorkError::TransactionTimeout {
            window: Duration::from_secs(1)
        }
        .is_transient());
        assert!(WorkError::Publish(PublishError::Mailer("421".to_string())).is_transient());
        assert!(!WorkError::Publish(PublishError::ChannelClosed).is_transient());
        assert!(!WorkError::DuplicateJob(Uuid::nil()).is_transient());
    }

    #[test]
    fn messages_name_the_cause() {
        let err = WorkError::TransactionTimeout {
            window: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "transaction window of 250ms exceeded");

        let err = WorkError::IllegalTransition {
            from: WorkState::Completed,
            to: WorkState::Running,
        };
        assert_eq!(err.to_string(), "illegal work transition: COMPLETED -> RUNNING");
    }
}
