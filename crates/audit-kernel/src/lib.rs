//! Audit Kernel - asynchronous execution of audit reports
//!
//! Runs [`AuditJob`]s on a [`LocalScheduler`] and hands finished artifacts to
//! a [`ResultPublisher`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use audit_kernel::prelude::*;
//!
//! let scheduler = LocalScheduler::new(4, Duration::from_secs(600))?;
//! let job = AuditJob::new("nightly", "default", root, "/tmp/nightly.json", builder, publisher);
//! let handle = scheduler.submit(Arc::new(job))?;
//! assert_eq!(handle.wait().await, WorkState::Completed);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod job;
pub mod publisher;
pub mod scheduler;
pub mod state_machine;

pub use error::{PublishError, WorkError};
pub use job::{AuditJob, DEFAULT_JOB_TIMEOUT, DEFAULT_SAFETY_MARGIN, MIN_SAFETY_MARGIN};
pub use publisher::{
    ChannelPublisher, EmailMessage, EmailPublisher, FileSystemPublisher, Mailer, OutboxMailer,
    ResultPublisher,
};
pub use scheduler::{JobHandle, LocalScheduler, SchedulerStats, Work, WorkContext};
pub use state_machine::{allowed_transitions, validate_transition, WorkState};

/// Common imports for running audit jobs
pub mod prelude {
    pub use crate::{
        AuditJob, ChannelPublisher, FileSystemPublisher, JobHandle, LocalScheduler,
        ResultPublisher, Work, WorkError, WorkState,
    };
    pub use std::sync::Arc;
    pub use std::time::Duration;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
