//! Audit Core - bounded ACL report engine
//!
//! Walks a document tree and renders its access-control entries into a
//! sheet-limited workbook:
//! - Filters principals through a [`ContentFilter`]
//! - Stops cooperatively on a wall-clock deadline or the row ceiling
//! - Never writes a node's rows partially
//! - Marks every artifact with its terminal [`ProcessorStatus`]
//!
//! # Example
//!
//! ```rust
//! use audit_core::{
//!     AccessControlEntry, AcceptsAllContent, AuditReportBuilder, InMemoryTree,
//!     ProcessorStatus, ReportLayoutSettings,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let mut tree = InMemoryTree::new();
//! let root = tree.add_root("/default-domain");
//! tree.push_ace(root, AccessControlEntry::grant("members", "Read")).unwrap();
//!
//! let builder = AuditReportBuilder::new(
//!     Arc::new(tree),
//!     Arc::new(ReportLayoutSettings::new()),
//!     Arc::new(AcceptsAllContent),
//! )
//! .unwrap();
//!
//! let rendered = builder.render(root, Duration::from_secs(10)).unwrap();
//! assert_eq!(rendered.status(), ProcessorStatus::Ok);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod filter;
pub mod processor;
pub mod report;
pub mod repository;
pub mod settings;
pub mod status;

pub use config::{AuditConfig, JobConfig, SchedulerConfig, SheetConfig};
pub use error::{AuditError, ConfigError};
pub use filter::{
    AcceptsAllContent, AcceptsGroupOnly, ContentFilter, FilterPolicy, InMemoryRegistry,
    PrincipalRegistry,
};
pub use processor::{BoundedDataProcessor, ProcessorReport, FIRST_CONTENT_ROW};
pub use report::{
    AuditArtifact, AuditReportBuilder, RenderedReport, BANNER_WIDTH, GENERATED_AT_CELL,
    ROOT_PATH_CELL,
};
pub use repository::{
    AccessControlEntry, DocumentTree, InMemoryTree, NodeId, RepositoryError, TreeNode,
};
pub use settings::{ReportColumn, ReportLayoutSettings, DEFAULT_PAGE_SIZE, DEFAULT_PERMISSIONS};
pub use status::{
    validate_transition, ProcessorState, ProcessorStatus, UnknownStatus, STATUS_CELL,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Audit Core
    pub use crate::{
        AccessControlEntry, AcceptsAllContent, AuditArtifact, AuditConfig, AuditError,
        AuditReportBuilder, ContentFilter, DocumentTree, NodeId, ProcessorStatus,
        ReportLayoutSettings, STATUS_CELL,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
