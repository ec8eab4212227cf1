//! Report layout settings
//!
//! [`ReportLayoutSettings`] is built once, validated, and then shared
//! read-only for the whole run.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default number of nodes between deadline checks
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Permission labels reported by default
pub const DEFAULT_PERMISSIONS: [&str; 3] = ["Read", "ReadWrite", "Everything"];

/// Immutable layout configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportLayoutSettings {
    page_size: usize,
    permissions: Vec<String>,
    show_inherited: bool,
    include_header: bool,
}

impl ReportLayoutSettings {
    /// Create default settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With nodes processed between deadline checks
    #[inline]
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// With permission columns, in column order
    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Report inherited entries as well as local ones
    #[inline]
    #[must_use]
    pub fn with_show_inherited(mut self, show: bool) -> Self {
        self.show_inherited = show;
        self
    }

    /// Write a column title row before the content rows
    #[inline]
    #[must_use]
    pub fn with_header(mut self, include: bool) -> Self {
        self.include_header = include;
        self
    }

    #[inline]
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    #[must_use]
    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    #[inline]
    #[must_use]
    pub fn show_inherited(&self) -> bool {
        self.show_inherited
    }

    #[inline]
    #[must_use]
    pub fn include_header(&self) -> bool {
        self.include_header
    }

    /// Check settings invariants
    ///
    /// # Errors
    /// - `ConfigError::InvalidPageSize` for a zero page size
    /// - `ConfigError::EmptyPermission` for a blank label
    /// - `ConfigError::DuplicatePermission` for a repeated label
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidPageSize);
        }
        let mut seen = HashSet::new();
        for label in &self.permissions {
            if label.trim().is_empty() {
                return Err(ConfigError::EmptyPermission);
            }
            if !seen.insert(label.as_str()) {
                return Err(ConfigError::DuplicatePermission(label.clone()));
            }
        }
        Ok(())
    }

    /// Columns of one report row, in order
    #[must_use]
    pub fn columns(&self) -> Vec<ReportColumn> {
        let mut columns = vec![
            ReportColumn::Path,
            ReportColumn::Principal,
            ReportColumn::Permission,
            ReportColumn::Access,
            ReportColumn::BlocksInheritance,
        ];
        if self.show_inherited {
            columns.push(ReportColumn::Inherited);
        }
        columns.extend(
            self.permissions
                .iter()
                .cloned()
                .map(ReportColumn::PermissionFlag),
        );
        columns
    }
}

impl Default for ReportLayoutSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            permissions: DEFAULT_PERMISSIONS.iter().map(|p| (*p).to_string()).collect(),
            show_inherited: true,
            include_header: true,
        }
    }
}

/// One column of the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportColumn {
    /// Document path (text)
    Path,
    /// Principal name (text)
    Principal,
    /// Raw permission label (text)
    Permission,
    /// `GRANT` or `DENY` (text)
    Access,
    /// Entry blocks inheritance (bool)
    BlocksInheritance,
    /// Entry comes from an ancestor (bool)
    Inherited,
    /// Entry's permission equals this label (bool)
    PermissionFlag(String),
}

impl ReportColumn {
    /// Header title
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Path => "Document",
            Self::Principal => "Principal",
            Self::Permission => "Permission",
            Self::Access => "Access",
            Self::BlocksInheritance => "Blocks inheritance",
            Self::Inherited => "Inherited",
            Self::PermissionFlag(label) => label,
        }
    }
}
