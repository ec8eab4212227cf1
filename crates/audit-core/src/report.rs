//! Audit report builder
//!
//! One [`AuditReportBuilder::render`] call is one report run:
//! - writes the banner row (root path, generation time)
//! - runs a [`BoundedDataProcessor`] over the tree
//! - writes the terminal status into [`STATUS_CELL`] last
//!
//! An interrupted run still yields a complete, status-marked workbook.

use crate::error::{AuditError, ConfigError};
use crate::filter::ContentFilter;
use crate::processor::{BoundedDataProcessor, ProcessorReport, FIRST_CONTENT_ROW};
use crate::repository::{DocumentTree, NodeId};
use crate::settings::ReportLayoutSettings;
use crate::status::{ProcessorStatus, STATUS_CELL};
use audit_sheet::{GridMode, PhysicalCell, TabularSheetStore, VirtualGrid, VirtualWorkbook};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Banner cell holding the root document path
pub const ROOT_PATH_CELL: PhysicalCell = PhysicalCell::new(0, 0, 1);

/// Banner cell holding the generation timestamp (RFC 3339)
pub const GENERATED_AT_CELL: PhysicalCell = PhysicalCell::new(0, 0, 2);

/// Columns the first sheet needs for the status marker and banner
pub const BANNER_WIDTH: usize = GENERATED_AT_CELL.col + 1;

/// Workbook plus run diagnostics
#[derive(Debug, Clone)]
pub struct RenderedReport {
    /// Status-marked workbook
    pub workbook: VirtualWorkbook,
    /// Run diagnostics
    pub report: ProcessorReport,
}

impl RenderedReport {
    #[inline]
    #[must_use]
    pub fn status(&self) -> ProcessorStatus {
        self.report.status
    }
}

/// A saved report file
///
/// Once handed to a publisher the file is never touched again by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditArtifact {
    /// File location
    pub path: PathBuf,
    /// Terminal status (also stored in the file)
    pub status: ProcessorStatus,
    /// Run diagnostics
    pub report: ProcessorReport,
}

impl AuditArtifact {
    /// Recover the status of an artifact file from its marker cell
    ///
    /// # Errors
    /// - `AuditError::Sheet` if the file cannot be loaded
    /// - `AuditError::MissingStatus` if the marker is absent or unrecognised
    pub fn read_status(path: impl AsRef<Path>) -> Result<ProcessorStatus, AuditError> {
        let path = path.as_ref();
        let store = TabularSheetStore::load(path)?;
        let missing = |reason: String| AuditError::MissingStatus {
            path: path.to_path_buf(),
            reason,
        };
        let literal = store
            .get_cell(STATUS_CELL)
            .ok_or_else(|| missing(format!("{STATUS_CELL} is empty")))?
            .as_text()
            .ok_or_else(|| missing(format!("{STATUS_CELL} is not text")))?;
        literal.parse().map_err(|e| missing(format!("{e}")))
    }
}

/// Orchestrates report runs over one tree
#[derive(Debug, Clone)]
pub struct AuditReportBuilder {
    tree: Arc<dyn DocumentTree>,
    filter: Arc<dyn ContentFilter>,
    settings: Arc<ReportLayoutSettings>,
    grid: VirtualGrid,
}

impl AuditReportBuilder {
    /// Create builder with the default grid
    ///
    /// # Errors
    /// - `ConfigError` if the settings are invalid
    pub fn new(
        tree: Arc<dyn DocumentTree>,
        settings: Arc<ReportLayoutSettings>,
        filter: Arc<dyn ContentFilter>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            tree,
            filter,
            settings,
            grid: VirtualGrid::default(),
        })
    }

    /// Use a different grid
    ///
    /// # Errors
    /// - `ConfigError::SheetTooNarrow` if the banner row does not fit a sheet
    /// - `ConfigError::TooManyColumns` if a report row cannot fit a single sheet
    pub fn with_grid(mut self, grid: VirtualGrid) -> Result<Self, ConfigError> {
        let columns = self.settings.columns().len();
        let max_cols = grid.limits().max_cols;
        if max_cols < BANNER_WIDTH {
            return Err(ConfigError::SheetTooNarrow {
                max_cols,
                required: BANNER_WIDTH,
            });
        }
        if grid.mode() == GridMode::SingleSheet && columns > max_cols {
            return Err(ConfigError::TooManyColumns { columns, max_cols });
        }
        self.grid = grid;
        Ok(self)
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &ReportLayoutSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn grid(&self) -> VirtualGrid {
        self.grid
    }

    /// Run one report
    ///
    /// # Errors
    /// - `AuditError::Repository` if the tree cannot be read
    /// - `AuditError::Sheet`/`AuditError::Grid` for non-capacity write failures
    pub fn render(&self, root: NodeId, budget: Duration) -> Result<RenderedReport, AuditError> {
        let mut workbook = VirtualWorkbook::new(self.grid);
        let root_path = self.tree.node(root)?.path;

        workbook.set_physical(ROOT_PATH_CELL, root_path)?;
        workbook.set_physical(
            GENERATED_AT_CELL,
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        )?;

        let mut processor = BoundedDataProcessor::new(
            self.tree.as_ref(),
            self.filter.as_ref(),
            &self.settings,
            budget,
        )?
        .with_first_row(FIRST_CONTENT_ROW);
        let report = processor.run(root, &mut workbook)?;

        workbook.set_physical(STATUS_CELL, report.status.as_str())?;
        Ok(RenderedReport { workbook, report })
    }

    /// Run one report and save it to `path`
    ///
    /// # Errors
    /// As [`render`](Self::render), plus `AuditError::Sheet` if saving fails
    pub fn render_to(
        &self,
        root: NodeId,
        budget: Duration,
        path: impl AsRef<Path>,
    ) -> Result<AuditArtifact, AuditError> {
        let path = path.as_ref();
        let rendered = self.render(root, budget)?;
        rendered.workbook.save(path)?;
        tracing::info!(
            path = %path.display(),
            status = %rendered.report.status,
            rows = rendered.report.rows_written,
            "audit artifact written"
        );
        Ok(AuditArtifact {
            path: path.to_path_buf(),
            status: rendered.report.status,
            report: rendered.report,
        })
    }
}
