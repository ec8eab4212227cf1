//! Bounded data processor
//!
//! Walks a document tree depth-first with an explicit stack, emits one row
//! per accepted ACL entry, and stops cooperatively when either:
//! - the wall-clock deadline has passed (checked every `page_size` nodes,
//!   always between nodes)
//! - the next node's rows would not fit under the row ceiling
//!
//! A node's rows are written as a unit: capacity is checked for the whole
//! node before its first cell is written, and the deadline is never checked
//! in the middle of a node.

use crate::error::AuditError;
use crate::filter::ContentFilter;
use crate::repository::{AccessControlEntry, DocumentTree, NodeId};
use crate::settings::{ReportColumn, ReportLayoutSettings};
use crate::status::{validate_transition, ProcessorState, ProcessorStatus};
use audit_sheet::{CellValue, LogicalCoord, VirtualBookError, VirtualWorkbook};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// First logical row available to the processor; row 0 is the report banner
pub const FIRST_CONTENT_ROW: usize = 1;

/// Diagnostics for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorReport {
    /// Terminal status
    pub status: ProcessorStatus,
    /// Nodes whose rows were written
    pub nodes_visited: usize,
    /// Content rows written (header excluded)
    pub rows_written: usize,
    /// Entries rejected by the filter
    pub entries_filtered: usize,
    /// Next free logical row
    pub next_row: usize,
    /// Time budget granted
    pub budget: Duration,
    /// Time spent running
    pub elapsed: Duration,
    /// Budget left when the run stopped
    pub remaining: Duration,
}

struct Frame {
    node: NodeId,
    inherited: Arc<[AccessControlEntry]>,
}

struct PendingRow<'e> {
    entry: &'e AccessControlEntry,
    inherited: bool,
}

/// Deadline-bounded traversal of one tree
pub struct BoundedDataProcessor<'a> {
    tree: &'a dyn DocumentTree,
    filter: &'a dyn ContentFilter,
    settings: &'a ReportLayoutSettings,
    columns: Vec<ReportColumn>,
    budget: Duration,
    first_row: usize,
    state: ProcessorState,
}

impl<'a> BoundedDataProcessor<'a> {
    /// Bind settings and filter
    ///
    /// # Errors
    /// - `AuditError::Config` if the settings are invalid
    pub fn new(
        tree: &'a dyn DocumentTree,
        filter: &'a dyn ContentFilter,
        settings: &'a ReportLayoutSettings,
        budget: Duration,
    ) -> Result<Self, AuditError> {
        settings.validate()?;
        Ok(Self {
            tree,
            filter,
            settings,
            columns: settings.columns(),
            budget,
            first_row: FIRST_CONTENT_ROW,
            state: ProcessorState::Init,
        })
    }

    /// Start writing at a different logical row
    #[inline]
    #[must_use]
    pub fn with_first_row(mut self, row: usize) -> Self {
        self.first_row = row;
        self
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> ProcessorState {
        self.state
    }

    fn transition(&mut self, to: ProcessorState) -> Result<(), AuditError> {
        validate_transition(self.state, to)?;
        tracing::trace!(from = ?self.state, to = ?to, "processor transition");
        self.state = to;
        Ok(())
    }

    /// Traverse from `root`, writing rows into `book`
    ///
    /// Interruptions are not errors: the returned report carries the
    /// terminal status.
    ///
    /// # Errors
    /// - `AuditError::Repository` if the tree cannot be read
    /// - `AuditError::Sheet`/`AuditError::Grid` for non-capacity write failures
    /// - `AuditError::IllegalTransition` if the processor is reused
    pub fn run(
        &mut self,
        root: NodeId,
        book: &mut VirtualWorkbook,
    ) -> Result<ProcessorReport, AuditError> {
        self.transition(ProcessorState::Running)?;
        let started = Instant::now();
        // a budget past the clock's range never expires
        let deadline = started.checked_add(self.budget);
        let page_size = self.settings.page_size();

        let mut nodes_visited = 0usize;
        let mut rows_written = 0usize;
        let mut entries_filtered = 0usize;
        let mut next_row = self.first_row;

        tracing::info!(
            root = %root,
            budget_ms = u64::try_from(self.budget.as_millis()).unwrap_or(u64::MAX),
            page_size,
            "audit traversal started"
        );

        let mut outcome = ProcessorState::Completed;

        if self.settings.include_header() {
            match self.write_header(book, next_row) {
                Ok(()) => next_row += 1,
                Err(e) if e.is_row_capacity() => outcome = ProcessorState::InterruptedCapacity,
                Err(e) => return Err(e.into()),
            }
        }

        let mut stack = vec![Frame {
            node: root,
            inherited: Arc::from(Vec::new()),
        }];

        while outcome == ProcessorState::Completed {
            let Some(frame) = stack.pop() else {
                break;
            };

            if nodes_visited % page_size == 0 {
                if nodes_visited > 0 {
                    tracing::debug!(nodes_visited, rows_written, "audit page processed");
                }
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    outcome = ProcessorState::InterruptedTime;
                    break;
                }
            }

            let path = self.tree.node(frame.node)?.path;
            let local = self.tree.acl(frame.node)?;
            let blocked = local.iter().any(|e| e.block_inheritance);
            let show_inherited = self.settings.show_inherited();

            let mut rows = Vec::with_capacity(local.len());
            let mut filtered = 0usize;
            let candidates = local
                .iter()
                .map(|entry| PendingRow {
                    entry,
                    inherited: false,
                })
                .chain(
                    frame
                        .inherited
                        .iter()
                        .filter(|_| show_inherited && !blocked)
                        .map(|entry| PendingRow {
                            entry,
                            inherited: true,
                        }),
                );
            for row in candidates {
                if self.filter.accepts(&row.entry.principal) {
                    rows.push(row);
                } else {
                    filtered += 1;
                }
            }

            if let Some(extra) = rows.len().checked_sub(1) {
                if let Err(e) = book.ensure_row_capacity(next_row + extra) {
                    tracing::debug!(node = %frame.node, error = %e, "row ceiling reached");
                    outcome = ProcessorState::InterruptedCapacity;
                    break;
                }
            }

            for row in &rows {
                self.write_row(book, next_row, &path, row)?;
                next_row += 1;
            }
            rows_written += rows.len();
            entries_filtered += filtered;
            nodes_visited += 1;

            let children = self.tree.children(frame.node)?;
            let passed_down: Arc<[AccessControlEntry]> = if show_inherited {
                let mut effective = local.clone();
                if !blocked {
                    effective.extend(frame.inherited.iter().cloned());
                }
                Arc::from(effective)
            } else {
                Arc::clone(&frame.inherited)
            };
            stack.extend(children.into_iter().rev().map(|node| Frame {
                node,
                inherited: Arc::clone(&passed_down),
            }));
        }

        self.transition(outcome)?;
        let elapsed = started.elapsed();
        let status = outcome.status().unwrap_or(ProcessorStatus::Ok);

        let report = ProcessorReport {
            status,
            nodes_visited,
            rows_written,
            entries_filtered,
            next_row,
            budget: self.budget,
            elapsed,
            remaining: self.budget.saturating_sub(elapsed),
        };

        if status.is_complete() {
            tracing::info!(
                nodes = nodes_visited,
                rows = rows_written,
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "audit traversal completed"
            );
        } else {
            tracing::warn!(
                status = %status,
                nodes = nodes_visited,
                rows = rows_written,
                pending = stack.len(),
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "audit traversal interrupted"
            );
        }
        Ok(report)
    }

    fn write_header(
        &self,
        book: &mut VirtualWorkbook,
        row: usize,
    ) -> Result<(), VirtualBookError> {
        book.ensure_row_capacity(row)?;
        for (col, column) in self.columns.iter().enumerate() {
            book.set(LogicalCoord::new(row, col), column.title())?;
        }
        Ok(())
    }

    fn write_row(
        &self,
        book: &mut VirtualWorkbook,
        row: usize,
        path: &str,
        pending: &PendingRow<'_>,
    ) -> Result<(), AuditError> {
        let entry = pending.entry;
        for (col, column) in self.columns.iter().enumerate() {
            let value = match column {
                ReportColumn::Path => CellValue::from(path),
                ReportColumn::Principal => CellValue::from(entry.principal.as_str()),
                ReportColumn::Permission => CellValue::from(entry.permission.as_str()),
                ReportColumn::Access => {
                    CellValue::from(if entry.granted { "GRANT" } else { "DENY" })
                }
                ReportColumn::BlocksInheritance => CellValue::Bool(entry.block_inheritance),
                ReportColumn::Inherited => CellValue::Bool(pending.inherited),
                ReportColumn::PermissionFlag(label) => CellValue::Bool(entry.permission == *label),
            };
            book.set(LogicalCoord::new(row, col), value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{AcceptsAllContent, AcceptsGroupOnly, InMemoryRegistry};
    use crate::repository::InMemoryTree;
    use audit_sheet::{GridMode, SheetLimits, VirtualGrid};

    fn text(book: &VirtualWorkbook, row: usize, col: usize) -> Option<&str> {
        book.get(LogicalCoord::new(row, col)).and_then(CellValue::as_text)
    }

    fn flag(book: &VirtualWorkbook, row: usize, col: usize) -> Option<bool> {
        book.get(LogicalCoord::new(row, col)).and_then(CellValue::as_bool)
    }

    fn sample_tree() -> (InMemoryTree, NodeId) {
        let mut tree = InMemoryTree::new();
        let root = tree.add_root("/");
        tree.set_acl(root, vec![AccessControlEntry::grant("administrators", "Everything")])
            .unwrap();
        let ws = tree.add_child(root, "workspaces").unwrap();
        tree.set_acl(
            ws,
            vec![
                AccessControlEntry::grant("members", "Read"),
                AccessControlEntry::grant("alice", "ReadWrite"),
            ],
        )
        .unwrap();
        let private = tree.add_child(ws, "private").unwrap();
        tree.set_acl(
            private,
            vec![
                AccessControlEntry::grant("bob", "Everything"),
                AccessControlEntry::deny("Everyone", "Everything").blocking(),
            ],
        )
        .unwrap();
        (tree, root)
    }

    fn book() -> VirtualWorkbook {
        VirtualWorkbook::new(VirtualGrid::default())
    }

    #[test]
    fn local_only_emits_one_row_per_entry() {
        let (tree, root) = sample_tree();
        let settings = ReportLayoutSettings::new()
            .with_show_inherited(false)
            .with_header(false);
        let mut book = book();

        let mut processor =
            BoundedDataProcessor::new(&tree, &AcceptsAllContent, &settings, Duration::from_secs(60))
                .unwrap();
        let report = processor.run(root, &mut book).unwrap();

        assert_eq!(report.status, ProcessorStatus::Ok);
        assert_eq!(report.nodes_visited, 3);
        assert_eq!(report.rows_written, 5);
        assert_eq!(report.next_row, FIRST_CONTENT_ROW + 5);
        assert_eq!(processor.state(), ProcessorState::Completed);

        // depth-first pre-order: /, /workspaces, /workspaces/private
        assert_eq!(text(&book, 1, 0), Some("/"));
        assert_eq!(text(&book, 2, 1), Some("members"));
        assert_eq!(text(&book, 3, 1), Some("alice"));
        assert_eq!(text(&book, 5, 1), Some("Everyone"));
        assert_eq!(text(&book, 5, 3), Some("DENY"));
        assert_eq!(flag(&book, 5, 4), Some(true));
        // permission flags: Read, ReadWrite, Everything
        assert_eq!(flag(&book, 2, 5), Some(true));
        assert_eq!(flag(&book, 2, 6), Some(false));
        assert_eq!(flag(&book, 1, 7), Some(true));
    }

    #[test]
    fn inherited_entries_stop_at_blocking_node() {
        let (tree, root) = sample_tree();
        let settings = ReportLayoutSettings::new().with_header(false);
        let mut book = book();

        let mut processor =
            BoundedDataProcessor::new(&tree, &AcceptsAllContent, &settings, Duration::from_secs(60))
                .unwrap();
        let report = processor.run(root, &mut book).unwrap();

        // root: 1 local; workspaces: 2 local + 1 inherited; private: 2 local (blocked)
        assert_eq!(report.rows_written, 6);
        assert_eq!(text(&book, 4, 1), Some("administrators"));
        assert_eq!(flag(&book, 4, 5), Some(true));
        assert_eq!(text(&book, 5, 0), Some("/workspaces/private"));
        assert_eq!(flag(&book, 6, 5), Some(false));
        assert_eq!(book.get(LogicalCoord::new(7, 0)), None);
    }

    #[test]
    fn filter_rejections_are_counted() {
        let (tree, root) = sample_tree();
        let registry = InMemoryRegistry::new().with_groups(["administrators", "members"]);
        let filter = AcceptsGroupOnly::new(Arc::new(registry));
        let settings = ReportLayoutSettings::new()
            .with_show_inherited(false)
            .with_header(false);
        let mut book = book();

        let report = BoundedDataProcessor::new(&tree, &filter, &settings, Duration::from_secs(60))
            .unwrap()
            .run(root, &mut book)
            .unwrap();

        assert_eq!(report.rows_written, 2);
        assert_eq!(report.entries_filtered, 3);
    }

    #[test]
    fn header_row_precedes_content() {
        let (tree, root) = sample_tree();
        let settings = ReportLayoutSettings::new();
        let mut book = book();

        BoundedDataProcessor::new(&tree, &AcceptsAllContent, &settings, Duration::from_secs(60))
            .unwrap()
            .run(root, &mut book)
            .unwrap();

        assert_eq!(text(&book, 1, 0), Some("Document"));
        assert_eq!(text(&book, 1, 5), Some("Inherited"));
        assert_eq!(text(&book, 2, 0), Some("/"));
    }

    #[test]
    fn zero_budget_stops_before_first_node() {
        let (tree, root) = sample_tree();
        let settings = ReportLayoutSettings::new();
        let mut book = book();

        let report = BoundedDataProcessor::new(&tree, &AcceptsAllContent, &settings, Duration::ZERO)
            .unwrap()
            .run(root, &mut book)
            .unwrap();

        assert_eq!(report.status, ProcessorStatus::ErrorTooLongProcess);
        assert_eq!(report.nodes_visited, 0);
        assert_eq!(report.remaining, Duration::ZERO);
    }

    #[test]
    fn unbounded_budget_runs_to_completion() {
        let (tree, root) = sample_tree();
        let settings = ReportLayoutSettings::new().with_page_size(1);
        let mut book = book();

        let report = BoundedDataProcessor::new(&tree, &AcceptsAllContent, &settings, Duration::MAX)
            .unwrap()
            .run(root, &mut book)
            .unwrap();

        assert_eq!(report.status, ProcessorStatus::Ok);
        assert_eq!(report.nodes_visited, tree.len());
        assert_eq!(report.budget, Duration::MAX);
    }

    #[test]
    fn node_rows_are_all_or_nothing_at_ceiling() {
        let (tree, root) = sample_tree();
        let settings = ReportLayoutSettings::new()
            .with_show_inherited(false)
            .with_header(false);
        // rows 0..4 writable: banner row + root (1) + workspaces (2) fit, private (2) does not
        let limits = SheetLimits::new(256, 5).unwrap();
        let mut book = VirtualWorkbook::new(VirtualGrid::new(limits, GridMode::ColumnOverflow));

        let report = BoundedDataProcessor::new(&tree, &AcceptsAllContent, &settings, Duration::from_secs(60))
            .unwrap()
            .run(root, &mut book)
            .unwrap();

        assert_eq!(report.status, ProcessorStatus::ErrorTooManyDocuments);
        assert_eq!(report.nodes_visited, 2);
        assert_eq!(report.rows_written, 3);
        assert_eq!(text(&book, 4, 0), None);
    }

    #[test]
    fn processor_cannot_run_twice() {
        let (tree, root) = sample_tree();
        let settings = ReportLayoutSettings::new();
        let mut book = book();
        let mut processor =
            BoundedDataProcessor::new(&tree, &AcceptsAllContent, &settings, Duration::from_secs(60))
                .unwrap();
        processor.run(root, &mut book).unwrap();

        let err = processor.run(root, &mut book).unwrap_err();
        assert!(matches!(err, AuditError::IllegalTransition { .. }));
    }

    #[test]
    fn unknown_root_is_a_repository_error() {
        let tree = InMemoryTree::new();
        let settings = ReportLayoutSettings::new();
        let mut book = book();
        let err = BoundedDataProcessor::new(&tree, &AcceptsAllContent, &settings, Duration::from_secs(1))
            .unwrap()
            .run(NodeId(0), &mut book)
            .unwrap_err();
        assert!(matches!(err, AuditError::Repository(_)));
    }
}
