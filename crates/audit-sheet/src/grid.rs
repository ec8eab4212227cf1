//! Virtual grid addressing
//!
//! Maps an unbounded logical `(row, column)` space onto fixed-size physical
//! sheets:
//! - [`GridMode::ColumnOverflow`] spreads columns across sheets in blocks of
//!   `max_cols`, rows pass through unchanged
//! - [`GridMode::SingleSheet`] keeps everything on sheet 0 and rejects columns
//!   past the sheet width
//!
//! The mapping is a pure function of the coordinate and the limits.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Maximum columns per sheet in the legacy binary spreadsheet format
pub const MAX_COLS_PER_SHEET: usize = 256;

/// Production row ceiling per sheet
///
/// A count, not an index: rows `0..MAX_ROWS_PER_SHEET` are writable.
pub const MAX_ROWS_PER_SHEET: usize = 65_536;

/// Per-sheet capacity of the target format
///
/// Both limits are counts. A write to row `max_rows` (or column `max_cols`)
/// already exceeds the sheet, so a sheet with `max_rows = 100` holds rows
/// 0 through 99.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SheetLimits {
    /// Columns per sheet
    pub max_cols: usize,
    /// Rows per sheet (highest writable row index is `max_rows - 1`)
    pub max_rows: usize,
}

impl SheetLimits {
    /// Create limits, rejecting zero capacities
    ///
    /// # Errors
    /// - `GridError::InvalidLimits` if either capacity is zero
    pub fn new(max_cols: usize, max_rows: usize) -> Result<Self, GridError> {
        if max_cols == 0 || max_rows == 0 {
            return Err(GridError::InvalidLimits { max_cols, max_rows });
        }
        Ok(Self { max_cols, max_rows })
    }

    /// Same column width, different row ceiling
    ///
    /// # Errors
    /// - `GridError::InvalidLimits` if `max_rows` is zero
    pub fn with_max_rows(self, max_rows: usize) -> Result<Self, GridError> {
        Self::new(self.max_cols, max_rows)
    }
}

impl Default for SheetLimits {
    fn default() -> Self {
        Self {
            max_cols: MAX_COLS_PER_SHEET,
            max_rows: MAX_ROWS_PER_SHEET,
        }
    }
}

/// How logical columns past the sheet width are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GridMode {
    /// Column blocks of `max_cols` land on successive sheets
    #[default]
    ColumnOverflow,
    /// One sheet only; columns must fit its width
    SingleSheet,
}

/// Unbounded address in the report's conceptual grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogicalCoord {
    /// Logical row
    pub row: usize,
    /// Logical column
    pub col: usize,
}

impl LogicalCoord {
    /// Create logical coordinate
    #[inline]
    #[must_use]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Address bounded by the per-sheet capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PhysicalCell {
    /// Sheet index (0-based)
    pub sheet: usize,
    /// Row within the sheet
    pub row: usize,
    /// Column within the sheet
    pub col: usize,
}

impl PhysicalCell {
    /// Create physical address
    #[inline]
    #[must_use]
    pub const fn new(sheet: usize, row: usize, col: usize) -> Self {
        Self { sheet, row, col }
    }
}

impl Display for PhysicalCell {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "sheet {} r{} c{}", self.sheet, self.row, self.col)
    }
}

/// Grid addressing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// Limits with a zero capacity
    #[error("invalid sheet limits: {max_cols} columns x {max_rows} rows")]
    InvalidLimits { max_cols: usize, max_rows: usize },

    /// Column does not fit a single sheet
    #[error("logical column {col} out of range (max columns: {max_cols})")]
    ColumnOutOfRange { col: usize, max_cols: usize },
}

/// Stateless logical-to-physical mapper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualGrid {
    limits: SheetLimits,
    mode: GridMode,
}

impl VirtualGrid {
    /// Create grid over the given limits
    #[inline]
    #[must_use]
    pub fn new(limits: SheetLimits, mode: GridMode) -> Self {
        Self { limits, mode }
    }

    /// Grid limits
    #[inline]
    #[must_use]
    pub fn limits(&self) -> SheetLimits {
        self.limits
    }

    /// Overflow mode
    #[inline]
    #[must_use]
    pub fn mode(&self) -> GridMode {
        self.mode
    }

    /// Sheet holding a logical column
    #[inline]
    #[must_use]
    pub fn sheet_for(&self, logical_col: usize) -> usize {
        match self.mode {
            GridMode::ColumnOverflow => logical_col / self.limits.max_cols,
            GridMode::SingleSheet => 0,
        }
    }

    /// Column within the sheet for a logical column
    #[inline]
    #[must_use]
    pub fn physical_column_for(&self, logical_col: usize) -> usize {
        match self.mode {
            GridMode::ColumnOverflow => logical_col % self.limits.max_cols,
            GridMode::SingleSheet => logical_col,
        }
    }

    /// Map a logical coordinate to its physical cell
    ///
    /// # Errors
    /// - `GridError::ColumnOutOfRange` in single-sheet mode when the column
    ///   does not fit
    pub fn map(&self, coord: LogicalCoord) -> Result<PhysicalCell, GridError> {
        if self.mode == GridMode::SingleSheet && coord.col >= self.limits.max_cols {
            return Err(GridError::ColumnOutOfRange {
                col: coord.col,
                max_cols: self.limits.max_cols,
            });
        }
        Ok(PhysicalCell::new(
            self.sheet_for(coord.col),
            coord.row,
            self.physical_column_for(coord.col),
        ))
    }
}

impl Default for VirtualGrid {
    fn default() -> Self {
        Self::new(SheetLimits::default(), GridMode::default())
    }
}
