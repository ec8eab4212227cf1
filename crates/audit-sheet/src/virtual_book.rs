//! Logical-coordinate view over a sheet store

use crate::grid::{GridError, LogicalCoord, PhysicalCell, VirtualGrid};
use crate::store::{CellValue, SheetError, TabularSheetStore};
use std::path::Path;

/// Errors from logical writes
#[derive(Debug, thiserror::Error)]
pub enum VirtualBookError {
    /// Coordinate could not be mapped
    #[error(transparent)]
    Grid(#[from] GridError),

    /// Store rejected the write
    #[error(transparent)]
    Sheet(#[from] SheetError),
}

impl VirtualBookError {
    /// Whether this is the row ceiling signal
    #[inline]
    #[must_use]
    pub fn is_row_capacity(&self) -> bool {
        matches!(self, Self::Sheet(e) if e.is_row_capacity())
    }
}

/// A [`TabularSheetStore`] addressed through a [`VirtualGrid`]
///
/// The grid and the store share the same [`SheetLimits`](crate::SheetLimits),
/// so every mapped cell fits the store's column width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualWorkbook {
    grid: VirtualGrid,
    store: TabularSheetStore,
}

impl VirtualWorkbook {
    /// Create empty workbook for `grid`
    #[inline]
    #[must_use]
    pub fn new(grid: VirtualGrid) -> Self {
        Self {
            grid,
            store: TabularSheetStore::new(grid.limits()),
        }
    }

    /// Wrap an existing store (e.g. one just loaded from disk)
    #[inline]
    #[must_use]
    pub fn from_store(grid: VirtualGrid, store: TabularSheetStore) -> Self {
        Self { grid, store }
    }

    /// Grid used for addressing
    #[inline]
    #[must_use]
    pub fn grid(&self) -> &VirtualGrid {
        &self.grid
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &TabularSheetStore {
        &self.store
    }

    /// Consume into the underlying store
    #[inline]
    #[must_use]
    pub fn into_store(self) -> TabularSheetStore {
        self.store
    }

    /// Map a logical coordinate
    ///
    /// # Errors
    /// - `GridError` if the coordinate cannot be mapped
    #[inline]
    pub fn locate(&self, coord: LogicalCoord) -> Result<PhysicalCell, GridError> {
        self.grid.map(coord)
    }

    /// Check that a logical row is writable
    ///
    /// # Errors
    /// - `SheetError::RowCapacityExceeded` if past the row ceiling
    #[inline]
    pub fn ensure_row_capacity(&self, row: usize) -> Result<(), SheetError> {
        self.store.ensure_row_capacity(row)
    }

    /// Write a cell at a logical coordinate
    ///
    /// # Errors
    /// - `VirtualBookError::Grid` if the coordinate cannot be mapped
    /// - `VirtualBookError::Sheet` if the store rejects the write
    pub fn set(
        &mut self,
        coord: LogicalCoord,
        value: impl Into<CellValue>,
    ) -> Result<PhysicalCell, VirtualBookError> {
        let cell = self.grid.map(coord)?;
        self.store.set_cell(cell, value)?;
        Ok(cell)
    }

    /// Write directly at a physical cell
    ///
    /// # Errors
    /// - `SheetError` if the store rejects the write
    #[inline]
    pub fn set_physical(
        &mut self,
        cell: PhysicalCell,
        value: impl Into<CellValue>,
    ) -> Result<(), SheetError> {
        self.store.set_cell(cell, value)
    }

    /// Read a cell at a logical coordinate
    #[must_use]
    pub fn get(&self, coord: LogicalCoord) -> Option<&CellValue> {
        self.grid
            .map(coord)
            .ok()
            .and_then(|cell| self.store.get_cell(cell))
    }

    /// Save the underlying store
    ///
    /// # Errors
    /// See [`TabularSheetStore::save`]
    #[inline]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SheetError> {
        self.store.save(path)
    }

    /// Load a store and address it through `grid`
    ///
    /// # Errors
    /// See [`TabularSheetStore::load`]
    pub fn load(grid: VirtualGrid, path: impl AsRef<Path>) -> Result<Self, SheetError> {
        Ok(Self::from_store(grid, TabularSheetStore::load(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridMode, SheetLimits};

    #[test]
    fn wide_rows_spill_to_next_sheet() {
        let mut book = VirtualWorkbook::new(VirtualGrid::default());
        for col in 0..300 {
            book.set(LogicalCoord::new(2, col), format!("c{col}")).unwrap();
        }
        assert_eq!(book.store().sheet_count(), 2);
        assert_eq!(book.store().sheets()[0].cell_count(), 256);
        assert_eq!(book.store().sheets()[1].cell_count(), 44);
        assert_eq!(
            book.store().get_cell(PhysicalCell::new(1, 2, 0)),
            Some(&CellValue::from("c256"))
        );
    }

    #[test]
    fn capacity_signal_is_recognised() {
        let limits = SheetLimits::new(8, 3).unwrap();
        let mut book = VirtualWorkbook::new(VirtualGrid::new(limits, GridMode::ColumnOverflow));
        let err = book.set(LogicalCoord::new(3, 0), true).unwrap_err();
        assert!(err.is_row_capacity());

        let single = VirtualGrid::new(limits, GridMode::SingleSheet);
        let mut narrow = VirtualWorkbook::new(single);
        let err = narrow.set(LogicalCoord::new(0, 8), true).unwrap_err();
        assert!(!err.is_row_capacity());
        assert!(matches!(err, VirtualBookError::Grid(_)));
    }
}
