//! Audit Sheet
//!
//! Bounded tabular storage for audit artifacts.
//!
//! # Core Concepts
//!
//! - [`VirtualGrid`]: maps unbounded logical coordinates onto fixed-size sheets
//! - [`TabularSheetStore`]: lazily created sheets with a hard row ceiling
//! - [`VirtualWorkbook`]: a store addressed in logical coordinates
//! - [`SheetLimits`]: the per-sheet capacity of the target format
//!
//! # Example
//!
//! ```rust
//! use audit_sheet::{LogicalCoord, PhysicalCell, VirtualGrid, VirtualWorkbook};
//!
//! let mut book = VirtualWorkbook::new(VirtualGrid::default());
//! let cell = book.set(LogicalCoord::new(4, 300), "spilled").unwrap();
//! assert_eq!(cell, PhysicalCell::new(1, 4, 44));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod grid;
mod store;
mod virtual_book;

pub use grid::{
    GridError, GridMode, LogicalCoord, PhysicalCell, SheetLimits, VirtualGrid,
    MAX_COLS_PER_SHEET, MAX_ROWS_PER_SHEET,
};
pub use store::{CellValue, Sheet, SheetError, TabularSheetStore, WORKBOOK_SCHEMA};
pub use virtual_book::{VirtualBookError, VirtualWorkbook};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
