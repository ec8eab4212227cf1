//! Bounded sheet storage
//!
//! [`TabularSheetStore`] is the workbook behind an audit artifact:
//! - sheets are created lazily on first write
//! - writes past the row or column ceiling fail with typed errors
//! - `save`/`load` persist a versioned JSON workbook document

use crate::grid::{PhysicalCell, SheetLimits};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Schema identifier written into every saved workbook
pub const WORKBOOK_SCHEMA: &str = "aclaudit.workbook.v1";

/// Base name of the first sheet
const SHEET_BASE_NAME: &str = "Audit";

/// Value held by a cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Text cell
    Text(String),
    /// Boolean cell
    Bool(bool),
}

impl CellValue {
    /// Text content, if this is a text cell
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bool(_) => None,
        }
    }

    /// Boolean content, if this is a boolean cell
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(_) => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Sheet store errors
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    /// Row index at or past the row ceiling
    #[error("row capacity exceeded: row {row} (max rows: {max_rows})")]
    RowCapacityExceeded { row: usize, max_rows: usize },

    /// Column index at or past the sheet width
    #[error("column capacity exceeded: column {col} (max columns: {max_cols})")]
    ColumnCapacityExceeded { col: usize, max_cols: usize },

    /// IO error reading or writing a workbook
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Workbook document could not be encoded or decoded
    #[error("malformed workbook {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Workbook written by an unknown schema
    #[error("unsupported workbook schema: '{0}'")]
    UnsupportedSchema(String),
}

impl SheetError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create format error for path
    pub fn format(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Format {
            path: path.into(),
            source,
        }
    }

    /// Whether this is the row ceiling signal
    #[inline]
    #[must_use]
    pub fn is_row_capacity(&self) -> bool {
        matches!(self, Self::RowCapacityExceeded { .. })
    }
}

/// One physical sheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    name: String,
    cells: BTreeMap<(usize, usize), CellValue>,
}

impl Sheet {
    fn new(name: String) -> Self {
        Self {
            name,
            cells: BTreeMap::new(),
        }
    }

    /// Sheet name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of populated cells
    #[inline]
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Highest populated row, if any
    #[must_use]
    pub fn last_row(&self) -> Option<usize> {
        self.cells.keys().map(|(row, _)| *row).max()
    }
}

/// Workbook with per-sheet capacity enforcement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularSheetStore {
    limits: SheetLimits,
    sheets: Vec<Sheet>,
}

impl TabularSheetStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new(limits: SheetLimits) -> Self {
        Self {
            limits,
            sheets: Vec::new(),
        }
    }

    /// Capacity limits
    #[inline]
    #[must_use]
    pub fn limits(&self) -> SheetLimits {
        self.limits
    }

    /// Sheets created so far
    #[inline]
    #[must_use]
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    /// Number of sheets created so far
    #[inline]
    #[must_use]
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Check that `row` is writable
    ///
    /// # Errors
    /// - `SheetError::RowCapacityExceeded` if `row >= max_rows`
    #[inline]
    pub fn ensure_row_capacity(&self, row: usize) -> Result<(), SheetError> {
        if row >= self.limits.max_rows {
            return Err(SheetError::RowCapacityExceeded {
                row,
                max_rows: self.limits.max_rows,
            });
        }
        Ok(())
    }

    /// Write a cell, creating sheets up to `cell.sheet` if needed
    ///
    /// # Errors
    /// - `SheetError::RowCapacityExceeded` if the row is past the ceiling
    /// - `SheetError::ColumnCapacityExceeded` if the column is past the width
    pub fn set_cell(
        &mut self,
        cell: PhysicalCell,
        value: impl Into<CellValue>,
    ) -> Result<(), SheetError> {
        self.ensure_row_capacity(cell.row)?;
        if cell.col >= self.limits.max_cols {
            return Err(SheetError::ColumnCapacityExceeded {
                col: cell.col,
                max_cols: self.limits.max_cols,
            });
        }
        while self.sheets.len() <= cell.sheet {
            let name = sheet_name(self.sheets.len());
            tracing::trace!(sheet = %name, "creating sheet");
            self.sheets.push(Sheet::new(name));
        }
        self.sheets[cell.sheet]
            .cells
            .insert((cell.row, cell.col), value.into());
        Ok(())
    }

    /// Read a cell
    #[must_use]
    pub fn get_cell(&self, cell: PhysicalCell) -> Option<&CellValue> {
        self.sheets
            .get(cell.sheet)
            .and_then(|sheet| sheet.cells.get(&(cell.row, cell.col)))
    }

    /// Save workbook to `path`
    ///
    /// The document goes to a uniquely named temp file in the same directory
    /// and is persisted into place. A failed write removes the temp file.
    ///
    /// # Errors
    /// - `SheetError::Format` if encoding fails
    /// - `SheetError::Io` if the file cannot be written
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SheetError> {
        let path = path.as_ref();
        let document = WorkbookDocument::from_store(self);
        let bytes =
            serde_json::to_vec(&document).map_err(|e| SheetError::format(path, e))?;

        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| SheetError::io(parent, e))?;
        file.write_all(&bytes)
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| SheetError::io(file.path(), e))?;
        file.persist(path)
            .map_err(|e| SheetError::io(path, e.error))?;

        tracing::debug!(
            path = %path.display(),
            sheets = self.sheets.len(),
            bytes = bytes.len(),
            "workbook saved"
        );
        Ok(())
    }

    /// Load workbook from `path`
    ///
    /// # Errors
    /// - `SheetError::Io` if the file cannot be read
    /// - `SheetError::Format` if the document is malformed
    /// - `SheetError::UnsupportedSchema` for an unknown schema
    /// - capacity errors if a stored cell violates the stored limits
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SheetError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| SheetError::io(path, e))?;
        let document: WorkbookDocument =
            serde_json::from_slice(&bytes).map_err(|e| SheetError::format(path, e))?;
        document.into_store()
    }
}

impl Default for TabularSheetStore {
    fn default() -> Self {
        Self::new(SheetLimits::default())
    }
}

fn sheet_name(index: usize) -> String {
    if index == 0 {
        SHEET_BASE_NAME.to_string()
    } else {
        format!("{SHEET_BASE_NAME} ({})", index + 1)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WorkbookDocument {
    schema: String,
    limits: SheetLimits,
    sheets: Vec<SheetDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SheetDocument {
    name: String,
    cells: Vec<CellDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CellDocument {
    row: usize,
    col: usize,
    value: CellValue,
}

impl WorkbookDocument {
    fn from_store(store: &TabularSheetStore) -> Self {
        Self {
            schema: WORKBOOK_SCHEMA.to_string(),
            limits: store.limits,
            sheets: store
                .sheets
                .iter()
                .map(|sheet| SheetDocument {
                    name: sheet.name.clone(),
                    cells: sheet
                        .cells
                        .iter()
                        .map(|(&(row, col), value)| CellDocument {
                            row,
                            col,
                            value: value.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    fn into_store(self) -> Result<TabularSheetStore, SheetError> {
        if self.schema != WORKBOOK_SCHEMA {
            return Err(SheetError::UnsupportedSchema(self.schema));
        }
        let mut store = TabularSheetStore::new(self.limits);
        for sheet in self.sheets {
            let mut restored = Sheet::new(sheet.name);
            for cell in sheet.cells {
                store.ensure_row_capacity(cell.row)?;
                if cell.col >= self.limits.max_cols {
                    return Err(SheetError::ColumnCapacityExceeded {
                        col: cell.col,
                        max_cols: self.limits.max_cols,
                    });
                }
                restored.cells.insert((cell.row, cell.col), cell.value);
            }
            store.sheets.push(restored);
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_store() -> TabularSheetStore {
        TabularSheetStore::new(SheetLimits::new(4, 10).unwrap())
    }

    #[test]
    fn row_ceiling_is_exclusive() {
        let mut store = small_store();
        assert!(store.set_cell(PhysicalCell::new(0, 9, 0), "last").is_ok());

        let err = store.set_cell(PhysicalCell::new(0, 10, 0), "over").unwrap_err();
        assert!(err.is_row_capacity());
        assert!(matches!(
            err,
            SheetError::RowCapacityExceeded {
                row: 10,
                max_rows: 10
            }
        ));
    }

    #[test]
    fn column_ceiling_rejected() {
        let mut store = small_store();
        let err = store.set_cell(PhysicalCell::new(0, 0, 4), true).unwrap_err();
        assert!(matches!(err, SheetError::ColumnCapacityExceeded { col: 4, .. }));
        assert_eq!(store.sheet_count(), 0);
    }

    #[test]
    fn sheets_created_lazily() {
        let mut store = small_store();
        assert_eq!(store.sheet_count(), 0);

        store.set_cell(PhysicalCell::new(2, 1, 1), "far").unwrap();
        assert_eq!(store.sheet_count(), 3);
        assert_eq!(store.sheets()[0].name(), "Audit");
        assert_eq!(store.sheets()[2].name(), "Audit (3)");
        assert_eq!(store.sheets()[0].cell_count(), 0);
    }

    #[test]
    fn overwrite_keeps_last_value() {
        let mut store = small_store();
        let cell = PhysicalCell::new(0, 0, 0);
        store.set_cell(cell, "first").unwrap();
        store.set_cell(cell, false).unwrap();
        assert_eq!(store.get_cell(cell), Some(&CellValue::Bool(false)));
        assert_eq!(store.get_cell(PhysicalCell::new(5, 0, 0)), None);
    }

    #[test]
    fn unknown_schema_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        fs::write(
            &path,
            r#"{"schema":"other.v9","limits":{"max_cols":4,"max_rows":4},"sheets":[]}"#,
        )
        .unwrap();

        let err = TabularSheetStore::load(&path).unwrap_err();
        assert!(matches!(err, SheetError::UnsupportedSchema(s) if s == "other.v9"));
    }

    #[test]
    fn save_leaves_only_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        let mut store = small_store();
        store.set_cell(PhysicalCell::new(0, 0, 0), "OK").unwrap();

        store.save(&path).unwrap();
        store.save(&path).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("book.json")]);
    }

    #[test]
    fn failed_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // the target is a non-empty directory, so persisting over it fails
        let target = dir.path().join("book.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), b"x").unwrap();

        let err = small_store().save(&target).unwrap_err();
        assert!(matches!(err, SheetError::Io { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn concurrent_saves_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");

        std::thread::scope(|scope| {
            for i in 0..8 {
                let path = &path;
                scope.spawn(move || {
                    let mut store = small_store();
                    store.set_cell(PhysicalCell::new(0, 0, 0), format!("writer-{i}")).unwrap();
                    store.save(path).unwrap();
                });
            }
        });

        let loaded = TabularSheetStore::load(&path).unwrap();
        let text = loaded.get_cell(PhysicalCell::new(0, 0, 0)).and_then(CellValue::as_text).unwrap();
        assert!(text.starts_with("writer-"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TabularSheetStore::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SheetError::Io { .. }));
    }
}
