use audit_sheet::{
    CellValue, GridMode, LogicalCoord, SheetLimits, TabularSheetStore, VirtualGrid,
    VirtualWorkbook, WORKBOOK_SCHEMA,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn value_for(row: usize, col: usize) -> CellValue {
    if (row + col) % 3 == 0 {
        CellValue::Bool(row % 2 == 0)
    } else {
        CellValue::Text(format!("r{row}c{col}"))
    }
}

#[test]
fn save_load_preserves_logical_cells() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.json");
    let grid = VirtualGrid::default();

    let mut book = VirtualWorkbook::new(grid);
    let coords = [(0, 0), (0, 255), (1, 256), (9, 511), (42, 512), (3, 1_000)];
    for &(row, col) in &coords {
        book.set(LogicalCoord::new(row, col), value_for(row, col)).unwrap();
    }
    book.save(&path).unwrap();

    let loaded = VirtualWorkbook::load(grid, &path).unwrap();
    for &(row, col) in &coords {
        assert_eq!(
            loaded.get(LogicalCoord::new(row, col)),
            Some(&value_for(row, col)),
            "({row}, {col})"
        );
    }
    assert_eq!(loaded.store(), book.store());
    assert_eq!(loaded.store().sheet_count(), 4);
}

#[test]
fn saved_document_is_versioned_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.json");

    let mut book = VirtualWorkbook::new(VirtualGrid::default());
    book.set(LogicalCoord::new(0, 0), "OK").unwrap();
    book.save(&path).unwrap();

    let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["schema"], WORKBOOK_SCHEMA);
    assert_eq!(raw["sheets"][0]["name"], "Audit");
    assert_eq!(raw["sheets"][0]["cells"][0]["value"], "OK");
    assert!(!dir.path().join("audit.json.partial").exists());
}

#[test]
fn limits_survive_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("small.json");
    let limits = SheetLimits::new(16, 100).unwrap();

    let mut store = TabularSheetStore::new(limits);
    store
        .set_cell(audit_sheet::PhysicalCell::new(0, 99, 15), "corner")
        .unwrap();
    store.save(&path).unwrap();

    let loaded = TabularSheetStore::load(&path).unwrap();
    assert_eq!(loaded.limits(), limits);
    assert!(loaded.ensure_row_capacity(100).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_round_trip_through_mapping(
        cells in proptest::collection::btree_map((0usize..200, 0usize..2_000), any::<bool>(), 1..64)
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prop.json");
        let grid = VirtualGrid::new(SheetLimits::default(), GridMode::ColumnOverflow);

        let expected: BTreeMap<_, _> = cells
            .into_iter()
            .map(|((row, col), flag)| {
                let value = if flag { CellValue::Bool(row % 2 == 1) } else { CellValue::Text(format!("{row}:{col}")) };
                ((row, col), value)
            })
            .collect();

        let mut book = VirtualWorkbook::new(grid);
        for (&(row, col), value) in &expected {
            book.set(LogicalCoord::new(row, col), value.clone()).unwrap();
        }
        book.save(&path).unwrap();

        let loaded = VirtualWorkbook::load(grid, &path).unwrap();
        for (&(row, col), value) in &expected {
            prop_assert_eq!(loaded.get(LogicalCoord::new(row, col)), Some(value));
        }
    }
}
