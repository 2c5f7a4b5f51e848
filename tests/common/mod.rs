//! Shared helpers for integration tests

#![allow(dead_code)]

use royalbit_cellgraph::{Cell, CellAddress, CellValue, SheetId, Workbook};
use std::sync::Once;

static TRACING: Once = Once::new();

/// Route `tracing` output to the test harness. Set `RUST_LOG=debug` to see
/// propagation passes.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Workbook with the given sheets already added.
pub fn workbook_with(sheets: &[&str]) -> Workbook {
    init_tracing();
    let mut workbook = Workbook::new();
    for name in sheets {
        workbook
            .add_worksheet(name, Default::default())
            .expect("sheet names are unique");
    }
    workbook
}

/// `Sheet!A1` -> address, panicking on bad input.
pub fn at(workbook: &Workbook, name: &str) -> CellAddress {
    workbook.address(name).expect("valid reference")
}

/// Enter `input` at `name` the way a user types it: numbers become numbers,
/// text starting with `=` becomes a formula.
pub fn enter(workbook: &mut Workbook, name: &str, input: &str) {
    let address = at(workbook, name);
    workbook
        .set_cell(address.sheet, address.row, address.col, Cell::from(input))
        .unwrap_or_else(|err| panic!("entering {input:?} at {name}: {err}"));
}

pub fn value(workbook: &Workbook, name: &str) -> CellValue {
    workbook.value(at(workbook, name))
}

pub fn number(n: f64) -> CellValue {
    CellValue::Number(n)
}

pub fn sentinel() -> CellValue {
    CellValue::Error("#ERROR#".to_string())
}

pub fn sheet(workbook: &Workbook, name: &str) -> SheetId {
    workbook.sheet_id(name).expect("sheet exists")
}
