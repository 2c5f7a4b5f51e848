//! Incremental recomputation through the public Workbook API

mod common;

use common::*;
use pretty_assertions::assert_eq;
use royalbit_cellgraph::{Cell, CellGraphError, CellValue, ChangeOrigin, Grid, GridChange};

// ═══════════════════════════════════════════════════════════════════════════
// DEPENDENCY ORDER
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_chain_updates_on_literal_edit() {
    let mut wb = workbook_with(&["Sheet1"]);
    enter(&mut wb, "Sheet1!A1", "1");
    enter(&mut wb, "Sheet1!B1", "=A1 + 1");
    enter(&mut wb, "Sheet1!C1", "=B1 * 2");
    assert_eq!(value(&wb, "Sheet1!C1"), number(4.0));

    enter(&mut wb, "Sheet1!A1", "10");
    assert_eq!(value(&wb, "Sheet1!B1"), number(11.0));
    assert_eq!(value(&wb, "Sheet1!C1"), number(22.0));
}

#[test]
fn test_diamond_evaluates_each_formula_once() {
    let mut wb = workbook_with(&["Sheet1"]);
    enter(&mut wb, "Sheet1!B1", "=A1 * 2");
    enter(&mut wb, "Sheet1!C1", "=A1 * 3");
    enter(&mut wb, "Sheet1!D1", "=B1 + C1");

    let a1 = at(&wb, "Sheet1!A1");
    let report = wb.set_cell(a1.sheet, a1.row, a1.col, Cell::from(5.0)).unwrap();

    let mut recomputed: Vec<_> = report.recomputed().collect();
    assert_eq!(recomputed.len(), 3);
    recomputed.sort();
    recomputed.dedup();
    assert_eq!(recomputed.len(), 3);
    assert_eq!(value(&wb, "Sheet1!D1"), number(25.0));
}

#[test]
fn test_result_independent_of_entry_order() {
    let formulas = [
        ("Sheet1!B1", "=A1 + 1"),
        ("Sheet1!C1", "=B1 + A1"),
        ("Sheet1!D1", "=C1 * B1"),
        ("Sheet1!E1", "=D1 - C1 - B1"),
    ];

    let mut forward = workbook_with(&["Sheet1"]);
    for (name, text) in formulas {
        enter(&mut forward, name, text);
    }
    enter(&mut forward, "Sheet1!A1", "3");

    let mut backward = workbook_with(&["Sheet1"]);
    enter(&mut backward, "Sheet1!A1", "3");
    for (name, text) in formulas.iter().rev() {
        enter(&mut backward, name, text);
    }

    for (name, _) in formulas {
        assert_eq!(value(&forward, name), value(&backward, name), "{name}");
    }
    // B1=4, C1=7, D1=28, E1=17
    assert_eq!(value(&forward, "Sheet1!E1"), number(17.0));
}

#[test]
fn test_repeated_edits_are_stable() {
    let mut wb = workbook_with(&["Sheet1"]);
    enter(&mut wb, "Sheet1!B1", "=A1 + A2");
    enter(&mut wb, "Sheet1!C1", "=A1 * B1");
    enter(&mut wb, "Sheet1!D1", "=C1 + B1 + A2");

    for n in 1..=20 {
        enter(&mut wb, "Sheet1!A1", &n.to_string());
        enter(&mut wb, "Sheet1!A2", "2");
        let n = f64::from(n);
        assert_eq!(value(&wb, "Sheet1!D1"), number(n * (n + 2.0) + (n + 2.0) + 2.0));
    }
}

#[test]
fn test_long_chain_does_not_overflow() {
    let mut wb = workbook_with(&["Sheet1"]);
    let depth = 5_000;
    for row in 2..=depth {
        enter(&mut wb, &format!("Sheet1!A{row}"), &format!("=A{} + 1", row - 1));
    }

    enter(&mut wb, "Sheet1!A1", "0");
    assert_eq!(
        value(&wb, &format!("Sheet1!A{depth}")),
        number(f64::from(depth - 1))
    );
}

#[test]
fn test_empty_input_reads_as_empty_text() {
    let mut wb = workbook_with(&["Sheet1"]);
    enter(&mut wb, "Sheet1!B1", "=A1");
    assert_eq!(value(&wb, "Sheet1!B1"), CellValue::Text(String::new()));
}

// ═══════════════════════════════════════════════════════════════════════════
// INSTALL / UNINSTALL
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_install_subscribes_each_input_once() {
    let mut wb = workbook_with(&["Sheet1"]);
    enter(&mut wb, "Sheet1!C1", "=A1 + B1 + A1");

    let c1 = at(&wb, "Sheet1!C1");
    assert_eq!(wb.dependents(at(&wb, "Sheet1!A1")), vec![c1]);
    assert_eq!(wb.dependents(at(&wb, "Sheet1!B1")), vec![c1]);
    assert_eq!(
        wb.precedents(c1),
        vec![at(&wb, "Sheet1!A1"), at(&wb, "Sheet1!B1")]
    );
    assert_eq!(wb.formula(c1).map(|f| f.source()), Some("A1 + B1 + A1"));
}

#[test]
fn test_formula_replaced_by_literal() {
    let mut wb = workbook_with(&["Sheet1"]);
    enter(&mut wb, "Sheet1!A1", "1");
    enter(&mut wb, "Sheet1!B1", "=A1 * 100");
    enter(&mut wb, "Sheet1!B1", "7");

    let a1 = at(&wb, "Sheet1!A1");
    let b1 = at(&wb, "Sheet1!B1");
    assert!(wb.formula(b1).is_none());
    assert!(wb.dependents(a1).is_empty());
    assert_eq!(wb.formula_count(), 0);

    // editing the former input no longer touches B1
    let report = wb.set_cell(a1.sheet, a1.row, a1.col, Cell::from(2.0)).unwrap();
    assert_eq!(report.recomputed().count(), 0);
    assert_eq!(value(&wb, "Sheet1!B1"), number(7.0));
}

#[test]
fn test_formula_replaced_by_other_formula() {
    let mut wb = workbook_with(&["Sheet1"]);
    enter(&mut wb, "Sheet1!A1", "1");
    enter(&mut wb, "Sheet1!A2", "2");
    enter(&mut wb, "Sheet1!B1", "=A1");
    enter(&mut wb, "Sheet1!B1", "=A2 * 5");

    assert!(wb.dependents(at(&wb, "Sheet1!A1")).is_empty());
    assert_eq!(wb.dependents(at(&wb, "Sheet1!A2")), vec![at(&wb, "Sheet1!B1")]);
    assert_eq!(value(&wb, "Sheet1!B1"), number(10.0));
}

#[test]
fn test_clearing_a_formula_cell() {
    let mut wb = workbook_with(&["Sheet1"]);
    enter(&mut wb, "Sheet1!A1", "4");
    enter(&mut wb, "Sheet1!B1", "=A1");
    enter(&mut wb, "Sheet1!C1", "=B1");

    let b1 = at(&wb, "Sheet1!B1");
    wb.set_cell(b1.sheet, b1.row, b1.col, Cell::empty()).unwrap();

    assert_eq!(wb.formula_count(), 1);
    assert_eq!(value(&wb, "Sheet1!C1"), CellValue::Text(String::new()));
}

#[test]
fn test_parse_failure_keeps_literal_and_updates_dependents() {
    let mut wb = workbook_with(&["Sheet1"]);
    enter(&mut wb, "Sheet1!A1", "=2 + 3");
    enter(&mut wb, "Sheet1!B1", "=A1");
    assert_eq!(value(&wb, "Sheet1!B1"), number(5.0));

    let a1 = at(&wb, "Sheet1!A1");
    let err = wb
        .set_cell(a1.sheet, a1.row, a1.col, Cell::from("=(1 + "))
        .unwrap_err();
    assert!(matches!(err, CellGraphError::Parse(_)));

    assert!(wb.formula(a1).is_none());
    assert_eq!(value(&wb, "Sheet1!A1"), CellValue::Text("=(1 + ".to_string()));
    assert_eq!(value(&wb, "Sheet1!B1"), CellValue::Text("=(1 + ".to_string()));
}

#[test]
fn test_unresolved_sheet_leaves_no_edges() {
    let mut wb = workbook_with(&["Sheet1"]);
    let b1 = at(&wb, "Sheet1!B1");
    let err = wb
        .set_cell(b1.sheet, b1.row, b1.col, Cell::from("=A1 + Nowhere!A1"))
        .unwrap_err();

    match err {
        CellGraphError::UnresolvedSheet { sheet, reference } => {
            assert_eq!(sheet, "NOWHERE");
            assert_eq!(reference, "Nowhere!A1");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(wb.dependents(at(&wb, "Sheet1!A1")).is_empty());
    assert_eq!(wb.formula_count(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// HOST EDITS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_grid_changed_processes_rectangle() {
    let mut wb = workbook_with(&["Sheet1"]);
    let sheet = sheet(&wb, "Sheet1");
    {
        let grid = wb.grid_mut(sheet).unwrap();
        grid.set_cell(1, 0, Cell::from(2.0), ChangeOrigin::Host);
        grid.set_cell(1, 1, Cell::from("=A1 * 10"), ChangeOrigin::Host);
        grid.set_cell(2, 0, Cell::from("=Bad!A1"), ChangeOrigin::Host);
        grid.set_cell(2, 1, Cell::from("=B1 + 1"), ChangeOrigin::Host);
    }

    let report = wb.grid_changed(sheet, GridChange::rect(1, 2, 0, 1)).unwrap();

    assert_eq!(report.passes.len(), 4);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].0, at(&wb, "Sheet1!A2"));
    assert_eq!(value(&wb, "Sheet1!B1"), number(20.0));
    assert_eq!(value(&wb, "Sheet1!B2"), number(21.0));
}

#[test]
fn test_flush_drains_host_edits() {
    let mut wb = workbook_with(&["Sheet1", "Sheet2"]);
    let s1 = sheet(&wb, "Sheet1");
    let s2 = sheet(&wb, "Sheet2");

    wb.grid_mut(s1)
        .unwrap()
        .set_cell(1, 1, Cell::from("=Sheet2!A1 + 1"), ChangeOrigin::Host);
    wb.grid_mut(s2)
        .unwrap()
        .set_cell(1, 0, Cell::from(41.0), ChangeOrigin::Host);

    let report = wb.flush().unwrap();
    assert!(report.rejected.is_empty());
    assert_eq!(value(&wb, "Sheet1!B1"), number(42.0));

    // nothing left to drain
    assert!(wb.flush().unwrap().passes.is_empty());
}

#[test]
fn test_results_are_not_queued_as_edits() {
    let mut wb = workbook_with(&["Sheet1"]);
    enter(&mut wb, "Sheet1!B1", "=A1 + 1");
    enter(&mut wb, "Sheet1!C1", "=B1 + 1");
    enter(&mut wb, "Sheet1!A1", "1");

    let sheet = sheet(&wb, "Sheet1");
    assert!(wb.grid_mut(sheet).unwrap().take_change().is_none());
}
