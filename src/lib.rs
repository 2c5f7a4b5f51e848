//! Cellgraph - dependency tracking and incremental recomputation for
//! spreadsheet formulas
//!
//! A [`Workbook`] owns a set of named worksheets. When a cell changes, every
//! formula that transitively reads it is marked dirty and re-evaluated in
//! dependency order. Circular references are detected during marking and
//! resolve to an error sentinel instead of a value.
//!
//! # Features
//!
//! - Excel-style references (`A1`, `Sheet2!B7`, `'Q1 Budget'!C3`)
//! - Cross-sheet formulas with case-insensitive sheet names
//! - Pluggable cell storage ([`Grid`]) and formula evaluator ([`ExpressionEngine`])
//! - Built-in evaluator backed by `xlformula_engine`
//! - Whole-workbook recalculation and cycle diagnostics
//!
//! # Example
//!
//! ```
//! use royalbit_cellgraph::{Cell, CellValue, MemoryGrid, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sales = workbook.add_worksheet("Sales", MemoryGrid::new())?;
//! let summary = workbook.add_worksheet("Summary", MemoryGrid::new())?;
//!
//! workbook.set_cell(summary, 1, 0, Cell::from("=Sales!A1 + Sales!A2"))?;
//! workbook.set_cell(sales, 1, 0, Cell::from(100.0))?;
//! workbook.set_cell(sales, 2, 0, Cell::from(50.0))?;
//!
//! let total = workbook.address("Summary!A1")?;
//! assert_eq!(workbook.value(total), CellValue::Number(150.0));
//! # Ok::<(), royalbit_cellgraph::CellGraphError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod expression;
pub mod grid;
pub mod reference;
pub mod types;
pub mod workbook;

// Re-export commonly used types
pub use config::WorkbookConfig;
pub use core::PassReport;
pub use error::{CellGraphError, CellGraphResult};
pub use expression::{ExpressionEngine, XlFormulaEngine};
pub use grid::{ChangeOrigin, Grid, GridChange, MemoryGrid};
pub use types::{Cell, CellAddress, CellValue, SheetId};
pub use workbook::{EditReport, Workbook};
