//! Dependency tracking and incremental recomputation

pub mod cycles;
pub mod graph;
pub mod propagation;
pub mod registry;
pub mod worksheets;

pub use graph::ReferenceGraph;
pub use propagation::PassReport;
pub use registry::{Formula, FormulaRegistry};
pub use worksheets::WorksheetTable;
