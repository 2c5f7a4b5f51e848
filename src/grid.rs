//! Grid contract and a sparse in-memory grid.

use std::collections::HashMap;

use crate::types::{Cell, CellValue};

/// Who wrote a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// An edit by the host or user; must be reported through `take_change`.
    Host,
    /// A write made by the workbook itself; must not be reported.
    Workbook,
}

/// Rectangular batch of changed cells, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridChange {
    pub first_row: usize,
    pub last_row: usize,
    pub first_col: usize,
    pub last_col: usize,
}

impl GridChange {
    pub fn cell(row: usize, col: usize) -> Self {
        Self {
            first_row: row,
            last_row: row,
            first_col: col,
            last_col: col,
        }
    }

    pub fn rect(first_row: usize, last_row: usize, first_col: usize, last_col: usize) -> Self {
        Self {
            first_row: first_row.min(last_row),
            last_row: first_row.max(last_row),
            first_col: first_col.min(last_col),
            last_col: first_col.max(last_col),
        }
    }

    /// Smallest rectangle covering both.
    #[must_use]
    pub fn union(self, other: GridChange) -> Self {
        Self {
            first_row: self.first_row.min(other.first_row),
            last_row: self.last_row.max(other.last_row),
            first_col: self.first_col.min(other.first_col),
            last_col: self.last_col.max(other.last_col),
        }
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.first_row..=self.last_row)
            .flat_map(move |row| (self.first_col..=self.last_col).map(move |col| (row, col)))
    }
}

/// Cell storage for one worksheet.
///
/// Implementations must keep workbook writes (`ChangeOrigin::Workbook`) out of
/// the pending change reported by `take_change`: those writes are results of
/// a propagation pass, not edits to propagate.
pub trait Grid {
    fn cell(&self, row: usize, col: usize) -> Cell;

    fn set_cell(&mut self, row: usize, col: usize, cell: Cell, origin: ChangeOrigin);

    /// Take the bounding rectangle of host edits since the last call.
    fn take_change(&mut self) -> Option<GridChange>;

    /// Readable value of a cell.
    fn value(&self, row: usize, col: usize) -> CellValue {
        self.cell(row, col).value()
    }
}

/// Sparse grid backed by a hash map. Empty cells are not stored.
#[derive(Debug, Default, Clone)]
pub struct MemoryGrid {
    cells: HashMap<(usize, usize), Cell>,
    pending: Option<GridChange>,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of non-empty cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Non-empty cells sorted by (row, col).
    pub fn cells(&self) -> Vec<((usize, usize), &Cell)> {
        let mut cells: Vec<_> = self.cells.iter().map(|(pos, cell)| (*pos, cell)).collect();
        cells.sort_by_key(|(pos, _)| *pos);
        cells
    }
}

impl Grid for MemoryGrid {
    fn cell(&self, row: usize, col: usize) -> Cell {
        self.cells.get(&(row, col)).cloned().unwrap_or_default()
    }

    fn set_cell(&mut self, row: usize, col: usize, cell: Cell, origin: ChangeOrigin) {
        if cell.is_empty() {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), cell);
        }

        if origin == ChangeOrigin::Host {
            let change = GridChange::cell(row, col);
            self.pending = Some(match self.pending {
                Some(pending) => pending.union(change),
                None => change,
            });
        }
    }

    fn take_change(&mut self) -> Option<GridChange> {
        self.pending.take()
    }
}
