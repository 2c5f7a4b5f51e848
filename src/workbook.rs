//! Workbook: worksheets, formulas and the propagation passes that keep them
//! consistent.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::WorkbookConfig;
use crate::core::cycles;
use crate::core::propagation::{CellStore, Propagator};
use crate::core::{Formula, FormulaRegistry, PassReport, ReferenceGraph, WorksheetTable};
use crate::error::{CellGraphError, CellGraphResult};
use crate::expression::{ExpressionEngine, XlFormulaEngine};
use crate::grid::{ChangeOrigin, Grid, GridChange, MemoryGrid};
use crate::reference;
use crate::types::{Cell, CellAddress, CellValue, SheetId};

//==============================================================================
// Reports
//==============================================================================

/// Outcome of processing a batch of edits.
#[derive(Debug, Default)]
pub struct EditReport {
    /// One pass per edited cell, in processing order
    pub passes: Vec<PassReport>,
    /// Formulas that could not be installed; those cells hold their raw text
    pub rejected: Vec<(CellAddress, CellGraphError)>,
}

impl EditReport {
    /// Every cell that received a computed value, across all passes.
    pub fn recomputed(&self) -> impl Iterator<Item = CellAddress> + '_ {
        self.passes.iter().flat_map(|p| p.recomputed.iter().copied())
    }

    /// Every cell that received the circular-reference sentinel.
    pub fn circular(&self) -> impl Iterator<Item = CellAddress> + '_ {
        self.passes.iter().flat_map(|p| p.circular.iter().copied())
    }

    pub fn had_cycle(&self) -> bool {
        self.passes.iter().any(PassReport::had_cycle)
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && !self.had_cycle()
    }
}

//==============================================================================
// Grid storage
//==============================================================================

/// Grids keyed by sheet handle. Reads of a missing sheet are empty and writes
/// to one are dropped.
struct SheetGrids<G> {
    grids: HashMap<SheetId, G>,
}

impl<G: Grid> CellStore for SheetGrids<G> {
    fn read(&self, address: CellAddress) -> Cell {
        self.grids
            .get(&address.sheet)
            .map(|grid| grid.cell(address.row, address.col))
            .unwrap_or_default()
    }

    fn write(&mut self, address: CellAddress, cell: Cell) {
        if let Some(grid) = self.grids.get_mut(&address.sheet) {
            grid.set_cell(address.row, address.col, cell, ChangeOrigin::Workbook);
        }
    }
}

//==============================================================================
// Workbook
//==============================================================================

/// A set of named worksheets whose formulas are kept up to date.
///
/// Every entry point takes `&mut self` and runs its passes to completion, so
/// a workbook shared between threads goes behind a `Mutex`.
///
/// ```
/// use royalbit_cellgraph::{Cell, CellValue, MemoryGrid, Workbook};
///
/// let mut workbook = Workbook::new();
/// let sheet = workbook.add_worksheet("Sheet1", MemoryGrid::new()).unwrap();
///
/// workbook.set_cell(sheet, 1, 0, Cell::from(20.0)).unwrap();
/// workbook.set_cell(sheet, 1, 1, Cell::from("=A1 * 2")).unwrap();
///
/// let b1 = workbook.address("Sheet1!B1").unwrap();
/// assert_eq!(workbook.value(b1), CellValue::Number(40.0));
/// ```
pub struct Workbook<G = MemoryGrid, E: ExpressionEngine = XlFormulaEngine> {
    worksheets: WorksheetTable,
    grids: SheetGrids<G>,
    graph: ReferenceGraph,
    registry: FormulaRegistry<E::Expression>,
    engine: E,
    config: WorkbookConfig,
}

impl<G: Grid> Workbook<G, XlFormulaEngine> {
    pub fn new() -> Self {
        Self::with_config(WorkbookConfig::default())
    }

    pub fn with_config(config: WorkbookConfig) -> Self {
        let engine = XlFormulaEngine::new().with_decimal_places(config.decimal_places);
        Self::with_engine_and_config(engine, config)
    }
}

impl<G: Grid> Default for Workbook<G, XlFormulaEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Grid, E: ExpressionEngine> Workbook<G, E> {
    pub fn with_engine(engine: E) -> Self {
        Self::with_engine_and_config(engine, WorkbookConfig::default())
    }

    pub fn with_engine_and_config(engine: E, config: WorkbookConfig) -> Self {
        Self {
            worksheets: WorksheetTable::new(),
            grids: SheetGrids {
                grids: HashMap::new(),
            },
            graph: ReferenceGraph::new(),
            registry: FormulaRegistry::new(),
            engine,
            config,
        }
    }

    pub fn config(&self) -> &WorkbookConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Register global variables or custom functions. Existing values are not
    /// recomputed; call [`recalculate_all`](Self::recalculate_all) afterwards.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    //--------------------------------------------------------------------------
    // Worksheets
    //--------------------------------------------------------------------------

    /// Register `grid` under `name` (case-insensitive, must be unique).
    ///
    /// Content already in the grid is not processed until it is reported
    /// through [`flush`](Self::flush) or [`grid_changed`](Self::grid_changed).
    pub fn add_worksheet(&mut self, name: &str, grid: G) -> CellGraphResult<SheetId> {
        let id = self.worksheets.insert(name)?;
        self.grids.grids.insert(id, grid);
        debug!(sheet = %id, name, "worksheet added");
        Ok(id)
    }

    /// Unregister a worksheet and hand its grid back.
    ///
    /// Formulas defined on the sheet are uninstalled. Formulas on other sheets
    /// that read it are uninstalled too, their cells get the reference
    /// sentinel, and their dependents are recomputed.
    pub fn remove_worksheet(&mut self, name: &str) -> CellGraphResult<G> {
        let id = self.worksheets.remove(name)?;
        let grid = self
            .grids
            .grids
            .remove(&id)
            .ok_or(CellGraphError::UnknownSheet(id))?;

        for address in self.registry.defined_on(id) {
            self.registry.uninstall(&mut self.graph, address);
        }

        let broken = self.registry.reading_sheet(id);
        for &address in &broken {
            if let Some(formula) = self.registry.uninstall(&mut self.graph, address) {
                let cell = Cell::Error {
                    source: formula.source().to_string(),
                    marker: self.config.reference_sentinel.clone(),
                };
                self.grids.write(address, cell);
            }
        }
        for &address in &broken {
            self.propagate(address);
        }

        info!(sheet = %id, name, broken = broken.len(), "worksheet removed");
        Ok(grid)
    }

    pub fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.worksheets.lookup(name)
    }

    pub fn sheet_name(&self, id: SheetId) -> Option<&str> {
        self.worksheets.name_of(id)
    }

    /// Worksheet names in the order they were added.
    pub fn worksheet_names(&self) -> Vec<&str> {
        self.worksheets.names()
    }

    pub fn grid(&self, id: SheetId) -> Option<&G> {
        self.grids.grids.get(&id)
    }

    /// Direct grid access. Host writes made here are picked up by
    /// [`flush`](Self::flush).
    pub fn grid_mut(&mut self, id: SheetId) -> Option<&mut G> {
        self.grids.grids.get_mut(&id)
    }

    //--------------------------------------------------------------------------
    // Edits
    //--------------------------------------------------------------------------

    /// Process a rectangle of edited cells on `sheet`, row by row, one pass per
    /// cell. A rejected formula does not stop the rest of the batch.
    pub fn grid_changed(
        &mut self,
        sheet: SheetId,
        change: GridChange,
    ) -> CellGraphResult<EditReport> {
        if !self.grids.grids.contains_key(&sheet) {
            return Err(CellGraphError::UnknownSheet(sheet));
        }

        let mut report = EditReport::default();
        for (row, col) in change.cells() {
            self.process_edit(CellAddress::new(sheet, row, col), &mut report);
        }
        Ok(report)
    }

    /// Write `cell` and process it at once.
    ///
    /// A formula that fails to compile or resolve is returned as the error;
    /// the cell keeps the raw text and its dependents were still updated.
    pub fn set_cell(
        &mut self,
        sheet: SheetId,
        row: usize,
        col: usize,
        cell: Cell,
    ) -> CellGraphResult<EditReport> {
        let grid = self
            .grids
            .grids
            .get_mut(&sheet)
            .ok_or(CellGraphError::UnknownSheet(sheet))?;
        grid.set_cell(row, col, cell, ChangeOrigin::Workbook);

        let mut report = self.grid_changed(sheet, GridChange::cell(row, col))?;
        match report.rejected.pop() {
            Some((_, err)) => Err(err),
            None => Ok(report),
        }
    }

    /// Process every host edit the grids have queued, sheet by sheet.
    pub fn flush(&mut self) -> CellGraphResult<EditReport> {
        let mut sheets: Vec<SheetId> = self.grids.grids.keys().copied().collect();
        sheets.sort();

        let mut report = EditReport::default();
        for sheet in sheets {
            let change = self
                .grids
                .grids
                .get_mut(&sheet)
                .and_then(|grid| grid.take_change());
            if let Some(change) = change {
                let batch = self.grid_changed(sheet, change)?;
                report.passes.extend(batch.passes);
                report.rejected.extend(batch.rejected);
            }
        }
        Ok(report)
    }

    /// Re-evaluate every installed formula in dependency order. Formulas on a
    /// cycle, and everything downstream of one, get the circular sentinel.
    pub fn recalculate_all(&mut self) -> PassReport {
        let members = cycles::cycle_members(&self.graph);
        if !members.is_empty() {
            warn!(cells = members.len(), "circular references found during recalculation");
        }

        let mut propagator = Propagator {
            graph: &self.graph,
            registry: &self.registry,
            engine: &self.engine,
            cells: &mut self.grids,
            sentinel: &self.config.circular_sentinel,
        };
        propagator.recalculate(&members)
    }

    fn process_edit(&mut self, address: CellAddress, report: &mut EditReport) {
        let cell = self.grids.read(address);
        self.registry.uninstall(&mut self.graph, address);

        if let Some(text) = cell.formula_source(self.config.formula_sigil) {
            if let Err(err) = self.install(address, text) {
                warn!(%address, %err, "formula rejected");
                // A rejected Formula or Error cell must not keep its old value
                if !matches!(cell, Cell::Literal(_)) {
                    let raw = format!("{}{}", self.config.formula_sigil, text);
                    self.grids.write(address, Cell::Literal(CellValue::Text(raw)));
                }
                report.rejected.push((address, err));
            }
        }

        report.passes.push(self.propagate(address));
    }

    fn install(&mut self, address: CellAddress, text: &str) -> CellGraphResult<()> {
        let expression = self.engine.compile(text)?;
        self.registry
            .install(&mut self.graph, &self.worksheets, address, expression)?;
        Ok(())
    }

    fn propagate(&mut self, edited: CellAddress) -> PassReport {
        let mut propagator = Propagator {
            graph: &self.graph,
            registry: &self.registry,
            engine: &self.engine,
            cells: &mut self.grids,
            sentinel: &self.config.circular_sentinel,
        };
        propagator.run(edited)
    }

    //--------------------------------------------------------------------------
    // Queries
    //--------------------------------------------------------------------------

    /// Resolve `Sheet!A1` text to an address. An unqualified name is not
    /// accepted here since there is no defining sheet to fall back on.
    pub fn address(&self, name: &str) -> CellGraphResult<CellAddress> {
        let parsed = reference::parse_reference(name)?;
        let sheet = parsed
            .sheet
            .as_deref()
            .ok_or_else(|| CellGraphError::InvalidReference(name.to_string()))?;
        let id = self
            .worksheets
            .lookup(sheet)
            .ok_or_else(|| CellGraphError::UnknownWorksheet(sheet.to_string()))?;
        Ok(CellAddress::new(id, parsed.row, parsed.col))
    }

    /// `Sheet!A1` text for an address on a registered sheet.
    pub fn reference_name(&self, address: CellAddress) -> Option<String> {
        let name = self.worksheets.name_of(address.sheet)?;
        Some(reference::format_reference(address, Some(name)))
    }

    pub fn cell(&self, address: CellAddress) -> Cell {
        self.grids.read(address)
    }

    /// The value formulas see when they read `address`.
    pub fn value(&self, address: CellAddress) -> CellValue {
        self.grids.read(address).value()
    }

    pub fn formula(&self, address: CellAddress) -> Option<&Formula<E::Expression>> {
        self.registry.get(address)
    }

    pub fn formula_count(&self) -> usize {
        self.registry.len()
    }

    /// Formulas reading `address`, sorted.
    pub fn dependents(&self, address: CellAddress) -> Vec<CellAddress> {
        let mut dependents: Vec<_> = self.graph.dependents_of(address).collect();
        dependents.sort();
        dependents
    }

    /// Cells read by the formula at `address`, sorted.
    pub fn precedents(&self, address: CellAddress) -> Vec<CellAddress> {
        let mut precedents: Vec<_> = self.graph.precedents_of(address).collect();
        precedents.sort();
        precedents
    }

    /// Groups of formulas that read each other in a loop.
    pub fn circular_references(&self) -> Vec<Vec<CellAddress>> {
        cycles::cycle_groups(&self.graph)
    }
}
