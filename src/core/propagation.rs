//! Mark / recompute passes.
//!
//! One pass per edited cell:
//!
//! ```text
//! Idle → Marking → Recomputing      → Idle
//!              └─→ ErrorPropagating → Idle
//! ```
//!
//! All scratch state (dirty set, traversal path) lives in a [`Pass`] that is
//! created empty for the edit and dropped when the pass ends.

use std::collections::HashSet;
use tracing::{debug, trace, warn};

use super::graph::ReferenceGraph;
use super::registry::FormulaRegistry;
use crate::error::{CellGraphError, CellGraphResult};
use crate::expression::{Bindings, ExpressionEngine};
use crate::types::{Cell, CellAddress, CellValue};

/// Cell access used by a pass.
///
/// `write` stores a computed result and must not be reported back to the host
/// as an edit.
pub(crate) trait CellStore {
    fn read(&self, address: CellAddress) -> Cell;
    fn write(&mut self, address: CellAddress, cell: Cell);
}

/// What one pass wrote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// The edited cell that started the pass, `None` for a full recalculation.
    pub edited: Option<CellAddress>,
    /// Cells that received a freshly computed value, in evaluation order.
    pub recomputed: Vec<CellAddress>,
    /// Cells that received the circular-reference sentinel.
    pub circular: Vec<CellAddress>,
}

impl PassReport {
    pub fn had_cycle(&self) -> bool {
        !self.circular.is_empty()
    }
}

/// Scratch state of a single pass.
#[derive(Debug, Default)]
struct Pass {
    /// Formula cells still waiting for evaluation
    dirty: HashSet<CellAddress>,
    /// Cells on the current mark traversal path
    visited: HashSet<CellAddress>,
    report: PassReport,
}

/// Borrowed view of the workbook for the duration of one pass.
pub(crate) struct Propagator<'a, E: ExpressionEngine, S: CellStore> {
    pub graph: &'a ReferenceGraph,
    pub registry: &'a FormulaRegistry<E::Expression>,
    pub engine: &'a E,
    pub cells: &'a mut S,
    pub sentinel: &'a str,
}

impl<'a, E: ExpressionEngine, S: CellStore> Propagator<'a, E, S> {
    /// Propagate a change of `edited` to everything that depends on it.
    pub fn run(&mut self, edited: CellAddress) -> PassReport {
        let mut pass = Pass::default();
        pass.report.edited = Some(edited);

        match mark(self.graph, edited, &mut pass) {
            Ok(()) => {
                // A freshly installed formula needs its own first value
                if self.registry.contains(edited) {
                    pass.dirty.insert(edited);
                }
                trace!(%edited, dirty = pass.dirty.len(), "mark phase complete");
                self.recompute(&mut pass);
            }
            Err(err) => {
                warn!(%edited, %err, "circular reference, propagating error sentinel");
                pass.dirty.clear();
                self.spread_error(&mut pass, &[edited]);
            }
        }

        debug!(
            %edited,
            recomputed = pass.report.recomputed.len(),
            circular = pass.report.circular.len(),
            "propagation pass finished"
        );
        pass.report
    }

    /// Re-evaluate every installed formula.
    ///
    /// `cycle_members` (and everything downstream of them) receive the
    /// sentinel; all other formulas are recomputed in dependency order.
    pub fn recalculate(&mut self, cycle_members: &[CellAddress]) -> PassReport {
        let mut pass = Pass::default();
        let errored = self.spread_error(&mut pass, cycle_members);

        pass.dirty = self
            .registry
            .addresses()
            .into_iter()
            .filter(|address| !errored.contains(address))
            .collect();
        self.recompute(&mut pass);

        debug!(
            recomputed = pass.report.recomputed.len(),
            circular = pass.report.circular.len(),
            "full recalculation finished"
        );
        pass.report
    }

    /// Write the sentinel into every root holding a formula and into every
    /// transitive dependent, each exactly once. Nothing is evaluated.
    ///
    /// Returns the set of cells visited.
    fn spread_error(&mut self, pass: &mut Pass, roots: &[CellAddress]) -> HashSet<CellAddress> {
        let mut errored: HashSet<CellAddress> = HashSet::new();
        let mut stack: Vec<CellAddress> = Vec::new();

        for &root in roots {
            if errored.insert(root) {
                self.write_sentinel(pass, root);
                stack.push(root);
            }
        }

        while let Some(address) = stack.pop() {
            let mut dependents: Vec<CellAddress> = self.graph.dependents_of(address).collect();
            dependents.sort();
            for dependent in dependents {
                if errored.insert(dependent) {
                    self.write_sentinel(pass, dependent);
                    stack.push(dependent);
                }
            }
        }

        errored
    }

    fn write_sentinel(&mut self, pass: &mut Pass, address: CellAddress) {
        // A literal has no inputs, so it can't sit on a cycle; leave it alone
        let registry = self.registry;
        let Some(formula) = registry.get(address) else {
            return;
        };
        let cell = Cell::Error {
            source: formula.source().to_string(),
            marker: self.sentinel.to_string(),
        };
        self.cells.write(address, cell);
        pass.report.circular.push(address);
    }

    /// Drain the dirty set. Any address may be picked; dirty inputs of the
    /// picked formula are evaluated first.
    fn recompute(&mut self, pass: &mut Pass) {
        while let Some(next) = pass.dirty.iter().next().copied() {
            self.force(pass, next);
        }
    }

    /// Evaluate `root` after every still-dirty input it reads.
    ///
    /// Uses an explicit stack so long dependency chains can't overflow the
    /// call stack. The marked subgraph is acyclic, `on_stack` only guards
    /// against a broken invariant.
    fn force(&mut self, pass: &mut Pass, root: CellAddress) {
        let registry = self.registry;
        let mut stack = vec![root];
        let mut on_stack: HashSet<CellAddress> = HashSet::from([root]);

        while let Some(&top) = stack.last() {
            let pending = registry.get(top).and_then(|formula| {
                formula
                    .inputs()
                    .find(|input| pass.dirty.contains(input) && !on_stack.contains(input))
            });

            match pending {
                Some(input) => {
                    on_stack.insert(input);
                    stack.push(input);
                }
                None => {
                    stack.pop();
                    on_stack.remove(&top);
                    self.evaluate(pass, top);
                }
            }
        }
    }

    /// Bind, evaluate and write back one formula; clears it from the dirty set.
    fn evaluate(&mut self, pass: &mut Pass, address: CellAddress) {
        pass.dirty.remove(&address);

        let registry = self.registry;
        let Some(formula) = registry.get(address) else {
            return;
        };

        let bindings: Bindings = formula
            .bindings()
            .iter()
            .map(|(name, input)| {
                let value = match self.cells.read(*input).value() {
                    CellValue::Empty => CellValue::Text(String::new()),
                    value => value,
                };
                (name.clone(), value)
            })
            .collect();

        let value = self.engine.evaluate(formula.expression(), &bindings);
        trace!(%address, %value, "evaluated");

        self.cells.write(
            address,
            Cell::Formula {
                source: formula.source().to_string(),
                value,
            },
        );
        pass.report.recomputed.push(address);
    }
}

/// Collect every formula reachable from `root` into the dirty set.
///
/// Depth-first over `dependents_of`, with `visited` holding the current path.
/// Meeting a cell that is already on the path is a cycle. A dirty cell off the
/// path was fully explored already and is skipped.
fn mark(graph: &ReferenceGraph, root: CellAddress, pass: &mut Pass) -> CellGraphResult<()> {
    struct Frame {
        address: CellAddress,
        dependents: Vec<CellAddress>,
        next: usize,
    }

    let frame = |address: CellAddress| Frame {
        address,
        dependents: graph.dependents_of(address).collect(),
        next: 0,
    };

    pass.visited.insert(root);
    let mut stack = vec![frame(root)];

    while let Some(top) = stack.last_mut() {
        let next = top.dependents.get(top.next).copied();
        top.next += 1;

        match next {
            Some(dependent) => {
                if pass.visited.contains(&dependent) {
                    return Err(CellGraphError::CircularReference(dependent));
                }
                if pass.dirty.insert(dependent) {
                    pass.visited.insert(dependent);
                    stack.push(frame(dependent));
                }
            }
            None => {
                if let Some(done) = stack.pop() {
                    pass.visited.remove(&done.address);
                }
            }
        }
    }

    Ok(())
}
