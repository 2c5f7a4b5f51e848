//! Reference graph between cells and the formulas that read them.
//!
//! # Edge Direction
//!
//! ```text
//! A → F  means  "the formula at F reads A"  (A is an input of F)
//! ```
//!
//! "What must recompute if A changes?" is a lookup of `dependents_of(A)`.

use std::collections::{HashMap, HashSet};

use crate::types::CellAddress;

/// Inverse index from input cells to the formulas that read them.
///
/// Formulas are identified by their defining address; the registry keeps at
/// most one formula per address, so the address is a stable key.
///
/// # Invariants
///
/// 1. **Bidirectional consistency:** F ∈ dependents[A] iff A ∈ precedents[F].
/// 2. **No empty entries:** sets that become empty are removed.
/// 3. **No duplicate edges:** a formula appears once per distinct input.
#[derive(Debug, Default, Clone)]
pub struct ReferenceGraph {
    /// input cell -> formulas reading it
    dependents: HashMap<CellAddress, HashSet<CellAddress>>,
    /// formula -> input cells it reads
    precedents: HashMap<CellAddress, HashSet<CellAddress>>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the formula at `formula` reads `input`.
    pub fn subscribe(&mut self, input: CellAddress, formula: CellAddress) {
        self.dependents.entry(input).or_default().insert(formula);
        self.precedents.entry(formula).or_default().insert(input);
    }

    /// Drop the edge `input → formula`. No-op if it does not exist.
    pub fn unsubscribe(&mut self, input: CellAddress, formula: CellAddress) {
        if let Some(deps) = self.dependents.get_mut(&input) {
            deps.remove(&formula);
            if deps.is_empty() {
                self.dependents.remove(&input);
            }
        }
        if let Some(preds) = self.precedents.get_mut(&formula) {
            preds.remove(&input);
            if preds.is_empty() {
                self.precedents.remove(&formula);
            }
        }
    }

    /// Formulas that read `input`. Unordered; empty when nothing reads it.
    pub fn dependents_of(&self, input: CellAddress) -> impl Iterator<Item = CellAddress> + '_ {
        self.dependents
            .get(&input)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Inputs read by the formula at `formula`.
    pub fn precedents_of(&self, formula: CellAddress) -> impl Iterator<Item = CellAddress> + '_ {
        self.precedents
            .get(&formula)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    pub fn has_edge(&self, input: CellAddress, formula: CellAddress) -> bool {
        self.dependents
            .get(&input)
            .is_some_and(|deps| deps.contains(&formula))
    }

    pub fn dependent_count(&self, input: CellAddress) -> usize {
        self.dependents.get(&input).map_or(0, HashSet::len)
    }

    /// Number of cells read by at least one formula.
    pub fn referenced_cell_count(&self) -> usize {
        self.dependents.len()
    }

    /// Formula cells that currently have at least one input.
    pub fn formula_cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        self.precedents.keys().copied()
    }

    /// Every `(input, formula)` edge.
    pub fn edges(&self) -> impl Iterator<Item = (CellAddress, CellAddress)> + '_ {
        self.dependents
            .iter()
            .flat_map(|(input, deps)| deps.iter().map(move |formula| (*input, *formula)))
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty() && self.precedents.is_empty()
    }

    /// Verify the invariants. Test helper.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (input, deps) in &self.dependents {
            assert!(!deps.is_empty(), "empty dependents set stored for {input}");
            for formula in deps {
                assert!(
                    self.precedents
                        .get(formula)
                        .is_some_and(|p| p.contains(input)),
                    "{formula} depends on {input} but the precedent edge is missing"
                );
            }
        }
        for (formula, preds) in &self.precedents {
            assert!(!preds.is_empty(), "empty precedents set stored for {formula}");
            for input in preds {
                assert!(
                    self.dependents
                        .get(input)
                        .is_some_and(|d| d.contains(formula)),
                    "{formula} reads {input} but the dependent edge is missing"
                );
            }
        }
    }
}
