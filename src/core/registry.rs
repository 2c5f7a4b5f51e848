use std::collections::HashMap;
use tracing::debug;

use super::graph::ReferenceGraph;
use super::worksheets::WorksheetTable;
use crate::error::CellGraphResult;
use crate::expression::CompiledExpression;
use crate::reference;
use crate::types::{CellAddress, SheetId};

/// A compiled expression installed at one cell, with its inputs resolved.
#[derive(Debug, Clone)]
pub struct Formula<X> {
    address: CellAddress,
    expression: X,
    /// variable name as written -> address it reads, in first-use order
    bindings: Vec<(String, CellAddress)>,
    /// `bindings` targets without repeats; `A1` and `Sheet1!A1` on Sheet1 are one input
    inputs: Vec<CellAddress>,
}

impl<X: CompiledExpression> Formula<X> {
    pub fn address(&self) -> CellAddress {
        self.address
    }

    pub fn source(&self) -> &str {
        self.expression.source()
    }

    pub fn expression(&self) -> &X {
        &self.expression
    }

    pub fn bindings(&self) -> &[(String, CellAddress)] {
        &self.bindings
    }

    /// Distinct input addresses, in first-use order.
    pub fn inputs(&self) -> impl Iterator<Item = CellAddress> + '_ {
        self.inputs.iter().copied()
    }

    pub fn reads(&self, address: CellAddress) -> bool {
        self.inputs().any(|input| input == address)
    }
}

/// One formula per cell, kept in step with the reference graph.
#[derive(Debug)]
pub struct FormulaRegistry<X> {
    formulas: HashMap<CellAddress, Formula<X>>,
}

impl<X> Default for FormulaRegistry<X> {
    fn default() -> Self {
        Self {
            formulas: HashMap::new(),
        }
    }
}

impl<X: CompiledExpression> FormulaRegistry<X> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `expression` at `address`.
    ///
    /// Every referenced name is resolved before anything is mutated: on a
    /// resolution error the registry and graph are left exactly as they were.
    /// On success any previous formula at `address` is uninstalled first.
    pub fn install(
        &mut self,
        graph: &mut ReferenceGraph,
        worksheets: &WorksheetTable,
        address: CellAddress,
        expression: X,
    ) -> CellGraphResult<&Formula<X>> {
        let bindings = expression
            .referenced_names()
            .iter()
            .map(|name| {
                reference::resolve(name, address, worksheets).map(|target| (name.clone(), target))
            })
            .collect::<CellGraphResult<Vec<_>>>()?;

        let mut inputs: Vec<CellAddress> = Vec::with_capacity(bindings.len());
        for (_, input) in &bindings {
            if !inputs.contains(input) {
                inputs.push(*input);
            }
        }

        self.uninstall(graph, address);

        for input in &inputs {
            graph.subscribe(*input, address);
        }
        debug!(%address, inputs = inputs.len(), "formula installed");

        let formula = Formula {
            address,
            expression,
            bindings,
            inputs,
        };
        Ok(self.formulas.entry(address).or_insert(formula))
    }

    /// Remove the formula at `address` and all of its graph edges.
    pub fn uninstall(
        &mut self,
        graph: &mut ReferenceGraph,
        address: CellAddress,
    ) -> Option<Formula<X>> {
        let formula = self.formulas.remove(&address)?;
        for input in formula.inputs() {
            graph.unsubscribe(input, address);
        }
        debug!(%address, "formula uninstalled");
        Some(formula)
    }

    pub fn get(&self, address: CellAddress) -> Option<&Formula<X>> {
        self.formulas.get(&address)
    }

    pub fn contains(&self, address: CellAddress) -> bool {
        self.formulas.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// Addresses of every installed formula, sorted.
    pub fn addresses(&self) -> Vec<CellAddress> {
        let mut addresses: Vec<_> = self.formulas.keys().copied().collect();
        addresses.sort();
        addresses
    }

    /// Formulas defined on `sheet`, sorted.
    pub fn defined_on(&self, sheet: SheetId) -> Vec<CellAddress> {
        let mut addresses: Vec<_> = self
            .formulas
            .keys()
            .filter(|a| a.sheet == sheet)
            .copied()
            .collect();
        addresses.sort();
        addresses
    }

    /// Formulas on other sheets that read a cell of `sheet`, sorted.
    pub fn reading_sheet(&self, sheet: SheetId) -> Vec<CellAddress> {
        let mut addresses: Vec<_> = self
            .formulas
            .values()
            .filter(|f| f.address.sheet != sheet && f.inputs().any(|i| i.sheet == sheet))
            .map(|f| f.address)
            .collect();
        addresses.sort();
        addresses
    }
}
