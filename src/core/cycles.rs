//! Whole-graph cycle analysis.
//!
//! Edits find cycles lazily during the mark phase. Full recalculation and
//! diagnostics need every cycle at once, which is a strongly-connected
//! component search over the reference graph.

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use super::graph::ReferenceGraph;
use crate::types::CellAddress;

/// Groups of cells that read each other in a loop.
///
/// A group is an SCC with more than one member, or a single cell that reads
/// itself. Each group is sorted, and groups are ordered by their first cell.
pub fn cycle_groups(graph: &ReferenceGraph) -> Vec<Vec<CellAddress>> {
    let mut g: DiGraphMap<CellAddress, ()> = DiGraphMap::new();
    for (input, formula) in graph.edges() {
        g.add_edge(input, formula, ());
    }

    let mut groups: Vec<Vec<CellAddress>> = tarjan_scc(&g)
        .into_iter()
        .filter(|scc| scc.len() > 1 || g.contains_edge(scc[0], scc[0]))
        .map(|mut scc| {
            scc.sort();
            scc
        })
        .collect();
    groups.sort();
    groups
}

/// Every cell that sits on some cycle, sorted.
pub fn cycle_members(graph: &ReferenceGraph) -> Vec<CellAddress> {
    let mut members: Vec<CellAddress> = cycle_groups(graph).into_iter().flatten().collect();
    members.sort();
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SheetId;
    use pretty_assertions::assert_eq;

    fn cell(row: usize, col: usize) -> CellAddress {
        CellAddress::new(SheetId::from_raw(1), row, col)
    }

    #[test]
    fn test_acyclic_graph_has_no_groups() {
        let mut graph = ReferenceGraph::new();
        graph.subscribe(cell(1, 0), cell(1, 1));
        graph.subscribe(cell(1, 1), cell(1, 2));
        graph.subscribe(cell(1, 0), cell(1, 2));

        assert!(cycle_groups(&graph).is_empty());
    }

    #[test]
    fn test_self_loop_is_a_group() {
        let mut graph = ReferenceGraph::new();
        graph.subscribe(cell(1, 0), cell(1, 0));
        graph.subscribe(cell(1, 0), cell(1, 1));

        assert_eq!(cycle_groups(&graph), vec![vec![cell(1, 0)]]);
    }

    #[test]
    fn test_separate_loops_reported_separately() {
        let mut graph = ReferenceGraph::new();
        // A1 -> B1 -> C1 -> A1
        graph.subscribe(cell(1, 0), cell(1, 1));
        graph.subscribe(cell(1, 1), cell(1, 2));
        graph.subscribe(cell(1, 2), cell(1, 0));
        // A5 <-> B5
        graph.subscribe(cell(5, 0), cell(5, 1));
        graph.subscribe(cell(5, 1), cell(5, 0));
        // D1 hangs off the first loop
        graph.subscribe(cell(1, 2), cell(1, 3));

        assert_eq!(
            cycle_groups(&graph),
            vec![
                vec![cell(1, 0), cell(1, 1), cell(1, 2)],
                vec![cell(5, 0), cell(5, 1)],
            ]
        );
        assert_eq!(cycle_members(&graph).len(), 5);
    }
}
