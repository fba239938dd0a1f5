// Unit tests for the Traceability Engine's fixed-point closure algorithm
// (SPEC_FULL.md §4.3), exercised against an in-memory order graph so the
// walk itself is verified without a live connection. Complements the
// inline #[cfg(test)] module in src/services/traceability_service.rs,
// which covers the backward direction; this file adds forward closure,
// diamond/merge graphs, and cycle safety.

use std::collections::{HashMap, HashSet, VecDeque};

/// order_id -> (input lot ids, output lot ids)
type Graph = HashMap<i64, (Vec<i64>, Vec<i64>)>;

fn orders_with_output(graph: &Graph, lot_id: i64) -> Vec<&(Vec<i64>, Vec<i64>)> {
    graph
        .values()
        .filter(|(_, outputs)| outputs.contains(&lot_id))
        .collect()
}

fn orders_with_input(graph: &Graph, lot_id: i64) -> Vec<&(Vec<i64>, Vec<i64>)> {
    graph
        .values()
        .filter(|(inputs, _)| inputs.contains(&lot_id))
        .collect()
}

fn backward_closure(graph: &Graph, lot_id: i64) -> HashSet<i64> {
    let mut visited = HashSet::new();
    let mut work = VecDeque::from([lot_id]);
    while let Some(current) = work.pop_front() {
        for (inputs, _) in orders_with_output(graph, current) {
            for &input in inputs {
                if visited.insert(input) {
                    work.push_back(input);
                }
            }
        }
    }
    visited
}

fn forward_closure(graph: &Graph, lot_id: i64) -> HashSet<i64> {
    let mut visited = HashSet::new();
    let mut work = VecDeque::from([lot_id]);
    while let Some(current) = work.pop_front() {
        for (_, outputs) in orders_with_input(graph, current) {
            for &output in outputs {
                if visited.insert(output) {
                    work.push_back(output);
                }
            }
        }
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_closure_reaches_transitive_descendants() {
        // order 1: L1 -> L2 (breakdown); order 2: L2 -> L3 (mix)
        let mut graph = Graph::new();
        graph.insert(1, (vec![1], vec![2]));
        graph.insert(2, (vec![2], vec![3]));

        let result = forward_closure(&graph, 1);
        assert!(result.contains(&2));
        assert!(result.contains(&3));
    }

    #[test]
    fn forward_closure_fans_out_to_multiple_outputs() {
        // QA split: L1 -> L2 (pass), L1 -> L3 (fail)
        let mut graph = Graph::new();
        graph.insert(1, (vec![1], vec![2, 3]));

        let result = forward_closure(&graph, 1);
        assert_eq!(result, HashSet::from([2, 3]));
    }

    #[test]
    fn backward_closure_merges_multiple_inputs_of_a_mix() {
        // mix: L1, L2 -> L3
        let mut graph = Graph::new();
        graph.insert(1, (vec![1, 2], vec![3]));

        let result = backward_closure(&graph, 3);
        assert_eq!(result, HashSet::from([1, 2]));
    }

    #[test]
    fn closure_on_lot_with_no_production_history_is_empty() {
        let graph = Graph::new();
        assert!(forward_closure(&graph, 42).is_empty());
        assert!(backward_closure(&graph, 42).is_empty());
    }

    #[test]
    fn closure_terminates_on_a_graph_with_a_cycle() {
        // Not a realistic production graph, but the visited-set must stop
        // the walk rather than loop forever if one were ever introduced.
        let mut graph = Graph::new();
        graph.insert(1, (vec![1], vec![2]));
        graph.insert(2, (vec![2], vec![1]));

        let result = forward_closure(&graph, 1);
        assert_eq!(result, HashSet::from([1, 2]));
    }
}
