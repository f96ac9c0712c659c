//! Dependency graph resolution.
//!
//! Operates on the flat edge list of one schedule: detects cycles
//! (returning the exact offending path) and computes the downstream
//! closure of a task in topological order, so date propagation can
//! process each affected task exactly once, after all of its
//! in-closure predecessors.
//!
//! # Algorithm
//! Cycle detection is a DFS with visiting/visited marking; the closure
//! uses Kahn's algorithm restricted to the reachable subgraph, with
//! lexicographic tie-breaking for deterministic output. Both are
//! linear in nodes + edges.
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4

use std::cmp::Reverse;
use std::collections::{BinaryHeap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::error::{Result, ScheduleError};
use crate::models::Dependency;

/// Validates that `edges` contains no cycle.
///
/// Returns [`ScheduleError::CycleDetected`] with the offending cycle as
/// an ordered task-id path, first task repeated at the end
/// (`[A, B, A]` for `A → B → A`).
pub fn validate_acyclic(edges: &[Dependency]) -> Result<()> {
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut nodes: BTreeSet<&str> = BTreeSet::new();
    for e in edges {
        nodes.insert(e.from_task_id.as_str());
        nodes.insert(e.to_task_id.as_str());
        adj.entry(e.from_task_id.as_str())
            .or_default()
            .push(e.to_task_id.as_str());
    }
    for successors in adj.values_mut() {
        successors.sort_unstable();
    }

    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();
    let mut stack = Vec::new();
    for &node in &nodes {
        if !visited.contains(node) {
            if let Some(path) = cycle_dfs(node, &adj, &mut visited, &mut in_stack, &mut stack) {
                return Err(ScheduleError::CycleDetected { path });
            }
        }
    }
    Ok(())
}

fn cycle_dfs<'a>(
    node: &'a str,
    adj: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    in_stack: &mut HashSet<&'a str>,
    stack: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    in_stack.insert(node);
    stack.push(node);

    if let Some(successors) = adj.get(node) {
        for &next in successors {
            if in_stack.contains(next) {
                // Back edge: the cycle runs from the earlier occurrence
                // of `next` to the top of the stack, then closes.
                let from = stack.iter().position(|&n| n == next).unwrap_or(0);
                let mut path: Vec<String> =
                    stack[from..].iter().map(|n| (*n).to_string()).collect();
                path.push(next.to_string());
                return Some(path);
            }
            if !visited.contains(next) {
                if let Some(path) = cycle_dfs(next, adj, visited, in_stack, stack) {
                    return Some(path);
                }
            }
        }
    }

    stack.pop();
    in_stack.remove(node);
    None
}

/// Tasks reachable from `task_id` following predecessor → successor
/// edges, in topological order, excluding `task_id` itself.
///
/// Ties (tasks whose in-closure predecessors are all processed) break
/// lexicographically by task id, so the output is deterministic.
/// Assumes the edge set is acyclic; callers validate first.
pub fn downstream_closure(task_id: &str, edges: &[Dependency]) -> Vec<String> {
    let mut adj: HashMap<&str, Vec<&Dependency>> = HashMap::new();
    for e in edges {
        adj.entry(e.from_task_id.as_str()).or_default().push(e);
    }

    // Reachability pass.
    let mut reachable: HashSet<&str> = HashSet::new();
    let mut frontier: VecDeque<&str> = VecDeque::new();
    frontier.push_back(task_id);
    while let Some(node) = frontier.pop_front() {
        if let Some(out) = adj.get(node) {
            for e in out {
                let next = e.to_task_id.as_str();
                if next != task_id && reachable.insert(next) {
                    frontier.push_back(next);
                }
            }
        }
    }

    // Kahn's algorithm over the subgraph induced by {root} ∪ reachable.
    let mut in_degree: HashMap<&str, usize> = reachable.iter().map(|&n| (n, 0)).collect();
    for e in edges {
        let from = e.from_task_id.as_str();
        if from == task_id || reachable.contains(from) {
            if let Some(deg) = in_degree.get_mut(e.to_task_id.as_str()) {
                *deg += 1;
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<&str>> = BinaryHeap::new();
    // The root counts as already processed.
    let mut order = Vec::with_capacity(reachable.len());
    if let Some(out) = adj.get(task_id) {
        for e in out {
            if let Some(deg) = in_degree.get_mut(e.to_task_id.as_str()) {
                *deg -= 1;
                if *deg == 0 {
                    ready.push(Reverse(e.to_task_id.as_str()));
                }
            }
        }
    }

    let mut released: HashSet<&str> = HashSet::new();
    while let Some(Reverse(node)) = ready.pop() {
        if !released.insert(node) {
            continue; // each node enters the order exactly once
        }
        order.push(node.to_string());
        if let Some(out) = adj.get(node) {
            for e in out {
                if let Some(deg) = in_degree.get_mut(e.to_task_id.as_str()) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push(Reverse(e.to_task_id.as_str()));
                    }
                }
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DependencyType;

    fn edge(id: &str, from: &str, to: &str) -> Dependency {
        Dependency::new(id, "S1", from, to)
    }

    #[test]
    fn test_empty_edge_set_is_acyclic() {
        assert!(validate_acyclic(&[]).is_ok());
    }

    #[test]
    fn test_chain_is_acyclic() {
        let edges = vec![edge("D1", "A", "B"), edge("D2", "B", "C")];
        assert!(validate_acyclic(&edges).is_ok());
    }

    #[test]
    fn test_two_cycle_reports_exact_path() {
        let edges = vec![edge("D1", "A", "B"), edge("D2", "B", "A")];
        match validate_acyclic(&edges) {
            Err(ScheduleError::CycleDetected { path }) => {
                assert_eq!(path, vec!["A", "B", "A"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_longer_cycle_reports_full_loop() {
        let edges = vec![
            edge("D1", "A", "B"),
            edge("D2", "B", "C"),
            edge("D3", "C", "A"),
        ];
        match validate_acyclic(&edges) {
            Err(ScheduleError::CycleDetected { path }) => {
                assert_eq!(path.len(), 4);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_off_a_branch() {
        // A → B, then B → C → D → C.
        let edges = vec![
            edge("D1", "A", "B"),
            edge("D2", "B", "C"),
            edge("D3", "C", "D"),
            edge("D4", "D", "C"),
        ];
        match validate_acyclic(&edges) {
            Err(ScheduleError::CycleDetected { path }) => {
                assert_eq!(path, vec!["C", "D", "C"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_closure_of_chain() {
        let edges = vec![edge("D1", "A", "B"), edge("D2", "B", "C")];
        assert_eq!(downstream_closure("A", &edges), vec!["B", "C"]);
        assert_eq!(downstream_closure("B", &edges), vec!["C"]);
        assert!(downstream_closure("C", &edges).is_empty());
    }

    #[test]
    fn test_closure_excludes_unrelated_tasks() {
        let edges = vec![edge("D1", "A", "B"), edge("D2", "X", "Y")];
        assert_eq!(downstream_closure("A", &edges), vec!["B"]);
    }

    #[test]
    fn test_diamond_processes_join_last() {
        let edges = vec![
            edge("D1", "A", "B"),
            edge("D2", "A", "C"),
            edge("D3", "B", "D"),
            edge("D4", "C", "D"),
        ];
        let order = downstream_closure("A", &edges);
        assert_eq!(order, vec!["B", "C", "D"]); // D only after both B and C
    }

    #[test]
    fn test_parallel_edges_release_once() {
        let edges = vec![
            edge("D1", "A", "B"),
            edge("D2", "A", "B").with_kind(DependencyType::FinishToFinish),
        ];
        assert_eq!(downstream_closure("A", &edges), vec!["B"]);
    }

    #[test]
    fn test_closure_ignores_upstream_edges() {
        // B ← A → C: nothing upstream of A is in its closure.
        let edges = vec![edge("D1", "Z", "A"), edge("D2", "A", "B")];
        assert_eq!(downstream_closure("A", &edges), vec!["B"]);
    }
}
