//! Linearization of the match graph into final merge order.
//!
//! [`toposort`] orders nodes so every precedence edge is respected,
//! breaking ties toward the policy's pick-first source. When the two
//! source orders contradict each other the graph is cyclic and
//! [`best_effort_order`] produces a deterministic fallback instead: the
//! pick-first chain start to end, then whatever the other chain still
//! holds.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use recmerge_core::Source;

use crate::graph::MatchGraph;

/// Topological order of all nodes, or `None` when the graph is cyclic.
///
/// Whenever several nodes are ready at once, the one earliest in the
/// `pick_first` chain wins; nodes absent from that chain rank by their
/// position in the other chain.
pub fn toposort(graph: &MatchGraph, pick_first: Source) -> Option<Vec<usize>> {
    let node_count = graph.nodes.len();
    let mut indegree = vec![0usize; node_count];
    for succs in &graph.successors {
        for &succ in succs {
            indegree[succ] += 1;
        }
    }

    let pick_pos = chain_positions(graph.chain(pick_first));
    let other_pos = chain_positions(graph.chain(other_source(pick_first)));
    let rank = |id: usize| {
        (
            pick_pos.get(&id).copied().unwrap_or(usize::MAX),
            other_pos.get(&id).copied().unwrap_or(usize::MAX),
            id,
        )
    };

    let mut ready: BTreeSet<usize> = (0..node_count).filter(|&id| indegree[id] == 0).collect();
    let mut order = Vec::with_capacity(node_count);
    while let Some(&next) = ready.iter().min_by_key(|&&id| rank(id)) {
        ready.remove(&next);
        order.push(next);
        for &succ in &graph.successors[next] {
            indegree[succ] -= 1;
            if indegree[succ] == 0 {
                ready.insert(succ);
            }
        }
    }

    if order.len() == node_count {
        Some(order)
    } else {
        debug!(
            emitted = order.len(),
            nodes = node_count,
            "order constraints are cyclic"
        );
        None
    }
}

/// Deterministic fallback order for a cyclic graph.
///
/// Emits the whole `pick_first` chain in its source order, then appends
/// the remaining nodes in the other chain's order. Every node appears
/// exactly once.
pub fn best_effort_order(graph: &MatchGraph, pick_first: Source) -> Vec<usize> {
    let mut emitted = vec![false; graph.nodes.len()];
    let mut order = Vec::with_capacity(graph.nodes.len());
    for chain in [graph.chain(pick_first), graph.chain(other_source(pick_first))] {
        for &id in chain {
            if !emitted[id] {
                emitted[id] = true;
                order.push(id);
            }
        }
    }
    order
}

fn other_source(pick_first: Source) -> Source {
    match pick_first {
        Source::Head => Source::Update,
        _ => Source::Head,
    }
}

fn chain_positions(chain: &[usize]) -> HashMap<usize, usize> {
    chain.iter().enumerate().map(|(pos, &id)| (id, pos)).collect()
}
