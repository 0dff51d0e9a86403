use tracing::{debug, info};

use crate::{
    error::RoutingError,
    graph::GraphEdge,
    profile::{Weight, Weighting},
    road_graph::RoadGraph,
    types::NodeId,
};

use super::{
    contracted_graph::{ChEdgeData, ContractedGraph},
    preparation::PreparationGraph,
    priority_queue::PriorityQueue,
    witness::WitnessSearch,
};

/// Builds a contraction hierarchy for the given weighting, choosing the
/// contraction order by edge difference with lazy re-evaluation.
pub fn build_contracted_graph<W: Weighting>(
    graph: &RoadGraph,
    weighting: &W,
) -> Result<ContractedGraph, RoutingError> {
    let mut prep = PreparationGraph::from_graph(graph, weighting);
    let mut witness = WitnessSearch::new();
    let node_count = prep.node_count();

    info!(
        nodes = node_count,
        edges = graph.edge_count(),
        "starting contraction"
    );

    let mut queue = PriorityQueue::new(node_count);
    for node in 0..node_count {
        let priority = calc_priority(&prep, &mut witness, node);
        queue
            .push(node, priority)
            .expect("every node is enqueued exactly once");
    }

    let mut levels = vec![0; node_count];
    let mut next_level = 0;

    while let Some((node, _)) = queue.pop() {
        // Contraction changes neighbours' priorities; re-check lazily
        // against the next candidate before committing.
        if let Some(&(_, next_priority)) = queue.peek() {
            let recomputed = calc_priority(&prep, &mut witness, node);
            if recomputed > next_priority {
                queue
                    .push(node, recomputed)
                    .expect("node was just popped from the queue");
                continue;
            }
        }

        let neighbors = contract_node(&mut prep, &mut witness, node);
        levels[node] = next_level;
        next_level += 1;

        for neighbor in neighbors {
            let priority = calc_priority(&prep, &mut witness, neighbor);
            queue.update_priority(neighbor, priority);
        }

        if next_level % 100_000 == 0 {
            debug!(contracted = next_level, "contraction progress");
        }
    }

    assemble(graph, &prep, levels)
}

/// Builds a contraction hierarchy contracting vertices in the order
/// given; `order` must list every vertex exactly once.
pub fn build_with_order<W: Weighting>(
    graph: &RoadGraph,
    weighting: &W,
    order: &[NodeId],
) -> Result<ContractedGraph, RoutingError> {
    let mut prep = PreparationGraph::from_graph(graph, weighting);
    let mut witness = WitnessSearch::new();

    debug_assert_eq!(order.len(), prep.node_count());

    let mut levels = vec![0; prep.node_count()];
    for (level, &node) in order.iter().enumerate() {
        debug_assert!(!prep.is_contracted(node), "vertex listed twice");
        contract_node(&mut prep, &mut witness, node);
        levels[node] = level;
    }

    assemble(graph, &prep, levels)
}

/// Adds the shortcuts required around `node`, marks it contracted and
/// returns the neighbours whose priorities are now stale.
fn contract_node(
    prep: &mut PreparationGraph,
    witness: &mut WitnessSearch,
    node: NodeId,
) -> Vec<NodeId> {
    let shortcuts = find_shortcuts(prep, witness, node);

    let mut neighbors: Vec<NodeId> = Vec::new();
    for &edge_id in prep.node_edges(node) {
        let adj = prep.edge(edge_id).adj_node(node);
        if adj != node && !prep.is_contracted(adj) && !neighbors.contains(&adj) {
            neighbors.push(adj);
        }
    }

    for (from, to, weight) in shortcuts {
        prep.add_shortcut(from, to, weight, node);
    }
    prep.set_contracted(node);

    neighbors
}

/// Edge difference: shortcuts the contraction would add, minus the
/// incident edges it retires.
fn calc_priority(prep: &PreparationGraph, witness: &mut WitnessSearch, node: NodeId) -> i32 {
    let shortcuts = find_shortcuts(prep, witness, node);
    let incoming = prep.incoming_neighbors(node).len();
    let outgoing = prep.outgoing_neighbors(node).len();

    shortcuts.len() as i32 - (incoming + outgoing) as i32
}

/// The shortcuts needed to preserve shortest paths once `node` is
/// removed: one per in/out neighbour pair with no witness path at most
/// as cheap as the path through `node`.
fn find_shortcuts(
    prep: &PreparationGraph,
    witness: &mut WitnessSearch,
    node: NodeId,
) -> Vec<(NodeId, NodeId, Weight)> {
    let incoming = prep.incoming_neighbors(node);
    let outgoing = prep.outgoing_neighbors(node);

    let mut shortcuts = Vec::new();
    for &(from, incoming_weight) in &incoming {
        for &(to, outgoing_weight) in &outgoing {
            if from == to {
                continue;
            }

            let direct = incoming_weight + outgoing_weight;
            let witness_weight = witness.search(prep, from, to, node, direct);
            if witness_weight <= direct {
                continue;
            }

            shortcuts.push((from, to, direct));
        }
    }

    shortcuts
}

fn assemble(
    graph: &RoadGraph,
    prep: &PreparationGraph,
    levels: Vec<usize>,
) -> Result<ContractedGraph, RoutingError> {
    let mut contracted = ContractedGraph::new(levels);

    for edge in prep.edges() {
        let data = ChEdgeData::new(edge.weight, edge.direction, edge.contracted);
        contracted.add_edge(edge.start_node, edge.end_node, data, edge.origin);
    }

    contracted.validate()?;

    info!(
        nodes = contracted.node_count(),
        edges = graph.edge_count(),
        shortcuts = contracted.shortcut_count(),
        "finished contraction"
    );

    Ok(contracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_graph_utils::test_graph::{line_graph, square_graph, UniformWeighting};

    #[test]
    fn line_contraction_produces_nested_shortcuts() {
        let graph = line_graph();
        let weighting = UniformWeighting;

        // Contract the interior vertices first.
        let contracted =
            build_with_order(&graph, &weighting, &[1, 2, 3, 0, 4]).unwrap();

        assert_eq!(contracted.node_count(), 5);
        // One shortcut per interior contraction in each direction.
        assert!(contracted.shortcut_count() >= 3);
        contracted.validate().unwrap();
    }

    #[test]
    fn priority_driven_contraction_is_valid() {
        let graph = square_graph();
        let weighting = UniformWeighting;

        let contracted = build_contracted_graph(&graph, &weighting).unwrap();
        assert_eq!(contracted.node_count(), 4);

        // Levels form a permutation of the contraction order.
        let mut levels: Vec<usize> = (0..4).map(|n| contracted.level(n)).collect();
        levels.sort_unstable();
        assert_eq!(levels, vec![0, 1, 2, 3]);
    }
}
