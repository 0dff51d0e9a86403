use std::collections::BinaryHeap;

use fxhash::FxHashMap;

use crate::{graph::GraphEdge, profile::Weight, search::HeapItem, types::NodeId};

use super::preparation::PreparationGraph;

/// Witness searches give up after settling this many vertices; an
/// unconfirmed witness only costs a redundant shortcut.
const MAX_SETTLED_NODES: usize = 200;

struct WitnessEntry {
    weight: Weight,
    settled: bool,
}

/// A bounded Dijkstra over the preparation graph that checks whether a
/// path from `from` to `to` no more expensive than a candidate shortcut
/// exists without passing through the vertex being contracted.
pub(crate) struct WitnessSearch {
    heap: BinaryHeap<HeapItem>,
    data: FxHashMap<NodeId, WitnessEntry>,
}

impl WitnessSearch {
    pub fn new() -> Self {
        WitnessSearch {
            heap: BinaryHeap::default(),
            data: FxHashMap::default(),
        }
    }

    /// The cheapest `from -> to` weight not exceeding `max_weight`,
    /// avoiding `avoid`; infinity when the bounded search found none.
    pub fn search(
        &mut self,
        graph: &PreparationGraph,
        from: NodeId,
        to: NodeId,
        avoid: NodeId,
        max_weight: Weight,
    ) -> Weight {
        self.heap.clear();
        self.data.clear();

        self.heap.push(HeapItem {
            node_id: from,
            weight: 0.0,
        });
        self.data.insert(
            from,
            WitnessEntry {
                weight: 0.0,
                settled: false,
            },
        );

        let mut settled_nodes = 0;

        while let Some(HeapItem { node_id, weight }) = self.heap.pop() {
            if weight > max_weight || settled_nodes >= MAX_SETTLED_NODES {
                break;
            }

            {
                let entry = &self.data[&node_id];
                if entry.settled || weight > entry.weight {
                    continue;
                }
            }

            for &edge_id in graph.node_edges(node_id) {
                let edge = graph.edge(edge_id);
                let adj = edge.adj_node(node_id);

                if adj == avoid || graph.is_contracted(adj) || !edge.allows_from(node_id) {
                    continue;
                }
                if self.data.get(&adj).is_some_and(|entry| entry.settled) {
                    continue;
                }

                let next_weight = weight + edge.weight;
                let entry = self.data.entry(adj).or_insert(WitnessEntry {
                    weight: Weight::INFINITY,
                    settled: false,
                });
                if next_weight < entry.weight {
                    entry.weight = next_weight;
                    self.heap.push(HeapItem {
                        node_id: adj,
                        weight: next_weight,
                    });
                }
            }

            self.data.get_mut(&node_id).unwrap().settled = true;
            settled_nodes += 1;

            if node_id == to {
                break;
            }
        }

        self.data
            .get(&to)
            .map_or(Weight::INFINITY, |entry| entry.weight)
    }
}
