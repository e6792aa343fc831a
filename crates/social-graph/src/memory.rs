//! In-memory graph store with adjacency indexes.

use social_types::{GraphDirection, GraphNode, GraphStore, GraphStoreError, NodeNeighborhood};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

type NodeKey = (String, i64);
/// node -> (relation, neighbor key).
type EdgeIndex = HashMap<NodeKey, BTreeSet<(String, i64)>>;

#[derive(Default)]
struct GraphState {
    nodes: HashMap<NodeKey, GraphNode>,
    /// from node -> outgoing (relation, to).
    out_index: EdgeIndex,
    /// to node -> incoming (relation, from).
    in_index: EdgeIndex,
}

impl GraphState {
    fn node_key(label: &str, key: i64) -> NodeKey {
        (label.to_string(), key)
    }

    fn add_edge_to_index(index: &mut EdgeIndex, node: NodeKey, relation: &str, other: i64) -> bool {
        index
            .entry(node)
            .or_default()
            .insert((relation.to_string(), other))
    }

    fn remove_edge_from_index(index: &mut EdgeIndex, node: &NodeKey, relation: &str, other: i64) -> bool {
        let Some(set) = index.get_mut(node) else {
            return false;
        };
        let removed = set.remove(&(relation.to_string(), other));
        if set.is_empty() {
            index.remove(node);
        }
        removed
    }

    /// Distinct neighbor keys of `node` along `relation`, ascending.
    fn neighbor_keys(&self, node: &NodeKey, relation: &str, direction: GraphDirection) -> BTreeSet<i64> {
        let mut keys = BTreeSet::new();
        let mut collect = |index: &EdgeIndex| {
            if let Some(set) = index.get(node) {
                keys.extend(set.iter().filter(|(r, _)| r == relation).map(|(_, k)| *k));
            }
        };
        match direction {
            GraphDirection::Outbound => collect(&self.out_index),
            GraphDirection::Inbound => collect(&self.in_index),
            GraphDirection::Both => {
                collect(&self.out_index);
                collect(&self.in_index);
            }
        }
        keys
    }

    fn resolve(&self, label: &str, keys: BTreeSet<i64>) -> Vec<GraphNode> {
        keys.into_iter()
            .filter_map(|k| self.nodes.get(&Self::node_key(label, k)).cloned())
            .collect()
    }

    fn sorted_nodes<'a>(&'a self, label: &'a str) -> Vec<&'a GraphNode> {
        let mut nodes: Vec<&GraphNode> = self.nodes.values().filter(|n| n.label == label).collect();
        nodes.sort_by_key(|n| n.key);
        nodes
    }
}

/// In-memory implementation of GraphStore.
///
/// All state sits behind a single lock: reads hold the read guard, writes the write guard, so a
/// merge's existence check and insert cannot interleave with another writer. Result lists are
/// ordered by key.
pub struct InMemoryGraphStore {
    state: Arc<RwLock<GraphState>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(GraphState::default())),
        }
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn merge_node(
        &self,
        label: &str,
        key: i64,
        properties: &HashMap<String, serde_json::Value>,
    ) -> Result<bool, GraphStoreError> {
        let mut guard = self.state.write().await;
        let node_key = GraphState::node_key(label, key);
        if guard.nodes.contains_key(&node_key) {
            return Ok(false);
        }
        guard.nodes.insert(
            node_key,
            GraphNode {
                label: label.to_string(),
                key,
                properties: properties.clone(),
            },
        );
        Ok(true)
    }

    async fn get_node(&self, label: &str, key: i64) -> Result<Option<GraphNode>, GraphStoreError> {
        let guard = self.state.read().await;
        Ok(guard.nodes.get(&GraphState::node_key(label, key)).cloned())
    }

    async fn list_nodes(&self, label: &str, limit: usize) -> Result<Vec<GraphNode>, GraphStoreError> {
        let guard = self.state.read().await;
        Ok(guard
            .sorted_nodes(label)
            .into_iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn search_nodes(
        &self,
        label: &str,
        property: &str,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<GraphNode>, GraphStoreError> {
        let needle = needle.to_lowercase();
        let guard = self.state.read().await;
        Ok(guard
            .sorted_nodes(label)
            .into_iter()
            .filter(|n| {
                n.str_property(property)
                    .map(|v| v.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn merge_edge(
        &self,
        label: &str,
        from: i64,
        to: i64,
        relation: &str,
    ) -> Result<bool, GraphStoreError> {
        let mut guard = self.state.write().await;
        let from_key = GraphState::node_key(label, from);
        let to_key = GraphState::node_key(label, to);
        for (k, id) in [(&from_key, from), (&to_key, to)] {
            if !guard.nodes.contains_key(k) {
                return Err(GraphStoreError::NodeNotFound {
                    label: label.to_string(),
                    key: id,
                });
            }
        }
        let state = &mut *guard;
        let created = GraphState::add_edge_to_index(&mut state.out_index, from_key, relation, to);
        GraphState::add_edge_to_index(&mut state.in_index, to_key, relation, from);
        Ok(created)
    }

    async fn delete_edge(
        &self,
        label: &str,
        from: i64,
        to: i64,
        relation: &str,
    ) -> Result<bool, GraphStoreError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let removed = GraphState::remove_edge_from_index(
            &mut state.out_index,
            &GraphState::node_key(label, from),
            relation,
            to,
        );
        GraphState::remove_edge_from_index(
            &mut state.in_index,
            &GraphState::node_key(label, to),
            relation,
            from,
        );
        Ok(removed)
    }

    async fn get_neighbors(
        &self,
        label: &str,
        key: i64,
        relation: &str,
        direction: GraphDirection,
    ) -> Result<Vec<GraphNode>, GraphStoreError> {
        let guard = self.state.read().await;
        let keys = guard.neighbor_keys(&GraphState::node_key(label, key), relation, direction);
        Ok(guard.resolve(label, keys))
    }

    async fn get_neighborhood(
        &self,
        label: &str,
        key: i64,
        relation: &str,
    ) -> Result<Option<NodeNeighborhood>, GraphStoreError> {
        let guard = self.state.read().await;
        let node_key = GraphState::node_key(label, key);
        let Some(node) = guard.nodes.get(&node_key).cloned() else {
            return Ok(None);
        };
        let inbound = guard.neighbor_keys(&node_key, relation, GraphDirection::Inbound);
        let outbound = guard.neighbor_keys(&node_key, relation, GraphDirection::Outbound);
        Ok(Some(NodeNeighborhood {
            node,
            inbound: guard.resolve(label, inbound),
            outbound: guard.resolve(label, outbound),
        }))
    }

    async fn ping(&self) -> Result<(), GraphStoreError> {
        Ok(())
    }
}
