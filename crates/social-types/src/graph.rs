//! Node/edge model of the backing graph store.

use std::collections::HashMap;

/// A labeled node. `key` is the identity property; other properties are free-form JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub label: String,
    pub key: i64,
    pub properties: HashMap<String, serde_json::Value>,
}

impl GraphNode {
    pub fn str_property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(|v| v.as_str())
    }
}

/// Direction of a one-hop traversal, relative to the starting node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphDirection {
    /// Edges leaving the node (`node -> other`).
    Outbound,
    /// Edges entering the node (`other -> node`).
    Inbound,
    Both,
}

/// One-hop expansion of a node along a single relation, read in one session.
/// Each side holds distinct nodes.
#[derive(Debug, Clone)]
pub struct NodeNeighborhood {
    pub node: GraphNode,
    pub inbound: Vec<GraphNode>,
    pub outbound: Vec<GraphNode>,
}
