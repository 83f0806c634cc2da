//! Directed attributed graph of model entities.
//!
//! Nodes are keyed by [`NodeKey`] and carry a [`NodeRecord`]; edges carry an
//! [`EdgeRecord`] whose `type` is the field name or inverse role that produced
//! them. Storage is a petgraph `DiGraph` plus a key index, so iteration follows
//! insertion order.

pub mod describe;
pub mod edgelist;
pub mod identity;
pub mod materialize;
pub mod policy;

pub use describe::describe;
pub use identity::{IdAllocator, IdentityResolver, SequentialAllocator, UuidAllocator};
pub use materialize::{build_graph, BuildOptions, BuildStats, GraphMaterializer};
pub use policy::ExclusionPolicy;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{IfcGraphError, Result};

/// Node identifier: the entity's native id, or a surrogate for entities
/// that have none.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeKey {
    Native(u64),
    Surrogate(String),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Native(id) => write!(f, "{}", id),
            NodeKey::Surrogate(s) => f.write_str(s),
        }
    }
}

impl FromStr for NodeKey {
    type Err = IfcGraphError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(IfcGraphError::Parse(format!("invalid node key {:?}", s)));
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            s.parse::<u64>()
                .map(NodeKey::Native)
                .map_err(|e| IfcGraphError::Parse(format!("invalid node key {:?}: {}", s, e)))
        } else {
            Ok(NodeKey::Surrogate(s.to_string()))
        }
    }
}

/// Attribute record of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeKey,
    /// Concrete type name
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Simple field values keyed by field name, in declaration order
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl NodeRecord {
    /// A node known only by its key (edge lists without node lines)
    pub fn bare(id: NodeKey) -> Self {
        Self {
            id,
            name: String::new(),
            labels: Vec::new(),
            attributes: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeRecord {
    #[serde(rename = "type")]
    pub kind: String,
}

/// The graph built from one model.
#[derive(Debug, Clone, Default)]
pub struct IfcGraph {
    graph: DiGraph<NodeRecord, EdgeRecord>,
    index: HashMap<NodeKey, NodeIndex>,
    edge_set: HashSet<(NodeIndex, NodeIndex, String)>,
}

impl IfcGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node unless its key is already present.
    ///
    /// Returns `false` when the key exists; the stored record is left as it was.
    pub fn add_node(&mut self, record: NodeRecord) -> bool {
        if self.index.contains_key(&record.id) {
            return false;
        }
        let key = record.id.clone();
        let idx = self.graph.add_node(record);
        self.index.insert(key, idx);
        true
    }

    /// Insert a directed edge between two existing nodes.
    ///
    /// Returns `false` when the same `(source, target, kind)` edge already exists.
    pub fn add_edge(&mut self, source: &NodeKey, target: &NodeKey, kind: &str) -> Result<bool> {
        let from = self.node_index(source)?;
        let to = self.node_index(target)?;
        if !self.edge_set.insert((from, to, kind.to_string())) {
            return Ok(false);
        }
        self.graph.add_edge(
            from,
            to,
            EdgeRecord {
                kind: kind.to_string(),
            },
        );
        Ok(true)
    }

    fn node_index(&self, key: &NodeKey) -> Result<NodeIndex> {
        self.index
            .get(key)
            .copied()
            .ok_or_else(|| IfcGraphError::InvalidInput(format!("no node with id {}", key)))
    }

    pub fn node(&self, key: &NodeKey) -> Option<&NodeRecord> {
        self.index.get(key).and_then(|idx| self.graph.node_weight(*idx))
    }

    pub fn contains_node(&self, key: &NodeKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn contains_edge(&self, source: &NodeKey, target: &NodeKey, kind: &str) -> bool {
        match (self.index.get(source), self.index.get(target)) {
            (Some(from), Some(to)) => self.edge_set.contains(&(*from, *to, kind.to_string())),
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.graph.node_weights()
    }

    /// Edges as `(source, target, record)` in insertion order
    pub fn edges(&self) -> impl Iterator<Item = (&NodeKey, &NodeKey, &EdgeRecord)> {
        self.graph
            .edge_references()
            .map(|e| (&self.graph[e.source()].id, &self.graph[e.target()].id, e.weight()))
    }

    /// Outgoing edges of `key` as `(target, record)` in insertion order
    pub fn edges_from(&self, key: &NodeKey) -> Vec<(&NodeKey, &EdgeRecord)> {
        let Some(idx) = self.index.get(key) else {
            return Vec::new();
        };
        // petgraph walks outgoing adjacency newest first
        let mut out: Vec<(EdgeIndex, &NodeKey, &EdgeRecord)> = self
            .graph
            .edges_directed(*idx, Direction::Outgoing)
            .map(|e| (e.id(), &self.graph[e.target()].id, e.weight()))
            .collect();
        out.sort_by_key(|(edge, _, _)| *edge);
        out.into_iter().map(|(_, target, record)| (target, record)).collect()
    }

    /// Incoming edges of `key` as `(source, record)` in insertion order
    pub fn edges_to(&self, key: &NodeKey) -> Vec<(&NodeKey, &EdgeRecord)> {
        let Some(idx) = self.index.get(key) else {
            return Vec::new();
        };
        let mut out: Vec<(EdgeIndex, &NodeKey, &EdgeRecord)> = self
            .graph
            .edges_directed(*idx, Direction::Incoming)
            .map(|e| (e.id(), &self.graph[e.source()].id, e.weight()))
            .collect();
        out.sort_by_key(|(edge, _, _)| *edge);
        out.into_iter().map(|(_, source, record)| (source, record)).collect()
    }
}
