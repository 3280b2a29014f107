//! Explicit topology of the analysis graph.
//!
//! Nodes carry a typed role and edges are recorded in connection order, so
//! every rewiring ("disconnect old source, connect new") is an inspectable
//! state transition. Processing state lives in the context, not here.

use std::collections::BTreeMap;
use std::fmt;

use super::filter::FilterKind;
use crate::error::GraphError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Source,
    Filter(FilterKind),
    Analyser,
    Gain,
    Destination,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Source => write!(f, "source"),
            NodeRole::Filter(kind) => write!(f, "{} filter", kind),
            NodeRole::Analyser => write!(f, "analyser"),
            NodeRole::Gain => write!(f, "gain"),
            NodeRole::Destination => write!(f, "destination"),
        }
    }
}

#[derive(Debug, Default)]
pub struct AudioGraph {
    next_id: u32,
    nodes: BTreeMap<NodeId, NodeRole>,
    edges: Vec<(NodeId, NodeId)>,
}

impl AudioGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, role: NodeRole) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, role);
        id
    }

    /// Remove a node together with every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<NodeRole, GraphError> {
        let role = self.nodes.remove(&id).ok_or(GraphError::UnknownNode(id))?;
        self.edges.retain(|&(from, to)| from != id && to != id);
        Ok(role)
    }

    pub fn role(&self, id: NodeId) -> Option<NodeRole> {
        self.nodes.get(&id).copied()
    }

    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        let from_role = self.role(from).ok_or(GraphError::UnknownNode(from))?;
        let to_role = self.role(to).ok_or(GraphError::UnknownNode(to))?;

        if from == to || from_role == NodeRole::Destination || to_role == NodeRole::Source {
            return Err(GraphError::InvalidEdge { from, from_role, to, to_role });
        }
        if self.edges.contains(&(from, to)) {
            return Ok(());
        }
        if self.reaches(to, from) {
            return Err(GraphError::Cycle { from, to });
        }

        self.edges.push((from, to));
        Ok(())
    }

    /// Drop every outgoing edge of `id`. Returns how many were removed.
    pub fn disconnect(&mut self, id: NodeId) -> usize {
        let before = self.edges.len();
        self.edges.retain(|&(from, _)| from != id);
        before - self.edges.len()
    }

    pub fn successors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.edges
            .iter()
            .filter(move |&&(from, _)| from == id)
            .map(|&(_, to)| to)
    }

    pub fn nodes_with_role(&self, role: NodeRole) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, &r)| r == role)
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }

    /// Edge list expressed by role, in connection order.
    pub fn topology(&self) -> Vec<(NodeRole, NodeRole)> {
        self.edges
            .iter()
            .filter_map(|&(from, to)| Some((self.role(from)?, self.role(to)?)))
            .collect()
    }

    /// Whether audio entering `start` can reach `target`.
    pub fn reaches(&self, start: NodeId, target: NodeId) -> bool {
        let mut stack = vec![start];
        let mut seen = Vec::new();
        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if seen.contains(&node) {
                continue;
            }
            seen.push(node);
            stack.extend(self.successors(node));
        }
        false
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> (AudioGraph, NodeId, NodeId, NodeId, NodeId) {
        let mut graph = AudioGraph::new();
        let source = graph.add_node(NodeRole::Source);
        let analyser = graph.add_node(NodeRole::Analyser);
        let gain = graph.add_node(NodeRole::Gain);
        let destination = graph.add_node(NodeRole::Destination);
        graph.connect(source, analyser).unwrap();
        graph.connect(analyser, gain).unwrap();
        graph.connect(gain, destination).unwrap();
        (graph, source, analyser, gain, destination)
    }

    #[test]
    fn test_topology_records_connection_order() {
        let (graph, ..) = chain();
        assert_eq!(
            graph.topology(),
            vec![
                (NodeRole::Source, NodeRole::Analyser),
                (NodeRole::Analyser, NodeRole::Gain),
                (NodeRole::Gain, NodeRole::Destination),
            ]
        );
    }

    #[test]
    fn test_rejects_invalid_edges() {
        let (mut graph, source, analyser, _, destination) = chain();
        assert!(matches!(
            graph.connect(destination, analyser),
            Err(GraphError::InvalidEdge { .. })
        ));
        assert!(matches!(
            graph.connect(analyser, source),
            Err(GraphError::InvalidEdge { .. })
        ));
        assert!(matches!(
            graph.connect(analyser, analyser),
            Err(GraphError::InvalidEdge { .. })
        ));
    }

    #[test]
    fn test_rejects_cycles() {
        let (mut graph, _, analyser, gain, _) = chain();
        assert_eq!(
            graph.connect(gain, analyser),
            Err(GraphError::Cycle { from: gain, to: analyser })
        );
    }

    #[test]
    fn test_duplicate_connect_is_noop() {
        let (mut graph, source, analyser, ..) = chain();
        graph.connect(source, analyser).unwrap();
        assert_eq!(graph.edges().len(), 3);
    }

    #[test]
    fn test_remove_node_drops_edges() {
        let (mut graph, source, analyser, _, destination) = chain();
        assert_eq!(graph.remove_node(source), Ok(NodeRole::Source));
        assert_eq!(graph.edges().len(), 2);
        assert!(graph.reaches(analyser, destination));
        assert_eq!(graph.remove_node(source), Err(GraphError::UnknownNode(source)));
    }

    #[test]
    fn test_disconnect_removes_outgoing_only() {
        let (mut graph, source, analyser, gain, _) = chain();
        assert_eq!(graph.disconnect(analyser), 1);
        assert!(graph.reaches(source, analyser));
        assert!(!graph.reaches(source, gain));
    }
}
