//! The shared constraint graph and its partition among participants.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color::{Color, Domain};
use crate::error::{Result, TopologyError};
use crate::view::LocalView;

/// A participant (partition owner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// A node in the constraint graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A node with its owner and optional fixed color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub owner: ParticipantId,
    /// Set once at construction; a fixed node never changes color.
    pub fixed: Option<Color>,
}

impl Node {
    /// Whether this node's color is set at construction.
    pub fn is_fixed(&self) -> bool {
        self.fixed.is_some()
    }
}

/// An unordered "must differ" constraint. Endpoints are stored low-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub a: NodeId,
    pub b: NodeId,
}

impl Edge {
    /// Create a normalized edge.
    pub fn new(x: NodeId, y: NodeId) -> Self {
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }

    /// Whether the edge touches `node`.
    pub fn touches(&self, node: NodeId) -> bool {
        self.a == node || self.b == node
    }

    /// The endpoint opposite `node`, if the edge touches it.
    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if self.a == node {
            Some(self.b)
        } else if self.b == node {
            Some(self.a)
        } else {
            None
        }
    }
}

/// A participant entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
}

/// The whole graph. Only the orchestrator holds one; participants work from
/// a [`LocalView`].
#[derive(Debug, Clone)]
pub struct Graph {
    domain: Domain,
    participants: Vec<Participant>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    adjacency: Vec<Vec<NodeId>>,
}

impl Graph {
    /// Start building a graph over `domain`.
    pub fn builder(domain: Domain) -> GraphBuilder {
        GraphBuilder::new(domain)
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    /// Look up a node id by name.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.name == name).map(|n| n.id)
    }

    /// Look up a participant id by name.
    pub fn participant_id(&self, name: &str) -> Option<ParticipantId> {
        self.participants
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.id)
    }

    /// Name of a participant.
    pub fn participant_name(&self, id: ParticipantId) -> Option<&str> {
        self.participants
            .get(id.0 as usize)
            .map(|p| p.name.as_str())
    }

    /// Owner of a node.
    pub fn owner(&self, id: NodeId) -> Option<ParticipantId> {
        self.node(id).map(|n| n.owner)
    }

    /// Neighbors of a node.
    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        self.adjacency
            .get(id.0 as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Nodes owned by `participant`, in id order.
    pub fn nodes_of(&self, participant: ParticipantId) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.owner == participant)
    }

    /// Edges whose endpoints have different owners.
    pub fn boundary_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(move |e| self.owner(e.a) != self.owner(e.b))
    }

    /// Count edges whose endpoints share a color under a complete coloring.
    pub fn conflicts(&self, coloring: &BTreeMap<NodeId, Color>) -> usize {
        self.edges
            .iter()
            .filter(|e| match (coloring.get(&e.a), coloring.get(&e.b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            })
            .count()
    }

    /// The restricted view one participant negotiates from.
    pub fn view(&self, participant: ParticipantId) -> Result<LocalView> {
        if participant.0 as usize >= self.participants.len() {
            return Err(TopologyError::UnknownParticipant(participant.to_string()));
        }
        Ok(LocalView::build(self, participant))
    }
}

/// Incremental, validating graph construction.
#[derive(Debug)]
pub struct GraphBuilder {
    domain: Domain,
    participants: Vec<Participant>,
    nodes: Vec<Node>,
    edges: BTreeSet<Edge>,
}

impl GraphBuilder {
    fn new(domain: Domain) -> Self {
        Self {
            domain,
            participants: Vec::new(),
            nodes: Vec::new(),
            edges: BTreeSet::new(),
        }
    }

    /// Register a participant.
    pub fn participant(&mut self, name: &str) -> Result<ParticipantId> {
        if self.participants.iter().any(|p| p.name == name) {
            return Err(TopologyError::DuplicateParticipant(name.to_string()));
        }
        let id = ParticipantId(self.participants.len() as u32);
        self.participants.push(Participant {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    /// Add a free node owned by `owner`.
    pub fn node(&mut self, name: &str, owner: ParticipantId) -> Result<NodeId> {
        self.insert_node(name, owner, None)
    }

    /// Add a node whose color is fixed at construction.
    pub fn fixed_node(&mut self, name: &str, owner: ParticipantId, color: Color) -> Result<NodeId> {
        if !self.domain.contains(color) {
            return Err(TopologyError::UnknownColor(format!("#{}", color.0)));
        }
        self.insert_node(name, owner, Some(color))
    }

    fn insert_node(&mut self, name: &str, owner: ParticipantId, fixed: Option<Color>) -> Result<NodeId> {
        if owner.0 as usize >= self.participants.len() {
            return Err(TopologyError::UnknownParticipant(owner.to_string()));
        }
        if let Some(existing) = self.nodes.iter().find(|n| n.name == name) {
            return Err(TopologyError::PartitionOverlap {
                node: name.to_string(),
                owner: self.participants[existing.owner.0 as usize].name.clone(),
            });
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            name: name.to_string(),
            owner,
            fixed,
        });
        Ok(id)
    }

    /// Add a "must differ" edge between two existing nodes.
    pub fn edge(&mut self, x: NodeId, y: NodeId) -> Result<()> {
        for id in [x, y] {
            if id.0 as usize >= self.nodes.len() {
                return Err(TopologyError::UnknownNode(id.to_string()));
            }
        }
        if x == y {
            return Err(TopologyError::SelfLoop(self.nodes[x.0 as usize].name.clone()));
        }
        self.edges.insert(Edge::new(x, y));
        Ok(())
    }

    /// Add an edge by node names.
    pub fn edge_by_name(&mut self, x: &str, y: &str) -> Result<()> {
        let lookup = |name: &str| {
            self.nodes
                .iter()
                .find(|n| n.name == name)
                .map(|n| n.id)
                .ok_or_else(|| TopologyError::UnknownNode(name.to_string()))
        };
        let (x, y) = (lookup(x)?, lookup(y)?);
        self.edge(x, y)
    }

    /// Finish construction.
    pub fn build(self) -> Graph {
        let mut adjacency = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            adjacency[edge.a.0 as usize].push(edge.b);
            adjacency[edge.b.0 as usize].push(edge.a);
        }
        for list in &mut adjacency {
            list.sort();
        }
        Graph {
            domain: self.domain,
            participants: self.participants,
            nodes: self.nodes,
            edges: self.edges.into_iter().collect(),
            adjacency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_party() -> Graph {
        let domain = Domain::rgb();
        let red = domain.parse("Red").unwrap();
        let mut b = Graph::builder(domain);
        let alice = b.participant("alice").unwrap();
        let bob = b.participant("bob").unwrap();
        let a1 = b.fixed_node("a1", alice, red).unwrap();
        let a2 = b.node("a2", alice).unwrap();
        let b1 = b.node("b1", bob).unwrap();
        b.edge(a1, a2).unwrap();
        b.edge(a2, b1).unwrap();
        b.edge(b1, a2).unwrap();
        b.build()
    }

    #[test]
    fn edges_are_normalized_and_deduplicated() {
        let graph = two_party();
        assert_eq!(graph.edges().len(), 2);
        assert_eq!(Edge::new(NodeId(5), NodeId(1)), Edge::new(NodeId(1), NodeId(5)));
    }

    #[test]
    fn boundary_edges_cross_owners() {
        let graph = two_party();
        let boundary: Vec<_> = graph.boundary_edges().collect();
        assert_eq!(boundary.len(), 1);
        let a2 = graph.node_id("a2").unwrap();
        let b1 = graph.node_id("b1").unwrap();
        assert_eq!(*boundary[0], Edge::new(a2, b1));
    }

    #[test]
    fn overlap_is_rejected() {
        let mut b = Graph::builder(Domain::rgb());
        let alice = b.participant("alice").unwrap();
        let bob = b.participant("bob").unwrap();
        b.node("x", alice).unwrap();
        let err = b.node("x", bob).unwrap_err();
        assert_eq!(
            err,
            TopologyError::PartitionOverlap {
                node: "x".into(),
                owner: "alice".into()
            }
        );
    }

    #[test]
    fn self_loops_and_unknown_nodes_rejected() {
        let mut b = Graph::builder(Domain::rgb());
        let alice = b.participant("alice").unwrap();
        let x = b.node("x", alice).unwrap();
        assert!(matches!(b.edge(x, x), Err(TopologyError::SelfLoop(_))));
        assert!(matches!(
            b.edge_by_name("x", "nope"),
            Err(TopologyError::UnknownNode(_))
        ));
        assert!(matches!(
            b.node("y", ParticipantId(7)),
            Err(TopologyError::UnknownParticipant(_))
        ));
    }

    #[test]
    fn conflicts_count_equal_endpoints() {
        let graph = two_party();
        let red = graph.domain().parse("Red").unwrap();
        let green = graph.domain().parse("Green").unwrap();
        let coloring: BTreeMap<_, _> = [
            (graph.node_id("a1").unwrap(), red),
            (graph.node_id("a2").unwrap(), red),
            (graph.node_id("b1").unwrap(), green),
        ]
        .into_iter()
        .collect();
        assert_eq!(graph.conflicts(&coloring), 1);
    }
}
