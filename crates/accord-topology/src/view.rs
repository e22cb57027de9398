//! A participant's restricted view of the graph.
//!
//! A [`LocalView`] contains only what one participant may know: its own
//! nodes, the edges touching them, and the foreign nodes on the other end of
//! those edges (its boundary). Nothing about other participants' internal
//! nodes is reachable from here.
//!
//! # Ownership-tagged references
//!
//! [`OwnNode`] and [`ForeignNode`] carry the node's owner and can only be
//! minted by a view. A table that must only ever contain the holder's own
//! nodes is keyed by `OwnNode`, so recording a counterpart's node there is a
//! type error rather than a runtime surprise.

use std::collections::BTreeMap;
use std::fmt;

use crate::color::{Color, Domain};
use crate::graph::{Edge, Graph, NodeId, ParticipantId};

/// A node owned by the view's holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnNode {
    id: NodeId,
    owner: ParticipantId,
}

impl OwnNode {
    #[inline]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub const fn owner(&self) -> ParticipantId {
        self.owner
    }
}

impl fmt::Display for OwnNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.owner)
    }
}

/// A boundary node owned by someone other than the view's holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForeignNode {
    id: NodeId,
    owner: ParticipantId,
}

impl ForeignNode {
    #[inline]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub const fn owner(&self) -> ParticipantId {
        self.owner
    }
}

impl fmt::Display for ForeignNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.owner)
    }
}

/// Everything one participant is allowed to see.
#[derive(Debug, Clone)]
pub struct LocalView {
    holder: ParticipantId,
    domain: Domain,
    own: Vec<OwnNode>,
    fixed: BTreeMap<NodeId, Color>,
    edges: Vec<Edge>,
    boundary: BTreeMap<NodeId, ParticipantId>,
    names: BTreeMap<NodeId, String>,
}

impl LocalView {
    pub(crate) fn build(graph: &Graph, holder: ParticipantId) -> Self {
        let mut own = Vec::new();
        let mut fixed = BTreeMap::new();
        let mut names = BTreeMap::new();
        let mut boundary = BTreeMap::new();

        for node in graph.nodes_of(holder) {
            own.push(OwnNode {
                id: node.id,
                owner: holder,
            });
            if let Some(color) = node.fixed {
                fixed.insert(node.id, color);
            }
            names.insert(node.id, node.name.clone());
        }

        let edges: Vec<Edge> = graph
            .edges()
            .iter()
            .filter(|e| {
                graph.owner(e.a) == Some(holder) || graph.owner(e.b) == Some(holder)
            })
            .copied()
            .collect();

        for edge in &edges {
            for end in [edge.a, edge.b] {
                if let Some(node) = graph.node(end) {
                    if node.owner != holder {
                        boundary.insert(end, node.owner);
                        names.insert(end, node.name.clone());
                    }
                }
            }
        }

        Self {
            holder,
            domain: graph.domain().clone(),
            own,
            fixed,
            edges,
            boundary,
            names,
        }
    }

    /// The participant this view belongs to.
    pub fn holder(&self) -> ParticipantId {
        self.holder
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Own nodes in id order.
    pub fn own_nodes(&self) -> &[OwnNode] {
        &self.own
    }

    /// Own nodes without a construction-time color, in id order.
    pub fn free_nodes(&self) -> impl Iterator<Item = OwnNode> + '_ {
        self.own
            .iter()
            .copied()
            .filter(|n| !self.fixed.contains_key(&n.id))
    }

    /// Construction-time colors of own fixed nodes.
    pub fn fixed_colors(&self) -> &BTreeMap<NodeId, Color> {
        &self.fixed
    }

    /// Whether an own node is fixed.
    pub fn is_fixed(&self, node: NodeId) -> bool {
        self.fixed.contains_key(&node)
    }

    /// Edges touching at least one own node, sorted.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Tag `node` as own, if the holder owns it.
    pub fn own(&self, node: NodeId) -> Option<OwnNode> {
        self.own
            .binary_search_by_key(&node, |n| n.id)
            .ok()
            .map(|i| self.own[i])
    }

    /// Tag `node` as foreign, if it is on the holder's boundary.
    pub fn foreign(&self, node: NodeId) -> Option<ForeignNode> {
        self.boundary
            .get(&node)
            .map(|&owner| ForeignNode { id: node, owner })
    }

    /// All boundary nodes in id order.
    pub fn boundary(&self) -> impl Iterator<Item = ForeignNode> + '_ {
        self.boundary
            .iter()
            .map(|(&id, &owner)| ForeignNode { id, owner })
    }

    /// Participants that own at least one boundary node, in id order.
    pub fn counterparts(&self) -> Vec<ParticipantId> {
        let mut out: Vec<_> = self.boundary.values().copied().collect();
        out.sort();
        out.dedup();
        out
    }

    /// `recipient`'s nodes adjacent to the holder (`B_r`), in id order.
    pub fn boundary_of(&self, recipient: ParticipantId) -> Vec<ForeignNode> {
        self.boundary()
            .filter(|n| n.owner == recipient)
            .collect()
    }

    /// The holder's nodes adjacent to `recipient` (`B_o`), in id order.
    pub fn own_boundary_toward(&self, recipient: ParticipantId) -> Vec<OwnNode> {
        self.own
            .iter()
            .copied()
            .filter(|n| {
                self.edges.iter().any(|e| {
                    e.other(n.id)
                        .and_then(|o| self.boundary.get(&o))
                        .is_some_and(|&owner| owner == recipient)
                })
            })
            .collect()
    }

    /// Name of an own or boundary node.
    pub fn name(&self, node: NodeId) -> &str {
        self.names.get(&node).map(String::as_str).unwrap_or("?")
    }
}
