//! Accord Topology
//!
//! The shared constraint graph that participants negotiate a coloring over.
//!
//! # Model
//!
//! - Every node is owned by exactly one participant. Partitions are disjoint
//!   and cover the graph; this is checked when the graph is built.
//! - Every edge is a "must differ" constraint. An edge whose endpoints have
//!   different owners is a *boundary edge*.
//! - Fixed nodes get their color at construction and never change.
//!
//! # Views
//!
//! Participants never see the whole [`Graph`]. Each works from a
//! [`LocalView`]: its own nodes, the edges touching them, and the boundary
//! nodes at the far end of those edges. Node references handed out by a
//! view are ownership-tagged ([`OwnNode`], [`ForeignNode`]).

mod color;
mod error;
mod graph;
mod spec;
mod view;

pub use color::{Color, Domain, MAX_COLORS};
pub use error::{Result, TopologyError};
pub use graph::{Edge, Graph, GraphBuilder, Node, NodeId, Participant, ParticipantId};
pub use spec::{GraphSpec, NodeSpec, ParticipantSpec};
pub use view::{ForeignNode, LocalView, OwnNode};
