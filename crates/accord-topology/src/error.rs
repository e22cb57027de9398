//! Error types for graph construction.

use thiserror::Error;

/// Result type for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Construction-time invariant violations.
///
/// These are programming or configuration defects: a graph that fails any
/// of these checks is never built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// The color domain has no values.
    #[error("color domain is empty")]
    EmptyDomain,

    /// More colors than a `Color` index can address.
    #[error("color domain has {0} values, at most 255 are supported")]
    DomainTooLarge(usize),

    /// The same color name appears twice.
    #[error("color {0:?} declared twice")]
    DuplicateColor(String),

    /// A color name is not part of the domain.
    #[error("unknown color {0:?}")]
    UnknownColor(String),

    /// Two participants share a name.
    #[error("participant {0:?} declared twice")]
    DuplicateParticipant(String),

    /// A referenced participant does not exist.
    #[error("unknown participant {0:?}")]
    UnknownParticipant(String),

    /// A node was declared twice, possibly under two owners.
    #[error("node {node:?} already owned by {owner:?}")]
    PartitionOverlap { node: String, owner: String },

    /// A referenced node does not exist.
    #[error("unknown node {0:?}")]
    UnknownNode(String),

    /// An edge connects a node to itself.
    #[error("edge from {0:?} to itself")]
    SelfLoop(String),
}
