//! Error types for accord-protocols.
//!
//! [`Error`] covers invariant violations: programming defects that must fail
//! fast. [`Anomaly`] covers protocol-level oddities from a counterpart (stale
//! ids, duplicate or misaddressed messages); those are logged and ignored.

use accord_topology::{Color, NodeId, ParticipantId, TopologyError};
use thiserror::Error;

use crate::offer::{OfferId, OfferStatus};

/// Result type for accord-protocols operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The graph or view could not be built.
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    /// A node that must be owned by the holder is not.
    #[error("node {node} is not owned by {holder}")]
    NotOwned { node: NodeId, holder: ParticipantId },

    /// A fixed node was targeted for mutation.
    #[error("node {0} is fixed and cannot be recolored")]
    FixedNode(NodeId),

    /// A color outside the domain.
    #[error("color {0:?} is not in the domain")]
    UnknownColor(Color),

    /// `step` was asked about a participant that shares no boundary with the holder.
    #[error("{0} is not a counterpart")]
    UnknownCounterpart(ParticipantId),

    /// The holder's own ledger refused an update it produced itself.
    #[error("ledger update failed: {0}")]
    Ledger(Anomaly),

    /// An environment override could not be parsed.
    #[error("invalid configuration {key}={value}")]
    InvalidConfig { key: &'static str, value: String },
}

/// A message that was received but could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Anomaly {
    #[error("envelope addressed to {0}")]
    Misaddressed(ParticipantId),

    #[error("{0} shares no boundary with us")]
    UnknownSender(ParticipantId),

    #[error("{0} has aborted")]
    Aborted(ParticipantId),

    #[error("already bargaining")]
    AlreadyBargaining,

    #[error("unknown offer {0}")]
    UnknownOffer(OfferId),

    #[error("offer {0} was not sent by us to this correspondent")]
    NotOurOffer(OfferId),

    #[error("offer {id} is already {status}")]
    Terminal { id: OfferId, status: OfferStatus },

    #[error("offer {0} was already received")]
    DuplicateOffer(OfferId),

    #[error("offer id {id} does not belong to {sender}")]
    ForgedId { id: OfferId, sender: ParticipantId },

    #[error("{node} is not owned by {expected}")]
    WrongOwner { node: NodeId, expected: ParticipantId },

    #[error("color {0:?} is not in the domain")]
    UnknownColor(Color),
}
