//! Wire-level move vocabulary.
//!
//! Every variant carries all of its fields. An offer with no conditions is an
//! unconditional announcement of the sender's own colors.

use std::fmt;

use accord_consensus::{Coloring, ConditionSet};
use accord_topology::{Color, NodeId, ParticipantId};
use serde::{Deserialize, Serialize};

use crate::offer::OfferId;

/// A (node, color) pair as it travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeColor {
    pub node: NodeId,
    pub color: Color,
}

impl NodeColor {
    pub const fn new(node: NodeId, color: Color) -> Self {
        Self { node, color }
    }
}

/// Pairs in node order.
pub fn pairs<I>(iter: I) -> Vec<NodeColor>
where
    I: IntoIterator<Item = (NodeId, Color)>,
{
    let mut out: Vec<NodeColor> = iter
        .into_iter()
        .map(|(node, color)| NodeColor { node, color })
        .collect();
    out.sort();
    out
}

/// Why an offer was made or refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Reason {
    /// The offer lowers the sender's penalty.
    Improves,
    /// The offer does not lower the sender's penalty but it is still in conflict.
    Explores,
    /// Plain announcement of changed colors.
    StateUpdate,
    /// Accepting would leave the recipient worse off.
    PenaltyWouldRise { current: u32, resulting: u32 },
    /// A condition asks to recolor a fixed node.
    FixedNode { node: NodeId },
    /// A condition contradicts an agreement with someone else.
    PinnedElsewhere { node: NodeId },
}

/// A negotiation move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Move {
    Propose {
        node: NodeId,
        color: Color,
    },
    ConditionalOffer {
        id: OfferId,
        conditions: Vec<NodeColor>,
        commitments: Vec<NodeColor>,
        reasons: Vec<Reason>,
    },
    Accept {
        refers_to: OfferId,
    },
    Reject {
        refers_to: OfferId,
        reasons: Vec<Reason>,
    },
    Commit {
        node: NodeId,
        color: Color,
    },
}

impl Move {
    /// Stable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Propose { .. } => "propose",
            Self::ConditionalOffer { .. } => "conditional_offer",
            Self::Accept { .. } => "accept",
            Self::Reject { .. } => "reject",
            Self::Commit { .. } => "commit",
        }
    }

    /// Whether this is an offer without conditions.
    pub fn is_announcement(&self) -> bool {
        matches!(self, Self::ConditionalOffer { conditions, .. } if conditions.is_empty())
    }

    pub(crate) fn offer(
        id: OfferId,
        conditions: &ConditionSet,
        commitments: &Coloring,
        reasons: Vec<Reason>,
    ) -> Self {
        Self::ConditionalOffer {
            id,
            conditions: pairs(conditions.iter()),
            commitments: pairs(commitments.iter().map(|(n, c)| (*n, *c))),
            reasons,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Propose { node, color } => write!(f, "propose {node}={}", color.0),
            Self::ConditionalOffer {
                id,
                conditions,
                commitments,
                ..
            } => write!(
                f,
                "offer {id} ({} conditions, {} commitments)",
                conditions.len(),
                commitments.len()
            ),
            Self::Accept { refers_to } => write!(f, "accept {refers_to}"),
            Self::Reject { refers_to, .. } => write!(f, "reject {refers_to}"),
            Self::Commit { node, color } => write!(f, "commit {node}={}", color.0),
        }
    }
}

/// Out-of-band phase signals. Never negotiable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    /// Configure is over; start bargaining.
    AnnounceConfiguration,
    /// The sender gives up on this correspondence.
    Impossible,
}

/// What an envelope carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Move(Move),
    Control(Control),
}

/// A message between two participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: ParticipantId,
    pub to: ParticipantId,
    pub payload: Payload,
}

impl Envelope {
    pub fn new(from: ParticipantId, to: ParticipantId, mv: Move) -> Self {
        Self {
            from,
            to,
            payload: Payload::Move(mv),
        }
    }

    pub fn control(from: ParticipantId, to: ParticipantId, control: Control) -> Self {
        Self {
            from,
            to,
            payload: Payload::Control(control),
        }
    }
}
