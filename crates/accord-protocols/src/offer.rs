//! Offers and their lifecycle.
//!
//! An offer moves from `Pending` to exactly one terminal status and then
//! stays there. Offers are never removed from the [`OfferLedger`]; terminal
//! records are the bargaining audit trail.

use std::collections::BTreeMap;
use std::fmt;

use accord_consensus::{Coloring, ConditionSet};
use accord_topology::ParticipantId;
use serde::{Deserialize, Serialize};

use crate::error::Anomaly;
use crate::moves::Reason;

/// Offer identity: the sender plus a per-sender sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OfferId {
    pub sender: ParticipantId,
    pub seq: u32,
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.sender, self.seq)
    }
}

/// Lifecycle status of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    /// Withdrawn by a newer offer from the same sender to the same recipient.
    Superseded,
}

impl OfferStatus {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Accepted => write!(f, "Accepted"),
            Self::Rejected => write!(f, "Rejected"),
            Self::Superseded => write!(f, "Superseded"),
        }
    }
}

/// A conditional offer, sent or received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub id: OfferId,
    pub sender: ParticipantId,
    pub recipient: ParticipantId,
    /// Colors asked of the recipient, on nodes it owns.
    pub conditions: ConditionSet,
    /// Colors promised by the sender, on nodes it owns.
    pub commitments: Coloring,
    pub reasons: Vec<Reason>,
    pub status: OfferStatus,
    /// Sender's projected penalty if accepted. Only known for own offers.
    pub expected_penalty: Option<u32>,
}

/// Every offer this participant has sent or received.
#[derive(Debug, Clone, Default)]
pub struct OfferLedger {
    offers: BTreeMap<OfferId, Offer>,
    next_seq: u32,
}

impl OfferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next own offer or announcement will carry.
    pub fn peek_id(&self, holder: ParticipantId) -> OfferId {
        OfferId {
            sender: holder,
            seq: self.next_seq,
        }
    }

    /// Consume `id` if it is the next own id.
    pub(crate) fn advance_past(&mut self, id: OfferId) {
        self.next_seq = self.next_seq.max(id.seq.saturating_add(1));
    }

    pub fn get(&self, id: OfferId) -> Option<&Offer> {
        self.offers.get(&id)
    }

    pub fn contains(&self, id: OfferId) -> bool {
        self.offers.contains_key(&id)
    }

    /// All offers in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Offer> {
        self.offers.values()
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    /// Pending offers from `sender` to `recipient`, oldest first.
    pub fn pending(&self, sender: ParticipantId, recipient: ParticipantId) -> impl Iterator<Item = &Offer> {
        self.offers.values().filter(move |o| {
            o.sender == sender && o.recipient == recipient && o.status == OfferStatus::Pending
        })
    }

    /// Whether any offer with conditions went from `sender` to `recipient`.
    pub fn has_conditional(&self, sender: ParticipantId, recipient: ParticipantId) -> bool {
        self.offers
            .values()
            .any(|o| o.sender == sender && o.recipient == recipient && !o.conditions.is_empty())
    }

    pub(crate) fn insert(&mut self, offer: Offer) -> Result<(), Anomaly> {
        if self.offers.contains_key(&offer.id) {
            return Err(Anomaly::DuplicateOffer(offer.id));
        }
        self.offers.insert(offer.id, offer);
        Ok(())
    }

    /// Move a pending offer to a terminal status.
    pub(crate) fn transition(&mut self, id: OfferId, to: OfferStatus) -> Result<&Offer, Anomaly> {
        let offer = self.offers.get_mut(&id).ok_or(Anomaly::UnknownOffer(id))?;
        if offer.status.is_terminal() {
            return Err(Anomaly::Terminal {
                id,
                status: offer.status,
            });
        }
        offer.status = to;
        Ok(offer)
    }
}
