//! Deduplication guard for outgoing moves.
//!
//! Fingerprints cover what a move *says*, never which ids it carries: the
//! kind, the conditions and the commitments. An `Accept` or `Reject` is
//! fingerprinted through the content of the offer it refers to, so
//! answering two identical offers the same way counts as a repeat.

use std::collections::VecDeque;
use std::fmt;

use accord_topology::ParticipantId;
use tracing::debug;

use crate::moves::{Move, NodeColor};
use crate::offer::OfferLedger;

/// Default number of (recipient, fingerprint) pairs remembered.
pub const DEFAULT_DEDUP_HISTORY: usize = 5;

/// BLAKE3 digest of a move's content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint `mv`, looking up referenced offers in `ledger`.
    pub fn of(mv: &Move, ledger: &OfferLedger) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(mv.kind().as_bytes());

        match mv {
            Move::Propose { node, color } | Move::Commit { node, color } => {
                hash_pairs(&mut hasher, &[NodeColor::new(*node, *color)]);
            }
            Move::ConditionalOffer {
                conditions,
                commitments,
                ..
            } => {
                hash_pairs(&mut hasher, conditions);
                hasher.update(b"|");
                hash_pairs(&mut hasher, commitments);
            }
            Move::Accept { refers_to } | Move::Reject { refers_to, .. } => {
                match ledger.get(*refers_to) {
                    Some(offer) => {
                        let conditions: Vec<_> = offer
                            .conditions
                            .iter()
                            .map(|(n, c)| NodeColor::new(n, c))
                            .collect();
                        let commitments: Vec<_> = offer
                            .commitments
                            .iter()
                            .map(|(n, c)| NodeColor::new(*n, *c))
                            .collect();
                        hash_pairs(&mut hasher, &conditions);
                        hasher.update(b"|");
                        hash_pairs(&mut hasher, &commitments);
                    }
                    // Nothing to go on but the reference itself.
                    None => {
                        hasher.update(&refers_to.sender.0.to_le_bytes());
                        hasher.update(&refers_to.seq.to_le_bytes());
                    }
                }
            }
        }

        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

fn hash_pairs(hasher: &mut blake3::Hasher, pairs: &[NodeColor]) {
    for p in pairs {
        hasher.update(&p.node.0.to_le_bytes());
        hasher.update(&[p.color.0]);
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &hex::encode(self.0)[..8])
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

/// Bounded history of recently sent content.
#[derive(Debug, Clone)]
pub struct DedupGuard {
    capacity: usize,
    history: VecDeque<(ParticipantId, Fingerprint)>,
}

impl Default for DedupGuard {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_HISTORY)
    }
}

impl DedupGuard {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            history: VecDeque::with_capacity(capacity),
        }
    }

    /// Whether `fingerprint` is among the recent sends to `recipient`.
    pub fn is_recent(&self, recipient: ParticipantId, fingerprint: Fingerprint) -> bool {
        let recent = self.history.contains(&(recipient, fingerprint));
        if recent {
            debug!(%recipient, %fingerprint, "Suppressing repeated move");
        }
        recent
    }

    /// Record a send, evicting the oldest entry when full.
    pub fn remember(&mut self, recipient: ParticipantId, fingerprint: Fingerprint) {
        if self.capacity == 0 {
            return;
        }
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back((recipient, fingerprint));
    }

    /// `false` if `fingerprint` was recently sent to `recipient`; otherwise
    /// remember it and return `true`.
    pub fn should_send(&mut self, recipient: ParticipantId, fingerprint: Fingerprint) -> bool {
        if self.is_recent(recipient, fingerprint) {
            return false;
        }
        self.remember(recipient, fingerprint);
        true
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::Reason;
    use crate::offer::OfferId;
    use accord_topology::{Color, NodeId};

    const BOB: ParticipantId = ParticipantId(1);
    const CAROL: ParticipantId = ParticipantId(2);

    fn offer(seq: u32, color: u8) -> Move {
        Move::ConditionalOffer {
            id: OfferId {
                sender: ParticipantId(0),
                seq,
            },
            conditions: vec![NodeColor::new(NodeId(4), Color(color))],
            commitments: vec![NodeColor::new(NodeId(1), Color(0))],
            reasons: vec![Reason::Improves],
        }
    }

    #[test]
    fn ids_do_not_change_fingerprint() {
        let ledger = OfferLedger::new();
        assert_eq!(
            Fingerprint::of(&offer(1, 1), &ledger),
            Fingerprint::of(&offer(2, 1), &ledger)
        );
        assert_ne!(
            Fingerprint::of(&offer(1, 1), &ledger),
            Fingerprint::of(&offer(1, 2), &ledger)
        );
    }

    #[test]
    fn conditions_and_commitments_are_not_interchangeable() {
        let ledger = OfferLedger::new();
        let a = Move::ConditionalOffer {
            id: OfferId { sender: ParticipantId(0), seq: 0 },
            conditions: vec![NodeColor::new(NodeId(1), Color(0))],
            commitments: vec![],
            reasons: vec![],
        };
        let b = Move::ConditionalOffer {
            id: OfferId { sender: ParticipantId(0), seq: 0 },
            conditions: vec![],
            commitments: vec![NodeColor::new(NodeId(1), Color(0))],
            reasons: vec![],
        };
        assert_ne!(Fingerprint::of(&a, &ledger), Fingerprint::of(&b, &ledger));
    }

    #[test]
    fn repeats_are_suppressed_per_recipient() {
        let ledger = OfferLedger::new();
        let fp = Fingerprint::of(&offer(0, 1), &ledger);
        let mut guard = DedupGuard::default();

        assert!(guard.should_send(BOB, fp));
        assert!(!guard.should_send(BOB, fp));
        assert!(guard.should_send(CAROL, fp));
    }

    #[test]
    fn only_eviction_clears_history() {
        let ledger = OfferLedger::new();
        let fp = Fingerprint::of(&offer(0, 1), &ledger);
        let mut guard = DedupGuard::new(3);

        guard.remember(BOB, fp);
        // Sends to other recipients share the same history.
        guard.remember(CAROL, Fingerprint::of(&offer(0, 2), &ledger));
        assert!(guard.is_recent(BOB, fp));
        guard.remember(CAROL, Fingerprint::of(&offer(0, 0), &ledger));
        assert!(guard.is_recent(BOB, fp));

        guard.remember(CAROL, fp);
        assert!(!guard.is_recent(BOB, fp));
        assert!(guard.is_recent(CAROL, fp));
    }

    #[test]
    fn is_recent_does_not_record() {
        let fp = Fingerprint::of(&offer(0, 1), &OfferLedger::new());
        let mut guard = DedupGuard::default();

        assert!(!guard.is_recent(BOB, fp));
        assert!(guard.is_empty());
        assert!(guard.should_send(BOB, fp));
        assert!(guard.is_recent(BOB, fp));
    }

    #[test]
    fn history_is_bounded() {
        let ledger = OfferLedger::new();
        let mut guard = DedupGuard::new(2);
        let first = Fingerprint::of(&offer(0, 0), &ledger);

        assert!(guard.should_send(BOB, first));
        assert!(guard.should_send(BOB, Fingerprint::of(&offer(0, 1), &ledger)));
        assert!(guard.should_send(BOB, Fingerprint::of(&offer(0, 2), &ledger)));
        assert_eq!(guard.len(), 2);
        // The oldest entry was evicted.
        assert!(guard.should_send(BOB, first));
    }

    #[test]
    fn short_display() {
        let fp = Fingerprint::of(&offer(0, 0), &OfferLedger::new());
        assert_eq!(fp.to_string().len(), 8);
    }
}
