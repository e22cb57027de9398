//! Per-turn move selection.
//!
//! [`decide`] reads an immutable snapshot of a participant's state and
//! returns a [`Transition`]: the state changes to make and the move to send.
//! Changes that describe the move itself are kept apart in
//! [`Transition::on_send`], so a move that is never sent leaves no trace.
//!
//! # Priority ladder
//!
//! First match wins:
//!
//! 1. **Announce.** Own boundary colors that differ from what the recipient
//!    was last told go out as an offer without conditions.
//! 2. **Accept.** The best pending offer from the recipient whose outcome is
//!    acceptable under the [`AcceptanceThreshold`]; ties go to the newest.
//! 3. **Reject.** If offers are pending but none is acceptable, the most
//!    recent one is refused with reasons.
//! 4. **Propose.** Under conflict, or once a conditional offer has gone to
//!    this recipient, run the counterfactual search.
//! 5. **Silence.**
//!
//! Before the ladder, the own assignment is re-solved. The result is adopted
//! when it is strictly better or when the current assignment breaks a pin.

use accord_consensus::{
    penalty_of, Coloring, ConditionSet, Generator, History, Outcome, SearchSpace,
};
use accord_topology::{Color, ForeignNode, NodeId, OwnNode, ParticipantId};
use tracing::debug;

use crate::config::AcceptanceThreshold;
use crate::error::{Error, Result};
use crate::moves::{Move, Reason};
use crate::offer::{Offer, OfferId, OfferStatus};
use crate::state::{Phase, State};

/// One state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Replace the own assignment.
    Adopt(Coloring),
    /// Own colors were announced to `recipient` under `id`.
    Announced {
        recipient: ParticipantId,
        id: OfferId,
        entries: Vec<(OwnNode, Color)>,
    },
    /// A new own offer.
    Offered(Offer),
    SetStatus {
        id: OfferId,
        status: OfferStatus,
    },
    /// Replace the pins agreed with `counterpart`.
    Agree {
        counterpart: ParticipantId,
        pins: Vec<(OwnNode, Color)>,
    },
    Believe {
        node: ForeignNode,
        color: Color,
    },
    /// No candidate is left for this recipient.
    Exhausted(ParticipantId),
}

/// Outcome of one decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    /// Applied whether or not `outgoing` goes out.
    pub effects: Vec<Effect>,
    pub outgoing: Option<Move>,
    /// Applied only together with `outgoing`.
    pub on_send: Vec<Effect>,
}

impl Transition {
    pub fn silent() -> Self {
        Self::default()
    }

    fn quiet(effects: Vec<Effect>) -> Self {
        Self {
            effects,
            ..Self::default()
        }
    }

    fn send(effects: Vec<Effect>, mv: Move, on_send: Vec<Effect>) -> Self {
        Self {
            effects,
            outgoing: Some(mv),
            on_send,
        }
    }
}

/// The fixed parts of decision making.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Policy {
    pub generator: Generator,
    pub acceptance: AcceptanceThreshold,
}

/// What accepting an offer would lead to.
struct Evaluation {
    penalty: u32,
    assignment: Coloring,
}

pub(crate) fn decide(state: &State, policy: &Policy, recipient: ParticipantId) -> Result<Transition> {
    if !state.view.counterparts().contains(&recipient) {
        return Err(Error::UnknownCounterpart(recipient));
    }
    if state.phase == Phase::Configure || state.aborted.contains(&recipient) {
        return Ok(Transition::silent());
    }

    let holder = state.holder();
    let view = &state.view;
    let beliefs = state.beliefs.as_coloring();
    let mut effects = Vec::new();

    // Refresh the own assignment.
    let settled = state.settled(None);
    let free = state.unsettled(&settled);
    let solution = policy
        .generator
        .solver()
        .solve(&state.problem(&free, &settled, beliefs));
    let mut assignment = state.assignment.clone();
    let mut current = penalty_of(view.edges(), &assignment, beliefs);
    let breaks_pin = settled.iter().any(|(n, c)| assignment.get(n) != Some(c));
    if breaks_pin || solution.penalty < current {
        assignment = settled.clone();
        assignment.extend(solution.assignment);
        current = solution.penalty;
        effects.push(Effect::Adopt(assignment.clone()));
    }

    // 1. Announce changed boundary colors.
    let own_boundary = view.own_boundary_toward(recipient);
    let changed = state.proposed.changed(
        recipient,
        own_boundary
            .iter()
            .filter_map(|n| assignment.get(&n.id()).map(|c| (*n, *c))),
    );
    if !changed.is_empty() {
        let id = state.ledger.peek_id(holder);
        let commitments: Coloring = changed.iter().map(|(n, c)| (n.id(), *c)).collect();
        let mv = Move::offer(id, &ConditionSet::new(), &commitments, vec![Reason::StateUpdate]);
        let announced = Effect::Announced {
            recipient,
            id,
            entries: changed,
        };
        return Ok(Transition::send(effects, mv, vec![announced]));
    }

    // 2 and 3. Answer pending offers from the recipient.
    let pending: Vec<&Offer> = state.ledger.pending(recipient, holder).collect();
    if let Some(newest) = pending.last() {
        let mut best: Option<(&Offer, Evaluation)> = None;
        let mut newest_reasons = Vec::new();

        for offer in pending.iter().copied() {
            match evaluate(state, policy, offer, current) {
                Ok(eval) => {
                    if best.as_ref().map_or(true, |(_, b)| eval.penalty <= b.penalty) {
                        best = Some((offer, eval));
                    }
                }
                Err(reasons) => {
                    if offer.id == newest.id {
                        newest_reasons = reasons;
                    }
                }
            }
        }

        if let Some((offer, eval)) = best {
            debug!(
                %holder,
                %recipient,
                offer = %offer.id,
                current,
                resulting = eval.penalty,
                "Accepting offer"
            );
            let mut accepted = vec![
                Effect::SetStatus {
                    id: offer.id,
                    status: OfferStatus::Accepted,
                },
                Effect::Agree {
                    counterpart: recipient,
                    pins: offer
                        .conditions
                        .iter()
                        .filter_map(|(n, c)| view.own(n).map(|o| (o, c)))
                        .collect(),
                },
            ];
            accepted.extend(offer.commitments.iter().filter_map(|(n, c)| {
                view.foreign(*n).map(|node| Effect::Believe { node, color: *c })
            }));
            accepted.push(Effect::Adopt(eval.assignment));
            return Ok(Transition::send(
                effects,
                Move::Accept { refers_to: offer.id },
                accepted,
            ));
        }

        debug!(%holder, %recipient, offer = %newest.id, ?newest_reasons, "Rejecting offer");
        return Ok(Transition::send(
            effects,
            Move::Reject {
                refers_to: newest.id,
                reasons: newest_reasons,
            },
            vec![Effect::SetStatus {
                id: newest.id,
                status: OfferStatus::Rejected,
            }],
        ));
    }

    // 4. Propose.
    if current == 0 && !state.ledger.has_conditional(holder, recipient) {
        return Ok(Transition::quiet(effects));
    }

    let boundary: Vec<NodeId> = view.boundary_of(recipient).iter().map(|n| n.id()).collect();
    let own_boundary: Vec<NodeId> = own_boundary.iter().map(|n| n.id()).collect();
    let space = SearchSpace {
        problem: state.problem(&free, &settled, beliefs),
        boundary: &boundary,
        own_boundary: &own_boundary,
    };
    let own_pending: Vec<&Offer> = state.ledger.pending(holder, recipient).collect();
    let pending_best = own_pending.iter().filter_map(|o| o.expected_penalty).min();
    let history = History {
        rejected: state.rejected.of(recipient),
        accepted: state.accepted.of(recipient),
    };

    match policy.generator.generate(&space, history, current, pending_best) {
        Outcome::Offer(candidate) => {
            if own_pending.iter().any(|o| o.conditions == candidate.conditions) {
                return Ok(Transition::quiet(effects));
            }
            let mut proposed: Vec<Effect> = own_pending
                .iter()
                .map(|old| Effect::SetStatus {
                    id: old.id,
                    status: OfferStatus::Superseded,
                })
                .collect();

            let id = state.ledger.peek_id(holder);
            let reasons = if candidate.penalty < current {
                vec![Reason::Improves]
            } else {
                vec![Reason::Explores]
            };
            debug!(
                %holder,
                %recipient,
                offer = %id,
                current,
                expected = candidate.penalty,
                superseded = own_pending.len(),
                "Proposing offer"
            );

            let mv = Move::offer(id, &candidate.conditions, &candidate.commitments, reasons.clone());
            proposed.push(Effect::Offered(Offer {
                id,
                sender: holder,
                recipient,
                conditions: candidate.conditions,
                commitments: candidate.commitments,
                reasons,
                status: OfferStatus::Pending,
                expected_penalty: Some(candidate.penalty),
            }));
            Ok(Transition::send(effects, mv, proposed))
        }
        Outcome::NoImprovement => Ok(Transition::quiet(effects)),
        Outcome::Exhausted => {
            if !state.exhausted.contains(&recipient) {
                debug!(%holder, %recipient, "No configuration left to propose");
                effects.push(Effect::Exhausted(recipient));
            }
            Ok(Transition::quiet(effects))
        }
    }
}

/// Penalty and assignment if `offer` were accepted, or why it cannot be.
fn evaluate(
    state: &State,
    policy: &Policy,
    offer: &Offer,
    current: u32,
) -> std::result::Result<Evaluation, Vec<Reason>> {
    // This counterpart's earlier agreement is replaced by the new one.
    let mut settled = state.settled(Some(offer.sender));
    let fixed = state.view.fixed_colors();

    let mut reasons = Vec::new();
    for (node, color) in offer.conditions.iter() {
        if let Some(&held) = fixed.get(&node) {
            if held != color {
                reasons.push(Reason::FixedNode { node });
            }
        } else if let Some(&held) = settled.get(&node) {
            if held != color {
                reasons.push(Reason::PinnedElsewhere { node });
            }
        }
    }
    if !reasons.is_empty() {
        return Err(reasons);
    }

    settled.extend(offer.conditions.iter());
    let mut beliefs = state.beliefs.as_coloring().clone();
    beliefs.extend(offer.commitments.iter().map(|(n, c)| (*n, *c)));
    let free = state.unsettled(&settled);
    let solution = policy
        .generator
        .solver()
        .solve(&state.problem(&free, &settled, &beliefs));

    if !policy.acceptance.admits(solution.penalty, current) {
        return Err(vec![Reason::PenaltyWouldRise {
            current,
            resulting: solution.penalty,
        }]);
    }

    let mut assignment = settled;
    assignment.extend(solution.assignment);
    Ok(Evaluation {
        penalty: solution.penalty,
        assignment,
    })
}
