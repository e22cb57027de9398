//! A participant's complete negotiation state.

use std::collections::BTreeSet;
use std::fmt;

use accord_consensus::{penalty_of, Coloring, Problem, Solver};
use accord_topology::{LocalView, NodeId, ParticipantId};
use tracing::trace;

use crate::decision::Effect;
use crate::error::{Anomaly, Error, Result};
use crate::offer::OfferLedger;
use crate::tables::{Beliefs, ConditionLog, Pins, ProposedTable};

/// Negotiation phase. Moves one way only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Silent setup; no proactive moves.
    Configure,
    Bargain,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configure => write!(f, "Configure"),
            Self::Bargain => write!(f, "Bargain"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct State {
    pub view: LocalView,
    pub phase: Phase,
    /// Color of every own node, fixed ones included.
    pub assignment: Coloring,
    pub beliefs: Beliefs,
    pub pins: Pins,
    pub ledger: OfferLedger,
    pub proposed: ProposedTable,
    pub rejected: ConditionLog,
    pub accepted: ConditionLog,
    pub exhausted: BTreeSet<ParticipantId>,
    pub aborted: BTreeSet<ParticipantId>,
}

impl State {
    pub fn new(view: LocalView, solver: &Solver) -> Self {
        let holder = view.holder();
        let mut state = Self {
            phase: Phase::Configure,
            assignment: Coloring::new(),
            beliefs: Beliefs::default(),
            pins: Pins::default(),
            ledger: OfferLedger::new(),
            proposed: ProposedTable::new(holder),
            rejected: ConditionLog::new(),
            accepted: ConditionLog::new(),
            exhausted: BTreeSet::new(),
            aborted: BTreeSet::new(),
            view,
        };

        let settled = state.settled(None);
        let free = state.unsettled(&settled);
        let solution = solver.solve(&state.problem(&free, &settled, state.beliefs.as_coloring()));
        state.assignment = settled;
        state.assignment.extend(solution.assignment);
        state
    }

    pub fn holder(&self) -> ParticipantId {
        self.view.holder()
    }

    /// Fixed colors plus pins, optionally leaving out one counterpart's agreement.
    pub fn settled(&self, except: Option<ParticipantId>) -> Coloring {
        let mut settled = self.view.fixed_colors().clone();
        settled.extend(self.pins.colors(except));
        settled
    }

    /// Own nodes not in `settled`, in id order.
    pub fn unsettled(&self, settled: &Coloring) -> Vec<NodeId> {
        self.view
            .own_nodes()
            .iter()
            .map(|n| n.id())
            .filter(|n| !settled.contains_key(n))
            .collect()
    }

    pub fn problem<'a>(
        &'a self,
        free: &'a [NodeId],
        settled: &'a Coloring,
        beliefs: &'a Coloring,
    ) -> Problem<'a> {
        Problem {
            domain: self.view.domain(),
            edges: self.view.edges(),
            free,
            fixed: settled,
            beliefs,
        }
    }

    pub fn penalty(&self) -> u32 {
        penalty_of(self.view.edges(), &self.assignment, self.beliefs.as_coloring())
    }

    /// Enter Bargain, forgetting the previous round's learning.
    pub fn enter_bargain(&mut self) -> std::result::Result<(), Anomaly> {
        if self.phase == Phase::Bargain {
            return Err(Anomaly::AlreadyBargaining);
        }
        self.phase = Phase::Bargain;
        self.rejected.clear();
        self.accepted.clear();
        self.proposed.clear();
        self.exhausted.clear();
        Ok(())
    }

    pub fn apply(&mut self, effect: Effect) -> Result<()> {
        trace!(holder = %self.holder(), ?effect, "Applying effect");
        match effect {
            Effect::Adopt(assignment) => {
                self.assignment = assignment;
            }
            Effect::Announced {
                recipient,
                id,
                entries,
            } => {
                for (node, color) in entries {
                    self.proposed.record(recipient, node, color)?;
                }
                self.ledger.advance_past(id);
            }
            Effect::Offered(offer) => {
                let id = offer.id;
                self.exhausted.remove(&offer.recipient);
                self.ledger.insert(offer).map_err(Error::Ledger)?;
                self.ledger.advance_past(id);
            }
            Effect::SetStatus { id, status } => {
                self.ledger.transition(id, status).map_err(Error::Ledger)?;
            }
            Effect::Agree { counterpart, pins } => {
                self.pins.agree(counterpart, pins);
            }
            Effect::Believe { node, color } => {
                self.beliefs.update(node, color);
            }
            Effect::Exhausted(recipient) => {
                self.exhausted.insert(recipient);
            }
        }
        Ok(())
    }
}
