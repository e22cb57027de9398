//! The per-participant negotiation engine.

use std::collections::BTreeSet;

use accord_consensus::{Coloring, ConditionSet, Generator, History, Outcome, SearchSpace};
use accord_topology::{Color, ForeignNode, Graph, LocalView, NodeId, ParticipantId};
use tracing::{debug, trace, warn};

use crate::config::{AcceptanceThreshold, NegotiatorConfig};
use crate::decision::{decide, Policy, Transition};
use crate::dedup::{DedupGuard, Fingerprint};
use crate::error::{Anomaly, Error, Result};
use crate::moves::{Control, Envelope, Move, NodeColor, Payload, Reason};
use crate::offer::{Offer, OfferId, OfferStatus};
use crate::state::{Phase, State};

/// Result of [`Negotiator::receive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingest {
    Applied,
    /// The message was logged and dropped.
    Ignored(Anomaly),
}

impl Ingest {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// One participant's side of the negotiation.
///
/// The orchestrator drives it with two calls:
///
/// 1. [`receive()`](Self::receive) for every inbound envelope, in send order
/// 2. [`step()`](Self::step) once per counterpart per turn, sending whatever
///    move it returns
///
/// `receive` never produces a move, and `step` never blocks.
#[derive(Debug, Clone)]
pub struct Negotiator {
    state: State,
    generator: Generator,
    acceptance: AcceptanceThreshold,
    dedup: DedupGuard,
}

impl Negotiator {
    /// Create a negotiator in the Configure phase.
    ///
    /// The initial assignment is the solver's best coloring with nothing
    /// known about the boundary.
    #[must_use]
    pub fn new(view: LocalView, config: &NegotiatorConfig) -> Self {
        let generator = config.generator();
        let state = State::new(view, generator.solver());

        debug!(
            holder = %state.holder(),
            own = state.view.own_nodes().len(),
            boundary = state.view.boundary().count(),
            penalty = state.penalty(),
            "Created negotiator"
        );

        Self {
            state,
            generator,
            acceptance: config.acceptance,
            dedup: DedupGuard::new(config.dedup_history),
        }
    }

    /// Create a negotiator for `participant` from the full graph.
    pub fn for_participant(graph: &Graph, participant: ParticipantId, config: &NegotiatorConfig) -> Result<Self> {
        Ok(Self::new(graph.view(participant)?, config))
    }

    pub fn holder(&self) -> ParticipantId {
        self.state.holder()
    }

    pub fn view(&self) -> &LocalView {
        &self.state.view
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Color of every own node.
    pub fn current_assignment(&self) -> &Coloring {
        &self.state.assignment
    }

    /// Conflicts on edges touching own nodes, under current beliefs.
    pub fn current_penalty(&self) -> u32 {
        self.state.penalty()
    }

    pub fn beliefs(&self) -> &Coloring {
        self.state.beliefs.as_coloring()
    }

    /// Every offer sent or received, in id order.
    pub fn offers(&self) -> impl Iterator<Item = &Offer> {
        self.state.ledger.iter()
    }

    pub fn offer(&self, id: OfferId) -> Option<&Offer> {
        self.state.ledger.get(id)
    }

    /// Condition-sets `recipient` has rejected in this round.
    pub fn rejected_conditions(&self, recipient: ParticipantId) -> &BTreeSet<ConditionSet> {
        self.state.rejected.of(recipient)
    }

    /// Whether the last search for `recipient` found nothing left to offer.
    pub fn is_exhausted(&self, recipient: ParticipantId) -> bool {
        self.state.exhausted.contains(&recipient)
    }

    pub fn is_aborted(&self, recipient: ParticipantId) -> bool {
        self.state.aborted.contains(&recipient)
    }

    /// Own nodes settled by agreements or commits.
    pub fn pinned(&self) -> Coloring {
        self.state.pins.colors(None)
    }

    /// What [`step()`](Self::step) would do, without doing it.
    pub fn plan(&self, recipient: ParticipantId) -> Result<Transition> {
        decide(&self.state, &self.policy(), recipient)
    }

    /// Decide this turn's move toward `recipient`, if any.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(mv))` - Send `mv` to `recipient`
    /// - `Ok(None)` - Nothing to say this turn
    /// - `Err(_)` - `recipient` is not a counterpart, or an invariant broke
    pub fn step(&mut self, recipient: ParticipantId) -> Result<Option<Move>> {
        let Transition {
            mut effects,
            outgoing,
            on_send,
        } = decide(&self.state, &self.policy(), recipient)?;

        // Only proposals go through the guard. Announcements are already
        // deduplicated by the proposed table, and a held-back answer would
        // leave the counterpart's offer pending forever.
        let fingerprint = match &outgoing {
            Some(mv @ Move::ConditionalOffer { .. }) if !mv.is_announcement() => {
                Some(Fingerprint::of(mv, &self.state.ledger))
            }
            _ => None,
        };
        let send = match fingerprint {
            Some(fingerprint) => !self.dedup.is_recent(recipient, fingerprint),
            None => outgoing.is_some(),
        };
        if send {
            effects.extend(on_send);
        }

        let mut next = self.state.clone();
        for effect in effects {
            next.apply(effect)?;
        }
        self.state = next;

        match outgoing {
            Some(mv) if send => {
                if let Some(fingerprint) = fingerprint {
                    self.dedup.remember(recipient, fingerprint);
                }
                debug!(holder = %self.holder(), %recipient, %mv, "Sending move");
                Ok(Some(mv))
            }
            _ => {
                trace!(holder = %self.holder(), %recipient, "Silent turn");
                Ok(None)
            }
        }
    }

    /// Apply an inbound envelope.
    pub fn receive(&mut self, envelope: &Envelope) -> Ingest {
        match self.ingest(envelope) {
            Ok(()) => Ingest::Applied,
            Err(anomaly) => {
                warn!(
                    holder = %self.holder(),
                    from = %envelope.from,
                    %anomaly,
                    "Ignoring message"
                );
                Ingest::Ignored(anomaly)
            }
        }
    }

    /// Configure is over: start bargaining.
    pub fn begin_bargaining(&mut self) -> Ingest {
        let holder = self.holder();
        self.receive(&Envelope::control(holder, holder, Control::AnnounceConfiguration))
    }

    /// Recolor an own free node and pin it there.
    pub fn commit(&mut self, node: NodeId, color: Color) -> Result<()> {
        let holder = self.holder();
        let own = self
            .state
            .view
            .own(node)
            .ok_or(Error::NotOwned { node, holder })?;
        if self.state.view.is_fixed(node) {
            return Err(Error::FixedNode(node));
        }
        if !self.state.view.domain().contains(color) {
            return Err(Error::UnknownColor(color));
        }

        debug!(%holder, %node, color = color.0, "Committing node");
        self.state.assignment.insert(node, color);
        self.state.pins.commit(own, color);
        Ok(())
    }

    /// Run the counterfactual search toward `recipient` against the current
    /// state, without recording anything.
    pub fn generate_offer(&self, recipient: ParticipantId) -> Result<Outcome> {
        let state = &self.state;
        if !state.view.counterparts().contains(&recipient) {
            return Err(Error::UnknownCounterpart(recipient));
        }
        let holder = state.holder();
        let settled = state.settled(None);
        let free = state.unsettled(&settled);
        let boundary: Vec<NodeId> = state.view.boundary_of(recipient).iter().map(|n| n.id()).collect();
        let own_boundary: Vec<NodeId> = state
            .view
            .own_boundary_toward(recipient)
            .iter()
            .map(|n| n.id())
            .collect();
        let pending_best = state
            .ledger
            .pending(holder, recipient)
            .filter_map(|o| o.expected_penalty)
            .min();

        Ok(self.generator.generate(
            &SearchSpace {
                problem: state.problem(&free, &settled, state.beliefs.as_coloring()),
                boundary: &boundary,
                own_boundary: &own_boundary,
            },
            History {
                rejected: state.rejected.of(recipient),
                accepted: state.accepted.of(recipient),
            },
            state.penalty(),
            pending_best,
        ))
    }

    fn policy(&self) -> Policy {
        Policy {
            generator: self.generator,
            acceptance: self.acceptance,
        }
    }

    fn ingest(&mut self, envelope: &Envelope) -> std::result::Result<(), Anomaly> {
        let holder = self.holder();
        let from = envelope.from;
        if envelope.to != holder {
            return Err(Anomaly::Misaddressed(envelope.to));
        }

        let mv = match &envelope.payload {
            Payload::Control(Control::AnnounceConfiguration) => {
                self.state.enter_bargain()?;
                debug!(%holder, %from, "Entering Bargain");
                return Ok(());
            }
            Payload::Control(Control::Impossible) => {
                if self.state.aborted.insert(from) {
                    debug!(%holder, %from, "Correspondent aborted");
                }
                return Ok(());
            }
            Payload::Move(mv) => mv,
        };

        if !self.state.view.counterparts().contains(&from) {
            return Err(Anomaly::UnknownSender(from));
        }
        if self.state.aborted.contains(&from) {
            return Err(Anomaly::Aborted(from));
        }

        match mv {
            Move::Propose { node, color } | Move::Commit { node, color } => {
                self.believe(from, &[NodeColor::new(*node, *color)])
            }
            Move::ConditionalOffer {
                commitments,
                conditions,
                ..
            } if conditions.is_empty() => self.believe(from, commitments),
            Move::ConditionalOffer {
                id,
                conditions,
                commitments,
                reasons,
            } => self.register(from, *id, conditions, commitments, reasons),
            Move::Accept { refers_to } => {
                let offer = self.own_offer(*refers_to, from)?;
                let pins = offer
                    .commitments
                    .iter()
                    .filter_map(|(n, c)| self.state.view.own(*n).map(|o| (o, *c)))
                    .collect::<Vec<_>>();
                let beliefs = offer
                    .conditions
                    .iter()
                    .filter_map(|(n, c)| self.state.view.foreign(n).map(|f| (f, c)))
                    .collect::<Vec<_>>();
                let conditions = offer.conditions.clone();

                self.state.ledger.transition(*refers_to, OfferStatus::Accepted)?;
                self.state.pins.agree(from, pins);
                for (node, color) in beliefs {
                    self.state.beliefs.update(node, color);
                }
                self.state.accepted.insert(from, conditions);
                debug!(%holder, %from, offer = %refers_to, "Offer accepted");
                Ok(())
            }
            Move::Reject { refers_to, reasons } => {
                let conditions = self.own_offer(*refers_to, from)?.conditions.clone();
                self.state.ledger.transition(*refers_to, OfferStatus::Rejected)?;
                self.state.rejected.insert(from, conditions);
                debug!(%holder, %from, offer = %refers_to, ?reasons, "Offer rejected");
                Ok(())
            }
        }
    }

    /// The own offer `id`, sent to `from`.
    fn own_offer(&self, id: OfferId, from: ParticipantId) -> std::result::Result<&Offer, Anomaly> {
        let offer = self.state.ledger.get(id).ok_or(Anomaly::UnknownOffer(id))?;
        if offer.sender != self.holder() || offer.recipient != from {
            return Err(Anomaly::NotOurOffer(id));
        }
        Ok(offer)
    }

    /// Update beliefs from colors `from` states about its own nodes.
    fn believe(&mut self, from: ParticipantId, pairs: &[NodeColor]) -> std::result::Result<(), Anomaly> {
        let mut updates = Vec::with_capacity(pairs.len());
        for p in pairs {
            let node = self.foreign_of(from, p.node)?;
            self.check_color(p.color)?;
            updates.push((node, p.color));
        }
        for (node, color) in updates {
            if self.state.beliefs.update(node, color) {
                trace!(holder = %self.holder(), %node, color = color.0, "Belief updated");
            }
        }
        Ok(())
    }

    fn register(
        &mut self,
        from: ParticipantId,
        id: OfferId,
        conditions: &[NodeColor],
        commitments: &[NodeColor],
        reasons: &[Reason],
    ) -> std::result::Result<(), Anomaly> {
        let holder = self.holder();
        if id.sender != from {
            return Err(Anomaly::ForgedId { id, sender: from });
        }
        if self.state.ledger.contains(id) {
            return Err(Anomaly::DuplicateOffer(id));
        }

        let mut pairs = Vec::with_capacity(conditions.len());
        for p in conditions {
            let node = self.state.view.own(p.node).ok_or(Anomaly::WrongOwner {
                node: p.node,
                expected: holder,
            })?;
            self.check_color(p.color)?;
            pairs.push((node.id(), p.color));
        }
        let wanted: ConditionSet = pairs.into_iter().collect();

        let mut promised = Coloring::new();
        for p in commitments {
            self.foreign_of(from, p.node)?;
            self.check_color(p.color)?;
            promised.insert(p.node, p.color);
        }

        let superseded: Vec<OfferId> = self.state.ledger.pending(from, holder).map(|o| o.id).collect();
        for old in superseded {
            self.state.ledger.transition(old, OfferStatus::Superseded)?;
        }
        self.state.ledger.insert(Offer {
            id,
            sender: from,
            recipient: holder,
            conditions: wanted,
            commitments: promised,
            reasons: reasons.to_vec(),
            status: OfferStatus::Pending,
            expected_penalty: None,
        })?;
        debug!(%holder, %from, offer = %id, "Offer received");
        Ok(())
    }

    fn foreign_of(&self, owner: ParticipantId, node: NodeId) -> std::result::Result<ForeignNode, Anomaly> {
        self.state
            .view
            .foreign(node)
            .filter(|f| f.owner() == owner)
            .ok_or(Anomaly::WrongOwner { node, expected: owner })
    }

    fn check_color(&self, color: Color) -> std::result::Result<(), Anomaly> {
        if self.state.view.domain().contains(color) {
            Ok(())
        } else {
            Err(Anomaly::UnknownColor(color))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_topology::Domain;

    /// agent: a1 = Green (fixed), a2, a3 = Blue (fixed)
    /// human: h0 = Green (fixed), h1, h2 = Blue (fixed)
    /// edges: a1-a2, a2-a3, a2-h1, h0-h1, h1-h2
    ///
    /// a2 and h1 both need Red, so one conflict always remains.
    struct Fixture {
        graph: Graph,
        agent: Negotiator,
        human: Negotiator,
    }

    impl Fixture {
        fn new() -> Self {
            let domain = Domain::rgb();
            let green = domain.parse("Green").unwrap();
            let blue = domain.parse("Blue").unwrap();
            let mut b = Graph::builder(domain);
            let agent = b.participant("agent").unwrap();
            let human = b.participant("human").unwrap();
            b.fixed_node("a1", agent, green).unwrap();
            b.node("a2", agent).unwrap();
            b.fixed_node("a3", agent, blue).unwrap();
            b.fixed_node("h0", human, green).unwrap();
            b.node("h1", human).unwrap();
            b.fixed_node("h2", human, blue).unwrap();
            for (x, y) in [("a1", "a2"), ("a2", "a3"), ("a2", "h1"), ("h0", "h1"), ("h1", "h2")] {
                b.edge_by_name(x, y).unwrap();
            }
            let graph = b.build();
            let config = NegotiatorConfig::default();
            Self {
                agent: Negotiator::for_participant(&graph, agent, &config).unwrap(),
                human: Negotiator::for_participant(&graph, human, &config).unwrap(),
                graph,
            }
        }

        fn node(&self, name: &str) -> NodeId {
            self.graph.node_id(name).unwrap()
        }

        fn color(&self, name: &str) -> Color {
            self.graph.domain().parse(name).unwrap()
        }

        fn bargain(&mut self) {
            assert!(self.agent.begin_bargaining().is_applied());
            assert!(self.human.begin_bargaining().is_applied());
        }
    }

    /// Step `from` toward `to` and deliver whatever it says.
    fn turn(from: &mut Negotiator, to: &mut Negotiator) -> Option<Move> {
        let mv = from.step(to.holder()).unwrap()?;
        let ingest = to.receive(&Envelope::new(from.holder(), to.holder(), mv.clone()));
        assert_eq!(ingest, Ingest::Applied, "{mv} was not applied");
        Some(mv)
    }

    fn conditions(mv: &Move) -> Vec<NodeColor> {
        match mv {
            Move::ConditionalOffer { conditions, .. } => conditions.clone(),
            other => panic!("expected an offer, got {other}"),
        }
    }

    /// A: a, a1 = Red (fixed), a2 = Red (fixed)
    /// B: b
    /// C: c
    /// edges: a-a1, a-b, a-c, a2-b
    ///
    /// B and C are steered by hand-written announcements. Under any pair of
    /// distinct beliefs for b and c, A keeps one conflict on `a` and asks B
    /// to move b onto the color c does not use.
    struct ThreeParty {
        graph: Graph,
        a: Negotiator,
        b: Negotiator,
        c: ParticipantId,
    }

    impl ThreeParty {
        fn new() -> Self {
            let domain = Domain::rgb();
            let red = domain.parse("Red").unwrap();
            let mut g = Graph::builder(domain);
            let a = g.participant("A").unwrap();
            let b = g.participant("B").unwrap();
            let c = g.participant("C").unwrap();
            g.node("a", a).unwrap();
            g.fixed_node("a1", a, red).unwrap();
            g.fixed_node("a2", a, red).unwrap();
            g.node("b", b).unwrap();
            g.node("c", c).unwrap();
            for (x, y) in [("a", "a1"), ("a", "b"), ("a", "c"), ("a2", "b")] {
                g.edge_by_name(x, y).unwrap();
            }
            let graph = g.build();
            let config = NegotiatorConfig::default();
            let mut f = Self {
                a: Negotiator::for_participant(&graph, a, &config).unwrap(),
                b: Negotiator::for_participant(&graph, b, &config).unwrap(),
                c,
                graph,
            };
            assert!(f.a.begin_bargaining().is_applied());
            assert!(f.b.begin_bargaining().is_applied());
            f
        }

        fn node(&self, name: &str) -> NodeId {
            self.graph.node_id(name).unwrap()
        }

        fn color(&self, name: &str) -> Color {
            self.graph.domain().parse(name).unwrap()
        }

        /// Make A believe b and c have the given colors.
        fn tell(&mut self, b: &str, c: &str) {
            let a = self.a.holder();
            for (from, node, color) in [(self.b.holder(), "b", b), (self.c, "c", c)] {
                let mv = Move::Propose {
                    node: self.node(node),
                    color: self.color(color),
                };
                assert!(self.a.receive(&Envelope::new(from, a, mv)).is_applied());
            }
        }

        /// A offers {b: Blue}, then replaces it with {b: Green}. B receives both.
        fn two_offers(&mut self) -> (OfferId, OfferId) {
            self.tell("Green", "Blue");
            assert!(turn(&mut self.a, &mut self.b).unwrap().is_announcement());
            let first = turn(&mut self.a, &mut self.b).unwrap();
            assert_eq!(conditions(&first), vec![NodeColor::new(self.node("b"), self.color("Blue"))]);

            self.tell("Blue", "Green");
            let second = turn(&mut self.a, &mut self.b).unwrap();
            assert_eq!(conditions(&second), vec![NodeColor::new(self.node("b"), self.color("Green"))]);

            (offer_id(&first), offer_id(&second))
        }
    }

    fn offer_id(mv: &Move) -> OfferId {
        match mv {
            Move::ConditionalOffer { id, .. } => *id,
            other => panic!("expected an offer, got {other}"),
        }
    }

    #[test]
    fn silent_while_configuring() {
        let mut f = Fixture::new();
        let human = f.human.holder();
        assert_eq!(f.agent.phase(), Phase::Configure);
        assert_eq!(f.agent.step(human).unwrap(), None);
    }

    #[test]
    fn initial_assignment_is_solved() {
        let f = Fixture::new();
        let red = f.color("Red");
        assert_eq!(f.agent.current_assignment().get(&f.node("a2")), Some(&red));
        assert_eq!(f.agent.current_assignment().len(), 3);
        assert_eq!(f.agent.current_penalty(), 0);
    }

    #[test]
    fn announcement_is_sent_once() {
        let mut f = Fixture::new();
        f.bargain();
        let human = f.human.holder();

        let first = f.agent.step(human).unwrap().unwrap();
        assert!(first.is_announcement());
        let Move::ConditionalOffer { commitments, reasons, .. } = &first else {
            panic!("expected an announcement");
        };
        assert_eq!(commitments, &vec![NodeColor::new(f.node("a2"), f.color("Red"))]);
        assert_eq!(reasons, &vec![Reason::StateUpdate]);

        assert_eq!(f.agent.step(human).unwrap(), None);
        // Announcements are not offers.
        assert_eq!(f.agent.offers().count(), 0);
    }

    #[test]
    fn second_configuration_announcement_is_ignored() {
        let mut f = Fixture::new();
        f.bargain();
        assert_eq!(
            f.agent.begin_bargaining(),
            Ingest::Ignored(Anomaly::AlreadyBargaining)
        );
        assert_eq!(f.agent.phase(), Phase::Bargain);
    }

    #[test]
    fn negotiation_until_exhausted() {
        let mut f = Fixture::new();
        f.bargain();
        let (red, green, blue) = (f.color("Red"), f.color("Green"), f.color("Blue"));
        let (a2, h1) = (f.node("a2"), f.node("h1"));
        let agent_id = f.agent.holder();

        // Both announce.
        assert!(turn(&mut f.agent, &mut f.human).unwrap().is_announcement());
        assert!(turn(&mut f.human, &mut f.agent).unwrap().is_announcement());
        assert_eq!(f.agent.beliefs().get(&h1), Some(&red));
        assert_eq!(f.agent.current_penalty(), 1);

        // The agent asks h1 to move to Green and keeps a2 Red.
        let offer = turn(&mut f.agent, &mut f.human).unwrap();
        assert_eq!(conditions(&offer), vec![NodeColor::new(h1, green)]);
        let Move::ConditionalOffer { id, commitments, reasons, .. } = &offer else {
            unreachable!()
        };
        assert_eq!(commitments, &vec![NodeColor::new(a2, red)]);
        assert_eq!(reasons, &vec![Reason::Improves]);
        let offer_id = *id;

        // Neutral for the human, so it accepts.
        let accept = turn(&mut f.human, &mut f.agent).unwrap();
        assert_eq!(accept, Move::Accept { refers_to: offer_id });
        assert_eq!(f.agent.offer(offer_id).unwrap().status, OfferStatus::Accepted);
        assert_eq!(f.human.offer(offer_id).unwrap().status, OfferStatus::Accepted);
        assert_eq!(f.agent.pinned().get(&a2), Some(&red));
        assert_eq!(f.human.pinned().get(&h1), Some(&green));
        assert_eq!(f.human.current_assignment().get(&h1), Some(&green));
        assert_eq!(f.agent.current_penalty(), 0);

        // The agent is satisfied; the human announces its new color.
        assert_eq!(f.agent.step(f.human.holder()).unwrap(), None);
        let update = turn(&mut f.human, &mut f.agent).unwrap();
        assert!(update.is_announcement());

        // The human still has one conflict and explores.
        let explore = turn(&mut f.human, &mut f.agent).unwrap();
        assert_eq!(conditions(&explore), vec![NodeColor::new(a2, blue)]);
        let reject = turn(&mut f.agent, &mut f.human).unwrap();
        let Move::Reject { reasons, .. } = &reject else {
            panic!("expected a rejection, got {reject}");
        };
        assert_eq!(
            reasons,
            &vec![Reason::PenaltyWouldRise {
                current: 0,
                resulting: 1
            }]
        );
        assert_eq!(f.human.rejected_conditions(agent_id).len(), 1);

        // Next candidate is different, and also refused.
        let explore = turn(&mut f.human, &mut f.agent).unwrap();
        assert_eq!(conditions(&explore), vec![NodeColor::new(a2, green)]);
        assert!(matches!(
            turn(&mut f.agent, &mut f.human),
            Some(Move::Reject { .. })
        ));

        // Nothing left.
        assert_eq!(f.human.step(agent_id).unwrap(), None);
        assert!(f.human.is_exhausted(agent_id));
        assert_eq!(f.agent.step(f.human.holder()).unwrap(), None);
    }

    #[test]
    fn newer_offer_supersedes_older() {
        let mut f = Fixture::new();
        let (agent, human) = (f.agent.holder(), f.human.holder());
        let (a2, h1) = (f.node("a2"), f.node("h1"));
        let offer = |seq, color| Move::ConditionalOffer {
            id: OfferId { sender: human, seq },
            conditions: vec![NodeColor::new(a2, color)],
            commitments: vec![NodeColor::new(h1, Color(0))],
            reasons: vec![Reason::Explores],
        };

        assert!(f.agent.receive(&Envelope::new(human, agent, offer(0, Color(1)))).is_applied());
        assert!(f.agent.receive(&Envelope::new(human, agent, offer(1, Color(2)))).is_applied());

        let first = OfferId { sender: human, seq: 0 };
        let second = OfferId { sender: human, seq: 1 };
        assert_eq!(f.agent.offer(first).unwrap().status, OfferStatus::Superseded);
        assert_eq!(f.agent.offer(second).unwrap().status, OfferStatus::Pending);

        // The same id twice is stale.
        assert_eq!(
            f.agent.receive(&Envelope::new(human, agent, offer(1, Color(2)))),
            Ingest::Ignored(Anomaly::DuplicateOffer(second))
        );
    }

    #[test]
    fn own_newer_offer_supersedes_on_both_sides() {
        let mut f = ThreeParty::new();
        let (first, second) = f.two_offers();

        for side in [&f.a, &f.b] {
            assert_eq!(side.offer(first).unwrap().status, OfferStatus::Superseded);
            assert_eq!(side.offer(second).unwrap().status, OfferStatus::Pending);
        }
    }

    #[test]
    fn repeated_offer_leaves_no_trace() {
        let mut f = ThreeParty::new();
        let b = f.b.holder();
        let (first, second) = f.two_offers();

        // Back to the first beliefs: the search lands on the first offer's
        // content again. It went to B recently, so nothing is sent, even
        // though B has spoken since.
        f.tell("Green", "Blue");
        let before = f.a.offers().cloned().collect::<Vec<_>>();
        assert_eq!(f.a.step(b).unwrap(), None);
        assert_eq!(f.a.offers().cloned().collect::<Vec<_>>(), before);
        assert_eq!(f.a.offers().count(), 2);

        // Both sides still agree on what is open.
        assert_eq!(f.a.offer(second).unwrap().status, OfferStatus::Pending);
        assert_eq!(f.b.offer(second).unwrap().status, OfferStatus::Pending);
        assert_eq!(f.a.offer(first).unwrap().status, OfferStatus::Superseded);

        // B's answer to the open offer still lands.
        let answer = f.b.step(f.a.holder()).unwrap().unwrap();
        let answer = if answer.is_announcement() {
            assert!(f.a.receive(&Envelope::new(b, f.a.holder(), answer)).is_applied());
            f.b.step(f.a.holder()).unwrap().unwrap()
        } else {
            answer
        };
        let refers_to = match &answer {
            Move::Accept { refers_to } | Move::Reject { refers_to, .. } => *refers_to,
            other => panic!("expected an answer, got {other}"),
        };
        assert_eq!(refers_to, second);
        assert!(f.a.receive(&Envelope::new(b, f.a.holder(), answer)).is_applied());
        assert_ne!(f.a.offer(second).unwrap().status, OfferStatus::Pending);
    }

    #[test]
    fn condition_on_fixed_node_is_rejected() {
        let mut f = Fixture::new();
        f.bargain();
        let (agent, human) = (f.agent.holder(), f.human.holder());
        let a1 = f.node("a1");
        let id = OfferId { sender: human, seq: 0 };
        let mv = Move::ConditionalOffer {
            id,
            conditions: vec![NodeColor::new(a1, f.color("Red"))],
            commitments: vec![],
            reasons: vec![Reason::Explores],
        };
        assert!(f.agent.receive(&Envelope::new(human, agent, mv)).is_applied());

        assert!(f.agent.step(human).unwrap().unwrap().is_announcement());
        assert_eq!(
            f.agent.step(human).unwrap(),
            Some(Move::Reject {
                refers_to: id,
                reasons: vec![Reason::FixedNode { node: a1 }],
            })
        );
        assert_eq!(f.agent.offer(id).unwrap().status, OfferStatus::Rejected);
    }

    #[test]
    fn malformed_moves_are_ignored() {
        let mut f = Fixture::new();
        let (agent, human) = (f.agent.holder(), f.human.holder());
        let (a2, h1) = (f.node("a2"), f.node("h1"));

        // A belief about our own node.
        assert_eq!(
            f.agent.receive(&Envelope::new(human, agent, Move::Propose { node: a2, color: Color(0) })),
            Ingest::Ignored(Anomaly::WrongOwner { node: a2, expected: human })
        );
        // An answer to an offer that never existed.
        let ghost = OfferId { sender: agent, seq: 42 };
        assert_eq!(
            f.agent.receive(&Envelope::new(human, agent, Move::Accept { refers_to: ghost })),
            Ingest::Ignored(Anomaly::UnknownOffer(ghost))
        );
        // An id claiming someone else sent it.
        let forged = OfferId { sender: agent, seq: 0 };
        let mv = Move::ConditionalOffer {
            id: forged,
            conditions: vec![NodeColor::new(a2, Color(1))],
            commitments: vec![],
            reasons: vec![],
        };
        assert_eq!(
            f.agent.receive(&Envelope::new(human, agent, mv)),
            Ingest::Ignored(Anomaly::ForgedId { id: forged, sender: human })
        );
        // Misaddressed.
        assert_eq!(
            f.agent.receive(&Envelope::new(agent, human, Move::Propose { node: h1, color: Color(0) })),
            Ingest::Ignored(Anomaly::Misaddressed(human))
        );
        assert!(f.agent.beliefs().is_empty());
    }

    #[test]
    fn commit_pins_own_free_nodes_only() {
        let mut f = Fixture::new();
        let blue = f.color("Blue");
        let (a1, a2, h1) = (f.node("a1"), f.node("a2"), f.node("h1"));

        assert_eq!(f.agent.commit(a1, blue), Err(Error::FixedNode(a1)));
        assert_eq!(
            f.agent.commit(h1, blue),
            Err(Error::NotOwned {
                node: h1,
                holder: f.agent.holder()
            })
        );
        assert_eq!(f.agent.commit(a2, Color(9)), Err(Error::UnknownColor(Color(9))));

        f.agent.commit(a2, blue).unwrap();
        assert_eq!(f.agent.current_assignment().get(&a2), Some(&blue));
        assert_eq!(f.agent.pinned().get(&a2), Some(&blue));
        assert_eq!(f.agent.current_penalty(), 1);

        // The pin survives a refresh even though Red would be better.
        f.agent.begin_bargaining();
        f.agent.step(f.human.holder()).unwrap();
        assert_eq!(f.agent.current_assignment().get(&a2), Some(&blue));
    }

    #[test]
    fn impossible_silences_correspondent() {
        let mut f = Fixture::new();
        f.bargain();
        let (agent, human) = (f.agent.holder(), f.human.holder());
        assert!(f
            .agent
            .receive(&Envelope::control(human, agent, Control::Impossible))
            .is_applied());
        assert!(f.agent.is_aborted(human));
        assert_eq!(f.agent.step(human).unwrap(), None);
        assert_eq!(
            f.agent.receive(&Envelope::new(human, agent, Move::Propose {
                node: f.node("h1"),
                color: Color(0)
            })),
            Ingest::Ignored(Anomaly::Aborted(human))
        );
    }

    #[test]
    fn unknown_counterpart_is_an_error() {
        let mut f = Fixture::new();
        f.bargain();
        let stranger = ParticipantId(7);
        assert_eq!(f.agent.step(stranger), Err(Error::UnknownCounterpart(stranger)));
        assert!(f.agent.generate_offer(stranger).is_err());
    }

    #[test]
    fn generate_offer_does_not_record() {
        let mut f = Fixture::new();
        f.bargain();
        turn(&mut f.agent, &mut f.human);
        turn(&mut f.human, &mut f.agent);

        let human = f.human.holder();
        let outcome = f.agent.generate_offer(human).unwrap();
        let Outcome::Offer(candidate) = outcome else {
            panic!("expected an offer, got {outcome:?}");
        };
        assert_eq!(candidate.penalty, 0);
        assert_eq!(f.agent.offers().count(), 0);
        assert_eq!(f.agent.generate_offer(human).unwrap(), Outcome::Offer(candidate));
    }
}
