//! Round-based negotiation driver with event recording.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::Write;

use accord_protocols::{Coloring, Envelope, Ingest, Negotiator, NegotiatorConfig};
use accord_topology::{Graph, ParticipantId};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::events::NegotiationEvent;
use crate::scenario::Scenario;

/// Default round cap.
pub const DEFAULT_MAX_ROUNDS: u64 = 100;

/// Configuration for the simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Stop after this many rounds even without quiescence
    pub max_rounds: u64,
    /// Shared by every participant
    pub negotiator: NegotiatorConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            negotiator: NegotiatorConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Defaults overridden by `ACCORD_MAX_ROUNDS` and the negotiator's `ACCORD_*` keys.
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            negotiator: NegotiatorConfig::from_env()?,
            ..Self::default()
        };
        if let Ok(v) = std::env::var("ACCORD_MAX_ROUNDS") {
            config.max_rounds = v.trim().parse().map_err(|_| Error::InvalidConfig {
                key: "ACCORD_MAX_ROUNDS",
                value: v.clone(),
            })?;
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: u64) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    #[must_use]
    pub fn with_negotiator(mut self, negotiator: NegotiatorConfig) -> Self {
        self.negotiator = negotiator;
        self
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub rounds: u64,
    /// A whole round passed with no move and nothing in flight.
    pub quiescent: bool,
    /// Conflicting edges under the true global coloring.
    pub global_conflicts: usize,
    pub assignment: Coloring,
}

/// Drives every participant of one graph and records what they say.
pub struct Simulation {
    config: SimulationConfig,
    graph: Graph,
    negotiators: BTreeMap<ParticipantId, Negotiator>,
    /// One FIFO per directed (from, to) pair.
    queues: BTreeMap<(ParticipantId, ParticipantId), VecDeque<Envelope>>,
    exhausted: BTreeSet<(ParticipantId, ParticipantId)>,
    events: Vec<NegotiationEvent>,
    current_frame: u64,
    rounds: u64,
    started: bool,
}

impl Simulation {
    /// Create one negotiator per participant, all in Configure.
    pub fn new(graph: Graph, config: SimulationConfig) -> Result<Self> {
        let mut negotiators = BTreeMap::new();
        for participant in graph.participants() {
            let negotiator = Negotiator::for_participant(&graph, participant.id, &config.negotiator)?;
            negotiators.insert(participant.id, negotiator);
        }

        Ok(Self {
            config,
            graph,
            negotiators,
            queues: BTreeMap::new(),
            exhausted: BTreeSet::new(),
            events: Vec::new(),
            current_frame: 0,
            rounds: 0,
            started: false,
        })
    }

    /// Build the graph and apply the scenario's commits during Configure.
    pub fn from_scenario(scenario: &Scenario, config: SimulationConfig) -> Result<Self> {
        let graph = scenario.build()?;
        let commits = scenario.resolve_commits(&graph)?;
        let mut sim = Self::new(graph, config)?;

        for (node, color) in commits {
            let owner = sim
                .graph
                .owner(node)
                .ok_or_else(|| Error::InvalidScenario(format!("{node} has no owner")))?;
            if let Some(negotiator) = sim.negotiators.get_mut(&owner) {
                negotiator.commit(node, color)?;
            }
        }
        Ok(sim)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn negotiator(&self, participant: ParticipantId) -> Option<&Negotiator> {
        self.negotiators.get(&participant)
    }

    pub fn negotiators(&self) -> impl Iterator<Item = &Negotiator> {
        self.negotiators.values()
    }

    /// Get all recorded events.
    pub fn events(&self) -> &[NegotiationEvent] {
        &self.events
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Envelopes sent but not yet delivered.
    pub fn in_flight(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    /// Every participant's current own coloring, merged.
    pub fn global_assignment(&self) -> Coloring {
        self.negotiators
            .values()
            .flat_map(|n| n.current_assignment().iter().map(|(k, v)| (*k, *v)))
            .collect()
    }

    pub fn global_conflicts(&self) -> usize {
        self.graph.conflicts(&self.global_assignment())
    }

    /// End Configure for everyone.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        let ids: Vec<ParticipantId> = self.negotiators.keys().copied().collect();
        for id in ids {
            let Some(negotiator) = self.negotiators.get_mut(&id) else {
                continue;
            };
            match negotiator.begin_bargaining() {
                Ingest::Applied => {
                    let phase = negotiator.phase().to_string();
                    self.record(|frame| NegotiationEvent::PhaseChanged {
                        participant: id,
                        phase,
                        frame,
                    });
                }
                Ingest::Ignored(anomaly) => {
                    let reason = anomaly.to_string();
                    self.record(|frame| NegotiationEvent::MoveIgnored {
                        from: id,
                        to: id,
                        reason,
                        frame,
                    });
                }
            }
        }
    }

    /// Run one round. Returns the number of moves sent.
    ///
    /// Each participant, in id order, first takes delivery of everything
    /// queued for it (senders in id order), then steps toward each of its
    /// counterparts in id order.
    pub fn round(&mut self) -> Result<usize> {
        self.rounds += 1;
        let round = self.rounds;
        let mut moves = 0;

        let ids: Vec<ParticipantId> = self.negotiators.keys().copied().collect();
        for &id in &ids {
            for &from in &ids {
                while let Some(envelope) = self.queues.get_mut(&(from, id)).and_then(VecDeque::pop_front) {
                    self.deliver(&envelope);
                }
            }

            let counterparts = match self.negotiators.get(&id) {
                Some(negotiator) => negotiator.view().counterparts(),
                None => continue,
            };
            for to in counterparts {
                let Some(negotiator) = self.negotiators.get_mut(&id) else {
                    continue;
                };
                let sent = negotiator.step(to)?;
                let exhausted = negotiator.is_exhausted(to);

                if let Some(mv) = sent {
                    moves += 1;
                    self.queues
                        .entry((id, to))
                        .or_default()
                        .push_back(Envelope::new(id, to, mv.clone()));
                    self.record(|frame| NegotiationEvent::MoveSent {
                        from: id,
                        to,
                        mv,
                        frame,
                    });
                }

                if !exhausted {
                    self.exhausted.remove(&(id, to));
                } else if self.exhausted.insert((id, to)) {
                    self.record(|frame| NegotiationEvent::Exhausted {
                        participant: id,
                        counterpart: to,
                        frame,
                    });
                }
            }
        }

        let conflicts = self.global_conflicts();
        debug!(round, moves, conflicts, in_flight = self.in_flight(), "Round completed");
        self.record(|frame| NegotiationEvent::RoundCompleted {
            round,
            moves,
            conflicts,
            frame,
        });
        Ok(moves)
    }

    /// Start if needed, then run rounds until quiescence or the round cap.
    pub fn run(&mut self) -> Result<Outcome> {
        self.start();

        let mut quiescent = false;
        while self.rounds < self.config.max_rounds {
            let moves = self.round()?;
            if moves == 0 && self.in_flight() == 0 {
                quiescent = true;
                let round = self.rounds;
                self.record(|frame| NegotiationEvent::Quiescent { round, frame });
                break;
            }
        }

        let outcome = Outcome {
            rounds: self.rounds,
            quiescent,
            global_conflicts: self.global_conflicts(),
            assignment: self.global_assignment(),
        };
        info!(
            rounds = outcome.rounds,
            quiescent = outcome.quiescent,
            conflicts = outcome.global_conflicts,
            events = self.events.len(),
            "Simulation finished"
        );
        Ok(outcome)
    }

    /// Write the timeline as one JSON object per line.
    pub fn write_timeline<W: Write>(&self, mut writer: W) -> Result<()> {
        for event in &self.events {
            serde_json::to_writer(&mut writer, event)?;
            writeln!(writer)?;
        }
        Ok(())
    }

    fn deliver(&mut self, envelope: &Envelope) {
        let Some(negotiator) = self.negotiators.get_mut(&envelope.to) else {
            return;
        };
        if let Ingest::Ignored(anomaly) = negotiator.receive(envelope) {
            let (from, to, reason) = (envelope.from, envelope.to, anomaly.to_string());
            self.record(|frame| NegotiationEvent::MoveIgnored {
                from,
                to,
                reason,
                frame,
            });
        }
    }

    fn record<F>(&mut self, event: F)
    where
        F: FnOnce(u64) -> NegotiationEvent,
    {
        self.events.push(event(self.current_frame));
        self.current_frame += 1;
    }
}
