//! Negotiation events for the simulation timeline.

use std::collections::BTreeMap;

use accord_protocols::Move;
use accord_topology::ParticipantId;
use serde::{Deserialize, Serialize};

/// Events that occur while a simulation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NegotiationEvent {
    /// A participant moved from Configure to Bargain
    PhaseChanged {
        participant: ParticipantId,
        phase: String,
        frame: u64,
    },

    /// A move was put on the wire
    MoveSent {
        from: ParticipantId,
        to: ParticipantId,
        #[serde(rename = "move")]
        mv: Move,
        frame: u64,
    },

    /// A delivered message was dropped by its recipient
    MoveIgnored {
        from: ParticipantId,
        to: ParticipantId,
        reason: String,
        frame: u64,
    },

    /// A participant has nothing left to propose to a counterpart
    Exhausted {
        participant: ParticipantId,
        counterpart: ParticipantId,
        frame: u64,
    },

    /// End of a round
    RoundCompleted {
        round: u64,
        moves: usize,
        conflicts: usize,
        frame: u64,
    },

    /// A whole round passed with no move and nothing in flight
    Quiescent { round: u64, frame: u64 },
}

impl NegotiationEvent {
    /// Get the frame number for this event.
    pub fn frame(&self) -> u64 {
        match self {
            NegotiationEvent::PhaseChanged { frame, .. } => *frame,
            NegotiationEvent::MoveSent { frame, .. } => *frame,
            NegotiationEvent::MoveIgnored { frame, .. } => *frame,
            NegotiationEvent::Exhausted { frame, .. } => *frame,
            NegotiationEvent::RoundCompleted { frame, .. } => *frame,
            NegotiationEvent::Quiescent { frame, .. } => *frame,
        }
    }
}

/// Aggregate counts over a prefix of the timeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineSummary {
    pub frame: u64,
    pub rounds: u64,
    /// Moves sent, by kind.
    pub moves: BTreeMap<String, usize>,
    pub ignored: usize,
    pub exhausted: usize,
    /// Conflicts at the end of the last completed round.
    pub conflicts: Option<usize>,
    pub quiescent: bool,
}

impl TimelineSummary {
    /// Fold the first `up_to_event` events.
    pub fn from_events(events: &[NegotiationEvent], up_to_event: usize) -> Self {
        let mut summary = Self::default();

        for event in events.iter().take(up_to_event) {
            summary.frame = event.frame();
            match event {
                NegotiationEvent::MoveSent { mv, .. } => {
                    *summary.moves.entry(mv.kind().to_string()).or_default() += 1;
                }
                NegotiationEvent::MoveIgnored { .. } => summary.ignored += 1,
                NegotiationEvent::Exhausted { .. } => summary.exhausted += 1,
                NegotiationEvent::RoundCompleted {
                    round, conflicts, ..
                } => {
                    summary.rounds = *round;
                    summary.conflicts = Some(*conflicts);
                }
                NegotiationEvent::Quiescent { .. } => summary.quiescent = true,
                NegotiationEvent::PhaseChanged { .. } => {}
            }
        }

        summary
    }

    pub fn total_moves(&self) -> usize {
        self.moves.values().sum()
    }
}
