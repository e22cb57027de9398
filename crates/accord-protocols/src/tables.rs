//! Per-participant bookkeeping tables.

use std::collections::{BTreeMap, BTreeSet};

use accord_consensus::{Coloring, ConditionSet};
use accord_topology::{Color, ForeignNode, NodeId, OwnNode, ParticipantId};

use crate::error::{Error, Result};

static NO_CONDITIONS: BTreeSet<ConditionSet> = BTreeSet::new();

/// Which own boundary colors have already been told to each recipient.
///
/// Keyed by [`OwnNode`]; `record` also checks the tag's owner, so the table
/// can never hold a counterpart's node.
#[derive(Debug, Clone)]
pub struct ProposedTable {
    holder: ParticipantId,
    entries: BTreeMap<ParticipantId, BTreeMap<OwnNode, Color>>,
}

impl ProposedTable {
    pub fn new(holder: ParticipantId) -> Self {
        Self {
            holder,
            entries: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, recipient: ParticipantId, node: OwnNode, color: Color) -> Result<()> {
        if node.owner() != self.holder {
            return Err(Error::NotOwned {
                node: node.id(),
                holder: self.holder,
            });
        }
        self.entries.entry(recipient).or_default().insert(node, color);
        Ok(())
    }

    pub fn get(&self, recipient: ParticipantId, node: OwnNode) -> Option<Color> {
        self.entries.get(&recipient)?.get(&node).copied()
    }

    /// Entries of `current` that differ from what `recipient` was last told.
    pub fn changed<I>(&self, recipient: ParticipantId, current: I) -> Vec<(OwnNode, Color)>
    where
        I: IntoIterator<Item = (OwnNode, Color)>,
    {
        current
            .into_iter()
            .filter(|(node, color)| self.get(recipient, *node) != Some(*color))
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Condition-sets grouped by counterpart.
///
/// Used for rejections (what a recipient refused) and for agreements (what a
/// recipient already accepted). Append-only until the next phase reset.
#[derive(Debug, Clone, Default)]
pub struct ConditionLog {
    sets: BTreeMap<ParticipantId, BTreeSet<ConditionSet>>,
}

impl ConditionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the set was new.
    pub fn insert(&mut self, counterpart: ParticipantId, conditions: ConditionSet) -> bool {
        self.sets.entry(counterpart).or_default().insert(conditions)
    }

    pub fn contains(&self, counterpart: ParticipantId, conditions: &ConditionSet) -> bool {
        self.sets
            .get(&counterpart)
            .is_some_and(|s| s.contains(conditions))
    }

    pub fn of(&self, counterpart: ParticipantId) -> &BTreeSet<ConditionSet> {
        self.sets.get(&counterpart).unwrap_or(&NO_CONDITIONS)
    }

    pub fn clear(&mut self) {
        self.sets.clear();
    }
}

/// Best-known colors of boundary nodes. Only ever overwritten by messages.
#[derive(Debug, Clone, Default)]
pub struct Beliefs {
    colors: Coloring,
}

impl Beliefs {
    /// Returns whether the belief changed.
    pub fn update(&mut self, node: ForeignNode, color: Color) -> bool {
        self.colors.insert(node.id(), color) != Some(color)
    }

    pub fn get(&self, node: NodeId) -> Option<Color> {
        self.colors.get(&node).copied()
    }

    pub fn as_coloring(&self) -> &Coloring {
        &self.colors
    }
}

/// Where a pin came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinSource {
    /// An accepted offer with this counterpart.
    Agreement(ParticipantId),
    /// An explicit commit by the holder.
    Manual,
}

/// Own free nodes whose color is settled by an agreement or a commit.
#[derive(Debug, Clone, Default)]
pub struct Pins {
    pins: BTreeMap<OwnNode, (Color, PinSource)>,
}

impl Pins {
    /// Replace every pin agreed with `counterpart` by `colors`.
    pub fn agree<I>(&mut self, counterpart: ParticipantId, colors: I)
    where
        I: IntoIterator<Item = (OwnNode, Color)>,
    {
        self.release(counterpart);
        for (node, color) in colors {
            self.pins.insert(node, (color, PinSource::Agreement(counterpart)));
        }
    }

    pub fn commit(&mut self, node: OwnNode, color: Color) {
        self.pins.insert(node, (color, PinSource::Manual));
    }

    /// Drop the pins agreed with `counterpart`.
    pub fn release(&mut self, counterpart: ParticipantId) {
        self.pins
            .retain(|_, (_, source)| *source != PinSource::Agreement(counterpart));
    }

    pub fn get(&self, node: NodeId) -> Option<(Color, PinSource)> {
        self.pins
            .iter()
            .find(|(n, _)| n.id() == node)
            .map(|(_, pin)| *pin)
    }

    pub fn is_pinned(&self, node: NodeId) -> bool {
        self.get(node).is_some()
    }

    /// Pinned colors, optionally leaving out one counterpart's agreement.
    pub fn colors(&self, except: Option<ParticipantId>) -> Coloring {
        self.pins
            .iter()
            .filter(|(_, (_, source))| except.map_or(true, |p| *source != PinSource::Agreement(p)))
            .map(|(n, (c, _))| (n.id(), *c))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}
