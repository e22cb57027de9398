//! Counterfactual offer search.
//!
//! To decide what to ask of a counterpart, a participant imagines each
//! coloring of that counterpart's boundary nodes (`B_r`), solves its own
//! problem under that hypothesis, and keeps the coloring that leaves it with
//! the fewest conflicts. The hypothesis becomes the offer's *conditions*;
//! the participant's best response on its own boundary (`B_o`) becomes the
//! *commitments*.
//!
//! # Candidate space
//!
//! - `|B_r| <= K`: every coloring of `B_r`, `|domain| ^ |B_r|` candidates.
//! - `|B_r| > K`: the believed coloring of `B_r` plus every single-node
//!   deviation from it. This is a heuristic with a known blind spot: offers
//!   that need two or more of the counterpart's nodes to move at once are
//!   never found.
//!
//! Candidates are ordered by their condition-set, so the first minimum is
//! also the lexicographically smallest one.
//!
//! # Filtering
//!
//! A candidate survives when:
//! - the counterpart has not rejected its exact condition-set,
//! - it asks for at least one change (a condition-set the current beliefs
//!   already satisfy is not an offer),
//! - it was not already accepted this round, unless it now strictly
//!   improves on the current penalty.

use std::collections::{BTreeMap, BTreeSet};

use accord_topology::{Color, NodeId};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::penalty::Coloring;
use crate::solver::{Problem, Solver};

/// Default bound on `|B_r|` for exhaustive enumeration.
pub const DEFAULT_ENUMERATION_LIMIT: usize = 3;

/// The exact (node, color) pairs an offer asks of its recipient, sorted by node.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet(BTreeMap<NodeId, Color>);

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, node: NodeId) -> Option<Color> {
        self.0.get(&node).copied()
    }

    /// Pairs in node order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, Color)> + '_ {
        self.0.iter().map(|(n, c)| (*n, *c))
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.0.keys().copied()
    }

    /// Whether `coloring` already has every requested color.
    pub fn is_satisfied_by(&self, coloring: &Coloring) -> bool {
        self.0.iter().all(|(n, c)| coloring.get(n) == Some(c))
    }

    pub fn as_coloring(&self) -> &Coloring {
        &self.0
    }
}

impl FromIterator<(NodeId, Color)> for ConditionSet {
    fn from_iter<I: IntoIterator<Item = (NodeId, Color)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Coloring> for ConditionSet {
    fn from(coloring: Coloring) -> Self {
        Self(coloring)
    }
}

/// One hypothetical coloring of `B_r` and this participant's best response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counterfactual {
    /// Hypothesized colors for the recipient's boundary nodes.
    pub conditions: ConditionSet,
    /// Colors this participant would hold on its boundary toward the recipient.
    pub commitments: Coloring,
    /// Full best-response coloring of the free nodes.
    pub response: Coloring,
    /// Conflicts this participant would be left with.
    pub penalty: u32,
}

/// Where to search.
#[derive(Debug, Clone, Copy)]
pub struct SearchSpace<'a> {
    /// The participant's problem under its current beliefs.
    pub problem: Problem<'a>,
    /// `B_r`, sorted by id.
    pub boundary: &'a [NodeId],
    /// `B_o`, sorted by id.
    pub own_boundary: &'a [NodeId],
}

/// What a participant already learned about a recipient this round.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    pub rejected: &'a BTreeSet<ConditionSet>,
    pub accepted: &'a BTreeSet<ConditionSet>,
}

/// Result of [`Generator::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A configuration worth proposing.
    Offer(Counterfactual),
    /// Candidates remain, but none is worth a new offer right now.
    NoImprovement,
    /// Every candidate was filtered out; nothing further to try with this recipient.
    Exhausted,
}

/// Counterfactual search over a recipient's boundary colorings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generator {
    solver: Solver,
    enumeration_limit: usize,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new(Solver::default(), DEFAULT_ENUMERATION_LIMIT)
    }
}

impl Generator {
    pub const fn new(solver: Solver, enumeration_limit: usize) -> Self {
        Self {
            solver,
            enumeration_limit,
        }
    }

    pub const fn solver(&self) -> &Solver {
        &self.solver
    }

    pub const fn enumeration_limit(&self) -> usize {
        self.enumeration_limit
    }

    /// Every candidate with its best response, in condition-set order.
    pub fn evaluate(&self, space: &SearchSpace<'_>) -> Vec<Counterfactual> {
        let hypotheses = self.hypotheses(space);
        trace!(
            boundary = space.boundary.len(),
            candidates = hypotheses.len(),
            "Evaluating counterfactuals"
        );

        hypotheses
            .into_iter()
            .map(|conditions| self.respond(space, conditions))
            .collect()
    }

    /// Pick the next configuration to propose.
    ///
    /// `current_penalty` is this participant's penalty under its current
    /// assignment and beliefs. `pending_best` is the projected penalty of the
    /// best own offer to this recipient that is still pending, if any.
    pub fn generate(
        &self,
        space: &SearchSpace<'_>,
        history: History<'_>,
        current_penalty: u32,
        pending_best: Option<u32>,
    ) -> Outcome {
        let beliefs = space.problem.beliefs;
        let mut best: Option<Counterfactual> = None;
        let mut survivors = 0usize;

        for candidate in self.evaluate(space) {
            if history.rejected.contains(&candidate.conditions) {
                continue;
            }
            if candidate.conditions.is_satisfied_by(beliefs) {
                continue;
            }
            if history.accepted.contains(&candidate.conditions) && candidate.penalty >= current_penalty {
                continue;
            }
            survivors += 1;
            if best.as_ref().map_or(true, |b| candidate.penalty < b.penalty) {
                best = Some(candidate);
            }
        }

        let Some(best) = best else {
            debug!(
                rejected = history.rejected.len(),
                "No surviving counterfactual"
            );
            return Outcome::Exhausted;
        };

        trace!(
            survivors,
            best = best.penalty,
            current = current_penalty,
            "Selected counterfactual"
        );

        if best.penalty < current_penalty {
            return Outcome::Offer(best);
        }
        if pending_best.is_some_and(|p| p <= best.penalty) {
            return Outcome::NoImprovement;
        }
        if current_penalty == 0 {
            return Outcome::NoImprovement;
        }
        Outcome::Offer(best)
    }

    fn hypotheses(&self, space: &SearchSpace<'_>) -> BTreeSet<ConditionSet> {
        let colors: Vec<Color> = space.problem.domain.colors().collect();
        let mut out = BTreeSet::new();

        if space.boundary.len() <= self.enumeration_limit {
            let n = space.boundary.len();
            let total = colors.len().pow(n as u32);
            for mut code in 0..total {
                let mut conditions = Coloring::new();
                for &node in space.boundary.iter().rev() {
                    conditions.insert(node, colors[code % colors.len()]);
                    code /= colors.len();
                }
                out.insert(ConditionSet(conditions));
            }
            return out;
        }

        let believed: Coloring = space
            .boundary
            .iter()
            .filter_map(|n| space.problem.beliefs.get(n).map(|c| (*n, *c)))
            .collect();
        if believed.len() == space.boundary.len() {
            out.insert(ConditionSet(believed.clone()));
        }
        for &node in space.boundary {
            for &color in &colors {
                if believed.get(&node) == Some(&color) {
                    continue;
                }
                let mut deviation = believed.clone();
                deviation.insert(node, color);
                out.insert(ConditionSet(deviation));
            }
        }
        out
    }

    fn respond(&self, space: &SearchSpace<'_>, conditions: ConditionSet) -> Counterfactual {
        let mut beliefs = space.problem.beliefs.clone();
        beliefs.extend(conditions.iter());

        let solution = self.solver.solve(&Problem {
            beliefs: &beliefs,
            ..space.problem
        });

        let commitments = space
            .own_boundary
            .iter()
            .filter_map(|n| {
                space
                    .problem
                    .fixed
                    .get(n)
                    .or_else(|| solution.assignment.get(n))
                    .map(|c| (*n, *c))
            })
            .collect();

        Counterfactual {
            conditions,
            commitments,
            response: solution.assignment,
            penalty: solution.penalty,
        }
    }
}
