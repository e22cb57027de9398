//! Local constraint solver.
//!
//! Given the colors a participant already knows (its fixed and pinned nodes,
//! and its beliefs about boundary nodes), find the coloring of its free
//! nodes with the fewest conflicts.
//!
//! # Search
//!
//! Below [`Solver::exhaustive_limit`] free nodes the search is exhaustive over
//! `|domain| ^ |free|` colorings, walked in lexicographic order (free nodes
//! sorted by id, the first node most significant, colors in domain order).
//! The first minimum wins, so ties resolve to the lexicographically smallest
//! coloring and two runs on the same input always agree.
//!
//! Above the limit a greedy pass followed by bounded min-conflict sweeps is
//! used instead. That path is deterministic too, but not optimal.
//!
//! The solver is a pure function of its [`Problem`].

use accord_topology::{Color, Domain, Edge, NodeId};
use tracing::trace;

use crate::penalty::Coloring;

/// Default bound on free nodes for exhaustive search.
pub const DEFAULT_EXHAUSTIVE_LIMIT: usize = 10;

/// Upper bound on min-conflict sweeps in the heuristic path.
const MAX_SWEEPS: usize = 16;

/// Input to one solve.
#[derive(Debug, Clone, Copy)]
pub struct Problem<'a> {
    pub domain: &'a Domain,
    /// Edges touching the participant's own nodes.
    pub edges: &'a [Edge],
    /// Nodes to color, sorted by id.
    pub free: &'a [NodeId],
    /// Own nodes whose color is settled (fixed or pinned).
    pub fixed: &'a Coloring,
    /// Believed colors of boundary nodes.
    pub beliefs: &'a Coloring,
}

/// Best coloring found for the free nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    /// Colors for the free nodes only.
    pub assignment: Coloring,
    pub penalty: u32,
    /// Whether the exhaustive path produced this solution.
    pub exhaustive: bool,
}

/// Minimum-conflict solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Solver {
    exhaustive_limit: usize,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            exhaustive_limit: DEFAULT_EXHAUSTIVE_LIMIT,
        }
    }
}

impl Solver {
    pub const fn new(exhaustive_limit: usize) -> Self {
        Self { exhaustive_limit }
    }

    pub const fn exhaustive_limit(&self) -> usize {
        self.exhaustive_limit
    }

    /// Solve `problem`.
    pub fn solve(&self, problem: &Problem<'_>) -> Solution {
        let compiled = Compiled::new(problem);
        let colors: Vec<Color> = problem.domain.colors().collect();

        let (digits, penalty, exhaustive) = if problem.free.len() <= self.exhaustive_limit {
            let (digits, penalty) = compiled.exhaustive(&colors);
            (digits, penalty, true)
        } else {
            let digits = compiled.greedy(&colors);
            let penalty = compiled.cost(&digits);
            (digits, penalty, false)
        };

        trace!(
            free = problem.free.len(),
            penalty,
            exhaustive,
            "Solved local problem"
        );

        Solution {
            assignment: problem.free.iter().copied().zip(digits).collect(),
            penalty,
            exhaustive,
        }
    }
}

/// Edges rewritten in terms of free-node indices.
struct Compiled {
    /// Conflicts between settled endpoints; constant across candidates.
    base: u32,
    /// For each free node, the known colors of its settled neighbors.
    unary: Vec<Vec<Color>>,
    /// For each free node, its free neighbors.
    adjacent: Vec<Vec<usize>>,
    /// Free-free edges, each once.
    pairs: Vec<(usize, usize)>,
}

impl Compiled {
    fn new(problem: &Problem<'_>) -> Self {
        let n = problem.free.len();
        let index = |node: NodeId| problem.free.binary_search(&node).ok();
        let known = |node: NodeId| {
            problem
                .fixed
                .get(&node)
                .or_else(|| problem.beliefs.get(&node))
                .copied()
        };

        let mut base = 0;
        let mut unary = vec![Vec::new(); n];
        let mut adjacent = vec![Vec::new(); n];
        let mut pairs = Vec::new();

        for edge in problem.edges {
            match (index(edge.a), index(edge.b)) {
                (Some(i), Some(j)) => {
                    adjacent[i].push(j);
                    adjacent[j].push(i);
                    pairs.push((i, j));
                }
                (Some(i), None) => {
                    if let Some(c) = known(edge.b) {
                        unary[i].push(c);
                    }
                }
                (None, Some(j)) => {
                    if let Some(c) = known(edge.a) {
                        unary[j].push(c);
                    }
                }
                (None, None) => {
                    if let (Some(x), Some(y)) = (known(edge.a), known(edge.b)) {
                        if x == y {
                            base += 1;
                        }
                    }
                }
            }
        }

        Self {
            base,
            unary,
            adjacent,
            pairs,
        }
    }

    fn cost(&self, digits: &[Color]) -> u32 {
        let unary: usize = self
            .unary
            .iter()
            .zip(digits)
            .map(|(known, c)| known.iter().filter(|k| *k == c).count())
            .sum();
        let binary = self
            .pairs
            .iter()
            .filter(|(i, j)| digits[*i] == digits[*j])
            .count();
        self.base + (unary + binary) as u32
    }

    /// Conflicts node `i` would have with `color`, counting only assigned neighbors.
    fn local_cost(&self, i: usize, color: Color, digits: &[Option<Color>]) -> u32 {
        let unary = self.unary[i].iter().filter(|k| **k == color).count();
        let binary = self.adjacent[i]
            .iter()
            .filter(|&&j| digits[j] == Some(color))
            .count();
        (unary + binary) as u32
    }

    fn exhaustive(&self, colors: &[Color]) -> (Vec<Color>, u32) {
        let n = self.unary.len();
        let mut odometer = vec![0usize; n];
        let mut digits = vec![colors[0]; n];
        let mut best = (digits.clone(), u32::MAX);

        loop {
            let cost = self.cost(&digits);
            if cost < best.1 {
                best = (digits.clone(), cost);
                // Nothing can beat the settled conflicts.
                if cost == self.base {
                    break;
                }
            }

            // Advance the least significant (last) digit first.
            let mut pos = n;
            loop {
                if pos == 0 {
                    return best;
                }
                pos -= 1;
                odometer[pos] += 1;
                if odometer[pos] < colors.len() {
                    digits[pos] = colors[odometer[pos]];
                    break;
                }
                odometer[pos] = 0;
                digits[pos] = colors[0];
            }
        }

        best
    }

    fn greedy(&self, colors: &[Color]) -> Vec<Color> {
        let n = self.unary.len();
        let mut digits: Vec<Option<Color>> = vec![None; n];

        for i in 0..n {
            digits[i] = Some(self.cheapest(i, colors, &digits));
        }

        for sweep in 0..MAX_SWEEPS {
            let mut changed = false;
            for i in 0..n {
                let Some(keep) = digits[i].take() else {
                    continue;
                };
                let candidate = self.cheapest(i, colors, &digits);
                let next = if self.local_cost(i, candidate, &digits) < self.local_cost(i, keep, &digits) {
                    changed = true;
                    candidate
                } else {
                    keep
                };
                digits[i] = Some(next);
            }
            if !changed {
                trace!(sweeps = sweep + 1, "Min-conflict sweeps settled");
                break;
            }
        }

        digits.into_iter().flatten().collect()
    }

    fn cheapest(&self, i: usize, colors: &[Color], digits: &[Option<Color>]) -> Color {
        let mut best = (colors[0], u32::MAX);
        for &c in colors {
            let cost = self.local_cost(i, c, digits);
            if cost < best.1 {
                best = (c, cost);
            }
        }
        best.0
    }
}
