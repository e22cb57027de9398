//! Accord Consensus
//!
//! The local reasoning one participant does between messages:
//!
//! - [`penalty`]: count conflicting edges under a coloring.
//! - [`Solver`]: find the minimum-conflict coloring of the free nodes given
//!   what is already settled and what is believed about the boundary.
//! - [`Generator`]: search hypothetical colorings of a counterpart's
//!   boundary and pick the one worth proposing.
//!
//! Everything here is a pure function of its inputs. Message handling and
//! negotiation state live in `accord-protocols`.

mod counterfactual;
mod penalty;
mod solver;

pub use counterfactual::{
    ConditionSet, Counterfactual, Generator, History, Outcome, SearchSpace,
    DEFAULT_ENUMERATION_LIMIT,
};
pub use penalty::{conflicting_edges, penalty, penalty_of, Coloring};
pub use solver::{Problem, Solution, Solver, DEFAULT_EXHAUSTIVE_LIMIT};
