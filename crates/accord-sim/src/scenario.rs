//! Scenario files and seeded random scenarios.
//!
//! A scenario is a [`GraphSpec`] plus optional commits applied during
//! Configure:
//!
//! ```json
//! {
//!   "participants": [
//!     { "name": "agent", "nodes": [{ "name": "a1", "fixed": "Green" }, { "name": "a2" }] },
//!     { "name": "human", "nodes": [{ "name": "h1" }] }
//!   ],
//!   "edges": [["a1", "a2"], ["a2", "h1"]],
//!   "commits": [{ "node": "h1", "color": "Red" }]
//! }
//! ```

use std::path::Path;

use accord_topology::{Color, Graph, GraphSpec, NodeId, NodeSpec, ParticipantSpec};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A manual recoloring made before bargaining starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSpec {
    pub node: String,
    pub color: String,
}

/// A graph plus its Configure-phase commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(flatten)]
    pub graph: GraphSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commits: Vec<CommitSpec>,
}

impl Scenario {
    /// Read a scenario from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build and validate the graph.
    pub fn build(&self) -> Result<Graph> {
        Ok(Graph::from_spec(&self.graph)?)
    }

    /// Resolve commits against a graph built from this scenario.
    pub fn resolve_commits(&self, graph: &Graph) -> Result<Vec<(NodeId, Color)>> {
        self.commits
            .iter()
            .map(|commit| {
                let node = graph
                    .node_id(&commit.node)
                    .ok_or_else(|| Error::InvalidScenario(format!("unknown node {}", commit.node)))?;
                let color = graph
                    .domain()
                    .parse(&commit.color)
                    .ok_or_else(|| Error::InvalidScenario(format!("unknown color {}", commit.color)))?;
                Ok((node, color))
            })
            .collect()
    }
}

/// Shape of a random scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomConfig {
    pub participants: usize,
    pub nodes_per_participant: usize,
    /// Chance that any given pair of nodes is joined by an edge.
    pub edge_probability: f64,
    /// Chance that a node is fixed to a random color.
    pub fixed_probability: f64,
}

impl Default for RandomConfig {
    fn default() -> Self {
        Self {
            participants: 2,
            nodes_per_participant: 4,
            edge_probability: 0.35,
            fixed_probability: 0.25,
        }
    }
}

impl RandomConfig {
    #[must_use]
    pub fn with_participants(mut self, participants: usize) -> Self {
        self.participants = participants;
        self
    }

    #[must_use]
    pub fn with_nodes_per_participant(mut self, nodes: usize) -> Self {
        self.nodes_per_participant = nodes;
        self
    }

    #[must_use]
    pub fn with_edge_probability(mut self, probability: f64) -> Self {
        self.edge_probability = probability.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_fixed_probability(mut self, probability: f64) -> Self {
        self.fixed_probability = probability.clamp(0.0, 1.0);
        self
    }
}

/// Generate a scenario. The same seed always yields the same scenario.
pub fn random(seed: u64, config: &RandomConfig) -> Scenario {
    let mut rng = StdRng::seed_from_u64(seed);
    let colors = vec!["Red".to_string(), "Green".to_string(), "Blue".to_string()];

    let participants: Vec<ParticipantSpec> = (0..config.participants)
        .map(|p| ParticipantSpec {
            name: format!("p{p}"),
            nodes: (0..config.nodes_per_participant)
                .map(|n| NodeSpec {
                    name: format!("p{p}n{n}"),
                    fixed: rng
                        .gen_bool(config.fixed_probability)
                        .then(|| colors[rng.gen_range(0..colors.len())].clone()),
                })
                .collect(),
        })
        .collect();

    let names: Vec<&str> = participants
        .iter()
        .flat_map(|p| p.nodes.iter().map(|n| n.name.as_str()))
        .collect();
    let mut edges = Vec::new();
    for (i, x) in names.iter().enumerate() {
        for y in &names[i + 1..] {
            if rng.gen_bool(config.edge_probability) {
                edges.push((x.to_string(), y.to_string()));
            }
        }
    }

    Scenario {
        graph: GraphSpec {
            colors,
            participants,
            edges,
        },
        commits: Vec::new(),
    }
}
