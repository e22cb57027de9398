//! Serializable graph description used by scenario files.
//!
//! ```json
//! {
//!   "colors": ["Red", "Green", "Blue"],
//!   "participants": [
//!     { "name": "agent", "nodes": [{ "name": "a1", "fixed": "Green" }, { "name": "a2" }] },
//!     { "name": "human", "nodes": [{ "name": "h1" }] }
//!   ],
//!   "edges": [["a1", "a2"], ["a2", "h1"]]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::color::Domain;
use crate::error::{Result, TopologyError};
use crate::graph::Graph;

/// A node declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<String>,
}

/// A participant and the nodes it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSpec {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

/// A complete graph description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSpec {
    #[serde(default = "default_colors")]
    pub colors: Vec<String>,
    pub participants: Vec<ParticipantSpec>,
    #[serde(default)]
    pub edges: Vec<(String, String)>,
}

fn default_colors() -> Vec<String> {
    vec!["Red".into(), "Green".into(), "Blue".into()]
}

impl Graph {
    /// Build and validate a graph from its description.
    pub fn from_spec(spec: &GraphSpec) -> Result<Self> {
        let domain = Domain::new(spec.colors.iter().cloned())?;
        let mut builder = Graph::builder(domain.clone());

        for participant in &spec.participants {
            let owner = builder.participant(&participant.name)?;
            for node in &participant.nodes {
                match &node.fixed {
                    Some(name) => {
                        let color = domain
                            .parse(name)
                            .ok_or_else(|| TopologyError::UnknownColor(name.clone()))?;
                        builder.fixed_node(&node.name, owner, color)?;
                    }
                    None => {
                        builder.node(&node.name, owner)?;
                    }
                }
            }
        }

        for (x, y) in &spec.edges {
            builder.edge_by_name(x, y)?;
        }

        Ok(builder.build())
    }
}
