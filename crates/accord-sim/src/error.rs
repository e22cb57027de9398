//! Error types for accord-sim.

use accord_topology::TopologyError;
use thiserror::Error;

/// Result type for accord-sim operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or running a simulation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("protocol error: {0}")]
    Protocol(#[from] accord_protocols::Error),

    #[error("scenario parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The scenario is well-formed JSON but refers to things that do not exist.
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("invalid configuration {key}={value}")]
    InvalidConfig { key: &'static str, value: String },
}
