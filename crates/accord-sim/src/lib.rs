//! Accord Negotiation Simulator
//!
//! Runs every participant of a partitioned graph in one process and records
//! what they say to each other.
//!
//! # Architecture
//!
//! - **Scenario**: Graph description plus Configure-phase commits, from JSON
//!   or a seeded random generator
//! - **Simulation**: Ordered per-pair channels and a round-based driver
//! - **Events**: Tagged timeline, exported as JSON lines
//!
//! # Usage
//!
//! ```ignore
//! let scenario = Scenario::load("demos/two_party.json")?;
//! let mut sim = Simulation::from_scenario(&scenario, SimulationConfig::default())?;
//! let outcome = sim.run()?;
//! sim.write_timeline(std::io::stdout().lock())?;
//! ```

mod error;
mod events;
pub mod scenario;
mod simulation;

pub use error::{Error, Result};
pub use events::{NegotiationEvent, TimelineSummary};
pub use scenario::{random, CommitSpec, RandomConfig, Scenario};
pub use simulation::{Outcome, Simulation, SimulationConfig, DEFAULT_MAX_ROUNDS};
