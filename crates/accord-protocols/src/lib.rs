//! Accord Protocols - Bilateral Negotiation Over a Partitioned Graph
//!
//! This crate decides, turn by turn, what one participant says to each of
//! its counterparts and how it reacts to what they say.
//!
//! # Overview
//!
//! The [`Negotiator`] owns everything one participant knows: its
//! [`LocalView`](accord_topology::LocalView) of the graph, its own
//! assignment, its beliefs about boundary nodes, and its offer tables.
//!
//! - **Moves**: a closed vocabulary ([`Move`]) plus two out-of-band phase
//!   signals ([`Control`]).
//! - **Offers**: conditions asked of the recipient paired with commitments
//!   from the sender. Each offer ends in exactly one of Accepted, Rejected
//!   or Superseded.
//! - **Rejection learning**: a rejected condition-set is never proposed to
//!   the same recipient again in the same round.
//! - **Deduplication**: a bounded history of content fingerprints keeps
//!   identical moves from being repeated.
//!
//! # Example
//!
//! ```rust,ignore
//! use accord_protocols::{Envelope, Negotiator, NegotiatorConfig};
//!
//! let config = NegotiatorConfig::from_env()?;
//! let mut alice = Negotiator::for_participant(&graph, alice_id, &config)?;
//! let mut bob = Negotiator::for_participant(&graph, bob_id, &config)?;
//! alice.begin_bargaining();
//! bob.begin_bargaining();
//!
//! loop {
//!     let mut quiet = true;
//!     if let Some(mv) = alice.step(bob_id)? {
//!         bob.receive(&Envelope::new(alice_id, bob_id, mv));
//!         quiet = false;
//!     }
//!     if let Some(mv) = bob.step(alice_id)? {
//!         alice.receive(&Envelope::new(bob_id, alice_id, mv));
//!         quiet = false;
//!     }
//!     if quiet {
//!         break;
//!     }
//! }
//! ```

pub mod config;
pub mod dedup;
pub mod decision;
pub mod error;
pub mod moves;
pub mod negotiator;
pub mod offer;
mod state;
pub mod tables;

pub use config::{AcceptanceThreshold, NegotiatorConfig};
pub use decision::{Effect, Transition};
pub use dedup::{DedupGuard, Fingerprint, DEFAULT_DEDUP_HISTORY};
pub use error::{Anomaly, Error, Result};
pub use moves::{Control, Envelope, Move, NodeColor, Payload, Reason};
pub use negotiator::{Ingest, Negotiator};
pub use offer::{Offer, OfferId, OfferLedger, OfferStatus};
pub use state::Phase;
pub use tables::{Beliefs, ConditionLog, PinSource, Pins, ProposedTable};

// Re-export the search types callers see through this crate.
pub use accord_consensus::{Coloring, ConditionSet, Outcome};
