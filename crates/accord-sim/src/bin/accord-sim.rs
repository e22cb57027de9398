//! Negotiation simulator binary
//!
//! Usage:
//!   accord-sim [scenario.json]
//!   accord-sim --random <seed>
//!
//! Prints the event timeline as JSON lines on stdout; logs go to stderr.

use accord_sim::{random, RandomConfig, Scenario, Simulation, SimulationConfig, TimelineSummary};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_SEED: u64 = 42;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accord=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let scenario = match args.first().map(String::as_str) {
        Some("--random") => {
            let seed = match args.get(1) {
                Some(s) => s.parse()?,
                None => DEFAULT_SEED,
            };
            tracing::info!(seed, "Generating random scenario");
            random(seed, &RandomConfig::default())
        }
        Some("-h") | Some("--help") => {
            print_usage();
            return Ok(());
        }
        Some(path) => {
            tracing::info!(path, "Loading scenario");
            Scenario::load(path)?
        }
        None => {
            tracing::info!(seed = DEFAULT_SEED, "No scenario given, using a random one");
            random(DEFAULT_SEED, &RandomConfig::default())
        }
    };

    let config = SimulationConfig::from_env()?;
    let mut sim = Simulation::from_scenario(&scenario, config)?;
    let outcome = sim.run()?;

    sim.write_timeline(std::io::stdout().lock())?;

    let summary = TimelineSummary::from_events(sim.events(), sim.events().len());
    tracing::info!(
        rounds = outcome.rounds,
        quiescent = outcome.quiescent,
        conflicts = outcome.global_conflicts,
        moves = summary.total_moves(),
        ignored = summary.ignored,
        exhausted = summary.exhausted,
        "Negotiation summary"
    );

    Ok(())
}

fn print_usage() {
    eprintln!("Usage: accord-sim [scenario.json]");
    eprintln!("       accord-sim --random <seed>");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ACCORD_MAX_ROUNDS          Round cap (default 100)");
    eprintln!("  ACCORD_EXHAUSTIVE_LIMIT    Exhaustive solver limit (default 10)");
    eprintln!("  ACCORD_ENUMERATION_LIMIT   Boundary enumeration limit (default 3)");
    eprintln!("  ACCORD_DEDUP_HISTORY       Deduplication window (default 5)");
    eprintln!("  ACCORD_ACCEPTANCE          at-most-current | below-current");
    eprintln!("  RUST_LOG                   Log filter (default accord=info)");
}
