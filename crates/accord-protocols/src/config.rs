//! Negotiator tuning.

use std::fmt;
use std::str::FromStr;

use accord_consensus::{Generator, Solver, DEFAULT_ENUMERATION_LIMIT, DEFAULT_EXHAUSTIVE_LIMIT};

use crate::dedup::DEFAULT_DEDUP_HISTORY;
use crate::error::{Error, Result};

/// When an incoming offer is good enough to accept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AcceptanceThreshold {
    /// Accept when the resulting penalty is at most the current one.
    ///
    /// Neutral offers are accepted, so two participants that are already
    /// penalty-equal do not block each other.
    #[default]
    AtMostCurrent,
    /// Accept only strict improvements.
    BelowCurrent,
}

impl AcceptanceThreshold {
    pub const fn admits(&self, resulting: u32, current: u32) -> bool {
        match self {
            Self::AtMostCurrent => resulting <= current,
            Self::BelowCurrent => resulting < current,
        }
    }
}

impl fmt::Display for AcceptanceThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtMostCurrent => write!(f, "at-most-current"),
            Self::BelowCurrent => write!(f, "below-current"),
        }
    }
}

impl FromStr for AcceptanceThreshold {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "at-most-current" | "at_most_current" | "<=" | "weak" => Ok(Self::AtMostCurrent),
            "below-current" | "below_current" | "<" | "strict" => Ok(Self::BelowCurrent),
            _ => Err(Error::InvalidConfig {
                key: "ACCORD_ACCEPTANCE",
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration for a [`Negotiator`](crate::Negotiator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatorConfig {
    /// Free-node count up to which the solver searches exhaustively.
    pub exhaustive_limit: usize,

    /// Boundary size up to which every counterpart coloring is enumerated.
    pub enumeration_limit: usize,

    /// Number of recent (recipient, content) pairs the deduplication guard keeps.
    pub dedup_history: usize,

    pub acceptance: AcceptanceThreshold,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            exhaustive_limit: DEFAULT_EXHAUSTIVE_LIMIT,
            enumeration_limit: DEFAULT_ENUMERATION_LIMIT,
            dedup_history: DEFAULT_DEDUP_HISTORY,
            acceptance: AcceptanceThreshold::default(),
        }
    }
}

impl NegotiatorConfig {
    /// Defaults overridden by `ACCORD_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `ACCORD_*` key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("ACCORD_EXHAUSTIVE_LIMIT") {
            config.exhaustive_limit = parse_usize("ACCORD_EXHAUSTIVE_LIMIT", &v)?;
        }
        if let Some(v) = lookup("ACCORD_ENUMERATION_LIMIT") {
            config.enumeration_limit = parse_usize("ACCORD_ENUMERATION_LIMIT", &v)?;
        }
        if let Some(v) = lookup("ACCORD_DEDUP_HISTORY") {
            config.dedup_history = parse_usize("ACCORD_DEDUP_HISTORY", &v)?;
        }
        if let Some(v) = lookup("ACCORD_ACCEPTANCE") {
            config.acceptance = v.parse()?;
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_exhaustive_limit(mut self, limit: usize) -> Self {
        self.exhaustive_limit = limit;
        self
    }

    #[must_use]
    pub fn with_enumeration_limit(mut self, limit: usize) -> Self {
        self.enumeration_limit = limit;
        self
    }

    #[must_use]
    pub fn with_dedup_history(mut self, history: usize) -> Self {
        self.dedup_history = history;
        self
    }

    #[must_use]
    pub fn with_acceptance(mut self, acceptance: AcceptanceThreshold) -> Self {
        self.acceptance = acceptance;
        self
    }

    pub(crate) fn generator(&self) -> Generator {
        Generator::new(Solver::new(self.exhaustive_limit), self.enumeration_limit)
    }
}

fn parse_usize(key: &'static str, value: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| Error::InvalidConfig {
        key,
        value: value.to_string(),
    })
}
