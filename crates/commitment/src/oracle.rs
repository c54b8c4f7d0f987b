//! Boundary to the survey oracle (the on-chain verifier and result registry).
//!
//! Callers pass structured arguments and get back either a value or a
//! [`Rejection`] carrying the oracle's reason. [`LocalOracle`] is an
//! in-process implementation for tests and offline checks.

use std::collections::BTreeMap;

use field::Digest;
use merkle::verify_proof;
use thiserror::Error;
use tracing::{debug, info};
use utils::{decode_prefixed_hex32, decode_proof, to_prefixed_hex};

pub const DEFAULT_DOMAIN: &str = "porpoise.network";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("oracle rejected call: {reason}")]
pub struct Rejection {
    pub reason: String,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub trait SurveyOracle {
    /// Domain registered at `index`.
    fn domain(&self, index: usize) -> Result<String, Rejection>;

    /// Register a survey by its commitment root.
    fn register_survey(&mut self, survey: &Digest, deadline: u64) -> Result<(), Rejection>;

    /// Record the resolved outcome of a survey.
    fn record_result(&mut self, survey: &Digest, outcome: &Digest) -> Result<(), Rejection>;

    /// Sorted-pair inclusion check over `0x`-prefixed hex literals.
    fn verify(&self, proof: &[String], root: &str, leaf: &str) -> Result<bool, Rejection>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub survey: Digest,
    pub outcome: Digest,
}

#[derive(Clone, Debug)]
pub struct LocalOracle {
    domains: Vec<String>,
    now: u64,
    deadlines: BTreeMap<Digest, u64>,
    results: BTreeMap<Digest, Digest>,
    events: Vec<Resolution>,
}

impl Default for LocalOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalOracle {
    pub fn new() -> Self {
        Self::with_domains(vec![DEFAULT_DOMAIN.to_string()])
    }

    pub fn with_domains(domains: Vec<String>) -> Self {
        Self {
            domains,
            now: 0,
            deadlines: BTreeMap::new(),
            results: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    /// Set the oracle's clock (unix seconds) used for deadline checks.
    pub fn set_time(&mut self, now: u64) {
        self.now = now;
    }

    pub fn deadline(&self, survey: &Digest) -> Option<u64> {
        self.deadlines.get(survey).copied()
    }

    pub fn result(&self, survey: &Digest) -> Option<Digest> {
        self.results.get(survey).copied()
    }

    /// Resolution events in emission order.
    pub fn events(&self) -> &[Resolution] {
        &self.events
    }
}

impl SurveyOracle for LocalOracle {
    fn domain(&self, index: usize) -> Result<String, Rejection> {
        self.domains
            .get(index)
            .cloned()
            .ok_or_else(|| Rejection::new(format!("no domain at index {index}")))
    }

    fn register_survey(&mut self, survey: &Digest, deadline: u64) -> Result<(), Rejection> {
        if deadline <= self.now {
            return Err(Rejection::new("deadline must be in the future"));
        }
        if self.deadlines.contains_key(survey) {
            return Err(Rejection::new("survey already registered"));
        }
        self.deadlines.insert(*survey, deadline);
        debug!(survey = %to_prefixed_hex(survey), deadline, "registered survey");
        Ok(())
    }

    fn record_result(&mut self, survey: &Digest, outcome: &Digest) -> Result<(), Rejection> {
        if self.results.contains_key(survey) {
            return Err(Rejection::new("result already recorded"));
        }
        self.results.insert(*survey, *outcome);
        self.events.push(Resolution {
            survey: *survey,
            outcome: *outcome,
        });
        info!(
            survey = %to_prefixed_hex(survey),
            outcome = %to_prefixed_hex(outcome),
            "resolution recorded"
        );
        Ok(())
    }

    fn verify(&self, proof: &[String], root: &str, leaf: &str) -> Result<bool, Rejection> {
        let reject = |e: utils::WireError| Rejection::new(e.to_string());
        let siblings = decode_proof(proof).map_err(reject)?;
        let root = decode_prefixed_hex32(root).map_err(reject)?;
        let leaf = decode_prefixed_hex32(leaf).map_err(reject)?;
        Ok(verify_proof(&leaf, &siblings, &root))
    }
}
