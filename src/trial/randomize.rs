//! Balanced within-stratum randomisation.
//!
//! One authoritative run is persisted; simulation runs execute on a
//! fixed-size worker pool over a shared read-only stratum table and come
//! back in submission order.

use std::collections::{BTreeMap, BTreeSet};

use base64::Engine;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use sha2::{Digest, Sha256};

use super::error::TrialError;
use super::types::{Allocation, StratumAssignment};
use crate::models::Arm;

const STAGE: &str = "randomisation";

/// How many draws to make and whether the single draw is persisted.
#[derive(Debug, Clone, Copy)]
pub struct RandomisationRequest {
    pub runs: usize,
    pub persist: bool,
    pub workers: usize,
    pub seed: u64,
}

impl RandomisationRequest {
    pub fn authoritative(seed: u64) -> Self {
        Self { runs: 1, persist: true, workers: 1, seed }
    }

    pub fn simulation(runs: usize, workers: usize, seed: u64) -> Self {
        Self { runs, persist: false, workers, seed }
    }

    /// Simulation and persistence are mutually exclusive.
    pub fn validate(&self) -> Result<(), TrialError> {
        if self.runs == 0 {
            return Err(TrialError::Config("at least one randomisation run is required".into()));
        }
        if self.persist && self.runs != 1 {
            return Err(TrialError::Config(format!(
                "persisting a randomisation requires exactly one run, {} were requested",
                self.runs
            )));
        }
        if self.workers == 0 {
            return Err(TrialError::Config("worker pool size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Seed for the `run`th draw of a batch.
pub fn run_seed(base: u64, run: usize) -> u64 {
    base.wrapping_add(run as u64)
}

/// Split every stratum in half at random.
///
/// Grouping and draw order depend only on (stratum, pmid), so the same rng
/// state always yields the same split. Within a stratum of n papers the
/// lowest n/2 draws go to intervention, the highest n/2 to control, and a
/// fair coin places the middle paper when n is odd.
pub fn randomise<R: Rng>(table: &[StratumAssignment], rng: &mut R) -> Allocation {
    let mut strata: BTreeMap<i64, Vec<&str>> = BTreeMap::new();
    for row in table {
        strata.entry(row.stratum).or_default().push(row.pmid.as_str());
    }

    let mut assignments: Vec<(String, Arm)> = Vec::with_capacity(table.len());
    for (stratum, pmids) in strata.iter_mut() {
        pmids.sort_unstable();
        let mut draws: Vec<(f64, &str)> = pmids.iter().map(|p| (rng.gen::<f64>(), *p)).collect();
        draws.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));

        let total = draws.len();
        let half = total / 2;
        for (rank, (_, pmid)) in draws.iter().enumerate() {
            let arm = if rank < half {
                Arm::Intervention
            } else if rank >= total - half {
                Arm::Control
            } else if rng.gen_bool(0.5) {
                Arm::Intervention
            } else {
                Arm::Control
            };
            assignments.push((pmid.to_string(), arm));
        }
        tracing::debug!(stratum = *stratum, size = total, "Randomised stratum");
    }

    assignments.sort_by(|a, b| a.0.cmp(&b.0));
    Allocation { assignments, strata: strata.len() }
}

/// Self-check run after every draw. A failure here is a bug.
pub fn verify_allocation(
    table: &[StratumAssignment],
    allocation: &Allocation,
) -> Result<(), TrialError> {
    let expected: BTreeSet<&str> = table.iter().map(|r| r.pmid.as_str()).collect();
    let assigned: BTreeSet<&str> = allocation.assignments.iter().map(|(p, _)| p.as_str()).collect();
    if expected.len() != table.len() {
        return Err(TrialError::invariant(STAGE, "paper listed in more than one stratum"));
    }
    if assigned.len() != allocation.assignments.len() || assigned != expected {
        return Err(TrialError::invariant(STAGE, "every paper must be assigned exactly once"));
    }

    let mut per_stratum: BTreeMap<i64, (i64, i64)> = BTreeMap::new();
    for row in table {
        let counts = per_stratum.entry(row.stratum).or_default();
        match allocation.arm_of(&row.pmid) {
            Some(Arm::Intervention) => counts.0 += 1,
            Some(Arm::Control) => counts.1 += 1,
            other => {
                return Err(TrialError::invariant(
                    STAGE,
                    format!("paper {} allocated to {:?}", row.pmid, other),
                ))
            }
        }
    }
    for (stratum, (intervention, control)) in &per_stratum {
        if (intervention - control).abs() > 1 {
            return Err(TrialError::invariant(
                STAGE,
                format!("stratum {stratum} imbalance {intervention} vs {control}"),
            ));
        }
    }

    let imbalance =
        (allocation.count(Arm::Intervention) as i64 - allocation.count(Arm::Control) as i64).abs();
    if imbalance > per_stratum.len() as i64 {
        return Err(TrialError::invariant(
            STAGE,
            format!("total imbalance {imbalance} exceeds {} strata", per_stratum.len()),
        ));
    }
    Ok(())
}

/// Run `request.runs` independent draws on a pool of `request.workers`.
/// Results are in run order whatever order the workers finish in.
pub fn simulate(
    table: &[StratumAssignment],
    request: &RandomisationRequest,
) -> Result<Vec<Allocation>, TrialError> {
    request.validate()?;
    if request.persist {
        return Err(TrialError::Config("simulation runs are never persisted".into()));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(request.workers)
        .thread_name(|i| format!("randomise-{i}"))
        .build()
        .map_err(|e| TrialError::WorkerPool(e.to_string()))?;

    tracing::info!(
        runs = request.runs,
        workers = request.workers,
        seed = request.seed,
        papers = table.len(),
        "Running simulated randomisations"
    );

    pool.install(|| {
        (0..request.runs)
            .into_par_iter()
            .map(|run| {
                let mut rng = StdRng::seed_from_u64(run_seed(request.seed, run));
                let allocation = randomise(table, &mut rng);
                verify_allocation(table, &allocation)?;
                Ok(allocation)
            })
            .collect()
    })
}

/// The single persisted draw.
pub fn randomise_authoritative(
    table: &[StratumAssignment],
    request: &RandomisationRequest,
) -> Result<Allocation, TrialError> {
    request.validate()?;
    if !request.persist {
        return Err(TrialError::Config("authoritative randomisation must be persisted".into()));
    }
    let mut rng = StdRng::seed_from_u64(request.seed);
    let allocation = randomise(table, &mut rng);
    verify_allocation(table, &allocation)?;
    Ok(allocation)
}

/// Fingerprint of an allocation, stored next to it for audit.
pub fn allocation_digest(allocation: &Allocation) -> String {
    let mut hasher = Sha256::new();
    for (pmid, arm) in &allocation.assignments {
        hasher.update(pmid.as_bytes());
        hasher.update(b"\t");
        hasher.update(arm.as_str().as_bytes());
        hasher.update(b"\n");
    }
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}
