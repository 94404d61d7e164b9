//! TrialRunner: drives the engine stages against a cohort repository.
//!
//! Every operation takes one snapshot, computes in memory, and writes back
//! through the repository in whole units.

use chrono::NaiveDate;
use rand::RngCore;
use uuid::Uuid;

use super::dataset::*;
use super::error::TrialError;
use super::exclusion::{apply_exclusions, ExclusionOutcome};
use super::randomize::{allocation_digest, randomise_authoritative, RandomisationRequest};
use super::stratify::{exposure_metrics, stratify, ExposureCutoff, Stratifier};
use super::summary::{balance_summary, flow_report, BalanceSummary, FlowReport};
use super::traits::{CohortRepository, RandomisationCommit};
use super::types::{Allocation, PaperRecord};
use crate::config::TrialConfig;
use crate::models::{Arm, Stratification};

const STAGE: &str = "randomisation";

/// What `stratify_and_randomise` did.
#[derive(Debug, Clone)]
pub struct RandomisationOutcome {
    /// Set only when a new allocation was written.
    pub run_id: Option<String>,
    pub seed: Option<u64>,
    pub allocation: Allocation,
    pub summary: BalanceSummary,
}

impl RandomisationOutcome {
    pub fn committed(&self) -> bool {
        self.run_id.is_some()
    }
}

pub struct TrialRunner<'r> {
    repo: &'r dyn CohortRepository,
    config: TrialConfig,
}

impl<'r> TrialRunner<'r> {
    pub fn new(repo: &'r dyn CohortRepository, config: TrialConfig) -> Self {
        Self { repo, config }
    }

    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    /// Configured seed, or a fresh one from the OS. Always logged so the
    /// draw can be reproduced.
    fn base_seed(&self) -> u64 {
        let seed = self.config.seed.unwrap_or_else(|| rand::thread_rng().next_u64());
        tracing::info!(seed, "Using randomisation seed");
        seed
    }

    /// Reset (optionally) and run every exclusion rule over pending papers.
    pub fn reset_and_exclude(&self, reset: bool) -> Result<ExclusionOutcome, TrialError> {
        if reset {
            self.repo.reset(&self.config.pilot_pmids)?;
        }
        let snapshot = self.repo.snapshot()?;
        let mut papers = snapshot.papers;
        let outcome = apply_exclusions(&mut papers, &snapshot.pairs, &self.config);
        let written = self.repo.record_exclusions(&outcome.excluded)?;
        if written != outcome.excluded.len() {
            return Err(TrialError::invariant(
                "exclusion",
                format!("{} exclusions computed, {written} written", outcome.excluded.len()),
            ));
        }

        let summary = flow_report(&papers, self.repo.notice_count()?);
        for (reason, count) in &summary.excluded {
            tracing::info!(reason = reason.as_str(), count, "Exclusion summary");
        }
        tracing::info!(pending = outcome.pending, "Exclusion pass complete");
        Ok(outcome)
    }

    /// Stratify the pending papers on the static table and randomise them.
    ///
    /// With `check_only` nothing is written: an existing allocation is
    /// summarised as stored, otherwise a draw is made and summarised.
    pub fn stratify_and_randomise(
        &self,
        check_only: bool,
        reference_year: i32,
    ) -> Result<RandomisationOutcome, TrialError> {
        if self.repo.contactable_pair_count()? == 0 {
            return Err(TrialError::precondition(
                STAGE,
                "No contactable authors, did you run reset-and-exclude?",
            ));
        }

        let snapshot = self.repo.snapshot()?;
        let assigned = snapshot.papers.iter().filter(|p| p.arm.is_randomised()).count();
        if assigned > 0 {
            if check_only {
                // Stored flags: citing works added after enrollment stay uncounted.
                let exposures = exposure_metrics(&snapshot.pairs, ExposureCutoff::Enrollment);
                let summary = balance_summary(&snapshot.papers, &exposures, reference_year);
                tracing::info!("Existing randomisation:\n{summary}");
                return Ok(RandomisationOutcome {
                    run_id: None,
                    seed: None,
                    allocation: stored_allocation(&snapshot.papers),
                    summary,
                });
            }
            return Err(TrialError::precondition(
                STAGE,
                format!("Should not randomise twice: {assigned} papers already assigned"),
            ));
        }

        // Exposure as it will be once enrollment is frozen.
        let snapshot = snapshot.with_enrollment_frozen();
        let exposures = exposure_metrics(&snapshot.pairs, ExposureCutoff::Enrollment);

        let pending: Vec<&PaperRecord> = snapshot.papers_in(&[Arm::Pending]).collect();
        let stratifier = Stratifier::build(Stratification::Static, &self.config.static_cuts, &[])?;
        let table = stratify(pending.iter().copied(), &exposures, &stratifier);

        let seed = self.base_seed();
        let allocation = randomise_authoritative(&table, &RandomisationRequest::authoritative(seed))?;

        let mut drawn: Vec<PaperRecord> = pending.into_iter().cloned().collect();
        for (paper, row) in drawn.iter_mut().zip(&table) {
            paper.stratum = Some(row.stratum);
            paper.arm = allocation.arm_of(&paper.pmid).unwrap_or(Arm::Pending);
        }
        let summary = balance_summary(&drawn, &exposures, reference_year);

        if check_only || table.is_empty() {
            if table.is_empty() {
                tracing::warn!("No pending papers to randomise");
            }
            tracing::info!("Proposed randomisation (not saved):\n{summary}");
            return Ok(RandomisationOutcome { run_id: None, seed: Some(seed), allocation, summary });
        }

        let commit = RandomisationCommit {
            run_id: Uuid::new_v4().to_string(),
            seed,
            digest: allocation_digest(&allocation),
            strata: table,
            allocation,
        };
        self.repo.commit_randomisation(&commit)?;
        tracing::info!(
            run_id = %commit.run_id,
            intervention = commit.allocation.count(Arm::Intervention),
            control = commit.allocation.count(Arm::Control),
            strata = commit.allocation.strata,
            digest = %commit.digest,
            "Randomisation committed"
        );
        tracing::info!("Randomisation balance:\n{summary}");

        Ok(RandomisationOutcome {
            run_id: Some(commit.run_id),
            seed: Some(seed),
            allocation: commit.allocation,
            summary,
        })
    }

    /// Pre-registration simulation. Never writes to the repository.
    pub fn simulate(
        &self,
        year: i32,
        runs: usize,
        schemes: &[Stratification],
    ) -> Result<SimulationDataset, TrialError> {
        let settings = SimulationSettings {
            year,
            runs,
            workers: self.config.workers,
            seed: self.base_seed(),
            schemes: schemes.to_vec(),
        };
        let snapshot = self.repo.snapshot()?;
        build_simulation_dataset(&snapshot, &self.config, &settings)
    }

    /// Analysis dataset for a follow-up window starting at `follow_up`.
    pub fn build_dataset(&self, follow_up: NaiveDate) -> Result<Vec<AnalysisRow>, TrialError> {
        let window = FollowUpWindow::new(follow_up, self.config.follow_up_days)?;
        let snapshot = self.repo.snapshot()?;
        build_analysis_dataset(&snapshot, &window)
    }

    pub fn flowchart(&self) -> Result<FlowReport, TrialError> {
        Ok(flow_report(&self.repo.load_papers()?, self.repo.notice_count()?))
    }
}

fn stored_allocation(papers: &[PaperRecord]) -> Allocation {
    let assignments: Vec<(String, Arm)> = papers
        .iter()
        .filter(|p| p.arm.is_randomised())
        .map(|p| (p.pmid.clone(), p.arm))
        .collect();
    let mut strata: Vec<i64> = papers
        .iter()
        .filter(|p| p.arm.is_randomised())
        .filter_map(|p| p.stratum)
        .collect();
    strata.sort_unstable();
    strata.dedup();
    Allocation { assignments, strata: strata.len() }
}
