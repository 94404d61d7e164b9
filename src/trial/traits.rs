//! The cohort store seen from the engine.
//!
//! The engine never queries mid-pass: it loads a snapshot, computes, and
//! hands back whole write sets. Implementations must give read-after-write
//! consistency within one invocation.

use std::collections::BTreeSet;

use super::error::TrialError;
use super::types::*;
use crate::models::ExclusionReason;

/// Everything written by the single authoritative randomisation.
#[derive(Debug, Clone)]
pub struct RandomisationCommit {
    pub run_id: String,
    pub seed: u64,
    pub strata: Vec<StratumAssignment>,
    pub allocation: Allocation,
    pub digest: String,
}

pub trait CohortRepository {
    /// All retracted papers with their earliest notice date.
    fn load_papers(&self) -> Result<Vec<PaperRecord>, TrialError>;

    /// All citation pairs with contactable authors. Fails when contactability
    /// has never been derived, so it can't be mistaken for "nobody".
    fn load_citation_pairs(&self) -> Result<Vec<CitationPairRecord>, TrialError>;

    /// Materialise the working set once.
    fn snapshot(&self) -> Result<CohortSnapshot, TrialError> {
        Ok(CohortSnapshot::new(self.load_papers()?, self.load_citation_pairs()?))
    }

    /// Return every paper to pending, re-mark pilot papers, and re-derive
    /// comparison dates and contactable authors.
    fn reset(&self, pilot_pmids: &BTreeSet<String>) -> Result<(), TrialError>;

    /// Persist newly excluded papers. Only pending rows change.
    fn record_exclusions(
        &self,
        exclusions: &[(String, ExclusionReason)],
    ) -> Result<usize, TrialError>;

    /// Number of retraction notices, for the flow report.
    fn notice_count(&self) -> Result<i64, TrialError>;

    /// Number of pairs with at least one contactable author.
    fn contactable_pair_count(&self) -> Result<i64, TrialError>;

    /// Freeze enrollment, write strata and arms as one atomic unit. Must
    /// refuse if any paper is already randomised.
    fn commit_randomisation(&self, commit: &RandomisationCommit) -> Result<(), TrialError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_is_object_safe() {
        fn _assert(_: &dyn CohortRepository) {}
    }
}
