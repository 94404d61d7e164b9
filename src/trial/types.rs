//! Snapshot types the engine works on.
//!
//! The working set is materialised once from the repository and never
//! re-queried mid-pass; simulation workers share it read-only.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::{Arm, ExclusionReason};

pub type AuthorId = i64;

/// Everything the engine needs to know about one retracted paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperRecord {
    pub pmid: String,
    pub comparison_date: Option<NaiveDate>,
    pub earliest_notice_date: Option<NaiveDate>,
    pub pilot: bool,
    pub arm: Arm,
    pub exclusion_reason: Option<ExclusionReason>,
    pub stratum: Option<i64>,
}

impl PaperRecord {
    pub fn publication_year(&self) -> Option<i32> {
        self.comparison_date.map(|d| d.year())
    }

    pub fn notice_year(&self) -> Option<i32> {
        self.earliest_notice_date.map(|d| d.year())
    }
}

/// One (retracted paper, citing work) edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationPairRecord {
    pub paper_pmid: String,
    pub citing_id: String,
    pub citing_date: Option<NaiveDate>,
    pub contactable_authors: Vec<AuthorId>,
    /// Frozen at enrollment: counted toward the pre-randomisation exposure.
    pub counted_toward_cohort: bool,
}

/// Immutable working set for one pipeline pass.
#[derive(Debug, Clone, Default)]
pub struct CohortSnapshot {
    /// Sorted by pmid.
    pub papers: Vec<PaperRecord>,
    pub pairs: Vec<CitationPairRecord>,
}

impl CohortSnapshot {
    pub fn new(mut papers: Vec<PaperRecord>, pairs: Vec<CitationPairRecord>) -> Self {
        papers.sort_by(|a, b| a.pmid.cmp(&b.pmid));
        Self { papers, pairs }
    }

    pub fn papers_in(&self, arms: &[Arm]) -> impl Iterator<Item = &PaperRecord> {
        let arms = arms.to_vec();
        self.papers.iter().filter(move |p| arms.contains(&p.arm))
    }

    /// The in-memory equivalent of the enrollment freeze.
    pub fn with_enrollment_frozen(&self) -> Self {
        let mut frozen = self.clone();
        for pair in &mut frozen.pairs {
            pair.counted_toward_cohort = true;
        }
        frozen
    }
}

/// One row of the randomiser's input table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct StratumAssignment {
    pub pmid: String,
    pub stratum: i64,
}

/// Result of one randomisation: every input paper in exactly one arm.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    /// (pmid, arm) sorted by pmid.
    pub assignments: Vec<(String, Arm)>,
    pub strata: usize,
}

impl Allocation {
    pub fn count(&self, arm: Arm) -> usize {
        self.assignments.iter().filter(|(_, a)| *a == arm).count()
    }

    pub fn arm_of(&self, pmid: &str) -> Option<Arm> {
        self.assignments
            .binary_search_by(|(p, _)| p.as_str().cmp(pmid))
            .ok()
            .map(|i| self.assignments[i].1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(pmid: &str, arm: Arm) -> PaperRecord {
        PaperRecord {
            pmid: pmid.into(),
            comparison_date: NaiveDate::from_ymd_opt(2015, 3, 1),
            earliest_notice_date: None,
            pilot: false,
            arm,
            exclusion_reason: None,
            stratum: None,
        }
    }

    #[test]
    fn snapshot_sorts_papers_by_pmid() {
        let snapshot = CohortSnapshot::new(
            vec![paper("20", Arm::Pending), paper("100", Arm::Pending), paper("3", Arm::Pending)],
            vec![],
        );
        let ids: Vec<&str> = snapshot.papers.iter().map(|p| p.pmid.as_str()).collect();
        assert_eq!(ids, vec!["100", "20", "3"]);
    }

    #[test]
    fn papers_in_filters_by_arm() {
        let snapshot = CohortSnapshot::new(
            vec![paper("1", Arm::Intervention), paper("2", Arm::Excluded), paper("3", Arm::Control)],
            vec![],
        );
        assert_eq!(snapshot.papers_in(&[Arm::Intervention, Arm::Control]).count(), 2);
        assert_eq!(snapshot.papers[0].publication_year(), Some(2015));
    }

    #[test]
    fn allocation_lookup() {
        let allocation = Allocation {
            assignments: vec![("1".into(), Arm::Control), ("2".into(), Arm::Intervention)],
            strata: 1,
        };
        assert_eq!(allocation.arm_of("2"), Some(Arm::Intervention));
        assert_eq!(allocation.arm_of("9"), None);
        assert_eq!(allocation.count(Arm::Control), 1);
    }
}
