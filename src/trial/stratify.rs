//! Exposure metric and stratum bucketing.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Datelike;

use super::error::TrialError;
use super::stats::quantile;
use super::types::{AuthorId, CitationPairRecord, PaperRecord, StratumAssignment};
use crate::models::Stratification;

/// Which citing works count toward the exposure metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureCutoff {
    /// Citing works frozen into the cohort at enrollment.
    Enrollment,
    /// Citing works dated in or before the given year.
    Year(i32),
}

impl ExposureCutoff {
    fn includes(&self, pair: &CitationPairRecord) -> bool {
        match self {
            Self::Enrollment => pair.counted_toward_cohort,
            Self::Year(year) => pair.citing_date.is_some_and(|d| d.year() <= *year),
        }
    }
}

/// Distinct contactable authors per paper, counting only pairs inside the
/// cutoff. Papers without any qualifying pair are absent (exposure 0).
pub fn exposure_metrics(
    pairs: &[CitationPairRecord],
    cutoff: ExposureCutoff,
) -> HashMap<String, i64> {
    let mut authors: HashMap<&str, HashSet<AuthorId>> = HashMap::new();
    for pair in pairs.iter().filter(|p| cutoff.includes(p)) {
        authors
            .entry(pair.paper_pmid.as_str())
            .or_default()
            .extend(pair.contactable_authors.iter().copied());
    }
    authors
        .into_iter()
        .map(|(pmid, set)| (pmid.to_string(), set.len() as i64))
        .collect()
}

pub fn exposure_of(exposures: &HashMap<String, i64>, pmid: &str) -> i64 {
    exposures.get(pmid).copied().unwrap_or(0)
}

// ═══════════════════════════════════════════════════════════
// Static cut table
// ═══════════════════════════════════════════════════════════

/// Monotone threshold table: exposure >= threshold maps to the bucket, the
/// highest matching threshold wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutTable {
    cuts: Vec<(u32, i64)>,
}

impl CutTable {
    pub fn new(cuts: &[(u32, i64)]) -> Result<Self, TrialError> {
        match cuts.first() {
            Some((0, _)) => {}
            _ => {
                return Err(TrialError::Config(
                    "static cut table must start at threshold 0".into(),
                ))
            }
        }
        if cuts.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(TrialError::Config(
                "static cut table thresholds must be strictly increasing".into(),
            ));
        }
        Ok(Self { cuts: cuts.to_vec() })
    }

    pub fn bucket(&self, exposure: i64) -> i64 {
        self.cuts
            .iter()
            .rev()
            .find(|(threshold, _)| exposure >= i64::from(*threshold))
            .map(|(_, bucket)| *bucket)
            .unwrap_or(self.cuts[0].1)
    }
}

// ═══════════════════════════════════════════════════════════
// Data-driven deciles
// ═══════════════════════════════════════════════════════════

/// Decile boundaries of one population, as (rounded boundary, index 1..=10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecileCuts {
    boundaries: Vec<(i64, i64)>,
}

impl DecileCuts {
    pub fn from_exposures(exposures: &[i64]) -> Result<Self, TrialError> {
        if exposures.is_empty() {
            return Err(TrialError::degenerate(
                "decile stratification",
                "no papers with exposure in the population",
            ));
        }
        let mut sorted: Vec<f64> = exposures.iter().map(|e| *e as f64).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        // Equal rounded boundaries keep the highest decile index.
        let mut by_boundary: BTreeMap<i64, i64> = BTreeMap::new();
        for index in 1..=10_i64 {
            let cut = quantile(&sorted, index as f64 / 10.0).ok_or_else(|| {
                TrialError::invariant("decile stratification", "quantile out of range")
            })?;
            by_boundary.insert(cut.round_ties_even() as i64, index);
        }
        Ok(Self { boundaries: by_boundary.into_iter().collect() })
    }

    /// Index of the smallest boundary >= exposure; 0 exposure is always 0.
    pub fn bucket(&self, exposure: i64) -> i64 {
        if exposure <= 0 {
            return 0;
        }
        self.boundaries
            .iter()
            .find(|(boundary, _)| *boundary >= exposure)
            .or(self.boundaries.last())
            .map(|(_, index)| *index)
            .unwrap_or(0)
    }

    pub fn boundaries(&self) -> &[(i64, i64)] {
        &self.boundaries
    }
}

/// One stratification scheme, built fresh for each population.
#[derive(Debug, Clone)]
pub enum Stratifier {
    Static(CutTable),
    Deciles(DecileCuts),
}

impl Stratifier {
    /// `population` is the exposure of every paper being stratified; only
    /// the decile scheme looks at it.
    pub fn build(
        scheme: Stratification,
        static_cuts: &[(u32, i64)],
        population: &[i64],
    ) -> Result<Self, TrialError> {
        Ok(match scheme {
            Stratification::Static => Self::Static(CutTable::new(static_cuts)?),
            Stratification::Deciles => Self::Deciles(DecileCuts::from_exposures(population)?),
        })
    }

    pub fn stratum(&self, exposure: i64) -> i64 {
        match self {
            Self::Static(table) => table.bucket(exposure),
            Self::Deciles(deciles) => deciles.bucket(exposure),
        }
    }
}

/// Assign a stratum to every paper, sorted by pmid.
pub fn stratify<'a>(
    papers: impl IntoIterator<Item = &'a PaperRecord>,
    exposures: &HashMap<String, i64>,
    stratifier: &Stratifier,
) -> Vec<StratumAssignment> {
    let mut rows: Vec<StratumAssignment> = papers
        .into_iter()
        .map(|p| StratumAssignment {
            pmid: p.pmid.clone(),
            stratum: stratifier.stratum(exposure_of(exposures, &p.pmid)),
        })
        .collect();
    rows.sort();

    let mut sizes: BTreeMap<i64, usize> = BTreeMap::new();
    for row in &rows {
        *sizes.entry(row.stratum).or_default() += 1;
    }
    for (stratum, size) in &sizes {
        tracing::debug!(stratum, size, "Stratum size");
    }
    tracing::info!(papers = rows.len(), strata = sizes.len(), "Stratified papers");
    rows
}
