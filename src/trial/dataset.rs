//! Analysis and simulation datasets.
//!
//! Both exports share one column layout. The simulation file drops `arm`
//! and `contaminated` and appends one `run_<i>` column per simulated draw.
//! A simulation over several stratification schemes prefixes its stratum
//! and run columns with the scheme name.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use tempfile::NamedTempFile;

use super::contamination::detect_contamination;
use super::error::TrialError;
use super::randomize::{simulate, RandomisationRequest};
use super::stats::quartile_labels;
use super::stratify::{exposure_metrics, exposure_of, stratify, ExposureCutoff, Stratifier};
use super::types::{CitationPairRecord, CohortSnapshot, PaperRecord};
use crate::config::TrialConfig;
use crate::models::{Arm, Stratification};

const STAGE: &str = "dataset";

pub const ANALYSIS_COLUMNS: [&str; 10] = [
    "paper_id",
    "arm",
    "stratum",
    "exposure_metric",
    "citation_count",
    "years_since_retraction",
    "years_since_publication",
    "years_since_retraction_q4",
    "years_since_publication_q4",
    "contaminated",
];

/// Half-open follow-up window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUpWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FollowUpWindow {
    pub fn new(start: NaiveDate, days: i64) -> Result<Self, TrialError> {
        let end = u64::try_from(days)
            .ok()
            .filter(|d| *d > 0)
            .and_then(|d| start.checked_add_days(Days::new(d)))
            .ok_or_else(|| TrialError::Config(format!("invalid follow-up length: {days} days")))?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// Covariates shared by both exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaperCovariates {
    pub paper_id: String,
    pub stratum: i64,
    pub exposure_metric: i64,
    pub citation_count: i64,
    pub years_since_retraction: i64,
    pub years_since_publication: i64,
    pub years_since_retraction_q4: u8,
    pub years_since_publication_q4: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisRow {
    pub arm: Arm,
    pub contaminated: bool,
    #[serde(flatten)]
    pub covariates: PaperCovariates,
}

impl AnalysisRow {
    fn record(&self) -> Vec<String> {
        let c = &self.covariates;
        vec![
            c.paper_id.clone(),
            self.arm.as_str().to_string(),
            c.stratum.to_string(),
            c.exposure_metric.to_string(),
            c.citation_count.to_string(),
            c.years_since_retraction.to_string(),
            c.years_since_publication.to_string(),
            c.years_since_retraction_q4.to_string(),
            c.years_since_publication_q4.to_string(),
            self.contaminated.to_string(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationRow {
    /// `stratum` is the stratum under the first scheme.
    pub covariates: PaperCovariates,
    /// Stratum under each scheme, in scheme order.
    pub strata: Vec<i64>,
    /// Per scheme, one label per run in run order.
    pub labels: Vec<Vec<Arm>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationDataset {
    pub year: i32,
    pub runs: usize,
    pub schemes: Vec<Stratification>,
    pub rows: Vec<SimulationRow>,
}

impl SimulationDataset {
    fn prefixes(&self) -> Vec<String> {
        if self.schemes.len() == 1 {
            return vec![String::new()];
        }
        self.schemes.iter().map(|scheme| format!("{scheme}_")).collect()
    }

    pub fn columns(&self) -> Vec<String> {
        let prefixes = self.prefixes();
        let mut columns = Vec::new();
        for column in ANALYSIS_COLUMNS {
            match column {
                "arm" | "contaminated" => {}
                "stratum" => columns.extend(prefixes.iter().map(|p| format!("{p}stratum"))),
                other => columns.push(other.to_string()),
            }
        }
        for prefix in &prefixes {
            columns.extend((0..self.runs).map(|run| format!("{prefix}run_{run}")));
        }
        columns
    }

    /// Labels of one scheme for one run, in row order.
    pub fn run_labels(&self, scheme: usize, run: usize) -> impl Iterator<Item = Arm> + '_ {
        self.rows.iter().filter_map(move |row| row.labels.get(scheme)?.get(run).copied())
    }
}

impl SimulationRow {
    fn record(&self) -> Vec<String> {
        let c = &self.covariates;
        let mut record = vec![c.paper_id.clone()];
        record.extend(self.strata.iter().map(i64::to_string));
        record.extend([
            c.exposure_metric.to_string(),
            c.citation_count.to_string(),
            c.years_since_retraction.to_string(),
            c.years_since_publication.to_string(),
            c.years_since_retraction_q4.to_string(),
            c.years_since_publication_q4.to_string(),
        ]);
        record.extend(self.labels.iter().flatten().map(|arm| arm.as_str().to_string()));
        record
    }
}

/// Parameters of a pre-registration simulation.
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub year: i32,
    pub runs: usize,
    pub workers: usize,
    pub seed: u64,
    /// Every scheme draws from the same population with the same seeds.
    pub schemes: Vec<Stratification>,
}

// ═══════════════════════════════════════════════════════════
// Builders
// ═══════════════════════════════════════════════════════════

/// Distinct citing works per paper accepted by `counts`.
fn citation_counts(
    pairs: &[CitationPairRecord],
    counts: impl Fn(&CitationPairRecord) -> bool,
) -> HashMap<&str, i64> {
    let mut citing: HashMap<&str, HashSet<&str>> = HashMap::new();
    for pair in pairs.iter().filter(|p| counts(p)) {
        citing
            .entry(pair.paper_pmid.as_str())
            .or_default()
            .insert(pair.citing_id.as_str());
    }
    citing.into_iter().map(|(pmid, set)| (pmid, set.len() as i64)).collect()
}

/// Years since retraction and publication relative to `reference_year`,
/// plus their quartile labels.
fn covariates(
    papers: &[&PaperRecord],
    reference_year: i32,
    mut row: impl FnMut(&PaperRecord) -> (i64, i64, i64),
) -> Result<Vec<PaperCovariates>, TrialError> {
    let mut since_retraction = Vec::with_capacity(papers.len());
    let mut since_publication = Vec::with_capacity(papers.len());
    for paper in papers {
        let (notice, published) = paper
            .notice_year()
            .zip(paper.publication_year())
            .ok_or_else(|| {
                TrialError::invariant(STAGE, format!("paper {} is missing a date", paper.pmid))
            })?;
        since_retraction.push(i64::from(reference_year - notice));
        since_publication.push(i64::from(reference_year - published));
    }
    let retraction_q4 = quartile_labels(&since_retraction, "years_since_retraction quartiles")?;
    let publication_q4 = quartile_labels(&since_publication, "years_since_publication quartiles")?;

    Ok(papers
        .iter()
        .enumerate()
        .map(|(i, paper)| {
            let (stratum, exposure_metric, citation_count) = row(paper);
            PaperCovariates {
                paper_id: paper.pmid.clone(),
                stratum,
                exposure_metric,
                citation_count,
                years_since_retraction: since_retraction[i],
                years_since_publication: since_publication[i],
                years_since_retraction_q4: retraction_q4[i],
                years_since_publication_q4: publication_q4[i],
            }
        })
        .collect())
}

/// One row per randomised paper.
///
/// Exposure is the frozen enrollment metric. Citation counts cover citing
/// works inside the window that were not counted at enrollment.
pub fn build_analysis_dataset(
    snapshot: &CohortSnapshot,
    window: &FollowUpWindow,
) -> Result<Vec<AnalysisRow>, TrialError> {
    let papers: Vec<&PaperRecord> =
        snapshot.papers_in(&[Arm::Intervention, Arm::Control]).collect();
    if papers.is_empty() {
        return Err(TrialError::precondition(STAGE, "No randomised retracted papers found"));
    }

    let exposures = exposure_metrics(&snapshot.pairs, ExposureCutoff::Enrollment);
    let counts = citation_counts(&snapshot.pairs, |pair| {
        !pair.counted_toward_cohort && pair.citing_date.is_some_and(|d| window.contains(d))
    });
    let contamination = detect_contamination(&snapshot.papers, &snapshot.pairs);

    let mut missing_stratum = None;
    let covariates = covariates(&papers, window.start.year(), |paper| {
        if paper.stratum.is_none() {
            missing_stratum.get_or_insert_with(|| paper.pmid.clone());
        }
        (
            paper.stratum.unwrap_or_default(),
            exposure_of(&exposures, &paper.pmid),
            counts.get(paper.pmid.as_str()).copied().unwrap_or(0),
        )
    });
    let covariates = covariates?;
    if let Some(pmid) = missing_stratum {
        return Err(TrialError::invariant(STAGE, format!("randomised paper {pmid} has no stratum")));
    }

    let rows: Vec<AnalysisRow> = papers
        .iter()
        .zip(covariates)
        .map(|(paper, covariates)| AnalysisRow {
            arm: paper.arm,
            contaminated: contamination.is_contaminated(&paper.pmid),
            covariates,
        })
        .collect();
    tracing::info!(
        rows = rows.len(),
        follow_up = %window.start,
        contaminated = contamination.papers.len(),
        "Built analysis dataset"
    );
    Ok(rows)
}

/// Rerun the trial as if it had been randomised at the end of
/// `settings.year`, `settings.runs` times per scheme. Persisted state is
/// not touched.
pub fn build_simulation_dataset(
    snapshot: &CohortSnapshot,
    config: &TrialConfig,
    settings: &SimulationSettings,
) -> Result<SimulationDataset, TrialError> {
    if settings.schemes.is_empty() {
        return Err(TrialError::Config("no stratification scheme to simulate".into()));
    }
    let mut seen = HashSet::new();
    if let Some(scheme) = settings.schemes.iter().find(|s| !seen.insert(**s)) {
        return Err(TrialError::Config(format!("stratification scheme {scheme} given twice")));
    }

    let year = settings.year;
    let exposures = exposure_metrics(&snapshot.pairs, ExposureCutoff::Year(year));
    let papers: Vec<&PaperRecord> = snapshot
        .papers
        .iter()
        .filter(|p| p.arm != Arm::Excluded)
        .filter(|p| p.publication_year().is_some_and(|y| y <= year))
        .filter(|p| p.notice_year().is_some_and(|y| y <= year))
        .filter(|p| exposure_of(&exposures, &p.pmid) > 0)
        .collect();
    if papers.is_empty() {
        return Err(TrialError::degenerate(
            "simulation",
            format!("no eligible papers with exposure by {year}"),
        ));
    }

    let population: Vec<i64> = papers.iter().map(|p| exposure_of(&exposures, &p.pmid)).collect();
    let request = RandomisationRequest::simulation(settings.runs, settings.workers, settings.seed);
    let mut draws = Vec::with_capacity(settings.schemes.len());
    for scheme in &settings.schemes {
        let stratifier = Stratifier::build(*scheme, &config.static_cuts, &population)?;
        let table = stratify(papers.iter().copied(), &exposures, &stratifier);
        let allocations = simulate(&table, &request)?;
        draws.push((table, allocations));
    }

    let strata: Vec<HashMap<&str, i64>> = draws
        .iter()
        .map(|(table, _)| table.iter().map(|r| (r.pmid.as_str(), r.stratum)).collect())
        .collect();
    let counts = citation_counts(&snapshot.pairs, |pair| {
        pair.citing_date.is_some_and(|d| d.year() == year + 1)
    });
    let covariates = covariates(&papers, year, |paper| {
        (
            strata[0].get(paper.pmid.as_str()).copied().unwrap_or_default(),
            exposure_of(&exposures, &paper.pmid),
            counts.get(paper.pmid.as_str()).copied().unwrap_or(0),
        )
    })?;

    let mut rows = Vec::with_capacity(covariates.len());
    for covariates in covariates {
        let pmid = covariates.paper_id.as_str();
        let row_strata: Vec<i64> =
            strata.iter().map(|s| s.get(pmid).copied().unwrap_or_default()).collect();
        let labels = draws
            .iter()
            .map(|(_, allocations)| {
                allocations
                    .iter()
                    .map(|allocation| {
                        allocation.arm_of(pmid).ok_or_else(|| {
                            TrialError::invariant(
                                "simulation",
                                format!("paper {pmid} missing from a run"),
                            )
                        })
                    })
                    .collect::<Result<Vec<Arm>, TrialError>>()
            })
            .collect::<Result<Vec<Vec<Arm>>, TrialError>>()?;
        rows.push(SimulationRow { covariates, strata: row_strata, labels });
    }

    tracing::info!(
        year,
        runs = settings.runs,
        papers = rows.len(),
        schemes = ?settings.schemes,
        "Built simulation dataset"
    );
    Ok(SimulationDataset { year, runs: settings.runs, schemes: settings.schemes.clone(), rows })
}

// ═══════════════════════════════════════════════════════════
// Export
// ═══════════════════════════════════════════════════════════

/// Write through a temp file in the target directory so a failed export
/// never leaves a partial file behind.
fn write_atomically<F>(path: &Path, write: F) -> Result<(), TrialError>
where
    F: FnOnce(&mut csv::Writer<&mut NamedTempFile>) -> Result<(), TrialError>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = csv::Writer::from_writer(&mut tmp);
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| TrialError::Io(e.error))?;
    Ok(())
}

pub fn write_analysis_csv(path: &Path, rows: &[AnalysisRow]) -> Result<(), TrialError> {
    write_atomically(path, |writer| {
        writer.write_record(ANALYSIS_COLUMNS)?;
        for row in rows {
            writer.write_record(row.record())?;
        }
        Ok(())
    })?;
    tracing::info!(path = %path.display(), rows = rows.len(), "Wrote analysis dataset");
    Ok(())
}

pub fn write_simulation_csv(path: &Path, dataset: &SimulationDataset) -> Result<(), TrialError> {
    write_atomically(path, |writer| {
        writer.write_record(dataset.columns())?;
        for row in &dataset.rows {
            writer.write_record(row.record())?;
        }
        Ok(())
    })?;
    tracing::info!(path = %path.display(), rows = dataset.rows.len(), "Wrote simulation dataset");
    Ok(())
}
