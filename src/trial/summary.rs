//! Human-readable reports: per-arm balance and the enrollment flow.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;

use super::stats::median_iqr;
use super::stratify::exposure_of;
use super::types::PaperRecord;
use crate::models::{Arm, ExclusionReason};

/// Median with 25th and 75th percentiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MedianIqr {
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
}

impl MedianIqr {
    fn of(values: impl IntoIterator<Item = i64>) -> Option<Self> {
        let values: Vec<f64> = values.into_iter().map(|v| v as f64).collect();
        median_iqr(&values).map(|(median, q1, q3)| Self { median, q1, q3 })
    }
}

impl fmt::Display for MedianIqr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} [{:.1}, {:.1}]", self.median, self.q1, self.q3)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmSummary {
    pub arm: Arm,
    pub n: usize,
    pub strata: BTreeMap<i64, usize>,
    pub exposure_metric: Option<MedianIqr>,
    pub years_since_retraction: Option<MedianIqr>,
    pub years_since_publication: Option<MedianIqr>,
}

/// Baseline characteristics of both arms ("table one").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSummary {
    pub reference_year: i32,
    pub arms: Vec<ArmSummary>,
}

pub fn balance_summary(
    papers: &[PaperRecord],
    exposures: &HashMap<String, i64>,
    reference_year: i32,
) -> BalanceSummary {
    let arms = [Arm::Intervention, Arm::Control]
        .into_iter()
        .map(|arm| {
            let members: Vec<&PaperRecord> = papers.iter().filter(|p| p.arm == arm).collect();
            let mut strata = BTreeMap::new();
            for paper in &members {
                if let Some(stratum) = paper.stratum {
                    *strata.entry(stratum).or_default() += 1;
                }
            }
            ArmSummary {
                arm,
                n: members.len(),
                strata,
                exposure_metric: MedianIqr::of(
                    members.iter().map(|p| exposure_of(exposures, &p.pmid)),
                ),
                years_since_retraction: MedianIqr::of(
                    members
                        .iter()
                        .filter_map(|p| p.notice_year())
                        .map(|y| i64::from(reference_year - y)),
                ),
                years_since_publication: MedianIqr::of(
                    members
                        .iter()
                        .filter_map(|p| p.publication_year())
                        .map(|y| i64::from(reference_year - y)),
                ),
            }
        })
        .collect();
    BalanceSummary { reference_year, arms }
}

fn cell(value: &Option<MedianIqr>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

impl fmt::Display for BalanceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<38}", "")?;
        for arm in &self.arms {
            write!(f, "{:>24}", arm.arm.as_str())?;
        }
        writeln!(f)?;

        write!(f, "{:<38}", "n")?;
        for arm in &self.arms {
            write!(f, "{:>24}", arm.n)?;
        }
        writeln!(f)?;

        let mut strata: Vec<i64> = self.arms.iter().flat_map(|a| a.strata.keys().copied()).collect();
        strata.sort_unstable();
        strata.dedup();
        for stratum in strata {
            write!(f, "{:<38}", format!("stratum {stratum}, n"))?;
            for arm in &self.arms {
                write!(f, "{:>24}", arm.strata.get(&stratum).copied().unwrap_or(0))?;
            }
            writeln!(f)?;
        }

        let rows: [(&str, fn(&ArmSummary) -> &Option<MedianIqr>); 3] = [
            ("exposure_metric, median [Q1, Q3]", |a| &a.exposure_metric),
            ("years_since_retraction, median [Q1, Q3]", |a| &a.years_since_retraction),
            ("years_since_publication, median [Q1, Q3]", |a| &a.years_since_publication),
        ];
        for (label, value) in rows {
            write!(f, "{label:<38}")?;
            for arm in &self.arms {
                write!(f, "{:>24}", cell(value(arm)))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Enrollment flow
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowReport {
    pub notices: i64,
    pub papers: usize,
    pub excluded: Vec<(ExclusionReason, usize)>,
    pub pending: usize,
    pub intervention: usize,
    pub control: usize,
}

impl FlowReport {
    pub fn randomised(&self) -> usize {
        self.intervention + self.control
    }
}

pub fn flow_report(papers: &[PaperRecord], notices: i64) -> FlowReport {
    let count = |arm: Arm| papers.iter().filter(|p| p.arm == arm).count();
    FlowReport {
        notices,
        papers: papers.len(),
        excluded: ExclusionReason::all()
            .iter()
            .map(|reason| {
                let n = papers
                    .iter()
                    .filter(|p| p.exclusion_reason == Some(*reason))
                    .count();
                (*reason, n)
            })
            .collect(),
        pending: count(Arm::Pending),
        intervention: count(Arm::Intervention),
        control: count(Arm::Control),
    }
}

impl fmt::Display for FlowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Retraction notices: {}", self.notices)?;
        writeln!(f, "Retracted papers: {}", self.papers)?;
        for (reason, n) in &self.excluded {
            writeln!(f, "  Excluded ({reason}): {n}")?;
        }
        if self.pending > 0 {
            writeln!(f, "Pending: {}", self.pending)?;
        }
        writeln!(f, "Randomised: {}", self.randomised())?;
        writeln!(f, "  Intervention: {}", self.intervention)?;
        writeln!(f, "  Control: {}", self.control)
    }
}
