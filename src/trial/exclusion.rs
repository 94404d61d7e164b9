//! Eligibility rules.
//!
//! Rules run in a fixed order, each over the papers still pending, so the
//! first matching rule wins and an excluded paper is never re-evaluated.

use std::collections::{BTreeSet, HashSet};

use chrono::Datelike;
use serde::Serialize;

use super::types::{CitationPairRecord, PaperRecord};
use crate::config::TrialConfig;
use crate::models::{Arm, ExclusionReason};

/// Facts the rules consult besides the paper itself.
pub struct RuleContext<'a> {
    pub pilot_pmids: &'a BTreeSet<String>,
    pub min_publication_year: i32,
    /// Papers with at least one contactable author on any pair.
    pub contactable: HashSet<&'a str>,
}

impl<'a> RuleContext<'a> {
    pub fn new(config: &'a TrialConfig, pairs: &'a [CitationPairRecord]) -> Self {
        Self {
            pilot_pmids: &config.pilot_pmids,
            min_publication_year: config.min_publication_year,
            contactable: pairs
                .iter()
                .filter(|p| !p.contactable_authors.is_empty())
                .map(|p| p.paper_pmid.as_str())
                .collect(),
        }
    }
}

type Predicate = fn(&PaperRecord, &RuleContext<'_>) -> bool;

pub struct ExclusionRule {
    pub reason: ExclusionReason,
    applies: Predicate,
}

/// All rules in evaluation order.
pub fn rules() -> [ExclusionRule; 5] {
    [
        ExclusionRule {
            reason: ExclusionReason::Pilot,
            applies: |p, ctx| p.pilot || ctx.pilot_pmids.contains(&p.pmid),
        },
        ExclusionRule {
            reason: ExclusionReason::NoPaperDate,
            applies: |p, _| p.comparison_date.is_none(),
        },
        ExclusionRule {
            reason: ExclusionReason::PublishedBefore2000,
            applies: |p, ctx| {
                p.comparison_date
                    .is_some_and(|d| d.year() < ctx.min_publication_year)
            },
        },
        ExclusionRule {
            reason: ExclusionReason::NoNoticeDate,
            applies: |p, _| p.earliest_notice_date.is_none(),
        },
        ExclusionRule {
            reason: ExclusionReason::NoContactableAuthors,
            applies: |p, ctx| !ctx.contactable.contains(p.pmid.as_str()),
        },
    ]
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExclusionOutcome {
    /// Papers newly excluded by this pass, in rule then pmid order.
    pub excluded: Vec<(String, ExclusionReason)>,
    /// Newly excluded per rule, in evaluation order.
    pub counts: Vec<(ExclusionReason, usize)>,
    /// Papers still pending after the pass.
    pub pending: usize,
}

/// Apply every rule to the pending papers, mutating them in place.
pub fn apply_exclusions(
    papers: &mut [PaperRecord],
    pairs: &[CitationPairRecord],
    config: &TrialConfig,
) -> ExclusionOutcome {
    let ctx = RuleContext::new(config, pairs);
    let mut outcome = ExclusionOutcome::default();

    for rule in rules() {
        let mut count = 0;
        for paper in papers.iter_mut().filter(|p| p.arm == Arm::Pending) {
            if (rule.applies)(paper, &ctx) {
                paper.arm = Arm::Excluded;
                paper.exclusion_reason = Some(rule.reason);
                outcome.excluded.push((paper.pmid.clone(), rule.reason));
                count += 1;
            }
        }
        tracing::info!(rule = rule.reason.as_str(), count, "Applied exclusion rule");
        outcome.counts.push((rule.reason, count));
    }

    outcome.pending = papers.iter().filter(|p| p.arm == Arm::Pending).count();
    outcome
}
