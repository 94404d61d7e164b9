//! Cross-arm contamination: authors contactable for both arms.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use super::types::{AuthorId, CitationPairRecord, PaperRecord};
use crate::models::Arm;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Contamination {
    pub authors: BTreeSet<AuthorId>,
    /// Randomised papers cited by at least one contaminated author.
    pub papers: BTreeSet<String>,
}

impl Contamination {
    pub fn is_contaminated(&self, pmid: &str) -> bool {
        self.papers.contains(pmid)
    }
}

/// Intersect intervention-side and control-side contactable authors over
/// citing works counted toward the cohort.
pub fn detect_contamination(
    papers: &[PaperRecord],
    pairs: &[CitationPairRecord],
) -> Contamination {
    let arms: HashMap<&str, Arm> = papers
        .iter()
        .filter(|p| p.arm.is_randomised())
        .map(|p| (p.pmid.as_str(), p.arm))
        .collect();

    let mut intervention: BTreeSet<AuthorId> = BTreeSet::new();
    let mut control: BTreeSet<AuthorId> = BTreeSet::new();
    for (pair, arm) in counted_pairs(pairs, &arms) {
        let side = if arm == Arm::Intervention { &mut intervention } else { &mut control };
        side.extend(pair.contactable_authors.iter().copied());
    }
    let authors: BTreeSet<AuthorId> = intervention.intersection(&control).copied().collect();

    let papers = counted_pairs(pairs, &arms)
        .filter(|(pair, _)| pair.contactable_authors.iter().any(|a| authors.contains(a)))
        .map(|(pair, _)| pair.paper_pmid.clone())
        .collect();

    let contamination = Contamination { authors, papers };
    tracing::info!(
        authors = contamination.authors.len(),
        papers = contamination.papers.len(),
        "Computed contamination"
    );
    contamination
}

/// Pairs on randomised papers whose citing work was counted at enrollment.
fn counted_pairs<'a>(
    pairs: &'a [CitationPairRecord],
    arms: &'a HashMap<&'a str, Arm>,
) -> impl Iterator<Item = (&'a CitationPairRecord, Arm)> + 'a {
    pairs
        .iter()
        .filter(|pair| pair.counted_toward_cohort)
        .filter_map(move |pair| arms.get(pair.paper_pmid.as_str()).map(|arm| (pair, *arm)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(pmid: &str, arm: Arm) -> PaperRecord {
        PaperRecord {
            pmid: pmid.into(),
            comparison_date: None,
            earliest_notice_date: None,
            pilot: false,
            arm,
            exclusion_reason: None,
            stratum: Some(0),
        }
    }

    fn pair(pmid: &str, citing: &str, authors: &[AuthorId], counted: bool) -> CitationPairRecord {
        CitationPairRecord {
            paper_pmid: pmid.into(),
            citing_id: citing.into(),
            citing_date: None,
            contactable_authors: authors.to_vec(),
            counted_toward_cohort: counted,
        }
    }

    fn cohort() -> Vec<PaperRecord> {
        vec![
            paper("i1", Arm::Intervention),
            paper("i2", Arm::Intervention),
            paper("c1", Arm::Control),
            paper("x1", Arm::Excluded),
        ]
    }

    #[test]
    fn author_in_both_arms_is_contaminated() {
        let pairs = vec![
            pair("i1", "w1", &[1, 2], true),
            pair("c1", "w2", &[2, 3], true),
            pair("i2", "w3", &[4], true),
        ];
        let result = detect_contamination(&cohort(), &pairs);
        assert_eq!(result.authors, BTreeSet::from([2]));
        assert_eq!(result.papers, BTreeSet::from(["c1".to_string(), "i1".to_string()]));
        assert!(!result.is_contaminated("i2"));
    }

    #[test]
    fn one_sided_author_is_clean() {
        let pairs = vec![pair("i1", "w1", &[1], true), pair("i2", "w2", &[1], true)];
        assert!(detect_contamination(&cohort(), &pairs).authors.is_empty());
    }

    #[test]
    fn dropping_intervention_pairs_clears_author() {
        let mut pairs = vec![pair("i1", "w1", &[7], true), pair("c1", "w2", &[7], true)];
        assert!(detect_contamination(&cohort(), &pairs).authors.contains(&7));
        pairs.retain(|p| !p.paper_pmid.starts_with('i'));
        assert!(detect_contamination(&cohort(), &pairs).authors.is_empty());
    }

    #[test]
    fn symmetric_under_arm_swap() {
        let pairs = vec![pair("i1", "w1", &[5], true), pair("c1", "w2", &[5], true)];
        let swapped: Vec<PaperRecord> = cohort()
            .into_iter()
            .map(|mut p| {
                p.arm = match p.arm {
                    Arm::Intervention => Arm::Control,
                    Arm::Control => Arm::Intervention,
                    other => other,
                };
                p
            })
            .collect();
        assert_eq!(
            detect_contamination(&cohort(), &pairs),
            detect_contamination(&swapped, &pairs)
        );
    }

    #[test]
    fn uncounted_and_excluded_pairs_ignored() {
        let pairs = vec![
            pair("i1", "w1", &[1], true),
            pair("c1", "w2", &[1], false),
            pair("x1", "w3", &[1], true),
        ];
        assert!(detect_contamination(&cohort(), &pairs).authors.is_empty());
    }
}
