use serde::{Deserialize, Serialize};

use super::author::Author;
use super::citation::{Citation, CitingPaper};
use super::paper::{RetractedPaper, RetractionNotice};

/// Normalised cohort export consumed by `import-cohort`.
///
/// Upstream fetchers (PubMed, Scopus) produce this shape; trial state
/// fields on papers (`arm`, `exclusion_reason`, `stratum`) and citing works
/// (`cited_in_rct`) are ignored on import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohortBundle {
    #[serde(default)]
    pub papers: Vec<RetractedPaper>,
    #[serde(default)]
    pub notices: Vec<RetractionNotice>,
    #[serde(default)]
    pub citing_papers: Vec<CitingPaper>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub authors: Vec<Author>,
}
