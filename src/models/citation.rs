use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Publication type carried by retraction notices indexed as citing works.
pub const RETRACTION_PUB_TYPE: &str = "Retraction of Publication";

/// A work citing one or more retracted papers, keyed by Scopus id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitingPaper {
    pub scopus_id: String,
    #[serde(default)]
    pub pmid: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub art_date: Option<NaiveDate>,
    #[serde(default)]
    pub journal_date: Option<NaiveDate>,
    #[serde(default)]
    pub cover_date: Option<NaiveDate>,
    #[serde(default)]
    pub comparison_date: Option<NaiveDate>,
    #[serde(default)]
    pub pub_types: Vec<String>,
}

/// (citing work → retracted paper) edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub citing_id: String,
    pub paper_pmid: String,
}
