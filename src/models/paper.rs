use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{Arm, ExclusionReason};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetractedPaper {
    pub pmid: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub art_date: Option<NaiveDate>,
    #[serde(default)]
    pub journal_date: Option<NaiveDate>,
    /// Best available publication date, resolved from `art_date` then `journal_date`.
    #[serde(default)]
    pub comparison_date: Option<NaiveDate>,
    #[serde(default)]
    pub pilot: bool,
    #[serde(default)]
    pub arm: Arm,
    #[serde(default)]
    pub exclusion_reason: Option<ExclusionReason>,
    #[serde(default)]
    pub stratum: Option<i64>,
}

impl RetractedPaper {
    pub fn new(pmid: impl Into<String>) -> Self {
        Self {
            pmid: pmid.into(),
            title: None,
            art_date: None,
            journal_date: None,
            comparison_date: None,
            pilot: false,
            arm: Arm::Pending,
            exclusion_reason: None,
            stratum: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetractionNotice {
    pub pmid: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub art_date: Option<NaiveDate>,
    #[serde(default)]
    pub journal_date: Option<NaiveDate>,
    #[serde(default)]
    pub comparison_date: Option<NaiveDate>,
    /// Retracted papers this notice retracts.
    #[serde(default)]
    pub papers: Vec<String>,
}
