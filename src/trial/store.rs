//! SQLite-backed cohort repository.

use std::collections::BTreeSet;

use rusqlite::{params, Connection};

use super::error::TrialError;
use super::traits::{CohortRepository, RandomisationCommit};
use super::types::*;
use crate::db::repository::*;
use crate::models::ExclusionReason;

const STAGE: &str = "randomisation";

pub struct SqliteCohort<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCohort<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        self.conn
    }
}

impl CohortRepository for SqliteCohort<'_> {
    fn load_papers(&self) -> Result<Vec<PaperRecord>, TrialError> {
        let notices = get_earliest_notice_dates(self.conn)?;
        Ok(get_all_papers(self.conn)?
            .into_iter()
            .map(|p| PaperRecord {
                earliest_notice_date: notices.get(&p.pmid).copied(),
                pmid: p.pmid,
                comparison_date: p.comparison_date,
                pilot: p.pilot,
                arm: p.arm,
                exclusion_reason: p.exclusion_reason,
                stratum: p.stratum,
            })
            .collect())
    }

    fn load_citation_pairs(&self) -> Result<Vec<CitationPairRecord>, TrialError> {
        if get_meta(self.conn, META_CONTACTABLE_REFRESHED)?.is_none() {
            return Err(TrialError::precondition(
                "contactable authors",
                "contactable authors have not been derived for this cohort; run reset-and-exclude",
            ));
        }
        Ok(get_citation_pairs(self.conn)?)
    }

    fn reset(&self, pilot_pmids: &BTreeSet<String>) -> Result<(), TrialError> {
        let reset = reset_assignments(self.conn)?;
        for key in [META_RANDOMISATION_ID, META_RANDOMISATION_SEED, META_ALLOCATION_DIGEST] {
            delete_meta(self.conn, key)?;
        }
        tracing::info!(count = reset, "Reset trial state");
        let marked = mark_pilot_papers(self.conn, pilot_pmids)?;
        tracing::info!(count = marked, "Marked pilot papers");
        refresh_comparison_dates(self.conn)?;
        refresh_contactable_authors(self.conn)?;
        Ok(())
    }

    fn record_exclusions(
        &self,
        exclusions: &[(String, ExclusionReason)],
    ) -> Result<usize, TrialError> {
        Ok(exclude_papers(self.conn, exclusions)?)
    }

    fn notice_count(&self) -> Result<i64, TrialError> {
        Ok(count_notices(self.conn)?)
    }

    fn contactable_pair_count(&self) -> Result<i64, TrialError> {
        Ok(count_contactable_pairs(self.conn)?)
    }

    fn commit_randomisation(&self, commit: &RandomisationCommit) -> Result<(), TrialError> {
        let tx = self.conn.unchecked_transaction()?;

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM retracted_papers WHERE arm IN ('intervention', 'control')",
            [],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(TrialError::precondition(
                STAGE,
                format!("Should not randomise twice: {existing} papers already assigned"),
            ));
        }

        let frozen = freeze_enrollment(&tx)?;
        tracing::info!(count = frozen, "Froze enrollment citing works");

        {
            let mut stmt = tx.prepare(
                "UPDATE retracted_papers SET stratum = ?2 WHERE pmid = ?1 AND arm = 'pending'",
            )?;
            for row in &commit.strata {
                if stmt.execute(params![row.pmid, row.stratum])? != 1 {
                    return Err(TrialError::invariant(
                        STAGE,
                        format!("paper {} is no longer pending", row.pmid),
                    ));
                }
            }
        }
        {
            let mut stmt = tx.prepare(
                "UPDATE retracted_papers SET arm = ?2 WHERE pmid = ?1 AND arm = 'pending'",
            )?;
            for (pmid, arm) in &commit.allocation.assignments {
                if !arm.is_randomised() {
                    return Err(TrialError::invariant(
                        STAGE,
                        format!("paper {pmid} allocated to {arm}"),
                    ));
                }
                if stmt.execute(params![pmid, arm.as_str()])? != 1 {
                    return Err(TrialError::invariant(
                        STAGE,
                        format!("paper {pmid} is no longer pending"),
                    ));
                }
            }
        }

        set_meta(&tx, META_RANDOMISATION_ID, &commit.run_id)?;
        set_meta(&tx, META_RANDOMISATION_SEED, &commit.seed.to_string())?;
        set_meta(&tx, META_ALLOCATION_DIGEST, &commit.digest)?;

        tx.commit()?;
        tracing::info!(
            run_id = %commit.run_id,
            papers = commit.allocation.assignments.len(),
            "Updated database with randomisation"
        );
        Ok(())
    }
}
