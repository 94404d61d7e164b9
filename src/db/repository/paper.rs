use std::str::FromStr;

use rusqlite::{params, Connection};

use super::{date_from_sql, date_to_sql};
use crate::db::DatabaseError;
use crate::models::*;

/// Insert a retracted paper, or refresh its bibliographic fields if present.
/// Trial state (`arm`, `exclusion_reason`, `stratum`) is never touched here.
pub fn upsert_paper(conn: &Connection, paper: &RetractedPaper) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO retracted_papers (pmid, title, art_date, journal_date, comparison_date, pilot)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(pmid) DO UPDATE SET
            title = excluded.title,
            art_date = excluded.art_date,
            journal_date = excluded.journal_date,
            comparison_date = COALESCE(excluded.comparison_date, retracted_papers.comparison_date),
            pilot = MAX(excluded.pilot, retracted_papers.pilot)",
        params![
            paper.pmid,
            paper.title,
            date_to_sql(paper.art_date),
            date_to_sql(paper.journal_date),
            date_to_sql(paper.comparison_date),
            paper.pilot as i32,
        ],
    )?;
    Ok(())
}

pub fn get_paper(conn: &Connection, pmid: &str) -> Result<RetractedPaper, DatabaseError> {
    let mut papers = select_papers(conn, Some(pmid))?;
    papers.pop().ok_or_else(|| DatabaseError::NotFound {
        entity_type: "retracted_paper".into(),
        id: pmid.into(),
    })
}

/// All retracted papers ordered by pmid.
pub fn get_all_papers(conn: &Connection) -> Result<Vec<RetractedPaper>, DatabaseError> {
    select_papers(conn, None)
}

type PaperRow = (
    String, Option<String>, Option<String>, Option<String>, Option<String>,
    i32, String, Option<String>, Option<i64>,
);

fn select_papers(conn: &Connection, pmid: Option<&str>) -> Result<Vec<RetractedPaper>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT pmid, title, art_date, journal_date, comparison_date,
                pilot, arm, exclusion_reason, stratum
         FROM retracted_papers
         WHERE ?1 IS NULL OR pmid = ?1
         ORDER BY pmid",
    )?;

    let rows = stmt.query_map(params![pmid], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, i32>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, Option<String>>(7)?,
            row.get::<_, Option<i64>>(8)?,
        ))
    })?;

    let mut papers = Vec::new();
    for row in rows {
        let (pmid, title, art_date, journal_date, comparison_date, pilot, arm, reason, stratum): PaperRow =
            row?;
        papers.push(RetractedPaper {
            pmid,
            title,
            art_date: date_from_sql("art_date", art_date)?,
            journal_date: date_from_sql("journal_date", journal_date)?,
            comparison_date: date_from_sql("comparison_date", comparison_date)?,
            pilot: pilot != 0,
            arm: Arm::from_str(&arm)?,
            exclusion_reason: reason.as_deref().map(ExclusionReason::from_str).transpose()?,
            stratum,
        });
    }
    Ok(papers)
}

/// Return every paper to `pending` with no exclusion reason and no stratum.
pub fn reset_assignments(conn: &Connection) -> Result<usize, DatabaseError> {
    let count = conn.execute(
        "UPDATE retracted_papers SET arm = 'pending', exclusion_reason = NULL, stratum = NULL",
        [],
    )?;
    Ok(count)
}

/// Flag the given pmids as pilot papers. Flags set on import are kept.
pub fn mark_pilot_papers<'a>(
    conn: &Connection,
    pmids: impl IntoIterator<Item = &'a String>,
) -> Result<usize, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let mut marked = 0;
    {
        let mut stmt = tx.prepare("UPDATE retracted_papers SET pilot = 1 WHERE pmid = ?1")?;
        for pmid in pmids {
            marked += stmt.execute(params![pmid])?;
        }
    }
    tx.commit()?;
    Ok(marked)
}

/// Exclude papers that are still pending. Already-excluded or randomised
/// papers are left alone. Returns the number of rows changed.
pub fn exclude_papers(
    conn: &Connection,
    exclusions: &[(String, ExclusionReason)],
) -> Result<usize, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let mut changed = 0;
    {
        let mut stmt = tx.prepare(
            "UPDATE retracted_papers SET arm = 'excluded', exclusion_reason = ?2
             WHERE pmid = ?1 AND arm = 'pending'",
        )?;
        for (pmid, reason) in exclusions {
            changed += stmt.execute(params![pmid, reason.as_str()])?;
        }
    }
    tx.commit()?;
    Ok(changed)
}

/// Best available date: article date, else journal date.
/// Notices use the same rule; citing works fall back further to the cover date.
pub fn refresh_comparison_dates(conn: &Connection) -> Result<(), DatabaseError> {
    let papers = conn.execute(
        "UPDATE retracted_papers SET comparison_date = COALESCE(art_date, journal_date)",
        [],
    )?;
    tracing::info!(count = papers, "Updated comparison date for retracted papers");
    let notices = conn.execute(
        "UPDATE retraction_notices SET comparison_date = COALESCE(art_date, journal_date)",
        [],
    )?;
    tracing::info!(count = notices, "Updated comparison date for retraction notices");
    let citing = conn.execute(
        "UPDATE citing_papers SET comparison_date = COALESCE(art_date, journal_date, cover_date)",
        [],
    )?;
    tracing::info!(count = citing, "Updated comparison date for citing papers");
    Ok(())
}
