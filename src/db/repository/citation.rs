use std::collections::HashMap;

use rusqlite::{params, Connection};

use super::{date_from_sql, date_to_sql};
use crate::db::DatabaseError;
use crate::models::{Citation, CitingPaper};
use crate::trial::types::{AuthorId, CitationPairRecord};

/// Insert a citing work, or refresh its bibliographic fields if present.
/// New works start uncounted; only the enrollment freeze sets `cited_in_rct`.
pub fn upsert_citing_paper(conn: &Connection, paper: &CitingPaper) -> Result<(), DatabaseError> {
    let pub_types = serde_json::to_string(&paper.pub_types)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
    conn.execute(
        "INSERT INTO citing_papers
            (scopus_id, pmid, title, art_date, journal_date, cover_date, comparison_date, pub_types, cited_in_rct)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)
         ON CONFLICT(scopus_id) DO UPDATE SET
            pmid = excluded.pmid,
            title = excluded.title,
            art_date = excluded.art_date,
            journal_date = excluded.journal_date,
            cover_date = excluded.cover_date,
            comparison_date = COALESCE(excluded.comparison_date, citing_papers.comparison_date),
            pub_types = excluded.pub_types",
        params![
            paper.scopus_id,
            paper.pmid,
            paper.title,
            date_to_sql(paper.art_date),
            date_to_sql(paper.journal_date),
            date_to_sql(paper.cover_date),
            date_to_sql(paper.comparison_date),
            pub_types,
        ],
    )?;
    Ok(())
}

pub fn insert_citation(conn: &Connection, citation: &Citation) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO citation_pairs (citing_id, paper_pmid) VALUES (?1, ?2)",
        params![citation.citing_id, citation.paper_pmid],
    )?;
    Ok(())
}

/// Every citation pair with its citing-work date, enrollment flag and
/// contactable authors, ordered by (paper, citing work).
pub fn get_citation_pairs(conn: &Connection) -> Result<Vec<CitationPairRecord>, DatabaseError> {
    let contactable = get_contactable_by_pair(conn)?;

    let mut stmt = conn.prepare(
        "SELECT cp.id, cp.paper_pmid, cp.citing_id, c.comparison_date, c.cited_in_rct
         FROM citation_pairs cp
         JOIN citing_papers c ON c.scopus_id = cp.citing_id
         ORDER BY cp.paper_pmid, cp.citing_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, i32>(4)?,
        ))
    })?;

    let mut pairs = Vec::new();
    for row in rows {
        let (pair_id, paper_pmid, citing_id, citing_date, cited_in_rct) = row?;
        pairs.push(CitationPairRecord {
            paper_pmid,
            citing_id,
            citing_date: date_from_sql("citing comparison_date", citing_date)?,
            contactable_authors: contactable.get(&pair_id).cloned().unwrap_or_default(),
            counted_toward_cohort: cited_in_rct != 0,
        });
    }
    Ok(pairs)
}

fn get_contactable_by_pair(conn: &Connection) -> Result<HashMap<i64, Vec<AuthorId>>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT pair_id, author_id FROM pair_contactable_authors ORDER BY pair_id, author_id",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
    let mut by_pair: HashMap<i64, Vec<AuthorId>> = HashMap::new();
    for row in rows {
        let (pair_id, author_id) = row?;
        by_pair.entry(pair_id).or_default().push(author_id);
    }
    Ok(by_pair)
}

/// Number of pairs with at least one contactable author.
pub fn count_contactable_pairs(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COUNT(DISTINCT pair_id) FROM pair_contactable_authors",
        [],
        |row| row.get(0),
    )?)
}

/// Count every citing work toward the cohort exposure. Runs once, inside the
/// authoritative randomisation transaction.
pub fn freeze_enrollment(conn: &Connection) -> Result<usize, DatabaseError> {
    Ok(conn.execute("UPDATE citing_papers SET cited_in_rct = 1", [])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn pairs_carry_contactable_authors() {
        let conn = open_memory_database().unwrap();
        add_paper(&conn, "1", "2010-01-01", Some("2012-01-01"));
        add_citation(&conn, "c1", "1", "2013-01-01", &["a", "b"]);
        add_citation(&conn, "c2", "1", "2014-01-01", &[]);
        prepare(&conn);

        let pairs = get_citation_pairs(&conn).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].citing_id, "c1");
        assert_eq!(pairs[0].contactable_authors.len(), 2);
        assert_eq!(pairs[0].citing_date, Some(date("2013-01-01")));
        assert!(pairs[1].contactable_authors.is_empty());
        assert_eq!(count_contactable_pairs(&conn).unwrap(), 1);
    }

    #[test]
    fn freeze_marks_every_citing_work() {
        let conn = open_memory_database().unwrap();
        add_paper(&conn, "1", "2010-01-01", Some("2012-01-01"));
        add_citation(&conn, "c1", "1", "2013-01-01", &["a"]);
        add_citation(&conn, "c2", "1", "2023-01-01", &["b"]);
        prepare(&conn);
        assert!(get_citation_pairs(&conn).unwrap().iter().all(|p| !p.counted_toward_cohort));

        freeze_enrollment(&conn).unwrap();
        assert!(get_citation_pairs(&conn).unwrap().iter().all(|p| p.counted_toward_cohort));
    }

    #[test]
    fn duplicate_citation_is_ignored() {
        let conn = open_memory_database().unwrap();
        add_paper(&conn, "1", "2010-01-01", None);
        add_citation(&conn, "c1", "1", "2013-01-01", &[]);
        insert_citation(&conn, &Citation { citing_id: "c1".into(), paper_pmid: "1".into() }).unwrap();
        assert_eq!(get_citation_pairs(&conn).unwrap().len(), 1);
    }
}
