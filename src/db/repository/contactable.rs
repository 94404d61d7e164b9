//! Contactable-author derivation.
//!
//! A citing author is contactable for a (citing work, retracted paper) pair
//! when they have at least one well-formed email address and did not also
//! author the retracted paper. Pairs where the citing work is the retraction
//! notice itself, or has no date, never carry contactable authors.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use rusqlite::{params, Connection};

use super::meta::{set_meta, META_CONTACTABLE_REFRESHED};
use crate::db::DatabaseError;
use crate::models::RETRACTION_PUB_TYPE;
use crate::trial::types::AuthorId;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[^@\s<>(),;:"\[\]\\]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$"#)
        .unwrap()
});

/// Single-address syntax check. Display names and lists are rejected.
pub fn is_valid_email(address: &str) -> bool {
    EMAIL_PATTERN.is_match(address.trim())
}

/// Recompute `pair_contactable_authors` from authorship and alias data.
/// Returns the number of (pair, author) rows written.
pub fn refresh_contactable_authors(conn: &Connection) -> Result<usize, DatabaseError> {
    let (valid, addressed) = load_addressed_authors(conn)?;
    let citing_authors = load_links(conn, "SELECT citing_id, author_id FROM citing_paper_authors")?;
    let retracted_authors =
        load_links(conn, "SELECT paper_pmid, author_id FROM retracted_paper_authors")?;
    let pairs = load_eligible_pairs(conn)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM pair_contactable_authors", [])?;
    let mut written = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO pair_contactable_authors (pair_id, author_id) VALUES (?1, ?2)",
        )?;
        for pair in &pairs {
            let self_citing: HashSet<AuthorId> = retracted_authors
                .get(&pair.paper_pmid)
                .into_iter()
                .flatten()
                .filter(|id| addressed.contains(*id))
                .copied()
                .collect();
            let contactable: BTreeSet<AuthorId> = citing_authors
                .get(&pair.citing_id)
                .into_iter()
                .flatten()
                .filter(|id| valid.contains(*id) && !self_citing.contains(*id))
                .copied()
                .collect();
            for author_id in contactable {
                written += stmt.execute(params![pair.id, author_id])?;
            }
        }
    }
    set_meta(&tx, META_CONTACTABLE_REFRESHED, &Utc::now().to_rfc3339())?;
    tx.commit()?;

    tracing::info!(pairs = pairs.len(), rows = written, "Updated contactable authors");
    Ok(written)
}

/// (authors with a valid address, authors with any address)
fn load_addressed_authors(
    conn: &Connection,
) -> Result<(HashSet<AuthorId>, HashSet<AuthorId>), DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT author_id, email_address FROM author_aliases WHERE email_address IS NOT NULL",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;

    let mut valid = HashSet::new();
    let mut addressed = HashSet::new();
    let mut corrupted = 0usize;
    for row in rows {
        let (author_id, email) = row?;
        addressed.insert(author_id);
        if is_valid_email(&email) {
            valid.insert(author_id);
        } else {
            corrupted += 1;
        }
    }
    if corrupted > 0 {
        tracing::info!(count = corrupted, "Ignoring malformed author email addresses");
    }
    Ok((valid, addressed))
}

fn load_links(conn: &Connection, sql: &str) -> Result<HashMap<String, Vec<AuthorId>>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
    let mut links: HashMap<String, Vec<AuthorId>> = HashMap::new();
    for row in rows {
        let (key, author_id) = row?;
        links.entry(key).or_default().push(author_id);
    }
    Ok(links)
}

struct EligiblePair {
    id: i64,
    paper_pmid: String,
    citing_id: String,
}

fn load_eligible_pairs(conn: &Connection) -> Result<Vec<EligiblePair>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT cp.id, cp.paper_pmid, cp.citing_id, c.pub_types
         FROM citation_pairs cp
         JOIN citing_papers c ON c.scopus_id = cp.citing_id
         WHERE c.comparison_date IS NOT NULL
           AND NOT EXISTS (
               SELECT 1 FROM notice_papers np
               WHERE np.paper_pmid = cp.paper_pmid AND np.notice_pmid = c.pmid
           )
         ORDER BY cp.id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut pairs = Vec::new();
    for row in rows {
        let (id, paper_pmid, citing_id, pub_types) = row?;
        let pub_types: Vec<String> = serde_json::from_str(&pub_types)
            .map_err(|e| DatabaseError::ConstraintViolation(format!("pub_types for {citing_id}: {e}")))?;
        if pub_types.iter().any(|t| t == RETRACTION_PUB_TYPE) {
            continue;
        }
        pairs.push(EligiblePair { id, paper_pmid, citing_id });
    }
    Ok(pairs)
}
