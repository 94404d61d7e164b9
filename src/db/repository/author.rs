use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::Author;
use crate::trial::types::AuthorId;

/// Insert an author (keyed by Scopus auid) with aliases and authorship links.
/// Links and aliases accumulate across calls; nothing is removed.
pub fn upsert_author(conn: &Connection, author: &Author) -> Result<AuthorId, DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO authors (auid) VALUES (?1)",
        params![author.auid],
    )?;
    let id = get_author_id(conn, &author.auid)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "author".into(),
        id: author.auid.clone(),
    })?;

    for alias in &author.aliases {
        conn.execute(
            "INSERT OR IGNORE INTO author_aliases (author_id, email_address, surname, given_name)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, alias.email_address, alias.surname, alias.given_name],
        )?;
    }
    for citing_id in &author.citing_papers {
        conn.execute(
            "INSERT OR IGNORE INTO citing_paper_authors (author_id, citing_id) VALUES (?1, ?2)",
            params![id, citing_id],
        )?;
    }
    for pmid in &author.retracted_papers {
        conn.execute(
            "INSERT OR IGNORE INTO retracted_paper_authors (author_id, paper_pmid) VALUES (?1, ?2)",
            params![id, pmid],
        )?;
    }
    Ok(id)
}

pub fn get_author_id(conn: &Connection, auid: &str) -> Result<Option<AuthorId>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id FROM authors WHERE auid = ?1",
            params![auid],
            |row| row.get(0),
        )
        .optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::AuthorAlias;

    #[test]
    fn upsert_is_keyed_by_auid() {
        let conn = open_memory_database().unwrap();
        add_paper(&conn, "1", "2010-01-01", None);
        add_citation(&conn, "c1", "1", "2013-01-01", &["a"]);
        add_citation(&conn, "c2", "1", "2014-01-01", &["a"]);

        let links: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM citing_paper_authors cpa
                 JOIN authors a ON a.id = cpa.author_id WHERE a.auid = 'a'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(links, 2);
        let authors: i64 = conn
            .query_row("SELECT COUNT(*) FROM authors", [], |row| row.get(0))
            .unwrap();
        assert_eq!(authors, 1);
    }

    #[test]
    fn set_email_updates_all_aliases() {
        let conn = open_memory_database().unwrap();
        upsert_author(
            &conn,
            &Author {
                auid: "x".into(),
                aliases: vec![
                    AuthorAlias { email_address: Some("x@one.org".into()), surname: None, given_name: None },
                    AuthorAlias { email_address: Some("x@two.org".into()), surname: None, given_name: None },
                ],
                citing_papers: vec![],
                retracted_papers: vec![],
            },
        )
        .unwrap();
        assert_eq!(set_author_email(&conn, "x", None), 2);
        assert!(get_author_id(&conn, "x").unwrap().is_some());
        assert!(get_author_id(&conn, "y").unwrap().is_none());
    }
}
