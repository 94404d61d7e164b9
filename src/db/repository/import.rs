use rusqlite::Connection;
use serde::Serialize;

use super::author::upsert_author;
use super::citation::{insert_citation, upsert_citing_paper};
use super::notice::upsert_notice;
use super::paper::upsert_paper;
use crate::db::DatabaseError;
use crate::models::CohortBundle;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub papers: usize,
    pub notices: usize,
    pub citing_papers: usize,
    pub citations: usize,
    pub authors: usize,
}

/// Load a normalised cohort bundle. All-or-nothing: any failing row rolls
/// back the whole import.
pub fn import_bundle(conn: &Connection, bundle: &CohortBundle) -> Result<ImportSummary, DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    for paper in &bundle.papers {
        upsert_paper(&tx, paper)?;
    }
    for notice in &bundle.notices {
        upsert_notice(&tx, notice)?;
    }
    for citing in &bundle.citing_papers {
        upsert_citing_paper(&tx, citing)?;
    }
    for citation in &bundle.citations {
        insert_citation(&tx, citation)?;
    }
    for author in &bundle.authors {
        upsert_author(&tx, author)?;
    }

    tx.commit()?;

    let summary = ImportSummary {
        papers: bundle.papers.len(),
        notices: bundle.notices.len(),
        citing_papers: bundle.citing_papers.len(),
        citations: bundle.citations.len(),
        authors: bundle.authors.len(),
    };
    tracing::info!(?summary, "Imported cohort bundle");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::*;

    fn bundle_json() -> &'static str {
        r#"{
            "papers": [{"pmid": "1", "journal_date": "2018-01-01"}],
            "notices": [{"pmid": "91", "journal_date": "2019-05-01", "papers": ["1"]}],
            "citing_papers": [{"scopus_id": "c1", "cover_date": "2020-02-02"}],
            "citations": [{"citing_id": "c1", "paper_pmid": "1"}],
            "authors": [{"auid": "a1", "aliases": [{"email_address": "a@example.com"}], "citing_papers": ["c1"]}]
        }"#
    }

    #[test]
    fn imports_every_entity() {
        let conn = open_memory_database().unwrap();
        let bundle: CohortBundle = serde_json::from_str(bundle_json()).unwrap();
        let summary = import_bundle(&conn, &bundle).unwrap();
        assert_eq!(summary.papers, 1);
        assert_eq!(summary.authors, 1);

        refresh_comparison_dates(&conn).unwrap();
        refresh_contactable_authors(&conn).unwrap();
        let pairs = get_citation_pairs(&conn).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].contactable_authors.len(), 1);
    }

    #[test]
    fn dangling_reference_rolls_back() {
        let conn = open_memory_database().unwrap();
        let mut bundle: CohortBundle = serde_json::from_str(bundle_json()).unwrap();
        bundle.citations.push(Citation {
            citing_id: "missing".into(),
            paper_pmid: "1".into(),
        });
        assert!(import_bundle(&conn, &bundle).is_err());
        assert!(get_all_papers(&conn).unwrap().is_empty());
    }

    #[test]
    fn imported_citing_works_start_uncounted() {
        let conn = open_memory_database().unwrap();
        let json = bundle_json().replace(
            r#""cover_date": "2020-02-02""#,
            r#""cover_date": "2020-02-02", "cited_in_rct": true"#,
        );
        let bundle: CohortBundle = serde_json::from_str(&json).unwrap();
        import_bundle(&conn, &bundle).unwrap();
        import_bundle(&conn, &bundle).unwrap();

        let pairs = get_citation_pairs(&conn).unwrap();
        assert!(pairs.iter().all(|p| !p.counted_toward_cohort));

        freeze_enrollment(&conn).unwrap();
        import_bundle(&conn, &bundle).unwrap();
        assert!(get_citation_pairs(&conn).unwrap().iter().all(|p| p.counted_toward_cohort));
    }

    #[test]
    fn reimport_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let bundle: CohortBundle = serde_json::from_str(bundle_json()).unwrap();
        import_bundle(&conn, &bundle).unwrap();
        import_bundle(&conn, &bundle).unwrap();
        assert_eq!(get_all_papers(&conn).unwrap().len(), 1);
        assert_eq!(get_citation_pairs(&conn).unwrap().len(), 1);
    }
}
