use std::collections::HashMap;

use chrono::NaiveDate;
use rusqlite::{params, Connection};

use super::{date_from_sql, date_to_sql};
use crate::db::DatabaseError;
use crate::models::RetractionNotice;

/// Insert or refresh a retraction notice and link it to the papers it retracts.
pub fn upsert_notice(conn: &Connection, notice: &RetractionNotice) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO retraction_notices (pmid, title, art_date, journal_date, comparison_date)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(pmid) DO UPDATE SET
            title = excluded.title,
            art_date = excluded.art_date,
            journal_date = excluded.journal_date,
            comparison_date = COALESCE(excluded.comparison_date, retraction_notices.comparison_date)",
        params![
            notice.pmid,
            notice.title,
            date_to_sql(notice.art_date),
            date_to_sql(notice.journal_date),
            date_to_sql(notice.comparison_date),
        ],
    )?;
    for paper_pmid in &notice.papers {
        conn.execute(
            "INSERT OR IGNORE INTO notice_papers (notice_pmid, paper_pmid) VALUES (?1, ?2)",
            params![notice.pmid, paper_pmid],
        )?;
    }
    Ok(())
}

/// Earliest dated notice per retracted paper. Papers whose notices are all
/// undated (or that have none) are absent from the map.
pub fn get_earliest_notice_dates(
    conn: &Connection,
) -> Result<HashMap<String, NaiveDate>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT np.paper_pmid, MIN(n.comparison_date)
         FROM notice_papers np
         JOIN retraction_notices n ON n.pmid = np.notice_pmid
         WHERE n.comparison_date IS NOT NULL
         GROUP BY np.paper_pmid",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut dates = HashMap::new();
    for row in rows {
        let (pmid, date) = row?;
        if let Some(date) = date_from_sql("notice comparison_date", Some(date))? {
            dates.insert(pmid, date);
        }
    }
    Ok(dates)
}

pub fn count_notices(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM retraction_notices", [], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::*;
    use crate::db::repository::refresh_comparison_dates;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn earliest_of_several_notices_wins() {
        let conn = open_memory_database().unwrap();
        add_paper(&conn, "1", "2010-01-01", Some("2015-05-05"));
        upsert_notice(
            &conn,
            &RetractionNotice {
                pmid: "late".into(),
                title: None,
                art_date: Some(date("2016-01-01")),
                journal_date: None,
                comparison_date: None,
                papers: vec!["1".into()],
            },
        )
        .unwrap();
        refresh_comparison_dates(&conn).unwrap();

        let dates = get_earliest_notice_dates(&conn).unwrap();
        assert_eq!(dates.get("1"), Some(&date("2015-05-05")));
        assert_eq!(count_notices(&conn).unwrap(), 2);
    }

    #[test]
    fn undated_notice_leaves_paper_out() {
        let conn = open_memory_database().unwrap();
        add_paper(&conn, "1", "2010-01-01", None);
        refresh_comparison_dates(&conn).unwrap();
        assert!(get_earliest_notice_dates(&conn).unwrap().get("1").is_none());
    }
}
