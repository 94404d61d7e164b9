//! `import-cohort`: load a normalised JSON bundle.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rusqlite::Connection;

use crate::db::repository::import_bundle;
use crate::models::CohortBundle;
use crate::trial::TrialError;

pub fn import_cohort(conn: &Connection, input: &Path) -> Result<(), TrialError> {
    if !input.is_file() {
        return Err(TrialError::Config(format!("File not found: {}", input.display())));
    }
    let bundle: CohortBundle = serde_json::from_reader(BufReader::new(File::open(input)?))?;
    let summary = import_bundle(conn, &bundle)?;
    tracing::info!(
        papers = summary.papers,
        notices = summary.notices,
        citing_papers = summary.citing_papers,
        citations = summary.citations,
        authors = summary.authors,
        "Imported cohort bundle"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::get_all_papers;
    use crate::db::sqlite::open_memory_database;
    use std::io::Write;

    #[test]
    fn imports_bundle_file() {
        let conn = open_memory_database().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"papers": [{{"pmid": "1", "journal_date": "2018-01-01"}}, {{"pmid": "2"}}]}}"#
        )
        .unwrap();

        import_cohort(&conn, file.path()).unwrap();
        assert_eq!(get_all_papers(&conn).unwrap().len(), 2);
    }

    #[test]
    fn malformed_bundle_imports_nothing() {
        let conn = open_memory_database().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"papers": [{{"pmid": "1"}}"#).unwrap();

        assert!(matches!(import_cohort(&conn, file.path()), Err(TrialError::Json(_))));
        assert!(get_all_papers(&conn).unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_config_error() {
        let conn = open_memory_database().unwrap();
        let err = import_cohort(&conn, Path::new("/nonexistent/bundle.json")).unwrap_err();
        assert!(matches!(err, TrialError::Config(_)));
    }
}
