//! One module per command verb. Each opens nothing itself: the caller hands
//! over a migrated connection and the resolved configuration.

pub mod dataset;
pub mod exclusion;
pub mod flowchart;
pub mod import;
pub mod randomisation;
pub mod simulation;

use std::path::Path;

use rusqlite::Connection;

use crate::cli::Command;
use crate::config::TrialConfig;
use crate::trial::TrialError;

/// Run one parsed command against the cohort database.
pub fn dispatch(
    conn: &Connection,
    mut config: TrialConfig,
    command: Command,
) -> Result<(), TrialError> {
    match command {
        Command::ImportCohort { input } => import::import_cohort(conn, &input),
        Command::ResetAndExclude { no_reset } => exclusion::reset_and_exclude(conn, config, !no_reset),
        Command::StratifyAndRandomize { check_only, seed } => {
            config.seed = seed.or(config.seed);
            randomisation::stratify_and_randomize(conn, config, check_only)
        }
        Command::Simulate { year, runs, output, stratification, seed, workers } => {
            config.seed = seed.or(config.seed);
            if let Some(workers) = workers {
                config.workers = workers;
            }
            simulation::simulate(conn, config, year, runs, &stratification, &output)
        }
        Command::BuildDataset { follow_up_date, output } => {
            dataset::build_dataset(conn, config, follow_up_date, &output)
        }
        Command::Flowchart => flowchart::flowchart(conn, config),
    }
}

/// Exports go next to existing files only; the directory must already exist.
pub(crate) fn check_output_path(path: &Path) -> Result<(), TrialError> {
    if path.is_dir() {
        return Err(TrialError::Config(format!(
            "output path {} is a directory",
            path.display()
        )));
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
            Err(TrialError::Config(format!(
                "output directory {} does not exist",
                parent.display()
            )))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{get_all_papers, import_bundle};
    use crate::db::sqlite::open_memory_database;
    use crate::models::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, 1)
    }

    /// Eight eligible papers, each cited once by its own author.
    fn bundle() -> CohortBundle {
        let mut bundle = CohortBundle::default();
        for i in 0..8 {
            let pmid = format!("{}", 100 + i);
            let mut paper = RetractedPaper::new(&pmid);
            paper.journal_date = date(2004 + i, 1);
            bundle.papers.push(paper);
            bundle.notices.push(RetractionNotice {
                pmid: format!("9{pmid}"),
                title: None,
                art_date: None,
                journal_date: date(2012 + i % 4, 6),
                comparison_date: None,
                papers: vec![pmid.clone()],
            });
            let citing = format!("s{i}");
            bundle.citing_papers.push(CitingPaper {
                scopus_id: citing.clone(),
                pmid: None,
                title: None,
                art_date: date(2016, 3),
                journal_date: None,
                cover_date: None,
                comparison_date: None,
                pub_types: vec![],
            });
            bundle.citations.push(Citation { citing_id: citing.clone(), paper_pmid: pmid });
            bundle.authors.push(Author {
                auid: format!("au{i}"),
                aliases: vec![AuthorAlias {
                    email_address: Some(format!("author{i}@example.org")),
                    surname: None,
                    given_name: None,
                }],
                citing_papers: vec![citing],
                retracted_papers: vec![],
            });
        }
        bundle
    }

    #[test]
    fn full_trial_through_dispatch() {
        let conn = open_memory_database().unwrap();
        import_bundle(&conn, &bundle()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = TrialConfig::default;

        dispatch(&conn, config(), Command::ResetAndExclude { no_reset: false }).unwrap();
        dispatch(&conn, config(), Command::StratifyAndRandomize { check_only: false, seed: Some(3) })
            .unwrap();
        assert!(get_all_papers(&conn).unwrap().iter().all(|p| p.arm.is_randomised()));

        let err = dispatch(
            &conn,
            config(),
            Command::StratifyAndRandomize { check_only: false, seed: Some(4) },
        )
        .unwrap_err();
        assert!(matches!(err, TrialError::Precondition { .. }));

        let analysis = dir.path().join("analysis.csv");
        dispatch(
            &conn,
            config(),
            Command::BuildDataset { follow_up_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), output: analysis.clone() },
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(&analysis).unwrap().lines().count(), 9);

        let simulation = dir.path().join("simulation.csv");
        dispatch(
            &conn,
            config(),
            Command::Simulate {
                year: 2016,
                runs: 3,
                output: simulation.clone(),
                stratification: vec![Stratification::Static, Stratification::Deciles],
                seed: Some(1),
                workers: Some(2),
            },
        )
        .unwrap();
        let text = std::fs::read_to_string(&simulation).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.contains(",static_stratum,deciles_stratum,"));
        assert!(header.ends_with("static_run_2,deciles_run_0,deciles_run_1,deciles_run_2"));

        dispatch(&conn, config(), Command::Flowchart).unwrap();
    }

    #[test]
    fn failed_export_writes_nothing() {
        let conn = open_memory_database().unwrap();
        import_bundle(&conn, &bundle()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("analysis.csv");
        dispatch(&conn, TrialConfig::default(), Command::ResetAndExclude { no_reset: false }).unwrap();

        // Nobody randomised yet.
        let result = dispatch(
            &conn,
            TrialConfig::default(),
            Command::BuildDataset { follow_up_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), output: output.clone() },
        );
        assert!(result.is_err());
        assert!(!output.exists());
    }

    #[test]
    fn output_path_checks() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_output_path(&dir.path().join("out.csv")).is_ok());
        assert!(check_output_path(dir.path()).is_err());
        assert!(check_output_path(&dir.path().join("missing").join("out.csv")).is_err());
        assert!(check_output_path(Path::new("relative.csv")).is_ok());
    }
}
