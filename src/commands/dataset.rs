//! `build-dataset`

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;

use super::check_output_path;
use crate::config::TrialConfig;
use crate::trial::{write_analysis_csv, SqliteCohort, TrialError, TrialRunner};

pub fn build_dataset(
    conn: &Connection,
    config: TrialConfig,
    follow_up: NaiveDate,
    output: &Path,
) -> Result<(), TrialError> {
    check_output_path(output)?;
    let cohort = SqliteCohort::new(conn);
    let runner = TrialRunner::new(&cohort, config);
    let rows = runner.build_dataset(follow_up)?;
    write_analysis_csv(output, &rows)
}
