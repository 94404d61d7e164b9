//! `simulate`

use std::path::Path;

use rusqlite::Connection;

use super::check_output_path;
use crate::config::TrialConfig;
use crate::models::Stratification;
use crate::trial::{write_simulation_csv, SqliteCohort, TrialError, TrialRunner};

pub fn simulate(
    conn: &Connection,
    config: TrialConfig,
    year: i32,
    runs: usize,
    schemes: &[Stratification],
    output: &Path,
) -> Result<(), TrialError> {
    check_output_path(output)?;
    let cohort = SqliteCohort::new(conn);
    let runner = TrialRunner::new(&cohort, config);
    let dataset = runner.simulate(year, runs, schemes)?;
    write_simulation_csv(output, &dataset)
}
