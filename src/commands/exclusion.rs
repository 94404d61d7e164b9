//! `reset-and-exclude`

use rusqlite::Connection;

use crate::config::TrialConfig;
use crate::trial::{SqliteCohort, TrialError, TrialRunner};

pub fn reset_and_exclude(
    conn: &Connection,
    config: TrialConfig,
    reset: bool,
) -> Result<(), TrialError> {
    let cohort = SqliteCohort::new(conn);
    let runner = TrialRunner::new(&cohort, config);
    let outcome = runner.reset_and_exclude(reset)?;
    println!("Excluded {} papers; {} pending", outcome.excluded.len(), outcome.pending);
    Ok(())
}
