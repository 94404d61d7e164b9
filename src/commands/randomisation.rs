//! `stratify-and-randomize`

use chrono::{Datelike, Local};
use rusqlite::Connection;

use crate::config::TrialConfig;
use crate::trial::{SqliteCohort, TrialError, TrialRunner};

/// Years-since covariates in the balance table are relative to the current year.
pub fn stratify_and_randomize(
    conn: &Connection,
    config: TrialConfig,
    check_only: bool,
) -> Result<(), TrialError> {
    let cohort = SqliteCohort::new(conn);
    let runner = TrialRunner::new(&cohort, config);
    let outcome = runner.stratify_and_randomise(check_only, Local::now().year())?;
    print!("{}", outcome.summary);
    if let Some(run_id) = &outcome.run_id {
        println!("Randomisation {run_id} saved");
    }
    Ok(())
}
