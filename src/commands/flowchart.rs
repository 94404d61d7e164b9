//! `flowchart`

use rusqlite::Connection;

use crate::config::TrialConfig;
use crate::trial::{SqliteCohort, TrialError, TrialRunner};

pub fn flowchart(conn: &Connection, config: TrialConfig) -> Result<(), TrialError> {
    let cohort = SqliteCohort::new(conn);
    let report = TrialRunner::new(&cohort, config).flowchart()?;
    print!("{report}");
    Ok(())
}
