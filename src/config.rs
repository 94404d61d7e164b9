use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "Retractobot";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable naming the cohort database file.
pub const DATABASE_ENV: &str = "RETRACTOBOT_DB";

/// Papers marked manually as pilot-phase. Always excluded.
pub const PILOT_PMIDS: [&str; 15] = [
    "160560", "221532", "307018", "360062", "370596", "396398", "423962", "778343",
    "1281519", "1302352", "1324627", "1339389", "1343090", "1348070", "1359211",
];

/// Static stratification table: exposure >= threshold maps to bucket.
pub const STATIC_CUTS: [(u32, i64); 9] = [
    (0, 0),
    (10, 1),
    (20, 2),
    (50, 3),
    (100, 4),
    (500, 5),
    (1000, 6),
    (1500, 7),
    (5000, 8),
];

/// Papers published before this year are not eligible.
pub const MIN_PUBLICATION_YEAR: i32 = 2000;

/// Length of the post-randomisation follow-up window.
pub const FOLLOW_UP_DAYS: i64 = 365;

/// Simulation worker pool size. Independent of the number of strata.
pub const SIMULATION_WORKERS: usize = 2;

/// Default number of simulated randomisations.
pub const DEFAULT_SIMULATIONS: usize = 500;

/// Get the application data directory
/// ~/Retractobot/ on all platforms
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_NAME))
}

/// Default location of the cohort database when neither `--database` nor
/// `RETRACTOBOT_DB` is given.
pub fn default_database_path() -> PathBuf {
    app_data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cohort.db")
}

/// Fallback tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "retractobot=info,retractobot_lib=info"
}

/// Tunables for one trial invocation. CLI flags override the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialConfig {
    pub pilot_pmids: BTreeSet<String>,
    pub static_cuts: Vec<(u32, i64)>,
    pub min_publication_year: i32,
    pub follow_up_days: i64,
    pub workers: usize,
    /// Base seed. `None` draws one from the OS and logs it.
    pub seed: Option<u64>,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            pilot_pmids: PILOT_PMIDS.iter().map(|s| s.to_string()).collect(),
            static_cuts: STATIC_CUTS.to_vec(),
            min_publication_year: MIN_PUBLICATION_YEAR,
            follow_up_days: FOLLOW_UP_DAYS,
            workers: SIMULATION_WORKERS,
            seed: None,
        }
    }
}
