//! Trial engine: eligibility, stratification, randomisation, contamination
//! and the analysis datasets.
//!
//! Stages, leaves first:
//! ```text
//! CohortRepository → exclusion → stratify → randomize → contamination / dataset
//! ```
//!
//! The repository is injected through [`CohortRepository`]; the engine
//! holds no process-wide state and always works on a [`CohortSnapshot`].

pub mod error;
pub mod types;
pub mod traits;
pub mod stats;
pub mod exclusion;
pub mod stratify;
pub mod randomize;
pub mod contamination;
pub mod dataset;
pub mod summary;
pub mod store;
pub mod runner;

pub use error::TrialError;
pub use types::*;
pub use traits::*;
pub use exclusion::{apply_exclusions, ExclusionOutcome};
pub use stratify::{exposure_metrics, CutTable, DecileCuts, ExposureCutoff, Stratifier};
pub use randomize::{allocation_digest, randomise, simulate, RandomisationRequest};
pub use contamination::{detect_contamination, Contamination};
pub use dataset::{
    write_analysis_csv, write_simulation_csv, AnalysisRow, FollowUpWindow, SimulationDataset,
};
pub use summary::{BalanceSummary, FlowReport};
pub use store::SqliteCohort;
pub use runner::{RandomisationOutcome, TrialRunner};
