//! Command-line surface.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::config::{DATABASE_ENV, DEFAULT_SIMULATIONS};
use crate::models::Stratification;

#[derive(Parser, Debug)]
#[command(name = "retractobot")]
#[command(about = "Retracted-paper trial: exclusions, randomisation and analysis datasets")]
#[command(version)]
pub struct Cli {
    /// Cohort database file
    #[arg(long, global = true, env = DATABASE_ENV)]
    pub database: Option<PathBuf>,

    /// More logging (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a normalised cohort bundle (JSON) into the database
    ImportCohort {
        #[arg(long)]
        input: PathBuf,
    },

    /// Apply the inclusion/exclusion criteria
    ResetAndExclude {
        /// Keep existing exclusions and assignments; only evaluate pending papers
        #[arg(long)]
        no_reset: bool,
    },

    /// Stratify pending papers and run the one authoritative randomisation
    StratifyAndRandomize {
        /// Print the balance table without saving anything
        #[arg(long)]
        check_only: bool,

        /// Randomisation seed (drawn and logged when omitted)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Simulate randomisation as of a past year (never saved)
    Simulate {
        /// Simulated randomisation year
        #[arg(long)]
        year: i32,

        /// Number of randomisations
        #[arg(long, default_value_t = DEFAULT_SIMULATIONS)]
        runs: usize,

        /// Simulation dataset filename
        #[arg(long)]
        output: PathBuf,

        /// Stratification schemes to compare, comma separated
        #[arg(
            long,
            value_parser = parse_stratification,
            value_delimiter = ',',
            default_values = ["static", "deciles"]
        )]
        stratification: Vec<Stratification>,

        #[arg(long)]
        seed: Option<u64>,

        /// Worker pool size
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Generate the analysis dataset
    BuildDataset {
        /// Citations on or after this date (YYYY-MM-DD) are counted
        #[arg(long, value_parser = parse_date)]
        follow_up_date: NaiveDate,

        /// Analysis dataset filename
        #[arg(long)]
        output: PathBuf,
    },

    /// Print the enrollment flow counts
    Flowchart,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("Not a valid date: {s:?}"))
}

fn parse_stratification(s: &str) -> Result<Stratification, String> {
    s.parse().map_err(|_| format!("expected one of: static, deciles (got {s:?})"))
}

impl Cli {
    /// Fallback filter level from `-v`/`-q`.
    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_simulate() {
        let cli = Cli::try_parse_from([
            "retractobot", "simulate", "--year", "2019", "--runs", "10", "--output", "sim.csv",
            "--stratification", "deciles",
        ])
        .unwrap();
        match cli.command {
            Command::Simulate { year, runs, stratification, workers, .. } => {
                assert_eq!(year, 2019);
                assert_eq!(runs, 10);
                assert_eq!(stratification, vec![Stratification::Deciles]);
                assert!(workers.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn simulate_defaults_to_both_schemes_and_500_runs() {
        let cli = Cli::try_parse_from([
            "retractobot", "simulate", "--year", "2019", "--output", "sim.csv",
        ])
        .unwrap();
        match cli.command {
            Command::Simulate { runs, stratification, .. } => {
                assert_eq!(runs, 500);
                assert_eq!(stratification, vec![Stratification::Static, Stratification::Deciles]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stratification_takes_a_list() {
        let cli = Cli::try_parse_from([
            "retractobot", "simulate", "--year", "2019", "--output", "sim.csv",
            "--stratification", "deciles,static",
        ])
        .unwrap();
        match cli.command {
            Command::Simulate { stratification, .. } => {
                assert_eq!(stratification, vec![Stratification::Deciles, Stratification::Static]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Cli::try_parse_from([
            "retractobot", "simulate", "--year", "2019", "--output", "sim.csv",
            "--stratification", "static,groups",
        ])
        .is_err());
    }

    #[test]
    fn rejects_bad_follow_up_date() {
        let err = Cli::try_parse_from([
            "retractobot", "build-dataset", "--follow-up-date", "2022-13-01", "--output", "x.csv",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("Not a valid date"));
    }

    #[test]
    fn verbosity_maps_to_level() {
        let cli = Cli::try_parse_from(["retractobot", "-vv", "flowchart"]).unwrap();
        assert_eq!(cli.log_level(), "trace");
        let cli = Cli::try_parse_from(["retractobot", "--quiet", "flowchart"]).unwrap();
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn check_only_flag() {
        let cli = Cli::try_parse_from([
            "retractobot", "stratify-and-randomize", "--check-only", "--seed", "5",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::StratifyAndRandomize { check_only: true, seed: Some(5) }
        ));
    }
}
