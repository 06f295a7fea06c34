use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use spotmatch_types::Algorithm;

use crate::stage::pairs::DateFilter;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum InputDir {
    UnprocessedPhotos,
    Temp,
}

impl InputDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputDir::UnprocessedPhotos => "unprocessed_photos",
            InputDir::Temp => "temp",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum DateFilterArg {
    Before,
    After,
    All,
}

impl From<DateFilterArg> for DateFilter {
    fn from(value: DateFilterArg) -> Self {
        match value {
            DateFilterArg::Before => DateFilter::Before,
            DateFilterArg::After => DateFilter::After,
            DateFilterArg::All => DateFilter::All,
        }
    }
}

pub fn parse_cli() -> CliArgs {
    CliArgs::parse()
}

#[derive(Debug, Parser)]
#[command(
    name = "spotmatch",
    about = "Normalize patterned-region photographs and shortlist repeat sightings",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Override the parameter file (defaults to <project>/data/parameters.toml)
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Worker threads (defaults to the available hardware parallelism)
    #[arg(
        short = 'j',
        long = "jobs",
        global = true,
        value_parser = clap::value_parser!(usize)
    )]
    pub jobs: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the project directory layout, log files and parameter file
    Init {
        project: PathBuf,
    },
    /// Copy a <date>/<individual>/<photo> tree into unprocessed_photos
    Ingest {
        source: PathBuf,
        project: PathBuf,
    },
    /// Segment, crop, rotate and store every photograph of a project folder
    Normalize {
        project: PathBuf,
        #[arg(long = "input", value_enum, default_value_t = InputDir::UnprocessedPhotos)]
        input: InputDir,
    },
    /// Build the candidate pair list from two sighting catalogs
    Pairs {
        project: PathBuf,
        /// Focal catalog (relative paths resolve against <project>/data)
        #[arg(long = "focal")]
        focal: PathBuf,
        /// Query catalog (relative paths resolve against <project>/data)
        #[arg(long = "query")]
        query: PathBuf,
        #[arg(long = "filter-sex")]
        filter_sex: bool,
        #[arg(long = "filter-size")]
        filter_size: bool,
        #[arg(long = "date-filter", value_enum, default_value_t = DateFilterArg::All)]
        date_filter: DateFilterArg,
    },
    /// Score a candidate pair list and write the full and shortlisted results
    Compare {
        project: PathBuf,
        /// Pair list (relative paths resolve against <project>/data)
        #[arg(long = "pairs")]
        pairs: PathBuf,
        /// Comparison algorithm (repeatable): surf, sift, orb, akaze
        #[arg(long = "algorithm", required = true, value_parser = parse_algorithm)]
        algorithms: Vec<Algorithm>,
    },
    /// Compare every stored photo of a subject with its other photos
    SelfCompare {
        project: PathBuf,
        #[arg(long = "algorithm", required = true, value_parser = parse_algorithm)]
        algorithms: Vec<Algorithm>,
    },
}

fn parse_algorithm(value: &str) -> Result<Algorithm, String> {
    value.parse::<Algorithm>().map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn compare_accepts_long_algorithm_names() {
        let args = CliArgs::try_parse_from([
            "spotmatch",
            "--jobs",
            "3",
            "compare",
            "proj",
            "--pairs",
            "list.csv",
            "--algorithm",
            "orb_compare",
            "--algorithm",
            "sift",
        ])
        .unwrap();
        assert_eq!(args.jobs, Some(3));
        match args.command {
            Command::Compare { algorithms, .. } => {
                assert_eq!(algorithms, vec![Algorithm::Orb, Algorithm::Sift]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn pairs_defaults_to_unfiltered_dates() {
        let args = CliArgs::try_parse_from([
            "spotmatch", "pairs", "proj", "--focal", "f.csv", "--query", "q.csv",
        ])
        .unwrap();
        match args.command {
            Command::Pairs {
                date_filter,
                filter_sex,
                ..
            } => {
                assert_eq!(date_filter, DateFilterArg::All);
                assert!(!filter_sex);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
