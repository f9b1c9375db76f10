//! Defines command-line interface options using `clap` for the em-sitd tool.

use clap::{Parser, Subcommand, ValueEnum};
use em_sitd::categories::DEFAULT_CATEGORY_CAP;
use em_sitd::compare::ComparisonTest;
use em_sitd::pipeline::SurveyInput;
use std::path::PathBuf;

/// Map EM sea-ice thickness surveys onto an ocean-model grid
#[derive(Parser, Debug)]
#[command(
    name = "em-sitd",
    version,
    about = "Grid EM ice thickness surveys into monthly thickness distributions"
)]
pub struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bin survey files into a monthly SITD NetCDF file
    Sample(SampleArgs),
    /// Compare a SITD file with a model category distribution
    Compare(CompareArgs),
    /// Summarize a SITD file
    Inspect {
        /// Path to the SITD NetCDF file
        file: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
pub struct SampleArgs {
    /// Grid coordinates file (NetCDF with 2-D longitude/latitude)
    #[arg(short, long)]
    pub grid: PathBuf,

    /// Output SITD NetCDF file
    #[arg(short, long)]
    pub output: PathBuf,

    /// JSON sampling configuration; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Category upper boundaries in metres, comma separated, e.g. 0.5,1,2,99
    #[arg(long, value_delimiter = ',')]
    pub boundaries: Option<Vec<f64>>,

    /// Keep grid rows up to the last one south of this latitude
    #[arg(long, allow_hyphen_values = true, conflicts_with = "no_crop")]
    pub lat_limit: Option<f64>,

    /// Use the full grid
    #[arg(long)]
    pub no_crop: bool,

    /// Drop readings thicker than this (m)
    #[arg(long, conflicts_with = "no_window")]
    pub max_thickness: Option<f64>,

    /// Keep every reading regardless of thickness
    #[arg(long)]
    pub no_window: bool,

    /// Survey files in time order, each optionally suffixed with a year
    /// correction as <path>:<years>, e.g. survey14.nc:1
    #[arg(required = true, value_parser = parse_survey_arg)]
    pub inputs: Vec<SurveyInput>,
}

#[derive(clap::Args, Debug)]
pub struct CompareArgs {
    /// SITD file written by `sample`
    #[arg(long)]
    pub observed: PathBuf,

    /// Model output with a (time, category, y, x) variable
    #[arg(long)]
    pub model: PathBuf,

    /// SITD time steps to sum, comma separated
    #[arg(long, value_delimiter = ',', default_value = "0")]
    pub steps: Vec<usize>,

    /// Model category variable
    #[arg(long, default_value = "siconcat")]
    pub model_var: String,

    /// Model time step
    #[arg(long, default_value_t = 0)]
    pub model_step: usize,

    /// Include the last (sentinel) category in the test
    #[arg(long)]
    pub keep_last: bool,

    /// Two-sample test applied in every cell
    #[arg(long, value_enum, default_value_t = TestArg::Ks)]
    pub test: TestArg,

    /// Thickness (m) standing in for the sentinel boundary in mean thickness
    #[arg(long, default_value_t = DEFAULT_CATEGORY_CAP)]
    pub thickness_cap: f64,

    /// Path to save the p-value and mean-thickness maps as NetCDF. If not set,
    /// prints a summary only.
    #[arg(long)]
    pub output_netcdf: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestArg {
    /// Two-sample Kolmogorov-Smirnov
    Ks,
    /// Wilcoxon rank-sum (Mann-Whitney U)
    MannWhitney,
}

impl From<TestArg> for ComparisonTest {
    fn from(arg: TestArg) -> Self {
        match arg {
            TestArg::Ks => Self::Ks,
            TestArg::MannWhitney => Self::MannWhitney,
        }
    }
}

fn parse_survey_arg(s: &str) -> Result<SurveyInput, String> {
    if s.is_empty() {
        return Err("Empty survey path".to_string());
    }
    // a trailing :<int> is a year correction, anything else is part of the path
    match s.rsplit_once(':') {
        Some((path, years)) if !path.is_empty() => match years.parse::<i32>() {
            Ok(offset) => Ok(SurveyInput::new(path).with_year_offset(offset)),
            Err(_) => Ok(SurveyInput::new(s)),
        },
        _ => Ok(SurveyInput::new(s)),
    }
}
