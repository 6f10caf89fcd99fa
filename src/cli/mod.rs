//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Run a function on every subject of a dataset and aggregate the results
#[derive(Parser, Debug)]
#[command(name = "subject-runner")]
#[command(version)]
#[command(about = "Run a function on every subject of a dataset and aggregate the results")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose. 0: warnings and errors only, 1: basic, 2: extended
    #[arg(short, long, global = true, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub verbose: Option<u8>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a function across a dataset
    Run(RunArgs),

    /// List registered functions
    List(ListArgs),

    /// Compare two saved result tables
    Compare(CompareArgs),

    /// Run a single job (used internally by the worker pool)
    #[command(hide = true)]
    Worker(WorkerArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Function to test
    #[arg(short, long)]
    pub function: String,

    /// Dataset directory
    #[arg(short, long)]
    pub dataset: PathBuf,

    /// Arguments to pass to the function that is tested
    #[arg(short, long, default_value = "", allow_hyphen_values = true)]
    pub parameters: String,

    /// Number of worker processes. 0 or unset: one per available core.
    /// Use --serial to run without worker processes
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Run jobs one by one in this process, without a worker pool
    #[arg(long, conflicts_with = "jobs")]
    pub serial: bool,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(long)]
    pub format: Option<String>,

    /// Save the aggregated table to a file (.csv or .json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Also show environment variables
    #[arg(short, long)]
    pub env: bool,
}

/// Arguments for compare command
#[derive(Parser, Debug)]
pub struct CompareArgs {
    /// First results file
    pub first: PathBuf,

    /// Second results file
    pub second: PathBuf,

    /// Absolute tolerance for numeric cells
    #[arg(short, long, default_value = "1e-6")]
    pub tolerance: f64,

    /// Columns to skip (repeatable)
    #[arg(short, long, default_values_t = vec!["duration_ms".to_string()])]
    pub ignore: Vec<String>,

    /// Output format (table, json, json-pretty)
    #[arg(long, default_value = "table")]
    pub format: String,
}

/// Arguments for worker command
#[derive(Parser, Debug)]
pub struct WorkerArgs {
    #[arg(long)]
    pub function: String,

    #[arg(long)]
    pub subject: PathBuf,

    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub parameters: String,

    /// Threads each job may use (0 = library default)
    #[arg(long, default_value = "1")]
    pub threads: usize,
}
