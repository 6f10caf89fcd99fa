//! Subject Runner - run one function over every subject of a dataset
//!
//! Enumerates the subject folders of a dataset, runs the chosen function on
//! each of them (in this process or on a pool of worker processes), and
//! prints the aggregated results table.
//!
//! ## Usage
//!
//! ```bash
//! # Run a function on all subjects with 4 workers
//! subject-runner run -f sct_propseg -d dataset_full/ -p "-i t2.nii.gz -c t2" -j 4
//!
//! # Same run, one subject at a time in this process, saved as CSV
//! subject-runner run -f inventory -d dataset_full/ --serial -o out/inventory.csv
//!
//! # Compare two saved runs
//! subject-runner compare out/before.csv out/after.csv --tolerance 1e-3
//!
//! # List registered functions
//! subject-runner list --env
//! ```

use clap::Parser;
use std::process;
use std::sync::Arc;
use tracing::{debug, error, warn};

mod cli;
mod config;
mod dataset;
mod error;
mod executor;
mod functions;
mod models;
mod output;
mod results;
mod utils;

use cli::{Args, Command};
use config::{AppConfig, EnvConfig};
use error::{RunnerError, EXIT_CONFIG};
use executor::{ExecutionMode, RunRequest, WorkerOptions, WorkerRequest};
use functions::Registry;
use output::{OutputFormat, ResultFormatter};
use utils::logger::{init_logger, Verbosity};

#[tokio::main]
async fn main() {
    let Args {
        command,
        verbose,
        config: config_arg,
    } = Args::parse();

    let env = EnvConfig::load();
    let config = match config::load_config(config_arg.as_deref(), &env) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(EXIT_CONFIG);
        }
    };

    let verbosity = verbose
        .and_then(Verbosity::from_level)
        .or_else(|| Verbosity::from_level(config.verbose))
        .unwrap_or_default();
    init_logger(verbosity);

    let code = match command {
        Command::Run(run_args) => {
            let options = WorkerOptions {
                config_path: config::find_config_file(config_arg.as_deref(), &env)
                    .map(|p| p.to_string_lossy().into_owned()),
                verbose: verbosity.level(),
            };
            run(run_args, &config, &options).await
        }
        Command::List(list_args) => list(list_args, &config, &env),
        Command::Compare(compare_args) => compare(compare_args),
        Command::Worker(worker_args) => worker(worker_args, &config),
    };

    process::exit(code);
}

async fn run(args: cli::RunArgs, config: &AppConfig, options: &WorkerOptions) -> i32 {
    let format_name = args.format.as_deref().unwrap_or(&config.format);
    let Some(format) = OutputFormat::from_str(format_name) else {
        eprintln!("Error: unknown output format '{format_name}'");
        return EXIT_CONFIG;
    };

    let mode = ExecutionMode::from_jobs(args.jobs.or(config.jobs), args.serial);
    let request = RunRequest::new(args.function, args.dataset, args.parameters, mode);
    let registry = Arc::new(Registry::from_config(config));

    let report =
        match executor::run_with_mode(&request, registry, options, executor::shutdown_signal())
            .await
        {
            Ok(report) => report,
            Err(e) => {
                match &e {
                    RunnerError::Interrupted => warn!("{e}"),
                    e if e.is_configuration() => eprintln!("Error: {e}"),
                    _ => error!("{e}"),
                }
                return e.exit_code();
            }
        };

    let mut formatter = ResultFormatter::new(format);
    if args.no_color {
        formatter = formatter.no_color();
    }
    match formatter.format_report(&report) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("Error: {e:#}");
            return EXIT_CONFIG;
        }
    }

    if let Some(path) = &args.output {
        if let Err(e) = results::save_table(path, &report.table) {
            eprintln!("Error: {e:#}");
            return EXIT_CONFIG;
        }
    }

    0
}

fn list(args: cli::ListArgs, config: &AppConfig, env: &EnvConfig) -> i32 {
    let registry = Registry::from_config(config);

    println!("Registered functions ({}):\n", registry.len());
    for function in registry.iter() {
        println!("  {:20} {}", function.name(), function.description());
    }
    println!();

    if args.env {
        config::print_env_help();
        if env.has_any() {
            println!("\nActive overrides: {env:?}");
        }
    }

    0
}

fn compare(args: cli::CompareArgs) -> i32 {
    let Some(format) = OutputFormat::from_str(&args.format) else {
        eprintln!("Error: unknown output format '{}'", args.format);
        return EXIT_CONFIG;
    };

    let tables = results::load_table(&args.first)
        .and_then(|first| Ok((first, results::load_table(&args.second)?)));
    let (first, second) = match tables {
        Ok(tables) => tables,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return EXIT_CONFIG;
        }
    };

    let comparison = results::compare_tables(&first, &second, args.tolerance, &args.ignore);
    match ResultFormatter::new(format).format_comparison(&comparison) {
        Ok(text) => print!("{text}"),
        Err(e) => {
            eprintln!("Error: {e:#}");
            return EXIT_CONFIG;
        }
    }

    if comparison.is_identical() {
        0
    } else {
        1
    }
}

fn worker(args: cli::WorkerArgs, config: &AppConfig) -> i32 {
    let registry = Registry::from_config(config);
    let request = WorkerRequest {
        function: args.function,
        subject: args.subject,
        parameters: args.parameters,
        threads: args.threads,
    };
    debug!("Worker request: {:?}", request);

    let reply = executor::execute_worker(&registry, &request);
    match serde_json::to_string(&reply) {
        Ok(line) => {
            println!("{line}");
            reply.exit_code()
        }
        Err(e) => {
            eprintln!("Error: {e}");
            EXIT_CONFIG
        }
    }
}
