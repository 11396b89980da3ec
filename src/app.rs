//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and initializes logging
//! - parses CLI arguments
//! - runs the requested pipeline steps
//! - prints reports and writes optional exports

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, GlobalArgs, HistoryArgs, IngestArgs, SimulateArgs};
use crate::domain::{CategoryRules, PipelineConfig, SimulationConfig};
use crate::error::AppError;
use crate::schema::TableSchema;

pub mod pipeline;

/// Entry point for the `pricelog` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    // `pricelog` with no subcommand behaves like `pricelog run`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    let config = pipeline_config(&cli.global);

    match cli.command {
        Command::Run => handle_run(&config),
        Command::Fetch => handle_fetch(&config),
        Command::Ingest(args) => handle_ingest(&config, &args),
        Command::Simulate(args) => handle_simulate(&config, &args),
        Command::History(args) => handle_history(&config, &args),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr; stdout carries the reports.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn pipeline_config(args: &GlobalArgs) -> PipelineConfig {
    PipelineConfig {
        api_url: args.api_url.clone(),
        data_dir: args.data_dir.clone(),
        table: args.table.clone(),
    }
}

pub fn simulation_config(args: &SimulateArgs) -> SimulationConfig {
    let mut rules = if args.no_default_rules {
        CategoryRules::empty()
    } else {
        CategoryRules::default()
    };
    for (category, adjustment) in &args.rules {
        rules.insert(category.clone(), *adjustment);
    }

    SimulationConfig {
        window_days: args.days,
        seed: args.seed,
        rules,
    }
}

fn handle_run(config: &PipelineConfig) -> Result<(), AppError> {
    let schema = TableSchema::products();
    let fetch = pipeline::run_fetch(config, &schema)?;
    println!("{}", crate::report::format_fetch_summary(&fetch));

    let source = fetch
        .staging_csv
        .as_deref()
        .ok_or_else(|| AppError::no_data("No valid records fetched; nothing to load."))?;

    let ingest = pipeline::run_ingest(&config.database_path(), &config.table, &schema, source)?;
    println!("{}", crate::report::format_ingest_report(&ingest));
    Ok(())
}

fn handle_fetch(config: &PipelineConfig) -> Result<(), AppError> {
    let fetch = pipeline::run_fetch(config, &TableSchema::products())?;
    println!("{}", crate::report::format_fetch_summary(&fetch));
    Ok(())
}

fn handle_ingest(config: &PipelineConfig, args: &IngestArgs) -> Result<(), AppError> {
    let source = args.source.clone().unwrap_or_else(|| config.staging_csv());
    let database = args.database.clone().unwrap_or_else(|| config.database_path());

    let ingest = pipeline::run_ingest(&database, &config.table, &TableSchema::products(), &source)?;
    println!("{}", crate::report::format_ingest_report(&ingest));
    Ok(())
}

fn handle_simulate(config: &PipelineConfig, args: &SimulateArgs) -> Result<(), AppError> {
    let sim = simulation_config(args);
    info!(
        days = sim.window_days,
        seed = sim.seed,
        rules = sim.rules.len(),
        "starting simulation"
    );

    let (fetch, report) = pipeline::run_simulation(config, &TableSchema::products(), &sim)?;
    println!("{}", crate::report::format_fetch_summary(&fetch));
    println!("{}", crate::report::format_simulation_summary(&report, &sim.rules));
    Ok(())
}

fn handle_history(config: &PipelineConfig, args: &HistoryArgs) -> Result<(), AppError> {
    let database = args.database.clone().unwrap_or_else(|| config.sim_database_path());
    let history = pipeline::run_history(&database, &config.table, args.product_id)?;

    println!("{}", crate::report::format_history(&history, args.tail));

    if let Some(path) = &args.export {
        crate::io::write_history_csv(path, &history.points)?;
        println!("History exported to {}", path.display());
    }
    Ok(())
}

/// Rewrite argv so `pricelog` defaults to `pricelog run`.
///
/// Rules:
/// - `pricelog`                        -> `pricelog run`
/// - `pricelog --data-dir x ...`       -> `pricelog run --data-dir x ...`
/// - `pricelog --help/--version/-h`    -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    // Flags are global, so they can follow the inserted subcommand.
    if arg1.starts_with('-') && !argv.iter().skip(1).any(|a| is_subcommand(a)) {
        argv.insert(1, "run".to_string());
    }

    argv
}

fn is_subcommand(arg: &str) -> bool {
    matches!(arg, "run" | "fetch" | "ingest" | "simulate" | "history")
}
