//! Command-line parsing for the product price log.
//!
//! Parsing and dispatch stay separate from the pipeline so the pipeline can be
//! driven from tests without argv.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::data::DEFAULT_API_URL;
use crate::domain::parse_rule;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "pricelog",
    version,
    about = "Fetch, validate and load product data, and simulate price history"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct GlobalArgs {
    /// Root directory for staging files, archives and databases.
    #[arg(long, env = "PRICELOG_DATA_DIR", default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Product API endpoint.
    #[arg(long, env = "PRICELOG_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Durable table name.
    #[arg(long, env = "PRICELOG_TABLE", default_value = "products", global = true)]
    pub table: String,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch and validate products, then load the valid batch (default).
    Run,
    /// Fetch and validate products, writing the staging CSV and invalid archive only.
    Fetch,
    /// Load an existing staging CSV into the database.
    Ingest(IngestArgs),
    /// Fetch products and rebuild the simulation database with a year of daily prices.
    Simulate(SimulateArgs),
    /// Print a product's price history from the simulation database.
    History(HistoryArgs),
}

#[derive(Debug, Args, Clone)]
pub struct IngestArgs {
    /// Staging CSV to load (defaults to `<data-dir>/valid/products.csv`).
    #[arg(long, value_name = "CSV")]
    pub source: Option<PathBuf>,

    /// Database file (defaults to `<data-dir>/products.duckdb`).
    #[arg(long, value_name = "DB")]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Number of days to simulate, counting today.
    #[arg(short = 'd', long, default_value_t = 365, value_parser = clap::value_parser!(u32).range(1..))]
    pub days: u32,

    /// Seed for the price noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Per-category drift over the window, e.g. `electronics=-0.1` (repeatable; overrides defaults).
    #[arg(long = "rule", value_name = "CATEGORY=ADJUSTMENT", value_parser = parse_rule)]
    pub rules: Vec<(String, f64)>,

    /// Start from an empty rule table instead of the built-in one.
    #[arg(long)]
    pub no_default_rules: bool,
}

#[derive(Debug, Args, Clone)]
pub struct HistoryArgs {
    /// Product id to look up.
    pub product_id: i64,

    /// Export the full `ds,y` series to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Number of most recent observations to print.
    #[arg(long, default_value_t = 30)]
    pub tail: usize,

    /// Database file (defaults to `<data-dir>/sim/products.duckdb`).
    #[arg(long, value_name = "DB")]
    pub database: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulate_rules_parse_and_repeat() {
        let cli = Cli::try_parse_from([
            "pricelog",
            "simulate",
            "--days",
            "30",
            "--rule",
            "electronics=-0.1",
            "--rule",
            "women's clothing=0.05",
        ])
        .unwrap();

        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.days, 30);
        assert_eq!(args.rules.len(), 2);
        assert_eq!(args.rules[1].0, "women's clothing");
    }

    #[test]
    fn zero_day_window_is_a_usage_error() {
        assert!(Cli::try_parse_from(["pricelog", "simulate", "--days", "0"]).is_err());
    }

    #[test]
    fn history_requires_a_numeric_product_id() {
        assert!(Cli::try_parse_from(["pricelog", "history"]).is_err());
        assert!(Cli::try_parse_from(["pricelog", "history", "abc"]).is_err());

        let cli = Cli::try_parse_from(["pricelog", "history", "7", "--data-dir", "/tmp/x"]).unwrap();
        assert_eq!(cli.global.data_dir, PathBuf::from("/tmp/x"));
    }
}
