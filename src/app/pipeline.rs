//! Shared pipeline steps used by every CLI subcommand.
//!
//! fetch -> validate -> staging CSV + invalid archive -> ingest -> simulate -> history
//!
//! Each step takes its paths and schema explicitly and returns data; printing is
//! left to the CLI.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, Timelike};
use serde_json::Value;
use tracing::{info, warn};

use crate::data::{ProductApiClient, SimulationReport, UniformNoise, simulate};
use crate::domain::{ColumnInfo, PipelineConfig, PricePoint, ProductRecord, SimulationConfig, ValidatedBatch};
use crate::error::AppError;
use crate::io::{read_staging_csv, write_invalid_archive, write_staging_csv};
use crate::schema::TableSchema;
use crate::store::{IngestReport, ProductStore};
use crate::validate::validate_batch;

/// Rows shown in post-ingest diagnostics.
const SAMPLE_ROWS: usize = 1;

/// Result of one fetch-validate-write cycle.
#[derive(Debug, Clone)]
pub struct FetchOutput {
    pub batch: ValidatedBatch,
    /// `None` when the batch had no valid records (no file written).
    pub staging_csv: Option<PathBuf>,
    pub invalid_archive: Option<PathBuf>,
}

/// Result of one ingest call plus post-load diagnostics.
#[derive(Debug, Clone)]
pub struct IngestOutput {
    pub report: IngestReport,
    pub columns: Vec<ColumnInfo>,
    pub sample: Vec<ProductRecord>,
}

#[derive(Debug, Clone)]
pub struct HistoryOutput {
    pub product: ProductRecord,
    pub points: Vec<PricePoint>,
}

/// Fetch from the API, validate and write the batch files.
pub fn run_fetch(config: &PipelineConfig, schema: &TableSchema) -> Result<FetchOutput, AppError> {
    let raw = ProductApiClient::new(config.api_url.clone()).fetch_products()?;
    process_fetched(config, schema, &raw, batch_timestamp())
}

/// Validate already-fetched records and write the batch files.
pub fn process_fetched(
    config: &PipelineConfig,
    schema: &TableSchema,
    raw: &[Value],
    loaded_at: NaiveDateTime,
) -> Result<FetchOutput, AppError> {
    let batch = validate_batch(raw, loaded_at);

    let staging_csv = if batch.valid.is_empty() {
        warn!("No valid records to save.");
        None
    } else {
        let path = config.staging_csv();
        write_staging_csv(&path, schema, &batch.valid)?;
        info!(rows = batch.valid.len(), "Valid data saved to {}", path.display());
        Some(path)
    };

    let invalid_archive = write_invalid_archive(&config.invalid_dir(), loaded_at, &batch.invalid)?;
    if let Some(path) = &invalid_archive {
        info!(rows = batch.invalid.len(), "Invalid data saved to {}", path.display());
    }

    Ok(FetchOutput {
        batch,
        staging_csv,
        invalid_archive,
    })
}

/// Load a staging CSV into `table` and collect diagnostics.
pub fn run_ingest(
    database: &Path,
    table: &str,
    schema: &TableSchema,
    source: &Path,
) -> Result<IngestOutput, AppError> {
    // Checked before opening so a missing file never creates an empty database.
    if !source.is_file() {
        return Err(AppError::usage(format!("File not found: {}", source.display())));
    }
    let mut store = ProductStore::open(database)?;
    ingest_with_diagnostics(&mut store, table, schema, source)
}

pub fn ingest_with_diagnostics(
    store: &mut ProductStore,
    table: &str,
    schema: &TableSchema,
    source: &Path,
) -> Result<IngestOutput, AppError> {
    let report = store.ingest(table, schema, source)?;
    let columns = store.describe(table)?;
    let sample = store.sample_rows(table, SAMPLE_ROWS)?;
    Ok(IngestOutput {
        report,
        columns,
        sample,
    })
}

/// Fetch once, then rebuild the simulation database from the valid batch.
pub fn run_simulation(
    config: &PipelineConfig,
    schema: &TableSchema,
    sim: &SimulationConfig,
) -> Result<(FetchOutput, SimulationReport), AppError> {
    let fetch = run_fetch(config, schema)?;
    let staging = fetch
        .staging_csv
        .clone()
        .ok_or_else(|| AppError::no_data("No valid products fetched; nothing to simulate."))?;

    let base = read_staging_csv(&staging)?;
    let database = config.sim_database_path();
    remove_database(&database)?;

    let mut store = ProductStore::open(&database)?;
    let mut noise = UniformNoise::seeded(sim.seed);
    let report = simulate(
        &mut store,
        &config.table,
        schema,
        &base,
        sim,
        &config.sim_work_csv(),
        &mut noise,
        Local::now().naive_local(),
    )?;

    Ok((fetch, report))
}

/// Latest product row and its full price history.
pub fn run_history(database: &Path, table: &str, product_id: i64) -> Result<HistoryOutput, AppError> {
    if !database.is_file() {
        return Err(AppError::usage(format!(
            "Database not found: {} (run `pricelog simulate` first).",
            database.display()
        )));
    }
    let store = ProductStore::open(database)?;
    history_from_store(&store, table, product_id)
}

pub fn history_from_store(store: &ProductStore, table: &str, product_id: i64) -> Result<HistoryOutput, AppError> {
    if !store.table_exists(table)? {
        return Err(AppError::no_data(format!("Table `{table}` does not exist.")));
    }
    let product = store
        .latest_product(table, product_id)?
        .ok_or_else(|| AppError::no_data(format!("No historical data found for product_id {product_id}.")))?;
    let points = store.price_history(table, product_id)?;
    Ok(HistoryOutput { product, points })
}

/// Batch timestamps have second precision.
fn batch_timestamp() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Remove a database file and its write-ahead log so a run starts fresh.
fn remove_database(path: &Path) -> Result<(), AppError> {
    let mut wal = path.as_os_str().to_owned();
    wal.push(".wal");

    for file in [path.to_path_buf(), PathBuf::from(wal)] {
        if file.exists() {
            std::fs::remove_file(&file)
                .map_err(|e| AppError::usage(format!("Failed to remove '{}': {e}", file.display())))?;
            info!(path = %file.display(), "removed previous simulation database");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn config(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            api_url: "http://localhost.invalid/products".to_string(),
            data_dir: dir.to_path_buf(),
            table: "products".to_string(),
        }
    }

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn fetched() -> Vec<Value> {
        vec![
            json!({"id": 1, "title": "Backpack", "price": 109.95, "category": "men's clothing",
                   "rating": {"rate": 3.9, "count": 120}}),
            json!({"id": 2, "title": "T-Shirt", "price": "invalid", "category": "men's clothing"}),
            json!({"id": 3, "title": null, "price": 55.99}),
            json!({"id": 4, "title": "Slim Fit", "price": 15.99, "rating": {"rate": 2.1}}),
            json!({"id": 5, "title": "Bracelet", "price": 695, "category": "jewelery",
                   "rating": {"count": 400}}),
            json!({"id": 6, "title": "Ring", "price": 168}),
        ]
    }

    #[test]
    fn fetched_batch_lands_in_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let schema = TableSchema::products();

        let fetch = process_fetched(&config, &schema, &fetched(), ts()).unwrap();
        assert_eq!(fetch.batch.valid.len(), 4);
        assert_eq!(fetch.batch.invalid.len(), 2);
        assert_eq!(fetch.staging_csv.as_deref(), Some(config.staging_csv().as_path()));
        assert!(fetch.invalid_archive.as_ref().unwrap().starts_with(config.invalid_dir()));

        let ingest = run_ingest(&config.database_path(), "products", &schema, &config.staging_csv()).unwrap();
        assert_eq!(ingest.report.rows_loaded, 4);
        assert_eq!(ingest.report.total_rows, 4);
        assert_eq!(ingest.columns.len(), schema.columns().len());
        assert_eq!(ingest.sample.len(), 1);

        // Same batch again: history accumulates.
        let again = run_ingest(&config.database_path(), "products", &schema, &config.staging_csv()).unwrap();
        assert_eq!(again.report.total_rows, 8);
    }

    #[test]
    fn empty_title_survives_load_and_reread() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let schema = TableSchema::products();
        let raw = vec![
            json!({"id": 1, "title": "ok", "price": 1.0}),
            json!({"id": 2, "title": "", "price": 2.0}),
        ];

        let fetch = process_fetched(&config, &schema, &raw, ts()).unwrap();
        assert_eq!(fetch.batch.valid.len(), 2);
        assert!(fetch.invalid_archive.is_none());

        let ingest = run_ingest(&config.database_path(), "products", &schema, &config.staging_csv()).unwrap();
        assert_eq!(ingest.report.rows_loaded, 2);

        let base = read_staging_csv(&config.staging_csv()).unwrap();
        assert_eq!(base[1].title, "");
    }

    #[test]
    fn all_invalid_batch_writes_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let raw = vec![json!({"id": "x"}), json!(null)];

        let fetch = process_fetched(&config, &TableSchema::products(), &raw, ts()).unwrap();
        assert!(fetch.staging_csv.is_none());
        assert!(!config.staging_csv().exists());
        assert!(fetch.invalid_archive.is_some());
    }

    #[test]
    fn ingest_of_missing_file_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let err = run_ingest(&config.database_path(), "products", &TableSchema::products(), &config.staging_csv())
            .unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_USAGE);
        assert!(!config.database_path().exists());
    }

    #[test]
    fn history_reports_unknown_products() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let schema = TableSchema::products();
        process_fetched(&config, &schema, &fetched(), ts()).unwrap();
        run_ingest(&config.database_path(), "products", &schema, &config.staging_csv()).unwrap();

        let history = run_history(&config.database_path(), "products", 5).unwrap();
        assert_eq!(history.product.title, "Bracelet");
        assert_eq!(history.points.len(), 1);
        assert_eq!(history.points[0].y, 695.0);

        let err = run_history(&config.database_path(), "products", 2).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_NO_DATA);

        let err = run_history(&dir.path().join("missing.duckdb"), "products", 1).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_USAGE);
    }

    #[test]
    fn remove_database_clears_file_and_wal() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("products.duckdb");
        std::fs::write(&db, b"x").unwrap();
        std::fs::write(dir.path().join("products.duckdb.wal"), b"x").unwrap();

        remove_database(&db).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        remove_database(&db).unwrap();
    }
}
