//! DuckDB-backed product store.
//!
//! The durable table is an append-only history: it has no primary key and every
//! merge stamps its rows with one `_synched` wall-clock time. Each ingest call
//! stages the batch in a connection-scoped temp table keyed on `id` first, so a
//! duplicate id inside the batch fails the bulk load before the durable table is
//! touched.
//!
//! - connection + ingest (`mod.rs`)
//! - read-side queries for diagnostics and price history (`queries`)

use std::path::Path;

use chrono::{Local, NaiveDateTime};
use duckdb::{Connection, params};
use tracing::{debug, info};

use crate::error::AppError;
use crate::io::records::{NULL_MARKER, ensure_parent_dir};
use crate::schema::{
    CreateMode, TableSchema, column_list, create_table_sql, quote_identifier, quote_literal, staging_table_name,
};

pub mod queries;

/// Precision used for the `_synched` stamp bound into the merge.
const SYNC_STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Outcome of one ingest call.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub table: String,
    /// Rows merged into the durable table by this call.
    pub rows_loaded: usize,
    /// Durable row count after the merge.
    pub total_rows: i64,
    pub synched_at: NaiveDateTime,
}

pub struct ProductStore {
    conn: Connection,
}

impl ProductStore {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> Result<Self, AppError> {
        ensure_parent_dir(path)?;
        let conn = Connection::open(path)
            .map_err(|e| AppError::runtime(format!("Failed to open database '{}': {e}", path.display())))?;
        debug!(path = %path.display(), "opened database");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::runtime(format!("Failed to open in-memory database: {e}")))?;
        Ok(Self { conn })
    }

    /// Create the durable table if it does not exist yet. Never drops data.
    pub fn ensure_table(&self, table: &str, schema: &TableSchema) -> Result<(), AppError> {
        let sql = create_table_sql(schema, table, CreateMode::IfNotExists)?;
        self.conn
            .execute_batch(&sql)
            .map_err(|e| AppError::runtime(format!("Failed to create table `{table}`: {e}")))
    }

    /// Stage `source` and append it to the durable `table`, stamped with the current time.
    pub fn ingest(&mut self, table: &str, schema: &TableSchema, source: &Path) -> Result<IngestReport, AppError> {
        self.ingest_at(table, schema, source, Local::now().naive_local())
    }

    /// `ingest` with an explicit `_synched` stamp.
    pub fn ingest_at(
        &mut self,
        table: &str,
        schema: &TableSchema,
        source: &Path,
        synched_at: NaiveDateTime,
    ) -> Result<IngestReport, AppError> {
        if !source.is_file() {
            return Err(AppError::usage(format!("File not found: {}", source.display())));
        }
        let source_str = source
            .to_str()
            .ok_or_else(|| AppError::usage(format!("Source path is not valid UTF-8: {}", source.display())))?;

        // Build every statement up front so a bad identifier fails before any mutation.
        let staging_table = staging_table_name(table)?;
        let table_q = quote_identifier(table)?;
        let staging_q = quote_identifier(&staging_table)?;
        let staging_ddl = create_table_sql(&schema.staging(), &staging_table, CreateMode::TempReplace)?;
        let load_cols = column_list(schema.load_column_names())?;

        let copy_sql = format!(
            "COPY {staging_q} FROM {} (FORMAT csv, HEADER true, DELIMITER ',', QUOTE '\"', ESCAPE '\"', NULLSTR {})",
            quote_literal(source_str),
            quote_literal(NULL_MARKER)
        );
        let merge_sql = match schema.sync_column() {
            Some(sync) => format!(
                "INSERT INTO {table_q} ({load_cols}, {}) SELECT {load_cols}, CAST(? AS TIMESTAMP) FROM {staging_q}",
                quote_identifier(sync)?
            ),
            None => format!("INSERT INTO {table_q} ({load_cols}) SELECT {load_cols} FROM {staging_q}"),
        };
        let stamp = synched_at.format(SYNC_STAMP_FORMAT).to_string();

        self.ensure_table(table, schema)?;

        // Dropping the transaction on an error path rolls it back, staging table included.
        let tx = self
            .conn
            .transaction()
            .map_err(|e| AppError::runtime(format!("Failed to begin transaction: {e}")))?;

        tx.execute_batch(&staging_ddl)
            .map_err(|e| AppError::runtime(format!("Failed to create staging table `{staging_table}`: {e}")))?;

        tx.execute_batch(&copy_sql)
            .map_err(|e| AppError::runtime(format!("An error occurred while loading data into DuckDB: {e}")))?;

        let rows_loaded = if schema.sync_column().is_some() {
            tx.execute(&merge_sql, params![stamp])
        } else {
            tx.execute(&merge_sql, [])
        }
        .map_err(|e| AppError::runtime(format!("Failed to merge staging rows into `{table}`: {e}")))?;

        tx.execute_batch(&format!("DROP TABLE {staging_q}"))
            .map_err(|e| AppError::runtime(format!("Failed to drop staging table `{staging_table}`: {e}")))?;

        tx.commit()
            .map_err(|e| AppError::runtime(format!("Failed to commit load into `{table}`: {e}")))?;

        let total_rows = self.row_count(table)?;
        info!(table, rows_loaded, total_rows, "Data loaded into DuckDB.");

        Ok(IngestReport {
            table: table.to_string(),
            rows_loaded,
            total_rows,
            synched_at,
        })
    }
}
