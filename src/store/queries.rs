//! Read-side queries: table diagnostics and per-product price history.

use chrono::NaiveDateTime;
use duckdb::params;

use crate::domain::{ColumnInfo, PricePoint, ProductRecord, TIMESTAMP_FORMAT};
use crate::error::AppError;
use crate::schema::{SYNC_COLUMN, quote_identifier};
use crate::store::ProductStore;

/// `strftime` layout matching `TIMESTAMP_FORMAT`.
const SQL_TIMESTAMP: &str = "'%Y-%m-%d %H:%M:%S'";

/// Product columns as selected from the durable table.
const PRODUCT_COLUMNS: &str = "id, title, price, category, description, image, rating_rate, rating_count";

type RawProductRow = (
    i64,
    String,
    f64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<f64>,
    Option<i64>,
    Option<String>,
);

impl ProductStore {
    pub fn table_exists(&self, table: &str) -> Result<bool, AppError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
                params![table],
                |row| row.get(0),
            )
            .map_err(|e| AppError::runtime(format!("Failed to look up table `{table}`: {e}")))?;
        Ok(count > 0)
    }

    pub fn row_count(&self, table: &str) -> Result<i64, AppError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table)?);
        self.conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| AppError::runtime(format!("Failed to count rows in `{table}`: {e}")))
    }

    /// Number of merges recorded in the durable table.
    pub fn sync_batches(&self, table: &str) -> Result<i64, AppError> {
        let sql = format!(
            "SELECT COUNT(DISTINCT {}) FROM {}",
            quote_identifier(SYNC_COLUMN)?,
            quote_identifier(table)?
        );
        self.conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| AppError::runtime(format!("Failed to count loads in `{table}`: {e}")))
    }

    pub fn describe(&self, table: &str) -> Result<Vec<ColumnInfo>, AppError> {
        let sql = format!("DESCRIBE {}", quote_identifier(table)?);
        let map_err = |e: duckdb::Error| AppError::runtime(format!("Failed to describe `{table}`: {e}"));

        let mut stmt = self.conn.prepare(&sql).map_err(map_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    column_type: row.get(1)?,
                    nullable: row.get::<_, String>(2)? == "YES",
                })
            })
            .map_err(map_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(map_err)
    }

    /// First `limit` rows of the durable table, in storage order.
    pub fn sample_rows(&self, table: &str, limit: usize) -> Result<Vec<ProductRecord>, AppError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS}, strftime(loaded_at, {SQL_TIMESTAMP}) FROM {} LIMIT {limit}",
            quote_identifier(table)?
        );
        self.query_products(table, &sql, None)
    }

    /// Most recent row for `product_id` by `loaded_at`, newest merge first on ties.
    pub fn latest_product(&self, table: &str, product_id: i64) -> Result<Option<ProductRecord>, AppError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS}, strftime(loaded_at, {SQL_TIMESTAMP}) FROM {} \
             WHERE id = ? ORDER BY loaded_at DESC, {} DESC LIMIT 1",
            quote_identifier(table)?,
            quote_identifier(SYNC_COLUMN)?
        );
        Ok(self.query_products(table, &sql, Some(product_id))?.into_iter().next())
    }

    /// Price observations for `product_id`, oldest first.
    pub fn price_history(&self, table: &str, product_id: i64) -> Result<Vec<PricePoint>, AppError> {
        let sql = format!(
            "SELECT strftime(loaded_at, {SQL_TIMESTAMP}), price FROM {} \
             WHERE id = ? AND loaded_at IS NOT NULL ORDER BY loaded_at, {}",
            quote_identifier(table)?,
            quote_identifier(SYNC_COLUMN)?
        );
        let map_err = |e: duckdb::Error| AppError::runtime(format!("Failed to read price history from `{table}`: {e}"));

        let mut stmt = self.conn.prepare(&sql).map_err(map_err)?;
        let rows = stmt
            .query_map(params![product_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;

        rows.into_iter()
            .map(|(ds, y)| Ok(PricePoint { ds: parse_stored_timestamp(&ds)?, y }))
            .collect()
    }

    fn query_products(&self, table: &str, sql: &str, product_id: Option<i64>) -> Result<Vec<ProductRecord>, AppError> {
        let map_err = |e: duckdb::Error| AppError::runtime(format!("Failed to read products from `{table}`: {e}"));

        let mut stmt = self.conn.prepare(sql).map_err(map_err)?;
        let map_row = |row: &duckdb::Row<'_>| -> duckdb::Result<RawProductRow> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
            ))
        };
        let raw = match product_id {
            Some(id) => stmt.query_map(params![id], map_row),
            None => stmt.query_map([], map_row),
        }
        .map_err(map_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(map_err)?;

        raw.into_iter().map(into_record).collect()
    }
}

fn into_record(raw: RawProductRow) -> Result<ProductRecord, AppError> {
    let (id, title, price, category, description, image, rating_rate, rating_count, loaded_at) = raw;
    let loaded_at = loaded_at
        .ok_or_else(|| AppError::runtime(format!("Stored product {id} has no `loaded_at`.")))?;
    Ok(ProductRecord {
        id,
        title,
        price,
        category,
        description,
        image,
        rating_rate,
        rating_count,
        loaded_at: parse_stored_timestamp(&loaded_at)?,
    })
}

fn parse_stored_timestamp(s: &str) -> Result<NaiveDateTime, AppError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| AppError::runtime(format!("Unexpected stored timestamp '{s}': {e}")))
}
