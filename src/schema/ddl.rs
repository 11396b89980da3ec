//! SQL text generation from a `TableSchema`.
//!
//! Identifiers cannot be bound as parameters, so every table and column name is
//! checked against a strict allow-list before it is interpolated, and emitted
//! double-quoted. Types and defaults come from enums, never from free text.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::AppError;
use crate::schema::table::TableSchema;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier pattern is valid")
});

/// Longest identifier the allow-list accepts.
pub const MAX_IDENTIFIER_LEN: usize = 63;

const STAGING_SUFFIX: &str = "_staging";

/// How a table is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// `CREATE TABLE IF NOT EXISTS`; existing data is kept.
    IfNotExists,
    /// `CREATE OR REPLACE TEMP TABLE`; connection-scoped, replaced on every call.
    TempReplace,
}

pub fn validate_identifier(name: &str) -> Result<(), AppError> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(AppError::usage(format!(
            "Invalid SQL identifier `{name}`: expected letters, digits and underscores (max 63 chars)."
        )))
    }
}

/// Name of the per-call staging table for `table`.
///
/// Long table names are cut so the suffix still fits the identifier limit.
pub fn staging_table_name(table: &str) -> Result<String, AppError> {
    validate_identifier(table)?;
    let keep = table.len().min(MAX_IDENTIFIER_LEN - STAGING_SUFFIX.len());
    Ok(format!("{}{STAGING_SUFFIX}", &table[..keep]))
}

/// Quote a validated identifier.
pub fn quote_identifier(name: &str) -> Result<String, AppError> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

/// Quote a string literal (file paths in `COPY`).
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Comma-separated quoted column list.
pub fn column_list<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<String, AppError> {
    let quoted: Result<Vec<String>, AppError> = names.into_iter().map(quote_identifier).collect();
    Ok(quoted?.join(", "))
}

pub fn create_table_sql(schema: &TableSchema, table: &str, mode: CreateMode) -> Result<String, AppError> {
    let table = quote_identifier(table)?;

    let mut defs = Vec::with_capacity(schema.columns().len());
    for column in schema.columns() {
        let mut def = format!("{} {}", quote_identifier(&column.name)?, column.logical_type.sql_type());
        let c = column.constraints;
        if c.primary_key {
            def.push_str(" PRIMARY KEY");
        } else if !c.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = c.default {
            def.push_str(" DEFAULT ");
            def.push_str(default.sql());
        }
        defs.push(def);
    }

    let head = match mode {
        CreateMode::IfNotExists => "CREATE TABLE IF NOT EXISTS",
        CreateMode::TempReplace => "CREATE OR REPLACE TEMP TABLE",
    };

    Ok(format!("{head} {table} (\n    {}\n)", defs.join(",\n    ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durable_ddl_keeps_history_without_a_key() {
        let sql = create_table_sql(&TableSchema::products(), "products", CreateMode::IfNotExists).unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"products\""));
        assert!(sql.contains("\"id\" BIGINT NOT NULL"));
        assert!(sql.contains("\"price\" DOUBLE NOT NULL"));
        assert!(sql.contains("\"_synched\" TIMESTAMP DEFAULT CURRENT_TIMESTAMP"));
        assert!(!sql.contains("PRIMARY KEY"));
    }

    #[test]
    fn staging_ddl_is_temporary_and_keyed() {
        let staging = TableSchema::products().staging();
        let sql = create_table_sql(&staging, "products_staging", CreateMode::TempReplace).unwrap();
        assert!(sql.starts_with("CREATE OR REPLACE TEMP TABLE \"products_staging\""));
        assert!(sql.contains("\"id\" BIGINT PRIMARY KEY"));
        assert!(!sql.contains("_synched"));
    }

    #[test]
    fn table_names_are_allow_listed() {
        let schema = TableSchema::products();
        assert!(create_table_sql(&schema, "products; DROP TABLE x", CreateMode::IfNotExists).is_err());
        assert!(create_table_sql(&schema, "1products", CreateMode::IfNotExists).is_err());
        assert!(create_table_sql(&schema, "", CreateMode::IfNotExists).is_err());
        assert!(validate_identifier("_synched").is_ok());
    }

    #[test]
    fn staging_name_fits_the_identifier_limit() {
        assert_eq!(staging_table_name("products").unwrap(), "products_staging");

        let long = "t".repeat(MAX_IDENTIFIER_LEN);
        let staging = staging_table_name(&long).unwrap();
        assert_eq!(staging.len(), MAX_IDENTIFIER_LEN);
        assert!(staging.ends_with("_staging"));
        assert!(validate_identifier(&staging).is_ok());

        assert!(staging_table_name("bad name").is_err());
    }

    #[test]
    fn literals_escape_single_quotes() {
        assert_eq!(quote_literal("/tmp/o'brien.csv"), "'/tmp/o''brien.csv'");
    }
}
