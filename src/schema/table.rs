//! Column and table schema model.
//!
//! One `TableSchema` describes the durable product table. The staging table and
//! the staging CSV column order are derived from it, so the three can never
//! drift apart.

use std::collections::HashSet;

use crate::error::AppError;
use crate::schema::ddl::validate_identifier;

/// Column holding the primary identity of a product.
pub const KEY_COLUMN: &str = "id";

/// Column the durable table stamps at merge time.
pub const SYNC_COLUMN: &str = "_synched";

/// Semantic column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    Integer,
    Text,
    Decimal,
    Timestamp,
}

impl LogicalType {
    /// DuckDB physical type.
    pub fn sql_type(self) -> &'static str {
        match self {
            LogicalType::Integer => "BIGINT",
            LogicalType::Text => "VARCHAR",
            LogicalType::Decimal => "DOUBLE",
            LogicalType::Timestamp => "TIMESTAMP",
        }
    }
}

/// Allow-listed column defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    CurrentTimestamp,
}

impl ColumnDefault {
    pub fn sql(self) -> &'static str {
        match self {
            ColumnDefault::CurrentTimestamp => "CURRENT_TIMESTAMP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnConstraints {
    pub nullable: bool,
    pub primary_key: bool,
    pub default: Option<ColumnDefault>,
}

impl ColumnConstraints {
    pub const NULLABLE: Self = Self {
        nullable: true,
        primary_key: false,
        default: None,
    };

    pub const NOT_NULL: Self = Self {
        nullable: false,
        primary_key: false,
        default: None,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaColumn {
    pub name: String,
    pub logical_type: LogicalType,
    pub constraints: ColumnConstraints,
}

impl SchemaColumn {
    pub fn new(name: impl Into<String>, logical_type: LogicalType, constraints: ColumnConstraints) -> Self {
        Self {
            name: name.into(),
            logical_type,
            constraints,
        }
    }
}

/// Ordered table definition.
///
/// Constructed per run and passed explicitly to the store and file writers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<SchemaColumn>,
    key_column: String,
    sync_column: Option<String>,
}

impl TableSchema {
    pub fn new(
        columns: Vec<SchemaColumn>,
        key_column: impl Into<String>,
        sync_column: Option<String>,
    ) -> Result<Self, AppError> {
        let key_column = key_column.into();
        if columns.is_empty() {
            return Err(AppError::usage("Table schema must declare at least one column."));
        }

        let mut seen = HashSet::new();
        for column in &columns {
            validate_identifier(&column.name)?;
            if !seen.insert(column.name.to_ascii_lowercase()) {
                return Err(AppError::usage(format!(
                    "Duplicate column `{}` in table schema.",
                    column.name
                )));
            }
        }

        if !columns.iter().any(|c| c.name == key_column) {
            return Err(AppError::usage(format!(
                "Key column `{key_column}` is not declared in the table schema."
            )));
        }

        if let Some(sync) = &sync_column {
            let column = columns
                .iter()
                .find(|c| &c.name == sync)
                .ok_or_else(|| AppError::usage(format!("Sync column `{sync}` is not declared in the table schema.")))?;
            if column.logical_type != LogicalType::Timestamp {
                return Err(AppError::usage(format!("Sync column `{sync}` must be a timestamp.")));
            }
            if sync == &key_column {
                return Err(AppError::usage("Sync column cannot also be the key column."));
            }
        }

        Ok(Self {
            columns,
            key_column,
            sync_column,
        })
    }

    /// Durable product table: record columns plus the `_synched` stamp, no primary key.
    pub fn products() -> Self {
        use ColumnConstraints as C;
        use LogicalType::*;

        let columns = vec![
            SchemaColumn::new(KEY_COLUMN, Integer, C::NOT_NULL),
            SchemaColumn::new("title", Text, C::NOT_NULL),
            SchemaColumn::new("price", Decimal, C::NOT_NULL),
            SchemaColumn::new("category", Text, C::NULLABLE),
            SchemaColumn::new("description", Text, C::NULLABLE),
            SchemaColumn::new("image", Text, C::NULLABLE),
            SchemaColumn::new("rating_rate", Decimal, C::NULLABLE),
            SchemaColumn::new("rating_count", Integer, C::NULLABLE),
            SchemaColumn::new("loaded_at", Timestamp, C::NULLABLE),
            SchemaColumn::new(
                SYNC_COLUMN,
                Timestamp,
                ColumnConstraints {
                    nullable: true,
                    primary_key: false,
                    default: Some(ColumnDefault::CurrentTimestamp),
                },
            ),
        ];

        Self {
            columns,
            key_column: KEY_COLUMN.to_string(),
            sync_column: Some(SYNC_COLUMN.to_string()),
        }
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    pub fn sync_column(&self) -> Option<&str> {
        self.sync_column.as_deref()
    }

    /// Columns present in staging files and the staging table, in order.
    pub fn load_columns(&self) -> Vec<&SchemaColumn> {
        self.columns
            .iter()
            .filter(|c| Some(c.name.as_str()) != self.sync_column())
            .collect()
    }

    pub fn load_column_names(&self) -> Vec<&str> {
        self.load_columns().into_iter().map(|c| c.name.as_str()).collect()
    }

    /// Staging form: sync column removed, primary key on the key column.
    ///
    /// The key catches duplicate ids inside one batch during the bulk load.
    pub fn staging(&self) -> TableSchema {
        let columns = self
            .load_columns()
            .into_iter()
            .map(|c| {
                let mut column = c.clone();
                if column.name == self.key_column {
                    column.constraints.primary_key = true;
                    column.constraints.nullable = false;
                }
                column
            })
            .collect();

        TableSchema {
            columns,
            key_column: self.key_column.clone(),
            sync_column: None,
        }
    }
}
