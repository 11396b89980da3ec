//! Shared domain types.
//!
//! These types are intentionally small and owned so they can be:
//!
//! - produced by validation and consumed by the file writers
//! - read back from the store for diagnostics and history
//! - cloned per simulated day without borrowing headaches

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde_json::Value;

/// Timestamp layout used in staging files and for values bound into SQL.
///
/// DuckDB casts this layout to `TIMESTAMP` without a format hint.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A validated, flattened product row.
///
/// `loaded_at` is the batch timestamp; the durable `_synched` stamp is owned by
/// the store and never appears here.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub id: i64,
    pub title: String,
    pub price: f64,
    pub category: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub rating_rate: Option<f64>,
    pub rating_count: Option<i64>,
    pub loaded_at: NaiveDateTime,
}

impl ProductRecord {
    /// Copy of this record re-priced and re-stamped for another batch.
    pub fn repriced(&self, price: f64, loaded_at: NaiveDateTime) -> Self {
        Self {
            price,
            loaded_at,
            ..self.clone()
        }
    }
}

/// A fetched record that failed validation, kept exactly as fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidRecord {
    pub record: Value,
    pub reason: String,
}

/// Per-record classification result.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid(ProductRecord),
    Invalid(InvalidRecord),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid(_))
    }
}

/// All records of one fetch, split by validation outcome (input order kept).
#[derive(Debug, Clone)]
pub struct ValidatedBatch {
    pub loaded_at: NaiveDateTime,
    pub fetched: usize,
    pub valid: Vec<ProductRecord>,
    pub invalid: Vec<InvalidRecord>,
}

/// One observation of a product's price history (`ds`, `y` as forecasters name them).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub ds: NaiveDateTime,
    pub y: f64,
}

/// One row of a table description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: String,
    pub nullable: bool,
}

/// Per-category fractional price drift over the whole simulation window.
///
/// `+0.1` means the price was 10% higher at the start of the window than today,
/// i.e. it decreased by 10% over the window.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRules {
    rules: BTreeMap<String, f64>,
}

impl CategoryRules {
    pub fn empty() -> Self {
        Self { rules: BTreeMap::new() }
    }

    pub fn insert(&mut self, category: impl Into<String>, adjustment: f64) {
        self.rules.insert(category.into(), adjustment);
    }

    /// Adjustment for `category`; unknown or missing categories drift by zero.
    pub fn adjustment(&self, category: Option<&str>) -> f64 {
        category
            .and_then(|c| self.rules.get(c))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for CategoryRules {
    fn default() -> Self {
        let mut rules = Self::empty();
        rules.insert("electronics", -0.1);
        rules.insert("men's clothing", -0.1);
        rules.insert("women's clothing", -0.1);
        rules.insert("jewelry", -0.2);
        // The product API spells it this way.
        rules.insert("jewelery", -0.2);
        rules
    }
}

/// Parse a `CATEGORY=ADJUSTMENT` pair (clap value parser).
pub fn parse_rule(raw: &str) -> Result<(String, f64), String> {
    let (category, adjustment) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("Invalid rule '{raw}'. Expected CATEGORY=ADJUSTMENT."))?;
    let category = category.trim();
    if category.is_empty() {
        return Err(format!("Invalid rule '{raw}': empty category."));
    }
    let adjustment: f64 = adjustment
        .trim()
        .parse()
        .map_err(|e| format!("Invalid adjustment in rule '{raw}': {e}"))?;
    if !adjustment.is_finite() {
        return Err(format!("Invalid adjustment in rule '{raw}': must be finite."));
    }
    Ok((category.to_string(), adjustment))
}

/// Paths and names shared by every pipeline step.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub api_url: String,
    pub data_dir: PathBuf,
    pub table: String,
}

impl PipelineConfig {
    pub fn valid_dir(&self) -> PathBuf {
        self.data_dir.join("valid")
    }

    pub fn invalid_dir(&self) -> PathBuf {
        self.data_dir.join("invalid")
    }

    /// Staging CSV written by `fetch` and read by `ingest`.
    pub fn staging_csv(&self) -> PathBuf {
        self.valid_dir().join("products.csv")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("products.duckdb")
    }

    pub fn sim_database_path(&self) -> PathBuf {
        self.data_dir.join("sim").join("products.duckdb")
    }

    /// Per-day batch file, overwritten for every simulated day.
    pub fn sim_work_csv(&self) -> PathBuf {
        self.data_dir.join("sim_products.csv")
    }
}

/// Simulation knobs.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub window_days: u32,
    pub seed: u64,
    pub rules: CategoryRules,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            window_days: 365,
            seed: 42,
            rules: CategoryRules::default(),
        }
    }
}
