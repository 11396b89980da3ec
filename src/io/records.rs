//! Staging CSV read/write.
//!
//! The staging CSV is the hand-off between validation and the store: its column
//! order is the schema's load column order, because the bulk load maps columns
//! by position. Absent values are written as `NULL_MARKER` so an empty string
//! survives the round trip as an empty string.

use std::collections::HashMap;
use std::fs::{File, create_dir_all};
use std::path::Path;

use chrono::NaiveDateTime;
use csv::StringRecord;

use crate::domain::{ProductRecord, TIMESTAMP_FORMAT};
use crate::error::AppError;
use crate::schema::TableSchema;

/// Cell text for an absent value, in both directions.
pub const NULL_MARKER: &str = "\\N";

/// Write records to `path` (overwritten) in the schema's load column order.
pub fn write_staging_csv(path: &Path, schema: &TableSchema, records: &[ProductRecord]) -> Result<(), AppError> {
    ensure_parent_dir(path)?;
    let columns = schema.load_column_names();

    let file = File::create(path)
        .map_err(|e| AppError::usage(format!("Failed to create staging CSV '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);

    writer
        .write_record(&columns)
        .map_err(|e| AppError::usage(format!("Failed to write staging CSV header: {e}")))?;

    for record in records {
        let row = columns
            .iter()
            .map(|name| record_field(record, name))
            .collect::<Result<Vec<String>, AppError>>()?;
        writer
            .write_record(&row)
            .map_err(|e| AppError::usage(format!("Failed to write staging CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::usage(format!("Failed to flush staging CSV '{}': {e}", path.display())))?;
    Ok(())
}

/// Read a staging CSV back into records, matching columns by header name.
pub fn read_staging_csv(path: &Path) -> Result<Vec<ProductRecord>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::usage(format!("Failed to open staging CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::usage(format!("Failed to read staging CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    for required in ["id", "title", "price"] {
        if !header_map.contains_key(required) {
            return Err(AppError::usage(format!("Missing required column: `{required}`")));
        }
    }

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        let row = result.map_err(|e| AppError::usage(format!("CSV parse error on line {line}: {e}")))?;
        let record = parse_row(&row, &header_map)
            .map_err(|e| AppError::usage(format!("Invalid staging row on line {line}: {e}")))?;
        records.push(record);
    }

    Ok(records)
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)
            .map_err(|e| AppError::usage(format!("Failed to create directory '{}': {e}", parent.display())))?;
    }
    Ok(())
}

fn record_field(record: &ProductRecord, column: &str) -> Result<String, AppError> {
    let value = match column {
        "id" => record.id.to_string(),
        "title" => record.title.clone(),
        "price" => record.price.to_string(),
        "category" => nullable(record.category.clone()),
        "description" => nullable(record.description.clone()),
        "image" => nullable(record.image.clone()),
        "rating_rate" => nullable(record.rating_rate.map(|v| v.to_string())),
        "rating_count" => nullable(record.rating_count.map(|v| v.to_string())),
        "loaded_at" => record.loaded_at.format(TIMESTAMP_FORMAT).to_string(),
        other => {
            return Err(AppError::usage(format!(
                "Schema column `{other}` has no product record field."
            )));
        }
    };
    Ok(value)
}

fn nullable(value: Option<String>) -> String {
    value.unwrap_or_else(|| NULL_MARKER.to_string())
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<ProductRecord, String> {
    let id = get_required(record, header_map, "id")?
        .parse::<i64>()
        .map_err(|e| format!("Invalid `id`: {e}"))?;
    let title = get_required(record, header_map, "title")?.to_string();
    let price = parse_opt_f64(Some(get_required(record, header_map, "price")?))
        .ok_or_else(|| "Invalid `price`.".to_string())?;

    let rating_count = match get_optional_number(record, header_map, "rating_count") {
        Some(s) => Some(s.parse::<i64>().map_err(|e| format!("Invalid `rating_count`: {e}"))?),
        None => None,
    };

    let loaded_at = match get_optional(record, header_map, "loaded_at") {
        Some(s) => parse_timestamp(s)?,
        None => return Err("Missing required value: `loaded_at`".to_string()),
    };

    Ok(ProductRecord {
        id,
        title,
        price,
        category: get_optional(record, header_map, "category").map(str::to_string),
        description: get_optional(record, header_map, "description").map(str::to_string),
        image: get_optional(record, header_map, "image").map(str::to_string),
        rating_rate: parse_opt_f64(get_optional_number(record, header_map, "rating_rate")),
        rating_count,
        loaded_at,
    })
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| format!("Invalid timestamp '{s}' (expected YYYY-MM-DD HH:MM:SS): {e}"))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .filter(|s| *s != NULL_MARKER)
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).filter(|s| *s != NULL_MARKER)
}

/// Numeric cells treat blank as absent too.
fn get_optional_number<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Option<&'a str> {
    get_optional(record, header_map, name).filter(|s| !s.trim().is_empty())
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let v = s?.trim().parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
