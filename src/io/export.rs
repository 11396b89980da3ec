//! Batch side outputs: the invalid-record archive and price history exports.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, TimeZone};
use serde_json::Value;

use crate::domain::{InvalidRecord, PricePoint, TIMESTAMP_FORMAT};
use crate::error::AppError;
use crate::io::records::ensure_parent_dir;

/// Archive path for a batch: `<dir>/<unix seconds>_products_invalid.json`.
///
/// `batch_ts` is local wall-clock time.
pub fn invalid_archive_path(dir: &Path, batch_ts: NaiveDateTime) -> PathBuf {
    dir.join(format!("{}_products_invalid.json", local_epoch_seconds(batch_ts)))
}

/// Unix seconds of a local wall-clock time; the earlier instant on a DST fold.
fn local_epoch_seconds(ts: NaiveDateTime) -> i64 {
    Local
        .from_local_datetime(&ts)
        .earliest()
        // Nonexistent local time (DST gap).
        .map(|t| t.timestamp())
        .unwrap_or_else(|| ts.and_utc().timestamp())
}

/// Write the batch's invalid records as one JSON array, exactly as fetched.
///
/// Returns `None` (and writes nothing) when the batch had no invalid records.
pub fn write_invalid_archive(
    dir: &Path,
    batch_ts: NaiveDateTime,
    invalid: &[InvalidRecord],
) -> Result<Option<PathBuf>, AppError> {
    if invalid.is_empty() {
        return Ok(None);
    }

    let path = invalid_archive_path(dir, batch_ts);
    ensure_parent_dir(&path)?;

    let file = File::create(&path)
        .map_err(|e| AppError::usage(format!("Failed to create invalid archive '{}': {e}", path.display())))?;
    let originals: Vec<&Value> = invalid.iter().map(|r| &r.record).collect();
    serde_json::to_writer_pretty(file, &originals)
        .map_err(|e| AppError::usage(format!("Failed to write invalid archive: {e}")))?;

    Ok(Some(path))
}

/// Write a `ds,y` price series for an external forecaster.
pub fn write_history_csv(path: &Path, points: &[PricePoint]) -> Result<(), AppError> {
    ensure_parent_dir(path)?;
    let file = File::create(path)
        .map_err(|e| AppError::usage(format!("Failed to create history CSV '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);

    writer
        .write_record(["ds", "y"])
        .map_err(|e| AppError::usage(format!("Failed to write history CSV header: {e}")))?;
    for p in points {
        writer
            .write_record([p.ds.format(TIMESTAMP_FORMAT).to_string(), format!("{:.2}", p.y)])
            .map_err(|e| AppError::usage(format!("Failed to write history CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::usage(format!("Failed to flush history CSV: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn archive_holds_untouched_originals() {
        let dir = tempfile::tempdir().unwrap();
        let invalid = vec![
            InvalidRecord {
                record: json!({"id": 1, "price": "invalid"}),
                reason: "`price` must be a number.".to_string(),
            },
            InvalidRecord {
                record: json!({"id": 3, "title": null}),
                reason: "`title` must be a string.".to_string(),
            },
        ];

        let path = write_invalid_archive(dir.path(), ts(), &invalid).unwrap().unwrap();
        let epoch = Local.from_local_datetime(&ts()).single().unwrap().timestamp();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("{epoch}_products_invalid.json")
        );

        let text = std::fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!([{"id": 1, "price": "invalid"}, {"id": 3, "title": null}]));
    }

    #[test]
    fn archive_name_is_the_real_epoch_of_local_time() {
        let local = Local::now();
        let naive = local.naive_local();
        let name = invalid_archive_path(Path::new("invalid"), naive);
        assert_eq!(
            name,
            Path::new("invalid").join(format!("{}_products_invalid.json", local.timestamp()))
        );
    }

    #[test]
    fn empty_batch_writes_no_archive() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_invalid_archive(dir.path(), ts(), &[]).unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn history_csv_uses_ds_y_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let points = vec![PricePoint { ds: ts(), y: 9.5 }];
        write_history_csv(&path, &points).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "ds,y\n2024-01-01 00:00:00,9.50\n");
    }
}
