//! Plain-text summaries printed after each command.
//!
//! Formatting lives here so the pipeline returns data and the CLI only prints.

use std::fmt::Write;

use crate::app::pipeline::{FetchOutput, HistoryOutput, IngestOutput};
use crate::data::SimulationReport;
use crate::domain::{CategoryRules, ProductRecord, TIMESTAMP_FORMAT};

pub fn format_fetch_summary(fetch: &FetchOutput) -> String {
    let mut out = String::new();
    let batch = &fetch.batch;

    let _ = writeln!(out, "=== pricelog - fetch ===");
    let _ = writeln!(out, "Batch: {}", batch.loaded_at.format(TIMESTAMP_FORMAT));
    let _ = writeln!(
        out,
        "Fetched: {}  valid: {}  invalid: {}",
        batch.fetched,
        batch.valid.len(),
        batch.invalid.len()
    );
    match &fetch.staging_csv {
        Some(path) => {
            let _ = writeln!(out, "Valid data saved to {}", path.display());
        }
        None => {
            let _ = writeln!(out, "No valid records to save.");
        }
    }
    match &fetch.invalid_archive {
        Some(path) => {
            let _ = writeln!(out, "Invalid data saved to {}", path.display());
        }
        None => {
            let _ = writeln!(out, "No invalid records to save.");
        }
    }
    out
}

pub fn format_ingest_report(ingest: &IngestOutput) -> String {
    let mut out = String::new();
    let report = &ingest.report;

    let _ = writeln!(out, "=== pricelog - ingest `{}` ===", report.table);
    let _ = writeln!(out, "Number of rows loaded: {}", report.rows_loaded);
    let _ = writeln!(out, "Number of rows: {}", report.total_rows);
    let _ = writeln!(out, "Synched at: {}", report.synched_at.format(TIMESTAMP_FORMAT));

    let _ = writeln!(out, "\nTable schema:");
    let name_width = ingest
        .columns
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(0)
        .max("column".len());
    let _ = writeln!(out, "  {:<name_width$}  {:<10}  null", "column", "type");
    for c in &ingest.columns {
        let _ = writeln!(
            out,
            "  {:<name_width$}  {:<10}  {}",
            c.name,
            c.column_type,
            if c.nullable { "YES" } else { "NO" }
        );
    }

    if !ingest.sample.is_empty() {
        let _ = writeln!(out, "\nSample data:");
        for record in &ingest.sample {
            let _ = writeln!(out, "  {}", format_product_line(record));
        }
    }
    out
}

pub fn format_simulation_summary(report: &SimulationReport, rules: &CategoryRules) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== pricelog - simulate ===");
    let _ = writeln!(
        out,
        "Window: {} days ({} .. {})",
        report.days,
        report.oldest.format(TIMESTAMP_FORMAT),
        report.newest.format(TIMESTAMP_FORMAT)
    );
    let _ = writeln!(out, "Products: {}", report.products);
    let _ = writeln!(out, "Rows loaded: {}  durable rows: {}", report.rows_loaded, report.total_rows);

    if rules.is_empty() {
        let _ = writeln!(out, "Adjustment rules: none (noise only)");
    } else {
        let _ = writeln!(out, "Adjustment rules:");
        for (category, adjustment) in rules.iter() {
            let _ = writeln!(out, "  {category:<20} {:+.1}%", adjustment * 100.0);
        }
    }
    let _ = writeln!(out, "Data simulation complete.");
    out
}

/// Product details followed by the last `tail` points of its history.
pub fn format_history(history: &HistoryOutput, tail: usize) -> String {
    let mut out = String::new();
    let p = &history.product;

    let _ = writeln!(out, "Product Information:");
    let _ = writeln!(out, "  id:          {}", p.id);
    let _ = writeln!(out, "  title:       {}", p.title);
    let _ = writeln!(out, "  category:    {}", p.category.as_deref().unwrap_or("-"));
    let _ = writeln!(out, "  price:       {:.2}", p.price);
    let _ = writeln!(
        out,
        "  rating:      {} ({} votes)",
        p.rating_rate.map(|r| format!("{r:.1}")).unwrap_or_else(|| "-".to_string()),
        p.rating_count.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
    );
    let _ = writeln!(out, "  loaded_at:   {}", p.loaded_at.format(TIMESTAMP_FORMAT));

    let points = &history.points;
    let _ = writeln!(out, "\nPrice history ({} observations):", points.len());
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        let (min, max) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
        let _ = writeln!(
            out,
            "  first {:.2} -> last {:.2}  (min {:.2}, max {:.2})",
            first.y, last.y, min, max
        );
    }
    let skip = points.len().saturating_sub(tail);
    for point in &points[skip..] {
        let _ = writeln!(out, "  {}  {:>10.2}", point.ds.format(TIMESTAMP_FORMAT), point.y);
    }
    out
}

fn format_product_line(p: &ProductRecord) -> String {
    format!(
        "{} | {} | {:.2} | {} | {}",
        p.id,
        p.title,
        p.price,
        p.category.as_deref().unwrap_or("-"),
        p.loaded_at.format(TIMESTAMP_FORMAT)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PricePoint;
    use chrono::NaiveDate;

    fn record() -> ProductRecord {
        ProductRecord {
            id: 3,
            title: "Mens Cotton Jacket".to_string(),
            price: 55.99,
            category: Some("men's clothing".to_string()),
            description: None,
            image: None,
            rating_rate: Some(4.7),
            rating_count: None,
            loaded_at: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn history_shows_only_the_tail() {
        let base = record().loaded_at;
        let points = (0..5)
            .map(|i| PricePoint {
                ds: base + chrono::Duration::days(i),
                y: 50.0 + i as f64,
            })
            .collect();
        let text = format_history(&HistoryOutput { product: record(), points }, 2);

        assert!(text.contains("Price history (5 observations)"));
        assert!(text.contains("first 50.00 -> last 54.00  (min 50.00, max 54.00)"));
        assert!(text.contains("2024-06-05 09:00:00"));
        assert!(!text.contains("2024-06-03 09:00:00"));
        assert!(text.contains("4.7 (- votes)"));
    }

    #[test]
    fn simulation_summary_lists_rules() {
        let ts = record().loaded_at;
        let report = SimulationReport {
            days: 365,
            products: 20,
            rows_loaded: 7300,
            total_rows: 7300,
            newest: ts,
            oldest: ts - chrono::Duration::days(364),
        };
        let text = format_simulation_summary(&report, &CategoryRules::default());
        assert!(text.contains("Rows loaded: 7300  durable rows: 7300"));
        assert!(text.contains("electronics"));
        assert!(text.contains("-10.0%"));
        assert!(text.contains("-20.0%"));
    }
}
