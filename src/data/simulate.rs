//! Daily price history simulation.
//!
//! Every product is re-priced for each day of a lookback window and each day is
//! loaded into the store as its own batch, most recent day first:
//!
//! `price(d) = round2(base * (1 + adjustment / window * d + noise))`
//!
//! where `d` is days ago, `adjustment` comes from the category rules (0 for
//! unknown categories) and `noise ~ U[-0.005, 0.005]`. Day 0 is today's
//! observed price and is loaded unchanged.

use std::path::Path;

use chrono::{Duration, NaiveDateTime, Timelike};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Uniform;
use tracing::{debug, info, warn};

use crate::domain::{CategoryRules, ProductRecord, SimulationConfig};
use crate::error::AppError;
use crate::io::records::write_staging_csv;
use crate::schema::TableSchema;
use crate::store::ProductStore;

/// Half-width of the multiplicative daily noise band.
pub const NOISE_BOUND: f64 = 0.005;

/// Source of the per-price noise term.
pub trait NoiseSource {
    fn sample(&mut self) -> f64;
}

/// Seeded uniform noise in `[-NOISE_BOUND, NOISE_BOUND]`.
pub struct UniformNoise {
    rng: StdRng,
    dist: Uniform<f64>,
}

impl UniformNoise {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            dist: Uniform::new_inclusive(-NOISE_BOUND, NOISE_BOUND),
        }
    }
}

impl NoiseSource for UniformNoise {
    fn sample(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }
}

/// No noise: the deterministic drift only.
pub struct NoNoise;

impl NoiseSource for NoNoise {
    fn sample(&mut self) -> f64 {
        0.0
    }
}

/// Summary of a completed simulation.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub days: u32,
    pub products: usize,
    pub rows_loaded: usize,
    pub total_rows: i64,
    pub newest: NaiveDateTime,
    pub oldest: NaiveDateTime,
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Price of a product `days_ago` days before today.
pub fn adjust_price(base_price: f64, adjustment: f64, window_days: u32, days_ago: u32, noise: f64) -> f64 {
    let daily_adjustment = adjustment / f64::from(window_days.max(1));
    round2(base_price * (1.0 + daily_adjustment * f64::from(days_ago) + noise))
}

/// Re-price every product for one simulated day.
pub fn simulated_day(
    products: &[ProductRecord],
    rules: &CategoryRules,
    window_days: u32,
    days_ago: u32,
    loaded_at: NaiveDateTime,
    noise: &mut dyn NoiseSource,
) -> Vec<ProductRecord> {
    products
        .iter()
        .map(|p| {
            let price = if days_ago == 0 {
                round2(p.price)
            } else {
                let adjustment = rules.adjustment(p.category.as_deref());
                adjust_price(p.price, adjustment, window_days, days_ago, noise.sample())
            };
            p.repriced(price, loaded_at)
        })
        .collect()
}

/// Load `config.window_days` simulated days into `table`, walking back from `now`.
///
/// Each day is written to `work_csv` and ingested as one batch; the first
/// failing day aborts the run and leaves the days already loaded in place.
#[allow(clippy::too_many_arguments)]
pub fn simulate(
    store: &mut ProductStore,
    table: &str,
    schema: &TableSchema,
    products: &[ProductRecord],
    config: &SimulationConfig,
    work_csv: &Path,
    noise: &mut dyn NoiseSource,
    now: NaiveDateTime,
) -> Result<SimulationReport, AppError> {
    if config.window_days == 0 {
        return Err(AppError::usage("Simulation window must be at least 1 day."));
    }
    if products.is_empty() {
        return Err(AppError::no_data("No base products to simulate."));
    }
    if let Some(bad) = products.iter().find(|p| !(p.price.is_finite() && p.price >= 0.0)) {
        return Err(AppError::usage(format!(
            "Base price for product {} must be finite and non-negative.",
            bad.id
        )));
    }

    let now = now.with_nanosecond(0).unwrap_or(now);
    let mut rows_loaded = 0usize;
    let mut total_rows = 0i64;
    let mut oldest = now;

    for days_ago in 0..config.window_days {
        let loaded_at = now - Duration::days(i64::from(days_ago));
        debug!(days_ago, %loaded_at, "simulating day");

        let rows = simulated_day(products, &config.rules, config.window_days, days_ago, loaded_at, noise);
        write_staging_csv(work_csv, schema, &rows)?;

        let report = store.ingest(table, schema, work_csv).map_err(|e| {
            AppError::new(
                e.exit_code(),
                format!("Simulation aborted on day {days_ago} ({loaded_at}): {e}"),
            )
        })?;

        rows_loaded += report.rows_loaded;
        total_rows = report.total_rows;
        oldest = loaded_at;
    }

    if let Err(e) = std::fs::remove_file(work_csv) {
        warn!(path = %work_csv.display(), "failed to remove simulation work file: {e}");
    }

    info!(days = config.window_days, rows_loaded, "Data simulation complete.");

    Ok(SimulationReport {
        days: config.window_days,
        products: products.len(),
        rows_loaded,
        total_rows,
        newest: now,
        oldest,
    })
}
