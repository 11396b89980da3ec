//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - validated product rows and validation outcomes (`ProductRecord`, `ValidationOutcome`)
//! - read-side rows (`PricePoint`, `ColumnInfo`)
//! - run configuration (`PipelineConfig`, `SimulationConfig`, `CategoryRules`)

pub mod types;

pub use types::*;
