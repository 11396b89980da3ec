//! `pricelog` library crate.
//!
//! The binary (`pricelog`) is a thin wrapper around this library so that:
//!
//! - the ingest and simulation pipeline is testable without spawning processes
//! - the store, validator and simulator can be driven from other tools
//! - paths and schemas are always passed in, never discovered

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod report;
pub mod schema;
pub mod store;
pub mod validate;
