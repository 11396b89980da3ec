//! Input/output helpers.
//!
//! - staging CSV write/read in schema column order (`records`)
//! - invalid-record archive and price history exports (`export`)

pub mod export;
pub mod records;

pub use export::*;
pub use records::*;
